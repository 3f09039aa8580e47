use serde::{Deserialize, Serialize};

use crate::domain::ExportFormat;

/// Body of a successful `POST /upload`.
///
/// The spreadsheet backend answers with the department and class lists; the
/// database-backed backend only acknowledges with a `message`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub department: String,
    #[serde(rename = "class")]
    pub class_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub time: String,
    #[serde(default)]
    pub schedule: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub days: Vec<String>,
    pub slots: Vec<Slot>,
}

/// A slot whose row does not line up with the day columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatch {
    pub slot: usize,
    pub time: String,
    pub expected: usize,
    pub found: usize,
}

impl Schedule {
    pub fn check_shape(&self) -> Result<(), ShapeMismatch> {
        let expected = self.days.len();
        match self
            .slots
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.schedule.len() != expected)
        {
            Some((index, slot)) => Err(ShapeMismatch {
                slot: index,
                time: slot.time.clone(),
                expected,
                found: slot.schedule.len(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadScheduleRequest {
    pub format: ExportFormat,
    pub schedule: Schedule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntireTimetableRequest {
    pub format: ExportFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownResponse {
    #[serde(default)]
    pub options: Vec<String>,
}
