use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dropdown categories served by `/dropdown/{category}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Department,
    Class,
    Teacher,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Department, Category::Class, Category::Teacher];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Department => "department",
            Category::Class => "class",
            Category::Teacher => "teacher",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output document formats understood by the download endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Pdf,
    Word,
    Excel,
    Csv,
}

impl ExportFormat {
    /// Name sent in JSON `format` fields.
    pub fn wire_name(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Word => "word",
            ExportFormat::Excel => "excel",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Word => "docx",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    /// Value for `GET /download?type=`, which keys on file extensions.
    pub fn query_type(self) -> &'static str {
        self.extension()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported format '{0}' (expected pdf, word, excel or csv)")]
pub struct UnknownFormat(pub String);

impl FromStr for ExportFormat {
    type Err = UnknownFormat;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "word" | "docx" => Ok(ExportFormat::Word),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(UnknownFormat(raw.to_string())),
        }
    }
}
