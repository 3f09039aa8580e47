//! Events published by the orchestrator and user-facing error modeling.

use std::path::PathBuf;

use crate::{
    error::ClientError,
    orchestrator::{Dropdown, Phase},
    render::ScheduleTable,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    PhaseChanged(Phase),
    Info(String),
    DropdownPopulated(Dropdown),
    SelectionFormShown,
    ScheduleRendered(ScheduleTable),
    FileSaved { path: PathBuf },
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Validation,
    Network,
    Backend,
    Render,
    Busy,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    StageFile,
    Upload,
    LoadOptions,
    Select,
    GenerateSchedule,
    GenerateAll,
    Download,
    DownloadEntireTimetable,
    Export,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_client_error(context: UiErrorContext, error: &ClientError) -> Self {
        let category = match error {
            ClientError::Validation(_) => UiErrorCategory::Validation,
            ClientError::Network(_) => UiErrorCategory::Network,
            ClientError::Backend { .. } => UiErrorCategory::Backend,
            ClientError::RenderInvariant { .. } => UiErrorCategory::Render,
            ClientError::Busy(_) => UiErrorCategory::Busy,
            ClientError::StagedFile { .. } | ClientError::Save { .. } => UiErrorCategory::Local,
        };

        let message = match (context, error) {
            (UiErrorContext::DownloadEntireTimetable, ClientError::Backend { message, .. }) => {
                format!("Failed to download entire timetable: {message}")
            }
            _ => error.user_message(),
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
