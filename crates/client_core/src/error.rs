use std::path::PathBuf;

use shared::protocol::ShapeMismatch;
use thiserror::Error;

use crate::controls::Control;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Required user input is missing; no request was sent.
    #[error("{0}")]
    Validation(String),
    /// The request could not be sent, timed out, or its body could not be parsed.
    #[error("{0}")]
    Network(String),
    /// The backend answered with a non-success status.
    #[error("{message}")]
    Backend { status: u16, message: String },
    #[error("schedule slot {slot} ({time}) has {found} entries for {expected} days")]
    RenderInvariant {
        slot: usize,
        time: String,
        expected: usize,
        found: usize,
    },
    #[error("{0} is already in progress")]
    Busy(Control),
    #[error("failed to read staged file {}: {source}", path.display())]
    StagedFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to save {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Alert text shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            other => format!("Error: {other}"),
        }
    }
}

impl From<ShapeMismatch> for ClientError {
    fn from(value: ShapeMismatch) -> Self {
        Self::RenderInvariant {
            slot: value.slot,
            time: value.time,
            expected: value.expected,
            found: value.found,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Network(format!("request timed out: {value}"))
        } else if value.is_decode() {
            Self::Network(format!("response could not be parsed: {value}"))
        } else {
            Self::Network(value.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
