use serde::{Deserialize, Serialize};

/// JSON body returned by the backend alongside a non-2xx status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
        }
    }

    /// The backend's message, or `fallback` when the field is absent or blank.
    pub fn message_or(&self, fallback: &str) -> String {
        match self.error.as_deref().map(str::trim) {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => fallback.to_string(),
        }
    }
}
