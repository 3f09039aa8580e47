use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const SETTINGS_FILE: &str = "timetable.toml";
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub download_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            request_timeout_secs: client_core::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            download_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    request_timeout_secs: Option<u64>,
    download_dir: Option<PathBuf>,
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file, then environment variables.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.server_url {
                    settings.server_url = v;
                }
                if let Some(v) = file_cfg.request_timeout_secs {
                    settings.request_timeout_secs = v;
                }
                if let Some(v) = file_cfg.download_dir {
                    settings.download_dir = v;
                }
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring unreadable settings file");
            }
        }
    }

    if let Some(v) = env("TIMETABLE_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = parsed,
            Err(_) => warn!(value = %v, "ignoring non-numeric APP__REQUEST_TIMEOUT_SECS"),
        }
    }

    if let Some(v) = env("APP__DOWNLOAD_DIR") {
        settings.download_dir = PathBuf::from(v);
    }

    settings
}

/// Accepts `host:port` shorthand and defaults the scheme to `http`.
pub fn parse_server_url(raw: &str) -> anyhow::Result<Url> {
    let raw = raw.trim();
    let raw = if raw.is_empty() { DEFAULT_SERVER_URL } else { raw };

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let url = Url::parse(&candidate).with_context(|| format!("invalid server url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("server url '{raw}' must use http or https");
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
