//! Download naming and local saving.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use shared::domain::ExportFormat;
use tempfile::NamedTempFile;

use crate::error::{ClientError, Result};

pub const ENTIRE_TIMETABLE_STEM: &str = "entire_timetable";
pub const TIMETABLE_STEM: &str = "timetable";

pub fn download_filename(stem: &str, format: ExportFormat) -> String {
    format!("{stem}.{}", format.extension())
}

pub fn schedule_filename(department: &str, class_name: &str, format: ExportFormat) -> String {
    download_filename(
        &format!(
            "schedule_{}_{}",
            sanitize_component(department),
            sanitize_component(class_name)
        ),
        format,
    )
}

/// Replaces characters that are not allowed in file names on common platforms.
pub fn sanitize_component(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Exposes downloaded bytes to the user as a saved file.
pub trait FileSaver: Send + Sync {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Saves into a directory, overwriting any file of the same name.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileSaver for DirectorySaver {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let target = self.dir.join(filename);
        let save_error = |source: std::io::Error| ClientError::Save {
            path: target.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(save_error)?;

        // The staging file is removed on drop if anything below fails.
        let mut staging = NamedTempFile::new_in(&self.dir).map_err(save_error)?;
        staging.write_all(bytes).map_err(save_error)?;
        staging.as_file().sync_all().map_err(save_error)?;
        staging
            .persist(&target)
            .map_err(|err| save_error(err.error))?;

        Ok(target)
    }
}
