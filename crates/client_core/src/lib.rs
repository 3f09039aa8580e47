use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Category, ExportFormat},
    error::ErrorBody,
    protocol::{
        DownloadScheduleRequest, DropdownResponse, EntireTimetableRequest, MessageResponse,
        Schedule, ScheduleRequest, UploadResponse,
    },
};
use tracing::{info, warn};
use url::Url;

pub mod controls;
pub mod download;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod render;

pub use controls::{Control, ControlGuard, ControlPanel};
pub use download::{DirectorySaver, FileSaver};
pub use error::{ClientError, Result};
pub use events::{UiError, UiErrorCategory, UiErrorContext, UiEvent};
pub use orchestrator::{Command, Dropdown, Orchestrator, Outcome, Phase, Selection, ViewState};
pub use render::{render_schedule, ScheduleTable};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const UPLOAD_FAILED: &str = "File upload failed";
const GENERATE_FAILED: &str = "Failed to generate schedule.";
const DOWNLOAD_FAILED: &str = "Failed to download file.";
const ENTIRE_TIMETABLE_FAILED: &str = "Failed to download entire timetable";
const EXPORT_FAILED: &str = "Failed to download the timetable.";

/// The timetable backend's HTTP surface, one method per endpoint.
#[async_trait]
pub trait TimetableBackend: Send + Sync {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadResponse>;
    async fn generate_schedule(&self, request: &ScheduleRequest) -> Result<Schedule>;
    async fn generate_all(&self) -> Result<MessageResponse>;
    async fn download_schedule(&self, request: &DownloadScheduleRequest) -> Result<Vec<u8>>;
    async fn download_entire_timetable(&self, format: ExportFormat) -> Result<Vec<u8>>;
    async fn export_timetable(&self, format: ExportFormat) -> Result<Vec<u8>>;
    async fn dropdown_options(&self, category: Category) -> Result<Vec<String>>;
}

pub struct HttpBackend {
    http: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Network(format!("invalid endpoint {path}: {e}")))
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Maps a non-success response onto `ClientError::Backend`, preferring the
/// backend's `error` field over `fallback`.
async fn ensure_success(response: Response, fallback: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.bytes().await {
        Ok(bytes) => serde_json::from_slice::<ErrorBody>(&bytes).unwrap_or_default(),
        Err(_) => ErrorBody::default(),
    };
    let message = body.message_or(fallback);
    warn!(status = status.as_u16(), %message, "backend request failed");
    Err(ClientError::Backend {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T> {
    Ok(ensure_success(response, fallback).await?.json().await?)
}

async fn read_bytes(response: Response, fallback: &str) -> Result<Vec<u8>> {
    let bytes = ensure_success(response, fallback).await?.bytes().await?;
    Ok(bytes.to_vec())
}

#[async_trait]
impl TimetableBackend for HttpBackend {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadResponse> {
        info!(filename, size_bytes = bytes.len(), "uploading file to backend");
        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename.to_string()));
        let response = self
            .http
            .post(self.endpoint("upload")?)
            .multipart(form)
            .send()
            .await?;
        read_json(response, UPLOAD_FAILED).await
    }

    async fn generate_schedule(&self, request: &ScheduleRequest) -> Result<Schedule> {
        info!(
            department = %request.department,
            class = %request.class_name,
            "requesting schedule from backend"
        );
        let response = self
            .http
            .post(self.endpoint("generate_schedule")?)
            .json(request)
            .send()
            .await?;
        read_json(response, GENERATE_FAILED).await
    }

    async fn generate_all(&self) -> Result<MessageResponse> {
        info!("requesting timetable generation for all classes");
        let response = self.http.post(self.endpoint("generate")?).send().await?;
        read_json(response, GENERATE_FAILED).await
    }

    async fn download_schedule(&self, request: &DownloadScheduleRequest) -> Result<Vec<u8>> {
        info!(format = %request.format, "requesting schedule download");
        let response = self
            .http
            .post(self.endpoint("download")?)
            .json(request)
            .send()
            .await?;
        read_bytes(response, DOWNLOAD_FAILED).await
    }

    async fn download_entire_timetable(&self, format: ExportFormat) -> Result<Vec<u8>> {
        info!(%format, "requesting entire timetable download");
        let response = self
            .http
            .post(self.endpoint("download_entire_timetable")?)
            .json(&EntireTimetableRequest { format })
            .send()
            .await?;
        read_bytes(response, ENTIRE_TIMETABLE_FAILED).await
    }

    async fn export_timetable(&self, format: ExportFormat) -> Result<Vec<u8>> {
        info!(file_type = format.query_type(), "requesting timetable export");
        let response = self
            .http
            .get(self.endpoint("download")?)
            .query(&[("type", format.query_type())])
            .send()
            .await?;
        read_bytes(response, EXPORT_FAILED).await
    }

    async fn dropdown_options(&self, category: Category) -> Result<Vec<String>> {
        let path = format!("dropdown/{category}");
        let response = self.http.get(self.endpoint(&path)?).send().await?;
        let fallback = format!(
            "Failed to fetch options from /{path}, Status: {}",
            response.status().as_u16()
        );
        let body: DropdownResponse = read_json(response, &fallback).await?;
        if body.options.is_empty() {
            warn!(%category, "no options received");
        }
        Ok(body.options)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
