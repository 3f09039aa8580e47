//! Session controller: validates user actions, drives backend requests and
//! owns every piece of UI state for one session.
//!
//! All transitions go through [`Orchestrator::dispatch`]. Preconditions are
//! checked before any request is issued, and state is only committed once the
//! response has been parsed, so a failed action leaves the session where it was.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use shared::{
    domain::{Category, ExportFormat},
    protocol::{DownloadScheduleRequest, Schedule, ScheduleRequest},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    controls::{Control, ControlPanel},
    download::{
        download_filename, schedule_filename, FileSaver, ENTIRE_TIMETABLE_STEM, TIMETABLE_STEM,
    },
    error::{ClientError, Result},
    events::{UiError, UiErrorContext, UiEvent},
    render::{render_schedule, ScheduleTable},
    TimetableBackend,
};

const MISSING_FILE: &str = "Please upload an Excel file.";
const MISSING_SELECTION: &str = "Please select both a department and a class.";
const MISSING_FORMAT: &str = "Please select a format to download.";
const MISSING_SCHEDULE: &str = "Please generate a schedule before downloading.";
const OPTIONS_NOT_LOADED: &str = "Please upload a timetable file before selecting a department and class.";
const MISSING_UPLOAD_LISTS: &str = "Departments or Classes not returned from the backend.";
const UPLOAD_ACKNOWLEDGED: &str = "File uploaded successfully!";
const GENERATE_ACKNOWLEDGED: &str = "Schedule generated successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    FileStaged,
    Uploaded,
    OptionsReady,
    SelectionMade,
    ScheduleGenerated,
}

#[derive(Debug, Clone)]
pub enum Command {
    /// `None` clears the file input.
    StageFile(Option<PathBuf>),
    Upload,
    LoadOptions,
    Select {
        department: Option<String>,
        class_name: Option<String>,
    },
    GenerateSchedule,
    GenerateAll,
    DownloadSchedule {
        format: Option<ExportFormat>,
    },
    DownloadEntireTimetable {
        format: Option<ExportFormat>,
    },
    ExportTimetable {
        format: Option<ExportFormat>,
    },
}

impl Command {
    fn context(&self) -> UiErrorContext {
        match self {
            Command::StageFile(_) => UiErrorContext::StageFile,
            Command::Upload => UiErrorContext::Upload,
            Command::LoadOptions => UiErrorContext::LoadOptions,
            Command::Select { .. } => UiErrorContext::Select,
            Command::GenerateSchedule => UiErrorContext::GenerateSchedule,
            Command::GenerateAll => UiErrorContext::GenerateAll,
            Command::DownloadSchedule { .. } => UiErrorContext::Download,
            Command::DownloadEntireTimetable { .. } => UiErrorContext::DownloadEntireTimetable,
            Command::ExportTimetable { .. } => UiErrorContext::Export,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    FileStaged { path: Option<PathBuf> },
    OptionsPopulated {
        departments: Vec<String>,
        classes: Vec<String>,
    },
    Acknowledged(String),
    SelectionUpdated(Selection),
    ScheduleRendered(ScheduleTable),
    Saved(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub department: Option<String>,
    pub class_name: Option<String>,
}

impl Selection {
    fn request(&self) -> Option<ScheduleRequest> {
        match (&self.department, &self.class_name) {
            (Some(department), Some(class_name)) => Some(ScheduleRequest {
                department: department.clone(),
                class_name: class_name.clone(),
            }),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.request().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropdownOption {
    pub value: String,
    pub label: String,
}

/// A select element: a leading "unselected" entry followed by the backend's
/// values in response order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dropdown {
    pub category: Category,
    pub options: Vec<DropdownOption>,
}

impl Dropdown {
    pub fn populate(category: Category, items: &[String]) -> Self {
        let placeholder = DropdownOption {
            value: String::new(),
            label: format!("--Select {category}--"),
        };
        let options = std::iter::once(placeholder)
            .chain(items.iter().map(|item| DropdownOption {
                value: item.clone(),
                label: item.clone(),
            }))
            .collect();
        Self { category, options }
    }

    /// Selectable values, excluding the placeholder.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.options.iter().skip(1).map(|option| option.value.as_str())
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values().any(|candidate| candidate == value)
    }
}

/// Snapshot of everything the user can currently see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub phase: Phase,
    pub staged_file: Option<PathBuf>,
    pub dropdowns: BTreeMap<Category, Dropdown>,
    pub selection: Selection,
    pub selection_form_visible: bool,
    pub schedule_table: Option<ScheduleTable>,
    pub alert: Option<String>,
}

#[derive(Debug, Clone)]
struct GeneratedSchedule {
    request: ScheduleRequest,
    schedule: Schedule,
}

struct SessionState {
    phase: Phase,
    staged_file: Option<PathBuf>,
    uploaded: bool,
    dropdowns: BTreeMap<Category, Dropdown>,
    selection: Selection,
    selection_form_visible: bool,
    generated: Option<GeneratedSchedule>,
    schedule_table: Option<ScheduleTable>,
    alert: Option<String>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            staged_file: None,
            uploaded: false,
            dropdowns: BTreeMap::new(),
            selection: Selection::default(),
            selection_form_visible: false,
            generated: None,
            schedule_table: None,
            alert: None,
        }
    }

    fn has_options(&self, category: Category) -> bool {
        self.dropdowns
            .get(&category)
            .is_some_and(|dropdown| dropdown.values().next().is_some())
    }

    fn options_ready(&self) -> bool {
        self.has_options(Category::Department) && self.has_options(Category::Class)
    }

    /// Phase implied by the staged/uploaded/options/selection facts.
    fn derived_phase(&self) -> Phase {
        if self.options_ready() {
            match (self.selection.request(), &self.generated) {
                (Some(request), Some(generated)) if generated.request == request => {
                    Phase::ScheduleGenerated
                }
                (Some(_), _) => Phase::SelectionMade,
                (None, _) => Phase::OptionsReady,
            }
        } else if self.uploaded {
            Phase::Uploaded
        } else if self.staged_file.is_some() {
            Phase::FileStaged
        } else {
            Phase::Idle
        }
    }
}

pub struct Orchestrator {
    backend: Arc<dyn TimetableBackend>,
    saver: Arc<dyn FileSaver>,
    controls: Arc<ControlPanel>,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<UiEvent>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn TimetableBackend>, saver: Arc<dyn FileSaver>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            backend,
            saver,
            controls: ControlPanel::new(),
            inner: Mutex::new(SessionState::new()),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<UiEvent> {
        self.events.subscribe()
    }

    pub fn controls(&self) -> &Arc<ControlPanel> {
        &self.controls
    }

    pub async fn view(&self) -> ViewState {
        let guard = self.inner.lock().await;
        ViewState {
            phase: guard.phase,
            staged_file: guard.staged_file.clone(),
            dropdowns: guard.dropdowns.clone(),
            selection: guard.selection.clone(),
            selection_form_visible: guard.selection_form_visible,
            schedule_table: guard.schedule_table.clone(),
            alert: guard.alert.clone(),
        }
    }

    /// Runs one user action. Failures are also surfaced as an alert and an
    /// [`UiEvent::Error`].
    pub async fn dispatch(&self, command: Command) -> Result<Outcome> {
        let context = command.context();
        debug!(?context, "dispatching command");
        self.inner.lock().await.alert = None;

        let result = match command {
            Command::StageFile(path) => Ok(self.stage_file(path).await),
            Command::Upload => self.upload().await,
            Command::LoadOptions => self.load_options().await,
            Command::Select {
                department,
                class_name,
            } => self.select(department, class_name).await,
            Command::GenerateSchedule => self.generate_schedule().await,
            Command::GenerateAll => self.generate_all().await,
            Command::DownloadSchedule { format } => self.download_schedule(format).await,
            Command::DownloadEntireTimetable { format } => {
                self.download_entire_timetable(format).await
            }
            Command::ExportTimetable { format } => self.export_timetable(format).await,
        };

        if let Err(err) = &result {
            self.report(context, err).await;
        }
        result
    }

    async fn stage_file(&self, path: Option<PathBuf>) -> Outcome {
        let mut guard = self.inner.lock().await;
        guard.staged_file = path.clone();
        guard.uploaded = false;
        self.settle_phase(&mut guard);
        Outcome::FileStaged { path }
    }

    async fn upload(&self) -> Result<Outcome> {
        let path = self
            .inner
            .lock()
            .await
            .staged_file
            .clone()
            .ok_or_else(|| ClientError::validation(MISSING_FILE))?;
        let _control = self.controls.acquire(Control::Upload)?;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| ClientError::StagedFile {
                path: path.clone(),
                source,
            })?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.xlsx".to_string());

        let response = self.backend.upload(&filename, bytes).await?;

        match (response.departments, response.classes) {
            (Some(departments), Some(classes)) => {
                info!(
                    departments = departments.len(),
                    classes = classes.len(),
                    "upload accepted; populating dropdowns"
                );
                let mut guard = self.inner.lock().await;
                guard.uploaded = true;
                self.populate(&mut guard, Category::Department, &departments);
                self.populate(&mut guard, Category::Class, &classes);
                self.show_selection_form(&mut guard);
                self.settle_phase(&mut guard);
                Ok(Outcome::OptionsPopulated {
                    departments,
                    classes,
                })
            }
            _ => match response.message {
                Some(message) => {
                    let message = if message.trim().is_empty() {
                        UPLOAD_ACKNOWLEDGED.to_string()
                    } else {
                        message
                    };
                    let mut guard = self.inner.lock().await;
                    guard.uploaded = true;
                    self.settle_phase(&mut guard);
                    self.inform(&mut guard, &message);
                    Ok(Outcome::Acknowledged(message))
                }
                None => Err(ClientError::Network(MISSING_UPLOAD_LISTS.to_string())),
            },
        }
    }

    async fn load_options(&self) -> Result<Outcome> {
        let _control = self.controls.acquire(Control::LoadOptions)?;

        let mut fetched = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let options = match self.backend.dropdown_options(category).await {
                Ok(options) => options,
                Err(err) => {
                    warn!(%category, error = %err, "failed to fetch dropdown options");
                    Vec::new()
                }
            };
            fetched.push((category, options));
        }

        let mut guard = self.inner.lock().await;
        for (category, options) in &fetched {
            self.populate(&mut guard, *category, options);
        }
        if guard.options_ready() {
            self.show_selection_form(&mut guard);
        }
        self.settle_phase(&mut guard);
        info!("dropdowns populated");

        let take = |category: Category| {
            fetched
                .iter()
                .find(|(candidate, _)| *candidate == category)
                .map(|(_, options)| options.clone())
                .unwrap_or_default()
        };
        Ok(Outcome::OptionsPopulated {
            departments: take(Category::Department),
            classes: take(Category::Class),
        })
    }

    async fn select(
        &self,
        department: Option<String>,
        class_name: Option<String>,
    ) -> Result<Outcome> {
        let mut guard = self.inner.lock().await;
        if !guard.options_ready() {
            return Err(ClientError::validation(OPTIONS_NOT_LOADED));
        }

        let department = checked_choice(&guard, Category::Department, department)?;
        let class_name = checked_choice(&guard, Category::Class, class_name)?;

        guard.selection = Selection {
            department,
            class_name,
        };
        self.settle_phase(&mut guard);
        Ok(Outcome::SelectionUpdated(guard.selection.clone()))
    }

    async fn generate_schedule(&self) -> Result<Outcome> {
        let request = self
            .inner
            .lock()
            .await
            .selection
            .request()
            .ok_or_else(|| ClientError::validation(MISSING_SELECTION))?;
        let _control = self.controls.acquire(Control::Generate)?;

        let schedule = self.backend.generate_schedule(&request).await?;
        schedule.check_shape()?;
        let table = render_schedule(&schedule);
        info!(
            days = schedule.days.len(),
            slots = schedule.slots.len(),
            "schedule received"
        );

        let mut guard = self.inner.lock().await;
        guard.generated = Some(GeneratedSchedule { request, schedule });
        guard.schedule_table = Some(table.clone());
        self.emit(UiEvent::ScheduleRendered(table.clone()));
        self.settle_phase(&mut guard);
        Ok(Outcome::ScheduleRendered(table))
    }

    async fn generate_all(&self) -> Result<Outcome> {
        let _control = self.controls.acquire(Control::GenerateAll)?;
        let response = self.backend.generate_all().await?;
        let message = response
            .message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| GENERATE_ACKNOWLEDGED.to_string());

        let mut guard = self.inner.lock().await;
        self.inform(&mut guard, &message);
        Ok(Outcome::Acknowledged(message))
    }

    async fn download_schedule(&self, format: Option<ExportFormat>) -> Result<Outcome> {
        let format = format.ok_or_else(|| ClientError::validation(MISSING_FORMAT))?;
        let generated = self
            .inner
            .lock()
            .await
            .generated
            .clone()
            .ok_or_else(|| ClientError::validation(MISSING_SCHEDULE))?;
        let _control = self.controls.acquire(Control::Download)?;

        let filename = schedule_filename(
            &generated.request.department,
            &generated.request.class_name,
            format,
        );
        let bytes = self
            .backend
            .download_schedule(&DownloadScheduleRequest {
                format,
                schedule: generated.schedule,
            })
            .await?;
        self.save(&filename, &bytes)
    }

    async fn download_entire_timetable(&self, format: Option<ExportFormat>) -> Result<Outcome> {
        let format = format.ok_or_else(|| ClientError::validation(MISSING_FORMAT))?;
        let _control = self.controls.acquire(Control::DownloadEntireTimetable)?;

        let bytes = self.backend.download_entire_timetable(format).await?;
        self.save(&download_filename(ENTIRE_TIMETABLE_STEM, format), &bytes)
    }

    async fn export_timetable(&self, format: Option<ExportFormat>) -> Result<Outcome> {
        let format = format.ok_or_else(|| ClientError::validation(MISSING_FORMAT))?;
        let _control = self.controls.acquire(Control::Export)?;

        let bytes = self.backend.export_timetable(format).await?;
        self.save(&download_filename(TIMETABLE_STEM, format), &bytes)
    }

    fn save(&self, filename: &str, bytes: &[u8]) -> Result<Outcome> {
        let path = self.saver.save(filename, bytes)?;
        info!(path = %path.display(), size_bytes = bytes.len(), "file downloaded");
        self.emit(UiEvent::FileSaved { path: path.clone() });
        Ok(Outcome::Saved(path))
    }

    fn populate(&self, state: &mut SessionState, category: Category, items: &[String]) {
        let dropdown = Dropdown::populate(category, items);
        debug!(%category, items = items.len(), "dropdown populated");
        state.dropdowns.insert(category, dropdown.clone());
        // Repopulating resets the element to its placeholder.
        match category {
            Category::Department => state.selection.department = None,
            Category::Class => state.selection.class_name = None,
            Category::Teacher => {}
        }
        self.emit(UiEvent::DropdownPopulated(dropdown));
    }

    fn show_selection_form(&self, state: &mut SessionState) {
        if !state.selection_form_visible {
            state.selection_form_visible = true;
            self.emit(UiEvent::SelectionFormShown);
        }
    }

    fn settle_phase(&self, state: &mut SessionState) {
        let phase = state.derived_phase();
        if phase != state.phase {
            debug!(from = ?state.phase, to = ?phase, "phase changed");
            state.phase = phase;
            self.emit(UiEvent::PhaseChanged(phase));
        }
    }

    fn inform(&self, state: &mut SessionState, message: &str) {
        state.alert = Some(message.to_string());
        self.emit(UiEvent::Info(message.to_string()));
    }

    async fn report(&self, context: UiErrorContext, err: &ClientError) {
        if err.is_validation() {
            info!(?context, error = %err, "action rejected");
        } else {
            warn!(?context, error = %err, "action failed");
        }
        let ui_error = UiError::from_client_error(context, err);
        self.inner.lock().await.alert = Some(ui_error.message().to_string());
        self.emit(UiEvent::Error(ui_error));
    }

    fn emit(&self, event: UiEvent) {
        let _ = self.events.send(event);
    }
}

/// Blank values count as unselected; anything else must be one of the
/// dropdown's values.
fn checked_choice(
    state: &SessionState,
    category: Category,
    value: Option<String>,
) -> Result<Option<String>> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let known = state
        .dropdowns
        .get(&category)
        .is_some_and(|dropdown| dropdown.contains(&value));
    if known {
        Ok(Some(value))
    } else {
        Err(ClientError::validation(format!(
            "'{value}' is not an available {category}."
        )))
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
