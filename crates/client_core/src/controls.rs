//! Per-control enable flags. A control is disabled while its request is in flight.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Upload,
    LoadOptions,
    Generate,
    GenerateAll,
    Download,
    DownloadEntireTimetable,
    Export,
}

impl Control {
    pub const ALL: [Control; CONTROL_COUNT] = [
        Control::Upload,
        Control::LoadOptions,
        Control::Generate,
        Control::GenerateAll,
        Control::Download,
        Control::DownloadEntireTimetable,
        Control::Export,
    ];

    fn index(self) -> usize {
        match self {
            Control::Upload => 0,
            Control::LoadOptions => 1,
            Control::Generate => 2,
            Control::GenerateAll => 3,
            Control::Download => 4,
            Control::DownloadEntireTimetable => 5,
            Control::Export => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Control::Upload => "upload",
            Control::LoadOptions => "load options",
            Control::Generate => "generate schedule",
            Control::GenerateAll => "generate timetable",
            Control::Download => "download",
            Control::DownloadEntireTimetable => "download entire timetable",
            Control::Export => "export timetable",
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

const CONTROL_COUNT: usize = 7;

pub struct ControlPanel {
    enabled: [AtomicBool; CONTROL_COUNT],
}

impl ControlPanel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            enabled: std::array::from_fn(|_| AtomicBool::new(true)),
        })
    }

    pub fn is_enabled(&self, control: Control) -> bool {
        self.enabled[control.index()].load(Ordering::Acquire)
    }

    /// Disables `control` until the returned guard is dropped.
    pub fn acquire(self: &Arc<Self>, control: Control) -> Result<ControlGuard, ClientError> {
        self.enabled[control.index()]
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ClientError::Busy(control))?;
        tracing::debug!(control = control.label(), "control disabled");
        Ok(ControlGuard {
            panel: Arc::clone(self),
            control,
        })
    }
}

#[must_use = "the control is re-enabled as soon as the guard is dropped"]
pub struct ControlGuard {
    panel: Arc<ControlPanel>,
    control: Control,
}

impl Drop for ControlGuard {
    fn drop(&mut self) {
        self.panel.enabled[self.control.index()].store(true, Ordering::Release);
        tracing::debug!(control = self.control.label(), "control re-enabled");
    }
}
