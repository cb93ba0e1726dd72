//! Command surface: every mutation the input side can request.

use crate::registry::FilterMode;

use super::navigate::{Motion, SearchDirection};

/// Parameters of one create request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateSpec {
    pub locator: String,
    /// Truncate an existing destination instead of resuming it.
    pub overwrite: bool,
    pub referer: Option<String>,
    /// Destination file name; derived from the locator when absent.
    pub name: Option<String>,
    /// Bandwidth cap in bytes per second; the configured default when absent.
    pub speed_cap: Option<u64>,
}

impl CreateSpec {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            ..Self::default()
        }
    }
}

/// A command applied to the manager. Commands without an explicit target
/// act on the selected record of the current filter mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create(CreateSpec),
    Delete,
    /// Active → Paused, Paused or Failed → Active.
    TogglePause,
    Pause,
    Resume,
    PauseAll,
    ResumeAll,
    /// Flips the global downloading flag.
    ToggleAll,
    Halt,
    Unhalt,
    /// Signed change of the selected record's cap in bytes per second.
    AdjustSpeed(i64),
    SetReferer(Option<String>),
    Search {
        text: String,
        direction: SearchDirection,
    },
    RepeatSearch(SearchDirection),
    Navigate(Motion),
    SwitchMode(FilterMode),
}
