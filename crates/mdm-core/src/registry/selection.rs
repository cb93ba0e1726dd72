//! Filter modes and the per-mode selection cursors.

use std::fmt;

use crate::record::{RecordId, TransferState};

/// Which records the list shows. Every mode but `All` matches one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    All,
    Inactive,
    Paused,
    Active,
    Finished,
    Failed,
}

impl FilterMode {
    pub const ALL: [FilterMode; 6] = [
        FilterMode::All,
        FilterMode::Inactive,
        FilterMode::Paused,
        FilterMode::Active,
        FilterMode::Finished,
        FilterMode::Failed,
    ];

    pub fn matches(self, state: TransferState) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Inactive => state == TransferState::Inactive,
            FilterMode::Paused => state == TransferState::Paused,
            FilterMode::Active => state == TransferState::Active,
            FilterMode::Finished => state == TransferState::Finished,
            FilterMode::Failed => state == TransferState::Failed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterMode::All => "all",
            FilterMode::Inactive => "inactive",
            FilterMode::Paused => "paused",
            FilterMode::Active => "active",
            FilterMode::Finished => "finished",
            FilterMode::Failed => "failed",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One optional cursor per filter mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    all: Option<RecordId>,
    inactive: Option<RecordId>,
    paused: Option<RecordId>,
    active: Option<RecordId>,
    finished: Option<RecordId>,
    failed: Option<RecordId>,
}

impl Selection {
    pub fn get(&self, mode: FilterMode) -> Option<RecordId> {
        *self.slot(mode)
    }

    pub fn set(&mut self, mode: FilterMode, id: Option<RecordId>) {
        *self.slot_mut(mode) = id;
    }

    /// Modes whose cursor currently points at `id`.
    pub fn modes_at(&self, id: RecordId) -> Vec<FilterMode> {
        FilterMode::ALL
            .into_iter()
            .filter(|&m| self.get(m) == Some(id))
            .collect()
    }

    fn slot(&self, mode: FilterMode) -> &Option<RecordId> {
        match mode {
            FilterMode::All => &self.all,
            FilterMode::Inactive => &self.inactive,
            FilterMode::Paused => &self.paused,
            FilterMode::Active => &self.active,
            FilterMode::Finished => &self.finished,
            FilterMode::Failed => &self.failed,
        }
    }

    fn slot_mut(&mut self, mode: FilterMode) -> &mut Option<RecordId> {
        match mode {
            FilterMode::All => &mut self.all,
            FilterMode::Inactive => &mut self.inactive,
            FilterMode::Paused => &mut self.paused,
            FilterMode::Active => &mut self.active,
            FilterMode::Finished => &mut self.finished,
            FilterMode::Failed => &mut self.failed,
        }
    }
}
