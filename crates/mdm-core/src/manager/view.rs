//! Read-only views handed to the rendering side. They are plain owned data
//! so they can cross the service channel.

use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{Protocol, TransferInfo};
use crate::record::{DownloadRecord, RecordId, TransferState};
use crate::registry::FilterMode;
use crate::stats::Eta;

/// One visible row of the list.
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: RecordId,
    pub name: String,
    pub state: TransferState,
    pub progress: f64,
    pub bytes_per_sec: f64,
    pub eta: Eta,
    pub speed_cap: u64,
}

impl RowView {
    pub(crate) fn of(record: &DownloadRecord) -> Self {
        let stats = record.stats();
        Self {
            id: record.id(),
            name: record.name().to_string(),
            state: record.state(),
            progress: stats.progress,
            bytes_per_sec: stats.bytes_per_sec,
            eta: stats.eta,
            speed_cap: record.speed_cap(),
        }
    }
}

/// Number of records in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub inactive: usize,
    pub paused: usize,
    pub active: usize,
    pub finished: usize,
    pub failed: usize,
}

impl StateCounts {
    pub(crate) fn add(&mut self, state: TransferState) {
        match state {
            TransferState::Inactive => self.inactive += 1,
            TransferState::Paused => self.paused += 1,
            TransferState::Active => self.active += 1,
            TransferState::Finished => self.finished += 1,
            TransferState::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inactive + self.paused + self.active + self.finished + self.failed
    }
}

/// Everything the list screen shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub mode: FilterMode,
    /// Records visible in `mode`, in list order.
    pub rows: Vec<RowView>,
    pub selected: Option<RecordId>,
    pub counts: StateCounts,
    /// Global "start all" flag.
    pub downloading: bool,
    /// Time since the last "start all", while anything is active.
    pub session_elapsed: Option<Duration>,
    /// Sum of the active records' rates.
    pub total_bytes_per_sec: f64,
    /// Last status message (errors and notices from commands).
    pub status: Option<String>,
    pub exit_requested: bool,
}

impl Snapshot {
    /// Position of the selected row in `rows`.
    pub fn selected_index(&self) -> Option<usize> {
        let id = self.selected?;
        self.rows.iter().position(|r| r.id == id)
    }
}

/// Detail block of the selected record.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub id: RecordId,
    pub name: String,
    pub state: TransferState,
    pub locator: String,
    pub destination: PathBuf,
    pub effective_url: Option<String>,
    pub response_code: Option<u32>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub bytes_transferred: u64,
    pub prior_bytes: u64,
    pub primary_ip: Option<String>,
    pub primary_port: Option<u16>,
    pub protocol: Protocol,
    pub progress: f64,
    pub bytes_per_sec: f64,
    /// Bandwidth cap (0 = unlimited).
    pub speed_cap: u64,
    pub referer: Option<String>,
    pub elapsed: Duration,
    pub eta: Eta,
    pub error: Option<String>,
}

impl DetailView {
    /// `info` is the engine's live view while registered, else the record's last one.
    pub(crate) fn of(record: &DownloadRecord, info: TransferInfo, elapsed: Duration) -> Self {
        let stats = record.stats();
        Self {
            id: record.id(),
            name: record.name().to_string(),
            state: record.state(),
            locator: record.locator().raw().to_string(),
            destination: record.destination_path().to_path_buf(),
            effective_url: info.effective_url,
            response_code: info.response_code,
            content_type: info.content_type,
            content_length: info.content_length,
            bytes_transferred: info.bytes_transferred,
            prior_bytes: record.prior_bytes(),
            primary_ip: info.primary_ip,
            primary_port: info.primary_port,
            protocol: info.protocol,
            progress: stats.progress,
            bytes_per_sec: stats.bytes_per_sec,
            speed_cap: record.speed_cap(),
            referer: record.referer().map(str::to_string),
            elapsed,
            eta: stats.eta,
            error: record.error().map(str::to_string),
        }
    }
}
