//! Download records: one requested transfer, its destination file, and its
//! runtime state.

use std::fmt;
use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::engine::TransferInfo;
use crate::locator::Locator;
use crate::stats::TransferStats;

/// Stable identifier of a record. Also the key the engine adapter uses to
/// map completion messages back to their record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl RecordId {
    pub fn new(raw: u64) -> Self {
        RecordId(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferState {
    Inactive,
    Paused,
    Active,
    Finished,
    /// Completed with a transport error or an error response.
    Failed,
}

impl TransferState {
    pub const ALL: [TransferState; 5] = [
        TransferState::Inactive,
        TransferState::Paused,
        TransferState::Active,
        TransferState::Finished,
        TransferState::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransferState::Inactive => "inactive",
            TransferState::Paused => "paused",
            TransferState::Active => "active",
            TransferState::Finished => "finished",
            TransferState::Failed => "failed",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination file of a record. The size of the file at registration time
/// is the resume offset; nothing else is persisted.
#[derive(Debug)]
pub struct Destination {
    path: PathBuf,
    file: File,
    prior_bytes: u64,
}

impl Destination {
    /// Opens the destination. Without `overwrite` an existing file is opened
    /// for update so its contents can be resumed; otherwise (or if that
    /// fails) the file is created or truncated.
    pub fn open(path: &Path, overwrite: bool) -> io::Result<Self> {
        let existing = if overwrite {
            None
        } else {
            File::options().read(true).write(true).open(path).ok()
        };
        let file = match existing {
            Some(f) => f,
            None => File::options()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?,
        };
        let mut dest = Destination {
            path: path.to_path_buf(),
            file,
            prior_bytes: 0,
        };
        dest.seek_to_end()?;
        Ok(dest)
    }

    /// Moves the write position to the current end of file and records it as
    /// the resume offset. Always queries the file, never a cached size.
    pub fn seek_to_end(&mut self) -> io::Result<u64> {
        let end = self.file.seek(SeekFrom::End(0))?;
        self.prior_bytes = end;
        Ok(end)
    }

    /// A duplicate handle sharing the write position, handed to the engine.
    pub fn sink(&self) -> io::Result<File> {
        self.file.try_clone()
    }

    pub fn prior_bytes(&self) -> u64 {
        self.prior_bytes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One managed transfer.
#[derive(Debug)]
pub struct DownloadRecord {
    id: RecordId,
    locator: Locator,
    name: String,
    pub(crate) destination: Destination,
    pub(crate) state: TransferState,
    pub(crate) registered: bool,
    pub(crate) speed_cap: u64,
    pub(crate) referer: Option<String>,
    pub(crate) stats: TransferStats,
    pub(crate) started_at: Option<Instant>,
    pub(crate) ended_at: Option<Instant>,
    pub(crate) info: TransferInfo,
    pub(crate) error: Option<String>,
}

impl DownloadRecord {
    pub(crate) fn new(
        id: RecordId,
        locator: Locator,
        name: String,
        destination: Destination,
        speed_cap: u64,
        referer: Option<String>,
    ) -> Self {
        Self {
            id,
            locator,
            name,
            destination,
            state: TransferState::Paused,
            registered: false,
            speed_cap,
            referer,
            stats: TransferStats::default(),
            started_at: None,
            ended_at: None,
            info: TransferInfo::default(),
            error: None,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Destination file name as shown and searched.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// True while the engine holds a transfer handle for this record.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn speed_cap(&self) -> u64 {
        self.speed_cap
    }

    pub fn referer(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    pub fn prior_bytes(&self) -> u64 {
        self.destination.prior_bytes()
    }

    pub fn destination_path(&self) -> &Path {
        self.destination.path()
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    pub fn info(&self) -> &TransferInfo {
        &self.info
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Time spent in the current or last session.
    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.started_at {
            Some(start) => self
                .ended_at
                .unwrap_or(now)
                .saturating_duration_since(start),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn open_new_file_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let dest = Destination::open(&dir.path().join("a.bin"), false).unwrap();
        assert_eq!(dest.prior_bytes(), 0);
        assert!(dir.path().join("a.bin").exists());
    }

    #[test]
    fn open_existing_keeps_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, vec![7u8; 300]).unwrap();
        let dest = Destination::open(&path, false).unwrap();
        assert_eq!(dest.prior_bytes(), 300);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 300);
    }

    #[test]
    fn overwrite_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, vec![7u8; 300]).unwrap();
        let dest = Destination::open(&path, true).unwrap();
        assert_eq!(dest.prior_bytes(), 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn seek_to_end_requeries_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, vec![1u8; 100]).unwrap();
        let mut dest = Destination::open(&path, false).unwrap();
        assert_eq!(dest.prior_bytes(), 100);

        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(40)
            .unwrap();
        assert_eq!(dest.seek_to_end().unwrap(), 40);
        assert_eq!(dest.prior_bytes(), 40);

        let mut sink = dest.sink().unwrap();
        sink.write_all(b"xyz").unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 43);
    }

    #[test]
    fn open_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Destination::open(&dir.path().join("nope/a.bin"), false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
