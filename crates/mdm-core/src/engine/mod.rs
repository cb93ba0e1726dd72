//! Transfer engine seam.
//!
//! The lifecycle code registers and deregisters records through
//! [`TransferEngine`]; the service loop drives it whenever a watched socket
//! becomes ready or the engine timer fires. Each drive reports progress
//! samples and completions keyed by [`RecordId`], so no back-pointer into
//! library state is needed.

pub mod curl;

use std::fs::File;
use std::time::Duration;

use thiserror::Error;

use crate::record::RecordId;
use crate::stats::ProgressSample;

pub use self::curl::CurlEngine;

/// Everything the engine needs to start (or restart) one transfer.
#[derive(Debug)]
pub struct TransferRequest {
    pub id: RecordId,
    /// Escaped locator.
    pub url: String,
    /// Bytes already on disk; the transfer resumes from here.
    pub resume_from: u64,
    /// Receive cap in bytes per second (0 = unlimited).
    pub speed_cap: u64,
    pub referer: Option<String>,
    /// Destination handle positioned at `resume_from`.
    pub sink: File,
}

/// What woke the engine up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveTarget {
    Socket {
        socket: RawSocket,
        readable: bool,
        writable: bool,
        /// The socket reported an error condition.
        error: bool,
    },
    /// The engine timer fired (or a zero-delay timeout was requested).
    Timeout,
}

#[cfg(unix)]
pub type RawSocket = std::os::unix::io::RawFd;

/// How a transfer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed(String),
}

/// A completion message for one record.
#[derive(Debug, Clone)]
pub struct Completion {
    pub id: RecordId,
    pub outcome: Outcome,
    pub info: TransferInfo,
}

/// Result of one drive: per-record progress, completions, transfers still in flight.
#[derive(Debug, Default)]
pub struct DriveReport {
    pub progress: Vec<(RecordId, ProgressSample)>,
    pub completions: Vec<Completion>,
    pub in_flight: usize,
}

/// Protocol family of a transfer, derived from the effective locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    Http,
    Https,
    Ftp,
    Ftps,
    Scp,
    Sftp,
    File,
    Tftp,
    Telnet,
    #[default]
    Unknown,
}

impl Protocol {
    pub fn from_url(url: &str) -> Self {
        let scheme = match url.split_once("://") {
            Some((scheme, _)) => scheme.to_ascii_lowercase(),
            None => return Protocol::Unknown,
        };
        match scheme.as_str() {
            "http" => Protocol::Http,
            "https" => Protocol::Https,
            "ftp" => Protocol::Ftp,
            "ftps" => Protocol::Ftps,
            "scp" => Protocol::Scp,
            "sftp" => Protocol::Sftp,
            "file" => Protocol::File,
            "tftp" => Protocol::Tftp,
            "telnet" => Protocol::Telnet,
            _ => Protocol::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
            Protocol::Ftp => "FTP",
            Protocol::Ftps => "FTPS",
            Protocol::Scp => "SCP",
            Protocol::Sftp => "SFTP",
            Protocol::File => "FILE",
            Protocol::Tftp => "TFTP",
            Protocol::Telnet => "TELNET",
            Protocol::Unknown => "unknown",
        }
    }
}

/// Library-side details of a transfer, for the detail view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferInfo {
    /// Locator after redirects.
    pub effective_url: Option<String>,
    pub response_code: Option<u32>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    /// Bytes received this session.
    pub bytes_transferred: u64,
    pub primary_ip: Option<String>,
    pub primary_port: Option<u16>,
    pub protocol: Protocol,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("curl: {0}")]
    Curl(#[from] ::curl::Error),
    #[error("curl multi: {0}")]
    Multi(#[from] ::curl::MultiError),
    #[error("reactor: {0}")]
    Io(#[from] std::io::Error),
    #[error("no transfer registered for {0}")]
    UnknownRecord(RecordId),
}

/// The multiplexing transfer library, as seen by the lifecycle code.
pub trait TransferEngine {
    /// Adds a transfer to the multiplexed set.
    fn register(&mut self, request: TransferRequest) -> Result<(), EngineError>;

    /// Removes a transfer; returns what the library knew about it.
    fn deregister(&mut self, id: RecordId) -> Result<TransferInfo, EngineError>;

    /// Advances the library for one stimulus and drains all completions.
    fn drive(&mut self, target: DriveTarget) -> Result<DriveReport, EngineError>;

    /// Live details of a registered transfer.
    fn info(&self, id: RecordId) -> Option<TransferInfo>;

    /// Number of transfers the library reported as still running.
    fn in_flight(&self) -> usize;

    /// Blocks until the next stimuli (bounded by `max`, forever when `None`).
    fn wait(&mut self, max: Option<Duration>) -> Result<Vec<DriveTarget>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_from_scheme() {
        assert_eq!(Protocol::from_url("http://h/a"), Protocol::Http);
        assert_eq!(Protocol::from_url("HTTPS://h/a"), Protocol::Https);
        assert_eq!(Protocol::from_url("sftp://h/a"), Protocol::Sftp);
        assert_eq!(Protocol::from_url("gopher://h/a"), Protocol::Unknown);
        assert_eq!(Protocol::from_url("nonsense"), Protocol::Unknown);
        assert_eq!(Protocol::Ftps.as_str(), "FTPS");
    }
}
