//! Easy2 Handler for one transfer in the curl multi engine.
//! Appends body bytes to the destination and records the latest progress
//! counters and response headers for the statistics and detail views.
//! The body of an error response (status 400 and up) never reaches the file.

use std::fs::File;
use std::io::{self, Write};
use std::str;

use crate::engine::TransferInfo;
use crate::stats::ProgressSample;

/// Handler state for one transfer. Implements curl's Handler for Easy2.
pub struct TransferHandler {
    sink: File,
    response_headers: Vec<String>,
    bytes_written: u64,
    sample: Option<ProgressSample>,
    write_error: Option<io::Error>,
}

impl TransferHandler {
    pub(super) fn new(sink: File) -> Self {
        Self {
            sink,
            response_headers: Vec::new(),
            bytes_written: 0,
            sample: None,
            write_error: None,
        }
    }

    /// Latest progress counters not yet handed to the estimator.
    pub(super) fn take_sample(&mut self) -> Option<ProgressSample> {
        self.sample.take()
    }

    pub(super) fn take_write_error(&mut self) -> Option<io::Error> {
        self.write_error.take()
    }

    /// Status code of the last response header block (the final hop after redirects).
    pub(super) fn status_code(&self) -> Option<u32> {
        let line = self.response_headers.first()?;
        if !line.starts_with("HTTP/") {
            return None;
        }
        line.split_whitespace().nth(1)?.parse().ok()
    }

    fn header_value(&self, name: &str) -> Option<&str> {
        self.response_headers.iter().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            if k.trim().eq_ignore_ascii_case(name) {
                Some(v.trim())
            } else {
                None
            }
        })
    }

    /// Details known from the headers seen so far.
    pub(super) fn header_info(&self) -> TransferInfo {
        TransferInfo {
            response_code: self.status_code(),
            content_type: self.header_value("content-type").map(str::to_string),
            content_length: self
                .header_value("content-length")
                .and_then(|v| v.parse().ok()),
            bytes_transferred: self.bytes_written,
            ..TransferInfo::default()
        }
    }
}

impl curl::easy::Handler for TransferHandler {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            if line.starts_with("HTTP/") {
                self.response_headers.clear();
            }
            if !line.is_empty() {
                self.response_headers.push(line.to_string());
            }
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, curl::easy::WriteError> {
        if matches!(self.status_code(), Some(code) if code >= 400) {
            return Ok(data.len());
        }
        match self.sink.write_all(data) {
            Ok(()) => {
                self.bytes_written += data.len() as u64;
                Ok(data.len())
            }
            Err(e) => {
                // Short count makes curl abort the transfer with a write error.
                self.write_error = Some(e);
                Ok(0)
            }
        }
    }

    fn progress(&mut self, dltotal: f64, dlnow: f64, ultotal: f64, ulnow: f64) -> bool {
        self.sample = Some(ProgressSample {
            dl_total: dltotal as u64,
            dl_now: dlnow as u64,
            ul_total: ultotal as u64,
            ul_now: ulnow as u64,
        });
        true
    }
}
