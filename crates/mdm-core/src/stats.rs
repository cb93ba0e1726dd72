//! Live transfer statistics (percent, rate, ETA) from library byte counters.
//!
//! The transfer library only sees the current session, so a resumed transfer
//! reports the remaining size as its total. `prior_bytes` (the file size at
//! registration) is added back to both sides of the percent calculation.
//! Rate is the cumulative session average: bytes this session / elapsed.

use std::fmt;
use std::time::{Duration, Instant};

/// Byte counters reported by the transfer library for the current session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSample {
    pub dl_total: u64,
    pub dl_now: u64,
    pub ul_total: u64,
    pub ul_now: u64,
}

/// Time remaining, or unknown while nothing has been received yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eta {
    Unknown,
    Remaining(Duration),
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eta::Unknown => write!(f, "?"),
            Eta::Remaining(d) => write!(f, "{}s", d.as_secs()),
        }
    }
}

/// Result of one estimator run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub progress: f64,
    pub upload_progress: f64,
    pub bytes_per_sec: f64,
    pub eta: Eta,
}

/// Computes the statistics for `sample`, `elapsed` after the session started.
pub fn estimate(sample: &ProgressSample, prior_bytes: u64, elapsed: Duration) -> Estimate {
    let progress = if sample.dl_total > 0 {
        let done = sample.dl_now.saturating_add(prior_bytes);
        let total = sample.dl_total.saturating_add(prior_bytes);
        100.0 * done as f64 / total as f64
    } else {
        0.0
    };

    let upload_progress = if sample.ul_total > 0 {
        100.0 * sample.ul_now as f64 / sample.ul_total as f64
    } else {
        0.0
    };

    let secs = elapsed.as_secs_f64();
    let bytes_per_sec = if secs > 0.0 {
        sample.dl_now as f64 / secs
    } else {
        0.0
    };

    let eta = if bytes_per_sec > 0.0 {
        let remaining = sample.dl_total.saturating_sub(sample.dl_now);
        // The total comes from the server; an absurd one saturates.
        let secs = remaining as f64 / bytes_per_sec;
        Eta::Remaining(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
    } else {
        Eta::Unknown
    };

    Estimate {
        progress: progress.min(100.0),
        upload_progress: upload_progress.min(100.0),
        bytes_per_sec,
        eta,
    }
}

/// Per-record statistics as shown to the user.
#[derive(Debug, Clone)]
pub struct TransferStats {
    pub progress: f64,
    pub upload_progress: f64,
    pub bytes_per_sec: f64,
    pub eta: Eta,
    /// Bytes received in the current (or last) session.
    pub session_bytes: u64,
    session_start: Option<Instant>,
}

impl Default for TransferStats {
    fn default() -> Self {
        Self {
            progress: 0.0,
            upload_progress: 0.0,
            bytes_per_sec: 0.0,
            eta: Eta::Unknown,
            session_bytes: 0,
            session_start: None,
        }
    }
}

impl TransferStats {
    /// Resets the counters for a new engine registration.
    pub fn begin_session(&mut self, now: Instant) {
        *self = TransferStats {
            session_start: Some(now),
            ..TransferStats::default()
        };
    }

    /// Applies a progress callback. Percent never moves backwards within a session.
    pub fn update(&mut self, sample: &ProgressSample, prior_bytes: u64, now: Instant) {
        let elapsed = self
            .session_start
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        let est = estimate(sample, prior_bytes, elapsed);
        self.progress = self.progress.max(est.progress);
        self.upload_progress = est.upload_progress;
        self.bytes_per_sec = est.bytes_per_sec;
        self.eta = est.eta;
        self.session_bytes = sample.dl_now;
    }

    pub fn mark_finished(&mut self) {
        self.progress = 100.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(dl_total: u64, dl_now: u64) -> ProgressSample {
        ProgressSample {
            dl_total,
            dl_now,
            ..ProgressSample::default()
        }
    }

    #[test]
    fn percent_of_fresh_transfer() {
        let est = estimate(&sample(1000, 500), 0, Duration::from_secs(5));
        assert!((est.progress - 50.0).abs() < 1e-9);
        assert!((est.bytes_per_sec - 100.0).abs() < 1e-9);
        assert_eq!(est.eta, Eta::Remaining(Duration::from_secs(5)));
    }

    #[test]
    fn percent_corrects_for_resumed_bytes() {
        // 600 bytes on disk, library reports the 400 remaining.
        let est = estimate(&sample(400, 100), 600, Duration::from_secs(1));
        assert!((est.progress - 70.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_total_is_zero_percent() {
        let est = estimate(&sample(0, 300), 50, Duration::from_secs(3));
        assert_eq!(est.progress, 0.0);
        assert!(est.bytes_per_sec > 0.0);
    }

    #[test]
    fn eta_unknown_exactly_when_rate_is_zero() {
        let no_time = estimate(&sample(1000, 500), 0, Duration::ZERO);
        assert_eq!(no_time.bytes_per_sec, 0.0);
        assert_eq!(no_time.eta, Eta::Unknown);

        let no_bytes = estimate(&sample(1000, 0), 0, Duration::from_secs(4));
        assert_eq!(no_bytes.bytes_per_sec, 0.0);
        assert_eq!(no_bytes.eta, Eta::Unknown);

        let moving = estimate(&sample(1000, 10), 0, Duration::from_secs(4));
        assert!(moving.bytes_per_sec > 0.0);
        assert!(matches!(moving.eta, Eta::Remaining(_)));
    }

    #[test]
    fn eta_never_negative_when_overshooting_total() {
        let est = estimate(&sample(100, 150), 0, Duration::from_secs(1));
        assert_eq!(est.eta, Eta::Remaining(Duration::ZERO));
    }

    #[test]
    fn huge_advertised_total_saturates_eta() {
        let est = estimate(&sample(i64::MAX as u64, 1), 0, Duration::from_secs(10));
        assert_eq!(est.eta, Eta::Remaining(Duration::MAX));
        assert!(est.progress < 1.0);

        let est = estimate(&sample(u64::MAX, 10), u64::MAX, Duration::from_secs(1));
        assert!(est.progress <= 100.0);
    }

    #[test]
    fn upload_percent() {
        let s = ProgressSample {
            ul_total: 200,
            ul_now: 50,
            ..ProgressSample::default()
        };
        assert!((estimate(&s, 0, Duration::from_secs(1)).upload_progress - 25.0).abs() < 1e-9);
    }

    #[test]
    fn progress_is_monotonic_within_session() {
        let start = Instant::now();
        let mut stats = TransferStats::default();
        stats.begin_session(start);
        stats.update(&sample(1000, 600), 0, start + Duration::from_secs(2));
        assert!((stats.progress - 60.0).abs() < 1e-9);
        // A redirect can restart the library counters; the display does not go back.
        stats.update(&sample(1000, 100), 0, start + Duration::from_secs(3));
        assert!((stats.progress - 60.0).abs() < 1e-9);
        assert_eq!(stats.session_bytes, 100);

        stats.mark_finished();
        assert_eq!(stats.progress, 100.0);

        stats.begin_session(start + Duration::from_secs(10));
        assert_eq!(stats.progress, 0.0);
        assert_eq!(stats.eta, Eta::Unknown);
    }

    #[test]
    fn eta_display() {
        assert_eq!(Eta::Unknown.to_string(), "?");
        assert_eq!(Eta::Remaining(Duration::from_millis(4200)).to_string(), "4s");
    }
}
