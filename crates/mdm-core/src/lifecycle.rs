//! Lifecycle state machine: which triggers are legal in which state, and
//! the side effects of a record entering or leaving the engine.
//!
//! A record holds an engine registration exactly while it is Active. Every
//! registration re-reads the destination size for the resume offset.

use std::time::Instant;

use crate::engine::{Completion, EngineError, Outcome, TransferEngine, TransferRequest};
use crate::record::{DownloadRecord, TransferState};

/// Something that asks a record to change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Resume,
    Pause,
    Halt,
    Unhalt,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Resume => "resume",
            Trigger::Pause => "pause",
            Trigger::Halt => "halt",
            Trigger::Unhalt => "unhalt",
        }
    }
}

/// Target state of `trigger` applied in `from`, or `None` if not allowed.
pub fn next_state(from: TransferState, trigger: Trigger) -> Option<TransferState> {
    use TransferState::*;
    match (from, trigger) {
        (Paused | Failed, Trigger::Resume) => Some(Active),
        (Active, Trigger::Pause) => Some(Paused),
        (Active | Paused | Finished | Failed, Trigger::Halt) => Some(Inactive),
        // Unhalt goes back through Paused straight into the engine.
        (Inactive, Trigger::Unhalt) => Some(Active),
        _ => None,
    }
}

/// Registers `record` with the engine and makes it Active. On failure the
/// record is left Paused and unregistered.
pub(crate) fn activate<E: TransferEngine>(
    record: &mut DownloadRecord,
    engine: &mut E,
    now: Instant,
) -> Result<(), EngineError> {
    if record.registered {
        return Ok(());
    }
    record.state = TransferState::Paused;
    let resume_from = record.destination.seek_to_end()?;
    let request = TransferRequest {
        id: record.id(),
        url: record.locator().escaped().to_string(),
        resume_from,
        speed_cap: record.speed_cap,
        referer: record.referer.clone(),
        sink: record.destination.sink()?,
    };
    engine.register(request)?;

    record.registered = true;
    record.state = TransferState::Active;
    record.stats.begin_session(now);
    record.started_at = Some(now);
    record.ended_at = None;
    record.error = None;
    tracing::debug!(id = %record.id(), resume_from, "download active");
    Ok(())
}

/// Removes `record` from the engine (if registered) and moves it to `to`.
/// The state change always happens; a deregistration error is returned for
/// the caller to report.
pub(crate) fn deactivate<E: TransferEngine>(
    record: &mut DownloadRecord,
    engine: &mut E,
    to: TransferState,
    now: Instant,
) -> Result<(), EngineError> {
    let mut result = Ok(());
    if record.registered {
        record.registered = false;
        record.ended_at = Some(now);
        match engine.deregister(record.id()) {
            Ok(info) => record.info = info,
            Err(e) => result = Err(e),
        }
    }
    record.state = to;
    result
}

/// Re-registers an Active record so changed options (cap, referer) apply.
pub(crate) fn reregister<E: TransferEngine>(
    record: &mut DownloadRecord,
    engine: &mut E,
    now: Instant,
) -> Result<(), EngineError> {
    if !record.registered {
        return Ok(());
    }
    let dropped = deactivate(record, engine, TransferState::Paused, now);
    activate(record, engine, now)?;
    dropped
}

/// Applies an engine completion. The engine has already released the handle.
pub(crate) fn complete(record: &mut DownloadRecord, completion: Completion, now: Instant) {
    record.registered = false;
    record.ended_at = Some(now);
    record.info = completion.info;
    match completion.outcome {
        Outcome::Success => {
            record.state = TransferState::Finished;
            record.stats.mark_finished();
            record.error = None;
        }
        Outcome::Failed(reason) => {
            record.state = TransferState::Failed;
            record.error = Some(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransferState::*;

    #[test]
    fn transition_table() {
        assert_eq!(next_state(Paused, Trigger::Resume), Some(Active));
        assert_eq!(next_state(Failed, Trigger::Resume), Some(Active));
        assert_eq!(next_state(Active, Trigger::Resume), None);
        assert_eq!(next_state(Finished, Trigger::Resume), None);
        assert_eq!(next_state(Inactive, Trigger::Resume), None);

        assert_eq!(next_state(Active, Trigger::Pause), Some(Paused));
        assert_eq!(next_state(Paused, Trigger::Pause), None);

        for from in [Active, Paused, Finished, Failed] {
            assert_eq!(next_state(from, Trigger::Halt), Some(Inactive));
        }
        assert_eq!(next_state(Inactive, Trigger::Halt), None);

        assert_eq!(next_state(Inactive, Trigger::Unhalt), Some(Active));
        assert_eq!(next_state(Paused, Trigger::Unhalt), None);
    }
}
