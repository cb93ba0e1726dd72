//! In-memory engine for manager tests: records what was registered and
//! replays progress and completions queued by the test.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use crate::engine::{
    Completion, DriveReport, DriveTarget, EngineError, Outcome, Protocol, TransferEngine,
    TransferInfo, TransferRequest,
};
use crate::record::RecordId;
use crate::stats::ProgressSample;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Registration {
    pub url: String,
    pub resume_from: u64,
    pub speed_cap: u64,
    pub referer: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedEngine {
    registered: HashMap<RecordId, Registration>,
    /// Every successful register call, in order.
    pub history: Vec<(RecordId, Registration)>,
    pub deregistered: Vec<RecordId>,
    pending: DriveReport,
    pub fail_register: bool,
}

impl ScriptedEngine {
    pub fn is_registered(&self, id: RecordId) -> bool {
        self.registered.contains_key(&id)
    }

    pub fn registration(&self, id: RecordId) -> Option<&Registration> {
        self.registered.get(&id)
    }

    pub fn progress(&mut self, id: RecordId, dl_total: u64, dl_now: u64) {
        self.pending.progress.push((
            id,
            ProgressSample {
                dl_total,
                dl_now,
                ..ProgressSample::default()
            },
        ));
    }

    /// Completes a registered transfer; the handle leaves the engine as the
    /// real one does after a completion message.
    pub fn complete(&mut self, id: RecordId, outcome: Outcome) {
        let info = self
            .registered
            .remove(&id)
            .map(|r| info_for(&r))
            .unwrap_or_default();
        self.pending.completions.push(Completion { id, outcome, info });
    }
}

fn info_for(r: &Registration) -> TransferInfo {
    TransferInfo {
        effective_url: Some(r.url.clone()),
        response_code: Some(200),
        protocol: Protocol::from_url(&r.url),
        ..TransferInfo::default()
    }
}

impl TransferEngine for ScriptedEngine {
    fn register(&mut self, request: TransferRequest) -> Result<(), EngineError> {
        if self.fail_register {
            return Err(EngineError::Io(io::Error::new(
                io::ErrorKind::Other,
                "scripted register failure",
            )));
        }
        let reg = Registration {
            url: request.url,
            resume_from: request.resume_from,
            speed_cap: request.speed_cap,
            referer: request.referer,
        };
        self.history.push((request.id, reg.clone()));
        self.registered.insert(request.id, reg);
        Ok(())
    }

    fn deregister(&mut self, id: RecordId) -> Result<TransferInfo, EngineError> {
        let reg = self
            .registered
            .remove(&id)
            .ok_or(EngineError::UnknownRecord(id))?;
        self.deregistered.push(id);
        Ok(info_for(&reg))
    }

    fn drive(&mut self, _target: DriveTarget) -> Result<DriveReport, EngineError> {
        let mut report = std::mem::take(&mut self.pending);
        report.in_flight = self.registered.len();
        Ok(report)
    }

    fn info(&self, id: RecordId) -> Option<TransferInfo> {
        self.registered.get(&id).map(|r| TransferInfo {
            bytes_transferred: 42,
            ..info_for(r)
        })
    }

    fn in_flight(&self) -> usize {
        self.registered.len()
    }

    fn wait(&mut self, _max: Option<Duration>) -> Result<Vec<DriveTarget>, EngineError> {
        if self.pending.progress.is_empty() && self.pending.completions.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![DriveTarget::Timeout])
        }
    }
}
