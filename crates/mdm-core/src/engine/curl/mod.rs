//! Curl multi engine: every transfer is an Easy2 handle on one multi handle,
//! driven with `curl_multi_socket_action` from reactor readiness.
//!
//! The multi handle, reactor, and handles all live on the engine thread.

mod bridge;
mod handler;

use std::collections::HashMap;
use std::time::Duration;

use curl::easy::Easy2;
use curl::multi::{Easy2Handle, Events, Multi};

use crate::reactor::{Reactor, Readiness, Waker};
use crate::record::RecordId;

use self::bridge::SocketBridge;
pub use self::handler::TransferHandler;

use super::{
    Completion, DriveReport, DriveTarget, EngineError, Outcome, Protocol, TransferEngine,
    TransferInfo, TransferRequest,
};

/// Zero-delay timer requests served inside a single drive before yielding.
const MAX_IMMEDIATE_ROUNDS: usize = 16;

/// Connection limits applied once to the multi handle (0 = unlimited).
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionLimits {
    pub max_total: usize,
    pub max_per_host: usize,
}

struct Transfer {
    handle: Easy2Handle<TransferHandler>,
    url: String,
    resume_from: u64,
}

pub struct CurlEngine {
    multi: Multi,
    bridge: SocketBridge,
    reactor: Reactor,
    transfers: HashMap<RecordId, Transfer>,
    running: usize,
}

impl CurlEngine {
    pub fn new(limits: ConnectionLimits) -> Result<Self, EngineError> {
        let mut multi = Multi::new();
        if limits.max_total > 0 {
            multi.set_max_total_connections(limits.max_total)?;
        }
        if limits.max_per_host > 0 {
            multi.set_max_host_connections(limits.max_per_host)?;
        }
        let bridge = SocketBridge::install(&mut multi)?;
        let reactor = Reactor::new()?;
        tracing::debug!(
            max_total = limits.max_total,
            max_per_host = limits.max_per_host,
            "curl multi engine ready"
        );
        Ok(Self {
            multi,
            bridge,
            reactor,
            transfers: HashMap::new(),
            running: 0,
        })
    }

    pub fn waker(&self) -> Waker {
        self.reactor.waker()
    }

    /// Sockets currently watched on curl's behalf.
    pub fn watched_sockets(&self) -> usize {
        self.bridge.watched()
    }

    fn easy_for(
        request: &TransferRequest,
        sink: std::fs::File,
    ) -> Result<Easy2<TransferHandler>, curl::Error> {
        let mut easy = Easy2::new(TransferHandler::new(sink));
        easy.url(&request.url)?;
        easy.follow_location(true)?;
        // Error responses end the transfer before their body is delivered.
        easy.fail_on_error(true)?;
        easy.autoreferer(true)?;
        easy.progress(true)?;
        if request.speed_cap > 0 {
            easy.max_recv_speed(request.speed_cap)?;
        }
        if let Some(referer) = &request.referer {
            easy.referer(referer)?;
        }
        if request.resume_from > 0 {
            easy.resume_from(request.resume_from)?;
        }
        Ok(easy)
    }

    fn act(&mut self, target: DriveTarget) -> Result<u32, EngineError> {
        let running = match target {
            DriveTarget::Socket {
                socket,
                readable,
                writable,
                error,
            } => {
                let mut events = Events::new();
                events.input(readable).output(writable).error(error);
                self.multi.action(socket, &events)?
            }
            DriveTarget::Timeout => self.multi.timeout()?,
        };
        Ok(running)
    }

    fn drain_messages(&mut self, report: &mut DriveReport) {
        let mut done: Vec<(RecordId, Result<(), curl::Error>)> = Vec::new();
        let transfers = &self.transfers;
        self.multi.messages(|msg| {
            let id = match msg.token() {
                Ok(token) => RecordId::new(token as u64),
                Err(_) => return,
            };
            if let Some(t) = transfers.get(&id) {
                if let Some(result) = msg.result_for2(&t.handle) {
                    done.push((id, result));
                }
            }
        });

        for (id, result) in done {
            let Some(t) = self.transfers.remove(&id) else {
                continue;
            };
            let resume_from = t.resume_from;
            let url = t.url.clone();
            match self.multi.remove2(t.handle) {
                Ok(mut easy) => {
                    let write_error = easy.get_mut().take_write_error();
                    let info = collect_info(&mut easy, &url);
                    let outcome = classify(result, write_error, info.response_code, resume_from);
                    report.completions.push(Completion { id, outcome, info });
                }
                Err(e) => {
                    tracing::warn!(%id, "curl multi remove after completion: {}", e);
                    report.completions.push(Completion {
                        id,
                        outcome: Outcome::Failed(e.to_string()),
                        info: TransferInfo::default(),
                    });
                }
            }
        }
    }
}

/// Gathers what the library knows about a transfer that left the multi handle.
fn collect_info(easy: &mut Easy2<TransferHandler>, requested_url: &str) -> TransferInfo {
    let mut info = easy.get_ref().header_info();
    if let Ok(code) = easy.response_code() {
        if code != 0 {
            info.response_code = Some(code);
        }
    }
    let effective = easy
        .effective_url()
        .ok()
        .flatten()
        .map(str::to_string)
        .unwrap_or_else(|| requested_url.to_string());
    info.protocol = Protocol::from_url(&effective);
    info.effective_url = Some(effective);
    if let Ok(Some(content_type)) = easy.content_type() {
        info.content_type = Some(content_type.to_string());
    }
    if let Ok(Some(ip)) = easy.primary_ip() {
        if !ip.is_empty() {
            info.primary_ip = Some(ip.to_string());
        }
    }
    if let Ok(port) = easy.primary_port() {
        if port != 0 {
            info.primary_port = Some(port);
        }
    }
    info
}

/// Success, unless curl failed, the disk write failed, or the final response
/// is an error. A 416 on a resumed transfer means the file was already complete.
fn classify(
    result: Result<(), curl::Error>,
    write_error: Option<std::io::Error>,
    response_code: Option<u32>,
    resume_from: u64,
) -> Outcome {
    if let Some(e) = write_error {
        return Outcome::Failed(format!("write to destination: {}", e));
    }
    match response_code {
        Some(416) if resume_from > 0 => Outcome::Success,
        Some(code) if code >= 400 => Outcome::Failed(format!("HTTP {}", code)),
        _ => match result {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::Failed(e.to_string()),
        },
    }
}

impl TransferEngine for CurlEngine {
    fn register(&mut self, request: TransferRequest) -> Result<(), EngineError> {
        if self.transfers.contains_key(&request.id) {
            self.deregister(request.id)?;
        }
        let sink = request.sink.try_clone()?;
        let easy = Self::easy_for(&request, sink)?;
        let mut handle = self.multi.add2(easy)?;
        handle.set_token(request.id.get() as usize)?;
        tracing::debug!(
            id = %request.id,
            url = %request.url,
            resume_from = request.resume_from,
            speed_cap = request.speed_cap,
            "transfer registered"
        );
        self.transfers.insert(
            request.id,
            Transfer {
                handle,
                url: request.url,
                resume_from: request.resume_from,
            },
        );
        // add2 asks for an immediate timeout; it is served on the next wait.
        self.bridge.apply(&mut self.reactor);
        Ok(())
    }

    fn deregister(&mut self, id: RecordId) -> Result<TransferInfo, EngineError> {
        let t = self
            .transfers
            .remove(&id)
            .ok_or(EngineError::UnknownRecord(id))?;
        let mut easy = self.multi.remove2(t.handle)?;
        let info = collect_info(&mut easy, &t.url);
        self.bridge.apply(&mut self.reactor);
        if self.transfers.is_empty() {
            self.running = 0;
            self.reactor.disarm_timer();
        }
        tracing::debug!(%id, "transfer deregistered");
        Ok(info)
    }

    fn drive(&mut self, target: DriveTarget) -> Result<DriveReport, EngineError> {
        let mut running = self.act(target)?;
        let mut rounds = 0;
        while self.bridge.apply(&mut self.reactor) && rounds < MAX_IMMEDIATE_ROUNDS {
            self.reactor.disarm_timer();
            running = self.multi.timeout()?;
            rounds += 1;
        }
        self.running = running as usize;

        let mut report = DriveReport::default();
        for (id, t) in self.transfers.iter_mut() {
            if let Some(sample) = t.handle.get_mut().take_sample() {
                report.progress.push((*id, sample));
            }
        }
        self.drain_messages(&mut report);

        if self.running == 0 {
            self.reactor.disarm_timer();
        }
        report.in_flight = self.running;
        Ok(report)
    }

    fn info(&self, id: RecordId) -> Option<TransferInfo> {
        let t = self.transfers.get(&id)?;
        let mut info = t.handle.get_ref().header_info();
        info.protocol = Protocol::from_url(&t.url);
        info.effective_url = Some(t.url.clone());
        Some(info)
    }

    fn in_flight(&self) -> usize {
        self.running
    }

    fn wait(&mut self, max: Option<Duration>) -> Result<Vec<DriveTarget>, EngineError> {
        let events = self.reactor.wait(max)?;
        Ok(events
            .into_iter()
            .filter_map(|event| match event {
                Readiness::Socket {
                    fd,
                    readable,
                    writable,
                    error,
                    ..
                } => Some(DriveTarget::Socket {
                    socket: fd,
                    readable,
                    writable,
                    error,
                }),
                Readiness::Timer => Some(DriveTarget::Timeout),
                Readiness::Wake => None,
            })
            .collect())
    }
}
