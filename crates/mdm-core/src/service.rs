//! Engine service: the thread that owns the download manager and the
//! transfer engine, and the handle the input side talks to it through.
//!
//! All mutation happens on the engine thread. Requests arrive over an mpsc
//! channel with a reply sender; after every send the handle wakes the
//! reactor so a blocked poll returns and the request is applied before
//! the next drive.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::engine::curl::ConnectionLimits;
use crate::engine::{CurlEngine, EngineError, TransferEngine};
use crate::error::{CommandError, ServiceError};
use crate::manager::{Command, DetailView, DownloadManager, LogEntry, ManagerSettings, Snapshot};
use crate::reactor::Waker;

/// Requests the engine thread serves.
pub enum Request {
    Command {
        command: Command,
        reply: Sender<Result<(), CommandError>>,
    },
    Snapshot {
        reply: Sender<Snapshot>,
    },
    Detail {
        reply: Sender<Option<DetailView>>,
    },
    EventLog {
        reply: Sender<Vec<LogEntry>>,
    },
    Shutdown,
}

/// Cloneable handle used by the input side.
#[derive(Clone)]
pub struct ServiceHandle {
    tx: Sender<Request>,
    waker: Waker,
}

impl ServiceHandle {
    fn send(&self, request: Request) -> Result<(), ServiceError> {
        self.tx.send(request).map_err(|_| ServiceError::Stopped)?;
        self.waker.wake();
        Ok(())
    }

    fn ask<T>(&self, make: impl FnOnce(Sender<T>) -> Request) -> Result<T, ServiceError> {
        let (reply, rx) = mpsc::channel();
        self.send(make(reply))?;
        rx.recv().map_err(|_| ServiceError::Stopped)
    }

    pub fn command(&self, command: Command) -> Result<(), CommandError> {
        self.ask(|reply| Request::Command { command, reply })?
    }

    pub fn snapshot(&self) -> Result<Snapshot, ServiceError> {
        self.ask(|reply| Request::Snapshot { reply })
    }

    pub fn detail(&self) -> Result<Option<DetailView>, ServiceError> {
        self.ask(|reply| Request::Detail { reply })
    }

    pub fn event_log(&self) -> Result<Vec<LogEntry>, ServiceError> {
        self.ask(|reply| Request::EventLog { reply })
    }

    /// Asks the engine thread to release every record and stop.
    pub fn shutdown(&self) {
        if self.send(Request::Shutdown).is_err() {
            tracing::debug!("engine thread already stopped");
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub limits: ConnectionLimits,
    pub settings: ManagerSettings,
    /// Longest reactor wait while anything is downloading.
    pub poll_interval: Duration,
}

/// A running engine thread.
pub struct Service {
    handle: ServiceHandle,
    thread: JoinHandle<()>,
}

impl Service {
    pub fn handle(&self) -> ServiceHandle {
        self.handle.clone()
    }

    /// True once the engine thread has stopped (shutdown or auto-exit).
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the engine thread to release everything and exit.
    pub fn join(self) -> Result<(), ServiceError> {
        self.thread.join().map_err(|_| ServiceError::Stopped)
    }
}

/// Starts the engine thread with the curl multi engine.
pub fn spawn(options: ServiceOptions) -> Result<Service, ServiceError> {
    let limits = options.limits;
    spawn_with(
        move || {
            let engine = CurlEngine::new(limits)?;
            let waker = engine.waker();
            Ok((engine, waker))
        },
        options.settings,
        options.poll_interval,
    )
}

/// Starts the engine thread with an engine built on that thread by `factory`.
/// Setup failures are reported before this returns.
pub fn spawn_with<E, F>(
    factory: F,
    settings: ManagerSettings,
    poll_interval: Duration,
) -> Result<Service, ServiceError>
where
    E: TransferEngine,
    F: FnOnce() -> Result<(E, Waker), EngineError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let (ready_tx, ready_rx) = mpsc::sync_channel(1);

    let thread = thread::Builder::new()
        .name("mdm-engine".to_string())
        .spawn(move || {
            let (engine, waker) = match factory() {
                Ok(pair) => pair,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if ready_tx.send(Ok(waker)).is_err() {
                return;
            }
            let manager = DownloadManager::new(engine, settings, Instant::now());
            run(manager, rx, poll_interval);
        })
        .map_err(|e| ServiceError::Setup(EngineError::Io(e)))?;

    let waker = match ready_rx.recv() {
        Ok(Ok(waker)) => waker,
        Ok(Err(e)) => {
            let _ = thread.join();
            return Err(ServiceError::Setup(e));
        }
        Err(_) => {
            let _ = thread.join();
            return Err(ServiceError::Stopped);
        }
    };
    tracing::debug!("engine thread started");
    Ok(Service {
        handle: ServiceHandle { tx, waker },
        thread,
    })
}

fn run<E: TransferEngine>(
    mut manager: DownloadManager<E>,
    rx: Receiver<Request>,
    poll_interval: Duration,
) {
    'serve: loop {
        loop {
            match rx.try_recv() {
                Ok(Request::Shutdown) => break 'serve,
                Ok(request) => serve(&mut manager, request),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'serve,
            }
        }
        if manager.exit_requested() {
            tracing::info!("every download completed, stopping");
            break;
        }

        let max = manager.has_active().then_some(poll_interval);
        match manager.engine_mut().wait(max) {
            Ok(targets) => {
                for target in targets {
                    manager.drive(target, Instant::now());
                }
            }
            Err(e) => {
                tracing::warn!("reactor wait failed: {}", e);
                thread::sleep(poll_interval);
            }
        }
    }
    manager.shutdown(Instant::now());
    tracing::debug!("engine thread stopped");
}

fn serve<E: TransferEngine>(manager: &mut DownloadManager<E>, request: Request) {
    let now = Instant::now();
    // A dropped reply receiver only means the caller gave up waiting.
    match request {
        Request::Command { command, reply } => {
            let _ = reply.send(manager.apply(command, now));
        }
        Request::Snapshot { reply } => {
            let _ = reply.send(manager.snapshot(now));
        }
        Request::Detail { reply } => {
            let _ = reply.send(manager.detail(now));
        }
        Request::EventLog { reply } => {
            let _ = reply.send(manager.events().entries().cloned().collect());
        }
        Request::Shutdown => {}
    }
}
