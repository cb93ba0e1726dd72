//! Socket-readiness bridge and timer driver.
//!
//! curl reports "watch this socket for read/write", "stop watching", and
//! "call me back in N ms" through callbacks on the multi handle. The
//! callbacks only record those requests; [`SocketBridge::apply`] replays
//! them onto the [`Reactor`] once curl has returned control, since the
//! multi handle may not be re-entered from its own callbacks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use curl::multi::{Multi, Socket, SocketEvents};
use curl::MultiError;

use crate::reactor::{Interest, Reactor};

/// A change to the reactor's socket table requested by curl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SocketChange {
    Watch {
        socket: Socket,
        interest: Interest,
        token: usize,
    },
    Unwatch {
        socket: Socket,
    },
}

/// The latest request for the single engine timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TimerRequest {
    Cancel,
    /// Drive right away, before waiting on the reactor again.
    Immediate,
    After(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SocketRegistration {
    interest: Interest,
    token: usize,
}

#[derive(Debug, Default)]
pub(super) struct BridgeState {
    sockets: HashMap<Socket, SocketRegistration>,
    changes: Vec<SocketChange>,
    timer: Option<TimerRequest>,
    next_token: usize,
}

impl BridgeState {
    /// Creates a registration, or recreates it when the interest changed.
    pub(super) fn watch(&mut self, socket: Socket, interest: Interest) {
        if let Some(existing) = self.sockets.get(&socket) {
            if existing.interest == interest {
                return;
            }
            self.changes.push(SocketChange::Unwatch { socket });
        }
        self.next_token += 1;
        let token = self.next_token;
        self.sockets
            .insert(socket, SocketRegistration { interest, token });
        self.changes.push(SocketChange::Watch {
            socket,
            interest,
            token,
        });
    }

    pub(super) fn unwatch(&mut self, socket: Socket) {
        if self.sockets.remove(&socket).is_some() {
            self.changes.push(SocketChange::Unwatch { socket });
        }
    }

    /// Records a timer request; a later request replaces an earlier one.
    pub(super) fn set_timer(&mut self, delay: Option<Duration>) {
        self.timer = Some(match delay {
            None => TimerRequest::Cancel,
            Some(d) if d.is_zero() => TimerRequest::Immediate,
            Some(d) => TimerRequest::After(d),
        });
    }

    pub(super) fn take_changes(&mut self) -> Vec<SocketChange> {
        std::mem::take(&mut self.changes)
    }

    pub(super) fn take_timer(&mut self) -> Option<TimerRequest> {
        self.timer.take()
    }

    pub(super) fn watched(&self) -> usize {
        self.sockets.len()
    }
}

/// Shared between the multi handle's callbacks and the engine.
pub(super) struct SocketBridge {
    state: Arc<Mutex<BridgeState>>,
}

fn lock(state: &Mutex<BridgeState>) -> MutexGuard<'_, BridgeState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SocketBridge {
    /// Installs the socket and timer callbacks on `multi`.
    pub(super) fn install(multi: &mut Multi) -> Result<Self, MultiError> {
        let state = Arc::new(Mutex::new(BridgeState::default()));

        let sockets = Arc::clone(&state);
        multi.socket_function(move |socket: Socket, events: SocketEvents, _token: usize| {
            let mut st = lock(&sockets);
            if events.remove() {
                st.unwatch(socket);
            } else {
                st.watch(
                    socket,
                    Interest {
                        readable: events.input(),
                        writable: events.output(),
                    },
                );
            }
        })?;

        let timer = Arc::clone(&state);
        multi.timer_function(move |delay: Option<Duration>| {
            lock(&timer).set_timer(delay);
            true
        })?;

        Ok(Self { state })
    }

    /// Replays pending socket and timer requests onto `reactor`. Returns true
    /// when curl asked to be driven immediately; the zero-delay timer is
    /// armed in that case so a caller that does not drive right away still
    /// gets woken.
    pub(super) fn apply(&self, reactor: &mut Reactor) -> bool {
        let (changes, timer) = {
            let mut st = lock(&self.state);
            (st.take_changes(), st.take_timer())
        };
        for change in changes {
            match change {
                SocketChange::Watch {
                    socket,
                    interest,
                    token,
                } => {
                    tracing::trace!(socket, ?interest, token, "watch socket");
                    if let Err(e) = reactor.register(socket, interest, token) {
                        tracing::warn!(socket, "watch socket failed: {}", e);
                    }
                }
                SocketChange::Unwatch { socket } => {
                    tracing::trace!(socket, "unwatch socket");
                    reactor.deregister(socket);
                }
            }
        }
        match timer {
            Some(TimerRequest::Cancel) => {
                reactor.disarm_timer();
                false
            }
            Some(TimerRequest::After(delay)) => {
                reactor.arm_timer(delay);
                false
            }
            Some(TimerRequest::Immediate) => {
                reactor.arm_timer(Duration::ZERO);
                true
            }
            None => false,
        }
    }

    pub(super) fn watched(&self) -> usize {
        lock(&self.state).watched()
    }
}
