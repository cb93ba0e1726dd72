//! Readiness reactor: the sockets libcurl asks to watch, one one-shot timer,
//! and a cross-thread waker, all multiplexed on a `mio::Poll`.
//!
//! The reactor never reads or writes a watched socket; it only reports
//! readiness. Registrations are edge-triggered, so every interest change is a
//! fresh registration and reports readiness that is already pending.

use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::unix::SourceFd;
use mio::{Events, Poll, Token};

const WAKE_TOKEN: Token = Token(usize::MAX);
const EVENT_CAPACITY: usize = 256;

/// Readiness interest for one socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest {
    pub readable: bool,
    pub writable: bool,
}

impl Interest {
    pub const READ: Interest = Interest {
        readable: true,
        writable: false,
    };
    pub const WRITE: Interest = Interest {
        readable: false,
        writable: true,
    };
    pub const BOTH: Interest = Interest {
        readable: true,
        writable: true,
    };

    fn to_mio(self) -> Option<mio::Interest> {
        match (self.readable, self.writable) {
            (true, true) => Some(mio::Interest::READABLE | mio::Interest::WRITABLE),
            (true, false) => Some(mio::Interest::READABLE),
            (false, true) => Some(mio::Interest::WRITABLE),
            (false, false) => None,
        }
    }
}

/// One event reported by [`Reactor::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Socket {
        fd: RawFd,
        token: usize,
        /// Data or end-of-stream can be read.
        readable: bool,
        writable: bool,
        /// The socket has a pending error.
        error: bool,
    },
    Timer,
    Wake,
}

#[derive(Debug, Clone, Copy)]
struct Registration {
    interest: Interest,
    token: usize,
}

/// Wakes a reactor blocked in [`Reactor::wait`] from another thread.
#[derive(Debug, Clone)]
pub struct Waker {
    inner: Arc<mio::Waker>,
}

impl Waker {
    pub fn wake(&self) {
        if let Err(e) = self.inner.wake() {
            tracing::warn!("reactor wake-up failed: {}", e);
        }
    }
}

#[derive(Debug)]
pub struct Reactor {
    poll: Poll,
    events: Events,
    sockets: HashMap<RawFd, Registration>,
    tokens: HashMap<Token, RawFd>,
    deadline: Option<Instant>,
    waker: Arc<mio::Waker>,
}

impl Reactor {
    pub fn new() -> io::Result<Self> {
        let poll = Poll::new()?;
        let waker = Arc::new(mio::Waker::new(poll.registry(), WAKE_TOKEN)?);
        Ok(Self {
            poll,
            events: Events::with_capacity(EVENT_CAPACITY),
            sockets: HashMap::new(),
            tokens: HashMap::new(),
            deadline: None,
            waker,
        })
    }

    pub fn waker(&self) -> Waker {
        Waker {
            inner: Arc::clone(&self.waker),
        }
    }

    /// Starts watching `fd`, or replaces its interest and token if already
    /// watched. An empty interest stops watching it.
    pub fn register(&mut self, fd: RawFd, interest: Interest, token: usize) -> io::Result<()> {
        let Some(wanted) = interest.to_mio() else {
            self.deregister(fd);
            return Ok(());
        };
        let registry = self.poll.registry();
        if self.sockets.contains_key(&fd) {
            registry.reregister(&mut SourceFd(&fd), Token(token), wanted)?;
        } else {
            registry.register(&mut SourceFd(&fd), Token(token), wanted)?;
        }
        if let Some(old) = self.sockets.insert(fd, Registration { interest, token }) {
            self.tokens.remove(&Token(old.token));
        }
        self.tokens.insert(Token(token), fd);
        Ok(())
    }

    pub fn deregister(&mut self, fd: RawFd) -> bool {
        let Some(reg) = self.sockets.remove(&fd) else {
            return false;
        };
        self.tokens.remove(&Token(reg.token));
        // curl may already have closed the socket, which drops it from the poller.
        if let Err(e) = self.poll.registry().deregister(&mut SourceFd(&fd)) {
            tracing::trace!(fd, "deregister: {}", e);
        }
        true
    }

    pub fn interest(&self, fd: RawFd) -> Option<Interest> {
        self.sockets.get(&fd).map(|r| r.interest)
    }

    pub fn watched(&self) -> usize {
        self.sockets.len()
    }

    /// Arms the timer `delay` from now, replacing any pending arming.
    pub fn arm_timer(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    pub fn disarm_timer(&mut self) {
        self.deadline = None;
    }

    pub fn timer_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Blocks until a watched socket is ready, the timer fires, the waker is
    /// poked, or `max` elapses (`None` = no limit besides the timer).
    pub fn wait(&mut self, max: Option<Duration>) -> io::Result<Vec<Readiness>> {
        let until_timer = self
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()));
        let timeout = match (max, until_timer) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }

        let mut ready = Vec::new();
        for event in self.events.iter() {
            if event.token() == WAKE_TOKEN {
                ready.push(Readiness::Wake);
                continue;
            }
            let Some(&fd) = self.tokens.get(&event.token()) else {
                continue;
            };
            ready.push(Readiness::Socket {
                fd,
                token: event.token().0,
                readable: event.is_readable() || event.is_read_closed(),
                writable: event.is_writable() || event.is_write_closed(),
                error: event.is_error(),
            });
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.deadline = None;
                ready.push(Readiness::Timer);
            }
        }
        Ok(ready)
    }
}
