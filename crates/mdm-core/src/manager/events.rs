//! Bounded in-memory log of user-visible events. Every entry is also
//! emitted through `tracing`.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

pub const EVENT_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Info,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Time since the manager started.
    pub at: Duration,
    pub level: EventLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            EventLevel::Info => "",
            EventLevel::Warn => "warning: ",
        };
        write!(f, "[{:>6}s] {}{}", self.at.as_secs(), tag, self.message)
    }
}

#[derive(Debug)]
pub struct EventLog {
    origin: Instant,
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl EventLog {
    pub fn new(origin: Instant) -> Self {
        Self::with_capacity(origin, EVENT_LOG_CAPACITY)
    }

    pub fn with_capacity(origin: Instant, capacity: usize) -> Self {
        Self {
            origin,
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn info(&mut self, now: Instant, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.push(now, EventLevel::Info, message);
    }

    pub fn warn(&mut self, now: Instant, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.push(now, EventLevel::Warn, message);
    }

    fn push(&mut self, now: Instant, level: EventLevel, message: String) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            at: now.saturating_duration_since(self.origin),
            level,
            message,
        });
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }
}
