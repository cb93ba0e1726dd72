//! Download manager: the registry, the transfer engine, and the command
//! surface that ties them together.
//!
//! The manager is owned by the engine thread (see [`crate::service`]); it is
//! never shared. Every call takes `now` so lifecycle timestamps and rates are
//! driven by the caller's clock.

mod command;
mod events;
mod navigate;
mod view;

#[cfg(test)]
mod scripted;

use std::path::PathBuf;
use std::time::Instant;

use crate::config::MdmConfig;
use crate::engine::{DriveReport, DriveTarget, EngineError, TransferEngine};
use crate::error::{CommandError, CreateError};
use crate::lifecycle::{self, Trigger};
use crate::locator::{sanitize_file_name, Locator};
use crate::record::{Destination, DownloadRecord, RecordId, TransferState};
use crate::registry::{FilterMode, Registry};

pub use command::{Command, CreateSpec};
pub use events::{EventLevel, EventLog, LogEntry, EVENT_LOG_CAPACITY};
pub use navigate::{Motion, SearchDirection};
pub use view::{DetailView, RowView, Snapshot, StateCounts};

/// Manager policy, taken from the configuration and command line.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Start downloading right away; new records are activated on creation.
    pub auto_start: bool,
    /// Ask the service to stop once every record has completed.
    pub auto_exit: bool,
    pub default_speed_cap: u64,
    pub page_size: usize,
    /// Directory destination files are created in.
    pub download_dir: PathBuf,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            auto_start: false,
            auto_exit: false,
            default_speed_cap: 0,
            page_size: 20,
            download_dir: PathBuf::from("."),
        }
    }
}

impl ManagerSettings {
    pub fn from_config(cfg: &MdmConfig, download_dir: PathBuf) -> Self {
        Self {
            auto_start: cfg.auto_start,
            auto_exit: cfg.auto_exit,
            default_speed_cap: cfg.default_speed_cap,
            page_size: cfg.page_size.max(1),
            download_dir,
        }
    }
}

pub struct DownloadManager<E: TransferEngine> {
    engine: E,
    registry: Registry,
    settings: ManagerSettings,
    mode: FilterMode,
    /// Global "start all" flag.
    downloading: bool,
    session_start: Option<Instant>,
    last_search: Option<String>,
    events: EventLog,
    status: Option<String>,
    exit_requested: bool,
}

impl<E: TransferEngine> DownloadManager<E> {
    pub fn new(engine: E, settings: ManagerSettings, now: Instant) -> Self {
        let downloading = settings.auto_start;
        Self {
            engine,
            registry: Registry::new(),
            settings,
            mode: FilterMode::All,
            downloading,
            session_start: downloading.then_some(now),
            last_search: None,
            events: EventLog::new(now),
            status: None,
            exit_requested: false,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Selected record of the current filter mode.
    pub fn selected(&self) -> Option<RecordId> {
        self.registry.selected(self.mode)
    }

    pub fn record(&self, id: RecordId) -> Option<&DownloadRecord> {
        self.registry.get(id)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// True while any record holds an engine registration.
    pub fn has_active(&self) -> bool {
        self.registry.iter().any(|r| r.is_registered())
    }

    /// Creates a record at the tail of the list. It starts Paused, or Active
    /// when the global downloading flag is on. Nothing is added on error.
    pub fn create(&mut self, spec: CreateSpec, now: Instant) -> Result<RecordId, CreateError> {
        let locator = Locator::parse(&spec.locator)?;
        if self.registry.contains_locator(locator.raw()) {
            return Err(CreateError::DuplicateLocator(locator.raw().to_string()));
        }
        let name = match spec.name.as_deref() {
            Some(given) => {
                let name = sanitize_file_name(given);
                if name.is_empty() {
                    return Err(CreateError::InvalidLocator(format!(
                        "unusable destination name {:?}",
                        given
                    )));
                }
                name
            }
            None => locator.file_name().map(str::to_string).ok_or_else(|| {
                CreateError::InvalidLocator(format!("no file name in {}", locator.raw()))
            })?,
        };
        let path = self.settings.download_dir.join(&name);
        let destination = Destination::open(&path, spec.overwrite)?;

        let id = self.registry.allocate_id();
        let speed_cap = spec.speed_cap.unwrap_or(self.settings.default_speed_cap);
        tracing::debug!(%id, locator = %locator, name = %name, speed_cap, "download created");
        let record = DownloadRecord::new(id, locator, name, destination, speed_cap, spec.referer);
        self.registry.append(record);

        if self.downloading {
            self.start(id, now);
        }
        for mode in [FilterMode::All, self.mode] {
            if self.registry.selected(mode).is_none() {
                self.registry.select(mode, Some(id));
            }
        }
        self.after_change(now);
        Ok(id)
    }

    /// Deregisters (if active), closes, and removes a record.
    pub fn delete(&mut self, id: RecordId, now: Instant) -> Result<(), CommandError> {
        let record = self.registry.get_mut(id).ok_or(CommandError::NoSelection)?;
        let name = record.name().to_string();
        if let Err(e) =
            lifecycle::deactivate(record, &mut self.engine, TransferState::Inactive, now)
        {
            self.events.warn(now, format!("deregister {}: {}", name, e));
        }
        self.registry.remove(id);
        self.events.info(now, format!("deleted {}", name));
        self.after_change(now);
        Ok(())
    }

    /// Applies one command at `now`. The error, if any, also becomes the
    /// status message.
    pub fn apply(&mut self, command: Command, now: Instant) -> Result<(), CommandError> {
        self.status = None;
        let result = self.dispatch(command, now);
        if let Err(e) = &result {
            self.status = Some(e.to_string());
        }
        self.after_change(now);
        result
    }

    fn dispatch(&mut self, command: Command, now: Instant) -> Result<(), CommandError> {
        match command {
            Command::Create(spec) => {
                let shown = spec.locator.clone();
                match self.create(spec, now) {
                    Ok(_) => Ok(()),
                    Err(e) => {
                        self.events.warn(now, format!("cannot add {}: {}", shown, e));
                        Err(e.into())
                    }
                }
            }
            Command::Delete => {
                let id = self.require_selection()?;
                self.delete(id, now)
            }
            Command::TogglePause => {
                let id = self.require_selection()?;
                let trigger = match self.state_of(id) {
                    Some(TransferState::Active) => Trigger::Pause,
                    _ => Trigger::Resume,
                };
                self.transition(id, trigger, now)?;
                // Resuming one download also starts the global session.
                if trigger == Trigger::Resume {
                    self.downloading = true;
                    self.session_start.get_or_insert(now);
                }
                Ok(())
            }
            Command::Pause => self.transition_selected(Trigger::Pause, now),
            Command::Resume => self.transition_selected(Trigger::Resume, now),
            Command::Halt => self.transition_selected(Trigger::Halt, now),
            Command::Unhalt => self.transition_selected(Trigger::Unhalt, now),
            Command::PauseAll => {
                self.pause_all(now);
                Ok(())
            }
            Command::ResumeAll => {
                self.resume_all(now);
                Ok(())
            }
            Command::ToggleAll => {
                if self.downloading {
                    self.pause_all(now);
                } else {
                    self.resume_all(now);
                }
                Ok(())
            }
            Command::AdjustSpeed(delta) => self.adjust_speed(delta, now),
            Command::SetReferer(referer) => self.set_referer(referer, now),
            Command::Search { text, direction } => {
                self.last_search = Some(text.clone());
                self.search(&text, direction)
            }
            Command::RepeatSearch(direction) => {
                let text = self
                    .last_search
                    .clone()
                    .ok_or_else(|| CommandError::NotFound(String::new()))?;
                self.search(&text, direction)
            }
            Command::Navigate(motion) => {
                if let Some(id) =
                    navigate::target(&self.registry, self.mode, motion, self.settings.page_size)
                {
                    self.registry.select(self.mode, Some(id));
                }
                Ok(())
            }
            Command::SwitchMode(mode) => {
                self.mode = mode;
                if self.registry.selected(mode).is_none() {
                    let first = navigate::target(&self.registry, mode, Motion::Home, 1);
                    self.registry.select(mode, first);
                }
                Ok(())
            }
        }
    }

    fn require_selection(&self) -> Result<RecordId, CommandError> {
        self.selected().ok_or(CommandError::NoSelection)
    }

    fn state_of(&self, id: RecordId) -> Option<TransferState> {
        self.registry.get(id).map(|r| r.state())
    }

    fn transition_selected(&mut self, trigger: Trigger, now: Instant) -> Result<(), CommandError> {
        let id = self.require_selection()?;
        self.transition(id, trigger, now)
    }

    fn transition(
        &mut self,
        id: RecordId,
        trigger: Trigger,
        now: Instant,
    ) -> Result<(), CommandError> {
        let record = self.registry.get_mut(id).ok_or(CommandError::NoSelection)?;
        let from = record.state();
        let to = lifecycle::next_state(from, trigger).ok_or(CommandError::InvalidTransition {
            action: trigger.as_str(),
            state: from,
        })?;
        let result = if to == TransferState::Active {
            lifecycle::activate(record, &mut self.engine, now)
        } else {
            lifecycle::deactivate(record, &mut self.engine, to, now)
        };
        if let Err(e) = &result {
            let name = record.name().to_string();
            self.events
                .warn(now, format!("{} {}: {}", trigger.as_str(), name, e));
        }
        result.map_err(CommandError::from)
    }

    /// Activates a record, logging instead of failing.
    fn start(&mut self, id: RecordId, now: Instant) {
        let Some(record) = self.registry.get_mut(id) else {
            return;
        };
        if let Err(e) = lifecycle::activate(record, &mut self.engine, now) {
            let name = record.name().to_string();
            self.events.warn(now, format!("cannot start {}: {}", name, e));
        }
    }

    fn resume_all(&mut self, now: Instant) {
        self.downloading = true;
        self.session_start = Some(now);
        for id in self.registry.ids() {
            if self.state_of(id) == Some(TransferState::Paused) {
                self.start(id, now);
            }
        }
    }

    fn pause_all(&mut self, now: Instant) {
        self.downloading = false;
        for id in self.registry.ids() {
            if self.state_of(id) != Some(TransferState::Active) {
                continue;
            }
            if let Err(e) = self.transition(id, Trigger::Pause, now) {
                tracing::debug!(%id, "pause all: {}", e);
            }
        }
    }

    fn adjust_speed(&mut self, delta: i64, now: Instant) -> Result<(), CommandError> {
        let id = self.require_selection()?;
        let record = self.registry.get_mut(id).ok_or(CommandError::NoSelection)?;
        let cap = record.speed_cap;
        record.speed_cap = if delta >= 0 {
            cap.saturating_add(delta as u64)
        } else {
            cap.saturating_sub(delta.unsigned_abs())
        };
        let new_cap = record.speed_cap;
        let name = record.name().to_string();
        lifecycle::reregister(record, &mut self.engine, now)?;
        self.status = Some(if new_cap == 0 {
            format!("{}: unlimited speed", name)
        } else {
            format!("{}: speed cap {} B/s", name, new_cap)
        });
        Ok(())
    }

    fn set_referer(&mut self, referer: Option<String>, now: Instant) -> Result<(), CommandError> {
        let id = self.require_selection()?;
        let record = self.registry.get_mut(id).ok_or(CommandError::NoSelection)?;
        record.referer = referer.filter(|r| !r.trim().is_empty());
        lifecycle::reregister(record, &mut self.engine, now)?;
        Ok(())
    }

    fn search(&mut self, text: &str, direction: SearchDirection) -> Result<(), CommandError> {
        match navigate::search(&self.registry, self.mode, text, direction) {
            Some(id) => {
                self.registry.select(self.mode, Some(id));
                Ok(())
            }
            None => Err(CommandError::NotFound(text.to_string())),
        }
    }

    /// Drives the engine for one stimulus and applies what it reports.
    /// Engine errors are logged; they never stop the manager.
    pub fn drive(&mut self, target: DriveTarget, now: Instant) {
        match self.engine.drive(target) {
            Ok(report) => self.apply_report(report, now),
            Err(e) => self.events.warn(now, format!("engine: {}", e)),
        }
    }

    /// Feeds progress samples to the estimator and turns completions into
    /// Finished or Failed records.
    pub fn apply_report(&mut self, report: DriveReport, now: Instant) {
        for (id, sample) in report.progress {
            if let Some(record) = self.registry.get_mut(id) {
                if record.registered {
                    let prior = record.prior_bytes();
                    record.stats.update(&sample, prior, now);
                }
            }
        }
        for completion in report.completions {
            let id = completion.id;
            let Some(record) = self.registry.get_mut(id) else {
                tracing::debug!(%id, "completion for a deleted record");
                continue;
            };
            if !record.registered {
                tracing::debug!(%id, "completion for an unregistered record");
                continue;
            }
            lifecycle::complete(record, completion, now);
            let name = record.name().to_string();
            match (record.state(), record.error()) {
                (TransferState::Failed, Some(reason)) => {
                    let message = format!("failed {}: {}", name, reason);
                    self.events.warn(now, message);
                }
                _ => self.events.info(now, format!("finished {}", name)),
            }
        }
        self.after_change(now);
    }

    fn after_change(&mut self, now: Instant) {
        self.registry.repair_selection();
        if self.settings.auto_exit && !self.exit_requested && self.all_done() {
            self.exit_requested = true;
            self.events.info(now, "all downloads completed");
        }
    }

    fn all_done(&self) -> bool {
        !self.registry.is_empty()
            && self.registry.iter().all(|r| {
                matches!(r.state(), TransferState::Finished | TransferState::Failed)
            })
    }

    /// Releases every record, tail first, deregistering active ones.
    pub fn shutdown(&mut self, now: Instant) {
        while let Some(id) = self.registry.tail() {
            if let Some(record) = self.registry.get_mut(id) {
                if let Err(e) =
                    lifecycle::deactivate(record, &mut self.engine, TransferState::Inactive, now)
                {
                    tracing::warn!(%id, "deregister at shutdown: {}", e);
                }
            }
            self.registry.remove(id);
        }
        tracing::debug!("all downloads released");
    }

    pub fn snapshot(&self, now: Instant) -> Snapshot {
        let mut counts = StateCounts::default();
        let mut rows = Vec::new();
        let mut total_bytes_per_sec = 0.0;
        for record in self.registry.iter() {
            counts.add(record.state());
            if record.state() == TransferState::Active {
                total_bytes_per_sec += record.stats().bytes_per_sec;
            }
            if self.mode.matches(record.state()) {
                rows.push(RowView::of(record));
            }
        }
        let session_elapsed = match self.session_start {
            Some(start) if counts.active > 0 => Some(now.saturating_duration_since(start)),
            _ => None,
        };
        Snapshot {
            mode: self.mode,
            rows,
            selected: self.selected(),
            counts,
            downloading: self.downloading,
            session_elapsed,
            total_bytes_per_sec,
            status: self.status.clone(),
            exit_requested: self.exit_requested,
        }
    }

    /// Detail block of the selected record.
    pub fn detail(&self, now: Instant) -> Option<DetailView> {
        let record = self.registry.get(self.selected()?)?;
        let info = if record.is_registered() {
            self.engine
                .info(record.id())
                .unwrap_or_else(|| record.info().clone())
        } else {
            record.info().clone()
        };
        Some(DetailView::of(record, info, record.elapsed(now)))
    }
}
