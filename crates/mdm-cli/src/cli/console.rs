//! Interactive console: reads one key line at a time from stdin, sends the
//! mapped command to the engine thread and redraws from a fresh snapshot.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use mdm_core::config::MdmConfig;
use mdm_core::error::{CommandError, ServiceError};
use mdm_core::service::ServiceHandle;

use super::keys::{self, Input, Screen};
use super::render;

/// Redraw period while something is downloading.
const REFRESH: Duration = Duration::from_secs(1);
const LOG_LINES: usize = 40;

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("mdm-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .map(|_| ())
        .unwrap_or_else(|e| tracing::warn!("stdin reader not started: {}", e));
    rx
}

/// Draws `screen`; returns whether anything is active, or `None` once the
/// manager has asked to exit.
fn draw(
    handle: &ServiceHandle,
    screen: Screen,
    page: usize,
) -> Result<Option<bool>, ServiceError> {
    let snap = handle.snapshot()?;
    if snap.exit_requested {
        return Ok(None);
    }
    let text = match screen {
        Screen::List => render::list(&snap, page),
        Screen::Detail => render::detail(handle.detail()?.as_ref()),
        Screen::Log => render::log(&handle.event_log()?, LOG_LINES),
        Screen::Help => render::help(),
    };
    let mut out = io::stdout().lock();
    let _ = write!(out, "\n{}> ", text);
    let _ = out.flush();
    Ok(Some(snap.counts.active > 0))
}

/// Runs until the user quits, stdin closes, or the engine thread stops.
pub fn run(handle: &ServiceHandle, cfg: &MdmConfig) -> Result<()> {
    let lines = spawn_stdin_reader();
    let mut screen = Screen::List;

    loop {
        let busy = match draw(handle, screen, cfg.page_size) {
            Ok(Some(busy)) => busy,
            Ok(None) | Err(ServiceError::Stopped) => {
                tracing::info!("engine stopped; leaving console");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let line = if busy {
            match lines.recv_timeout(REFRESH) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        } else {
            match lines.recv() {
                Ok(line) => line,
                Err(_) => return Ok(()),
            }
        };

        match keys::parse_line(&line, cfg.speed_step) {
            Ok(Input::Quit) => return Ok(()),
            Ok(Input::Refresh) => {}
            Ok(Input::Show(next)) => screen = next,
            Ok(Input::Command(command)) => {
                screen = Screen::List;
                match handle.command(command) {
                    Ok(()) => {}
                    Err(CommandError::Service(ServiceError::Stopped)) => return Ok(()),
                    // Shown through the snapshot's status line.
                    Err(e) => tracing::debug!("command rejected: {}", e),
                }
            }
            Err(msg) => println!("{}", msg),
        }
    }
}
