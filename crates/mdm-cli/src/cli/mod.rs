//! Command line for the MDM download manager.
//!
//! Locators are positional. Per-transfer flags (`-R`, `-o`, `-O`, `-s`) apply
//! to the next locator on the command line only, so they are paired by
//! argument position rather than by clap's per-flag value lists.

mod console;
mod keys;
mod render;

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use clap_complete::Shell;
use mdm_core::config::{self, MdmConfig};
use mdm_core::engine::curl::ConnectionLimits;
use mdm_core::manager::{Command, CreateSpec, ManagerSettings};
use mdm_core::service::{self, ServiceOptions};

/// Top-level CLI for the MDM download manager.
#[derive(Debug, Parser)]
#[command(name = "mdm")]
#[command(about = "MDM: many parallel, resumable downloads from one terminal", long_about = None)]
pub struct Cli {
    /// Locators to download (a missing scheme means http://).
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Referer sent for the next URL.
    #[arg(short = 'R', long = "referer", value_name = "REFERER")]
    pub referer: Vec<String>,

    /// Destination file name for the next URL; an existing file is resumed.
    #[arg(short = 'o', long = "output", value_name = "NAME")]
    pub output: Vec<String>,

    /// Destination file name for the next URL; an existing file is overwritten.
    #[arg(short = 'O', long = "output-overwrite", value_name = "NAME")]
    pub output_overwrite: Vec<String>,

    /// Bandwidth cap for the next URL, in bytes per second.
    #[arg(short = 's', long = "speed", value_name = "BYTES")]
    pub speed: Vec<u64>,

    /// Maximum concurrent connections in total (0 = unlimited).
    #[arg(short = 'M', long = "max-connections", value_name = "N")]
    pub max_connections: Option<usize>,

    /// Maximum concurrent connections per host (0 = unlimited).
    #[arg(short = 'H', long = "max-host-connections", value_name = "N")]
    pub max_host_connections: Option<usize>,

    /// Start downloading immediately.
    #[arg(short = 'x', long = "auto-start", value_name = "0|1", value_parser = parse_switch)]
    pub auto_start: Option<bool>,

    /// Quit once every download has completed.
    #[arg(short = 'X', long = "auto-exit", value_name = "0|1", value_parser = parse_switch)]
    pub auto_exit: Option<bool>,

    /// File with one URL per line.
    #[arg(short = 'i', long = "input-file", value_name = "FILE")]
    pub input_file: Option<PathBuf>,

    /// Print shell completions and exit.
    #[arg(long, value_name = "SHELL")]
    pub completions: Option<Shell>,
}

fn parse_switch(s: &str) -> Result<bool, String> {
    match s {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(format!("expected 0 or 1, got {:?}", other)),
    }
}

impl Cli {
    /// Command-line values win over the configuration file.
    pub fn apply_overrides(&self, cfg: &mut MdmConfig) {
        if let Some(n) = self.max_connections {
            cfg.max_total_connections = n;
        }
        if let Some(n) = self.max_host_connections {
            cfg.max_connections_per_host = n;
        }
        if let Some(on) = self.auto_start {
            cfg.auto_start = on;
        }
        if let Some(on) = self.auto_exit {
            cfg.auto_exit = on;
        }
    }
}

/// Parsed command line plus the transfers it requests, in order.
#[derive(Debug)]
pub struct Invocation {
    pub cli: Cli,
    pub transfers: Vec<CreateSpec>,
}

pub fn parse_from<I, T>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = Cli::command().try_get_matches_from(args)?;
    let cli = Cli::from_arg_matches(&matches)?;
    let transfers = transfer_specs(&matches);
    Ok(Invocation { cli, transfers })
}

enum Part<'a> {
    Url(&'a String),
    Referer(&'a String),
    Output { name: &'a String, overwrite: bool },
    Speed(u64),
}

fn indexed<'a, T>(matches: &'a ArgMatches, id: &str) -> Vec<(usize, &'a T)>
where
    T: Clone + Send + Sync + 'static,
{
    match (matches.indices_of(id), matches.get_many::<T>(id)) {
        (Some(indices), Some(values)) => indices.zip(values).collect(),
        _ => Vec::new(),
    }
}

/// Pairs each per-transfer flag with the next URL after it.
fn transfer_specs(matches: &ArgMatches) -> Vec<CreateSpec> {
    let mut parts: Vec<(usize, Part<'_>)> = Vec::new();
    parts.extend(indexed::<String>(matches, "urls").into_iter().map(|(i, v)| (i, Part::Url(v))));
    parts.extend(
        indexed::<String>(matches, "referer")
            .into_iter()
            .map(|(i, v)| (i, Part::Referer(v))),
    );
    parts.extend(indexed::<String>(matches, "output").into_iter().map(|(i, v)| {
        (
            i,
            Part::Output {
                name: v,
                overwrite: false,
            },
        )
    }));
    parts.extend(
        indexed::<String>(matches, "output_overwrite")
            .into_iter()
            .map(|(i, v)| {
                (
                    i,
                    Part::Output {
                        name: v,
                        overwrite: true,
                    },
                )
            }),
    );
    parts.extend(
        indexed::<u64>(matches, "speed")
            .into_iter()
            .map(|(i, v)| (i, Part::Speed(*v))),
    );
    parts.sort_by_key(|(i, _)| *i);

    let mut specs = Vec::new();
    let mut pending = CreateSpec::default();
    let mut dangling = false;
    for (_, part) in parts {
        match part {
            Part::Url(url) => {
                let mut spec = std::mem::take(&mut pending);
                spec.locator = url.clone();
                specs.push(spec);
                dangling = false;
                continue;
            }
            Part::Referer(r) => pending.referer = Some(r.clone()),
            Part::Output { name, overwrite } => {
                pending.name = Some(name.clone());
                pending.overwrite = overwrite;
            }
            Part::Speed(cap) => pending.speed_cap = Some(cap),
        }
        dangling = true;
    }
    if dangling {
        tracing::warn!("per-transfer options after the last URL are ignored");
    }
    specs
}

/// One URL per line; blank lines and `#` comments are skipped.
pub fn read_input_file(path: &Path) -> Result<Vec<CreateSpec>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read input file {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(CreateSpec::new)
        .collect())
}

pub fn run_from_args() -> Result<()> {
    let invocation = match parse_from(std::env::args_os()) {
        Ok(inv) => inv,
        Err(e) => e.exit(),
    };
    let cli = invocation.cli;

    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "mdm", &mut io::stdout());
        return Ok(());
    }

    let mut cfg = config::load_or_init().context("load configuration")?;
    cli.apply_overrides(&mut cfg);
    tracing::debug!("loaded config: {:?}", cfg);

    let mut transfers = invocation.transfers;
    if let Some(path) = &cli.input_file {
        transfers.extend(read_input_file(path)?);
    }

    let download_dir = std::env::current_dir().context("current directory")?;
    let service = service::spawn(ServiceOptions {
        limits: ConnectionLimits {
            max_total: cfg.max_total_connections,
            max_per_host: cfg.max_connections_per_host,
        },
        settings: ManagerSettings::from_config(&cfg, download_dir),
        poll_interval: cfg.poll_interval(),
    })
    .context("start download engine")?;
    let handle = service.handle();

    for spec in transfers {
        let shown = spec.locator.clone();
        if let Err(e) = handle.command(Command::Create(spec)) {
            eprintln!("mdm: {}: {}", shown, e);
        }
    }

    let result = console::run(&handle, &cfg);
    handle.shutdown();
    service.join().context("stop download engine")?;
    result
}

#[cfg(test)]
mod tests;
