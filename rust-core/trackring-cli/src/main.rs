// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//!
//! trackring — inspect and feed a TrackRing log directory.
//!
//! The ring is sized from its existing header, so inspecting a directory
//! never depends on knowing the logger's retention settings. Read-only
//! commands never modify the directory; `append` opens the ring the way
//! the logger does (a damaged header is replaced by an empty ring). Then
//! one command runs:
//! - `stats`: print the header snapshot
//! - `append`: enqueue one record
//! - `since`: print records at or after a Unix-seconds threshold
//! - `dump`: print every live record

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use trackring_log::{
    epoch_seconds, CircularLog, Fix, FsStorage, HeaderStore, Location, LogConfig, Storage,
    ThreadPause, TrackRecord,
};

/// Version string, pulled from Cargo.toml at compile time.
const VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

/// trackring — inspect a TrackRing log directory.
#[derive(Parser, Debug)]
#[command(name = "trackring", version = VERSION, about = "Inspect a TrackRing log")]
struct Cli {
    /// Directory holding the header and data files.
    #[arg(long)]
    dir: PathBuf,

    /// JSON configuration file. Missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the retention window, in seconds.
    #[arg(long)]
    retention_secs: Option<u64>,

    /// Override the sampling interval, in seconds.
    #[arg(long)]
    sample_interval_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the ring statistics.
    Stats,
    /// Append one record.
    Append {
        /// Record text, e.g. `150424,120505,07700.1234E,5130.5678N,045.3`.
        payload: String,
        /// Unix seconds for the stats; defaults to the embedded date/time.
        #[arg(long)]
        timestamp: Option<i64>,
    },
    /// Print records whose embedded timestamp is at or after THRESHOLD.
    Since {
        /// Unix seconds.
        threshold: i64,
        /// Print decoded records instead of raw payloads.
        #[arg(long)]
        parsed: bool,
    },
    /// Print every live record, oldest first.
    Dump,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    let storage = FsStorage::from_config(&cli.dir, &config)
        .with_context(|| format!("cannot use ring directory {}", cli.dir.display()))?;
    adopt_stored_capacity(&storage, &mut config);
    let mut log = CircularLog::new(storage, config)?;

    match cli.command {
        Command::Append { .. } => log.begin().context("ring initialization failed")?,
        _ => log
            .open_existing()
            .with_context(|| format!("no readable ring in {}", cli.dir.display()))?,
    }

    match cli.command {
        Command::Stats => print!("{}", log.stats()),
        Command::Append { payload, timestamp } => {
            let timestamp = match timestamp.or_else(|| epoch_seconds(&payload)) {
                Some(ts) => ts,
                None => bail!("no --timestamp given and {payload:?} has no readable date/time"),
            };
            let sequence = log.enqueue(&payload, timestamp)?;
            tracing::info!(sequence, timestamp, "Appended record");
            println!("{sequence}");
        }
        Command::Since { threshold, parsed } => print_since(&log, threshold, parsed)?,
        Command::Dump => print_since(&log, 0, false)?,
    }
    Ok(())
}

/// Defaults, then the JSON file, then command-line overrides.
fn load_config(cli: &Cli) -> Result<LogConfig> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => LogConfig::default(),
    };
    if let Some(secs) = cli.retention_secs {
        config.retention_secs = secs;
    }
    if let Some(secs) = cli.sample_interval_secs {
        config.sample_interval_secs = secs;
    }
    config.validate()?;
    Ok(config)
}

/// Size `config` from the header already on disk, if there is a readable
/// one, so a mismatched retention setting never discards the ring.
fn adopt_stored_capacity<S: Storage>(storage: &S, config: &mut LogConfig) {
    if !storage.exists(Location::Header) {
        return;
    }
    let stored = match HeaderStore::new(config.retry.clone()).peek(storage, &ThreadPause) {
        Ok(header) if header.capacity > 0 => header.capacity,
        Ok(_) => return,
        Err(error) => {
            tracing::warn!(error = %error, "Existing ring header is unreadable");
            return;
        }
    };
    if config.capacity().ok() != Some(stored) {
        tracing::info!(capacity = stored, "Using capacity from the existing ring header");
        config.retention_secs = u64::from(stored) * config.sample_interval_secs;
    }
}

fn read_config(path: &Path) -> Result<LogConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn print_since(log: &CircularLog<FsStorage>, threshold: i64, parsed: bool) -> Result<()> {
    let mut printed = 0usize;
    for record in log.since(threshold) {
        let payload = record?;
        if parsed {
            println!("{}", describe(&payload));
        } else {
            println!("{payload}");
        }
        printed += 1;
    }
    if printed == 0 {
        eprintln!("no records at or after {threshold}");
    }
    Ok(())
}

fn describe(payload: &str) -> String {
    match TrackRecord::parse(payload) {
        Some(TrackRecord {
            timestamp,
            fix: Fix::SignalLost,
        }) => format!("{}  signal lost", timestamp.format("%Y-%m-%d %H:%M:%S")),
        Some(TrackRecord {
            timestamp,
            fix:
                Fix::Position {
                    longitude,
                    latitude,
                    speed,
                },
        }) => format!(
            "{}  lat {latitude:>10.5}  lon {longitude:>11.5}  speed {speed}",
            timestamp.format("%Y-%m-%d %H:%M:%S")
        ),
        None => format!("(unparsed) {payload}"),
    }
}
