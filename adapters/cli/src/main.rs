#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays Geocoin in a terminal.

mod commands;
mod config;
mod render;
mod transfer;

use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use geocoin_core::StashPolicy;
use geocoin_storage::{JsonFileStore, MemoryStore, StateStore, DEFAULT_RECORD_NAME};
use geocoin_system_session::{Config, Session};
use log::{info, LevelFilter};

use self::{commands::Action, config::ConfigFile};

#[derive(Debug, Parser)]
#[command(name = "geocoin", version, about = "Collect coins from pits scattered over a grid world", long_about = None)]
struct Cli {
    /// TOML file with session settings.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// File holding the persisted game state.
    #[arg(long, value_name = "FILE")]
    state: Option<PathBuf>,

    /// Keep the game state in memory only.
    #[arg(long, conflicts_with = "state")]
    ephemeral: bool,

    /// World seed mixed into every generation decision.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of cells visible in each direction around the player.
    #[arg(long)]
    radius: Option<u32>,

    /// Side length of a cell in position units.
    #[arg(long)]
    tile_width: Option<f64>,

    /// Probability that a cell hosts a pit.
    #[arg(long)]
    spawn_probability: Option<f64>,

    /// Smallest number of coins minted into a new pit.
    #[arg(long)]
    min_coins: Option<u32>,

    /// Largest number of coins minted into a new pit.
    #[arg(long)]
    max_coins: Option<u32>,

    /// Which pits accept stashed coins: `anywhere` or `home-cell`.
    #[arg(long, value_name = "POLICY")]
    stash_policy: Option<StashPolicy>,

    /// Log session activity at debug level.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Play interactively (default).
    Play,
    /// Print the visible window and exit.
    Look,
    /// Print the persisted state as a transfer string.
    Export,
    /// Replace the persisted state with a transfer string.
    Import {
        /// String produced by `export`.
        payload: String,
    },
    /// Discard all progress.
    Reset,
}

impl Cli {
    fn session_config(&self) -> Result<Config> {
        let mut config = Config::default();
        if let Some(path) = &self.config {
            ConfigFile::load(path)?.apply(&mut config);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(radius) = self.radius {
            config.visibility_radius = radius;
        }
        if let Some(tile_width) = self.tile_width {
            config.tile_width = tile_width;
        }
        if let Some(probability) = self.spawn_probability {
            config.spawn_probability = probability;
        }
        if let Some(min_coins) = self.min_coins {
            config.min_coins = min_coins;
        }
        if let Some(max_coins) = self.max_coins {
            config.max_coins = max_coins;
        }
        if let Some(policy) = self.stash_policy {
            config.stash_policy = policy;
        }
        config::validate(&config)?;
        Ok(config)
    }

    fn store(&self) -> Box<dyn StateStore> {
        if self.ephemeral {
            return Box::new(MemoryStore::default());
        }
        match &self.state {
            Some(path) => Box::new(JsonFileStore::at_path(path.clone())),
            None => Box::new(JsonFileStore::new(".", DEFAULT_RECORD_NAME)),
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    let _ = builder.format_timestamp_millis();
    let _ = builder.try_init();
}

/// Entry point for the Geocoin command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.session_config()?;
    info!("starting session with seed {}", config.seed);
    let mut session = Session::new(config, cli.store());
    let report = session
        .start()
        .context("failed to restore the persisted game state")?;

    let stdout = io::stdout();
    let mut output = stdout.lock();
    commands::describe_restore(&report, &mut output)?;

    let action = match cli.mode.unwrap_or(Mode::Play) {
        Mode::Play => {
            let stdin = io::stdin();
            return commands::play(&mut session, stdin.lock(), &mut output);
        }
        Mode::Look => Action::Look,
        Mode::Export => Action::Export,
        Mode::Import { payload } => Action::Import(payload),
        Mode::Reset => Action::Reset,
    };
    let _ = commands::execute(&mut session, action, &mut output)?;
    output.flush()?;
    Ok(())
}
