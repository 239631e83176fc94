#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic world generation system deciding which cells host pits.
//!
//! Every decision is a pure function of the cell coordinate and the world
//! seed: the coordinate's textual form, salted per decision, is hashed with
//! SHA-256 into a unit-interval "luck" value. Spawn presence and the initial
//! coin count use distinct salts so they are not correlated.

use geocoin_core::{CellCoord, Command, Event, SpawnParameters};
use sha2::{Digest, Sha256};

/// Salt appended to the coordinate text when deriving initial parameters.
pub const INITIAL_VALUE_SALT: &str = "initialValue";
/// Probability that a cell hosts a pit in the source game.
pub const DEFAULT_SPAWN_PROBABILITY: f64 = 0.1;
/// Smallest number of coins minted into a pit by default.
pub const DEFAULT_MIN_COINS: u32 = 1;
/// Largest number of coins minted into a pit by default.
pub const DEFAULT_MAX_COINS: u32 = 4;

/// Configuration parameters required to construct the generator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    seed: u64,
    spawn_probability: f64,
    min_coins: u32,
    max_coins: u32,
}

impl Config {
    /// Creates a configuration from a seed, a spawn probability and an
    /// inclusive coin range.
    #[must_use]
    pub const fn new(seed: u64, spawn_probability: f64, min_coins: u32, max_coins: u32) -> Self {
        Self {
            seed,
            spawn_probability,
            min_coins,
            max_coins,
        }
    }

    /// World seed mixed into every decision.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Probability that a cell hosts a pit.
    #[must_use]
    pub const fn spawn_probability(&self) -> f64 {
        self.spawn_probability
    }

    /// Inclusive range of coins minted into a new pit.
    #[must_use]
    pub const fn coin_range(&self) -> (u32, u32) {
        (self.min_coins, self.max_coins)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            0,
            DEFAULT_SPAWN_PROBABILITY,
            DEFAULT_MIN_COINS,
            DEFAULT_MAX_COINS,
        )
    }
}

/// Pure system that turns revealed cells into pit materialisation commands.
#[derive(Debug)]
pub struct Generator {
    seed: u64,
    spawn_probability: f64,
    min_coins: u32,
    max_coins: u32,
}

impl Generator {
    /// Creates a new generator using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let (low, high) = config.coin_range();
        Self {
            seed: config.seed(),
            spawn_probability: config.spawn_probability().clamp(0.0, 1.0),
            min_coins: low.min(high),
            max_coins: low.max(high),
        }
    }

    /// Decides whether `cell` hosts a pit.
    #[must_use]
    pub fn should_spawn(&self, cell: CellCoord) -> bool {
        luck(self.seed, &cell.to_string()) < self.spawn_probability
    }

    /// Derives the initial parameters of a pit spawned at `cell`.
    #[must_use]
    pub fn initial_parameters(&self, cell: CellCoord) -> SpawnParameters {
        let roll = luck(self.seed, &format!("{cell},{INITIAL_VALUE_SALT}"));
        let span = u64::from(self.max_coins - self.min_coins) + 1;
        let offset = ((roll * span as f64) as u64).min(span - 1);
        SpawnParameters::new(self.min_coins + offset as u32)
    }

    /// Consumes world events and emits a materialisation command for every
    /// revealed cell that hosts a pit.
    pub fn handle(&self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            let Event::CellsRevealed { cells } = event else {
                continue;
            };
            out.extend(
                cells
                    .iter()
                    .copied()
                    .filter(|cell| self.should_spawn(*cell))
                    .map(|cell| Command::MaterializePit {
                        cell,
                        parameters: self.initial_parameters(cell),
                    }),
            );
        }
    }
}

/// Hashes `key` together with `seed` into a value in `[0, 1)`.
#[must_use]
pub fn luck(seed: u64, key: &str) -> f64 {
    const SCALE: f64 = 1.0 / ((1u64 << 53) as f64);
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(bytes) >> 11) as f64 * SCALE
}
