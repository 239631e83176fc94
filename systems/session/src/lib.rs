#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Session orchestration that reconciles persisted state with the generated world.
//!
//! A [`Session`] owns the authoritative world, the generator and a durable
//! store. It restores persisted pits on start, asks the generator to populate
//! newly revealed cells on every relocation, and writes the world back to the
//! store after every operation that changes it.

use std::rc::Rc;

use geocoin_core::{
    CellCoord, Coin, Command, CorruptRecord, Direction, Event, PokeError, Position, StashError,
    StashPolicy,
};
use geocoin_storage::{LoadedState, StateStore, StoreError};
use geocoin_system_generator::{self as generator, Generator};
use geocoin_world::{
    self as world, cells::CellIdentity, pits::Pit, query, snapshot, World,
    DEFAULT_TILE_WIDTH, DEFAULT_VISIBILITY_RADIUS,
};
use log::{debug, info};
use thiserror::Error;

/// Tunable parameters of a play session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Side length of a single cell in position units.
    pub tile_width: f64,
    /// Number of cells visible in each direction around the player.
    pub visibility_radius: u32,
    /// World seed mixed into every generation decision.
    pub seed: u64,
    /// Probability that a cell hosts a pit.
    pub spawn_probability: f64,
    /// Smallest number of coins minted into a new pit.
    pub min_coins: u32,
    /// Largest number of coins minted into a new pit.
    pub max_coins: u32,
    /// Rule deciding which pits accept a stashed coin.
    pub stash_policy: StashPolicy,
    /// Position of the player in a fresh session.
    pub origin: Position,
}

impl Config {
    /// Generator configuration derived from the session settings.
    #[must_use]
    pub const fn generator(&self) -> generator::Config {
        generator::Config::new(
            self.seed,
            self.spawn_probability,
            self.min_coins,
            self.max_coins,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_TILE_WIDTH,
            visibility_radius: DEFAULT_VISIBILITY_RADIUS,
            seed: 0,
            spawn_probability: generator::DEFAULT_SPAWN_PROBABILITY,
            min_coins: generator::DEFAULT_MIN_COINS,
            max_coins: generator::DEFAULT_MAX_COINS,
            stash_policy: StashPolicy::default(),
            origin: Position::ORIGIN,
        }
    }
}

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The poke was rejected; nothing changed.
    #[error(transparent)]
    Poke(#[from] PokeError),
    /// The stash was rejected; nothing changed.
    #[error(transparent)]
    Stash(#[from] StashError),
    /// The store could not persist or load the state.
    #[error("state store failure: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of restoring persisted state at session start.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Whether a persisted record existed.
    pub restored: bool,
    /// Entries that were skipped while decoding or validating the record.
    pub corrupt: Vec<CorruptRecord>,
}

/// Play session owning the world, the generator and the durable store.
#[derive(Debug)]
pub struct Session<S> {
    config: Config,
    world: World,
    generator: Generator,
    store: S,
}

impl<S: StateStore> Session<S> {
    /// Creates a session over `store`; call [`Session::start`] before playing.
    pub fn new(config: Config, store: S) -> Self {
        let mut world = World::new();
        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::ConfigureWorld {
                tile_width: config.tile_width,
                visibility_radius: config.visibility_radius,
                stash_policy: config.stash_policy,
            },
            &mut events,
        );
        Self {
            generator: Generator::new(config.generator()),
            config,
            world,
            store,
        }
    }

    /// Restores the persisted record, if any, and reveals the window around
    /// the restored (or configured) player position.
    pub fn start(&mut self) -> Result<RestoreReport, SessionError> {
        match self.store.load()? {
            Some(loaded) => self.adopt(loaded),
            None => {
                let _ = self.execute(Command::Relocate {
                    position: self.config.origin,
                });
                self.flush()?;
                info!(
                    "fresh session started with {} pits",
                    query::pits(&self.world).count()
                );
                Ok(RestoreReport::default())
            }
        }
    }

    /// Replaces the world with a decoded persisted state, reveals the window
    /// around its player position and writes the result back to the store.
    pub fn adopt(&mut self, loaded: LoadedState) -> Result<RestoreReport, SessionError> {
        let mut corrupt = loaded.corrupt;
        let position = loaded
            .state
            .player
            .filter(|position| query::is_addressable(&self.world, *position))
            .unwrap_or(self.config.origin);
        corrupt.extend(snapshot::restore(&mut self.world, loaded.state));

        let _ = self.execute(Command::Relocate { position });
        self.flush()?;
        info!(
            "session restored at cell {} with {} pits ({} corrupt records)",
            query::player_cell(&self.world),
            query::pits(&self.world).count(),
            corrupt.len()
        );
        Ok(RestoreReport {
            restored: true,
            corrupt,
        })
    }

    /// Moves the player and materialises pits in newly revealed cells.
    ///
    /// Returns the cells that received a new pit.
    pub fn relocate(&mut self, position: Position) -> Result<Vec<CellCoord>, SessionError> {
        let events = self.execute(Command::Relocate { position });
        self.flush()?;
        Ok(events
            .iter()
            .filter_map(|event| match event {
                Event::PitMaterialized { cell, .. } => Some(*cell),
                _ => None,
            })
            .collect())
    }

    /// Moves the player one cell in `direction`.
    pub fn step(&mut self, direction: Direction) -> Result<Vec<CellCoord>, SessionError> {
        let position = query::player_position(&self.world).step(direction, self.config.tile_width);
        self.relocate(position)
    }

    /// Moves a coin from the pit at `cell` into the inventory.
    pub fn poke(&mut self, cell: CellCoord) -> Result<Coin, SessionError> {
        for event in self.execute(Command::Poke { cell }) {
            match event {
                Event::CoinCollected { coin, .. } => {
                    self.flush()?;
                    return Ok(coin);
                }
                Event::PokeRejected { reason, .. } => return Err(reason.into()),
                _ => {}
            }
        }
        Err(PokeError::NoPit(cell).into())
    }

    /// Moves the most recently collected coin into the pit at `cell`.
    pub fn stash(&mut self, cell: CellCoord) -> Result<Coin, SessionError> {
        for event in self.execute(Command::Stash { cell }) {
            match event {
                Event::CoinStashed { coin, .. } => {
                    self.flush()?;
                    return Ok(coin);
                }
                Event::StashRejected { reason, .. } => return Err(reason.into()),
                _ => {}
            }
        }
        Err(StashError::NoPit(cell).into())
    }

    /// Clears all pits, the inventory, the score and the persisted record,
    /// then regenerates the window around the configured origin.
    ///
    /// The persisted record is removed first; if that fails the world is
    /// left untouched.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.store.clear()?;
        let _ = self.execute(Command::Reset);
        let _ = self.execute(Command::Relocate {
            position: self.config.origin,
        });
        self.flush()
    }

    /// Writes the current world state to the store.
    pub fn flush(&mut self) -> Result<(), SessionError> {
        self.store.save(&snapshot::capture(&self.world))?;
        Ok(())
    }

    /// Visible cells around the player paired with the pit they host, if any.
    #[must_use]
    pub fn visible_window(&self) -> Vec<(Rc<CellIdentity>, Option<&Pit>)> {
        query::visible_window(&self.world)
            .iter()
            .map(|identity| {
                let pit = query::pit(&self.world, identity.coord());
                (Rc::clone(identity), pit)
            })
            .collect()
    }

    /// Configuration the session was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read-only access to the authoritative world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Read-only access to the durable store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the session, yielding its store.
    pub fn into_store(self) -> S {
        self.store
    }

    fn execute(&mut self, command: Command) -> Vec<Event> {
        let mut log = Vec::new();
        let mut pending = vec![command];

        while !pending.is_empty() {
            let mut events = Vec::new();
            for command in pending.drain(..) {
                world::apply(&mut self.world, command, &mut events);
            }
            self.generator.handle(&events, &mut pending);
            log.extend(events);
        }

        debug!("command produced {} events", log.len());
        log
    }
}
