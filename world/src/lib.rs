#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Geocoin.
//!
//! The world owns the cell identity cache, the pit store, the player's
//! inventory and score. All mutations go through [`apply`]; reads go through
//! the [`query`] module.

pub mod cells;
pub mod inventory;
pub mod pits;
pub mod snapshot;

use std::{
    collections::{BTreeSet, HashSet},
    rc::Rc,
};

use geocoin_core::{
    CellCoord, Coin, Command, Event, PokeError, Position, StashError, StashPolicy, WELCOME_BANNER,
};
use log::{debug, info, warn};

use cells::{CellCache, CellIdentity};
use inventory::Inventory;
use pits::PitStore;

/// Default side length of a cell, roughly eleven metres of latitude.
pub const DEFAULT_TILE_WIDTH: f64 = 1e-4;
/// Default number of cells visible in each direction around the player.
pub const DEFAULT_VISIBILITY_RADIUS: u32 = 8;

/// Represents the authoritative Geocoin world state.
#[derive(Debug)]
pub struct World {
    banner: &'static str,
    cells: CellCache,
    pits: PitStore,
    inventory: Inventory,
    score: i64,
    visibility_radius: u32,
    stash_policy: StashPolicy,
    player: Position,
    player_cell: CellCoord,
    window: Vec<Rc<CellIdentity>>,
    surveyed: HashSet<CellCoord>,
    minted: u64,
}

impl World {
    /// Creates an empty world using the default geometry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            banner: WELCOME_BANNER,
            cells: CellCache::new(DEFAULT_TILE_WIDTH),
            pits: PitStore::default(),
            inventory: Inventory::default(),
            score: 0,
            visibility_radius: DEFAULT_VISIBILITY_RADIUS,
            stash_policy: StashPolicy::default(),
            player: Position::ORIGIN,
            player_cell: CellCoord::new(0, 0),
            window: Vec::new(),
            surveyed: HashSet::new(),
            minted: 0,
        }
    }

    fn relocate(&mut self, position: Position, out_events: &mut Vec<Event>) {
        self.window = self.cells.cells_near(position, self.visibility_radius);
        self.player = position;
        self.player_cell = self.cells.coord_for_point(position);
        out_events.push(Event::PlayerRelocated {
            position,
            cell: self.player_cell,
        });

        let mut revealed = Vec::new();
        for identity in &self.window {
            let cell = identity.coord();
            if !self.pits.contains(cell) && self.surveyed.insert(cell) {
                revealed.push(cell);
            }
        }
        debug!(
            "player at cell {} revealed {} of {} visible cells",
            self.player_cell,
            revealed.len(),
            self.window.len()
        );
        if !revealed.is_empty() {
            out_events.push(Event::CellsRevealed { cells: revealed });
        }
    }

    /// Serials of coins homed at `home` that are held or resident somewhere.
    fn circulating_serials(&self, home: CellCoord) -> BTreeSet<u32> {
        self.inventory
            .coins()
            .iter()
            .filter(|coin| coin.home() == home)
            .map(|coin| coin.serial())
            .chain(self.pits.serials_from(home))
            .collect()
    }

    fn poke(&mut self, cell: CellCoord) -> Result<Coin, PokeError> {
        let pit = self.pits.get_mut(cell).ok_or(PokeError::NoPit(cell))?;
        let coin = pit.poke()?;
        self.inventory.take(coin);
        self.score += 1;
        Ok(coin)
    }

    fn stash(&mut self, cell: CellCoord) -> Result<Coin, StashError> {
        let pit = self.pits.get_mut(cell).ok_or(StashError::NoPit(cell))?;
        let coin = self.inventory.peek().ok_or(StashError::EmptyInventory)?;
        pit.stash(coin, self.stash_policy)?;
        let _ = self.inventory.give()?;
        self.score -= 1;
        Ok(coin)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureWorld {
            tile_width,
            visibility_radius,
            stash_policy,
        } => {
            if !(tile_width.is_finite() && tile_width > 0.0) {
                warn!("ignoring invalid tile width {tile_width}");
                return;
            }
            if tile_width != world.cells.tile_width() {
                world.surveyed.clear();
                world.window.clear();
            }
            world.cells.set_tile_width(tile_width);
            world.visibility_radius = visibility_radius;
            world.stash_policy = stash_policy;
            world.player_cell = world.cells.coord_for_point(world.player);
            out_events.push(Event::WorldConfigured {
                tile_width,
                visibility_radius,
            });
        }
        Command::Relocate { position } => {
            if !position.is_finite() {
                warn!("ignoring non-finite position {position:?}");
                return;
            }
            if !world.cells.covers(position, world.visibility_radius) {
                warn!("ignoring position {position:?} beyond the addressable grid");
                return;
            }
            world.relocate(position, out_events);
        }
        Command::MaterializePit { cell, parameters } => {
            let _ = world.surveyed.insert(cell);
            let circulating = world.circulating_serials(cell);
            let (pit, created) = world.pits.materialize_or_reuse(cell, parameters, &circulating);
            if created {
                let coin_count = pit.value();
                if !circulating.is_empty() {
                    debug!(
                        "{} coins of cell {cell} already circulate and were not minted",
                        circulating.len()
                    );
                }
                world.minted += u64::from(coin_count);
                debug!("materialized pit at {cell} with {coin_count} coins");
                out_events.push(Event::PitMaterialized { cell, coin_count });
            }
        }
        Command::Poke { cell } => match world.poke(cell) {
            Ok(coin) => out_events.push(Event::CoinCollected {
                cell,
                coin,
                score: world.score,
            }),
            Err(reason) => out_events.push(Event::PokeRejected { cell, reason }),
        },
        Command::Stash { cell } => match world.stash(cell) {
            Ok(coin) => out_events.push(Event::CoinStashed {
                cell,
                coin,
                score: world.score,
            }),
            Err(reason) => out_events.push(Event::StashRejected { cell, reason }),
        },
        Command::Reset => {
            world.pits.clear();
            world.inventory.clear();
            world.score = 0;
            world.surveyed.clear();
            world.minted = 0;
            info!("world reset");
            out_events.push(Event::WorldReset);
        }
    }
}

/// Returns the canonical identity of `cell`, creating it on first use.
pub fn canonicalize(world: &mut World, cell: CellCoord) -> Rc<CellIdentity> {
    world.cells.canonicalize(cell.i(), cell.j())
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::rc::Rc;

    use geocoin_core::{CellCoord, Position, StashPolicy};

    use super::{
        cells::{CellBounds, CellIdentity},
        inventory::Inventory,
        pits::Pit,
        World,
    };

    /// Retrieves the welcome banner that adapters may display to players.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Side length of a single cell in position units.
    #[must_use]
    pub fn tile_width(world: &World) -> f64 {
        world.cells.tile_width()
    }

    /// Number of cells visible in each direction around the player cell.
    #[must_use]
    pub fn visibility_radius(world: &World) -> u32 {
        world.visibility_radius
    }

    /// Rule deciding which pits accept a stashed coin.
    #[must_use]
    pub fn stash_policy(world: &World) -> StashPolicy {
        world.stash_policy
    }

    /// Last position the player relocated to.
    #[must_use]
    pub fn player_position(world: &World) -> Position {
        world.player
    }

    /// Cell containing the player.
    #[must_use]
    pub fn player_cell(world: &World) -> CellCoord {
        world.player_cell
    }

    /// Cells visible from the last relocation, in scan order.
    #[must_use]
    pub fn visible_window(world: &World) -> &[Rc<CellIdentity>] {
        &world.window
    }

    /// Continuous rectangle covered by `cell`.
    #[must_use]
    pub fn cell_bounds(world: &World, cell: CellCoord) -> CellBounds {
        world.cells.bounds(cell)
    }

    /// Number of distinct cells held by the identity cache.
    #[must_use]
    pub fn known_cells(world: &World) -> usize {
        world.cells.len()
    }

    /// Returns the pit hosted by `cell`, if any.
    #[must_use]
    pub fn pit(world: &World, cell: CellCoord) -> Option<&Pit> {
        world.pits.get(cell)
    }

    /// Iterates every pit in coordinate order.
    pub fn pits(world: &World) -> impl Iterator<Item = &Pit> {
        world.pits.iter()
    }

    /// Total number of coins resident across all pits.
    #[must_use]
    pub fn resident_coins(world: &World) -> u64 {
        world.pits.resident_coins()
    }

    /// Coins currently held by the player.
    #[must_use]
    pub fn inventory(world: &World) -> &Inventory {
        &world.inventory
    }

    /// Score accumulated by the player.
    #[must_use]
    pub fn score(world: &World) -> i64 {
        world.score
    }

    /// Number of coins minted since the last reset or restore.
    #[must_use]
    pub fn minted_coins(world: &World) -> u64 {
        world.minted
    }

    /// Reports whether the generator already ruled on `cell`.
    #[must_use]
    pub fn is_surveyed(world: &World, cell: CellCoord) -> bool {
        world.surveyed.contains(&cell)
    }

    /// Reports whether the player can stand at `position`: both components
    /// are finite and the whole visible window has representable indices.
    #[must_use]
    pub fn is_addressable(world: &World, position: Position) -> bool {
        position.is_finite() && world.cells.covers(position, world.visibility_radius)
    }
}

#[cfg(test)]
mod tests {
    use geocoin_core::SpawnParameters;

    use super::*;

    fn materialize(world: &mut World, cell: CellCoord, coins: u32) -> Vec<Event> {
        let mut events = Vec::new();
        apply(
            world,
            Command::MaterializePit {
                cell,
                parameters: SpawnParameters::new(coins),
            },
            &mut events,
        );
        events
    }

    fn run(world: &mut World, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        apply(world, command, &mut events);
        events
    }

    #[test]
    fn relocate_reveals_full_window_once() {
        let mut world = World::new();
        let events = run(
            &mut world,
            Command::Relocate {
                position: Position::ORIGIN,
            },
        );

        let revealed = events.iter().find_map(|event| match event {
            Event::CellsRevealed { cells } => Some(cells.len()),
            _ => None,
        });
        assert_eq!(revealed, Some(17 * 17));
        assert_eq!(query::visible_window(&world).len(), 17 * 17);

        let events = run(
            &mut world,
            Command::Relocate {
                position: Position::ORIGIN,
            },
        );
        assert!(events
            .iter()
            .all(|event| !matches!(event, Event::CellsRevealed { .. })));
    }

    #[test]
    fn materialize_is_idempotent() {
        let mut world = World::new();
        let cell = CellCoord::new(2, 3);
        let first = materialize(&mut world, cell, 3);
        let second = materialize(&mut world, cell, 1);

        assert_eq!(
            first,
            vec![Event::PitMaterialized {
                cell,
                coin_count: 3
            }]
        );
        assert!(second.is_empty());
        assert_eq!(query::minted_coins(&world), 3);
        assert!(query::is_surveyed(&world, cell));
    }

    #[test]
    fn pokes_drain_pit_then_fail() {
        let mut world = World::new();
        let cell = CellCoord::new(0, 0);
        let _ = materialize(&mut world, cell, 3);

        let mut serials = Vec::new();
        for _ in 0..3 {
            for event in run(&mut world, Command::Poke { cell }) {
                if let Event::CoinCollected { coin, .. } = event {
                    serials.push(coin.serial());
                }
            }
        }
        assert_eq!(serials, vec![2, 1, 0]);

        let events = run(&mut world, Command::Poke { cell });
        assert_eq!(
            events,
            vec![Event::PokeRejected {
                cell,
                reason: PokeError::EmptyPit(cell)
            }]
        );
        assert_eq!(query::inventory(&world).len(), 3);
        assert_eq!(query::score(&world), 3);
    }

    #[test]
    fn stash_with_empty_inventory_changes_nothing() {
        let mut world = World::new();
        let cell = CellCoord::new(1, 1);
        let _ = materialize(&mut world, cell, 2);

        let events = run(&mut world, Command::Stash { cell });
        assert_eq!(
            events,
            vec![Event::StashRejected {
                cell,
                reason: StashError::EmptyInventory
            }]
        );
        assert_eq!(query::pit(&world, cell).map(|pit| pit.value()), Some(2));
        assert_eq!(query::score(&world), 0);
    }

    #[test]
    fn stash_returns_most_recent_coin() {
        let mut world = World::new();
        let source = CellCoord::new(0, 0);
        let target = CellCoord::new(0, 1);
        let _ = materialize(&mut world, source, 2);
        let _ = materialize(&mut world, target, 0);
        let _ = run(&mut world, Command::Poke { cell: source });

        let events = run(&mut world, Command::Stash { cell: target });
        assert_eq!(
            events,
            vec![Event::CoinStashed {
                cell: target,
                coin: Coin::new(source, 1),
                score: 0
            }]
        );
        assert!(query::inventory(&world).is_empty());
        assert_eq!(query::pit(&world, target).map(|pit| pit.value()), Some(1));
    }

    #[test]
    fn home_cell_policy_keeps_rejected_coin_in_inventory() {
        let mut world = World::new();
        let _ = run(
            &mut world,
            Command::ConfigureWorld {
                tile_width: DEFAULT_TILE_WIDTH,
                visibility_radius: 2,
                stash_policy: StashPolicy::HomeCell,
            },
        );
        let source = CellCoord::new(0, 0);
        let target = CellCoord::new(5, 5);
        let _ = materialize(&mut world, source, 1);
        let _ = materialize(&mut world, target, 1);
        let _ = run(&mut world, Command::Poke { cell: source });

        let coin = Coin::new(source, 0);
        let events = run(&mut world, Command::Stash { cell: target });
        assert_eq!(
            events,
            vec![Event::StashRejected {
                cell: target,
                reason: StashError::InvalidToken { coin, cell: target }
            }]
        );
        assert_eq!(query::inventory(&world).peek(), Some(coin));
        assert_eq!(query::score(&world), 1);

        let events = run(&mut world, Command::Stash { cell: source });
        assert!(matches!(events[0], Event::CoinStashed { .. }));
    }

    #[test]
    fn poke_without_pit_is_rejected() {
        let mut world = World::new();
        let cell = CellCoord::new(9, 9);
        let events = run(&mut world, Command::Poke { cell });
        assert_eq!(
            events,
            vec![Event::PokeRejected {
                cell,
                reason: PokeError::NoPit(cell)
            }]
        );
    }

    #[test]
    fn reset_clears_mutable_state_and_survey() {
        let mut world = World::new();
        let _ = run(
            &mut world,
            Command::Relocate {
                position: Position::ORIGIN,
            },
        );
        let cell = CellCoord::new(0, 0);
        let _ = materialize(&mut world, cell, 2);
        let _ = run(&mut world, Command::Poke { cell });

        let events = run(&mut world, Command::Reset);
        assert_eq!(events, vec![Event::WorldReset]);
        assert_eq!(query::pits(&world).count(), 0);
        assert!(query::inventory(&world).is_empty());
        assert_eq!(query::score(&world), 0);
        assert!(!query::is_surveyed(&world, cell));
    }

    #[test]
    fn invalid_tile_width_is_ignored() {
        let mut world = World::new();
        let events = run(
            &mut world,
            Command::ConfigureWorld {
                tile_width: 0.0,
                visibility_radius: 1,
                stash_policy: StashPolicy::Anywhere,
            },
        );
        assert!(events.is_empty());
        assert_eq!(query::tile_width(&world), DEFAULT_TILE_WIDTH);
        assert_eq!(query::visibility_radius(&world), DEFAULT_VISIBILITY_RADIUS);
    }

    #[test]
    fn relocation_beyond_the_grid_is_ignored() {
        let mut world = World::new();
        let _ = run(
            &mut world,
            Command::Relocate {
                position: Position::ORIGIN,
            },
        );
        let far = Position::new(1e6, 0.0);
        assert!(!query::is_addressable(&world, far));

        let events = run(&mut world, Command::Relocate { position: far });
        assert!(events.is_empty());
        assert_eq!(query::player_position(&world), Position::ORIGIN);
        assert_eq!(query::player_cell(&world), CellCoord::new(0, 0));
        assert!(query::visible_window(&world)
            .iter()
            .all(|identity| identity.coord().chebyshev_distance(CellCoord::new(0, 0)) <= 8));
    }

    #[test]
    fn materialize_skips_coins_already_held() {
        let mut world = World::new();
        let home = CellCoord::new(4, 4);
        let _ = materialize(&mut world, home, 2);
        let _ = run(&mut world, Command::Poke { cell: home });
        let held = query::inventory(&world).peek().expect("coin held");

        let _ = run(&mut world, Command::Reset);
        world.inventory.take(held);
        let events = materialize(&mut world, home, 2);

        assert!(events.contains(&Event::PitMaterialized {
            cell: home,
            coin_count: 1
        }));
        let pit = query::pit(&world, home).expect("pit created");
        assert!(!pit.contains(held));
        assert_eq!(pit.coins().map(|coin| coin.serial()).collect::<Vec<_>>(), vec![0]);
    }
}