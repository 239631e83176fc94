#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Geocoin engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams and respond
//! exclusively with new command batches.
//!
//! The persisted record types ([`PersistedState`], [`PitRecord`],
//! [`CoinRecord`]) describe the durable layout shared by the world snapshot
//! and the storage adapters.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str = "Welcome to Geocoin.";

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Configures the lattice geometry and the stash rules of the world.
    ConfigureWorld {
        /// Side length of a single square cell in position units.
        tile_width: f64,
        /// Number of cells visible in each direction around the player cell.
        visibility_radius: u32,
        /// Rule deciding which pits accept a stashed coin.
        stash_policy: StashPolicy,
    },
    /// Moves the player to a continuous position and reveals the window around it.
    Relocate {
        /// Position reported by the position source.
        position: Position,
    },
    /// Requests that a pit be created for a cell unless one already exists.
    MaterializePit {
        /// Cell that should host the pit.
        cell: CellCoord,
        /// Initial parameters decided by the generator.
        parameters: SpawnParameters,
    },
    /// Moves the highest-serial coin of a pit into the player's inventory.
    Poke {
        /// Cell whose pit is poked.
        cell: CellCoord,
    },
    /// Moves the most recently collected coin back into a pit.
    Stash {
        /// Cell whose pit receives the coin.
        cell: CellCoord,
    },
    /// Clears every pit, the inventory, the score and the surveyed cells.
    Reset,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that the world adopted a new configuration.
    WorldConfigured {
        /// Side length of a single square cell in position units.
        tile_width: f64,
        /// Number of cells visible in each direction around the player cell.
        visibility_radius: u32,
    },
    /// Confirms that the player moved.
    PlayerRelocated {
        /// Position the player now occupies.
        position: Position,
        /// Cell containing the new position.
        cell: CellCoord,
    },
    /// Lists visible cells the generator has not ruled on yet.
    CellsRevealed {
        /// Newly visible cells without a pit, in window scan order.
        cells: Vec<CellCoord>,
    },
    /// Confirms that a pit was created.
    PitMaterialized {
        /// Cell hosting the new pit.
        cell: CellCoord,
        /// Number of coins minted into the pit.
        coin_count: u32,
    },
    /// Confirms that a coin left a pit and entered the inventory.
    CoinCollected {
        /// Cell of the poked pit.
        cell: CellCoord,
        /// Coin that moved into the inventory.
        coin: Coin,
        /// Score after the poke.
        score: i64,
    },
    /// Confirms that a coin left the inventory and entered a pit.
    CoinStashed {
        /// Cell of the receiving pit.
        cell: CellCoord,
        /// Coin that moved into the pit.
        coin: Coin,
        /// Score after the stash.
        score: i64,
    },
    /// Reports that a poke request was rejected without changing state.
    PokeRejected {
        /// Cell addressed by the request.
        cell: CellCoord,
        /// Specific reason the poke failed.
        reason: PokeError,
    },
    /// Reports that a stash request was rejected without changing state.
    StashRejected {
        /// Cell addressed by the request.
        cell: CellCoord,
        /// Specific reason the stash failed.
        reason: StashError,
    },
    /// Confirms that all mutable world state was cleared.
    WorldReset,
}

/// Cardinal movement directions available to the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Movement toward increasing `i` (latitude).
    North,
    /// Movement toward increasing `j` (longitude).
    East,
    /// Movement toward decreasing `i` (latitude).
    South,
    /// Movement toward decreasing `j` (longitude).
    West,
}

impl Direction {
    /// Offset in cells applied by a single step in this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (1, 0),
            Self::East => (0, 1),
            Self::South => (-1, 0),
            Self::West => (0, -1),
        }
    }
}

/// Location of a single lattice cell expressed as signed `(i, j)` indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    i: i32,
    j: i32,
}

impl CellCoord {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }

    /// Latitude index of the cell.
    #[must_use]
    pub const fn i(&self) -> i32 {
        self.i
    }

    /// Longitude index of the cell.
    #[must_use]
    pub const fn j(&self) -> i32 {
        self.j
    }

    /// Returns the cell displaced by the provided offsets.
    #[must_use]
    pub const fn offset(self, di: i32, dj: i32) -> Self {
        Self::new(self.i.wrapping_add(di), self.j.wrapping_add(dj))
    }

    /// Computes the Chebyshev distance between two cell coordinates.
    #[must_use]
    pub fn chebyshev_distance(self, other: CellCoord) -> u32 {
        self.i.abs_diff(other.i).max(self.j.abs_diff(other.j))
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.i, self.j)
    }
}

/// Continuous position on the plane, as supplied by a position source.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    lat: f64,
    lng: f64,
}

impl Position {
    /// Null Island, the default origin of a fresh session.
    pub const ORIGIN: Self = Self::new(0.0, 0.0);

    /// Creates a new position.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Latitude-like component.
    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude-like component.
    #[must_use]
    pub const fn lng(&self) -> f64 {
        self.lng
    }

    /// Returns the position moved by one tile in the provided direction.
    #[must_use]
    pub fn step(self, direction: Direction, tile_width: f64) -> Self {
        let (di, dj) = direction.offset();
        Self::new(
            self.lat + f64::from(di) * tile_width,
            self.lng + f64::from(dj) * tile_width,
        )
    }

    /// Reports whether both components are finite numbers.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Discrete, individually identifiable unit that moves between pits and the inventory.
///
/// Identity is the `(home, serial)` pair. Ordering places higher serials last so
/// a pit's ordered set yields its highest-serial coin first when popped from the
/// back; ties across foreign home cells fall back to coordinate order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Coin {
    home: CellCoord,
    serial: u32,
}

impl Coin {
    /// Creates a coin minted at `home` with the provided serial.
    #[must_use]
    pub const fn new(home: CellCoord, serial: u32) -> Self {
        Self { home, serial }
    }

    /// Cell where the coin was minted.
    #[must_use]
    pub const fn home(&self) -> CellCoord {
        self.home
    }

    /// Serial number unique among coins sharing the same home cell.
    #[must_use]
    pub const fn serial(&self) -> u32 {
        self.serial
    }
}

impl Ord for Coin {
    fn cmp(&self, other: &Self) -> Ordering {
        self.serial
            .cmp(&other.serial)
            .then_with(|| self.home.cmp(&other.home))
    }
}

impl PartialOrd for Coin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.home.i, self.home.j, self.serial)
    }
}

/// Initial parameters of a freshly spawned pit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpawnParameters {
    coin_count: u32,
}

impl SpawnParameters {
    /// Creates spawn parameters minting `coin_count` coins.
    #[must_use]
    pub const fn new(coin_count: u32) -> Self {
        Self { coin_count }
    }

    /// Initial value counter of the pit, always equal to the coin count.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.coin_count
    }

    /// Number of coins minted into the pit.
    #[must_use]
    pub const fn coin_count(&self) -> u32 {
        self.coin_count
    }
}

/// Rule deciding which pits accept a stashed coin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StashPolicy {
    /// Coins are fungible and may be stashed into any pit.
    #[default]
    Anywhere,
    /// Coins may only return to the pit of their home cell.
    HomeCell,
}

impl StashPolicy {
    /// Reports whether a coin may be stashed into the pit at `cell`.
    #[must_use]
    pub fn admits(self, coin: Coin, cell: CellCoord) -> bool {
        match self {
            Self::Anywhere => true,
            Self::HomeCell => coin.home() == cell,
        }
    }
}

impl FromStr for StashPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anywhere" => Ok(Self::Anywhere),
            "home-cell" | "home" => Ok(Self::HomeCell),
            other => Err(format!("unknown stash policy '{other}'")),
        }
    }
}

/// Reasons a poke request can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum PokeError {
    /// The addressed cell does not host a pit.
    #[error("there is no pit at cell {0}")]
    NoPit(CellCoord),
    /// The pit holds no coins.
    #[error("the pit at cell {0} is empty")]
    EmptyPit(CellCoord),
}

/// Reasons a stash request can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum StashError {
    /// The addressed cell does not host a pit.
    #[error("there is no pit at cell {0}")]
    NoPit(CellCoord),
    /// The player holds no coins.
    #[error("nothing to stash")]
    EmptyInventory,
    /// The coin on top of the inventory is not accepted by the pit.
    #[error("coin {coin} cannot be stashed at cell {cell}")]
    InvalidToken {
        /// Coin that was offered.
        coin: Coin,
        /// Cell of the pit that refused it.
        cell: CellCoord,
    },
}

/// Persisted description of a coin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinRecord {
    /// Latitude index of the coin's home cell.
    pub home_cell_i: i32,
    /// Longitude index of the coin's home cell.
    pub home_cell_j: i32,
    /// Serial number of the coin within its home cell.
    pub serial: u32,
}

impl From<Coin> for CoinRecord {
    fn from(coin: Coin) -> Self {
        Self {
            home_cell_i: coin.home().i(),
            home_cell_j: coin.home().j(),
            serial: coin.serial(),
        }
    }
}

impl From<CoinRecord> for Coin {
    fn from(record: CoinRecord) -> Self {
        Coin::new(
            CellCoord::new(record.home_cell_i, record.home_cell_j),
            record.serial,
        )
    }
}

/// Persisted memento of a single pit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitRecord {
    /// Latitude index of the pit's cell.
    pub i: i32,
    /// Longitude index of the pit's cell.
    pub j: i32,
    /// Value counter of the pit.
    pub value: u32,
    /// Coins resident in the pit.
    #[serde(rename = "tokens")]
    pub coins: Vec<CoinRecord>,
}

impl PitRecord {
    /// Cell coordinate described by the record.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        CellCoord::new(self.i, self.j)
    }
}

/// Complete durable state of a play session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Every pit known to the world.
    pub pits: Vec<PitRecord>,
    /// Coins held by the player, oldest first.
    pub inventory: Vec<CoinRecord>,
    /// Score accumulated by the player.
    pub score: i64,
    /// Last known player position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<Position>,
}

/// Section of the persisted state a record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordSection {
    /// The persisted document as a whole.
    Document,
    /// An entry of the pit sequence.
    Pit,
    /// An entry of the inventory sequence.
    Inventory,
    /// The scalar score entry.
    Score,
    /// The player position entry.
    Player,
}

impl fmt::Display for RecordSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Document => "document",
            Self::Pit => "pit",
            Self::Inventory => "inventory",
            Self::Score => "score",
            Self::Player => "player",
        };
        f.write_str(label)
    }
}

/// Reasons a persisted record is rejected during restore.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The record does not have the expected shape or numeric ranges.
    #[error("malformed record: {0}")]
    Malformed(String),
    /// The pit value does not match its coin count.
    #[error("pit value {value} does not match its {coins} coins")]
    ValueMismatch {
        /// Value stored in the record.
        value: u32,
        /// Number of coins stored in the record.
        coins: usize,
    },
    /// A pit for the same cell was already restored.
    #[error("duplicate pit at cell {0}")]
    DuplicatePit(CellCoord),
    /// The coin is already resident elsewhere.
    #[error("coin {0} is already accounted for")]
    DuplicateCoin(Coin),
    /// The coin does not belong in the pit under the active stash policy.
    #[error("coin {coin} does not belong in the pit at cell {cell}")]
    ForeignCoin {
        /// Offending coin.
        coin: Coin,
        /// Cell of the pit that listed it.
        cell: CellCoord,
    },
}

/// Persisted entry skipped during restore.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{section} record {index} skipped: {reason}")]
pub struct CorruptRecord {
    /// Section of the persisted state containing the entry.
    pub section: RecordSection,
    /// Zero-based index of the entry within its section, counted over the
    /// entries that reached the stage which rejected it.
    pub index: usize,
    /// Reason the entry was skipped.
    pub reason: RecordError,
}

impl CorruptRecord {
    /// Creates a new corrupt record description.
    #[must_use]
    pub const fn new(section: RecordSection, index: usize, reason: RecordError) -> Self {
        Self {
            section,
            index,
            reason,
        }
    }
}
