//! Pit records and the store that owns them.

use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

use geocoin_core::{CellCoord, Coin, PokeError, SpawnParameters, StashError, StashPolicy};

/// Mutable content of a single cell: the coins currently resident in it.
///
/// The value counter is derived from the resident coin set, so it always
/// equals the coin count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pit {
    cell: CellCoord,
    coins: BTreeSet<Coin>,
}

impl Pit {
    /// Mints serials `0..coin_count`, leaving out serials already in circulation.
    fn mint(cell: CellCoord, parameters: SpawnParameters, circulating: &BTreeSet<u32>) -> Self {
        Self {
            cell,
            coins: (0..parameters.coin_count())
                .filter(|serial| !circulating.contains(serial))
                .map(|serial| Coin::new(cell, serial))
                .collect(),
        }
    }

    pub(crate) fn restored(cell: CellCoord, coins: BTreeSet<Coin>) -> Self {
        Self { cell, coins }
    }

    /// Cell hosting the pit.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Value counter of the pit.
    #[must_use]
    pub fn value(&self) -> u32 {
        u32::try_from(self.coins.len()).unwrap_or(u32::MAX)
    }

    /// Reports whether no coin is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    /// Resident coins, lowest serial first.
    pub fn coins(&self) -> impl Iterator<Item = Coin> + '_ {
        self.coins.iter().copied()
    }

    /// Reports whether the coin is resident in this pit.
    #[must_use]
    pub fn contains(&self, coin: Coin) -> bool {
        self.coins.contains(&coin)
    }

    /// Removes and returns the highest-serial resident coin.
    pub(crate) fn poke(&mut self) -> Result<Coin, PokeError> {
        self.coins.pop_last().ok_or(PokeError::EmptyPit(self.cell))
    }

    /// Checks whether `coin` may be stashed here without mutating the pit.
    pub(crate) fn accepts(&self, coin: Coin, policy: StashPolicy) -> Result<(), StashError> {
        if self.coins.contains(&coin) || !policy.admits(coin, self.cell) {
            return Err(StashError::InvalidToken {
                coin,
                cell: self.cell,
            });
        }
        Ok(())
    }

    /// Inserts `coin` after validating it against the stash policy.
    pub(crate) fn stash(&mut self, coin: Coin, policy: StashPolicy) -> Result<(), StashError> {
        self.accepts(coin, policy)?;
        let _ = self.coins.insert(coin);
        Ok(())
    }
}

/// Collection of live pits keyed by their exact cell coordinate.
#[derive(Debug, Default)]
pub struct PitStore {
    pits: BTreeMap<CellCoord, Pit>,
}

impl PitStore {
    /// Returns the existing pit for `cell`, or mints a new one from `parameters`.
    ///
    /// Serials listed in `circulating` already exist elsewhere (held by the
    /// player or resident in another pit) and are not minted again. The
    /// boolean reports whether a pit was created.
    pub(crate) fn materialize_or_reuse(
        &mut self,
        cell: CellCoord,
        parameters: SpawnParameters,
        circulating: &BTreeSet<u32>,
    ) -> (&Pit, bool) {
        match self.pits.entry(cell) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(Pit::mint(cell, parameters, circulating)), true),
        }
    }

    /// Serials of coins homed at `home` that are resident in any pit.
    pub(crate) fn serials_from(&self, home: CellCoord) -> impl Iterator<Item = u32> + '_ {
        self.pits
            .values()
            .flat_map(|pit| pit.coins.iter())
            .filter(move |coin| coin.home() == home)
            .map(|coin| coin.serial())
    }

    pub(crate) fn insert(&mut self, pit: Pit) {
        let _ = self.pits.insert(pit.cell, pit);
    }

    pub(crate) fn get_mut(&mut self, cell: CellCoord) -> Option<&mut Pit> {
        self.pits.get_mut(&cell)
    }

    pub(crate) fn clear(&mut self) {
        self.pits.clear();
    }

    /// Returns the pit hosted by `cell`, if any.
    #[must_use]
    pub fn get(&self, cell: CellCoord) -> Option<&Pit> {
        self.pits.get(&cell)
    }

    /// Reports whether `cell` hosts a pit.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        self.pits.contains_key(&cell)
    }

    /// Iterates the pits in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = &Pit> {
        self.pits.values()
    }

    /// Number of pits in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pits.len()
    }

    /// Reports whether the store holds no pits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pits.is_empty()
    }

    /// Total number of coins resident across all pits.
    #[must_use]
    pub fn resident_coins(&self) -> u64 {
        self.pits.values().map(|pit| u64::from(pit.value())).sum()
    }
}
