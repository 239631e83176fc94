//! Capture and restore of the world's durable state.

use std::collections::{BTreeSet, HashSet};

use geocoin_core::{
    CellCoord, Coin, CorruptRecord, PersistedState, PitRecord, RecordError, RecordSection,
    StashPolicy,
};
use log::{info, warn};

use crate::{pits::Pit, query, World};

/// Captures the durable state of the world.
///
/// Pits are listed in coordinate order, coins lowest serial first, and the
/// inventory oldest first.
#[must_use]
pub fn capture(world: &World) -> PersistedState {
    PersistedState {
        pits: world
            .pits
            .iter()
            .map(|pit| PitRecord {
                i: pit.cell().i(),
                j: pit.cell().j(),
                value: pit.value(),
                coins: pit.coins().map(Into::into).collect(),
            })
            .collect(),
        inventory: world.inventory.coins().iter().map(|coin| (*coin).into()).collect(),
        score: world.score,
        player: Some(world.player),
    }
}

/// Replaces the world's pits, inventory, score and player position with `state`.
///
/// Records that violate an invariant are skipped, logged and returned; every
/// other record is still restored. Surveyed cells are forgotten so the next
/// relocation consults the generator for cells without a restored pit, except
/// the cells of skipped pit records: those stay empty so their coins are not
/// minted a second time.
pub fn restore(world: &mut World, state: PersistedState) -> Vec<CorruptRecord> {
    let mut corrupt = Vec::new();
    let mut seen: HashSet<Coin> = HashSet::new();
    let policy = world.stash_policy;

    world.pits.clear();
    world.inventory.clear();
    world.surveyed.clear();

    for (index, record) in state.pits.into_iter().enumerate() {
        let cell = record.cell();
        if world.pits.contains(cell) {
            corrupt.push(CorruptRecord::new(
                RecordSection::Pit,
                index,
                RecordError::DuplicatePit(cell),
            ));
            continue;
        }
        match validate_pit(&record, policy, &seen) {
            Ok(coins) => {
                seen.extend(coins.iter().copied());
                world.pits.insert(Pit::restored(cell, coins));
            }
            Err(reason) => {
                let _ = world.surveyed.insert(cell);
                corrupt.push(CorruptRecord::new(RecordSection::Pit, index, reason));
            }
        }
    }

    for (index, record) in state.inventory.into_iter().enumerate() {
        let coin = Coin::from(record);
        if seen.insert(coin) {
            world.inventory.take(coin);
        } else {
            corrupt.push(CorruptRecord::new(
                RecordSection::Inventory,
                index,
                RecordError::DuplicateCoin(coin),
            ));
        }
    }

    world.score = state.score;
    if usize::try_from(world.score).ok() != Some(world.inventory.len()) {
        warn!(
            "restored score {} disagrees with {} held coins",
            world.score,
            world.inventory.len()
        );
    }

    match state.player {
        Some(position) if query::is_addressable(world, position) => {
            world.player = position;
            world.player_cell = world.cells.coord_for_point(position);
        }
        Some(_) => corrupt.push(CorruptRecord::new(
            RecordSection::Player,
            0,
            RecordError::Malformed("player position is outside the grid".to_owned()),
        )),
        None => {}
    }

    world.minted = world.pits.resident_coins() + world.inventory.len() as u64;

    for record in &corrupt {
        warn!("{record}");
    }
    info!(
        "restored {} pits and {} held coins ({} records skipped)",
        world.pits.len(),
        world.inventory.len(),
        corrupt.len()
    );

    corrupt
}

fn validate_pit(
    record: &PitRecord,
    policy: StashPolicy,
    seen: &HashSet<Coin>,
) -> Result<BTreeSet<Coin>, RecordError> {
    if usize::try_from(record.value).ok() != Some(record.coins.len()) {
        return Err(RecordError::ValueMismatch {
            value: record.value,
            coins: record.coins.len(),
        });
    }

    let cell: CellCoord = record.cell();
    let mut coins = BTreeSet::new();
    for coin in record.coins.iter().copied().map(Coin::from) {
        if seen.contains(&coin) || !coins.insert(coin) {
            return Err(RecordError::DuplicateCoin(coin));
        }
        if !policy.admits(coin, cell) {
            return Err(RecordError::ForeignCoin { coin, cell });
        }
    }
    Ok(coins)
}
