//! Ledger of the coins held by the player.

use geocoin_core::{Coin, StashError};

/// Stack of coins held by the player, most recently collected last.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Inventory {
    coins: Vec<Coin>,
}

impl Inventory {
    /// Records a coin collected from a pit.
    pub(crate) fn take(&mut self, coin: Coin) {
        self.coins.push(coin);
    }

    /// Hands back the most recently collected coin.
    pub(crate) fn give(&mut self) -> Result<Coin, StashError> {
        self.coins.pop().ok_or(StashError::EmptyInventory)
    }

    pub(crate) fn clear(&mut self) {
        self.coins.clear();
    }

    /// Coin that the next stash would hand back.
    #[must_use]
    pub fn peek(&self) -> Option<Coin> {
        self.coins.last().copied()
    }

    /// Reports whether the player holds `coin`.
    #[must_use]
    pub fn contains(&self, coin: Coin) -> bool {
        self.coins.contains(&coin)
    }

    /// Held coins, oldest first.
    #[must_use]
    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    /// Number of coins held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coins.len()
    }

    /// Reports whether the player holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use geocoin_core::CellCoord;

    use super::*;

    #[test]
    fn give_returns_most_recent_coin() {
        let mut inventory = Inventory::default();
        let first = Coin::new(CellCoord::new(0, 0), 0);
        let second = Coin::new(CellCoord::new(1, 0), 3);
        inventory.take(first);
        inventory.take(second);

        assert_eq!(inventory.peek(), Some(second));
        assert_eq!(inventory.give(), Ok(second));
        assert_eq!(inventory.give(), Ok(first));
        assert_eq!(inventory.give(), Err(StashError::EmptyInventory));
        assert!(inventory.is_empty());
    }
}
