use geocoin_common::{Cell, Coin};
use serde::{Deserialize, Serialize};

/// Errors raised when a memento cannot be turned back into a cache.
#[derive(Debug, thiserror::Error)]
pub enum MementoError {
    #[error("memento addresses cell {found}, expected {expected}")]
    CellMismatch { expected: Cell, found: Cell },
}

/// Number of coins a freshly spawned cache receives.
///
/// The square root biases generation toward small caches; `scale` bounds the maximum.
pub fn coin_count_for(luck: f64, scale: f64) -> u32 {
    (luck.sqrt() * scale).floor() as u32
}

/// Serialized snapshot of one cache: its cell address and coins in order.
///
/// Wire form is `{"i":..,"j":..,"coins":[{"i":..,"j":..,"serial":..}]}`; it is
/// embedded as-is in the persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMemento {
    pub i: i32,
    pub j: i32,
    pub coins: Vec<Coin>,
}

impl CacheMemento {
    pub fn cell(&self) -> Cell {
        Cell::new(self.i, self.j)
    }
}

/// The coin holder for one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geocache {
    cell: Cell,
    coins: Vec<Coin>,
}

impl Geocache {
    /// A cache with no coins.
    pub fn empty(cell: Cell) -> Self {
        Self {
            cell,
            coins: Vec::new(),
        }
    }

    /// Mint `num_coins` coins with serials `0..num_coins`, all homed at `cell`.
    pub fn spawn(cell: Cell, num_coins: u32) -> Self {
        Self {
            cell,
            coins: (0..num_coins).map(|serial| Coin::new(cell, serial)).collect(),
        }
    }

    /// Rebuild a cache exactly as it was when snapshotted, coin order included.
    pub fn restore(memento: &CacheMemento) -> Self {
        Self {
            cell: memento.cell(),
            coins: memento.coins.clone(),
        }
    }

    pub fn cell(&self) -> Cell {
        self.cell
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    /// Remove and return the first coin with this serial.
    pub fn pick_up(&mut self, serial: u32) -> Option<Coin> {
        let index = self.coins.iter().position(|c| c.serial == serial)?;
        Some(self.coins.remove(index))
    }

    /// Append a coin. No uniqueness check is made.
    pub fn drop_coin(&mut self, coin: Coin) {
        self.coins.push(coin);
    }

    /// True when the same coin (home and serial) appears more than once.
    pub fn has_duplicate_coins(&self) -> bool {
        let mut seen = std::collections::HashSet::with_capacity(self.coins.len());
        self.coins.iter().any(|c| !seen.insert(*c))
    }

    pub fn snapshot(&self) -> CacheMemento {
        CacheMemento {
            i: self.cell.i,
            j: self.cell.j,
            coins: self.coins.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_mints_sequential_serials() {
        let cell = Cell::new(4, -2);
        let cache = Geocache::spawn(cell, 3);
        assert_eq!(cache.len(), 3);
        for (expected, coin) in cache.coins().iter().enumerate() {
            assert_eq!(coin.serial, expected as u32);
            assert_eq!(coin.home(), cell);
        }
    }

    #[test]
    fn coin_count_is_sqrt_biased() {
        assert_eq!(coin_count_for(0.0, 11.0), 0);
        assert_eq!(coin_count_for(0.25, 11.0), 5);
        assert_eq!(coin_count_for(0.09, 11.0), 3);
        assert_eq!(coin_count_for(0.999_999, 11.0), 10);
    }

    #[test]
    fn pick_up_removes_first_match() {
        let mut cache = Geocache::spawn(Cell::new(0, 0), 3);
        let coin = cache.pick_up(1).unwrap();
        assert_eq!(coin.serial, 1);
        let serials: Vec<u32> = cache.coins().iter().map(|c| c.serial).collect();
        assert_eq!(serials, vec![0, 2]);
    }

    #[test]
    fn pick_up_missing_serial_is_none() {
        let mut cache = Geocache::spawn(Cell::new(0, 0), 2);
        assert!(cache.pick_up(7).is_none());
        assert_eq!(cache.len(), 2);
        assert!(Geocache::empty(Cell::new(1, 1)).pick_up(0).is_none());
    }

    #[test]
    fn drop_appends_foreign_coin() {
        let mut cache = Geocache::spawn(Cell::new(0, 0), 1);
        let foreign = Coin::new(Cell::new(9, 9), 4);
        cache.drop_coin(foreign);
        assert_eq!(cache.coins().last(), Some(&foreign));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn duplicate_drop_is_reported_not_prevented() {
        let mut cache = Geocache::spawn(Cell::new(0, 0), 2);
        assert!(!cache.has_duplicate_coins());
        cache.drop_coin(Coin::new(Cell::new(0, 0), 1));
        assert_eq!(cache.len(), 3);
        assert!(cache.has_duplicate_coins());
    }

    #[test]
    fn snapshot_restore_roundtrip_keeps_order() {
        let mut cache = Geocache::spawn(Cell::new(-3, 12), 4);
        cache.pick_up(0);
        cache.drop_coin(Coin::new(Cell::new(5, 5), 9));
        let restored = Geocache::restore(&cache.snapshot());
        assert_eq!(restored, cache);
        assert_eq!(restored.coins(), cache.coins());
    }

    #[test]
    fn memento_wire_form() {
        let mut cache = Geocache::spawn(Cell::new(1, -1), 1);
        cache.drop_coin(Coin::new(Cell::new(2, 3), 0));
        let text = serde_json::to_string(&cache.snapshot()).unwrap();
        assert_eq!(
            text,
            r#"{"i":1,"j":-1,"coins":[{"i":1,"j":-1,"serial":0},{"i":2,"j":3,"serial":0}]}"#
        );
        let decoded: CacheMemento = serde_json::from_str(&text).unwrap();
        assert_eq!(Geocache::restore(&decoded), cache);
    }

    #[test]
    fn memento_missing_field_is_rejected() {
        assert!(serde_json::from_str::<CacheMemento>(r#"{"i":1,"coins":[]}"#).is_err());
        assert!(serde_json::from_str::<CacheMemento>("not json").is_err());
    }
}
