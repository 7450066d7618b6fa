use geocoin_common::{Cell, Coin};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::geocache::{CacheMemento, Geocache, MementoError};

/// An event record produced by every mutation of the world.
///
/// Rendering layers drain these to learn which markers to add, refresh or remove,
/// without ever reaching into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// A never-visited cell passed its spawn test and received a fresh cache.
    Spawned { cell: Cell, coins: u32 },
    /// An archived cache was materialized again.
    Restored { cell: Cell },
    /// A live cache was snapshotted and its live instance discarded.
    Archived { cell: Cell },
    /// A coin left a cache.
    CoinTaken { cell: Cell, coin: Coin },
    /// A coin was deposited into a cache.
    CoinDeposited { cell: Cell, coin: Coin },
    /// Every tracked cache was forgotten.
    Cleared,
}

/// Most events the world keeps before dropping the oldest.
pub const EVENT_LOG_CAPACITY: usize = 1024;

/// What the store holds for one tracked cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheSlot {
    Live(Geocache),
    Archived(CacheMemento),
}

/// Sparse store from cell to cache.
///
/// Cells that never held a cache are absent and cost nothing. Entries are kept
/// for the lifetime of the session; memory grows with the number of distinct
/// cache cells visited.
///
/// Uses BTreeMap so iteration, persistence and `state_hash` follow cell order.
#[derive(Debug, Clone, Default)]
pub struct World {
    caches: BTreeMap<Cell, CacheSlot>,
    event_log: VecDeque<WorldEvent>,
    dropped_events: u64,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked cells, live or archived.
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.caches
            .values()
            .filter(|slot| matches!(slot, CacheSlot::Live(_)))
            .count()
    }

    pub fn archived_count(&self) -> usize {
        self.len() - self.live_count()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.caches.contains_key(&cell)
    }

    pub fn is_live(&self, cell: Cell) -> bool {
        matches!(self.caches.get(&cell), Some(CacheSlot::Live(_)))
    }

    pub fn is_archived(&self, cell: Cell) -> bool {
        matches!(self.caches.get(&cell), Some(CacheSlot::Archived(_)))
    }

    pub fn slot(&self, cell: Cell) -> Option<&CacheSlot> {
        self.caches.get(&cell)
    }

    /// The live cache for a cell, if it is materialized.
    pub fn get(&self, cell: Cell) -> Option<&Geocache> {
        match self.caches.get(&cell) {
            Some(CacheSlot::Live(cache)) => Some(cache),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, cell: Cell) -> Option<&mut Geocache> {
        match self.caches.get_mut(&cell) {
            Some(CacheSlot::Live(cache)) => Some(cache),
            _ => None,
        }
    }

    /// Iterate over live caches in cell order.
    pub fn live_caches(&self) -> impl Iterator<Item = &Geocache> {
        self.caches.values().filter_map(|slot| match slot {
            CacheSlot::Live(cache) => Some(cache),
            CacheSlot::Archived(_) => None,
        })
    }

    /// Register or overwrite the live cache for a cell.
    pub fn set(&mut self, cell: Cell, cache: Geocache) {
        self.caches.insert(cell, CacheSlot::Live(cache));
    }

    /// Mint a new cache for a cell and install it live.
    pub fn spawn(&mut self, cell: Cell, num_coins: u32) {
        tracing::debug!(%cell, coins = num_coins, "spawning cache");
        self.caches
            .insert(cell, CacheSlot::Live(Geocache::spawn(cell, num_coins)));
        self.record(WorldEvent::Spawned {
            cell,
            coins: num_coins,
        });
    }

    /// Snapshot of a tracked cell: fresh for a live cache, stored for an archived one.
    pub fn snapshot_of(&self, cell: Cell) -> Option<CacheMemento> {
        match self.caches.get(&cell)? {
            CacheSlot::Live(cache) => Some(cache.snapshot()),
            CacheSlot::Archived(memento) => Some(memento.clone()),
        }
    }

    /// Materialize a cache from a memento and install it live.
    pub fn restore_from_memento(
        &mut self,
        cell: Cell,
        memento: &CacheMemento,
    ) -> Result<(), MementoError> {
        if memento.cell() != cell {
            return Err(MementoError::CellMismatch {
                expected: cell,
                found: memento.cell(),
            });
        }
        tracing::debug!(%cell, coins = memento.coins.len(), "restoring cache");
        self.caches
            .insert(cell, CacheSlot::Live(Geocache::restore(memento)));
        self.record(WorldEvent::Restored { cell });
        Ok(())
    }

    /// Materialize an archived cell. Returns false if the cell is not archived.
    pub fn revive(&mut self, cell: Cell) -> Result<bool, MementoError> {
        let memento = match self.caches.get(&cell) {
            Some(CacheSlot::Archived(memento)) => memento.clone(),
            _ => return Ok(false),
        };
        self.restore_from_memento(cell, &memento)?;
        Ok(true)
    }

    /// Record a memento without materializing it (used when loading a session).
    pub fn insert_archived(
        &mut self,
        cell: Cell,
        memento: CacheMemento,
    ) -> Result<(), MementoError> {
        if memento.cell() != cell {
            return Err(MementoError::CellMismatch {
                expected: cell,
                found: memento.cell(),
            });
        }
        self.caches.insert(cell, CacheSlot::Archived(memento));
        Ok(())
    }

    /// Snapshot a live cache and drop the live instance. Returns false if it was not live.
    pub fn archive(&mut self, cell: Cell) -> bool {
        let Some(slot) = self.caches.get_mut(&cell) else {
            return false;
        };
        let memento = match slot {
            CacheSlot::Live(cache) => cache.snapshot(),
            CacheSlot::Archived(_) => return false,
        };
        tracing::debug!(%cell, coins = memento.coins.len(), "archiving cache");
        *slot = CacheSlot::Archived(memento);
        self.record(WorldEvent::Archived { cell });
        true
    }

    /// Take a coin out of a live cache.
    pub fn take_coin(&mut self, cell: Cell, serial: u32) -> Option<Coin> {
        let coin = self.get_mut(cell)?.pick_up(serial)?;
        self.record(WorldEvent::CoinTaken { cell, coin });
        Some(coin)
    }

    /// Put a coin into a live cache. Hands the coin back if the cell is not live.
    pub fn deposit_coin(&mut self, cell: Cell, coin: Coin) -> Result<(), Coin> {
        let Some(cache) = self.get_mut(cell) else {
            return Err(coin);
        };
        cache.drop_coin(coin);
        if cache.has_duplicate_coins() {
            tracing::warn!(%cell, %coin, "cache now holds a duplicate coin");
        }
        self.record(WorldEvent::CoinDeposited { cell, coin });
        Ok(())
    }

    /// Forget every tracked cell. Only an explicit reset does this.
    pub fn clear(&mut self) {
        self.caches.clear();
        self.record(WorldEvent::Cleared);
    }

    /// Mementos of every tracked cell, live and archived, in cell order.
    pub fn mementos(&self) -> Vec<(Cell, CacheMemento)> {
        self.caches
            .iter()
            .map(|(cell, slot)| {
                let memento = match slot {
                    CacheSlot::Live(cache) => cache.snapshot(),
                    CacheSlot::Archived(memento) => memento.clone(),
                };
                (*cell, memento)
            })
            .collect()
    }

    /// Total coins held by live and archived caches.
    pub fn coin_total(&self) -> usize {
        self.caches
            .values()
            .map(|slot| match slot {
                CacheSlot::Live(cache) => cache.len(),
                CacheSlot::Archived(memento) => memento.coins.len(),
            })
            .sum()
    }

    /// Drain and return the event log, oldest first.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        self.event_log.drain(..).collect()
    }

    /// Pending events, oldest first.
    pub fn events(&self) -> impl ExactSizeIterator<Item = &WorldEvent> {
        self.event_log.iter()
    }

    /// Events discarded because the log was full when they were recorded.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    fn record(&mut self, event: WorldEvent) {
        if self.event_log.len() == EVENT_LOG_CAPACITY {
            self.event_log.pop_front();
            self.dropped_events += 1;
            if self.dropped_events == 1 {
                tracing::debug!(capacity = EVENT_LOG_CAPACITY, "event log full; dropping oldest events");
            }
        }
        self.event_log.push_back(event);
    }

    /// Deterministic hash of the logical contents, ignoring live/archived status.
    /// Uses canonical (BTreeMap) iteration order.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        for (cell, memento) in self.mementos() {
            mix(&mut h, &cell.i.to_le_bytes());
            mix(&mut h, &cell.j.to_le_bytes());
            mix(&mut h, &(memento.coins.len() as u64).to_le_bytes());
            for coin in &memento.coins {
                mix(&mut h, &coin.home_i.to_le_bytes());
                mix(&mut h, &coin.home_j.to_le_bytes());
                mix(&mut h, &coin.serial.to_le_bytes());
            }
        }
        h
    }
}
