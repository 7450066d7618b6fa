use geocoin_common::{Coin, LatLng};
use geocoin_kernel::World;
use geocoin_persist::{PersistError, SessionSnapshot};

/// Everything that persists between runs: the player and the cache archive.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) position: LatLng,
    pub(crate) inventory: Vec<Coin>,
    pub(crate) path: Vec<LatLng>,
    pub(crate) world: World,
}

impl Session {
    /// A fresh session at `origin` with an empty inventory and world.
    pub fn new(origin: LatLng) -> Self {
        Self {
            position: origin,
            inventory: Vec::new(),
            path: Vec::new(),
            world: World::new(),
        }
    }

    /// Rebuild a session from a snapshot. Caches come back archived.
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Result<Self, PersistError> {
        Ok(Self {
            position: snapshot.player_position,
            inventory: snapshot.player_coins.clone(),
            path: snapshot.player_path.clone(),
            world: snapshot.restore_world()?,
        })
    }

    pub fn capture(&self) -> SessionSnapshot {
        SessionSnapshot::capture(self.position, &self.inventory, &self.path, &self.world)
    }

    pub fn position(&self) -> LatLng {
        self.position
    }

    pub fn inventory(&self) -> &[Coin] {
        &self.inventory
    }

    pub fn path(&self) -> &[LatLng] {
        &self.path
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Coins in every tracked cache plus the inventory.
    pub fn coin_total(&self) -> usize {
        self.world.coin_total() + self.inventory.len()
    }
}
