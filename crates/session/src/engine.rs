use std::collections::BTreeSet;

use geocoin_common::{Cell, CellBounds, Coin, LatLng};
use geocoin_input::{Command, Direction};
use geocoin_kernel::{CacheSlot, Geocache, WorldEvent, cell_luck, coin_count_for};
use geocoin_persist::{KeyValueStore, PersistError, PersistedSession};
use geocoin_stream::{GridIndex, VisibilityDelta, VisibilityState};

use crate::config::{ConfigError, GameConfig};
use crate::session::Session;

/// Errors that abort an engine operation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
    #[error("position {0} is not finite or lies outside the grid")]
    InvalidPosition(LatLng),
}

/// Result of a pick-up request. Misses are ordinary outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickUpOutcome {
    PickedUp(Coin),
    /// No live cache at that cell.
    NoCache,
    /// The cache holds no coin with that serial.
    CoinNotFound,
}

/// Result of a drop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Dropped(Coin),
    /// No live cache at that cell.
    NoCache,
    /// The inventory holds no coin with that serial.
    CoinNotFound,
}

/// Result of applying a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Moved(VisibilityDelta),
    PickUp(PickUpOutcome),
    Drop(DropOutcome),
    Center(LatLng),
    Reset,
}

/// The visibility/session engine.
///
/// Owns the session, the grid, the visible set and the persistence port. Every
/// position change re-evaluates the cells around the player: cells entering the
/// radius are restored from their memento or, if never seen, put through the
/// spawn test; live caches leaving the radius are archived.
pub struct Engine<S: KeyValueStore> {
    config: GameConfig,
    grid: GridIndex,
    visibility: VisibilityState,
    session: Session,
    store: S,
}

impl<S: KeyValueStore> Engine<S> {
    /// Build an engine with a fresh session at the configured origin.
    ///
    /// Nothing is loaded and no cells are evaluated until the first position
    /// change; use [`Engine::start`] for the usual startup sequence.
    pub fn new(config: GameConfig, store: S) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            grid: GridIndex::new(config.tile_width),
            visibility: VisibilityState::new(),
            session: Session::new(config.origin),
            config,
            store,
        })
    }

    /// Build an engine, resume the saved session if one is readable, and
    /// evaluate the cells around the player.
    pub fn start(config: GameConfig, store: S) -> Result<Self, EngineError> {
        let mut engine = Self::new(config, store)?;
        engine.load()?;
        engine.refresh_visibility();
        Ok(engine)
    }

    /// Replace the session with the saved one. Returns whether a session was resumed.
    ///
    /// An unreadable record (corrupt, wrong schema, failed checksum) is discarded
    /// and the current session kept; only a failure to read the store is an error.
    pub fn load(&mut self) -> Result<bool, EngineError> {
        let _span = tracing::info_span!("load_session").entered();
        let Some(text) = self.store.load(&self.config.storage_key)? else {
            tracing::debug!("no saved session");
            return Ok(false);
        };
        let session = PersistedSession::decode(&text)
            .and_then(|sealed| Session::from_snapshot(&sealed.session));
        match session {
            Ok(session) => {
                tracing::info!(
                    position = %session.position(),
                    inventory = session.inventory().len(),
                    caches = session.world().len(),
                    "resumed session"
                );
                self.session = session;
                self.visibility.reset();
                Ok(true)
            }
            Err(error) => {
                tracing::warn!(%error, "discarding unreadable saved session; starting fresh");
                Ok(false)
            }
        }
    }

    /// Write the whole session through the store in one call.
    pub fn save(&mut self) -> Result<(), EngineError> {
        let _span = tracing::info_span!("save_session").entered();
        let text = PersistedSession::seal(self.session.capture())?.encode()?;
        self.store.save(&self.config.storage_key, &text)?;
        tracing::trace!(bytes = text.len(), "session saved");
        Ok(())
    }

    /// Move the player by an offset, update visibility and save.
    pub fn move_by(&mut self, d_lat: f64, d_lng: f64) -> Result<VisibilityDelta, EngineError> {
        let position = self.session.position.offset(d_lat, d_lng);
        self.check_position(position)?;
        self.commit(|engine| engine.relocate(position))
    }

    /// Move one configured step in a compass direction.
    pub fn step(&mut self, direction: Direction) -> Result<VisibilityDelta, EngineError> {
        let (u_lat, u_lng) = direction.unit();
        self.move_by(u_lat * self.config.move_step, u_lng * self.config.move_step)
    }

    /// Handle a position report from an external location feed.
    pub fn move_to(&mut self, lat: f64, lng: f64) -> Result<VisibilityDelta, EngineError> {
        let position = LatLng::new(lat, lng);
        self.check_position(position)?;
        self.commit(|engine| engine.relocate(position))
    }

    /// Take a coin from the live cache at `(i, j)` into the inventory.
    pub fn pick_up(&mut self, i: i32, j: i32, serial: u32) -> Result<PickUpOutcome, EngineError> {
        let cell = Cell::new(i, j);
        let Some(cache) = self.session.world.get(cell) else {
            return Ok(PickUpOutcome::NoCache);
        };
        if !cache.coins().iter().any(|c| c.serial == serial) {
            return Ok(PickUpOutcome::CoinNotFound);
        }
        self.commit(|engine| match engine.session.world.take_coin(cell, serial) {
            Some(coin) => {
                engine.session.inventory.push(coin);
                tracing::debug!(%cell, %coin, "picked up coin");
                PickUpOutcome::PickedUp(coin)
            }
            None => PickUpOutcome::CoinNotFound,
        })
    }

    /// Move the first inventory coin with `serial` into the live cache at `(i, j)`.
    pub fn drop_coin(&mut self, i: i32, j: i32, serial: u32) -> Result<DropOutcome, EngineError> {
        let cell = Cell::new(i, j);
        if !self.session.world.is_live(cell) {
            return Ok(DropOutcome::NoCache);
        }
        let Some(index) = self
            .session
            .inventory
            .iter()
            .position(|c| c.serial == serial)
        else {
            return Ok(DropOutcome::CoinNotFound);
        };
        self.commit(|engine| {
            let coin = engine.session.inventory.remove(index);
            match engine.session.world.deposit_coin(cell, coin) {
                Ok(()) => {
                    tracing::debug!(%cell, %coin, "dropped coin");
                    DropOutcome::Dropped(coin)
                }
                Err(coin) => {
                    engine.session.inventory.insert(index, coin);
                    DropOutcome::NoCache
                }
            }
        })
    }

    /// Center point of a cell, for the map to pan to. Does not move the player.
    pub fn center_on(&self, i: i32, j: i32) -> LatLng {
        self.cell_bounds(Cell::new(i, j)).center()
    }

    /// Return to the origin with an empty inventory, path and world, then save.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        self.commit(|engine| {
            tracing::info!("resetting session");
            let session = &mut engine.session;
            session.world.clear();
            session.position = engine.config.origin;
            session.inventory.clear();
            session.path.clear();
            engine.visibility.reset();
            engine.refresh_visibility();
        })
    }

    /// Dispatch a player command.
    pub fn apply(&mut self, command: Command) -> Result<CommandOutcome, EngineError> {
        tracing::debug!(%command, "applying command");
        Ok(match command {
            Command::Step(direction) => CommandOutcome::Moved(self.step(direction)?),
            Command::MoveBy { d_lat, d_lng } => CommandOutcome::Moved(self.move_by(d_lat, d_lng)?),
            Command::MoveTo { lat, lng } => CommandOutcome::Moved(self.move_to(lat, lng)?),
            Command::PickUp { i, j, serial } => CommandOutcome::PickUp(self.pick_up(i, j, serial)?),
            Command::Drop { i, j, serial } => CommandOutcome::Drop(self.drop_coin(i, j, serial)?),
            Command::CenterOn { i, j } => CommandOutcome::Center(self.center_on(i, j)),
            Command::Reset => {
                self.reset()?;
                CommandOutcome::Reset
            }
        })
    }

    /// Re-evaluate the cells around the player without moving.
    pub fn refresh_visibility(&mut self) -> VisibilityDelta {
        let position = self.session.position;
        let _span = tracing::info_span!("visibility_update", %position).entered();
        let desired = self.grid.cells_near(position, self.config.visibility_radius);
        let delta = self.visibility.update(desired);
        for &cell in &delta.entered {
            self.materialize(cell);
        }
        for &cell in &delta.exited {
            self.session.world.archive(cell);
        }
        tracing::trace!(
            entered = delta.entered.len(),
            exited = delta.exited.len(),
            live = self.session.world.live_count(),
            "visibility updated"
        );
        delta
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn position(&self) -> LatLng {
        self.session.position
    }

    pub fn inventory(&self) -> &[Coin] {
        &self.session.inventory
    }

    pub fn path(&self) -> &[LatLng] {
        &self.session.path
    }

    /// The live cache at `(i, j)`, if any.
    pub fn cache(&self, i: i32, j: i32) -> Option<&Geocache> {
        self.session.world.get(Cell::new(i, j))
    }

    pub fn live_caches(&self) -> impl Iterator<Item = &Geocache> {
        self.session.world.live_caches()
    }

    pub fn visible_cells(&self) -> &BTreeSet<Cell> {
        self.visibility.visible_cells()
    }

    pub fn cell_bounds(&self, cell: Cell) -> CellBounds {
        self.grid.bounds_for_cell(cell)
    }

    /// The cell the player stands in.
    pub fn player_cell(&self) -> Cell {
        self.grid.locate(self.session.position)
    }

    /// Whether the player stands in cell `(i, j)`.
    pub fn is_player_at(&self, i: i32, j: i32) -> bool {
        self.player_cell() == Cell::new(i, j)
    }

    /// Coins in every tracked cache plus the inventory.
    pub fn coin_total(&self) -> usize {
        self.session.coin_total()
    }

    /// World events since the last drain, for the rendering layer.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        self.session.world.drain_events()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Reject positions that cannot be saved or whose visible window would
    /// leave the `i32` cell range.
    fn check_position(&self, position: LatLng) -> Result<(), EngineError> {
        let margin = i64::from(self.config.visibility_radius) + 1;
        let limit = (i64::from(i32::MAX) - margin) as f64 * self.config.tile_width;
        let in_range = |v: f64| v.is_finite() && v.abs() < limit;
        if in_range(position.lat) && in_range(position.lng) {
            Ok(())
        } else {
            Err(EngineError::InvalidPosition(position))
        }
    }

    fn relocate(&mut self, position: LatLng) -> VisibilityDelta {
        self.session.position = position;
        self.session.path.push(position);
        self.refresh_visibility()
    }

    /// Decide what a cell that just entered the radius becomes.
    fn materialize(&mut self, cell: Cell) {
        let world = &mut self.session.world;
        match world.slot(cell) {
            Some(CacheSlot::Live(_)) => {}
            Some(CacheSlot::Archived(_)) => {
                if let Err(error) = world.revive(cell) {
                    tracing::warn!(%cell, %error, "archived cache could not be restored");
                }
            }
            None => {
                let luck = cell_luck(cell);
                if luck < self.config.cache_probability {
                    world.spawn(cell, coin_count_for(luck, self.config.coin_scale_factor));
                }
            }
        }
    }

    /// Run a mutation, then save. If the save fails the session and visible set
    /// are rolled back, so the operation has no effect.
    fn commit<T>(&mut self, mutate: impl FnOnce(&mut Self) -> T) -> Result<T, EngineError> {
        let session = self.session.clone();
        let visibility = self.visibility.clone();
        let out = mutate(self);
        if let Err(error) = self.save() {
            tracing::warn!(%error, "save failed; rolling back");
            self.session = session;
            self.visibility = visibility;
            return Err(error);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocoin_kernel::EVENT_LOG_CAPACITY;
    use geocoin_persist::MemoryStore;

    fn engine() -> Engine<MemoryStore> {
        Engine::start(GameConfig::default(), MemoryStore::new()).unwrap()
    }

    /// Store whose saves can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_saves: bool,
    }

    impl KeyValueStore for FlakyStore {
        fn load(&self, key: &str) -> Result<Option<String>, PersistError> {
            self.inner.load(key)
        }

        fn save(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
            if self.fail_saves {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.save(key, value)
        }
    }

    #[test]
    fn start_evaluates_radius() {
        let e = engine();
        assert_eq!(e.visible_cells().len(), 17 * 17);
        assert_eq!(e.live_caches().count(), 30);
        assert_eq!(e.player_cell(), Cell::new(369_895, -1_220_628));
        assert!(e.path().is_empty());
    }

    #[test]
    fn new_does_not_evaluate() {
        let e = Engine::new(GameConfig::default(), MemoryStore::new()).unwrap();
        assert!(e.visible_cells().is_empty());
        assert_eq!(e.live_caches().count(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = GameConfig {
            tile_width: -1.0,
            ..GameConfig::default()
        };
        assert!(matches!(
            Engine::new(config, MemoryStore::new()),
            Err(EngineError::Config(ConfigError::TileWidth(_)))
        ));
    }

    #[test]
    fn step_moves_and_records_path() {
        let mut e = engine();
        let start = e.position();
        e.step(Direction::North).unwrap();
        e.step(Direction::East).unwrap();
        let step = e.config().move_step;
        assert!((e.position().lat - (start.lat + step)).abs() < 1e-12);
        assert!((e.position().lng - (start.lng + step)).abs() < 1e-12);
        assert_eq!(e.path().len(), 2);
        assert!(e.store().load(&e.config().storage_key).unwrap().is_some());
    }

    #[test]
    fn pick_up_misses_are_outcomes() {
        let mut e = engine();
        assert_eq!(e.pick_up(0, 0, 0).unwrap(), PickUpOutcome::NoCache);
        assert_eq!(
            e.pick_up(369_891, -1_220_627, 99).unwrap(),
            PickUpOutcome::CoinNotFound
        );
        assert!(e.inventory().is_empty());
    }

    #[test]
    fn drop_misses_are_outcomes() {
        let mut e = engine();
        assert_eq!(e.drop_coin(369_891, -1_220_627, 0).unwrap(), DropOutcome::CoinNotFound);
        e.pick_up(369_891, -1_220_627, 0).unwrap();
        assert_eq!(e.drop_coin(0, 0, 0).unwrap(), DropOutcome::NoCache);
        assert_eq!(e.inventory().len(), 1);
    }

    #[test]
    fn drop_moves_coin_between_caches() {
        let mut e = engine();
        let PickUpOutcome::PickedUp(coin) = e.pick_up(369_891, -1_220_627, 2).unwrap() else {
            panic!("expected a coin");
        };
        assert_eq!(e.drop_coin(369_896, -1_220_628, 2).unwrap(), DropOutcome::Dropped(coin));
        assert!(e.inventory().is_empty());
        assert_eq!(e.cache(369_896, -1_220_628).unwrap().coins().last(), Some(&coin));
        assert_eq!(e.cache(369_891, -1_220_627).unwrap().len(), 2);
    }

    #[test]
    fn center_on_is_cell_midpoint() {
        let e = engine();
        let center = e.center_on(369_895, -1_220_628);
        assert!((center.lat - 36.98955).abs() < 1e-9);
        assert!((center.lng - -122.06275).abs() < 1e-9);
        assert!(e.is_player_at(369_895, -1_220_628));
        assert!(!e.is_player_at(369_896, -1_220_628));
    }

    #[test]
    fn apply_dispatches_commands() {
        let mut e = engine();
        let outcome = e.apply("pickup:369891,-1220627,1".parse().unwrap()).unwrap();
        assert!(matches!(outcome, CommandOutcome::PickUp(PickUpOutcome::PickedUp(_))));
        let outcome = e.apply("n".parse().unwrap()).unwrap();
        assert!(matches!(outcome, CommandOutcome::Moved(_)));
        let outcome = e.apply("center:0,0".parse().unwrap()).unwrap();
        assert!(matches!(outcome, CommandOutcome::Center(_)));
        assert_eq!(e.apply(Command::Reset).unwrap(), CommandOutcome::Reset);
    }

    #[test]
    fn reset_returns_to_origin_with_fresh_world() {
        let mut e = engine();
        e.pick_up(369_891, -1_220_627, 0).unwrap();
        e.move_to(37.0, -122.0).unwrap();
        e.reset().unwrap();
        assert_eq!(e.position(), e.config().origin);
        assert!(e.inventory().is_empty());
        assert!(e.path().is_empty());
        assert_eq!(e.cache(369_891, -1_220_627).unwrap().len(), 3);
        assert_eq!(e.session().world().len(), 30);
    }

    #[test]
    fn events_report_spawns_and_archives() {
        let mut e = engine();
        let spawned = e
            .drain_events()
            .iter()
            .filter(|ev| matches!(ev, WorldEvent::Spawned { .. }))
            .count();
        assert_eq!(spawned, 30);
        e.move_to(40.0, -100.0).unwrap();
        let archived = e
            .drain_events()
            .iter()
            .filter(|ev| matches!(ev, WorldEvent::Archived { .. }))
            .count();
        assert_eq!(archived, 30);
    }

    #[test]
    fn non_finite_positions_are_rejected() {
        let mut e = engine();
        e.pick_up(369_891, -1_220_627, 0).unwrap();
        let position = e.position();

        for (lat, lng) in [(f64::NAN, 0.0), (0.0, f64::INFINITY), (1e300, 0.0)] {
            assert!(matches!(
                e.move_to(lat, lng),
                Err(EngineError::InvalidPosition(_))
            ));
        }
        assert!(matches!(
            e.move_by(f64::NEG_INFINITY, 0.0),
            Err(EngineError::InvalidPosition(_))
        ));
        assert_eq!(e.position(), position);
        assert!(e.path().is_empty());

        let resumed = Engine::start(GameConfig::default(), e.into_store()).unwrap();
        assert_eq!(resumed.inventory().len(), 1);
    }

    #[test]
    fn center_on_extreme_cells() {
        let e = engine();
        assert!(e.center_on(i32::MAX, 0).lat.is_finite());
        assert!(e.center_on(i32::MIN, i32::MAX).lng.is_finite());
        let outcome = e.center_on(i32::MAX, i32::MIN);
        assert!(outcome.lat > 0.0 && outcome.lng < 0.0);
    }

    #[test]
    fn event_log_stays_bounded_without_draining() {
        let mut e = engine();
        for _ in 0..60 {
            e.move_to(36.9905, -122.0628).unwrap();
            e.move_to(36.9895, -122.0628).unwrap();
        }
        let world = e.session().world();
        assert_eq!(world.events().len(), EVENT_LOG_CAPACITY);
        assert!(world.dropped_events() > 0);
    }

    #[test]
    fn reset_keeps_pending_events_and_clears_world() {
        let mut e = engine();
        e.drain_events();
        e.pick_up(369_891, -1_220_627, 0).unwrap();
        e.reset().unwrap();
        let events = e.drain_events();
        assert!(matches!(events[0], WorldEvent::CoinTaken { .. }));
        let cleared = events
            .iter()
            .position(|ev| *ev == WorldEvent::Cleared)
            .unwrap();
        let respawned = events[cleared..]
            .iter()
            .filter(|ev| matches!(ev, WorldEvent::Spawned { .. }))
            .count();
        assert_eq!(respawned, 30);
    }

    #[test]
    fn failed_save_rolls_back() {
        let mut e = Engine::start(GameConfig::default(), FlakyStore::default()).unwrap();
        e.step(Direction::North).unwrap();
        let position = e.position();
        let hash = e.session().world().state_hash();

        e.store.fail_saves = true;
        assert!(matches!(
            e.pick_up(369_891, -1_220_627, 0),
            Err(EngineError::Persist(PersistError::Io(_)))
        ));
        assert!(e.move_to(40.0, -100.0).is_err());
        assert!(e.reset().is_err());

        assert_eq!(e.position(), position);
        assert!(e.inventory().is_empty());
        assert_eq!(e.path().len(), 1);
        assert_eq!(e.session().world().state_hash(), hash);
        assert_eq!(e.cache(369_891, -1_220_627).unwrap().len(), 3);
    }
}
