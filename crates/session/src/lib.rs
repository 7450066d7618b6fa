//! Session engine: owns the player, the cache world and persistence, and turns
//! player commands into world transitions.
//!
//! # Invariants
//! - Spawn decisions depend only on a cell's coordinates and the configuration,
//!   never on visit order.
//! - Every coin is in exactly one place: one cache or the inventory.
//! - A failed save leaves both memory and the persisted record as they were.

pub mod config;
pub mod engine;
pub mod session;

pub use config::{ConfigError, GameConfig};
pub use engine::{CommandOutcome, DropOutcome, Engine, EngineError, PickUpOutcome};
pub use session::Session;
