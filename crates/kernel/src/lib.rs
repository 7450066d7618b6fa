//! World Kernel: the deterministic cache world.
//!
//! # Invariants
//! - Whether a cell holds a cache, and how many coins it starts with, is a pure
//!   function of the cell's coordinates (see [`luck`]).
//! - `Geocache::restore(&cache.snapshot())` is indistinguishable from `cache`.
//! - All state mutations flow through explicit operations on [`World`], each
//!   recorded in its event log, which keeps the newest [`EVENT_LOG_CAPACITY`] entries.

pub mod geocache;
pub mod luck;
pub mod world;

pub use geocache::{CacheMemento, Geocache, MementoError, coin_count_for};
pub use luck::{cell_luck, luck};
pub use world::{CacheSlot, EVENT_LOG_CAPACITY, World, WorldEvent};
