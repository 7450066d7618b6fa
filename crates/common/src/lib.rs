//! Shared value types for the geocoin world.
//!
//! # Invariants
//! - `Cell` equality is identity: two cells with the same `(i, j)` are interchangeable.
//! - A coin's home cell never changes after the coin is minted.

pub mod types;

pub use types::{Cell, CellBounds, Coin, LatLng};
