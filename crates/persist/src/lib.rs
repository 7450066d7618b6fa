//! Persistence: session snapshots and the key-value port they are written through.
//!
//! # Invariants
//! - A session is written with a single `save` call: whole or not at all.
//! - Persisted sessions carry a schema version and checksum and fail closed on either.
//! - Loading never regenerates caches; mementos come back exactly as saved.

mod snapshot;
mod store;

pub use snapshot::{
    CacheEntry, PersistedSession, SESSION_SCHEMA_VERSION, SessionSnapshot, parse_cell_key,
};
pub use store::{FileStore, KeyValueStore, MemoryStore, PersistError};

pub fn crate_info() -> &'static str {
    "geocoin-persist v0.1.0"
}
