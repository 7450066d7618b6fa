use geocoin_common::{Cell, Coin, LatLng};
use geocoin_kernel::{CacheMemento, World};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};

use crate::store::PersistError;

/// Current persisted session schema. Records with any other version are rejected.
pub const SESSION_SCHEMA_VERSION: u32 = 1;

/// One archived cache in a session snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Canonical `"i,j"` cell key.
    pub key: String,
    pub memento: CacheMemento,
}

/// Full player and world state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub player_position: LatLng,
    pub player_coins: Vec<Coin>,
    pub player_path: Vec<LatLng>,
    pub caches: Vec<CacheEntry>,
}

impl SessionSnapshot {
    /// Capture player state and every tracked cache (live ones are snapshotted).
    pub fn capture(position: LatLng, inventory: &[Coin], path: &[LatLng], world: &World) -> Self {
        let caches = world
            .mementos()
            .into_iter()
            .map(|(cell, memento)| CacheEntry {
                key: cell.key(),
                memento,
            })
            .collect();
        Self {
            player_position: position,
            player_coins: inventory.to_vec(),
            player_path: path.to_vec(),
            caches,
        }
    }

    /// Rebuild the cache archive. Every cache comes back archived; the
    /// visibility pass decides which ones to materialize.
    pub fn restore_world(&self) -> Result<World, PersistError> {
        let mut world = World::new();
        for entry in &self.caches {
            let cell = parse_cell_key(&entry.key)?;
            world.insert_archived(cell, entry.memento.clone())?;
        }
        Ok(world)
    }

    /// Coins held by the player plus every archived cache.
    pub fn coin_total(&self) -> usize {
        self.player_coins.len()
            + self
                .caches
                .iter()
                .map(|entry| entry.memento.coins.len())
                .sum::<usize>()
    }
}

/// Versioned, checksummed envelope around a session snapshot.
///
/// The checksum is SHA-256 over the session's compact JSON text. On load it is
/// checked against the session text exactly as stored, before that text is parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSession {
    pub version: u32,
    pub checksum: String,
    pub session: SessionSnapshot,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

#[derive(Deserialize)]
struct StoredEnvelope<'a> {
    version: u32,
    checksum: String,
    #[serde(borrow)]
    session: &'a RawValue,
}

impl PersistedSession {
    /// Wrap a snapshot with the current schema version and its checksum.
    pub fn seal(session: SessionSnapshot) -> Result<Self, PersistError> {
        let checksum = sha256_hex(serde_json::to_string(&session)?.as_bytes());
        Ok(Self {
            version: SESSION_SCHEMA_VERSION,
            checksum,
            session,
        })
    }

    /// Recompute the checksum and compare.
    pub fn verify(&self) -> Result<(), PersistError> {
        let actual = sha256_hex(serde_json::to_string(&self.session)?.as_bytes());
        if actual != self.checksum {
            return Err(PersistError::IntegrityMismatch {
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a persisted session. Fails closed on version or checksum mismatch.
    pub fn decode(text: &str) -> Result<Self, PersistError> {
        // Check the version before the body so a future schema reports as such
        // rather than as a parse failure.
        let probe: VersionProbe = serde_json::from_str(text)?;
        if probe.version != SESSION_SCHEMA_VERSION {
            return Err(PersistError::SchemaMismatch {
                file_version: probe.version,
                expected_version: SESSION_SCHEMA_VERSION,
            });
        }
        let stored: StoredEnvelope<'_> = serde_json::from_str(text)?;
        let session_text = stored.session.get();
        let actual = sha256_hex(session_text.as_bytes());
        if actual != stored.checksum {
            return Err(PersistError::IntegrityMismatch {
                expected: stored.checksum,
                actual,
            });
        }
        Ok(Self {
            version: stored.version,
            checksum: stored.checksum,
            session: serde_json::from_str(session_text)?,
        })
    }
}

/// Parse a canonical `"i,j"` cell key.
pub fn parse_cell_key(key: &str) -> Result<Cell, PersistError> {
    let invalid = || PersistError::InvalidCellKey(key.to_owned());
    let (i, j) = key.split_once(',').ok_or_else(invalid)?;
    let i = i.trim().parse().map_err(|_| invalid())?;
    let j = j.trim().parse().map_err(|_| invalid())?;
    Ok(Cell::new(i, j))
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
