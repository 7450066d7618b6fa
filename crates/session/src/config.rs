use geocoin_common::LatLng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest accepted visibility radius, in cells.
pub const MAX_VISIBILITY_RADIUS: u32 = 256;

/// Errors from loading or validating a game configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("tile_width must be positive and finite, got {0}")]
    TileWidth(f64),
    #[error("visibility_radius must be at most {max}, got {0}", max = MAX_VISIBILITY_RADIUS)]
    VisibilityRadius(u32),
    #[error("cache_probability must be within [0, 1], got {0}")]
    CacheProbability(f64),
    #[error("coin_scale_factor must be positive and finite, got {0}")]
    CoinScaleFactor(f64),
    #[error("move_step must be positive and finite, got {0}")]
    MoveStep(f64),
    #[error("origin must be finite, got {0}")]
    Origin(LatLng),
    #[error("storage_key must not be empty")]
    EmptyStorageKey,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Startup configuration. Fixed for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Side of one grid cell, in coordinate units.
    pub tile_width: f64,
    /// Chebyshev radius (in cells) around the player within which caches are live.
    pub visibility_radius: u32,
    /// Chance that a never-visited cell holds a cache.
    pub cache_probability: f64,
    /// Upper bound on coins minted per cache.
    pub coin_scale_factor: f64,
    /// Distance covered by one step of the move buttons.
    pub move_step: f64,
    /// Starting position, and where a reset returns the player.
    pub origin: LatLng,
    /// Key the session is saved under.
    pub storage_key: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tile_width: 0.0001,
            visibility_radius: 8,
            cache_probability: 0.1,
            coin_scale_factor: 11.0,
            move_step: 0.00005,
            origin: LatLng::new(36.9895, -122.0628),
            storage_key: "geocoin-carrier-state".into(),
        }
    }
}

impl GameConfig {
    /// Load a JSON file over the defaults; missing fields keep their default.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.tile_width) {
            return Err(ConfigError::TileWidth(self.tile_width));
        }
        if self.visibility_radius > MAX_VISIBILITY_RADIUS {
            return Err(ConfigError::VisibilityRadius(self.visibility_radius));
        }
        if !(0.0..=1.0).contains(&self.cache_probability) {
            return Err(ConfigError::CacheProbability(self.cache_probability));
        }
        if !positive(self.coin_scale_factor) {
            return Err(ConfigError::CoinScaleFactor(self.coin_scale_factor));
        }
        if !positive(self.move_step) {
            return Err(ConfigError::MoveStep(self.move_step));
        }
        if !(self.origin.lat.is_finite() && self.origin.lng.is_finite()) {
            return Err(ConfigError::Origin(self.origin));
        }
        if self.storage_key.is_empty() {
            return Err(ConfigError::EmptyStorageKey);
        }
        Ok(())
    }
}
