use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on the map in coordinate units (degrees for the default config).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Return this point shifted by the given offsets.
    pub fn offset(self, d_lat: f64, d_lng: f64) -> Self {
        Self {
            lat: self.lat + d_lat,
            lng: self.lng + d_lng,
        }
    }
}

impl fmt::Display for LatLng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// One grid square, addressed by integer row `i` (latitude) and column `j` (longitude).
///
/// Cells are plain values: equal coordinates mean the same cell, so a `Cell`
/// can key ordered and hashed maps directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub i: i32,
    pub j: i32,
}

impl Cell {
    pub const fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }

    /// Canonical string key, `"i,j"`. Feeds the world hash and the persisted cache list.
    pub fn key(&self) -> String {
        format!("{},{}", self.i, self.j)
    }

    /// Chebyshev (king-move) distance in cells.
    pub fn chebyshev_distance(&self, other: Cell) -> u32 {
        self.i.abs_diff(other.i).max(self.j.abs_diff(other.j))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.i, self.j)
    }
}

/// A collectible coin. Identified by its home cell and a serial unique within that cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coin {
    #[serde(rename = "i")]
    pub home_i: i32,
    #[serde(rename = "j")]
    pub home_j: i32,
    pub serial: u32,
}

impl Coin {
    pub const fn new(home: Cell, serial: u32) -> Self {
        Self {
            home_i: home.i,
            home_j: home.j,
            serial,
        }
    }

    /// The cell this coin was minted in.
    pub fn home(&self) -> Cell {
        Cell::new(self.home_i, self.home_j)
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.home_i, self.home_j, self.serial)
    }
}

/// Axis-aligned rectangle covered by one cell.
///
/// Half-open: the south-west corner is inside, the north-east edges belong to
/// the neighbouring cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl CellBounds {
    /// Midpoint of the rectangle.
    pub fn center(&self) -> LatLng {
        LatLng {
            lat: (self.south_west.lat + self.north_east.lat) / 2.0,
            lng: (self.south_west.lng + self.north_east.lng) / 2.0,
        }
    }

    pub fn contains(&self, point: LatLng) -> bool {
        point.lat >= self.south_west.lat
            && point.lat < self.north_east.lat
            && point.lng >= self.south_west.lng
            && point.lng < self.north_east.lng
    }
}
