//! Streaming: grid addressing of map coordinates and visibility tracking.
//!
//! # Invariants
//! - A point maps to exactly one cell; cell rectangles are half-open.
//! - The visible set around a point is the full `(2r+1)^2` Chebyshev square.
//! - Visibility diffs are reported in cell order so callers act deterministically.

mod grid;
mod visibility;

pub use grid::GridIndex;
pub use visibility::{VisibilityDelta, VisibilityState, VisibilityStats};

pub fn crate_info() -> &'static str {
    "geocoin-stream v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("stream"));
    }
}
