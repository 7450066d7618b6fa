use geocoin_common::Cell;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Cells that crossed the visibility boundary during one update, in cell order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityDelta {
    pub entered: Vec<Cell>,
    pub exited: Vec<Cell>,
}

impl VisibilityDelta {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.exited.is_empty()
    }
}

/// Per-update statistics for instrumentation.
#[derive(Debug, Clone, Default)]
pub struct VisibilityStats {
    pub cells_entered: usize,
    pub cells_exited: usize,
    pub total_visible: usize,
    pub update_time: Duration,
}

/// Tracks which cells are inside the visibility radius.
#[derive(Debug, Clone, Default)]
pub struct VisibilityState {
    visible: BTreeSet<Cell>,
    stats: VisibilityStats,
}

impl VisibilityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the visible set with `desired` and report what changed.
    pub fn update(&mut self, desired: impl IntoIterator<Item = Cell>) -> VisibilityDelta {
        let _span = tracing::info_span!("visibility_diff").entered();
        let start = Instant::now();

        let desired: BTreeSet<Cell> = desired.into_iter().collect();
        let entered: Vec<Cell> = desired.difference(&self.visible).copied().collect();
        let exited: Vec<Cell> = self.visible.difference(&desired).copied().collect();
        self.visible = desired;

        self.stats = VisibilityStats {
            cells_entered: entered.len(),
            cells_exited: exited.len(),
            total_visible: self.visible.len(),
            update_time: start.elapsed(),
        };

        tracing::trace!(
            entered = entered.len(),
            exited = exited.len(),
            total = self.visible.len(),
            "visibility diff complete"
        );

        VisibilityDelta { entered, exited }
    }

    /// Forget the visible set; the next update reports every desired cell as entered.
    pub fn reset(&mut self) {
        self.visible.clear();
    }

    pub fn visible_cells(&self) -> &BTreeSet<Cell> {
        &self.visible
    }

    pub fn is_visible(&self, cell: Cell) -> bool {
        self.visible.contains(&cell)
    }

    /// Statistics from the last update.
    pub fn stats(&self) -> &VisibilityStats {
        &self.stats
    }
}
