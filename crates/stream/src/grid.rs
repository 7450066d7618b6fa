use geocoin_common::{Cell, CellBounds, LatLng};
use std::collections::BTreeSet;

/// Quotients this close to a grid line (in cell units) are treated as on the line.
///
/// `k * tile_width / tile_width` is not always exactly `k` in binary floating
/// point; without snapping, a point placed on a north-east edge could land in
/// the cell below it.
const SNAP_EPSILON: f64 = 1e-6;

/// Fixed-size square grid over map coordinates.
///
/// Converts points to cells and cells to rectangles, and keeps a registry of
/// every cell it has handed out during the session.
#[derive(Debug, Clone)]
pub struct GridIndex {
    tile_width: f64,
    known_cells: BTreeSet<Cell>,
}

impl GridIndex {
    /// Create a grid with the given tile width in coordinate units.
    pub fn new(tile_width: f64) -> Self {
        assert!(
            tile_width.is_finite() && tile_width > 0.0,
            "tile_width must be positive"
        );
        Self {
            tile_width,
            known_cells: BTreeSet::new(),
        }
    }

    pub fn tile_width(&self) -> f64 {
        self.tile_width
    }

    /// The cell containing a point. Uses floor, so negative coordinates map
    /// to the cell that actually contains them.
    pub fn cell_for_point(&mut self, point: LatLng) -> Cell {
        let cell = self.locate(point);
        self.canonical(cell)
    }

    /// Same mapping as [`cell_for_point`](Self::cell_for_point), without recording the cell.
    pub fn locate(&self, point: LatLng) -> Cell {
        Cell::new(
            axis_index(point.lat, self.tile_width),
            axis_index(point.lng, self.tile_width),
        )
    }

    /// South-west and north-east corners of a cell.
    pub fn bounds_for_cell(&self, cell: Cell) -> CellBounds {
        let w = self.tile_width;
        CellBounds {
            south_west: LatLng::new(f64::from(cell.i) * w, f64::from(cell.j) * w),
            north_east: LatLng::new(
                (f64::from(cell.i) + 1.0) * w,
                (f64::from(cell.j) + 1.0) * w,
            ),
        }
    }

    /// All cells within Chebyshev distance `radius` of the point's cell, row-major.
    ///
    /// Neighbours that would fall outside the `i32` index range are left out.
    pub fn cells_near(&mut self, point: LatLng, radius: u32) -> Vec<Cell> {
        let center = self.cell_for_point(point);
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        let side = 2 * radius as usize + 1;
        let mut result = Vec::with_capacity(side * side);
        for di in -r..=r {
            let Some(i) = center.i.checked_add(di) else {
                continue;
            };
            for dj in -r..=r {
                if let Some(j) = center.j.checked_add(dj) {
                    result.push(self.canonical(Cell::new(i, j)));
                }
            }
        }
        result
    }

    /// Whether the index has handed out this cell before.
    pub fn is_known(&self, cell: Cell) -> bool {
        self.known_cells.contains(&cell)
    }

    /// Number of distinct cells handed out so far.
    pub fn known_cell_count(&self) -> usize {
        self.known_cells.len()
    }

    fn canonical(&mut self, cell: Cell) -> Cell {
        self.known_cells.insert(cell);
        cell
    }
}

fn axis_index(coord: f64, tile_width: f64) -> i32 {
    let scaled = coord / tile_width;
    let nearest = scaled.round();
    if (scaled - nearest).abs() < SNAP_EPSILON {
        nearest as i32
    } else {
        scaled.floor() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extreme_cells_do_not_overflow() {
        let grid = GridIndex::new(TILE);
        let bounds = grid.bounds_for_cell(Cell::new(i32::MAX, i32::MIN));
        assert!(bounds.north_east.lat > bounds.south_west.lat);
        assert!(bounds.north_east.lng > bounds.south_west.lng);
        assert!(bounds.center().lat.is_finite());

        let mut grid = GridIndex::new(1.0);
        let corner = LatLng::new(f64::from(i32::MAX), f64::from(i32::MIN));
        let cells = grid.cells_near(corner, 1);
        assert_eq!(cells.len(), 4);
        assert!(cells.contains(&Cell::new(i32::MAX, i32::MIN)));
        assert!(cells.contains(&Cell::new(i32::MAX - 1, i32::MIN + 1)));
    }

    const TILE: f64 = 0.0001;

    #[test]
    fn cell_for_point_basic() {
        let mut grid = GridIndex::new(16.0);
        assert_eq!(grid.cell_for_point(LatLng::new(10.0, 10.0)), Cell::new(0, 0));
        assert_eq!(grid.cell_for_point(LatLng::new(20.0, -5.0)), Cell::new(1, -1));
    }

    #[test]
    fn negative_coordinates_use_floor() {
        let mut grid = GridIndex::new(TILE);
        let cell = grid.cell_for_point(LatLng::new(-0.00005, -122.06285));
        assert_eq!(cell, Cell::new(-1, -1_220_629));
    }

    #[test]
    fn player_start_cell() {
        let mut grid = GridIndex::new(TILE);
        let cell = grid.cell_for_point(LatLng::new(36.9895, -122.0628));
        assert_eq!(cell, Cell::new(369_895, -1_220_628));
    }

    #[test]
    fn same_cell_points_compare_equal() {
        let mut grid = GridIndex::new(TILE);
        let a = grid.cell_for_point(LatLng::new(36.98951, -122.06279));
        let b = grid.cell_for_point(LatLng::new(36.98959, -122.06271));
        assert_eq!(a, b);
        assert_eq!(grid.locate(LatLng::new(36.98955, -122.06275)), a);
        assert_eq!(grid.known_cell_count(), 1);
        assert!(grid.is_known(a));
    }

    #[test]
    fn north_east_corner_belongs_to_next_cell() {
        let mut grid = GridIndex::new(TILE);
        for (i, j) in [(0, 0), (5, -3), (369_895, -1_220_628), (-7, 12)] {
            let corner = LatLng::new((i + 1) as f64 * TILE, (j + 1) as f64 * TILE);
            assert_eq!(grid.cell_for_point(corner), Cell::new(i + 1, j + 1));
        }
    }

    #[test]
    fn bounds_roundtrip_through_cell_for_point() {
        let mut grid = GridIndex::new(TILE);
        let cell = Cell::new(369_895, -1_220_628);
        let bounds = grid.bounds_for_cell(cell);
        assert_eq!(grid.cell_for_point(bounds.south_west), cell);
        assert_eq!(grid.cell_for_point(bounds.center()), cell);
        assert!(bounds.contains(bounds.center()));
        assert!((bounds.north_east.lat - bounds.south_west.lat - TILE).abs() < 1e-12);
    }

    #[test]
    fn cells_near_is_full_square() {
        let mut grid = GridIndex::new(TILE);
        let point = LatLng::new(36.9895, -122.0628);
        let center = grid.cell_for_point(point);
        for radius in [0u32, 1, 3, 8] {
            let cells = grid.cells_near(point, radius);
            let side = (2 * radius + 1) as usize;
            assert_eq!(cells.len(), side * side);
            assert!(cells.iter().all(|c| c.chebyshev_distance(center) <= radius));
            let unique: BTreeSet<Cell> = cells.iter().copied().collect();
            assert_eq!(unique.len(), cells.len());
        }
        assert_eq!(grid.known_cell_count(), 17 * 17);
    }

    #[test]
    #[should_panic(expected = "tile_width must be positive")]
    fn zero_tile_width_rejected() {
        GridIndex::new(0.0);
    }
}
