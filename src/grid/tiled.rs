//! Polygon rasterization onto the tile grid.
//!
//! A viewport polygon is converted to the exact set of tile-grid cells it
//! overlaps, expressed as per-row column intervals ([`TiledPolygonRun`]).
//! Two rasterizations can be diffed to get the minimal add/keep/remove run
//! sets as the viewport pans or rotates.

use crate::grid::interval::IntervalI;
use crate::grid::polygon::Polygon;
use crate::grid::vector::Vec2;

/// One contiguous horizontal span of covered tile columns in one grid row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiledPolygonRun {
    row: i64,
    interval: IntervalI,
}

impl TiledPolygonRun {
    /// Run covering `interval` in grid row `row`.
    pub fn new(row: i64, interval: IntervalI) -> Self {
        Self { row, interval }
    }

    /// Grid row index.
    pub fn row(&self) -> i64 {
        self.row
    }

    /// Covered column interval (inclusive).
    pub fn interval(&self) -> &IntervalI {
        &self.interval
    }

    /// Iterate the covered column indices.
    pub fn columns(&self) -> impl Iterator<Item = i64> {
        self.interval.inf()..=self.interval.sup()
    }
}

/// The run sets produced by [`TiledPolygon::diff`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TiledPolygonDiff {
    same_area: Vec<TiledPolygonRun>,
    new_area: Vec<TiledPolygonRun>,
    old_area: Vec<TiledPolygonRun>,
}

impl TiledPolygonDiff {
    /// Runs covered by both rasterizations.
    pub fn same_area(&self) -> &[TiledPolygonRun] {
        &self.same_area
    }

    /// Runs covered only by the new rasterization.
    pub fn new_area(&self) -> &[TiledPolygonRun] {
        &self.new_area
    }

    /// Runs covered only by the old rasterization.
    pub fn old_area(&self) -> &[TiledPolygonRun] {
        &self.old_area
    }
}

/// A signed scanline event: an edge touches a row boundary at `column`,
/// ascending (+1) or descending (-1).
#[derive(Debug, Clone, Copy)]
struct Crossing {
    column: i64,
    direction: i32,
}

impl Crossing {
    /// A directionally-consistent hole of at least two cells between a
    /// descending event and this ascending one splits the row into two runs.
    /// This tolerates edges that graze a row without fully crossing it.
    fn is_gap_after(&self, previous: &Crossing) -> bool {
        self.direction > 0 && previous.direction < 0 && self.column - previous.column >= 2
    }
}

/// A polygon rasterized against a uniform grid with cells of `grid_step`.
#[derive(Debug, Clone, PartialEq)]
pub struct TiledPolygon {
    grid_step: f64,
    runs: Vec<TiledPolygonRun>,
}

impl TiledPolygon {
    /// Rasterize `polygon` against a grid with cells of size `grid_step`.
    ///
    /// Scanline fill specialized to integer cells: each non-horizontal edge
    /// records a signed crossing event per grid-row boundary it passes, with
    /// the exact x intercept computed from the edge line. Events in a row
    /// are sorted by column and merged into closed intervals, splitting at
    /// directionally-consistent gaps of two cells or more. The gap rule
    /// keys off edge direction, so it assumes the ring is wound with
    /// ascending edges on spans' left side.
    pub fn new(polygon: &Polygon, grid_step: f64) -> Self {
        let mut tiled = Self {
            grid_step,
            runs: Vec::new(),
        };
        let Some(bounds) = polygon.bounds() else {
            return tiled;
        };

        let row_min = to_grid(bounds.y_min, grid_step);
        let row_max = to_grid(bounds.y_max, grid_step);
        let number_of_rows = (row_max - row_min + 1) as usize;
        let mut rows: Vec<Vec<Crossing>> = vec![Vec::new(); number_of_rows];

        let vertices = polygon.vertices();
        for (i, p0) in vertices.iter().enumerate() {
            let p1 = &vertices[(i + 1) % vertices.len()];
            scan_edge(*p0, *p1, grid_step, row_min, &mut rows);
        }

        for (i, row) in rows.iter_mut().enumerate() {
            if row.is_empty() {
                continue;
            }
            row.sort_by_key(|crossing| crossing.column);

            let mut previous = row[0];
            let mut intervals = vec![IntervalI::new(row[0].column, row[0].column)];
            for crossing in &row[1..] {
                if crossing.is_gap_after(&previous) {
                    intervals.push(IntervalI::new(crossing.column, crossing.column));
                } else {
                    if let Some(last) = intervals.last_mut() {
                        last.set_sup(crossing.column);
                    }
                    previous = *crossing;
                }
            }

            let grid_row = row_min + i as i64;
            tiled
                .runs
                .extend(intervals.into_iter().map(|iv| TiledPolygonRun::new(grid_row, iv)));
        }

        tiled
    }

    /// Grid cell size the polygon was rasterized against.
    pub fn grid_step(&self) -> f64 {
        self.grid_step
    }

    /// The covered runs, ordered by row.
    pub fn runs(&self) -> &[TiledPolygonRun] {
        &self.runs
    }

    /// Diff this rasterization (the new one) against an older one.
    ///
    /// Every new run is cut against every old run sharing its row: the
    /// overlap goes to `same_area`, leftovers unique to the new run to
    /// `new_area` and leftovers unique to the old run to `old_area`. Runs
    /// with no overlapping counterpart contribute wholly to their side.
    pub fn diff(&self, old: &TiledPolygon) -> TiledPolygonDiff {
        let mut diff = TiledPolygonDiff::default();
        let mut old_intersected = vec![false; old.runs.len()];

        for new_run in &self.runs {
            let mut has_intersection = false;
            for (i, old_run) in old.runs.iter().enumerate() {
                if new_run.row != old_run.row {
                    continue;
                }
                let cut = new_run.interval.cut(&old_run.interval);
                if cut.intersection.is_empty() {
                    continue;
                }
                has_intersection = true;
                old_intersected[i] = true;

                diff.same_area
                    .push(TiledPolygonRun::new(new_run.row, cut.intersection));
                diff.new_area.extend(
                    cut.only_self
                        .into_iter()
                        .map(|iv| TiledPolygonRun::new(new_run.row, iv)),
                );
                diff.old_area.extend(
                    cut.only_other
                        .into_iter()
                        .map(|iv| TiledPolygonRun::new(new_run.row, iv)),
                );
            }
            if !has_intersection {
                diff.new_area.push(*new_run);
            }
        }

        for (i, old_run) in old.runs.iter().enumerate() {
            if !old_intersected[i] {
                diff.old_area.push(*old_run);
            }
        }

        diff
    }
}

impl Polygon {
    /// Rasterize the polygon against a grid with cells of size `grid_step`.
    pub fn intersect_with_grid(&self, grid_step: f64) -> TiledPolygon {
        TiledPolygon::new(self, grid_step)
    }
}

fn to_grid(value: f64, grid_step: f64) -> i64 {
    (value / grid_step) as i64
}

/// Record the grid-row crossing events of one polygon edge.
fn scan_edge(p0: Vec2, p1: Vec2, grid_step: f64, row_min: i64, rows: &mut [Vec<Crossing>]) {
    let column0 = to_grid(p0.x, grid_step);
    let row0 = to_grid(p0.y, grid_step);
    let column1 = to_grid(p1.x, grid_step);
    let row1 = to_grid(p1.y, grid_step);

    // horizontal edges never cross a row boundary
    if row0 == row1 {
        return;
    }

    let direction = if row1 > row0 { 1 } else { -1 };
    let (bottom_row, bottom_column, top_row, top_column) = if direction > 0 {
        (row0, column0, row1, column1)
    } else {
        (row1, column1, row0, column0)
    };

    push_crossing(rows, bottom_row - row_min, bottom_column, direction);
    for row in (bottom_row + 1)..=top_row {
        let boundary_y = row as f64 * grid_step;
        let x = p0.x + (boundary_y - p0.y) * (p1.x - p0.x) / (p1.y - p0.y);
        let column = to_grid(x, grid_step);
        // a leftward edge's boundary intercept belongs to the row below
        let mut index = row - row_min;
        if column1 < column0 {
            index -= 1;
        }
        push_crossing(rows, index, column, direction);
    }
    push_crossing(rows, top_row - row_min, top_column, direction);
}

fn push_crossing(rows: &mut [Vec<Crossing>], index: i64, column: i64, direction: i32) {
    if index >= 0 {
        if let Some(row) = rows.get_mut(index as usize) {
            row.push(Crossing { column, direction });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon {
        Polygon::from_coordinates(&[0.5, 0.5, 1.5, 0.5, 1.5, 1.5, 0.5, 1.5])
    }

    #[test]
    fn test_square_spanning_two_by_two_cells() {
        let tiled = square().intersect_with_grid(1.0);
        let runs = tiled.runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], TiledPolygonRun::new(0, IntervalI::new(0, 1)));
        assert_eq!(runs[1], TiledPolygonRun::new(1, IntervalI::new(0, 1)));
    }

    #[test]
    fn test_right_triangle() {
        // hypotenuse x = y; ascending edge first so spans open on the left
        let triangle =
            Polygon::from_coordinates(&[0.5, 0.5, 4.5, 4.5, 4.5, 0.5]);
        let tiled = triangle.intersect_with_grid(1.0);
        let runs = tiled.runs();
        assert_eq!(runs.len(), 5);
        for (i, run) in runs.iter().enumerate() {
            let row = i as i64;
            assert_eq!(*run, TiledPolygonRun::new(row, IntervalI::new(row, 4)));
        }
    }

    #[test]
    fn test_empty_polygon_has_no_runs() {
        let tiled = Polygon::new(Vec::new()).intersect_with_grid(1.0);
        assert!(tiled.runs().is_empty());
    }

    #[test]
    fn test_run_columns() {
        let run = TiledPolygonRun::new(3, IntervalI::new(2, 4));
        assert_eq!(run.columns().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_diff_with_itself_is_all_same() {
        let tiled = square().intersect_with_grid(1.0);
        let diff = tiled.diff(&tiled);
        assert_eq!(diff.same_area(), tiled.runs());
        assert!(diff.new_area().is_empty());
        assert!(diff.old_area().is_empty());
    }

    #[test]
    fn test_diff_after_pan() {
        let old = square().intersect_with_grid(1.0);
        let panned = Polygon::from_coordinates(&[1.5, 0.5, 2.5, 0.5, 2.5, 1.5, 1.5, 1.5]);
        let new = panned.intersect_with_grid(1.0);

        let diff = new.diff(&old);
        assert_eq!(
            diff.same_area(),
            &[
                TiledPolygonRun::new(0, IntervalI::new(1, 1)),
                TiledPolygonRun::new(1, IntervalI::new(1, 1)),
            ]
        );
        assert_eq!(
            diff.new_area(),
            &[
                TiledPolygonRun::new(0, IntervalI::new(2, 2)),
                TiledPolygonRun::new(1, IntervalI::new(2, 2)),
            ]
        );
        assert_eq!(
            diff.old_area(),
            &[
                TiledPolygonRun::new(0, IntervalI::new(0, 0)),
                TiledPolygonRun::new(1, IntervalI::new(0, 0)),
            ]
        );
    }

    #[test]
    fn test_diff_disjoint_rasterizations() {
        let old = square().intersect_with_grid(1.0);
        let far = Polygon::from_coordinates(&[10.5, 10.5, 11.5, 10.5, 11.5, 11.5, 10.5, 11.5]);
        let new = far.intersect_with_grid(1.0);

        let diff = new.diff(&old);
        assert!(diff.same_area().is_empty());
        assert_eq!(diff.new_area(), new.runs());
        assert_eq!(diff.old_area(), old.runs());
    }
}
