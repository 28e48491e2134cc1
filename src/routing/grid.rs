use std::ops::{Deref, DerefMut};

use log::{debug, info, warn};

use super::geometry::{BoundingBox, Point};

// ── Grid sizing ─────────────────────────────────────────────────────

/// Empty border added around the union of all node boxes.
pub const GRID_PADDING: f32 = 100.0;
/// Margin used when no node carries a box.
const DEFAULT_MARGIN: f32 = 20.0;
const MARGIN_MIN: f32 = 5.0;
const MARGIN_MAX: f32 = 15.0;
const MARGIN_SIZE_RATIO: f32 = 0.08;
const DENSITY_BASE: f32 = 1.2;
const MIN_CELL_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridParams {
    pub margin: f32,
    pub cell_size: usize,
}

impl GridParams {
    /// Derives margin and cell size from the average box size and the share
    /// of the padded routing area the boxes cover.
    pub fn adaptive(boxes: &[BoundingBox]) -> Self {
        let margin = adaptive_margin(boxes);
        Self {
            margin,
            cell_size: (margin.floor() as usize).max(MIN_CELL_SIZE),
        }
    }
}

fn adaptive_margin(boxes: &[BoundingBox]) -> f32 {
    if boxes.is_empty() {
        return DEFAULT_MARGIN;
    }
    let avg_size = boxes.iter().map(BoundingBox::mean_extent).sum::<f32>() / boxes.len() as f32;
    let area = padded_bounds(boxes).area();
    let density = if area > 0.0 {
        boxes.iter().map(BoundingBox::area).sum::<f32>() / area
    } else {
        0.1
    };
    let margin = avg_size * MARGIN_SIZE_RATIO * (DENSITY_BASE - density);
    margin.clamp(MARGIN_MIN, MARGIN_MAX)
}

/// Union of `boxes` grown by [`GRID_PADDING`] on every side.
pub fn padded_bounds(boxes: &[BoundingBox]) -> BoundingBox {
    BoundingBox::union(boxes.iter())
        .unwrap_or_default()
        .inflate(GRID_PADDING)
}

// ── Occupancy grid ──────────────────────────────────────────────────

pub type Cell = (i32, i32);

/// Boolean occupancy map over the padded routing area.
#[derive(Debug, Clone)]
pub struct ObstacleGrid {
    cell: f32,
    cell_size: usize,
    margin: f32,
    min_x: f32,
    min_y: f32,
    cols: i32,
    rows: i32,
    blocked: Vec<bool>,
}

impl ObstacleGrid {
    /// Builds an empty grid over `bounds`. The cell grows when the grid would
    /// hold more than `max_cells` cells.
    pub fn new(bounds: BoundingBox, params: GridParams, max_cells: usize) -> Self {
        let mut cell_size = params.cell_size.max(1);
        let (mut cols, mut rows) = grid_dims(&bounds, cell_size);
        if cols.saturating_mul(rows) > max_cells {
            let requested = cell_size;
            cell_size = cell_size.max((bounds.area() / max_cells as f32).sqrt().ceil() as usize);
            (cols, rows) = grid_dims(&bounds, cell_size);
            while cols.saturating_mul(rows) > max_cells {
                cell_size += 1;
                (cols, rows) = grid_dims(&bounds, cell_size);
            }
            warn!(
                "routing grid capped at {max_cells} cells: cell size {requested}px -> {cell_size}px"
            );
        }
        Self {
            cell: cell_size as f32,
            cell_size,
            margin: params.margin,
            min_x: bounds.x,
            min_y: bounds.y,
            cols: cols as i32,
            rows: rows as i32,
            blocked: vec![false; cols * rows],
        }
    }

    /// Adaptive grid over the padded union of `boxes` with every box marked.
    pub fn for_boxes(boxes: &[BoundingBox], max_cells: usize) -> Self {
        let params = GridParams::adaptive(boxes);
        let grid = Self::with_boxes(boxes, params, max_cells);
        info!(
            "adaptive routing grid: margin={:.1}px cell={}px size={}x{}",
            grid.margin, grid.cell_size, grid.cols, grid.rows
        );
        grid
    }

    /// Grid over the padded union of `boxes` with explicit parameters and every box marked.
    pub fn with_boxes(boxes: &[BoundingBox], params: GridParams, max_cells: usize) -> Self {
        let mut grid = Self::new(padded_bounds(boxes), params, max_cells);
        for bbox in boxes {
            grid.mark_box(bbox);
        }
        grid
    }

    pub fn params(&self) -> GridParams {
        GridParams {
            margin: self.margin,
            cell_size: self.cell_size,
        }
    }

    pub fn cell_size(&self) -> usize {
        self.cell_size
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    pub fn cols(&self) -> i32 {
        self.cols
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    pub fn origin(&self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.iter().filter(|blocked| **blocked).count()
    }

    pub fn contains_cell(&self, (ix, iy): Cell) -> bool {
        ix >= 0 && iy >= 0 && ix < self.cols && iy < self.rows
    }

    fn index(&self, (ix, iy): Cell) -> usize {
        (iy * self.cols + ix) as usize
    }

    /// Out-of-range cells read as blocked.
    pub fn is_blocked(&self, cell: Cell) -> bool {
        !self.contains_cell(cell) || self.blocked[self.index(cell)]
    }

    pub fn is_walkable(&self, cell: Cell) -> bool {
        !self.is_blocked(cell)
    }

    pub fn mark_cell(&mut self, cell: Cell) {
        if self.contains_cell(cell) {
            let idx = self.index(cell);
            self.blocked[idx] = true;
        }
    }

    /// Cell containing `point`, clamped into the grid.
    pub fn cell_for_point(&self, point: Point) -> Cell {
        let ix = ((point.x - self.min_x) / self.cell).floor() as i32;
        let iy = ((point.y - self.min_y) / self.cell).floor() as i32;
        (ix.clamp(0, self.cols - 1), iy.clamp(0, self.rows - 1))
    }

    pub fn cell_center(&self, (ix, iy): Cell) -> Point {
        Point::new(
            self.min_x + (ix as f32 + 0.5) * self.cell,
            self.min_y + (iy as f32 + 0.5) * self.cell,
        )
    }

    /// Inclusive cell range spanned by `bbox`, clamped into the grid.
    pub fn box_cells(&self, bbox: &BoundingBox) -> (Cell, Cell) {
        (
            self.cell_for_point(bbox.top_left()),
            self.cell_for_point(bbox.bottom_right()),
        )
    }

    /// Marks exactly the cells the rectangle spans.
    pub fn mark_box(&mut self, bbox: &BoundingBox) {
        let ((x0, y0), (x1, y1)) = self.box_cells(bbox);
        for iy in y0..=y1 {
            for ix in x0..=x1 {
                self.mark_cell((ix, iy));
            }
        }
    }

    /// Marks a one-cell-wide wall along every segment of `points`.
    pub fn mark_path(&mut self, points: &[Point]) {
        let before = self.blocked_count();
        for segment in points.windows(2) {
            let from = self.cell_for_point(segment[0]);
            let to = self.cell_for_point(segment[1]);
            for cell in bresenham(from, to) {
                self.mark_cell(cell);
            }
        }
        debug!(
            "marked {} path cells over {} points",
            self.blocked_count() - before,
            points.len()
        );
    }

    /// True when no cell the segment passes through is blocked.
    pub fn line_clear(&self, a: Point, b: Point) -> bool {
        self.walk_segment(a, b, |cell| !self.is_blocked(cell))
    }

    /// Visits every cell the continuous segment touches, both neighbours
    /// included when it passes exactly through a cell corner. Stops early
    /// and returns false as soon as `visit` does.
    fn walk_segment(&self, a: Point, b: Point, mut visit: impl FnMut(Cell) -> bool) -> bool {
        let max_x = self.cols as f32 - 1e-3;
        let max_y = self.rows as f32 - 1e-3;
        let ax = ((a.x - self.min_x) / self.cell).clamp(0.0, max_x);
        let ay = ((a.y - self.min_y) / self.cell).clamp(0.0, max_y);
        let bx = ((b.x - self.min_x) / self.cell).clamp(0.0, max_x);
        let by = ((b.y - self.min_y) / self.cell).clamp(0.0, max_y);
        let (mut x, mut y) = (ax.floor() as i32, ay.floor() as i32);
        let end = (bx.floor() as i32, by.floor() as i32);
        let (dx, dy) = (bx - ax, by - ay);
        let step_x = if dx > 0.0 { 1 } else if dx < 0.0 { -1 } else { 0 };
        let step_y = if dy > 0.0 { 1 } else if dy < 0.0 { -1 } else { 0 };
        let delta_x = if step_x != 0 { 1.0 / dx.abs() } else { f32::INFINITY };
        let delta_y = if step_y != 0 { 1.0 / dy.abs() } else { f32::INFINITY };
        let mut next_x = match step_x {
            1 => (x as f32 + 1.0 - ax) * delta_x,
            -1 => (ax - x as f32) * delta_x,
            _ => f32::INFINITY,
        };
        let mut next_y = match step_y {
            1 => (y as f32 + 1.0 - ay) * delta_y,
            -1 => (ay - y as f32) * delta_y,
            _ => f32::INFINITY,
        };

        if !visit((x, y)) {
            return false;
        }
        let budget = (end.0 - x).abs() + (end.1 - y).abs() + 2;
        for _ in 0..budget {
            if (x, y) == end {
                break;
            }
            if step_x != 0 && step_y != 0 && (next_x - next_y).abs() < 1e-5 {
                if !visit((x + step_x, y)) || !visit((x, y + step_y)) {
                    return false;
                }
                x += step_x;
                y += step_y;
                next_x += delta_x;
                next_y += delta_y;
            } else if next_x < next_y {
                x += step_x;
                next_x += delta_x;
            } else {
                y += step_y;
                next_y += delta_y;
            }
            if !visit((x, y)) {
                return false;
            }
        }
        true
    }

    /// Forces `cells` walkable until the returned guard is dropped.
    pub fn force_walkable(&mut self, cells: &[Cell]) -> WalkableGuard<'_> {
        let mut saved = Vec::with_capacity(cells.len());
        for &cell in cells {
            if self.contains_cell(cell) {
                let idx = self.index(cell);
                saved.push((idx, self.blocked[idx]));
                self.blocked[idx] = false;
            }
        }
        WalkableGuard { grid: self, saved }
    }
}

fn grid_dims(bounds: &BoundingBox, cell_size: usize) -> (usize, usize) {
    let cell = cell_size as f32;
    (
        (bounds.width / cell).floor() as usize + 1,
        (bounds.height / cell).floor() as usize + 1,
    )
}

/// Scoped override of cell occupancy; restores the saved cells on drop.
pub struct WalkableGuard<'a> {
    grid: &'a mut ObstacleGrid,
    saved: Vec<(usize, bool)>,
}

impl Deref for WalkableGuard<'_> {
    type Target = ObstacleGrid;

    fn deref(&self) -> &Self::Target {
        self.grid
    }
}

impl DerefMut for WalkableGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.grid
    }
}

impl Drop for WalkableGuard<'_> {
    fn drop(&mut self) {
        for &(idx, blocked) in self.saved.iter().rev() {
            self.grid.blocked[idx] = blocked;
        }
    }
}

/// Integer line rasterisation between two cells, endpoints included.
pub fn bresenham(from: Cell, to: Cell) -> Vec<Cell> {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = (to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx - dy;
    let mut cells = Vec::with_capacity((dx.max(dy) + 1) as usize);
    loop {
        cells.push((x, y));
        if (x, y) == to {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc_boxes() -> Vec<BoundingBox> {
        vec![
            BoundingBox::new(0.0, 0.0, 100.0, 60.0),
            BoundingBox::new(300.0, 0.0, 100.0, 60.0),
            BoundingBox::new(150.0, 150.0, 100.0, 60.0),
        ]
    }

    #[test]
    fn adaptive_params_follow_size_and_density() {
        let params = GridParams::adaptive(&abc_boxes());
        // avg size 80, padded area 600x410, density ~0.0732
        assert!((params.margin - 7.2117).abs() < 1e-3);
        assert_eq!(params.cell_size, 7);
    }

    #[test]
    fn adaptive_params_clamp_and_default() {
        assert_eq!(GridParams::adaptive(&[]).margin, 20.0);
        let tiny = [BoundingBox::new(0.0, 0.0, 10.0, 10.0)];
        let params = GridParams::adaptive(&tiny);
        assert_eq!(params.margin, 5.0);
        assert_eq!(params.cell_size, 5);
        let huge = [BoundingBox::new(0.0, 0.0, 1000.0, 1000.0)];
        assert_eq!(GridParams::adaptive(&huge).margin, 15.0);
    }

    #[test]
    fn grid_covers_padded_area() {
        let grid = ObstacleGrid::for_boxes(&abc_boxes(), 250_000);
        assert_eq!(grid.origin(), Point::new(-100.0, -100.0));
        assert_eq!(grid.cols(), 600 / 7 + 1);
        assert_eq!(grid.rows(), 410 / 7 + 1);
        assert!(grid.is_blocked(grid.cell_for_point(Point::new(50.0, 30.0))));
        assert!(grid.is_walkable(grid.cell_for_point(Point::new(200.0, 30.0))));
        assert!(grid.is_blocked((-1, 0)));
    }

    #[test]
    fn mark_box_spans_exact_cells() {
        let params = GridParams {
            margin: 10.0,
            cell_size: 10,
        };
        let bounds = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let mut grid = ObstacleGrid::new(bounds, params, 10_000);
        grid.mark_box(&BoundingBox::new(20.0, 20.0, 15.0, 15.0));
        assert_eq!(grid.blocked_count(), 4);
        assert!(grid.is_blocked((2, 2)));
        assert!(grid.is_blocked((3, 3)));
        assert!(grid.is_walkable((4, 3)));
        assert!(grid.is_walkable((1, 2)));
    }

    #[test]
    fn oversized_grid_grows_its_cells() {
        let params = GridParams {
            margin: 5.0,
            cell_size: 5,
        };
        let bounds = BoundingBox::new(0.0, 0.0, 10_000.0, 10_000.0);
        let grid = ObstacleGrid::new(bounds, params, 10_000);
        assert!(grid.cell_size() > 5);
        assert!((grid.cols() * grid.rows()) as usize <= 10_000);
    }

    #[test]
    fn bresenham_includes_endpoints() {
        assert_eq!(bresenham((0, 0), (3, 0)), vec![(0, 0), (1, 0), (2, 0), (3, 0)]);
        assert_eq!(bresenham((2, 2), (0, 0)), vec![(2, 2), (1, 1), (0, 0)]);
        assert_eq!(bresenham((1, 1), (1, 1)), vec![(1, 1)]);
        let steep = bresenham((0, 0), (1, 4));
        assert_eq!(steep.first(), Some(&(0, 0)));
        assert_eq!(steep.last(), Some(&(1, 4)));
        assert_eq!(steep.len(), 5);
    }

    #[test]
    fn marked_path_blocks_line_of_sight() {
        let params = GridParams {
            margin: 10.0,
            cell_size: 10,
        };
        let mut grid = ObstacleGrid::new(BoundingBox::new(0.0, 0.0, 200.0, 200.0), params, 10_000);
        let left = Point::new(15.0, 105.0);
        let right = Point::new(185.0, 105.0);
        assert!(grid.line_clear(left, right));
        grid.mark_path(&[Point::new(105.0, 15.0), Point::new(105.0, 185.0)]);
        assert!(!grid.line_clear(left, right));
        assert!(grid.line_clear(Point::new(15.0, 15.0), Point::new(15.0, 185.0)));
    }

    #[test]
    fn line_clear_catches_corner_crossings() {
        let params = GridParams {
            margin: 10.0,
            cell_size: 10,
        };
        let mut grid = ObstacleGrid::new(BoundingBox::new(0.0, 0.0, 100.0, 100.0), params, 10_000);
        grid.mark_cell((1, 0));
        // Passes exactly through the shared corner of (0,0), (1,0), (0,1), (1,1).
        assert!(!grid.line_clear(Point::new(5.0, 5.0), Point::new(15.0, 15.0)));
        // A thin diagonal touches the blocked cell on the way.
        assert!(!grid.line_clear(Point::new(2.0, 8.0), Point::new(25.0, 2.0)));
        assert!(grid.line_clear(Point::new(5.0, 15.0), Point::new(95.0, 15.0)));
    }

    #[test]
    fn walkable_guard_restores_on_drop() {
        let params = GridParams {
            margin: 10.0,
            cell_size: 10,
        };
        let mut grid = ObstacleGrid::new(BoundingBox::new(0.0, 0.0, 50.0, 50.0), params, 10_000);
        grid.mark_cell((1, 1));
        {
            let guard = grid.force_walkable(&[(1, 1), (2, 2), (99, 99)]);
            assert!(guard.is_walkable((1, 1)));
            assert!(guard.is_walkable((2, 2)));
        }
        assert!(grid.is_blocked((1, 1)));
        assert!(grid.is_walkable((2, 2)));
    }
}
