use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::debug;

use crate::config::{EdgeRouting, RoutingConfig};

use super::geometry::Point;
use super::grid::{Cell, ObstacleGrid};

// ── Search costs ────────────────────────────────────────────────────

/// Cost of one orthogonal step, in fixed-point cells.
const ORTHO_COST: u32 = 1000;
/// Cost of one diagonal step (≈ √2 cells).
const DIAGONAL_COST: u32 = 1414;

const ORTHO_STEPS: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];
const DIAGONAL_STEPS: [(i32, i32); 8] = [
    (0, -1),
    (0, 1),
    (-1, 0),
    (1, 0),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Orthogonal,
    Diagonal,
}

impl Movement {
    pub fn for_routing(routing: EdgeRouting) -> Self {
        match routing {
            EdgeRouting::Orthogonal => Movement::Orthogonal,
            EdgeRouting::Curved | EdgeRouting::Straight => Movement::Diagonal,
        }
    }

    fn steps(self) -> &'static [(i32, i32)] {
        match self {
            Movement::Orthogonal => &ORTHO_STEPS,
            Movement::Diagonal => &DIAGONAL_STEPS,
        }
    }

    /// Manhattan distance for 4-way movement, octile distance for 8-way.
    fn heuristic(self, from: Cell, to: Cell) -> u32 {
        let dx = (from.0 - to.0).unsigned_abs();
        let dy = (from.1 - to.1).unsigned_abs();
        match self {
            Movement::Orthogonal => (dx + dy).saturating_mul(ORTHO_COST),
            Movement::Diagonal => {
                let (lo, hi) = if dx < dy { (dx, dy) } else { (dy, dx) };
                (hi - lo)
                    .saturating_mul(ORTHO_COST)
                    .saturating_add(lo.saturating_mul(DIAGONAL_COST))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    pub movement: Movement,
    /// Extra cost per change of direction, fixed-point like the step costs.
    pub turn_penalty: u32,
    pub max_steps: usize,
}

impl SearchParams {
    pub fn from_config(config: &RoutingConfig) -> Self {
        Self {
            movement: Movement::for_routing(config.edge_routing),
            turn_penalty: (config.turn_penalty * ORTHO_COST as f32).round() as u32,
            max_steps: config.max_search_steps,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct GridState {
    x: i32,
    y: i32,
    dir: u8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct GridEntry {
    est: u32,
    cost: u32,
    state: GridState,
}

impl Ord for GridEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .est
            .cmp(&self.est)
            .then_with(|| other.cost.cmp(&self.cost))
            .then_with(|| self.state.y.cmp(&other.state.y))
            .then_with(|| self.state.x.cmp(&other.state.x))
            .then_with(|| self.state.dir.cmp(&other.state.dir))
    }
}

impl PartialOrd for GridEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cheapest walkable cell path from `start` to `end`, both included.
///
/// States carry the direction of the last step so bends can be charged
/// `turn_penalty`. Diagonal steps never squeeze between two blocked cells.
/// Returns `None` when the target is unreachable, the expansion budget runs
/// out, or the path would be shorter than two cells.
pub fn find_cell_path(
    grid: &ObstacleGrid,
    start: Cell,
    end: Cell,
    params: &SearchParams,
) -> Option<Vec<Cell>> {
    if start == end || !grid.contains_cell(start) || !grid.contains_cell(end) {
        return None;
    }
    let steps = params.movement.steps();
    let dirs = steps.len();
    let cols = grid.cols();
    let state_index = |x: i32, y: i32, dir: usize| ((y * cols + x) as usize) * dirs + dir;
    let states = (cols * grid.rows()) as usize * dirs;
    let mut best_cost = vec![u32::MAX; states];
    let mut prev: Vec<Option<GridState>> = vec![None; states];
    let mut heap = BinaryHeap::new();

    let start_est = params.movement.heuristic(start, end);
    for dir in 0..dirs {
        best_cost[state_index(start.0, start.1, dir)] = 0;
        heap.push(GridEntry {
            est: start_est,
            cost: 0,
            state: GridState {
                x: start.0,
                y: start.1,
                dir: dir as u8,
            },
        });
    }

    let mut end_state: Option<GridState> = None;
    let mut expanded = 0usize;

    while let Some(GridEntry { cost, state, .. }) = heap.pop() {
        if cost != best_cost[state_index(state.x, state.y, state.dir as usize)] {
            continue;
        }
        expanded += 1;
        if expanded > params.max_steps {
            debug!("search budget of {} expansions exhausted", params.max_steps);
            break;
        }
        if (state.x, state.y) == end {
            end_state = Some(state);
            break;
        }
        for (dir_idx, &(dx, dy)) in steps.iter().enumerate() {
            let next = (state.x + dx, state.y + dy);
            if grid.is_blocked(next) {
                continue;
            }
            let diagonal = dx != 0 && dy != 0;
            if diagonal
                && (grid.is_blocked((state.x + dx, state.y))
                    || grid.is_blocked((state.x, state.y + dy)))
            {
                continue;
            }
            let mut next_cost =
                cost.saturating_add(if diagonal { DIAGONAL_COST } else { ORTHO_COST });
            if state.dir as usize != dir_idx {
                next_cost = next_cost.saturating_add(params.turn_penalty);
            }
            let next_idx = state_index(next.0, next.1, dir_idx);
            if next_cost >= best_cost[next_idx] {
                continue;
            }
            best_cost[next_idx] = next_cost;
            prev[next_idx] = Some(state);
            heap.push(GridEntry {
                est: next_cost.saturating_add(params.movement.heuristic(next, end)),
                cost: next_cost,
                state: GridState {
                    x: next.0,
                    y: next.1,
                    dir: dir_idx as u8,
                },
            });
        }
    }

    let end_state = end_state?;
    let mut cells = Vec::new();
    let mut cur = end_state;
    loop {
        cells.push((cur.x, cur.y));
        match prev[state_index(cur.x, cur.y, cur.dir as usize)] {
            Some(prev_state) => cur = prev_state,
            None => break,
        }
    }
    cells.reverse();
    debug!(
        "grid search: {} cells after {} expansions",
        cells.len(),
        expanded
    );
    (cells.len() >= 2).then_some(cells)
}

/// Searches between the cells holding `start` and `end`, with both cells
/// treated as walkable for the duration of the search only.
pub fn route_between(
    grid: &mut ObstacleGrid,
    start: Point,
    end: Point,
    params: &SearchParams,
) -> Option<Vec<Cell>> {
    let start_cell = grid.cell_for_point(start);
    let end_cell = grid.cell_for_point(end);
    let scoped = grid.force_walkable(&[start_cell, end_cell]);
    find_cell_path(&scoped, start_cell, end_cell, params)
}

/// First cell, last cell and every cell where the step direction changes.
pub fn cell_corners(cells: &[Cell]) -> Vec<Cell> {
    if cells.len() <= 2 {
        return cells.to_vec();
    }
    let mut corners = vec![cells[0]];
    for window in cells.windows(3) {
        let (a, b, c) = (window[0], window[1], window[2]);
        if (b.0 - a.0, b.1 - a.1) != (c.0 - b.0, c.1 - b.1) {
            corners.push(b);
        }
    }
    corners.push(cells[cells.len() - 1]);
    corners
}

/// Cell centres with the first and last replaced by `start` and `end`.
pub fn center_points(grid: &ObstacleGrid, cells: &[Cell], start: Point, end: Point) -> Vec<Point> {
    let mut points: Vec<Point> = cells.iter().map(|&cell| grid.cell_center(cell)).collect();
    if let Some(first) = points.first_mut() {
        *first = start;
    }
    if let Some(last) = points.last_mut() {
        *last = end;
    }
    points
}

/// Axis-aligned polyline from `start` to `end` following a 4-connected cell
/// path. The first run is slid across its row or column onto `start` and the
/// last run onto `end`; a single run whose ends disagree gets a jog at its
/// midpoint.
pub fn orthogonal_points(
    grid: &ObstacleGrid,
    cells: &[Cell],
    start: Point,
    end: Point,
) -> Vec<Point> {
    let mut corners: Vec<Point> = cell_corners(cells)
        .into_iter()
        .map(|cell| grid.cell_center(cell))
        .collect();
    if corners.len() < 2 {
        return vec![start, end];
    }
    let horizontal = |a: Point, b: Point| (a.y - b.y).abs() <= 1e-4;

    if corners.len() == 2 {
        let (a, b) = (corners[0], corners[1]);
        return if horizontal(a, b) {
            let mid_x = (a.x + b.x) / 2.0;
            jogged(start, end, Point::new(mid_x, start.y), Point::new(mid_x, end.y))
        } else {
            let mid_y = (a.y + b.y) / 2.0;
            jogged(start, end, Point::new(start.x, mid_y), Point::new(end.x, mid_y))
        };
    }

    let n = corners.len();
    if horizontal(corners[0], corners[1]) {
        corners[0].y = start.y;
        corners[1].y = start.y;
    } else {
        corners[0].x = start.x;
        corners[1].x = start.x;
    }
    if horizontal(corners[n - 2], corners[n - 1]) {
        corners[n - 2].y = end.y;
        corners[n - 1].y = end.y;
    } else {
        corners[n - 2].x = end.x;
        corners[n - 1].x = end.x;
    }

    let mut points = Vec::with_capacity(n + 2);
    points.push(start);
    points.extend(corners);
    points.push(end);
    points
}

fn jogged(start: Point, end: Point, a: Point, b: Point) -> Vec<Point> {
    if a.approx_eq(b) {
        vec![start, end]
    } else {
        vec![start, a, b, end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::geometry::BoundingBox;
    use crate::routing::grid::GridParams;

    fn open_grid(size: f32) -> ObstacleGrid {
        let params = GridParams {
            margin: 10.0,
            cell_size: 10,
        };
        ObstacleGrid::new(BoundingBox::new(0.0, 0.0, size, size), params, 1_000_000)
    }

    fn params(movement: Movement) -> SearchParams {
        SearchParams {
            movement,
            turn_penalty: 500,
            max_steps: 100_000,
        }
    }

    fn assert_connected(cells: &[Cell], movement: Movement) {
        for pair in cells.windows(2) {
            let dx = (pair[1].0 - pair[0].0).abs();
            let dy = (pair[1].1 - pair[0].1).abs();
            match movement {
                Movement::Orthogonal => assert_eq!(dx + dy, 1, "{pair:?}"),
                Movement::Diagonal => assert!(dx <= 1 && dy <= 1 && dx + dy > 0, "{pair:?}"),
            }
        }
    }

    #[test]
    fn straight_corridor_is_direct() {
        let grid = open_grid(100.0);
        let cells = find_cell_path(&grid, (1, 5), (8, 5), &params(Movement::Orthogonal)).unwrap();
        assert_eq!(cells.len(), 8);
        assert!(cells.iter().all(|cell| cell.1 == 5));
    }

    #[test]
    fn wall_forces_detour() {
        let mut grid = open_grid(100.0);
        for y in 0..9 {
            grid.mark_cell((5, y));
        }
        for movement in [Movement::Orthogonal, Movement::Diagonal] {
            let cells = find_cell_path(&grid, (2, 2), (8, 2), &params(movement)).unwrap();
            assert_eq!(cells.first(), Some(&(2, 2)));
            assert_eq!(cells.last(), Some(&(8, 2)));
            assert!(cells.iter().all(|&cell| grid.is_walkable(cell)));
            assert!(cells.contains(&(5, 9)) || cells.contains(&(5, 10)));
            assert_connected(&cells, movement);
        }
    }

    #[test]
    fn turn_penalty_prefers_single_bend() {
        let grid = open_grid(100.0);
        let cells = find_cell_path(&grid, (1, 1), (6, 6), &params(Movement::Orthogonal)).unwrap();
        assert_eq!(cells.len(), 11);
        assert_eq!(cell_corners(&cells).len(), 3);
    }

    #[test]
    fn diagonal_moves_do_not_cut_corners() {
        let mut grid = open_grid(50.0);
        for cell in [(0, 0), (1, 0), (2, 0), (0, 1), (0, 2), (1, 2)] {
            grid.mark_cell(cell);
        }
        let mut squeezed = grid.clone();
        squeezed.mark_cell((2, 1));
        // Leaving (1,1) towards (2,2) would squeeze between (2,1) and (1,2).
        assert!(find_cell_path(&squeezed, (1, 1), (2, 2), &params(Movement::Diagonal)).is_none());
        let cells = find_cell_path(&grid, (1, 1), (2, 2), &params(Movement::Diagonal)).unwrap();
        assert_eq!(cells, vec![(1, 1), (2, 1), (2, 2)]);
    }

    #[test]
    fn enclosed_target_fails() {
        let mut grid = open_grid(100.0);
        for x in 4..=6 {
            for y in 4..=6 {
                if (x, y) != (5, 5) {
                    grid.mark_cell((x, y));
                }
            }
        }
        assert!(find_cell_path(&grid, (1, 1), (5, 5), &params(Movement::Diagonal)).is_none());
        assert!(find_cell_path(&grid, (1, 1), (1, 1), &params(Movement::Diagonal)).is_none());
    }

    #[test]
    fn expansion_budget_is_enforced() {
        let grid = open_grid(200.0);
        let tight = SearchParams {
            max_steps: 3,
            ..params(Movement::Orthogonal)
        };
        assert!(find_cell_path(&grid, (0, 0), (19, 19), &tight).is_none());
    }

    #[test]
    fn route_between_restores_blocked_endpoints() {
        let mut grid = open_grid(100.0);
        grid.mark_cell((1, 5));
        grid.mark_cell((8, 5));
        let start = grid.cell_center((1, 5));
        let end = grid.cell_center((8, 5));
        let cells = route_between(&mut grid, start, end, &params(Movement::Orthogonal)).unwrap();
        assert_eq!(cells.first(), Some(&(1, 5)));
        assert_eq!(cells.last(), Some(&(8, 5)));
        assert!(grid.is_blocked((1, 5)));
        assert!(grid.is_blocked((8, 5)));
    }

    #[test]
    fn search_is_deterministic() {
        let mut grid = open_grid(150.0);
        grid.mark_box(&BoundingBox::new(50.0, 30.0, 40.0, 80.0));
        let a = find_cell_path(&grid, (1, 7), (13, 7), &params(Movement::Diagonal));
        let b = find_cell_path(&grid, (1, 7), (13, 7), &params(Movement::Diagonal));
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn corners_keep_direction_changes() {
        let cells = [(0, 0), (1, 0), (2, 0), (2, 1), (2, 2), (3, 2)];
        assert_eq!(cell_corners(&cells), vec![(0, 0), (2, 0), (2, 2), (3, 2)]);
    }

    #[test]
    fn orthogonal_points_are_axis_aligned() {
        let grid = open_grid(100.0);
        let cells = [(1, 1), (2, 1), (3, 1), (3, 2), (3, 3), (3, 4), (4, 4)];
        let start = Point::new(12.0, 13.0);
        let end = Point::new(47.0, 41.0);
        let points = orthogonal_points(&grid, &cells, start, end);
        assert_eq!(points.first(), Some(&start));
        assert_eq!(points.last(), Some(&end));
        for pair in points.windows(2) {
            let dx = (pair[1].x - pair[0].x).abs();
            let dy = (pair[1].y - pair[0].y).abs();
            assert!(dx <= 1e-4 || dy <= 1e-4, "{pair:?}");
        }
    }

    #[test]
    fn single_run_with_offset_ends_gets_a_jog() {
        let grid = open_grid(100.0);
        let cells = [(1, 1), (2, 1), (3, 1), (4, 1)];
        let points = orthogonal_points(&grid, &cells, Point::new(12.0, 11.0), Point::new(44.0, 18.0));
        assert_eq!(
            points,
            vec![
                Point::new(12.0, 11.0),
                Point::new(30.0, 11.0),
                Point::new(30.0, 18.0),
                Point::new(44.0, 18.0),
            ]
        );
        let aligned = orthogonal_points(&grid, &cells, Point::new(12.0, 15.0), Point::new(44.0, 15.0));
        assert_eq!(aligned, vec![Point::new(12.0, 15.0), Point::new(44.0, 15.0)]);
    }
}
