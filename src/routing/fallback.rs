//! The simpler per-edge strategies that predate the adaptive engine.
//!
//! `fixed_grid` searches a fresh grid per edge with a fixed cell size and
//! inflated obstacles; `heuristic` only checks the straight line and swings a
//! fixed offset around anything it hits.

use log::debug;

use crate::config::RoutingConfig;
use crate::ir::NodeShape;

use super::attachment::{Attachment, default_pair, push_outward};
use super::geometry::{BoundingBox, Point, segment_intersects_box, shape_boundary_point};
use super::grid::{GridParams, ObstacleGrid};
use super::search::{SearchParams, center_points, orthogonal_points, route_between};
use super::smoothing::{douglas_peucker, remove_collinear, round_corners};

/// Extra push beyond `route_margin` for fixed-grid endpoints.
const FIXED_PUSH_EXTRA: f32 = 5.0;
/// Douglas-Peucker tolerance for fixed-grid cell paths.
const FIXED_SIMPLIFY_TOLERANCE: f32 = 15.0;
/// Clearance used when counting how many obstacles a detour still crosses.
const CROSSING_MARGIN: f32 = 5.0;

/// A node as seen by the fallback strategies.
#[derive(Debug, Clone, Copy)]
pub struct EndpointNode<'a> {
    pub bbox: &'a BoundingBox,
    pub shape: NodeShape,
}

/// Straight boundary-to-boundary line, shape aware.
pub fn straight_line(source: EndpointNode<'_>, target: EndpointNode<'_>) -> Vec<Point> {
    let start = shape_boundary_point(source.shape, source.bbox, target.bbox.center());
    let end = shape_boundary_point(target.shape, target.bbox, source.bbox.center());
    vec![start, end]
}

/// Searches a per-edge grid of `config.cell_size` cells over `bounds`, with
/// every box in `others` inflated by `route_margin`. `None` when no path exists.
pub fn route_fixed_grid(
    source: EndpointNode<'_>,
    target: EndpointNode<'_>,
    others: &[BoundingBox],
    bounds: BoundingBox,
    config: &RoutingConfig,
) -> Option<Vec<Point>> {
    let params = GridParams {
        margin: config.route_margin,
        cell_size: config.cell_size,
    };
    let mut grid = ObstacleGrid::new(bounds, params, config.max_grid_cells);
    for bbox in others {
        grid.mark_box(&bbox.inflate(config.route_margin));
    }
    let push = config.route_margin + FIXED_PUSH_EXTRA;
    let orthogonal = config.is_orthogonal();
    let (start, end) = if orthogonal {
        let attachment = Attachment::new(
            source.bbox,
            target.bbox,
            default_pair(source.bbox, target.bbox),
            params,
        );
        (attachment.start, attachment.end)
    } else {
        let line = straight_line(source, target);
        (line[0], line[1])
    };
    let start_pushed = push_outward(start, source.bbox, push);
    let end_pushed = push_outward(end, target.bbox, push);

    let search = SearchParams::from_config(config);
    let cells = route_between(&mut grid, start_pushed, end_pushed, &search)?;
    debug!("fixed grid search: {} cells", cells.len());

    let mut points = vec![start];
    if orthogonal {
        points.extend(orthogonal_points(&grid, &cells, start_pushed, end_pushed));
        points.push(end);
        return Some(remove_collinear(&points));
    }
    points.extend(douglas_peucker(
        &center_points(&grid, &cells, start_pushed, end_pushed),
        FIXED_SIMPLIFY_TOLERANCE,
    ));
    points.push(end);
    Some(round_corners(&remove_collinear(&points), config.smoothness))
}

/// Result of the heuristic strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicRoute {
    pub points: Vec<Point>,
    /// False when the straight line was already clear.
    pub detoured: bool,
}

/// Straight line when nothing is in the way, otherwise a four-point detour
/// offset by `route_offset` to whichever side crosses fewer obstacles.
pub fn route_heuristic(
    source: EndpointNode<'_>,
    target: EndpointNode<'_>,
    others: &[BoundingBox],
    config: &RoutingConfig,
) -> HeuristicRoute {
    let line = straight_line(source, target);
    let (start, end) = (line[0], line[1]);
    let obstacles: Vec<BoundingBox> = others
        .iter()
        .filter(|bbox| segment_intersects_box(start, end, &bbox.inflate(config.route_margin)))
        .copied()
        .collect();
    if obstacles.is_empty() {
        return HeuristicRoute {
            points: line,
            detoured: false,
        };
    }

    let offset = config.route_offset;
    let delta = end - start;
    let detour = |shift: f32| {
        if delta.x.abs() > delta.y.abs() {
            let mid_x = (start.x + end.x) / 2.0;
            vec![
                start,
                Point::new(mid_x, start.y + shift),
                Point::new(mid_x, end.y + shift),
                end,
            ]
        } else {
            let mid_y = (start.y + end.y) / 2.0;
            vec![
                start,
                Point::new(start.x + shift, mid_y),
                Point::new(end.x + shift, mid_y),
                end,
            ]
        }
    };
    let first = detour(-offset);
    let second = detour(offset);
    let chosen = if count_crossings(&first, &obstacles) <= count_crossings(&second, &obstacles) {
        first
    } else {
        second
    };
    debug!(
        "heuristic detour around {} obstacle(s), offset {:.1}",
        obstacles.len(),
        offset
    );
    let chosen = remove_collinear(&chosen);
    let points = if config.is_orthogonal() {
        chosen
    } else {
        round_corners(&chosen, config.smoothness)
    };
    HeuristicRoute {
        points,
        detoured: true,
    }
}

fn count_crossings(points: &[Point], obstacles: &[BoundingBox]) -> usize {
    points
        .windows(2)
        .map(|segment| {
            obstacles
                .iter()
                .filter(|bbox| {
                    segment_intersects_box(segment[0], segment[1], &bbox.inflate(CROSSING_MARGIN))
                })
                .count()
        })
        .sum()
}
