//! Obstacle-aware edge routing.
//!
//! One pass builds an adaptive [`ObstacleGrid`] from the node boxes, then
//! routes edges one at a time: a direct line-of-sight check over ranked side
//! pairs first, a grid search over a handful of corner-biased pairs when every
//! direct line is blocked, and a straight fallback line when the search fails too.
//! Every routed path with bends is burned into the grid so later edges steer
//! around it.

pub mod attachment;
pub mod fallback;
pub mod geometry;
pub mod grid;
pub mod search;
pub mod smoothing;

use std::iter;

use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, EdgeOrder, RoutingConfig, RoutingStrategy};
use crate::ir::{Diagram, Direction, NodeShape};

pub use geometry::{BoundingBox, Point};
pub use grid::{GridParams, ObstacleGrid};

use attachment::{Attachment, SEARCH_SIDE_PAIRS, SidePair, default_pair, ranked_pairs};
use fallback::{EndpointNode, route_fixed_grid, route_heuristic, straight_line};
use geometry::{path_length, segment_intersects_box};
use grid::padded_bounds;
use search::{SearchParams, center_points, orthogonal_points, route_between};
use smoothing::{
    catmull_rom, gentle_curve, polyline_clear, remove_collinear, round_corners, shortcut,
};

// ── Orchestration constants ─────────────────────────────────────────

/// Smallest cell the retry pass will shrink to.
const RETRY_MIN_CELL: usize = 3;
/// Self-loops clear their box by at least this much.
const SELF_LOOP_MIN_PAD: f32 = 12.0;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("invalid routing configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// How an edge ended up with its points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteOutcome {
    /// A straight line between pushed attachment points was clear.
    Direct,
    /// Grid search found a path, on the main grid or on the finer retry grid.
    Searched { retried: bool },
    /// Heuristic strategy swung around an obstacle on the straight line.
    Detoured,
    SelfLoop,
    /// Straight routing or obstacle avoidance turned off.
    Straight,
    /// Every attempt failed; the default attachment line may cross shapes.
    Fallback,
    /// An endpoint is unknown or has no box; no points were produced.
    Skipped,
}

impl RouteOutcome {
    pub fn is_degraded(self) -> bool {
        matches!(self, RouteOutcome::Fallback | RouteOutcome::Skipped)
    }
}

/// A routed edge that has been burned into the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedSegment {
    pub from: String,
    pub to: String,
    pub start: Point,
    pub end: Point,
    pub waypoints: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeReport {
    pub from: String,
    pub to: String,
    pub outcome: RouteOutcome,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone)]
pub struct RoutingReport {
    /// One entry per edge, in input order.
    pub edges: Vec<EdgeReport>,
    pub params: GridParams,
    /// The obstacle grid as it stood after the last edge.
    pub grid: ObstacleGrid,
    /// Routed paths that were marked as obstacles, in routing order.
    pub segments: Vec<RoutedSegment>,
}

impl RoutingReport {
    pub fn count(&self, outcome: RouteOutcome) -> usize {
        self.edges.iter().filter(|edge| edge.outcome == outcome).count()
    }

    pub fn degraded(&self) -> usize {
        self.edges
            .iter()
            .filter(|edge| edge.outcome.is_degraded())
            .count()
    }

    pub fn edge(&self, from: &str, to: &str) -> Option<&EdgeReport> {
        self.edges
            .iter()
            .find(|edge| edge.from == from && edge.to == to)
    }
}

/// Routes every edge of `diagram`, overwriting each edge's `points`.
///
/// The configuration is validated before any grid is built. Failing edges
/// never abort the pass: they fall back to a straight line (or are skipped
/// when a node box is missing) and are flagged in the report.
pub fn route_diagram(
    diagram: &mut Diagram,
    config: &RoutingConfig,
) -> Result<RoutingReport, RoutingError> {
    config.validate()?;
    let nodes: Vec<(String, BoundingBox)> = diagram
        .nodes
        .iter()
        .filter_map(|(id, node)| node.bbox.map(|bbox| (id.clone(), bbox)))
        .collect();
    let mut router = EdgeRouter::new(nodes, diagram.direction, config);
    info!(
        "routing {} edges: mode={} strategy={} order={}",
        diagram.edges.len(),
        config.edge_routing,
        config.strategy,
        config.edge_order
    );

    let order = routing_order(diagram, config.edge_order);
    let total = order.len();
    let mut reports: Vec<Option<EdgeReport>> = vec![None; diagram.edges.len()];
    for (step, idx) in order.into_iter().enumerate() {
        let edge = &diagram.edges[idx];
        let (from, to) = (edge.from.clone(), edge.to.clone());
        debug!("[{}/{}] routing {from} -> {to}", step + 1, total);
        let source = endpoint(diagram, &from);
        let target = endpoint(diagram, &to);
        let (points, outcome) = match (source, target) {
            (Some(source), Some(target)) => router.route_edge(&from, &to, source, target),
            _ => {
                warn!("skipping edge {from} -> {to}: endpoint is unknown or has no box");
                (Vec::new(), RouteOutcome::Skipped)
            }
        };
        debug!("{from} -> {to}: {:?} with {} points", outcome, points.len());
        diagram.edges[idx].points = points.clone();
        reports[idx] = Some(EdgeReport {
            from,
            to,
            outcome,
            points,
        });
    }

    let report = router.into_report(reports.into_iter().flatten().collect());
    info!(
        "routing complete: {} direct, {} searched, {} degraded",
        report.count(RouteOutcome::Direct),
        report.count(RouteOutcome::Searched { retried: false })
            + report.count(RouteOutcome::Searched { retried: true }),
        report.degraded()
    );
    Ok(report)
}

fn endpoint(diagram: &Diagram, id: &str) -> Option<(BoundingBox, NodeShape)> {
    diagram
        .nodes
        .get(id)
        .and_then(|node| node.bbox.map(|bbox| (bbox, node.shape)))
}

/// Edge indices in routing order. Shortest-first sorts stably by the distance
/// between box centres; edges with a missing box count as zero length.
fn routing_order(diagram: &Diagram, order: EdgeOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..diagram.edges.len()).collect();
    if order == EdgeOrder::ShortestFirst {
        let lengths: Vec<f32> = diagram
            .edges
            .iter()
            .map(|edge| {
                match (diagram.node_bbox(&edge.from), diagram.node_bbox(&edge.to)) {
                    (Some(a), Some(b)) => a.center().distance(b.center()),
                    _ => 0.0,
                }
            })
            .collect();
        indices.sort_by(|&a, &b| lengths[a].total_cmp(&lengths[b]));
    }
    indices
}

/// Per-pass knobs shared by the direct and search helpers.
#[derive(Debug, Clone, Copy)]
struct RouteSettings {
    orthogonal: bool,
    direction: Direction,
    search: SearchParams,
}

/// Routes edges one by one over a shared, growing obstacle grid.
pub struct EdgeRouter<'a> {
    config: &'a RoutingConfig,
    settings: RouteSettings,
    nodes: Vec<(String, BoundingBox)>,
    boxes: Vec<BoundingBox>,
    grid: ObstacleGrid,
    segments: Vec<RoutedSegment>,
}

impl<'a> EdgeRouter<'a> {
    pub fn new(
        nodes: Vec<(String, BoundingBox)>,
        direction: Direction,
        config: &'a RoutingConfig,
    ) -> Self {
        let boxes: Vec<BoundingBox> = nodes.iter().map(|(_, bbox)| *bbox).collect();
        let grid = ObstacleGrid::for_boxes(&boxes, config.max_grid_cells);
        Self {
            config,
            settings: RouteSettings {
                orthogonal: config.is_orthogonal(),
                direction,
                search: SearchParams::from_config(config),
            },
            nodes,
            boxes,
            grid,
            segments: Vec::new(),
        }
    }

    pub fn route_edge(
        &mut self,
        from: &str,
        to: &str,
        source: (BoundingBox, NodeShape),
        target: (BoundingBox, NodeShape),
    ) -> (Vec<Point>, RouteOutcome) {
        let source_node = EndpointNode {
            bbox: &source.0,
            shape: source.1,
        };
        let target_node = EndpointNode {
            bbox: &target.0,
            shape: target.1,
        };
        if self.config.routes_straight() {
            return (
                straight_line(source_node, target_node),
                RouteOutcome::Straight,
            );
        }
        if from == to {
            return self.route_self_loop(from, &source.0);
        }
        match self.config.strategy {
            RoutingStrategy::Adaptive => self.route_adaptive(from, to, &source.0, &target.0),
            RoutingStrategy::FixedGrid => {
                let others = self.other_boxes(from, to);
                let bounds = padded_bounds(&self.boxes);
                match route_fixed_grid(source_node, target_node, &others, bounds, self.config) {
                    Some(points) => {
                        self.record(from, to, &points, false);
                        (points, RouteOutcome::Searched { retried: false })
                    }
                    None => self.fallback(from, to, &source.0, &target.0),
                }
            }
            RoutingStrategy::Heuristic => {
                let others = self.other_boxes(from, to);
                let route = route_heuristic(source_node, target_node, &others, self.config);
                if route.detoured {
                    self.record(from, to, &route.points, false);
                    (route.points, RouteOutcome::Detoured)
                } else {
                    (route.points, RouteOutcome::Direct)
                }
            }
        }
    }

    fn other_boxes(&self, from: &str, to: &str) -> Vec<BoundingBox> {
        self.nodes
            .iter()
            .filter(|(id, _)| id != from && id != to)
            .map(|(_, bbox)| *bbox)
            .collect()
    }

    fn route_adaptive(
        &mut self,
        from: &str,
        to: &str,
        source: &BoundingBox,
        target: &BoundingBox,
    ) -> (Vec<Point>, RouteOutcome) {
        if let Some(attachment) = find_direct(&self.grid, source, target, &self.settings) {
            debug!("{from} -> {to}: direct line clear ({})", attachment.label());
            let points = if self.settings.orthogonal {
                attachment.direct_route()
            } else {
                vec![attachment.start, attachment.end]
            };
            self.record(from, to, &points, true);
            return (points, RouteOutcome::Direct);
        }

        debug!("{from} -> {to}: every direct line blocked, searching");
        if let Some(points) = search_candidates(&mut self.grid, source, target, &self.settings) {
            self.record(from, to, &points, true);
            return (points, RouteOutcome::Searched { retried: false });
        }
        if self.config.retry_smaller_cells {
            if let Some(points) = self.retry_with_smaller_cells(from, to, source, target) {
                self.record(from, to, &points, true);
                return (points, RouteOutcome::Searched { retried: true });
            }
        }
        self.fallback(from, to, source, target)
    }

    /// Searches again on a throwaway grid with half-size cells holding the
    /// same boxes and previously routed paths.
    fn retry_with_smaller_cells(
        &self,
        from: &str,
        to: &str,
        source: &BoundingBox,
        target: &BoundingBox,
    ) -> Option<Vec<Point>> {
        let current = self.grid.cell_size();
        let cell_size = (current / 2).max(RETRY_MIN_CELL);
        if cell_size >= current {
            return None;
        }
        info!("retrying {from} -> {to} with smaller cells: {current}px -> {cell_size}px");
        let params = GridParams {
            margin: self.grid.margin(),
            cell_size,
        };
        let mut fine = ObstacleGrid::with_boxes(&self.boxes, params, self.config.max_grid_cells);
        for segment in &self.segments {
            fine.mark_path(&segment.waypoints);
        }
        search_candidates(&mut fine, source, target, &self.settings)
    }

    fn fallback(
        &self,
        from: &str,
        to: &str,
        source: &BoundingBox,
        target: &BoundingBox,
    ) -> (Vec<Point>, RouteOutcome) {
        warn!("all routing attempts failed for {from} -> {to}; using a direct line that may cross other shapes");
        let (source_side, target_side) = default_pair(source, target);
        (
            vec![source_side.midpoint(source), target_side.midpoint(target)],
            RouteOutcome::Fallback,
        )
    }

    fn route_self_loop(&mut self, id: &str, bbox: &BoundingBox) -> (Vec<Point>, RouteOutcome) {
        let pad = (2.0 * self.grid.cell_size() as f32).max(SELF_LOOP_MIN_PAD);
        let candidates = self_loop_candidates(bbox, pad);
        let chosen = candidates
            .iter()
            .find(|candidate| loop_is_clear(&self.grid, candidate))
            .unwrap_or(&candidates[0]);
        let points = if self.settings.orthogonal {
            chosen.clone()
        } else {
            round_corners(chosen, self.config.smoothness)
        };
        self.record(id, id, &points, true);
        (points, RouteOutcome::SelfLoop)
    }

    /// Keeps paths with bends as obstacles for later edges; two-point lines never block.
    fn record(&mut self, from: &str, to: &str, points: &[Point], mark: bool) {
        let (Some(&start), Some(&end)) = (points.first(), points.last()) else {
            return;
        };
        if points.len() <= 2 {
            return;
        }
        if mark {
            self.grid.mark_path(points);
        }
        self.segments.push(RoutedSegment {
            from: from.to_string(),
            to: to.to_string(),
            start,
            end,
            waypoints: points.to_vec(),
        });
    }

    pub fn into_report(self, edges: Vec<EdgeReport>) -> RoutingReport {
        RoutingReport {
            edges,
            params: self.grid.params(),
            grid: self.grid,
            segments: self.segments,
        }
    }
}

fn axis_aligned(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() <= 1e-4 || (a.y - b.y).abs() <= 1e-4
}

/// First ranked side pair whose pushed attachment points see each other.
/// Orthogonal routing only accepts pairs that line up on an axis; curved
/// routing draws the boundary line itself, so that line must stay out of
/// both boxes.
fn find_direct(
    grid: &ObstacleGrid,
    source: &BoundingBox,
    target: &BoundingBox,
    settings: &RouteSettings,
) -> Option<Attachment> {
    let params = grid.params();
    let (source_inner, target_inner) = (source.inflate(-1.0), target.inflate(-1.0));
    ranked_pairs(source, target, settings.direction)
        .into_iter()
        .map(|pair| Attachment::new(source, target, pair, params))
        .filter(|attachment| {
            if settings.orthogonal {
                axis_aligned(attachment.start_pushed, attachment.end_pushed)
            } else {
                !segment_intersects_box(attachment.start, attachment.end, &source_inner)
                    && !segment_intersects_box(attachment.start, attachment.end, &target_inner)
            }
        })
        .find(|attachment| grid.line_clear(attachment.start_pushed, attachment.end_pushed))
}

/// Searches the default pair and the corner-biased pairs, keeping the
/// shortest post-processed path.
fn search_candidates(
    grid: &mut ObstacleGrid,
    source: &BoundingBox,
    target: &BoundingBox,
    settings: &RouteSettings,
) -> Option<Vec<Point>> {
    let pairs = iter::once(default_pair(source, target)).chain(SEARCH_SIDE_PAIRS);
    let mut best: Option<(f32, Vec<Point>)> = None;
    for pair in pairs {
        let Some(points) = search_pair(grid, source, target, pair, settings) else {
            continue;
        };
        let length = path_length(&points);
        if best
            .as_ref()
            .is_none_or(|(best_length, _)| length < *best_length)
        {
            best = Some((length, points));
        }
    }
    best.map(|(_, points)| points)
}

fn search_pair(
    grid: &mut ObstacleGrid,
    source: &BoundingBox,
    target: &BoundingBox,
    pair: SidePair,
    settings: &RouteSettings,
) -> Option<Vec<Point>> {
    let attachment = Attachment::new(source, target, pair, grid.params());
    let Some(cells) = route_between(
        grid,
        attachment.start_pushed,
        attachment.end_pushed,
        &settings.search,
    ) else {
        debug!("no path for {}", attachment.label());
        return None;
    };
    let points = if settings.orthogonal {
        let interior =
            orthogonal_points(grid, &cells, attachment.start_pushed, attachment.end_pushed);
        let mut raw = Vec::with_capacity(interior.len() + 2);
        raw.push(attachment.start);
        raw.extend(interior);
        raw.push(attachment.end);
        remove_collinear(&shortcut(&raw, grid, true))
    } else {
        let interior = center_points(grid, &cells, attachment.start_pushed, attachment.end_pushed);
        curved_path(&interior, &attachment, grid)
    };
    debug!(
        "{}: {} points, length {:.1}",
        attachment.label(),
        points.len(),
        path_length(&points)
    );
    Some(points)
}

/// Pulls and splines the path between the pushed points, then joins it to
/// the boundary points with straight stubs.
fn curved_path(interior: &[Point], attachment: &Attachment, grid: &ObstacleGrid) -> Vec<Point> {
    let corners = remove_collinear(&shortcut(interior, grid, false));
    let curve = if let [a, b] = corners[..] {
        let bulged = gentle_curve(a, b);
        if polyline_clear(&bulged, grid) {
            bulged
        } else {
            corners
        }
    } else {
        catmull_rom(&corners, grid)
    };
    let mut points = Vec::with_capacity(curve.len() + 2);
    points.push(attachment.start);
    for point in curve.into_iter().chain(iter::once(attachment.end)) {
        match points.last_mut() {
            Some(last) if last.approx_eq(point) => *last = point,
            _ => points.push(point),
        }
    }
    points
}

/// Rectangular loops around one corner of `bbox`, in preference order.
fn self_loop_candidates(bbox: &BoundingBox, pad: f32) -> [Vec<Point>; 6] {
    let center = bbox.center();
    let left = Point::new(bbox.x, center.y);
    let right = Point::new(bbox.right(), center.y);
    let top = Point::new(center.x, bbox.y);
    let bottom = Point::new(center.x, bbox.bottom());
    let left_x = bbox.x - pad;
    let right_x = bbox.right() + pad;
    let top_y = bbox.y - pad;
    let bottom_y = bbox.bottom() + pad;

    [
        vec![
            right,
            Point::new(right_x, center.y),
            Point::new(right_x, top_y),
            Point::new(center.x, top_y),
            top,
        ],
        vec![
            right,
            Point::new(right_x, center.y),
            Point::new(right_x, bottom_y),
            Point::new(center.x, bottom_y),
            bottom,
        ],
        vec![
            left,
            Point::new(left_x, center.y),
            Point::new(left_x, top_y),
            Point::new(center.x, top_y),
            top,
        ],
        vec![
            left,
            Point::new(left_x, center.y),
            Point::new(left_x, bottom_y),
            Point::new(center.x, bottom_y),
            bottom,
        ],
        vec![
            top,
            Point::new(center.x, top_y),
            Point::new(right_x, top_y),
            Point::new(right_x, center.y),
            right,
        ],
        vec![
            bottom,
            Point::new(center.x, bottom_y),
            Point::new(right_x, bottom_y),
            Point::new(right_x, center.y),
            right,
        ],
    ]
}

/// The legs touching the box are skipped; they start inside its cells.
fn loop_is_clear(grid: &ObstacleGrid, points: &[Point]) -> bool {
    points.len() < 3
        || points[1..points.len() - 1]
            .windows(2)
            .all(|segment| grid.line_clear(segment[0], segment[1]))
}
