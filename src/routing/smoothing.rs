use log::debug;

use super::geometry::{Point, perpendicular_distance};
use super::grid::ObstacleGrid;

// ── Curve shaping ───────────────────────────────────────────────────

/// Segments shorter than this stay straight.
const GENTLE_CURVE_MIN_LEN: f32 = 30.0;
/// Peak bulge of a gentle curve as a fraction of its length.
const GENTLE_CURVE_BULGE: f32 = 0.025;
const GENTLE_CURVE_SEGMENT_LEN: f32 = 30.0;
const MIN_SAMPLES: usize = 3;
/// Samples per span are one per this many cells of span length.
const SPLINE_CELLS_PER_SAMPLE: f32 = 3.0;
/// Douglas-Peucker tolerance after spline sampling, in cells.
const SPLINE_TOLERANCE_CELLS: f32 = 0.5;
const CORNER_STEPS: usize = 4;

fn axis_aligned(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() <= 1e-4 || (a.y - b.y).abs() <= 1e-4
}

/// Greedy string-pulling: from each kept point jump to the farthest later
/// point that is still in line of sight, stopping at the first blocked one.
/// In orthogonal mode only axis-aligned jumps are considered.
pub fn shortcut(points: &[Point], grid: &ObstacleGrid, orthogonal: bool) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut out = vec![points[0]];
    let mut current = 0;
    while current < points.len() - 1 {
        let mut farthest = current + 1;
        for candidate in current + 2..points.len() {
            if orthogonal && !axis_aligned(points[current], points[candidate]) {
                continue;
            }
            if grid.line_clear(points[current], points[candidate]) {
                farthest = candidate;
            } else {
                break;
            }
        }
        out.push(points[farthest]);
        current = farthest;
    }
    if out.len() < points.len() {
        debug!("shortcut: {} -> {} points", points.len(), out.len());
    }
    out
}

/// Drops repeated points and points where the path keeps its heading.
pub fn remove_collinear(points: &[Point]) -> Vec<Point> {
    let mut deduped: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if deduped.last().is_some_and(|last| last.approx_eq(p)) {
            continue;
        }
        deduped.push(p);
    }
    if deduped.len() <= 2 {
        return deduped;
    }
    let mut out = vec![deduped[0]];
    for idx in 1..deduped.len() - 1 {
        let prev = out[out.len() - 1];
        let curr = deduped[idx];
        let next = deduped[idx + 1];
        let same_heading = match ((curr - prev).normalized(), (next - curr).normalized()) {
            (Some(a), Some(b)) => a.cross(b).abs() <= 1e-3 && a.dot(b) > 0.0,
            _ => true,
        };
        if !same_heading {
            out.push(curr);
        }
    }
    out.push(deduped[deduped.len() - 1]);
    out
}

/// Replaces a straight segment with a shallow parabolic bulge peaking at the
/// midpoint. Short segments are returned unchanged.
pub fn gentle_curve(a: Point, b: Point) -> Vec<Point> {
    let delta = b - a;
    let len = delta.length();
    let Some(normal) = delta.normalized().map(Point::perp) else {
        return vec![a, b];
    };
    if len < GENTLE_CURVE_MIN_LEN {
        return vec![a, b];
    }
    let bulge = len * GENTLE_CURVE_BULGE;
    let segments = ((len / GENTLE_CURVE_SEGMENT_LEN) as usize).max(MIN_SAMPLES);
    let mut out = Vec::with_capacity(segments + 1);
    out.push(a);
    for i in 1..segments {
        let t = i as f32 / segments as f32;
        out.push(a.lerp(b, t) + normal * (bulge * 4.0 * t * (1.0 - t)));
    }
    out.push(b);
    out
}

fn catmull_rom_point(p0: Point, p1: Point, p2: Point, p3: Point, t: f32) -> Point {
    let t2 = t * t;
    let t3 = t2 * t;
    let axis = |a: f32, b: f32, c: f32, d: f32| {
        0.5 * (2.0 * b
            + (-a + c) * t
            + (2.0 * a - 5.0 * b + 4.0 * c - d) * t2
            + (-a + 3.0 * b - 3.0 * c + d) * t3)
    };
    Point::new(axis(p0.x, p1.x, p2.x, p3.x), axis(p0.y, p1.y, p2.y, p3.y))
}

/// Catmull-Rom spline through `waypoints` with duplicated end controls.
///
/// Each span is sampled according to its length relative to the grid cell,
/// then simplified with Douglas-Peucker at half a cell. A span whose samples
/// touch a blocked cell is replaced by its straight chord. The waypoints
/// themselves are always kept.
pub fn catmull_rom(waypoints: &[Point], grid: &ObstacleGrid) -> Vec<Point> {
    if waypoints.len() <= 2 {
        return waypoints.to_vec();
    }
    let cell = (grid.cell_size() as f32).max(1.0);
    let tolerance = cell * SPLINE_TOLERANCE_CELLS;
    let last = waypoints.len() - 1;
    let mut out = vec![waypoints[0]];
    let mut straightened = 0;
    for i in 0..last {
        let p0 = waypoints[i.saturating_sub(1)];
        let p1 = waypoints[i];
        let p2 = waypoints[i + 1];
        let p3 = waypoints[(i + 2).min(last)];
        let samples_per_span =
            ((p1.distance(p2) / (cell * SPLINE_CELLS_PER_SAMPLE)) as usize).max(MIN_SAMPLES);

        let mut span = Vec::with_capacity(samples_per_span + 1);
        span.push(p1);
        for step in 1..samples_per_span {
            let t = step as f32 / samples_per_span as f32;
            span.push(catmull_rom_point(p0, p1, p2, p3, t));
        }
        span.push(p2);

        let mut curve = douglas_peucker(&span, tolerance);
        if curve.len() <= 2 {
            curve = vec![p1, span[samples_per_span / 2], p2];
        }
        if polyline_clear(&curve, grid) {
            out.extend_from_slice(&curve[1..]);
        } else {
            straightened += 1;
            out.push(p2);
        }
    }
    if straightened > 0 {
        debug!("spline: {straightened} of {last} spans kept straight");
    }
    out
}

/// True when every segment of `points` is in line of sight on `grid`.
pub fn polyline_clear(points: &[Point], grid: &ObstacleGrid) -> bool {
    points
        .windows(2)
        .all(|segment| grid.line_clear(segment[0], segment[1]))
}

/// Recursive Douglas-Peucker simplification; endpoints are always kept.
pub fn douglas_peucker(points: &[Point], tolerance: f32) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let first = points[0];
    let last = points[points.len() - 1];
    let mut max_dist = 0.0;
    let mut split = 0;
    for (idx, &p) in points.iter().enumerate().take(points.len() - 1).skip(1) {
        let dist = perpendicular_distance(p, first, last);
        if dist > max_dist {
            max_dist = dist;
            split = idx;
        }
    }
    if max_dist > tolerance {
        let mut left = douglas_peucker(&points[..=split], tolerance);
        let right = douglas_peucker(&points[split..], tolerance);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

/// Rounds every interior corner with a quadratic arc whose radius is a
/// `smoothness` share of the shorter adjoining segment.
pub fn round_corners(points: &[Point], smoothness: f32) -> Vec<Point> {
    if points.len() <= 2 || smoothness <= 0.0 {
        return points.to_vec();
    }
    let mut out = vec![points[0]];
    for window in points.windows(3) {
        let (prev, curr, next) = (window[0], window[1], window[2]);
        let (Some(v1), Some(v2)) = ((curr - prev).normalized(), (next - curr).normalized()) else {
            out.push(curr);
            continue;
        };
        let radius = prev.distance(curr).min(curr.distance(next)) * smoothness * 0.5;
        let before = curr - v1 * radius;
        let after = curr + v2 * radius;
        out.push(before);
        for step in 1..CORNER_STEPS {
            let t = step as f32 / CORNER_STEPS as f32;
            let u = 1.0 - t;
            out.push(before * (u * u) + curr * (2.0 * u * t) + after * (t * t));
        }
        out.push(after);
    }
    out.push(points[points.len() - 1]);
    out
}
