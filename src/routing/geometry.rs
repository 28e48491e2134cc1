use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::ir::NodeShape;

const EPS: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }

    pub fn cross(self, rhs: Self) -> f32 {
        self.x * rhs.y - self.y * rhs.x
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len < 1e-3 { None } else { Some(self * (1.0 / len)) }
    }

    /// Counter-clockwise perpendicular.
    pub fn perp(self) -> Self {
        Self::new(-self.y, self.x)
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    pub fn approx_eq(self, other: Self) -> bool {
        (self.x - other.x).abs() <= 1e-4 && (self.y - other.y).abs() <= 1e-4
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Self::Output {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Self::Output {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Point {
    type Output = Point;

    fn mul(self, rhs: f32) -> Self::Output {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.right(), self.bottom())
    }

    /// Corners in clockwise order starting at the top-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.right(), self.y),
            Point::new(self.right(), self.bottom()),
            Point::new(self.x, self.bottom()),
        ]
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Mean of width and height.
    pub fn mean_extent(&self) -> f32 {
        (self.width + self.height) / 2.0
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn inflate(&self, pad: f32) -> Self {
        Self::new(
            self.x - pad,
            self.y - pad,
            self.width + pad * 2.0,
            self.height + pad * 2.0,
        )
    }

    pub fn union<'a>(boxes: impl IntoIterator<Item = &'a BoundingBox>) -> Option<Self> {
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for bbox in boxes {
            min_x = min_x.min(bbox.x);
            min_y = min_y.min(bbox.y);
            max_x = max_x.max(bbox.right());
            max_y = max_y.max(bbox.bottom());
        }
        if min_x == f32::MAX {
            return None;
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }
}

pub fn path_length(points: &[Point]) -> f32 {
    points
        .windows(2)
        .map(|segment| segment[0].distance(segment[1]))
        .sum()
}

/// Distance from `point` to the segment `a`-`b` (not the infinite line).
pub fn perpendicular_distance(point: Point, a: Point, b: Point) -> f32 {
    let d = b - a;
    let len_sq = d.dot(d);
    if len_sq <= EPS {
        return point.distance(a);
    }
    let t = ((point - a).dot(d) / len_sq).clamp(0.0, 1.0);
    point.distance(a + d * t)
}

pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    fn orient(a: Point, b: Point, c: Point) -> f32 {
        (b - a).cross(c - a)
    }
    fn on_segment(a: Point, b: Point, c: Point) -> bool {
        c.x >= a.x.min(b.x) - EPS
            && c.x <= a.x.max(b.x) + EPS
            && c.y >= a.y.min(b.y) - EPS
            && c.y <= a.y.max(b.y) + EPS
    }
    let o1 = orient(a, b, c);
    let o2 = orient(a, b, d);
    let o3 = orient(c, d, a);
    let o4 = orient(c, d, b);
    if (o1 > 0.0 && o2 < 0.0 || o1 < 0.0 && o2 > 0.0)
        && (o3 > 0.0 && o4 < 0.0 || o3 < 0.0 && o4 > 0.0)
    {
        return true;
    }
    (o1.abs() <= EPS && on_segment(a, b, c))
        || (o2.abs() <= EPS && on_segment(a, b, d))
        || (o3.abs() <= EPS && on_segment(c, d, a))
        || (o4.abs() <= EPS && on_segment(c, d, b))
}

/// True when segment `a`-`b` touches or enters `rect`.
pub fn segment_intersects_box(a: Point, b: Point, rect: &BoundingBox) -> bool {
    if a.x.max(b.x) < rect.x
        || a.x.min(b.x) > rect.right()
        || a.y.max(b.y) < rect.y
        || a.y.min(b.y) > rect.bottom()
    {
        return false;
    }
    if rect.contains(a) || rect.contains(b) {
        return true;
    }
    let corners = rect.corners();
    (0..4).any(|i| segments_intersect(a, b, corners[i], corners[(i + 1) % 4]))
}

/// True when any segment of the polyline touches or enters `rect`.
pub fn path_intersects_box(points: &[Point], rect: &BoundingBox) -> bool {
    points
        .windows(2)
        .any(|segment| segment_intersects_box(segment[0], segment[1], rect))
}

pub fn ray_ellipse_intersection(
    origin: Point,
    dir: Point,
    center: Point,
    rx: f32,
    ry: f32,
) -> Option<Point> {
    if rx <= EPS || ry <= EPS {
        return None;
    }
    let o = origin - center;
    let a = (dir.x * dir.x) / (rx * rx) + (dir.y * dir.y) / (ry * ry);
    let b = 2.0 * ((o.x * dir.x) / (rx * rx) + (o.y * dir.y) / (ry * ry));
    let c = (o.x * o.x) / (rx * rx) + (o.y * o.y) / (ry * ry) - 1.0;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 || a.abs() < EPS {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t1 = (-b - sqrt_disc) / (2.0 * a);
    let t2 = (-b + sqrt_disc) / (2.0 * a);
    let t = if t1 >= 0.0 {
        t1
    } else if t2 >= 0.0 {
        t2
    } else {
        return None;
    };
    Some(origin + dir * t)
}

/// Point where the ray from the box centre towards `toward` leaves the
/// outline of `shape` drawn inside `bbox`. Returns the centre when the two
/// coincide.
pub fn shape_boundary_point(shape: NodeShape, bbox: &BoundingBox, toward: Point) -> Point {
    let center = bbox.center();
    let Some(dir) = (toward - center).normalized() else {
        return center;
    };
    let half_w = bbox.width / 2.0;
    let half_h = bbox.height / 2.0;
    match shape {
        NodeShape::Circle => center + dir * (half_w.min(half_h)),
        NodeShape::Diamond => {
            let denom = dir.x.abs() / half_w.max(EPS) + dir.y.abs() / half_h.max(EPS);
            let t = if denom > 0.0 { 1.0 / denom } else { 0.0 };
            center + dir * t
        }
        NodeShape::Stadium => stadium_boundary_point(bbox, center, dir)
            .unwrap_or_else(|| rectangle_boundary_point(center, half_w, half_h, dir)),
        _ => rectangle_boundary_point(center, half_w, half_h, dir),
    }
}

fn rectangle_boundary_point(center: Point, half_w: f32, half_h: f32, dir: Point) -> Point {
    let t_x = if dir.x.abs() > EPS {
        half_w / dir.x.abs()
    } else {
        f32::INFINITY
    };
    let t_y = if dir.y.abs() > EPS {
        half_h / dir.y.abs()
    } else {
        f32::INFINITY
    };
    center + dir * t_x.min(t_y)
}

fn stadium_boundary_point(bbox: &BoundingBox, center: Point, dir: Point) -> Option<Point> {
    let half_w = bbox.width / 2.0;
    let half_h = bbox.height / 2.0;
    if bbox.width >= bbox.height {
        let flat_half = half_w - half_h;
        if dir.y.abs() > EPS {
            let t = half_h / dir.y.abs();
            if (dir.x * t).abs() <= flat_half {
                return Some(center + dir * t);
            }
        }
        let cap_x = if dir.x >= 0.0 { flat_half } else { -flat_half };
        ray_ellipse_intersection(center, dir, center + Point::new(cap_x, 0.0), half_h, half_h)
    } else {
        let flat_half = half_h - half_w;
        if dir.x.abs() > EPS {
            let t = half_w / dir.x.abs();
            if (dir.y * t).abs() <= flat_half {
                return Some(center + dir * t);
            }
        }
        let cap_y = if dir.y >= 0.0 { flat_half } else { -flat_half };
        ray_ellipse_intersection(center, dir, center + Point::new(0.0, cap_y), half_w, half_w)
    }
}
