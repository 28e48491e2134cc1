use crate::ir::Direction;

use super::geometry::{BoundingBox, Point};
use super::grid::GridParams;

/// Gaps shorter than this get a single-cell push.
const SMALL_GAP: f32 = 30.0;
const PUSH_MARGIN_EXTRA: f32 = 5.0;
const PUSH_GAP_RATIO: f32 = 0.4;
/// Distance multiplier for side pairs running against the flow direction.
const AGAINST_FLOW_PENALTY: f32 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Bottom, Side::Left, Side::Right];

    pub fn midpoint(self, bbox: &BoundingBox) -> Point {
        let center = bbox.center();
        match self {
            Side::Top => Point::new(center.x, bbox.y),
            Side::Bottom => Point::new(center.x, bbox.bottom()),
            Side::Left => Point::new(bbox.x, center.y),
            Side::Right => Point::new(bbox.right(), center.y),
        }
    }

    /// Side of `from` crossed by the line between the two box centres.
    pub fn facing(from: &BoundingBox, to: &BoundingBox) -> Side {
        let delta = to.center() - from.center();
        if delta.x.abs() > delta.y.abs() {
            if delta.x > 0.0 { Side::Right } else { Side::Left }
        } else if delta.y > 0.0 {
            Side::Bottom
        } else {
            Side::Top
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::Top => "top",
            Side::Bottom => "bottom",
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// (source side, target side)
pub type SidePair = (Side, Side);

/// Corner-biased pairs tried by the grid search after the default pair.
pub const SEARCH_SIDE_PAIRS: [SidePair; 4] = [
    (Side::Right, Side::Bottom),
    (Side::Right, Side::Top),
    (Side::Left, Side::Bottom),
    (Side::Left, Side::Top),
];

pub fn default_pair(source: &BoundingBox, target: &BoundingBox) -> SidePair {
    (Side::facing(source, target), Side::facing(target, source))
}

fn preferred_pairs(direction: Direction) -> [SidePair; 2] {
    match direction {
        Direction::LeftRight => [(Side::Right, Side::Left), (Side::Bottom, Side::Top)],
        Direction::RightLeft => [(Side::Left, Side::Right), (Side::Bottom, Side::Top)],
        Direction::TopDown | Direction::TopBottom => {
            [(Side::Bottom, Side::Top), (Side::Right, Side::Left)]
        }
        Direction::BottomTop => [(Side::Top, Side::Bottom), (Side::Right, Side::Left)],
    }
}

/// Every side combination ordered by midpoint distance, with pairs running
/// against `direction` penalised, prefixed by the default pair.
pub fn ranked_pairs(
    source: &BoundingBox,
    target: &BoundingBox,
    direction: Direction,
) -> Vec<SidePair> {
    let preferred = preferred_pairs(direction);
    let mut scored: Vec<(f32, SidePair)> = Vec::with_capacity(16);
    for source_side in Side::ALL {
        for target_side in Side::ALL {
            let pair = (source_side, target_side);
            let mut distance = source_side
                .midpoint(source)
                .distance(target_side.midpoint(target));
            if !preferred.contains(&pair) {
                distance *= AGAINST_FLOW_PENALTY;
            }
            scored.push((distance, pair));
        }
    }
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut pairs = Vec::with_capacity(scored.len() + 1);
    pairs.push(default_pair(source, target));
    pairs.extend(scored.into_iter().map(|(_, pair)| pair));
    pairs
}

/// How far attachment points are pushed off their boxes for a given gap.
pub fn push_distance(gap: f32, params: GridParams) -> f32 {
    if gap < SMALL_GAP {
        params.cell_size as f32
    } else {
        (params.margin + PUSH_MARGIN_EXTRA).min(gap * PUSH_GAP_RATIO)
    }
}

/// Moves `point` away from the centre of `bbox`. A point sitting on the
/// centre has no outward direction and is returned unchanged.
pub fn push_outward(point: Point, bbox: &BoundingBox, distance: f32) -> Point {
    match (point - bbox.center()).normalized() {
        Some(dir) => point + dir * distance,
        None => point,
    }
}

/// Boundary points for one side pair plus their pushed-out search endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attachment {
    pub sides: SidePair,
    pub start: Point,
    pub end: Point,
    pub start_pushed: Point,
    pub end_pushed: Point,
}

impl Attachment {
    pub fn new(
        source: &BoundingBox,
        target: &BoundingBox,
        sides: SidePair,
        params: GridParams,
    ) -> Self {
        let start = sides.0.midpoint(source);
        let end = sides.1.midpoint(target);
        let push = push_distance(start.distance(end), params);
        Self {
            sides,
            start,
            end,
            start_pushed: push_outward(start, source, push),
            end_pushed: push_outward(end, target, push),
        }
    }

    /// Base points joined by the pushed points, with collinear interior points dropped.
    pub fn direct_route(&self) -> Vec<Point> {
        let mut points = vec![self.start];
        for p in [self.start_pushed, self.end_pushed, self.end] {
            if points.last().is_some_and(|last| last.approx_eq(p)) {
                continue;
            }
            points.push(p);
        }
        super::smoothing::remove_collinear(&points)
    }

    pub fn label(&self) -> String {
        format!("{} -> {}", self.sides.0.name(), self.sides.1.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const PARAMS: GridParams = GridParams {
        margin: 7.0,
        cell_size: 7,
    };

    #[test]
    fn midpoints_sit_on_each_side() {
        let bbox = BoundingBox::new(10.0, 20.0, 100.0, 60.0);
        assert_eq!(Side::Top.midpoint(&bbox), Point::new(60.0, 20.0));
        assert_eq!(Side::Bottom.midpoint(&bbox), Point::new(60.0, 80.0));
        assert_eq!(Side::Left.midpoint(&bbox), Point::new(10.0, 50.0));
        assert_eq!(Side::Right.midpoint(&bbox), Point::new(110.0, 50.0));
    }

    #[test]
    fn default_pair_faces_the_other_box() {
        let a = BoundingBox::new(0.0, 0.0, 100.0, 60.0);
        let b = BoundingBox::new(300.0, 0.0, 100.0, 60.0);
        let c = BoundingBox::new(150.0, 150.0, 100.0, 60.0);
        assert_eq!(default_pair(&a, &b), (Side::Right, Side::Left));
        assert_eq!(default_pair(&a, &c), (Side::Bottom, Side::Top));
        assert_eq!(default_pair(&b, &c), (Side::Bottom, Side::Top));
    }

    #[rstest]
    #[case(Direction::TopDown, (0.0, 200.0), (Side::Bottom, Side::Top))]
    #[case(Direction::TopBottom, (0.0, 200.0), (Side::Bottom, Side::Top))]
    #[case(Direction::BottomTop, (0.0, -200.0), (Side::Top, Side::Bottom))]
    #[case(Direction::LeftRight, (300.0, 0.0), (Side::Right, Side::Left))]
    #[case(Direction::RightLeft, (-300.0, 0.0), (Side::Left, Side::Right))]
    fn flow_direction_ranks_its_preferred_pair_first(
        #[case] direction: Direction,
        #[case] offset: (f32, f32),
        #[case] expected: SidePair,
    ) {
        let source = BoundingBox::new(0.0, 0.0, 100.0, 60.0);
        let target = BoundingBox::new(offset.0, offset.1, 100.0, 60.0);
        let ranked = ranked_pairs(&source, &target, direction);
        assert_eq!(ranked.len(), 17);
        assert_eq!(ranked[0], default_pair(&source, &target));
        assert_eq!(ranked[1], expected);
    }

    #[test]
    fn penalty_reorders_close_candidates() {
        let source = BoundingBox::new(0.0, 0.0, 100.0, 60.0);
        let target = BoundingBox::new(110.0, 100.0, 100.0, 60.0);
        let raw = |pair: SidePair| pair.0.midpoint(&source).distance(pair.1.midpoint(&target));
        assert!(raw((Side::Right, Side::Top)) < raw((Side::Right, Side::Left)));

        let ranked = ranked_pairs(&source, &target, Direction::TopDown);
        assert_eq!(ranked[1], (Side::Right, Side::Left));
        let ranked = ranked_pairs(&source, &target, Direction::RightLeft);
        assert_eq!(ranked[1], (Side::Bottom, Side::Left));
    }

    #[test]
    fn push_distance_depends_on_gap() {
        assert_eq!(push_distance(20.0, PARAMS), 7.0);
        assert_eq!(push_distance(200.0, PARAMS), 12.0);
        assert!((push_distance(40.0, PARAMS) - 12.0).abs() < 1e-6);
        assert!((push_distance(30.0, PARAMS) - 12.0).abs() < 1e-6);
        let wide = GridParams {
            margin: 15.0,
            cell_size: 15,
        };
        assert!((push_distance(35.0, wide) - 14.0).abs() < 1e-4);
    }

    #[test]
    fn push_moves_away_from_centre() {
        let bbox = BoundingBox::new(0.0, 0.0, 100.0, 60.0);
        let pushed = push_outward(Point::new(100.0, 30.0), &bbox, 10.0);
        assert!(pushed.approx_eq(Point::new(110.0, 30.0)));
        let pushed = push_outward(Point::new(50.0, 0.0), &bbox, 10.0);
        assert!(pushed.approx_eq(Point::new(50.0, -10.0)));
        let center = push_outward(bbox.center(), &bbox, 10.0);
        assert_eq!(center, bbox.center());
    }

    #[test]
    fn aligned_attachment_collapses_to_two_points() {
        let a = BoundingBox::new(0.0, 0.0, 100.0, 60.0);
        let b = BoundingBox::new(300.0, 0.0, 100.0, 60.0);
        let attachment = Attachment::new(&a, &b, (Side::Right, Side::Left), PARAMS);
        assert_eq!(attachment.start, Point::new(100.0, 30.0));
        assert_eq!(attachment.end, Point::new(300.0, 30.0));
        assert!(attachment.start_pushed.approx_eq(Point::new(112.0, 30.0)));
        assert_eq!(
            attachment.direct_route(),
            vec![Point::new(100.0, 30.0), Point::new(300.0, 30.0)]
        );
    }

    #[test]
    fn offset_attachment_keeps_pushed_points() {
        let a = BoundingBox::new(0.0, 0.0, 100.0, 60.0);
        let c = BoundingBox::new(150.0, 150.0, 100.0, 60.0);
        let attachment = Attachment::new(&a, &c, (Side::Bottom, Side::Top), PARAMS);
        let route = attachment.direct_route();
        assert_eq!(route.len(), 4);
        assert_eq!(route[0], Point::new(50.0, 60.0));
        assert_eq!(route[3], Point::new(200.0, 150.0));
    }
}
