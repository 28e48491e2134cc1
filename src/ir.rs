use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::routing::geometry::{BoundingBox, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TD")]
    TopDown,
    #[serde(rename = "TB")]
    TopBottom,
    #[serde(rename = "BT")]
    BottomTop,
    #[serde(rename = "LR")]
    LeftRight,
    #[serde(rename = "RL")]
    RightLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeShape {
    #[default]
    Rectangle,
    RoundRect,
    Stadium,
    Subroutine,
    Cylinder,
    Circle,
    Diamond,
    Hexagon,
    Parallelogram,
    ParallelogramAlt,
    Trapezoid,
    TrapezoidAlt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStyle {
    #[default]
    SolidArrow,
    DottedArrow,
    ThickArrow,
    SolidLine,
    DottedLine,
    ThickLine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub shape: NodeShape,
    /// Set by the upstream layout step; nodes without a box are not routed.
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub style: EdgeStyle,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub points: Vec<Point>,
}

impl Edge {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            style: EdgeStyle::default(),
            label: None,
            points: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagram {
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub nodes: BTreeMap<String, Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Diagram {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            nodes: BTreeMap::new(),
            edges: Vec::new(),
        }
    }

    /// Parses a diagram from JSON, filling node ids and labels from the map keys.
    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        let mut diagram: Diagram = serde_json::from_str(input)?;
        for (key, node) in diagram.nodes.iter_mut() {
            if node.id.is_empty() {
                node.id = key.clone();
            }
            if node.label.is_empty() {
                node.label = node.id.clone();
            }
        }
        Ok(diagram)
    }

    pub fn add_node(&mut self, id: &str, shape: NodeShape, bbox: BoundingBox) {
        self.nodes.insert(
            id.to_string(),
            Node {
                id: id.to_string(),
                label: id.to_string(),
                shape,
                bbox: Some(bbox),
            },
        );
    }

    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges.push(Edge::new(from, to));
    }

    pub fn node_bbox(&self, id: &str) -> Option<BoundingBox> {
        self.nodes.get(id).and_then(|node| node.bbox)
    }

    pub fn boxes(&self) -> impl Iterator<Item = &BoundingBox> {
        self.nodes.values().filter_map(|node| node.bbox.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_tokens() {
        let parse = |token: &str| serde_json::from_str::<Direction>(&format!("\"{token}\""));
        assert_eq!(parse("TB").unwrap(), Direction::TopBottom);
        assert_eq!(parse("RL").unwrap(), Direction::RightLeft);
        assert!(parse("XY").is_err());
    }

    #[test]
    fn diagram_from_json_fills_ids() {
        let input = r#"{
            "direction": "LR",
            "nodes": {
                "A": { "bbox": { "x": 0, "y": 0, "width": 100, "height": 60 } },
                "B": { "shape": "circle", "label": "Bee" }
            },
            "edges": [ { "from": "A", "to": "B", "style": "dotted_line" } ]
        }"#;
        let diagram = Diagram::from_json(input).unwrap();
        assert_eq!(diagram.direction, Direction::LeftRight);
        assert_eq!(diagram.nodes["A"].id, "A");
        assert_eq!(diagram.nodes["A"].label, "A");
        assert_eq!(diagram.nodes["B"].label, "Bee");
        assert_eq!(diagram.nodes["B"].shape, NodeShape::Circle);
        assert!(diagram.node_bbox("B").is_none());
        assert_eq!(diagram.boxes().count(), 1);
        assert_eq!(diagram.edges[0].style, EdgeStyle::DottedLine);
        assert!(diagram.edges[0].points.is_empty());
    }
}
