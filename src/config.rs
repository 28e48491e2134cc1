use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f32 },
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("unknown {field} '{value}'")]
    UnknownMode { field: &'static str, value: String },
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        value: usize,
        min: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeRouting {
    #[default]
    Curved,
    Orthogonal,
    Straight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    #[default]
    Adaptive,
    FixedGrid,
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeOrder {
    #[default]
    Input,
    ShortestFirst,
}

impl FromStr for EdgeRouting {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "curved" => Ok(Self::Curved),
            "orthogonal" => Ok(Self::Orthogonal),
            "straight" => Ok(Self::Straight),
            _ => Err(ConfigError::UnknownMode {
                field: "edge_routing",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for EdgeRouting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Curved => "curved",
            Self::Orthogonal => "orthogonal",
            Self::Straight => "straight",
        })
    }
}

impl FromStr for RoutingStrategy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "adaptive" | "astar" => Ok(Self::Adaptive),
            "fixed_grid" | "fixed-grid" => Ok(Self::FixedGrid),
            "heuristic" => Ok(Self::Heuristic),
            _ => Err(ConfigError::UnknownMode {
                field: "strategy",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Adaptive => "adaptive",
            Self::FixedGrid => "fixed_grid",
            Self::Heuristic => "heuristic",
        })
    }
}

impl FromStr for EdgeOrder {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "shortest_first" | "shortest-first" => Ok(Self::ShortestFirst),
            "input" => Ok(Self::Input),
            _ => Err(ConfigError::UnknownMode {
                field: "edge_order",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for EdgeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ShortestFirst => "shortest_first",
            Self::Input => "input",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub edge_routing: EdgeRouting,
    pub strategy: RoutingStrategy,
    pub avoid_obstacles: bool,
    pub edge_order: EdgeOrder,
    /// Rebuild the grid at half resolution when every search candidate fails.
    pub retry_smaller_cells: bool,
    /// Box inflation used by the fixed-grid and heuristic strategies.
    pub route_margin: f32,
    /// Detour distance used by the heuristic strategy.
    pub route_offset: f32,
    /// Corner rounding for the fixed-grid and heuristic strategies, 0..=1.
    pub smoothness: f32,
    /// Cell size for the fixed-grid strategy.
    pub cell_size: usize,
    /// Extra search cost per bend, in cells.
    pub turn_penalty: f32,
    pub max_grid_cells: usize,
    pub max_search_steps: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            edge_routing: EdgeRouting::Curved,
            strategy: RoutingStrategy::Adaptive,
            avoid_obstacles: true,
            edge_order: EdgeOrder::Input,
            retry_smaller_cells: false,
            route_margin: 15.0,
            route_offset: 60.0,
            smoothness: 0.6,
            cell_size: 10,
            turn_penalty: 0.5,
            max_grid_cells: 250_000,
            max_search_steps: 200_000,
        }
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("route_margin", self.route_margin)?;
        non_negative("route_offset", self.route_offset)?;
        non_negative("turn_penalty", self.turn_penalty)?;
        if !(0.0..=1.0).contains(&self.smoothness) {
            return Err(ConfigError::OutOfRange {
                field: "smoothness",
                value: self.smoothness,
                min: 0.0,
                max: 1.0,
            });
        }
        at_least("cell_size", self.cell_size, 1)?;
        at_least("max_grid_cells", self.max_grid_cells, 100)?;
        at_least("max_search_steps", self.max_search_steps, 1)?;
        Ok(())
    }

    pub fn is_orthogonal(&self) -> bool {
        self.edge_routing == EdgeRouting::Orthogonal
    }

    /// Straight routing skips the grid entirely.
    pub fn routes_straight(&self) -> bool {
        self.edge_routing == EdgeRouting::Straight || !self.avoid_obstacles
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value < 0.0 || value.is_nan() {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

fn at_least(field: &'static str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::TooSmall { field, value, min });
    }
    Ok(())
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RoutingConfigFile {
    edge_routing: Option<String>,
    strategy: Option<String>,
    avoid_obstacles: Option<bool>,
    edge_order: Option<String>,
    retry_smaller_cells: Option<bool>,
    route_margin: Option<f32>,
    route_offset: Option<f32>,
    smoothness: Option<f32>,
    cell_size: Option<usize>,
    turn_penalty: Option<f32>,
    max_grid_cells: Option<usize>,
    max_search_steps: Option<usize>,
}

impl RoutingConfigFile {
    fn apply(self, config: &mut RoutingConfig) -> Result<(), ConfigError> {
        if let Some(v) = self.edge_routing {
            config.edge_routing = v.parse()?;
        }
        if let Some(v) = self.strategy {
            config.strategy = v.parse()?;
        }
        if let Some(v) = self.avoid_obstacles {
            config.avoid_obstacles = v;
        }
        if let Some(v) = self.edge_order {
            config.edge_order = v.parse()?;
        }
        if let Some(v) = self.retry_smaller_cells {
            config.retry_smaller_cells = v;
        }
        if let Some(v) = self.route_margin {
            config.route_margin = v;
        }
        if let Some(v) = self.route_offset {
            config.route_offset = v;
        }
        if let Some(v) = self.smoothness {
            config.smoothness = v;
        }
        if let Some(v) = self.cell_size {
            config.cell_size = v;
        }
        if let Some(v) = self.turn_penalty {
            config.turn_penalty = v;
        }
        if let Some(v) = self.max_grid_cells {
            config.max_grid_cells = v;
        }
        if let Some(v) = self.max_search_steps {
            config.max_search_steps = v;
        }
        Ok(())
    }
}

/// Parses a routing config document (JSON or JSON5, camelCase keys) over the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<RoutingConfig> {
    let parsed: RoutingConfigFile = match serde_json::from_str(contents) {
        Ok(parsed) => parsed,
        Err(_) => json5::from_str(contents)?,
    };
    let mut config = RoutingConfig::default();
    parsed.apply(&mut config)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<RoutingConfig> {
    let Some(path) = path else {
        return Ok(RoutingConfig::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RoutingConfig::default();
        assert_eq!(config.edge_routing, EdgeRouting::Curved);
        assert_eq!(config.strategy, RoutingStrategy::Adaptive);
        assert!(config.avoid_obstacles);
        assert_eq!(config.edge_order, EdgeOrder::Input);
        assert_eq!(config.route_margin, 15.0);
        assert_eq!(config.route_offset, 60.0);
        assert_eq!(config.smoothness, 0.6);
        assert_eq!(config.cell_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn negative_margin_is_rejected() {
        let config = RoutingConfig {
            route_margin: -5.0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Negative {
                field: "route_margin",
                value: -5.0
            })
        );
    }

    #[test]
    fn smoothness_out_of_range_is_rejected() {
        let config = RoutingConfig {
            smoothness: 1.5,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("smoothness"));
    }

    #[test]
    fn zero_cell_size_is_rejected() {
        let config = RoutingConfig {
            cell_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooSmall {
                field: "cell_size",
                ..
            })
        ));
    }

    #[test]
    fn mode_tokens_round_trip() {
        for mode in [
            EdgeRouting::Curved,
            EdgeRouting::Orthogonal,
            EdgeRouting::Straight,
        ] {
            assert_eq!(mode.to_string().parse::<EdgeRouting>(), Ok(mode));
        }
        assert_eq!("astar".parse::<RoutingStrategy>(), Ok(RoutingStrategy::Adaptive));
        assert_eq!("input".parse::<EdgeOrder>(), Ok(EdgeOrder::Input));
        assert!(matches!(
            "zigzag".parse::<EdgeRouting>(),
            Err(ConfigError::UnknownMode { .. })
        ));
    }

    #[test]
    fn parse_config_overlays_defaults() {
        let config = parse_config(
            r#"{
                // json5 comments are accepted
                edgeRouting: "orthogonal",
                edgeOrder: "shortest_first",
                retrySmallerCells: true,
                turnPenalty: 1.0,
            }"#,
        )
        .unwrap();
        assert_eq!(config.edge_routing, EdgeRouting::Orthogonal);
        assert_eq!(config.edge_order, EdgeOrder::ShortestFirst);
        assert!(config.retry_smaller_cells);
        assert_eq!(config.turn_penalty, 1.0);
        assert_eq!(config.route_offset, 60.0);
    }

    #[test]
    fn parse_config_rejects_unknown_mode() {
        let err = parse_config(r#"{"strategy": "teleport"}"#).unwrap_err();
        assert!(err.to_string().contains("teleport"));
    }

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.max_grid_cells, 250_000);
    }
}
