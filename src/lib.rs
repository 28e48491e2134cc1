#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod render;
pub mod route_dump;
pub mod routing;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{ConfigError, EdgeOrder, EdgeRouting, RoutingConfig, RoutingStrategy};
pub use ir::{Diagram, Direction, Edge, EdgeStyle, Node, NodeShape};
pub use route_dump::RouteDump;
pub use routing::{
    BoundingBox, EdgeReport, Point, RouteOutcome, RoutingError, RoutingReport, route_diagram,
};

/// Parses a JSON diagram and options document, routes every edge and
/// returns the route dump as JSON.
pub fn route_diagram_json(
    diagram_json: &str,
    options_json: Option<&str>,
) -> anyhow::Result<String> {
    let config = match options_json {
        Some(raw) => config::parse_config(raw)?,
        None => RoutingConfig::default(),
    };
    let mut diagram = Diagram::from_json(diagram_json)?;
    let report = route_diagram(&mut diagram, &config)?;
    let dump = RouteDump::from_routing(&diagram, &report);
    Ok(serde_json::to_string(&dump)?)
}
