use crate::config::{EdgeOrder, EdgeRouting, RoutingConfig, RoutingStrategy, load_config};
use crate::ir::Diagram;
use crate::render::{render_grid_svg, write_output_png, write_output_svg};
use crate::route_dump::write_route_dump;
use crate::routing::route_diagram;
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "skroute",
    version,
    about = "Obstacle-aware edge routing for laid-out diagrams"
)]
pub struct Args {
    /// Input diagram (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the routed edges (JSON). Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Routing config file (JSON or JSON5, camelCase keys)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Edge style: curved, orthogonal or straight
    #[arg(long = "edge-routing")]
    pub edge_routing: Option<EdgeRouting>,

    /// Routing strategy: adaptive, fixed_grid or heuristic
    #[arg(long = "strategy")]
    pub strategy: Option<RoutingStrategy>,

    /// Edge order: input or shortest_first
    #[arg(long = "edge-order")]
    pub edge_order: Option<EdgeOrder>,

    /// Retry failed searches on a grid with half-size cells
    #[arg(long = "retry-smaller-cells")]
    pub retry_smaller_cells: bool,

    /// Cell size for the fixed-grid strategy
    #[arg(long = "cell-size")]
    pub cell_size: Option<usize>,

    /// Write a debug picture of the obstacle grid (svg or png)
    #[arg(long = "grid-debug")]
    pub grid_debug: Option<PathBuf>,

    /// Log filter (error, warn, info, debug, trace). RUST_LOG wins when set.
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let mut config = load_config(args.config.as_deref())
        .with_context(|| "failed to load routing config")?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let input = read_input(args.input.as_deref())?;
    let mut diagram = Diagram::from_json(&input).context("failed to parse diagram JSON")?;
    let report = route_diagram(&mut diagram, &config)?;
    info!(
        "routed {} edges ({} degraded)",
        report.edges.len(),
        report.degraded()
    );

    if let Some(path) = args.grid_debug.as_deref() {
        let svg = render_grid_svg(&report.grid, &diagram);
        if is_png(path) {
            write_output_png(&svg, path)?;
        } else {
            write_output_svg(&svg, Some(path))?;
        }
    }
    write_route_dump(args.output.as_deref(), &diagram, &report)
}

fn apply_overrides(config: &mut RoutingConfig, args: &Args) {
    if let Some(edge_routing) = args.edge_routing {
        config.edge_routing = edge_routing;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(edge_order) = args.edge_order {
        config.edge_order = edge_order;
    }
    if args.retry_smaller_cells {
        config.retry_smaller_cells = true;
    }
    if let Some(cell_size) = args.cell_size {
        config.cell_size = cell_size;
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = Args::try_parse_from([
            "skroute",
            "-i",
            "diagram.json",
            "--edge-routing",
            "orthogonal",
            "--strategy",
            "fixed-grid",
            "--edge-order",
            "shortest-first",
            "--retry-smaller-cells",
            "--cell-size",
            "6",
        ])
        .unwrap();
        let mut config = RoutingConfig::default();
        apply_overrides(&mut config, &args);
        assert_eq!(config.edge_routing, EdgeRouting::Orthogonal);
        assert_eq!(config.strategy, RoutingStrategy::FixedGrid);
        assert_eq!(config.edge_order, EdgeOrder::ShortestFirst);
        assert!(config.retry_smaller_cells);
        assert_eq!(config.cell_size, 6);
        assert_eq!(args.log_level, "warn");
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = Args::try_parse_from(["skroute", "--edge-routing", "wavy"]).unwrap_err();
        assert!(err.to_string().contains("wavy"));
    }

    #[test]
    fn png_detection_ignores_case() {
        assert!(is_png(Path::new("grid.PNG")));
        assert!(!is_png(Path::new("grid.svg")));
        assert!(!is_png(Path::new("grid")));
    }
}
