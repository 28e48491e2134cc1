use crate::ir::{Diagram, Direction, EdgeStyle};
use crate::routing::{RouteOutcome, RoutingReport};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct RouteDump {
    pub direction: Direction,
    pub grid: GridDump,
    pub degraded: usize,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
pub struct GridDump {
    pub margin: f32,
    pub cell_size: usize,
    pub cols: i32,
    pub rows: i32,
    pub blocked: usize,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub from: String,
    pub to: String,
    pub style: EdgeStyle,
    pub label: Option<String>,
    pub outcome: RouteOutcome,
    pub points: Vec<[f32; 2]>,
}

impl RouteDump {
    pub fn from_routing(diagram: &Diagram, report: &RoutingReport) -> Self {
        let edges = diagram
            .edges
            .iter()
            .zip(&report.edges)
            .map(|(edge, routed)| EdgeDump {
                from: edge.from.clone(),
                to: edge.to.clone(),
                style: edge.style,
                label: edge.label.clone(),
                outcome: routed.outcome,
                points: edge.points.iter().map(|p| [p.x, p.y]).collect(),
            })
            .collect();

        RouteDump {
            direction: diagram.direction,
            grid: GridDump {
                margin: report.params.margin,
                cell_size: report.params.cell_size,
                cols: report.grid.cols(),
                rows: report.grid.rows(),
                blocked: report.grid.blocked_count(),
            },
            degraded: report.degraded(),
            edges,
        }
    }
}

/// Writes the dump as pretty JSON to `path`, or to stdout when `path` is `None`.
pub fn write_route_dump(
    path: Option<&Path>,
    diagram: &Diagram,
    report: &RoutingReport,
) -> anyhow::Result<()> {
    let dump = RouteDump::from_routing(diagram, report);
    match path {
        Some(path) => {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
