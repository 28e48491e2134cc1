use crate::ir::Diagram;
use crate::routing::{ObstacleGrid, Point};
use anyhow::Result;
use std::path::Path;

const BACKGROUND: &str = "#ffffff";
const WALKABLE_FILL: &str = "#f7f9fc";
const GRID_LINE: &str = "#e3e8ef";
const OBSTACLE_FILL: &str = "#f2b8b5";
const NODE_FILL: &str = "#dbe7fb";
const NODE_STROKE: &str = "#3b5b92";
const TEXT_FILL: &str = "#1f2937";
const FONT_FAMILY: &str = "Inter, Helvetica, Arial, sans-serif";
const PATH_PALETTE: [&str; 6] = [
    "#e4572e", "#17bebb", "#76b041", "#7b2cbf", "#ffc914", "#2e86ab",
];
/// Room above the grid for the info line and legend.
const HEADER_HEIGHT: f32 = 44.0;

/// Debug picture of the obstacle grid: blocked cells, node boxes snapped to
/// the cells they occupy, and every routed edge in a rotating palette.
pub fn render_grid_svg(grid: &ObstacleGrid, diagram: &Diagram) -> String {
    let cell = grid.cell_size() as f32;
    let origin = grid.origin();
    let width = grid.cols() as f32 * cell;
    let height = grid.rows() as f32 * cell;
    let top = origin.y - HEADER_HEIGHT;
    let total_height = height + HEADER_HEIGHT;

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" height=\"{total_height:.0}\" viewBox=\"{:.2} {top:.2} {width:.2} {total_height:.2}\">",
        origin.x
    ));
    svg.push_str(&format!(
        "<rect x=\"{:.2}\" y=\"{top:.2}\" width=\"{width:.2}\" height=\"{total_height:.2}\" fill=\"{BACKGROUND}\"/>",
        origin.x
    ));
    svg.push_str(&format!(
        "<defs><pattern id=\"cells\" x=\"{:.2}\" y=\"{:.2}\" width=\"{cell}\" height=\"{cell}\" patternUnits=\"userSpaceOnUse\"><rect width=\"{cell}\" height=\"{cell}\" fill=\"{WALKABLE_FILL}\" stroke=\"{GRID_LINE}\" stroke-width=\"0.5\"/></pattern></defs>",
        origin.x, origin.y
    ));
    svg.push_str(&format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{width:.2}\" height=\"{height:.2}\" fill=\"url(#cells)\"/>",
        origin.x, origin.y
    ));

    for iy in 0..grid.rows() {
        for ix in 0..grid.cols() {
            if grid.is_blocked((ix, iy)) {
                svg.push_str(&format!(
                    "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{cell}\" height=\"{cell}\" fill=\"{OBSTACLE_FILL}\"/>",
                    origin.x + ix as f32 * cell,
                    origin.y + iy as f32 * cell
                ));
            }
        }
    }

    for node in diagram.nodes.values() {
        let Some(bbox) = node.bbox else {
            continue;
        };
        let ((x0, y0), (x1, y1)) = grid.box_cells(&bbox);
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{NODE_FILL}\" fill-opacity=\"0.85\" stroke=\"{NODE_STROKE}\" stroke-width=\"1.5\"/>",
            origin.x + x0 as f32 * cell,
            origin.y + y0 as f32 * cell,
            (x1 - x0 + 1) as f32 * cell,
            (y1 - y0 + 1) as f32 * cell
        ));
        let center = bbox.center();
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" dominant-baseline=\"middle\" font-family=\"{FONT_FAMILY}\" font-size=\"12\" fill=\"{TEXT_FILL}\">{}</text>",
            center.x,
            center.y,
            escape_xml(&node.label)
        ));
    }

    let mut routed = 0usize;
    for edge in diagram.edges.iter().filter(|edge| edge.points.len() >= 2) {
        let color = PATH_PALETTE[routed % PATH_PALETTE.len()];
        routed += 1;
        svg.push_str(&format!(
            "<polyline points=\"{}\" fill=\"none\" stroke=\"{color}\" stroke-width=\"2\" stroke-linejoin=\"round\"/>",
            polyline_points(&edge.points)
        ));
        if let (Some(start), Some(end)) = (edge.points.first(), edge.points.last()) {
            for point in [start, end] {
                svg.push_str(&format!(
                    "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"3\" fill=\"{color}\"/>",
                    point.x, point.y
                ));
            }
        }
    }

    let info = format!(
        "grid {}x{} | cell {}px | margin {:.1}px | {} nodes | {} routed edges",
        grid.cols(),
        grid.rows(),
        grid.cell_size(),
        grid.margin(),
        diagram.nodes.len(),
        routed
    );
    svg.push_str(&format!(
        "<text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{FONT_FAMILY}\" font-size=\"12\" fill=\"{TEXT_FILL}\">{}</text>",
        origin.x + 8.0,
        top + 16.0,
        escape_xml(&info)
    ));
    push_legend(&mut svg, origin.x + 8.0, top + 26.0);

    svg.push_str("</svg>");
    svg
}

fn push_legend(svg: &mut String, x: f32, y: f32) {
    let entries = [
        ("walkable", WALKABLE_FILL),
        ("obstacle", OBSTACLE_FILL),
        ("node", NODE_FILL),
    ];
    for (idx, (label, fill)) in entries.iter().enumerate() {
        let ex = x + idx as f32 * 90.0;
        svg.push_str(&format!(
            "<rect x=\"{ex:.2}\" y=\"{y:.2}\" width=\"12\" height=\"12\" fill=\"{fill}\" stroke=\"{GRID_LINE}\"/><text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{FONT_FAMILY}\" font-size=\"11\" fill=\"{TEXT_FILL}\">{label}</text>",
            ex + 16.0,
            y + 10.0
        ));
    }
}

fn polyline_points(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{:.2},{:.2}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Inter".to_string();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path) -> Result<()> {
    Err(anyhow::anyhow!(
        "PNG output requires the 'png' feature"
    ))
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EdgeRouting, RoutingConfig};
    use crate::ir::{Direction, NodeShape};
    use crate::routing::{BoundingBox, route_diagram};

    #[test]
    fn grid_svg_shows_cells_nodes_and_paths() {
        let mut diagram = Diagram::new(Direction::TopDown);
        diagram.add_node("A", NodeShape::Rectangle, BoundingBox::new(0.0, 0.0, 100.0, 60.0));
        diagram.add_node("B<1>", NodeShape::Rectangle, BoundingBox::new(300.0, 0.0, 100.0, 60.0));
        diagram.add_node("C", NodeShape::Rectangle, BoundingBox::new(150.0, 150.0, 100.0, 60.0));
        diagram.add_edge("A", "C");
        diagram.add_edge("B<1>", "C");
        let config = RoutingConfig {
            edge_routing: EdgeRouting::Orthogonal,
            ..Default::default()
        };
        let report = route_diagram(&mut diagram, &config).unwrap();
        let svg = render_grid_svg(&report.grid, &diagram);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(OBSTACLE_FILL));
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert!(svg.contains("B&lt;1&gt;"));
        assert!(svg.contains("3 nodes | 2 routed edges"));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("a<b & 'c'"), "a&lt;b &amp; &apos;c&apos;");
    }
}
