//! Orthographic line drawing of a solid's edges, split into a visible and a
//! hidden layer by depth-testing edge samples against the tessellated solid.

use std::fmt::Write as _;
use std::path::Path;

use bearing_kernel::{EdgeRenderData, RenderMesh};

use crate::errors::ExportError;
use crate::{check_mesh, triangle, write_output, xml_escape};

/// Edge samples per drawing extent.
const SAMPLES_PER_EXTENT: f64 = 200.0;
/// Upper bound on depth-test samples for a single polyline segment.
const MAX_SEGMENT_PIECES: usize = 10_000;
/// Upper bound on the occlusion grid resolution per axis.
const MAX_GRID_CELLS: usize = 256;

/// Stroke style of one drawing layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    pub stroke: String,
    pub stroke_width: f64,
    pub dasharray: Option<String>,
}

impl LineStyle {
    pub fn solid(stroke: impl Into<String>, stroke_width: f64) -> Self {
        Self {
            stroke: stroke.into(),
            stroke_width,
            dasharray: None,
        }
    }

    /// Round-capped dots spaced three stroke widths apart.
    pub fn dotted(stroke: impl Into<String>, stroke_width: f64) -> Self {
        Self {
            stroke: stroke.into(),
            stroke_width,
            dasharray: Some(format!("0 {}", fmt_num(stroke_width * 3.0))),
        }
    }
}

/// Camera and styling for `render_svg`.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgOptions {
    /// Camera position.
    pub viewport_origin: [f64; 3],
    /// Approximate up direction; made orthogonal to the view direction.
    pub viewport_up: [f64; 3],
    /// Point the camera looks at. Defaults to the mesh's bounding-box center.
    pub look_at: Option<[f64; 3]>,
    /// Drawing units the larger side of the projected drawing is scaled to.
    pub target_size: f64,
    /// An edge sample is hidden when a triangle lies more than this far in front of it.
    pub depth_tolerance: f64,
    pub show_hidden: bool,
    pub visible: LineStyle,
    pub hidden: LineStyle,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            viewport_origin: [-100.0, -50.0, 30.0],
            viewport_up: [0.0, 0.0, 1.0],
            look_at: None,
            target_size: 100.0,
            depth_tolerance: 0.1,
            show_hidden: true,
            visible: LineStyle::solid("rgb(0,0,0)", 0.25),
            hidden: LineStyle::dotted("rgb(99,99,99)", 0.2),
        }
    }
}

/// Edge polylines in drawing units (y down), split by visibility.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedEdges {
    pub visible: Vec<Vec<[f64; 2]>>,
    pub hidden: Vec<Vec<[f64; 2]>>,
    pub width: f64,
    pub height: f64,
}

/// Orthographic camera frame. Projected points are (right, up, depth).
struct Camera {
    eye: [f64; 3],
    right: [f64; 3],
    up: [f64; 3],
    forward: [f64; 3],
}

impl Camera {
    fn new(eye: [f64; 3], target: [f64; 3], up: [f64; 3]) -> Result<Self, ExportError> {
        let forward = unit(sub(target, eye)).ok_or_else(|| ExportError::InvalidView {
            reason: "camera position coincides with the look-at point".to_string(),
        })?;
        let right = unit(cross(forward, up)).ok_or_else(|| ExportError::InvalidView {
            reason: "up direction is parallel to the view direction".to_string(),
        })?;
        Ok(Self {
            eye,
            right,
            up: cross(right, forward),
            forward,
        })
    }

    fn project(&self, p: [f64; 3]) -> [f64; 3] {
        let d = sub(p, self.eye);
        [dot(d, self.right), dot(d, self.up), dot(d, self.forward)]
    }
}

/// Uniform 2D grid over projected triangles for point-in-triangle depth queries.
struct DepthGrid {
    triangles: Vec<[[f64; 3]; 3]>,
    min: [f64; 2],
    max: [f64; 2],
    cell: [f64; 2],
    n: usize,
    cells: Vec<Vec<usize>>,
}

impl DepthGrid {
    fn new(triangles: Vec<[[f64; 3]; 3]>) -> Self {
        let mut min = [f64::MAX; 2];
        let mut max = [f64::MIN; 2];
        for p in triangles.iter().flatten() {
            for i in 0..2 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }
        let n = ((triangles.len() as f64).sqrt().ceil() as usize).clamp(1, MAX_GRID_CELLS);
        let cell = [
            ((max[0] - min[0]) / n as f64).max(1e-9),
            ((max[1] - min[1]) / n as f64).max(1e-9),
        ];

        let mut grid = Self {
            triangles: Vec::new(),
            min,
            max,
            cell,
            n,
            cells: vec![Vec::new(); n * n],
        };
        for (t, tri) in triangles.iter().enumerate() {
            let (lo_x, hi_x) = grid.span(tri, 0);
            let (lo_y, hi_y) = grid.span(tri, 1);
            for iy in lo_y..=hi_y {
                for ix in lo_x..=hi_x {
                    grid.cells[iy * n + ix].push(t);
                }
            }
        }
        grid.triangles = triangles;
        grid
    }

    fn index(&self, v: f64, axis: usize) -> usize {
        let i = ((v - self.min[axis]) / self.cell[axis]).floor().max(0.0) as usize;
        i.min(self.n - 1)
    }

    fn span(&self, tri: &[[f64; 3]; 3], axis: usize) -> (usize, usize) {
        let lo = tri.iter().map(|p| p[axis]).fold(f64::MAX, f64::min);
        let hi = tri.iter().map(|p| p[axis]).fold(f64::MIN, f64::max);
        (self.index(lo, axis), self.index(hi, axis))
    }

    /// Whether any triangle covers `p` at a depth more than `tolerance` in front of it.
    fn occluded(&self, p: [f64; 3], tolerance: f64) -> bool {
        if p[0] < self.min[0] || p[0] > self.max[0] || p[1] < self.min[1] || p[1] > self.max[1] {
            return false;
        }
        let cell = &self.cells[self.index(p[1], 1) * self.n + self.index(p[0], 0)];
        cell.iter().any(|&t| {
            depth_at(&self.triangles[t], p[0], p[1]).is_some_and(|d| d < p[2] - tolerance)
        })
    }
}

/// Interpolated depth of a projected triangle at (x, y), if it covers that point.
fn depth_at(tri: &[[f64; 3]; 3], x: f64, y: f64) -> Option<f64> {
    let [a, b, c] = tri;
    let den = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
    if den.abs() < 1e-18 {
        return None;
    }
    let w0 = ((b[1] - c[1]) * (x - c[0]) + (c[0] - b[0]) * (y - c[1])) / den;
    let w1 = ((c[1] - a[1]) * (x - c[0]) + (a[0] - c[0]) * (y - c[1])) / den;
    let w2 = 1.0 - w0 - w1;
    const EPS: f64 = 1e-9;
    if w0 < -EPS || w1 < -EPS || w2 < -EPS {
        return None;
    }
    Some(w0 * a[2] + w1 * b[2] + w2 * c[2])
}

/// Split a projected polyline into runs of equal visibility.
fn split_runs(
    grid: &DepthGrid,
    line: &[[f64; 3]],
    step: f64,
    tolerance: f64,
) -> Vec<(bool, Vec<[f64; 3]>)> {
    let mut runs: Vec<(bool, Vec<[f64; 3]>)> = Vec::new();
    for pair in line.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let len = (b[0] - a[0]).hypot(b[1] - a[1]);
        let pieces = if step > 0.0 && step.is_finite() {
            ((len / step).ceil() as usize).clamp(1, MAX_SEGMENT_PIECES)
        } else {
            1
        };
        for k in 0..pieces {
            let t0 = k as f64 / pieces as f64;
            let t1 = (k + 1) as f64 / pieces as f64;
            let p0 = lerp(a, b, t0);
            let p1 = lerp(a, b, t1);
            let visible = !grid.occluded(lerp(a, b, (t0 + t1) / 2.0), tolerance);
            let extends = matches!(runs.last(), Some((v, _)) if *v == visible);
            match runs.last_mut() {
                Some((_, points)) if extends => {
                    // Collinear with the previous piece of this segment
                    if k > 0 {
                        if let Some(last) = points.last_mut() {
                            *last = p1;
                        }
                    } else {
                        points.push(p1);
                    }
                }
                _ => runs.push((visible, vec![p0, p1])),
            }
        }
    }
    runs
}

/// Project a solid's edges and classify every edge piece as visible or hidden.
pub fn project_edges(
    mesh: &RenderMesh,
    edges: &EdgeRenderData,
    options: &SvgOptions,
) -> Result<ProjectedEdges, ExportError> {
    check_mesh(mesh, "drawing")?;
    let bounds = mesh.bounds().ok_or_else(|| ExportError::EmptyMesh {
        part: "drawing".to_string(),
    })?;
    let target = options.look_at.unwrap_or_else(|| bounds.center());
    let camera = Camera::new(options.viewport_origin, target, options.viewport_up)?;

    let triangles: Vec<[[f64; 3]; 3]> = (0..mesh.triangle_count())
        .map(|t| triangle(mesh, t).map(|p| camera.project(p.map(f64::from))))
        .collect();
    let lines: Vec<Vec<[f64; 3]>> = edges
        .polylines()
        .filter(|line| line.len() >= 2)
        .map(|line| line.into_iter().map(|p| camera.project(p)).collect())
        .collect();

    // The drawing is framed by its edges; a solid without edges falls back to its mesh
    let mut min = [f64::MAX; 2];
    let mut max = [f64::MIN; 2];
    let framed: Vec<&[f64; 3]> = if lines.is_empty() {
        triangles.iter().flatten().collect()
    } else {
        lines.iter().flatten().collect()
    };
    for p in framed {
        for i in 0..2 {
            min[i] = min[i].min(p[i]);
            max[i] = max[i].max(p[i]);
        }
    }
    let extent = (max[0] - min[0]).max(max[1] - min[1]);
    let scale = if extent > 1e-12 {
        options.target_size / extent
    } else {
        1.0
    };
    let to_drawing = |p: &[f64; 3]| [(p[0] - min[0]) * scale, (max[1] - p[1]) * scale];

    let grid = DepthGrid::new(triangles);
    let step = extent / SAMPLES_PER_EXTENT;
    let mut drawing = ProjectedEdges {
        width: (max[0] - min[0]) * scale,
        height: (max[1] - min[1]) * scale,
        ..Default::default()
    };
    for line in &lines {
        for (visible, points) in split_runs(&grid, line, step, options.depth_tolerance) {
            let points = points.iter().map(to_drawing).collect();
            if visible {
                drawing.visible.push(points);
            } else {
                drawing.hidden.push(points);
            }
        }
    }
    Ok(drawing)
}

/// Render the two-layer drawing as an SVG document.
pub fn render_svg(
    mesh: &RenderMesh,
    edges: &EdgeRenderData,
    options: &SvgOptions,
) -> Result<String, ExportError> {
    let drawing = project_edges(mesh, edges, options)?;
    let pad = options.visible.stroke_width.max(options.hidden.stroke_width);

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}mm\" height=\"{h}mm\" viewBox=\"{x} {x} {w} {h}\">",
        x = fmt_num(-pad),
        w = fmt_num(drawing.width + 2.0 * pad),
        h = fmt_num(drawing.height + 2.0 * pad),
    );
    // Hidden first so visible lines paint over it
    if options.show_hidden {
        write_layer(&mut out, "Hidden", &options.hidden, &drawing.hidden);
    }
    write_layer(&mut out, "Visible", &options.visible, &drawing.visible);
    out.push_str("</svg>\n");
    Ok(out)
}

/// Write the drawing to `path`, creating the parent directory if needed.
pub fn write_svg(
    path: &Path,
    mesh: &RenderMesh,
    edges: &EdgeRenderData,
    options: &SvgOptions,
) -> Result<(), ExportError> {
    let svg = render_svg(mesh, edges, options)?;
    write_output(path, svg.as_bytes())
}

fn write_layer(out: &mut String, id: &str, style: &LineStyle, lines: &[Vec<[f64; 2]>]) {
    let _ = write!(
        out,
        "  <g id=\"{id}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" stroke-linecap=\"round\" stroke-linejoin=\"round\"",
        xml_escape(&style.stroke),
        fmt_num(style.stroke_width),
    );
    if let Some(dash) = &style.dasharray {
        let _ = write!(out, " stroke-dasharray=\"{}\"", xml_escape(dash));
    }
    out.push_str(">\n");
    for line in lines {
        out.push_str("    <path d=\"");
        for (i, [x, y]) in line.iter().enumerate() {
            let cmd = if i == 0 { "M" } else { " L" };
            let _ = write!(out, "{cmd}{} {}", fmt_num(*x), fmt_num(*y));
        }
        out.push_str("\"/>\n");
    }
    out.push_str("  </g>\n");
}

/// Fixed three-decimal formatting without trailing zeros.
fn fmt_num(v: f64) -> String {
    let s = format!("{v:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn unit(v: [f64; 3]) -> Option<[f64; 3]> {
    let len = dot(v, v).sqrt();
    (len.is_finite() && len > 1e-12).then(|| [v[0] / len, v[1] / len, v[2] / len])
}

fn lerp(a: [f64; 3], b: [f64; 3], t: f64) -> [f64; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use bearing_kernel::{Kernel, MockKernel};

    /// A 2×2×2 box centered on the origin, with its 12 edges.
    fn cube() -> (RenderMesh, EdgeRenderData) {
        let mut kernel = MockKernel::new();
        let solid = kernel.make_cylinder(1.0, 2.0).unwrap();
        let mesh = kernel.tessellate(&solid, 0.1).unwrap();
        let edges = kernel.extract_edges(&solid, 0.1).unwrap();
        (mesh, edges)
    }

    /// Exact box geometry needs no slack; hidden edges converge to the silhouette.
    fn exact() -> SvgOptions {
        SvgOptions {
            depth_tolerance: 1e-6,
            ..Default::default()
        }
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(100.0), "100");
        assert_eq!(fmt_num(10.5), "10.5");
        assert_eq!(fmt_num(-0.0001), "0");
        assert_eq!(fmt_num(1.23456), "1.235");
    }

    #[test]
    fn test_camera_centers_target() {
        let camera = Camera::new([-100.0, -50.0, 30.0], [0.0; 3], [0.0, 0.0, 1.0]).unwrap();
        let p = camera.project([0.0; 3]);
        assert_abs_diff_eq!(p[0], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p[1], 0.0, epsilon = 1e-9);
        let distance = (100.0f64 * 100.0 + 50.0 * 50.0 + 30.0 * 30.0).sqrt();
        assert_abs_diff_eq!(p[2], distance, epsilon = 1e-9);

        // Higher points project higher on the page
        assert!(camera.project([0.0, 0.0, 1.0])[1] > 0.0);
    }

    #[test]
    fn test_camera_rejects_degenerate_view() {
        assert!(matches!(
            Camera::new([0.0, 0.0, 10.0], [0.0; 3], [0.0, 0.0, 1.0]),
            Err(ExportError::InvalidView { .. })
        ));
        assert!(matches!(
            Camera::new([1.0; 3], [1.0; 3], [0.0, 0.0, 1.0]),
            Err(ExportError::InvalidView { .. })
        ));
    }

    #[test]
    fn test_cube_far_corner_edges_are_hidden() {
        let (mesh, edges) = cube();
        let drawing = project_edges(&mesh, &edges, &exact()).unwrap();

        // The corner facing away from the camera owns the only hidden edges
        assert_eq!(drawing.hidden.len(), 3);
        assert_eq!(drawing.visible.len(), 9);
    }

    #[test]
    fn test_drawing_scaled_to_target_size() {
        let (mesh, edges) = cube();
        let drawing = project_edges(&mesh, &edges, &exact()).unwrap();
        assert_abs_diff_eq!(drawing.width.max(drawing.height), 100.0, epsilon = 1e-9);

        for [x, y] in drawing.visible.iter().chain(&drawing.hidden).flatten() {
            assert!(*x >= -1e-9 && *x <= drawing.width + 1e-9);
            assert!(*y >= -1e-9 && *y <= drawing.height + 1e-9);
        }
    }

    #[test]
    fn test_render_svg_layers() {
        let (mesh, edges) = cube();
        let svg = render_svg(&mesh, &edges, &exact()).unwrap();

        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains("<g id=\"Visible\""));
        assert!(svg.contains("<g id=\"Hidden\" fill=\"none\" stroke=\"rgb(99,99,99)\""));
        assert!(svg.contains("stroke-dasharray=\"0 0.6\""));
        assert_eq!(svg.matches("<path").count(), 12);
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_render_svg_without_hidden_layer() {
        let (mesh, edges) = cube();
        let options = SvgOptions {
            show_hidden: false,
            ..exact()
        };
        let svg = render_svg(&mesh, &edges, &options).unwrap();
        assert!(!svg.contains("id=\"Hidden\""));
        assert_eq!(svg.matches("<path").count(), 9);
    }

    #[test]
    fn test_render_svg_is_deterministic() {
        let (mesh, edges) = cube();
        let a = render_svg(&mesh, &edges, &exact()).unwrap();
        let b = render_svg(&mesh, &edges, &exact()).unwrap();
        assert_eq!(a, b);
    }
}
