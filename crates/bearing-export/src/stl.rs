//! Binary and ASCII STL writers.
//!
//! Binary STL layout:
//! - 80 bytes: header (part name, zero-padded)
//! - 4 bytes: u32 LE triangle count
//! - Per triangle (50 bytes each):
//!   - 12 bytes: normal vector (3 × f32 LE)
//!   - 36 bytes: 3 vertices (3 × 3 × f32 LE)
//!   - 2 bytes: attribute byte count (0u16)

use std::fmt::Write as _;
use std::path::Path;

use bearing_kernel::RenderMesh;

use crate::errors::ExportError;
use crate::{check_mesh, triangle, write_output};

const HEADER_LEN: usize = 80;

/// Unit normal from the triangle winding; degenerate triangles get +Z.
fn facet_normal(tri: &[[f32; 3]; 3]) -> [f32; 3] {
    let [v0, v1, v2] = tri;
    let e1 = [v1[0] - v0[0], v1[1] - v0[1], v1[2] - v0[2]];
    let e2 = [v2[0] - v0[0], v2[1] - v0[1], v2[2] - v0[2]];
    let nx = e1[1] * e2[2] - e1[2] * e2[1];
    let ny = e1[2] * e2[0] - e1[0] * e2[2];
    let nz = e1[0] * e2[1] - e1[1] * e2[0];
    let len = (nx * nx + ny * ny + nz * nz).sqrt();
    if len > 1e-12 {
        [nx / len, ny / len, nz / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}

/// Convert a mesh to binary STL bytes. The header carries `name`.
pub fn render_mesh_to_binary_stl(mesh: &RenderMesh, name: &str) -> Result<Vec<u8>, ExportError> {
    check_mesh(mesh, name)?;

    let tri_count = mesh.triangle_count();
    let count = u32::try_from(tri_count).map_err(|_| ExportError::InvalidMesh {
        reason: format!("{name}: {tri_count} triangles exceed the binary STL limit"),
    })?;

    let mut buf = Vec::with_capacity(HEADER_LEN + 4 + tri_count * 50);
    let mut header = [0u8; HEADER_LEN];
    let name_bytes = name.as_bytes();
    let n = name_bytes.len().min(HEADER_LEN);
    header[..n].copy_from_slice(&name_bytes[..n]);
    buf.extend_from_slice(&header);
    buf.extend_from_slice(&count.to_le_bytes());

    for t in 0..tri_count {
        let tri = triangle(mesh, t);
        for c in facet_normal(&tri) {
            buf.extend_from_slice(&c.to_le_bytes());
        }
        for v in &tri {
            for c in v {
                buf.extend_from_slice(&c.to_le_bytes());
            }
        }
        buf.extend_from_slice(&0u16.to_le_bytes());
    }

    Ok(buf)
}

/// Convert a mesh to ASCII STL text.
pub fn render_mesh_to_ascii_stl(mesh: &RenderMesh, name: &str) -> Result<String, ExportError> {
    check_mesh(mesh, name)?;

    let mut out = String::new();
    // fmt::Write into a String cannot fail
    let _ = writeln!(out, "solid {name}");
    for t in 0..mesh.triangle_count() {
        let tri = triangle(mesh, t);
        let [nx, ny, nz] = facet_normal(&tri);
        let _ = writeln!(out, "  facet normal {nx} {ny} {nz}");
        out.push_str("    outer loop\n");
        for [x, y, z] in tri {
            let _ = writeln!(out, "      vertex {x} {y} {z}");
        }
        out.push_str("    endloop\n");
        out.push_str("  endfacet\n");
    }
    let _ = writeln!(out, "endsolid {name}");
    Ok(out)
}

/// Write a mesh as binary STL, creating the parent directory if needed.
pub fn write_binary_stl(path: &Path, mesh: &RenderMesh, name: &str) -> Result<(), ExportError> {
    let bytes = render_mesh_to_binary_stl(mesh, name)?;
    write_output(path, &bytes)
}

/// Write a mesh as ASCII STL, creating the parent directory if needed.
pub fn write_ascii_stl(path: &Path, mesh: &RenderMesh, name: &str) -> Result<(), ExportError> {
    let text = render_mesh_to_ascii_stl(mesh, name)?;
    write_output(path, text.as_bytes())
}
