//! File writers for tessellated bearing parts: STL, glTF, SVG and 3MF.

use std::fs;
use std::path::Path;

use bearing_kernel::RenderMesh;
use tracing::info;

pub mod errors;
pub mod gltf;
pub mod metadata;
pub mod stl;
pub mod svg;
pub mod threemf;

pub use errors::ExportError;
pub use metadata::{MetadataEntry, PackageMetadata};
pub use svg::{LineStyle, SvgOptions};
pub use threemf::ModelPart;

/// Reject meshes the writers cannot encode: no triangles, ragged arrays,
/// or indices past the end of the vertex array.
pub(crate) fn check_mesh(mesh: &RenderMesh, name: &str) -> Result<(), ExportError> {
    if mesh.vertices.len() % 3 != 0 {
        return Err(ExportError::InvalidMesh {
            reason: format!(
                "{name}: vertex array length {} is not a multiple of 3",
                mesh.vertices.len()
            ),
        });
    }
    if mesh.indices.len() % 3 != 0 {
        return Err(ExportError::InvalidMesh {
            reason: format!(
                "{name}: index array length {} is not a multiple of 3",
                mesh.indices.len()
            ),
        });
    }
    if mesh.indices.is_empty() {
        return Err(ExportError::EmptyMesh {
            part: name.to_string(),
        });
    }
    let vertex_count = mesh.vertex_count();
    if let Some(&bad) = mesh.indices.iter().find(|&&i| i as usize >= vertex_count) {
        return Err(ExportError::InvalidMesh {
            reason: format!("{name}: index {bad} out of range for {vertex_count} vertices"),
        });
    }
    Ok(())
}

/// Corner positions of triangle `t`. Callers run `check_mesh` first.
pub(crate) fn triangle(mesh: &RenderMesh, t: usize) -> [[f32; 3]; 3] {
    let corner = |k: usize| {
        let i = mesh.indices[t * 3 + k] as usize * 3;
        [mesh.vertices[i], mesh.vertices[i + 1], mesh.vertices[i + 2]]
    };
    [corner(0), corner(1), corner(2)]
}

/// Write `bytes` to `path`, creating missing parent directories.
pub(crate) fn write_output(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote file");
    Ok(())
}

/// Escape text for XML content and attribute values.
pub(crate) fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
