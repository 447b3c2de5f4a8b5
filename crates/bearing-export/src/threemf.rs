//! 3MF package writer: one mesh object and one build item per part.

use std::fmt::Write as _;
use std::io::{Cursor, Write};
use std::path::Path;

use bearing_kernel::RenderMesh;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::errors::ExportError;
use crate::metadata::PackageMetadata;
use crate::{check_mesh, write_output, xml_escape};

pub const MODEL_PATH: &str = "3D/3dmodel.model";
const CORE_NAMESPACE: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";
const MODEL_RELATIONSHIP: &str = "http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
</Types>
"#;

/// A named mesh placed in the package.
#[derive(Debug, Clone, Copy)]
pub struct ModelPart<'a> {
    pub name: &'a str,
    pub mesh: &'a RenderMesh,
}

impl<'a> ModelPart<'a> {
    pub fn new(name: &'a str, mesh: &'a RenderMesh) -> Self {
        Self { name, mesh }
    }
}

fn relationships() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/{MODEL_PATH}" Id="rel0" Type="{MODEL_RELATIONSHIP}"/>
</Relationships>
"#
    )
}

/// The `3D/3dmodel.model` XML document.
pub fn render_model(
    parts: &[ModelPart<'_>],
    metadata: &PackageMetadata,
) -> Result<String, ExportError> {
    if parts.is_empty() {
        return Err(ExportError::EmptyPackage);
    }
    for part in parts {
        check_mesh(part.mesh, part.name)?;
    }
    metadata.validate()?;

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = write!(
        out,
        "<model unit=\"millimeter\" xml:lang=\"en-US\" xmlns=\"{CORE_NAMESPACE}\""
    );
    for (prefix, uri) in metadata.namespaces() {
        let _ = write!(out, " xmlns:{}=\"{}\"", xml_escape(prefix), xml_escape(uri));
    }
    out.push_str(">\n");

    for entry in metadata.entries() {
        let preserve = if entry.prefix().is_some() {
            " preserve=\"1\""
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "  <metadata name=\"{}\"{preserve}>{}</metadata>",
            xml_escape(&entry.name),
            xml_escape(&entry.value)
        );
    }

    out.push_str("  <resources>\n");
    for (i, part) in parts.iter().enumerate() {
        let _ = writeln!(
            out,
            "    <object id=\"{}\" name=\"{}\" type=\"model\">",
            i + 1,
            xml_escape(part.name)
        );
        out.push_str("      <mesh>\n        <vertices>\n");
        for p in part.mesh.vertices.chunks_exact(3) {
            let _ = writeln!(
                out,
                "          <vertex x=\"{}\" y=\"{}\" z=\"{}\"/>",
                p[0], p[1], p[2]
            );
        }
        out.push_str("        </vertices>\n        <triangles>\n");
        for t in part.mesh.indices.chunks_exact(3) {
            let _ = writeln!(
                out,
                "          <triangle v1=\"{}\" v2=\"{}\" v3=\"{}\"/>",
                t[0], t[1], t[2]
            );
        }
        out.push_str("        </triangles>\n      </mesh>\n    </object>\n");
    }
    out.push_str("  </resources>\n  <build>\n");
    for i in 0..parts.len() {
        let _ = writeln!(out, "    <item objectid=\"{}\"/>", i + 1);
    }
    out.push_str("  </build>\n</model>\n");
    Ok(out)
}

/// Package the parts into 3MF archive bytes.
///
/// Entries carry a fixed timestamp, so equal inputs give identical bytes.
pub fn render_3mf(
    parts: &[ModelPart<'_>],
    metadata: &PackageMetadata,
) -> Result<Vec<u8>, ExportError> {
    let model = render_model(parts, metadata)?;
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", relationships()),
        (MODEL_PATH, model),
    ] {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
        debug!(entry = name, bytes = body.len(), "3mf entry");
    }
    Ok(zip.finish()?.into_inner())
}

/// Write a 3MF package, creating the parent directory if needed.
pub fn write_3mf(
    path: &Path,
    parts: &[ModelPart<'_>],
    metadata: &PackageMetadata,
) -> Result<(), ExportError> {
    let bytes = render_3mf(parts, metadata)?;
    write_output(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn triangle() -> RenderMesh {
        RenderMesh {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.5, 0.0],
            normals: vec![],
            indices: vec![0, 1, 2],
            face_ranges: vec![],
        }
    }

    fn metadata() -> PackageMetadata {
        PackageMetadata::new()
            .with_namespace("bearing", "urn:bearing-builder:metadata")
            .with_entry("Application", "bearing-builder")
            .with_entry("bearing:config", r#"{"ball_count":8}"#)
    }

    #[test]
    fn test_model_objects_and_items() {
        let mesh = triangle();
        let parts = [ModelPart::new("a", &mesh), ModelPart::new("b", &mesh)];
        let model = render_model(&parts, &metadata()).unwrap();

        assert!(model.contains("unit=\"millimeter\""));
        assert!(model.contains("xmlns:bearing=\"urn:bearing-builder:metadata\""));
        assert!(model.contains("<object id=\"1\" name=\"a\" type=\"model\">"));
        assert!(model.contains("<object id=\"2\" name=\"b\" type=\"model\">"));
        assert_eq!(model.matches("<item objectid=").count(), 2);
        assert!(model.contains("<vertex x=\"0\" y=\"1.5\" z=\"0\"/>"));
        assert!(model.contains("<triangle v1=\"0\" v2=\"1\" v3=\"2\"/>"));
        assert!(model.contains(
            "<metadata name=\"bearing:config\" preserve=\"1\">{&quot;ball_count&quot;:8}</metadata>"
        ));
    }

    #[test]
    fn test_render_3mf_archive_entries() {
        let mesh = triangle();
        let bytes = render_3mf(&[ModelPart::new("a", &mesh)], &metadata()).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["3D/3dmodel.model", "[Content_Types].xml", "_rels/.rels"]);

        let mut rels = String::new();
        archive
            .by_name("_rels/.rels")
            .unwrap()
            .read_to_string(&mut rels)
            .unwrap();
        assert!(rels.contains("Target=\"/3D/3dmodel.model\""));
    }

    #[test]
    fn test_render_3mf_is_reproducible() {
        let mesh = triangle();
        let parts = [ModelPart::new("a", &mesh)];
        assert_eq!(
            render_3mf(&parts, &metadata()).unwrap(),
            render_3mf(&parts, &metadata()).unwrap()
        );
    }

    #[test]
    fn test_render_3mf_rejects_bad_input() {
        let mesh = triangle();
        assert!(matches!(
            render_3mf(&[], &metadata()),
            Err(ExportError::EmptyPackage)
        ));
        assert!(matches!(
            render_3mf(&[ModelPart::new("empty", &RenderMesh::default())], &metadata()),
            Err(ExportError::EmptyMesh { .. })
        ));
        let undeclared = PackageMetadata::new().with_entry("other:key", "v");
        assert!(matches!(
            render_3mf(&[ModelPart::new("a", &mesh)], &undeclared),
            Err(ExportError::UndeclaredNamespace { .. })
        ));
    }
}
