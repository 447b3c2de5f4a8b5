use std::fs;
use std::io::{Cursor, Read};

use bearing_export::{gltf, stl, svg, threemf, ExportError, ModelPart, PackageMetadata, SvgOptions};
use bearing_kernel::{Kernel, MockKernel, RenderMesh, Transform};

/// Two disjoint boxes, as a mock union would tessellate them.
fn two_boxes() -> RenderMesh {
    let mut kernel = MockKernel::new();
    let a = kernel.make_sphere([0.0; 3], 1.0).unwrap();
    let b = kernel.make_cylinder(1.0, 2.0).unwrap();
    let b = kernel
        .transform(&b, &Transform::translation(5.0, 0.0, 0.0))
        .unwrap();
    let both = kernel.boolean_union(&a, &b).unwrap();
    kernel.tessellate(&both, 0.05).unwrap()
}

#[test]
fn binary_stl_reads_back_with_stl_io() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parts").join("outer_wheel.stl");
    let mesh = two_boxes();

    stl::write_binary_stl(&path, &mesh, "outer_wheel").unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 84 + mesh.triangle_count() * 50);
    let parsed = stl_io::read_stl(&mut Cursor::new(bytes)).unwrap();
    assert_eq!(parsed.faces.len(), 24);
}

#[test]
fn ascii_stl_reads_back_with_stl_io() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("part.stl");
    stl::write_ascii_stl(&path, &two_boxes(), "part").unwrap();

    let mut file = fs::File::open(&path).unwrap();
    let parsed = stl_io::read_stl(&mut file).unwrap();
    assert_eq!(parsed.faces.len(), 24);
}

#[test]
fn binary_stl_normals_point_outward() {
    let mesh = two_boxes();
    let bytes = stl::render_mesh_to_binary_stl(&mesh, "boxes").unwrap();
    let parsed = stl_io::read_stl(&mut Cursor::new(bytes)).unwrap();

    // First body is the unit sphere's box centered on the origin
    for face in parsed.faces.iter().take(12) {
        let v = &parsed.vertices[face.vertices[0]];
        let n = face.normal;
        let outward = v[0] * n[0] + v[1] * n[1] + v[2] * n[2];
        assert!(outward > 0.0, "normal {n:?} points inward at {v:?}");
    }
}

#[test]
fn gltf_file_is_valid_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bearing.gltf");
    gltf::write_gltf(&path, &two_boxes(), "bearing").unwrap();

    let doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(doc["accessors"][0]["count"], 16);
    assert_eq!(doc["accessors"][2]["count"], 72);
    let max_x = doc["accessors"][0]["max"][0].as_f64().unwrap();
    approx::assert_abs_diff_eq!(max_x, 6.0, epsilon = 1e-6);
}

#[test]
fn svg_file_has_both_layers() {
    let mut kernel = MockKernel::new();
    let solid = kernel.make_cylinder(2.0, 1.0).unwrap();
    let mesh = kernel.tessellate(&solid, 0.05).unwrap();
    let edges = kernel.extract_edges(&solid, 0.05).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bearing.svg");
    svg::write_svg(&path, &mesh, &edges, &SvgOptions::default()).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("id=\"Visible\""));
    assert!(text.contains("id=\"Hidden\""));
}

#[test]
fn threemf_package_lists_named_parts() {
    let mesh = two_boxes();
    let parts = [
        ModelPart::new("top_track", &mesh),
        ModelPart::new("bottom_track", &mesh),
    ];
    let metadata = PackageMetadata::new().with_entry("Title", "bearing");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.3mf");
    threemf::write_3mf(&path, &parts, &metadata).unwrap();

    let mut archive = zip::ZipArchive::new(fs::File::open(&path).unwrap()).unwrap();
    let mut model = String::new();
    archive
        .by_name(threemf::MODEL_PATH)
        .unwrap()
        .read_to_string(&mut model)
        .unwrap();
    assert!(model.contains("name=\"top_track\""));
    assert!(model.contains("name=\"bottom_track\""));
    assert_eq!(model.matches("<object ").count(), 2);
    assert!(model.contains("<metadata name=\"Title\">bearing</metadata>"));
}

#[test]
fn writers_reject_empty_mesh() {
    let dir = tempfile::tempdir().unwrap();
    let empty = RenderMesh::default();
    assert!(matches!(
        stl::write_binary_stl(&dir.path().join("x.stl"), &empty, "x"),
        Err(ExportError::EmptyMesh { .. })
    ));
    assert!(matches!(
        gltf::write_gltf(&dir.path().join("x.gltf"), &empty, "x"),
        Err(ExportError::EmptyMesh { .. })
    ));
    assert!(!dir.path().join("x.stl").exists());
}
