//! glTF 2.0 writer with the geometry buffer embedded as a base64 data URI.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bearing_kernel::RenderMesh;
use serde::Serialize;

use crate::errors::ExportError;
use crate::{check_mesh, write_output};

const GENERATOR: &str = concat!("bearing-export ", env!("CARGO_PKG_VERSION"));

/// Rotates the Z-up model into glTF's Y-up frame: −90° about X.
pub const Z_UP_TO_Y_UP: [f32; 4] = [-0.707_106_8, 0.0, 0.0, 0.707_106_8];

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const MODE_TRIANGLES: u32 = 4;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    asset: Asset,
    scene: usize,
    scenes: Vec<Scene>,
    nodes: Vec<Node>,
    meshes: Vec<Mesh>,
    buffers: Vec<Buffer>,
    buffer_views: Vec<BufferView>,
    accessors: Vec<Accessor>,
}

#[derive(Serialize)]
struct Asset {
    version: &'static str,
    generator: &'static str,
}

#[derive(Serialize)]
struct Scene {
    nodes: Vec<usize>,
}

#[derive(Serialize)]
struct Node {
    name: String,
    mesh: usize,
    rotation: [f32; 4],
}

#[derive(Serialize)]
struct Mesh {
    name: String,
    primitives: Vec<Primitive>,
}

#[derive(Serialize)]
struct Primitive {
    attributes: Attributes,
    indices: usize,
    mode: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct Attributes {
    position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    normal: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Buffer {
    byte_length: usize,
    uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferView {
    buffer: usize,
    byte_offset: usize,
    byte_length: usize,
    target: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Accessor {
    buffer_view: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<[f32; 3]>,
}

/// Accumulates little-endian buffer sections, one buffer view each.
#[derive(Default)]
struct BufferBuilder {
    bytes: Vec<u8>,
    views: Vec<BufferView>,
}

impl BufferBuilder {
    fn push_f32s(&mut self, values: &[f32], target: u32) -> usize {
        let start = self.bytes.len();
        for v in values {
            self.bytes.extend_from_slice(&v.to_le_bytes());
        }
        self.finish_view(start, target)
    }

    fn push_u32s(&mut self, values: &[u32], target: u32) -> usize {
        let start = self.bytes.len();
        for v in values {
            self.bytes.extend_from_slice(&v.to_le_bytes());
        }
        self.finish_view(start, target)
    }

    fn finish_view(&mut self, start: usize, target: u32) -> usize {
        self.views.push(BufferView {
            buffer: 0,
            byte_offset: start,
            byte_length: self.bytes.len() - start,
            target,
        });
        self.views.len() - 1
    }
}

fn position_bounds(vertices: &[f32]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for p in vertices.chunks_exact(3) {
        for i in 0..3 {
            min[i] = min[i].min(p[i]);
            max[i] = max[i].max(p[i]);
        }
    }
    (min, max)
}

/// Render a mesh as a single-node glTF 2.0 JSON document.
///
/// Buffer layout: positions, then normals when there is one per vertex, then indices.
pub fn render_mesh_to_gltf(mesh: &RenderMesh, name: &str) -> Result<String, ExportError> {
    check_mesh(mesh, name)?;

    let vertex_count = mesh.vertex_count();
    let has_normals = mesh.normals.len() == mesh.vertices.len();
    let (min, max) = position_bounds(&mesh.vertices);

    let mut buffer = BufferBuilder::default();
    let mut accessors = Vec::new();

    let positions_view = buffer.push_f32s(&mesh.vertices, TARGET_ARRAY_BUFFER);
    accessors.push(Accessor {
        buffer_view: positions_view,
        component_type: COMPONENT_FLOAT,
        count: vertex_count,
        kind: "VEC3",
        min: Some(min),
        max: Some(max),
    });
    let position = accessors.len() - 1;

    let normal = if has_normals {
        let normals_view = buffer.push_f32s(&mesh.normals, TARGET_ARRAY_BUFFER);
        accessors.push(Accessor {
            buffer_view: normals_view,
            component_type: COMPONENT_FLOAT,
            count: vertex_count,
            kind: "VEC3",
            min: None,
            max: None,
        });
        Some(accessors.len() - 1)
    } else {
        None
    };

    let indices_view = buffer.push_u32s(&mesh.indices, TARGET_ELEMENT_ARRAY_BUFFER);
    accessors.push(Accessor {
        buffer_view: indices_view,
        component_type: COMPONENT_UNSIGNED_INT,
        count: mesh.indices.len(),
        kind: "SCALAR",
        min: None,
        max: None,
    });
    let indices = accessors.len() - 1;

    let doc = Document {
        asset: Asset {
            version: "2.0",
            generator: GENERATOR,
        },
        scene: 0,
        scenes: vec![Scene { nodes: vec![0] }],
        nodes: vec![Node {
            name: name.to_string(),
            mesh: 0,
            rotation: Z_UP_TO_Y_UP,
        }],
        meshes: vec![Mesh {
            name: name.to_string(),
            primitives: vec![Primitive {
                attributes: Attributes { position, normal },
                indices,
                mode: MODE_TRIANGLES,
            }],
        }],
        buffers: vec![Buffer {
            byte_length: buffer.bytes.len(),
            uri: format!(
                "data:application/octet-stream;base64,{}",
                STANDARD.encode(&buffer.bytes)
            ),
        }],
        buffer_views: buffer.views,
        accessors,
    };

    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Write a mesh as a `.gltf` file, creating the parent directory if needed.
pub fn write_gltf(path: &Path, mesh: &RenderMesh, name: &str) -> Result<(), ExportError> {
    let json = render_mesh_to_gltf(mesh, name)?;
    write_output(path, json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn quad() -> RenderMesh {
        RenderMesh {
            vertices: vec![
                0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 2.0, 3.0, 0.0, 0.0, 3.0, 1.0,
            ],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2, 0, 2, 3],
            face_ranges: vec![],
        }
    }

    fn decode_buffer(doc: &Value) -> Vec<u8> {
        let uri = doc["buffers"][0]["uri"].as_str().unwrap();
        let data = uri
            .strip_prefix("data:application/octet-stream;base64,")
            .unwrap();
        STANDARD.decode(data).unwrap()
    }

    #[test]
    fn test_gltf_layout() {
        let json = render_mesh_to_gltf(&quad(), "bearing").unwrap();
        let doc: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(doc["asset"]["version"], "2.0");
        assert_eq!(doc["nodes"][0]["name"], "bearing");
        assert_eq!(doc["accessors"].as_array().unwrap().len(), 3);
        assert_eq!(doc["accessors"][0]["count"], 4);
        assert_eq!(doc["accessors"][0]["type"], "VEC3");
        assert_eq!(doc["accessors"][2]["count"], 6);
        assert_eq!(doc["accessors"][2]["componentType"], 5125);
        assert_eq!(doc["meshes"][0]["primitives"][0]["attributes"]["NORMAL"], 1);

        let max: Vec<f64> = doc["accessors"][0]["max"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(max, vec![2.0, 3.0, 1.0]);

        // 4 positions + 4 normals (12 bytes each) + 6 indices (4 bytes each)
        let bytes = decode_buffer(&doc);
        assert_eq!(bytes.len(), 4 * 12 + 4 * 12 + 6 * 4);
        assert_eq!(doc["buffers"][0]["byteLength"], bytes.len());
        assert_eq!(doc["bufferViews"][2]["byteOffset"], 96);
    }

    #[test]
    fn test_gltf_node_rotates_z_up_to_y_up() {
        let json = render_mesh_to_gltf(&quad(), "bearing").unwrap();
        let doc: Value = serde_json::from_str(&json).unwrap();
        let rotation: Vec<f64> = doc["nodes"][0]["rotation"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        approx::assert_abs_diff_eq!(rotation[0], -std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
        approx::assert_abs_diff_eq!(rotation[3], std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
    }

    #[test]
    fn test_gltf_skips_mismatched_normals() {
        let mut mesh = quad();
        mesh.normals.truncate(3);
        let json = render_mesh_to_gltf(&mesh, "bearing").unwrap();
        let doc: Value = serde_json::from_str(&json).unwrap();

        assert!(doc["meshes"][0]["primitives"][0]["attributes"]
            .get("NORMAL")
            .is_none());
        assert_eq!(doc["accessors"].as_array().unwrap().len(), 2);
        assert_eq!(doc["meshes"][0]["primitives"][0]["indices"], 1);
    }

    #[test]
    fn test_gltf_rejects_empty_mesh() {
        assert!(matches!(
            render_mesh_to_gltf(&RenderMesh::default(), "bearing"),
            Err(ExportError::EmptyMesh { .. })
        ));
    }
}
