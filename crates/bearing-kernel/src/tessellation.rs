//! Tessellation and edge sampling of truck solids.
//!
//! Wraps truck-meshalgo to produce a RenderMesh with FaceRange entries
//! and an EdgeRenderData with one polyline per B-rep edge.

use std::collections::HashSet;

use truck_meshalgo::prelude::*;
use truck_meshalgo::tessellation::{MeshableShape, MeshedShape};
use truck_modeling::{BoundedCurve, ParameterDivision1D};

use crate::types::*;

type TruckSolid = truck_modeling::Solid;

/// Collects per-face meshes into one flat RenderMesh.
#[derive(Default)]
struct MeshAccumulator {
    vertices: Vec<f32>,
    normals: Vec<f32>,
    indices: Vec<u32>,
    face_ranges: Vec<FaceRange>,
}

impl MeshAccumulator {
    fn push(&mut self, mesh: &PolygonMesh, face_id: KernelId) {
        let start_index = self.indices.len() as u32;
        let base_vertex = (self.vertices.len() / 3) as u32;

        let positions = mesh.positions();
        let normals = mesh.normals();

        for pos in positions {
            self.vertices
                .extend_from_slice(&[pos[0] as f32, pos[1] as f32, pos[2] as f32]);
        }

        // Normals are indexed separately in truck; pick the normal referenced by
        // each position's first use, falling back to the triangle normal.
        let mut vertex_normals: Vec<Option<[f32; 3]>> = vec![None; positions.len()];
        for tri in mesh.tri_faces() {
            let fallback = triangle_normal(
                positions[tri[0].pos],
                positions[tri[1].pos],
                positions[tri[2].pos],
            );
            for v in tri.iter() {
                if vertex_normals[v.pos].is_some() {
                    continue;
                }
                let n = v
                    .nor
                    .and_then(|i| normals.get(i))
                    .map(|n| [n[0] as f32, n[1] as f32, n[2] as f32])
                    .unwrap_or(fallback);
                vertex_normals[v.pos] = Some(n);
            }
            for v in tri.iter() {
                self.indices.push(v.pos as u32 + base_vertex);
            }
        }
        for n in vertex_normals {
            self.normals.extend_from_slice(&n.unwrap_or([0.0, 0.0, 1.0]));
        }

        let end_index = self.indices.len() as u32;
        if end_index > start_index {
            self.face_ranges.push(FaceRange {
                face_id,
                start_index,
                end_index,
            });
        }
    }

    fn finish(self) -> RenderMesh {
        RenderMesh {
            vertices: self.vertices,
            normals: self.normals,
            indices: self.indices,
            face_ranges: self.face_ranges,
        }
    }
}

fn triangle_normal(a: Point3, b: Point3, c: Point3) -> [f32; 3] {
    let n = (b - a).cross(c - a);
    let len = n.magnitude();
    if len > 1e-12 {
        [(n.x / len) as f32, (n.y / len) as f32, (n.z / len) as f32]
    } else {
        [0.0, 0.0, 1.0]
    }
}

/// Tessellate a truck Solid into a RenderMesh with per-face tracking.
///
/// Faces are meshed as part of the whole solid so shared edges stay watertight.
/// If no face yields triangles, the merged polygon of the solid is used instead.
pub fn tessellate_solid(
    solid: &TruckSolid,
    tolerance: f64,
    next_id: &mut u64,
) -> Result<RenderMesh, KernelError> {
    if !(tolerance.is_finite() && tolerance > 0.0) {
        return Err(KernelError::TessellationFailed {
            reason: format!("tolerance must be positive, got {tolerance}"),
        });
    }

    let meshed_solid = solid.triangulation(tolerance);
    let mut acc = MeshAccumulator::default();

    for shell in meshed_solid.boundaries().iter() {
        for face in shell.face_iter() {
            let face_id = KernelId(*next_id);
            *next_id += 1;

            let Some(mut face_mesh) = face.surface() else {
                continue;
            };
            if !face.orientation() {
                face_mesh.invert();
            }
            acc.push(&face_mesh, face_id);
        }
    }

    if acc.indices.is_empty() {
        let merged = meshed_solid.to_polygon();
        let face_id = KernelId(*next_id);
        *next_id += 1;
        acc.push(&merged, face_id);
    }

    if acc.indices.is_empty() {
        return Err(KernelError::TessellationFailed {
            reason: "solid produced no triangles".to_string(),
        });
    }
    Ok(acc.finish())
}

/// Sample every distinct edge of a solid into a polyline.
pub fn extract_edges(solid: &TruckSolid, tolerance: f64, next_id: &mut u64) -> EdgeRenderData {
    let mut vertices: Vec<f32> = Vec::new();
    let mut edge_ranges: Vec<EdgeRange> = Vec::new();
    let mut seen_edges = HashSet::new();

    for shell in solid.boundaries().iter() {
        for edge in shell.edge_iter() {
            // Each edge is shared by two faces
            if !seen_edges.insert(edge.id()) {
                continue;
            }

            let edge_id = KernelId(*next_id);
            *next_id += 1;

            let curve = edge.oriented_curve();
            let range = curve.range_tuple();
            let (_params, points) = curve.parameter_division(range, tolerance);

            let start_vertex = (vertices.len() / 3) as u32;
            for pt in &points {
                vertices.extend_from_slice(&[pt[0] as f32, pt[1] as f32, pt[2] as f32]);
            }
            let end_vertex = (vertices.len() / 3) as u32;

            if end_vertex > start_vertex + 1 {
                edge_ranges.push(EdgeRange {
                    edge_id,
                    start_vertex,
                    end_vertex,
                });
            }
        }
    }

    EdgeRenderData {
        vertices,
        edge_ranges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives;

    #[test]
    fn test_tessellate_cylinder_covers_all_indices() {
        let solid = primitives::make_cylinder(2.0, 3.0).unwrap();
        let mut next_id = 1;
        let mesh = tessellate_solid(&solid, 0.05, &mut next_id).unwrap();

        assert!(mesh.triangle_count() > 0);
        assert_eq!(mesh.normals.len(), mesh.vertices.len());
        let covered: u32 = mesh
            .face_ranges
            .iter()
            .map(|r| r.end_index - r.start_index)
            .sum();
        assert_eq!(covered as usize, mesh.indices.len());

        let bounds = mesh.bounds().unwrap();
        assert!((bounds.min[2] + 1.5).abs() < 1e-6);
        assert!((bounds.max[2] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_tessellate_rejects_bad_tolerance() {
        let solid = primitives::make_cylinder(2.0, 3.0).unwrap();
        let mut next_id = 1;
        assert!(matches!(
            tessellate_solid(&solid, 0.0, &mut next_id),
            Err(KernelError::TessellationFailed { .. })
        ));
    }

    #[test]
    fn test_extract_edges_of_cylinder() {
        let solid = primitives::make_cylinder(2.0, 3.0).unwrap();
        let mut next_id = 1;
        let edges = extract_edges(&solid, 0.05, &mut next_id);

        assert!(!edges.edge_ranges.is_empty());
        for line in edges.polylines() {
            assert!(line.len() >= 2, "each edge polyline needs two points");
        }
    }
}
