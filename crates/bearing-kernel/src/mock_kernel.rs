//! Deterministic test double implementing Kernel.
//!
//! Solids are lists of bodies, each with a tracked center and an axis-aligned
//! bounding box. Every call is appended to an operation log so tests can check
//! the exact construction sequence a caller issued.

use std::collections::HashMap;

use crate::sweep::{swept_bounds, DiscProfile};
use crate::traits::{normalized, require_positive, Kernel};
use crate::transform::Transform;
use crate::types::*;

/// Rim samples used to bound a revolved disc.
const RIM_SAMPLES: usize = 32;
/// Angular steps used to bound a revolved disc.
const SWEEP_STEPS: usize = 32;

/// Kind of primitive a mock body originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBodyKind {
    Sphere,
    Cylinder,
    Revolution,
}

/// One body inside a mock solid.
#[derive(Debug, Clone, PartialEq)]
pub struct MockBody {
    pub kind: MockBodyKind,
    /// Placement of the body's reference point (sphere center, cylinder axis midpoint,
    /// revolve axis origin), carried through transforms.
    pub center: [f64; 3],
    pub bounds: Bounds,
}

/// A recorded kernel call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOp {
    Sphere { center: [f64; 3], radius: f64 },
    Cylinder { radius: f64, height: f64 },
    Disc { center: [f64; 3], normal: [f64; 3], radius: f64 },
    Revolve { face: KernelId, angle: f64 },
    Union,
    Subtract,
    Transform(Transform),
    Tessellate,
    ExtractEdges,
}

/// Deterministic test double for the geometry kernel.
pub struct MockKernel {
    next_id: u64,
    next_handle: u64,
    solids: HashMap<u64, Vec<MockBody>>,
    discs: HashMap<u64, DiscProfile>,
    ops: Vec<MockOp>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            next_handle: 1,
            solids: HashMap::new(),
            discs: HashMap::new(),
            ops: Vec::new(),
        }
    }

    fn alloc_id(&mut self) -> KernelId {
        let id = KernelId(self.next_id);
        self.next_id += 1;
        id
    }

    fn alloc_handle(&mut self) -> KernelSolidHandle {
        let h = KernelSolidHandle(self.next_handle);
        self.next_handle += 1;
        h
    }

    fn store(&mut self, bodies: Vec<MockBody>) -> KernelSolidHandle {
        let handle = self.alloc_handle();
        self.solids.insert(handle.id(), bodies);
        handle
    }

    /// Every kernel call issued so far, in order.
    pub fn operations(&self) -> &[MockOp] {
        &self.ops
    }

    /// The bodies making up a solid.
    pub fn bodies(&self, solid: &KernelSolidHandle) -> Result<&[MockBody], KernelError> {
        self.solids
            .get(&solid.id())
            .map(Vec::as_slice)
            .ok_or(KernelError::EntityNotFound {
                id: KernelId(solid.id()),
            })
    }

    /// Overall bounds of a solid.
    pub fn bounds(&self, solid: &KernelSolidHandle) -> Result<Bounds, KernelError> {
        let bodies = self.bodies(solid)?;
        bodies
            .iter()
            .map(|b| b.bounds)
            .reduce(|a, b| a.union(&b))
            .ok_or(KernelError::InvalidGeometry {
                reason: "solid has no bodies".to_string(),
            })
    }

    /// Closed box mesh per body: 8 vertices, 12 outward-wound triangles.
    fn tessellate_boxes(&mut self, bodies: &[MockBody]) -> RenderMesh {
        let mut vertices = Vec::new();
        let mut normals = Vec::new();
        let mut indices = Vec::new();
        let mut face_ranges = Vec::new();

        // Quads over Bounds::corners(), counter-clockwise seen from outside
        const QUADS: [[u32; 4]; 6] = [
            [0, 3, 2, 1], // bottom (z = min)
            [4, 5, 6, 7], // top    (z = max)
            [0, 1, 5, 4], // front  (y = min)
            [2, 3, 7, 6], // back   (y = max)
            [0, 4, 7, 3], // left   (x = min)
            [1, 2, 6, 5], // right  (x = max)
        ];

        for body in bodies {
            let base = (vertices.len() / 3) as u32;
            let c = body.bounds.center();
            for p in body.bounds.corners() {
                vertices.extend_from_slice(&[p[0] as f32, p[1] as f32, p[2] as f32]);
                let d = [p[0] - c[0], p[1] - c[1], p[2] - c[2]];
                let len = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt().max(1e-12);
                normals.extend_from_slice(&[
                    (d[0] / len) as f32,
                    (d[1] / len) as f32,
                    (d[2] / len) as f32,
                ]);
            }
            for quad in QUADS {
                let start_index = indices.len() as u32;
                indices.extend_from_slice(&[
                    base + quad[0],
                    base + quad[1],
                    base + quad[2],
                    base + quad[0],
                    base + quad[2],
                    base + quad[3],
                ]);
                face_ranges.push(FaceRange {
                    face_id: self.alloc_id(),
                    start_index,
                    end_index: indices.len() as u32,
                });
            }
        }

        RenderMesh {
            vertices,
            normals,
            indices,
            face_ranges,
        }
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel for MockKernel {
    fn make_sphere(
        &mut self,
        center: [f64; 3],
        radius: f64,
    ) -> Result<KernelSolidHandle, KernelError> {
        require_positive("sphere radius", radius)?;
        self.ops.push(MockOp::Sphere { center, radius });
        let bounds = Bounds {
            min: [center[0] - radius, center[1] - radius, center[2] - radius],
            max: [center[0] + radius, center[1] + radius, center[2] + radius],
        };
        Ok(self.store(vec![MockBody {
            kind: MockBodyKind::Sphere,
            center,
            bounds,
        }]))
    }

    fn make_cylinder(
        &mut self,
        radius: f64,
        height: f64,
    ) -> Result<KernelSolidHandle, KernelError> {
        require_positive("cylinder radius", radius)?;
        require_positive("cylinder height", height)?;
        self.ops.push(MockOp::Cylinder { radius, height });
        let bounds = Bounds {
            min: [-radius, -radius, -height / 2.0],
            max: [radius, radius, height / 2.0],
        };
        Ok(self.store(vec![MockBody {
            kind: MockBodyKind::Cylinder,
            center: [0.0; 3],
            bounds,
        }]))
    }

    fn make_disc(
        &mut self,
        center: [f64; 3],
        normal: [f64; 3],
        radius: f64,
    ) -> Result<KernelId, KernelError> {
        require_positive("disc radius", radius)?;
        let normal = normalized("disc normal", normal)?;
        self.ops.push(MockOp::Disc {
            center,
            normal,
            radius,
        });
        let id = self.alloc_id();
        self.discs.insert(
            id.0,
            DiscProfile {
                center,
                normal,
                radius,
            },
        );
        Ok(id)
    }

    fn revolve_face(
        &mut self,
        face: KernelId,
        axis_origin: [f64; 3],
        axis_direction: [f64; 3],
        angle: f64,
    ) -> Result<KernelSolidHandle, KernelError> {
        let disc = *self
            .discs
            .get(&face.0)
            .ok_or(KernelError::EntityNotFound { id: face })?;
        let axis = normalized("revolve axis", axis_direction)?;
        if !angle.is_finite() || angle.abs() < 1e-12 {
            return Err(KernelError::InvalidGeometry {
                reason: format!("revolve angle must be non-zero, got {angle}"),
            });
        }
        self.ops.push(MockOp::Revolve { face, angle });

        let bounds = swept_bounds(&disc, axis_origin, axis, angle, RIM_SAMPLES, SWEEP_STEPS)
            .ok_or(KernelError::Other {
                message: "revolve produced no samples".to_string(),
            })?;

        Ok(self.store(vec![MockBody {
            kind: MockBodyKind::Revolution,
            center: axis_origin,
            bounds,
        }]))
    }

    fn boolean_union(
        &mut self,
        a: &KernelSolidHandle,
        b: &KernelSolidHandle,
    ) -> Result<KernelSolidHandle, KernelError> {
        let mut merged = self.bodies(a)?.to_vec();
        merged.extend_from_slice(self.bodies(b)?);
        self.ops.push(MockOp::Union);
        Ok(self.store(merged))
    }

    fn boolean_subtract(
        &mut self,
        a: &KernelSolidHandle,
        b: &KernelSolidHandle,
    ) -> Result<KernelSolidHandle, KernelError> {
        // The cutter must exist even though the mock keeps A unchanged
        self.bodies(b)?;
        let kept = self.bodies(a)?.to_vec();
        self.ops.push(MockOp::Subtract);
        Ok(self.store(kept))
    }

    fn transform(
        &mut self,
        solid: &KernelSolidHandle,
        transform: &Transform,
    ) -> Result<KernelSolidHandle, KernelError> {
        let moved: Vec<MockBody> = self
            .bodies(solid)?
            .iter()
            .map(|body| MockBody {
                kind: body.kind,
                center: transform.transform_point(body.center),
                bounds: body.bounds.transformed(transform),
            })
            .collect();
        self.ops.push(MockOp::Transform(*transform));
        Ok(self.store(moved))
    }

    fn tessellate(
        &mut self,
        solid: &KernelSolidHandle,
        _tolerance: f64,
    ) -> Result<RenderMesh, KernelError> {
        let bodies = self.bodies(solid)?.to_vec();
        self.ops.push(MockOp::Tessellate);
        Ok(self.tessellate_boxes(&bodies))
    }

    fn extract_edges(
        &mut self,
        solid: &KernelSolidHandle,
        _tolerance: f64,
    ) -> Result<EdgeRenderData, KernelError> {
        const EDGES: [(usize, usize); 12] = [
            (0, 1),
            (1, 2),
            (2, 3),
            (3, 0),
            (4, 5),
            (5, 6),
            (6, 7),
            (7, 4),
            (0, 4),
            (1, 5),
            (2, 6),
            (3, 7),
        ];

        let bodies = self.bodies(solid)?.to_vec();
        self.ops.push(MockOp::ExtractEdges);

        let mut vertices = Vec::new();
        let mut edge_ranges = Vec::new();
        for body in &bodies {
            let corners = body.bounds.corners();
            for (s, e) in EDGES {
                let start_vertex = (vertices.len() / 3) as u32;
                for p in [corners[s], corners[e]] {
                    vertices.extend_from_slice(&[p[0] as f32, p[1] as f32, p[2] as f32]);
                }
                edge_ranges.push(EdgeRange {
                    edge_id: self.alloc_id(),
                    start_vertex,
                    end_vertex: start_vertex + 2,
                });
            }
        }

        Ok(EdgeRenderData {
            vertices,
            edge_ranges,
        })
    }
}
