//! Mesh geometry kernel backed by csgrs.
//!
//! Primitives are faceted when they are created, so every chord stays within the
//! kernel's chord tolerance. Booleans run on polygon BSP trees and succeed on
//! tangent and coplanar faces alike.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::TAU;

use csgrs::csg::CSG;
use csgrs::polygon::Polygon;
use csgrs::vertex::Vertex;
use nalgebra::{Point3, Vector3};
use tracing::{debug, instrument};

use crate::sweep::{dot, rotation_about_line, sub, DiscProfile};
use crate::traits::{normalized, require_positive, Kernel};
use crate::transform::Transform;
use crate::types::*;

type Mesh = CSG<()>;

/// Default chord tolerance used when faceting primitives, in millimeters.
pub const DEFAULT_CHORD_TOLERANCE: f64 = 0.05;

/// Fewest facets around a closed circle.
const MIN_SEGMENTS: usize = 8;
const MAX_SEGMENTS: usize = 256;
/// Dihedral angle above which a shared polygon edge counts as a drawn edge.
const FEATURE_ANGLE_DEGREES: f64 = 30.0;
/// Grid spacing used to match polygon corners when collecting edges.
const WELD_SPACING: f64 = 1e-6;

/// Geometry kernel working on faceted polygon meshes.
pub struct CsgKernel {
    chord_tolerance: f64,
    next_handle: u64,
    next_id: u64,
    solids: HashMap<u64, Mesh>,
    discs: HashMap<u64, DiscProfile>,
}

impl CsgKernel {
    pub fn new() -> Self {
        Self {
            chord_tolerance: DEFAULT_CHORD_TOLERANCE,
            next_handle: 1,
            next_id: 1,
            solids: HashMap::new(),
            discs: HashMap::new(),
        }
    }

    /// Chord tolerance for primitives created from now on.
    pub fn with_chord_tolerance(mut self, tolerance: f64) -> Result<Self, KernelError> {
        require_positive("chord tolerance", tolerance)?;
        self.chord_tolerance = tolerance;
        Ok(self)
    }

    pub fn chord_tolerance(&self) -> f64 {
        self.chord_tolerance
    }

    /// Number of polygons a solid is made of.
    pub fn polygon_count(&self, handle: &KernelSolidHandle) -> Result<usize, KernelError> {
        Ok(self.get(handle)?.polygons.len())
    }

    fn alloc_id(&mut self) -> KernelId {
        let id = KernelId(self.next_id);
        self.next_id += 1;
        id
    }

    fn store(&mut self, mesh: Mesh) -> KernelSolidHandle {
        let handle = KernelSolidHandle(self.next_handle);
        self.next_handle += 1;
        self.solids.insert(handle.id(), mesh);
        handle
    }

    fn get(&self, handle: &KernelSolidHandle) -> Result<&Mesh, KernelError> {
        self.solids
            .get(&handle.id())
            .ok_or(KernelError::EntityNotFound {
                id: KernelId(handle.id()),
            })
    }

    fn segments(&self, radius: f64, angle: f64, min: usize) -> usize {
        segments_for(radius, angle, self.chord_tolerance, min)
    }
}

impl Default for CsgKernel {
    fn default() -> Self {
        Self::new()
    }
}

/// Facets needed so chords of a `radius` arc spanning `angle` stay within `tolerance`.
fn segments_for(radius: f64, angle: f64, tolerance: f64, min: usize) -> usize {
    let step = 2.0 * (1.0 - tolerance / radius).clamp(-1.0, 1.0).acos();
    let needed = if step > 0.0 {
        (angle.abs() / step).ceil() as usize
    } else {
        MAX_SEGMENTS
    };
    needed.clamp(min, MAX_SEGMENTS)
}

fn to_array(p: &Point3<f64>) -> [f64; 3] {
    [p.x, p.y, p.z]
}

/// Newell normal of a polygon outline, unit length, or `None` when degenerate.
fn newell_normal(points: &[[f64; 3]]) -> Option<[f64; 3]> {
    let mut n = [0.0; 3];
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        n[0] += (a[1] - b[1]) * (a[2] + b[2]);
        n[1] += (a[2] - b[2]) * (a[0] + b[0]);
        n[2] += (a[0] - b[0]) * (a[1] + b[1]);
    }
    let len = dot(n, n).sqrt();
    (len > 1e-12).then(|| n.map(|v| v / len))
}

/// Flat polygon through `points`, wound so its normal points along `outward`.
fn facet(points: &[[f64; 3]], outward: [f64; 3]) -> Option<Polygon<()>> {
    let mut points = points.to_vec();
    let mut normal = newell_normal(&points)?;
    if dot(normal, outward) < 0.0 {
        points.reverse();
        normal = normal.map(|v| -v);
    }
    let vertices = points
        .iter()
        .map(|p| {
            Vertex::new(
                Point3::new(p[0], p[1], p[2]),
                Vector3::new(normal[0], normal[1], normal[2]),
            )
        })
        .collect();
    Some(Polygon::new(vertices, None))
}

fn transformed(mesh: &Mesh, transform: &Transform) -> Mesh {
    let polygons: Vec<Polygon<()>> = mesh
        .polygons
        .iter()
        .map(|poly| {
            let vertices = poly
                .vertices
                .iter()
                .map(|v| {
                    let p = transform.transform_point(to_array(&v.pos));
                    let n = transform.transform_vector([v.normal.x, v.normal.y, v.normal.z]);
                    Vertex::new(
                        Point3::new(p[0], p[1], p[2]),
                        Vector3::new(n[0], n[1], n[2]),
                    )
                })
                .collect();
            Polygon::new(vertices, None)
        })
        .collect();
    CSG::from_polygons(&polygons)
}

fn mesh_bounds(mesh: &Mesh) -> Option<Bounds> {
    Bounds::from_points(
        mesh.polygons
            .iter()
            .flat_map(|poly| poly.vertices.iter().map(|v| to_array(&v.pos))),
    )
}

/// True unless both meshes have bounds and the bounds miss each other.
fn may_touch(a: &Mesh, b: &Mesh) -> bool {
    match (mesh_bounds(a), mesh_bounds(b)) {
        (Some(a), Some(b)) => a.overlaps(&b),
        _ => true,
    }
}

fn weld_key(p: [f64; 3]) -> [i64; 3] {
    p.map(|v| (v / WELD_SPACING).round() as i64)
}

/// An undirected polygon edge and the normals of the polygons sharing it.
struct SharedEdge {
    from: [f64; 3],
    to: [f64; 3],
    normals: Vec<[f64; 3]>,
}

impl Kernel for CsgKernel {
    #[instrument(level = "debug", skip(self))]
    fn make_sphere(
        &mut self,
        center: [f64; 3],
        radius: f64,
    ) -> Result<KernelSolidHandle, KernelError> {
        require_positive("sphere radius", radius)?;
        let slices = self.segments(radius, TAU, MIN_SEGMENTS);
        let stacks = (slices / 2).max(MIN_SEGMENTS / 2);
        let ball = Mesh::sphere(radius, slices, stacks, None);
        let ball = transformed(
            &ball,
            &Transform::translation(center[0], center[1], center[2]),
        );
        Ok(self.store(ball))
    }

    #[instrument(level = "debug", skip(self))]
    fn make_cylinder(
        &mut self,
        radius: f64,
        height: f64,
    ) -> Result<KernelSolidHandle, KernelError> {
        require_positive("cylinder radius", radius)?;
        require_positive("cylinder height", height)?;
        let n = self.segments(radius, TAU, MIN_SEGMENTS);
        let (z0, z1) = (-height / 2.0, height / 2.0);
        let rim: Vec<[f64; 2]> = (0..n)
            .map(|k| {
                let (s, c) = (TAU * k as f64 / n as f64).sin_cos();
                [radius * c, radius * s]
            })
            .collect();

        let bottom: Vec<[f64; 3]> = rim.iter().map(|p| [p[0], p[1], z0]).collect();
        let top: Vec<[f64; 3]> = rim.iter().map(|p| [p[0], p[1], z1]).collect();
        let mut polygons = Vec::with_capacity(n + 2);
        polygons.extend(facet(&bottom, [0.0, 0.0, -1.0]));
        polygons.extend(facet(&top, [0.0, 0.0, 1.0]));
        for k in 0..n {
            let k1 = (k + 1) % n;
            let outward = [rim[k][0] + rim[k1][0], rim[k][1] + rim[k1][1], 0.0];
            polygons.extend(facet(&[bottom[k], bottom[k1], top[k1], top[k]], outward));
        }
        Ok(self.store(CSG::from_polygons(&polygons)))
    }

    fn make_disc(
        &mut self,
        center: [f64; 3],
        normal: [f64; 3],
        radius: f64,
    ) -> Result<KernelId, KernelError> {
        require_positive("disc radius", radius)?;
        let normal = normalized("disc normal", normal)?;
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

    #[instrument(level = "debug", skip(self))]
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

        let closed = angle.abs() >= TAU - 1e-9;
        let offset = sub(disc.center, axis_origin);
        let along = dot(offset, axis);
        let reach = dot(offset, offset) - along * along;
        let sweep_radius = reach.max(0.0).sqrt() + disc.radius;

        let rim = disc.rim(self.segments(disc.radius, TAU, MIN_SEGMENTS));
        let steps = self.segments(
            sweep_radius,
            angle,
            if closed { MIN_SEGMENTS } else { 1 },
        );
        let stations = if closed { steps } else { steps + 1 };
        let (rings, cores): (Vec<Vec<[f64; 3]>>, Vec<[f64; 3]>) = (0..stations)
            .map(|j| {
                let rot = rotation_about_line(axis_origin, axis, angle * j as f64 / steps as f64);
                let ring = rim.iter().map(|&p| rot.transform_point(p)).collect();
                (ring, rot.transform_point(disc.center))
            })
            .unzip();

        let mut polygons = Vec::new();
        for j in 0..steps {
            let j1 = (j + 1) % stations;
            let core = [
                (cores[j][0] + cores[j1][0]) / 2.0,
                (cores[j][1] + cores[j1][1]) / 2.0,
                (cores[j][2] + cores[j1][2]) / 2.0,
            ];
            for k in 0..rim.len() {
                let k1 = (k + 1) % rim.len();
                let (a, b) = (rings[j][k], rings[j][k1]);
                let (c, d) = (rings[j1][k1], rings[j1][k]);
                // Swept quads twist, so split them into flat triangles
                for tri in [[a, b, c], [a, c, d]] {
                    let centroid = [
                        (tri[0][0] + tri[1][0] + tri[2][0]) / 3.0,
                        (tri[0][1] + tri[1][1] + tri[2][1]) / 3.0,
                        (tri[0][2] + tri[1][2] + tri[2][2]) / 3.0,
                    ];
                    polygons.extend(facet(&tri, sub(centroid, core)));
                }
            }
        }
        if !closed {
            polygons.extend(facet(&rings[0], sub(cores[0], cores[1])));
            polygons.extend(facet(
                &rings[steps],
                sub(cores[steps], cores[steps - 1]),
            ));
        }
        debug!(steps, rim = rim.len(), closed, "disc revolved");
        Ok(self.store(CSG::from_polygons(&polygons)))
    }

    fn boolean_union(
        &mut self,
        a: &KernelSolidHandle,
        b: &KernelSolidHandle,
    ) -> Result<KernelSolidHandle, KernelError> {
        let (mesh_a, mesh_b) = (self.get(a)?, self.get(b)?);
        let result = if may_touch(mesh_a, mesh_b) {
            mesh_a.union(mesh_b)
        } else {
            debug!(a = a.id(), b = b.id(), "disjoint union, concatenating polygons");
            let polygons: Vec<Polygon<()>> = mesh_a
                .polygons
                .iter()
                .chain(&mesh_b.polygons)
                .cloned()
                .collect();
            CSG::from_polygons(&polygons)
        };
        Ok(self.store(result))
    }

    fn boolean_subtract(
        &mut self,
        a: &KernelSolidHandle,
        b: &KernelSolidHandle,
    ) -> Result<KernelSolidHandle, KernelError> {
        let (mesh_a, mesh_b) = (self.get(a)?, self.get(b)?);
        let result = if may_touch(mesh_a, mesh_b) {
            mesh_a.difference(mesh_b)
        } else {
            debug!(a = a.id(), b = b.id(), "cutter misses, keeping minuend");
            mesh_a.clone()
        };
        if result.polygons.is_empty() {
            return Err(KernelError::BooleanFailed {
                reason: "subtraction removed the whole solid".to_string(),
            });
        }
        Ok(self.store(result))
    }

    fn transform(
        &mut self,
        solid: &KernelSolidHandle,
        transform: &Transform,
    ) -> Result<KernelSolidHandle, KernelError> {
        let moved = transformed(self.get(solid)?, transform);
        Ok(self.store(moved))
    }

    fn tessellate(
        &mut self,
        solid: &KernelSolidHandle,
        tolerance: f64,
    ) -> Result<RenderMesh, KernelError> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(KernelError::TessellationFailed {
                reason: format!("tolerance must be positive, got {tolerance}"),
            });
        }
        let polygons: Vec<Vec<[f64; 3]>> = self
            .get(solid)?
            .polygons
            .iter()
            .map(|poly| poly.vertices.iter().map(|v| to_array(&v.pos)).collect())
            .collect();

        let mut mesh = RenderMesh::default();
        for points in &polygons {
            // Convex outlines fan out from their first corner
            let Some(normal) = newell_normal(points) else {
                continue;
            };
            let start_index = mesh.indices.len() as u32;
            let base = mesh.vertex_count() as u32;
            for p in points {
                mesh.vertices.extend(p.map(|v| v as f32));
                mesh.normals.extend(normal.map(|v| v as f32));
            }
            for k in 1..points.len() as u32 - 1 {
                mesh.indices.extend([base, base + k, base + k + 1]);
            }
            let face_id = self.alloc_id();
            mesh.face_ranges.push(FaceRange {
                face_id,
                start_index,
                end_index: mesh.indices.len() as u32,
            });
        }

        if mesh.indices.is_empty() {
            return Err(KernelError::TessellationFailed {
                reason: "solid produced no triangles".to_string(),
            });
        }
        Ok(mesh)
    }

    fn extract_edges(
        &mut self,
        solid: &KernelSolidHandle,
        tolerance: f64,
    ) -> Result<EdgeRenderData, KernelError> {
        require_positive("edge tolerance", tolerance)?;
        let mut shared: BTreeMap<([i64; 3], [i64; 3]), SharedEdge> = BTreeMap::new();
        for poly in &self.get(solid)?.polygons {
            let points: Vec<[f64; 3]> = poly.vertices.iter().map(|v| to_array(&v.pos)).collect();
            let Some(normal) = newell_normal(&points) else {
                continue;
            };
            for (i, &from) in points.iter().enumerate() {
                let to = points[(i + 1) % points.len()];
                let (ka, kb) = (weld_key(from), weld_key(to));
                if ka == kb {
                    continue;
                }
                let key = if ka < kb { (ka, kb) } else { (kb, ka) };
                shared
                    .entry(key)
                    .or_insert_with(|| SharedEdge {
                        from,
                        to,
                        normals: Vec::new(),
                    })
                    .normals
                    .push(normal);
            }
        }

        // Edges seen once sit on T-junctions left by polygon splitting
        let crease = FEATURE_ANGLE_DEGREES.to_radians().cos();
        let mut edges = EdgeRenderData::default();
        for edge in shared.values() {
            let drawn = match edge.normals.as_slice() {
                [a, b] => dot(*a, *b) < crease,
                [_] => false,
                _ => true,
            };
            if !drawn {
                continue;
            }
            let start_vertex = (edges.vertices.len() / 3) as u32;
            for p in [edge.from, edge.to] {
                edges.vertices.extend(p.map(|v| v as f32));
            }
            let edge_id = self.alloc_id();
            edges.edge_ranges.push(EdgeRange {
                edge_id,
                start_vertex,
                end_vertex: start_vertex + 2,
            });
        }
        Ok(edges)
    }
}
