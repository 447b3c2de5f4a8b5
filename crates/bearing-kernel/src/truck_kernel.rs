//! Real geometry kernel wrapping truck.

use std::collections::HashMap;

use tracing::{debug, instrument};
use truck_modeling::builder;
use truck_modeling::topology::{Face, Solid};
use truck_modeling::{Matrix4, Point3, Rad, Vector3};

use crate::primitives;
use crate::sweep::{swept_bounds, DiscProfile};
use crate::tessellation;
use crate::traits::{normalized, require_positive, Kernel};
use crate::transform::Transform;
use crate::types::*;

/// Tolerance handed to truck_shapeops for boolean operations.
const BOOLEAN_TOLERANCE: f64 = 0.05;
/// Rim samples and sweep steps used to bound a revolved disc.
const BOUND_SAMPLES: usize = 64;
/// Relative slack added to sampled revolve bounds.
const BOUND_SLACK: f64 = 0.01;

/// A truck solid with one enclosing box per disjoint body.
struct StoredSolid {
    solid: Solid,
    bodies: Vec<Bounds>,
}

impl StoredSolid {
    fn bounds(&self) -> Bounds {
        self.bodies
            .iter()
            .skip(1)
            .fold(self.bodies[0], |acc, b| acc.union(b))
    }

    fn touches(&self, other: &StoredSolid) -> bool {
        self.bodies
            .iter()
            .any(|a| other.bodies.iter().any(|b| a.overlaps(b)))
    }
}

/// Real geometry kernel backed by the truck BREP library.
///
/// Booleans between solids whose body boxes do not meet never reach truck: a
/// union keeps both sets of shells and a subtraction returns the minuend.
pub struct TruckKernel {
    next_handle: u64,
    next_id: u64,
    solids: HashMap<u64, StoredSolid>,
    /// Profile faces created by make_disc, awaiting revolve.
    profile_faces: HashMap<u64, (Face, DiscProfile)>,
}

impl TruckKernel {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            next_id: 1,
            solids: HashMap::new(),
            profile_faces: HashMap::new(),
        }
    }

    fn alloc_handle(&mut self) -> KernelSolidHandle {
        let h = KernelSolidHandle(self.next_handle);
        self.next_handle += 1;
        h
    }

    fn alloc_id(&mut self) -> KernelId {
        let id = KernelId(self.next_id);
        self.next_id += 1;
        id
    }

    fn store_solid(&mut self, solid: Solid, bounds: Bounds) -> KernelSolidHandle {
        self.store_bodies(solid, vec![bounds])
    }

    fn store_bodies(&mut self, solid: Solid, bodies: Vec<Bounds>) -> KernelSolidHandle {
        let handle = self.alloc_handle();
        self.solids
            .insert(handle.id(), StoredSolid { solid, bodies });
        handle
    }

    fn get(&self, handle: &KernelSolidHandle) -> Result<&StoredSolid, KernelError> {
        self.solids
            .get(&handle.id())
            .ok_or(KernelError::EntityNotFound {
                id: KernelId(handle.id()),
            })
    }

    /// Number of shells bounding a solid; disjoint unions keep one shell per body.
    pub fn shell_count(&self, handle: &KernelSolidHandle) -> Result<usize, KernelError> {
        Ok(self.get(handle)?.solid.boundaries().len())
    }

    /// Box enclosing a solid.
    pub fn bounds(&self, handle: &KernelSolidHandle) -> Result<Bounds, KernelError> {
        Ok(self.get(handle)?.bounds())
    }
}

impl Default for TruckKernel {
    fn default() -> Self {
        Self::new()
    }
}

fn to_matrix4(t: &Transform) -> Matrix4 {
    let m = &t.m;
    Matrix4::new(
        m[0], m[1], m[2], m[3], m[4], m[5], m[6], m[7], m[8], m[9], m[10], m[11], m[12], m[13],
        m[14], m[15],
    )
}

/// All shells of `a` and `b` in one solid.
fn combine_shells(a: &Solid, b: &Solid) -> Result<Solid, KernelError> {
    let shells = a
        .boundaries()
        .iter()
        .chain(b.boundaries())
        .cloned()
        .collect();
    Solid::try_new(shells).map_err(|e| KernelError::BooleanFailed {
        reason: format!("cannot combine shells: {e}"),
    })
}

/// `a` minus `b`, one cutter shell at a time.
fn subtract_shells(a: &Solid, b: &Solid) -> Result<Solid, KernelError> {
    let mut result = a.clone();
    for shell in b.boundaries() {
        let mut cutter = Solid::try_new(vec![shell.clone()]).map_err(|e| {
            KernelError::BooleanFailed {
                reason: format!("invalid cutter shell: {e}"),
            }
        })?;
        // Subtraction = A ∩ ¬B. not() mutates in place.
        cutter.not();
        result = truck_shapeops::and(&result, &cutter, BOOLEAN_TOLERANCE).ok_or_else(|| {
            KernelError::BooleanFailed {
                reason: "truck and() returned None for subtraction".to_string(),
            }
        })?;
    }
    Ok(result)
}

impl Kernel for TruckKernel {
    fn make_sphere(
        &mut self,
        center: [f64; 3],
        radius: f64,
    ) -> Result<KernelSolidHandle, KernelError> {
        require_positive("sphere radius", radius)?;
        let solid = primitives::make_sphere(center, radius)?;
        let bounds = Bounds {
            min: center.map(|c| c - radius),
            max: center.map(|c| c + radius),
        };
        Ok(self.store_solid(solid, bounds))
    }

    fn make_cylinder(
        &mut self,
        radius: f64,
        height: f64,
    ) -> Result<KernelSolidHandle, KernelError> {
        require_positive("cylinder radius", radius)?;
        require_positive("cylinder height", height)?;
        let solid = primitives::make_cylinder(radius, height)?;
        let bounds = Bounds {
            min: [-radius, -radius, -height / 2.0],
            max: [radius, radius, height / 2.0],
        };
        Ok(self.store_solid(solid, bounds))
    }

    fn make_disc(
        &mut self,
        center: [f64; 3],
        normal: [f64; 3],
        radius: f64,
    ) -> Result<KernelId, KernelError> {
        require_positive("disc radius", radius)?;
        let normal = normalized("disc normal", normal)?;
        let face = primitives::make_disc(center, normal, radius)?;
        let id = self.alloc_id();
        let profile = DiscProfile {
            center,
            normal,
            radius,
        };
        self.profile_faces.insert(id.0, (face, profile));
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
        let (truck_face, profile) = self
            .profile_faces
            .get(&face.0)
            .ok_or(KernelError::EntityNotFound { id: face })?
            .clone();

        let axis = normalized("revolve axis", axis_direction)?;
        if !angle.is_finite() || angle.abs() < 1e-12 {
            return Err(KernelError::InvalidGeometry {
                reason: format!("revolve angle must be non-zero, got {angle}"),
            });
        }

        let bounds = swept_bounds(
            &profile,
            axis_origin,
            axis,
            angle,
            BOUND_SAMPLES,
            BOUND_SAMPLES,
        )
        .ok_or(KernelError::Other {
            message: "revolve produced no samples".to_string(),
        })?;
        let slack = BOUND_SLACK * bounds.size().iter().fold(0.0, |acc: f64, s| acc.max(*s));

        let origin = Point3::new(axis_origin[0], axis_origin[1], axis_origin[2]);
        let axis = Vector3::new(axis[0], axis[1], axis[2]);
        let solid = builder::rsweep(&truck_face, origin, axis, Rad(angle));
        Ok(self.store_solid(solid, bounds.expanded(slack)))
    }

    fn boolean_union(
        &mut self,
        a: &KernelSolidHandle,
        b: &KernelSolidHandle,
    ) -> Result<KernelSolidHandle, KernelError> {
        let (a_stored, b_stored) = (self.get(a)?, self.get(b)?);

        let handle = if a_stored.touches(b_stored) {
            let bounds = a_stored.bounds().union(&b_stored.bounds());
            let result = truck_shapeops::or(&a_stored.solid, &b_stored.solid, BOOLEAN_TOLERANCE)
                .ok_or_else(|| KernelError::BooleanFailed {
                    reason: "truck or() returned None".to_string(),
                })?;
            self.store_solid(result, bounds)
        } else {
            debug!(a = a.id(), b = b.id(), "disjoint union, combining shells");
            let result = combine_shells(&a_stored.solid, &b_stored.solid)?;
            let bodies = [a_stored.bodies.as_slice(), b_stored.bodies.as_slice()].concat();
            self.store_bodies(result, bodies)
        };
        debug!(a = a.id(), b = b.id(), "union");
        Ok(handle)
    }

    fn boolean_subtract(
        &mut self,
        a: &KernelSolidHandle,
        b: &KernelSolidHandle,
    ) -> Result<KernelSolidHandle, KernelError> {
        let (a_stored, b_stored) = (self.get(a)?, self.get(b)?);

        let handle = if a_stored.touches(b_stored) {
            let bounds = a_stored.bounds();
            let result = subtract_shells(&a_stored.solid, &b_stored.solid)?;
            self.store_solid(result, bounds)
        } else {
            debug!(a = a.id(), b = b.id(), "cutter misses, keeping minuend");
            let (solid, bodies) = (a_stored.solid.clone(), a_stored.bodies.clone());
            self.store_bodies(solid, bodies)
        };
        debug!(a = a.id(), b = b.id(), "subtract");
        Ok(handle)
    }

    fn transform(
        &mut self,
        solid: &KernelSolidHandle,
        transform: &Transform,
    ) -> Result<KernelSolidHandle, KernelError> {
        let stored = self.get(solid)?;
        let moved = builder::transformed(&stored.solid, to_matrix4(transform));
        let bodies = stored
            .bodies
            .iter()
            .map(|b| b.transformed(transform))
            .collect();
        Ok(self.store_bodies(moved, bodies))
    }

    fn tessellate(
        &mut self,
        solid: &KernelSolidHandle,
        tolerance: f64,
    ) -> Result<RenderMesh, KernelError> {
        let stored = self
            .solids
            .get(&solid.id())
            .ok_or(KernelError::EntityNotFound {
                id: KernelId(solid.id()),
            })?;

        tessellation::tessellate_solid(&stored.solid, tolerance, &mut self.next_id)
    }

    fn extract_edges(
        &mut self,
        solid: &KernelSolidHandle,
        tolerance: f64,
    ) -> Result<EdgeRenderData, KernelError> {
        require_positive("edge tolerance", tolerance)?;
        let stored = self
            .solids
            .get(&solid.id())
            .ok_or(KernelError::EntityNotFound {
                id: KernelId(solid.id()),
            })?;

        Ok(tessellation::extract_edges(
            &stored.solid,
            tolerance,
            &mut self.next_id,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    #[test]
    fn test_truck_kernel_rejects_degenerate_primitives() {
        let mut kernel = TruckKernel::new();
        assert!(matches!(
            kernel.make_cylinder(-1.0, 2.0),
            Err(KernelError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            kernel.make_sphere([0.0; 3], 0.0),
            Err(KernelError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            kernel.make_disc([0.0; 3], [0.0; 3], 1.0),
            Err(KernelError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_truck_kernel_unknown_handle() {
        let mut kernel = TruckKernel::new();
        let bogus = KernelSolidHandle(99);
        assert!(matches!(
            kernel.tessellate(&bogus, 0.1),
            Err(KernelError::EntityNotFound { .. })
        ));
    }

    #[test]
    fn test_truck_kernel_store_and_tessellate_cylinder() {
        let mut kernel = TruckKernel::new();
        let handle = kernel.make_cylinder(1.0, 1.0).unwrap();

        let mesh = kernel.tessellate(&handle, 0.1).unwrap();

        assert!(!mesh.vertices.is_empty(), "Mesh should have vertices");
        assert!(!mesh.indices.is_empty(), "Mesh should have indices");
        assert!(!mesh.normals.is_empty(), "Mesh should have normals");

        let covered: u32 = mesh
            .face_ranges
            .iter()
            .map(|r| r.end_index - r.start_index)
            .sum();
        assert_eq!(
            covered,
            mesh.indices.len() as u32,
            "Face ranges should cover all indices"
        );
    }

    #[test]
    fn test_truck_kernel_transform_translates_mesh() {
        let mut kernel = TruckKernel::new();
        let cyl = kernel.make_cylinder(1.0, 2.0).unwrap();
        let moved = kernel
            .transform(&cyl, &Transform::translation(50.0, 0.0, 0.0))
            .unwrap();

        let before = kernel.tessellate(&cyl, 0.1).unwrap().bounds().unwrap();
        let after = kernel.tessellate(&moved, 0.1).unwrap().bounds().unwrap();
        assert!((after.center()[0] - before.center()[0] - 50.0).abs() < 1e-4);
        assert!((after.center()[2] - before.center()[2]).abs() < 1e-4);
    }

    #[test]
    fn test_truck_kernel_revolve_disc_into_torus() {
        let mut kernel = TruckKernel::new();
        let disc = kernel
            .make_disc([0.0, 10.0, 0.0], [0.0, 0.0, 1.0], 1.0)
            .unwrap();
        let torus = kernel
            .revolve_face(disc, [0.0; 3], [1.0, 0.0, 0.0], TAU)
            .unwrap();

        // Revolving about X keeps x within the disc radius
        let b = kernel.tessellate(&torus, 0.05).unwrap().bounds().unwrap();
        assert!(b.max[0] <= 1.0 + 1e-3);
        assert!(b.min[0] >= -1.0 - 1e-3);
        assert!((b.max[1] - 11.0).abs() < 0.1);
        assert!((b.max[2] - 11.0).abs() < 0.1);

        // The profile face survives and can be swept again
        assert!(kernel
            .revolve_face(disc, [0.0; 3], [1.0, 0.0, 0.0], TAU / 8.0)
            .is_ok());
    }

    #[test]
    fn test_truck_kernel_zero_revolve_rejected() {
        let mut kernel = TruckKernel::new();
        let disc = kernel
            .make_disc([0.0, 10.0, 0.0], [0.0, 0.0, 1.0], 1.0)
            .unwrap();
        assert!(matches!(
            kernel.revolve_face(disc, [0.0; 3], [1.0, 0.0, 0.0], 0.0),
            Err(KernelError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_truck_kernel_makes_sphere() {
        let mut kernel = TruckKernel::new();
        let ball = kernel.make_sphere([20.0, 0.0, 0.0], 2.05).unwrap();
        assert_eq!(kernel.shell_count(&ball).unwrap(), 1);

        let b = kernel.bounds(&ball).unwrap();
        assert!((b.min[0] - 17.95).abs() < 1e-12);
        assert!((b.max[2] - 2.05).abs() < 1e-12);
    }

    #[test]
    fn test_truck_kernel_disjoint_spheres_union() {
        let mut kernel = TruckKernel::new();
        let a = kernel.make_sphere([20.0, 0.0, 0.0], 2.05).unwrap();
        let b = kernel.make_sphere([-20.0, 0.0, 0.0], 2.05).unwrap();
        let both = kernel.boolean_union(&a, &b).unwrap();

        assert_eq!(kernel.shell_count(&both).unwrap(), 2);
        let bounds = kernel.bounds(&both).unwrap();
        assert!((bounds.min[0] + 22.05).abs() < 1e-12);
        assert!((bounds.max[0] - 22.05).abs() < 1e-12);
    }

    #[test]
    fn test_truck_kernel_ball_ring_union_stays_disjoint() {
        // Once the ring closes, the combined box covers every later ball
        let mut kernel = TruckKernel::new();
        let balls: Vec<_> = (0..8)
            .map(|i| {
                let angle = (i as f64 * 45.0_f64).to_radians();
                let center = [20.0 * angle.cos(), 20.0 * angle.sin(), 0.0];
                kernel.make_sphere(center, 2.05).unwrap()
            })
            .collect();
        let ring = crate::union_all(&mut kernel, &balls).unwrap();

        assert_eq!(kernel.shell_count(&ring).unwrap(), 8);

        // Inside the ring's box but clear of every ball
        let hub = kernel.make_sphere([0.0; 3], 1.0).unwrap();
        let with_hub = kernel.boolean_union(&ring, &hub).unwrap();
        assert_eq!(kernel.shell_count(&with_hub).unwrap(), 9);

        let lifted = kernel
            .transform(&ring, &Transform::translation(0.0, 0.0, 1.0))
            .unwrap();
        let b = kernel.bounds(&lifted).unwrap();
        assert!((b.max[2] - 3.05).abs() < 1e-9);
    }

    #[test]
    fn test_truck_kernel_subtract_missing_cutter_keeps_minuend() {
        let mut kernel = TruckKernel::new();
        let blank = kernel.make_cylinder(5.0, 2.0).unwrap();
        let ball = kernel.make_sphere([0.0, 0.0, 10.0], 1.0).unwrap();
        let kept = kernel.boolean_subtract(&blank, &ball).unwrap();

        assert_eq!(kernel.shell_count(&kept).unwrap(), 1);
        assert_eq!(kernel.bounds(&kept).unwrap(), kernel.bounds(&blank).unwrap());
    }

    #[test]
    fn test_truck_kernel_annulus_subtract() {
        let mut kernel = TruckKernel::new();
        let outer = kernel.make_cylinder(21.25, 4.0).unwrap();
        // Taller cutter keeps its caps off the blank's caps
        let inner = kernel.make_cylinder(18.75, 6.0).unwrap();
        let ring = kernel.boolean_subtract(&outer, &inner).unwrap();

        let mesh = kernel.tessellate(&ring, 0.1).unwrap();
        assert!(!mesh.is_empty());
        for p in mesh.vertices.chunks_exact(3) {
            let r = (p[0] as f64).hypot(p[1] as f64);
            assert!(r > 18.75 - 0.01 && r < 21.25 + 0.01, "vertex at radius {r}");
            assert!((p[2] as f64).abs() < 2.0 + 1e-4);
        }
    }
}
