use crate::transform::Transform;
use crate::types::*;

/// Geometry kernel capability set used to construct and serialize the bearing.
/// Implemented by CsgKernel (faceted meshes), TruckKernel (exact B-rep on truck)
/// and MockKernel (deterministic test double).
///
/// Angles are in radians. Every failure is reported as a `KernelError`; callers
/// propagate it unchanged.
pub trait Kernel {
    /// Sphere of `radius` centered at `center`.
    fn make_sphere(
        &mut self,
        center: [f64; 3],
        radius: f64,
    ) -> Result<KernelSolidHandle, KernelError>;

    /// Cylinder of `radius` and `height` along Z, centered on the origin
    /// (spans z in [-height/2, height/2]).
    fn make_cylinder(&mut self, radius: f64, height: f64)
        -> Result<KernelSolidHandle, KernelError>;

    /// Planar disc profile face, for use with `revolve_face`.
    /// The face stays available after a revolve and can be swept again.
    fn make_disc(
        &mut self,
        center: [f64; 3],
        normal: [f64; 3],
        radius: f64,
    ) -> Result<KernelId, KernelError>;

    /// Revolve a planar face around an axis by `angle` radians.
    fn revolve_face(
        &mut self,
        face: KernelId,
        axis_origin: [f64; 3],
        axis_direction: [f64; 3],
        angle: f64,
    ) -> Result<KernelSolidHandle, KernelError>;

    /// Boolean union of two solids.
    fn boolean_union(
        &mut self,
        a: &KernelSolidHandle,
        b: &KernelSolidHandle,
    ) -> Result<KernelSolidHandle, KernelError>;

    /// Boolean subtraction: a minus b.
    fn boolean_subtract(
        &mut self,
        a: &KernelSolidHandle,
        b: &KernelSolidHandle,
    ) -> Result<KernelSolidHandle, KernelError>;

    /// A transformed copy of `solid`. The input handle stays valid.
    fn transform(
        &mut self,
        solid: &KernelSolidHandle,
        transform: &Transform,
    ) -> Result<KernelSolidHandle, KernelError>;

    /// Tessellate a solid to a triangle mesh.
    fn tessellate(
        &mut self,
        solid: &KernelSolidHandle,
        tolerance: f64,
    ) -> Result<RenderMesh, KernelError>;

    /// Sample every edge of a solid into a polyline.
    fn extract_edges(
        &mut self,
        solid: &KernelSolidHandle,
        tolerance: f64,
    ) -> Result<EdgeRenderData, KernelError>;
}

/// Fold a non-empty list of solids into one with `boolean_union`.
pub fn union_all<K: Kernel + ?Sized>(
    kernel: &mut K,
    solids: &[KernelSolidHandle],
) -> Result<KernelSolidHandle, KernelError> {
    let (first, rest) = solids.split_first().ok_or_else(|| KernelError::InvalidGeometry {
        reason: "union of an empty solid list".to_string(),
    })?;
    let mut acc = first.clone();
    for solid in rest {
        acc = kernel.boolean_union(&acc, solid)?;
    }
    Ok(acc)
}

pub(crate) fn require_positive(what: &str, value: f64) -> Result<(), KernelError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(KernelError::InvalidGeometry {
            reason: format!("{what} must be positive, got {value}"),
        })
    }
}

pub(crate) fn normalized(what: &str, v: [f64; 3]) -> Result<[f64; 3], KernelError> {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if !len.is_finite() || len < 1e-12 {
        return Err(KernelError::InvalidGeometry {
            reason: format!("{what} has zero length"),
        });
    }
    Ok([v[0] / len, v[1] / len, v[2] / len])
}
