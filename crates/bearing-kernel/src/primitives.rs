//! Primitive builders on top of truck's sweep API.
//!
//! truck has no built-in cylinder, sphere or disc, so each one is built from successive sweeps.

use std::f64::consts::PI;

use tracing::{debug, instrument};
use truck_modeling::builder;
use truck_modeling::topology::{Edge, Face, Solid, Wire};
use truck_modeling::{EuclideanSpace, InnerSpace, Point3, Rad, Vector3};

use crate::types::KernelError;

/// Create a cylinder solid: circle wire → face → translational sweep.
/// Axis along Z, centered on the origin, spanning z in [-height/2, height/2].
#[instrument(level = "debug")]
pub fn make_cylinder(radius: f64, height: f64) -> Result<Solid, KernelError> {
    let base = Point3::new(0.0, 0.0, -height / 2.0);
    let v = builder::vertex(Point3::new(radius, 0.0, -height / 2.0));
    let wire = builder::rsweep(&v, base, Vector3::unit_z(), Rad(2.0 * PI));
    let face = builder::try_attach_plane(&[wire]).map_err(|e| KernelError::InvalidGeometry {
        reason: format!("failed to create circular face: {e}"),
    })?;
    debug!(radius, height, "cylinder swept");
    Ok(builder::tsweep(&face, Vector3::new(0.0, 0.0, height)))
}

/// Create a sphere solid: semicircle face → rotational sweep 2π.
#[instrument(level = "debug")]
pub fn make_sphere(center: [f64; 3], radius: f64) -> Result<Solid, KernelError> {
    // Semicircle arc in the XZ plane from (r,0,0) to (-r,0,0)
    let v_right = builder::vertex(Point3::new(radius, 0.0, 0.0));
    let mut wire: Wire = builder::rsweep(&v_right, Point3::origin(), Vector3::unit_y(), Rad(PI));

    // The diameter has to reuse the arc's end vertices or the wire stays open
    let (Some(start), Some(end)) = (wire.front_vertex(), wire.back_vertex()) else {
        return Err(KernelError::InvalidGeometry {
            reason: "semicircle arc has no end vertices".to_string(),
        });
    };
    let diameter: Edge = builder::line(end, start);
    wire.push_back(diameter);

    let face = builder::try_attach_plane(&[wire]).map_err(|e| {
        KernelError::InvalidGeometry {
            reason: format!("failed to create semicircle face: {e}"),
        }
    })?;

    // Half-disc around the X axis sweeps out the full ball
    let ball = builder::rsweep(&face, Point3::origin(), Vector3::unit_x(), Rad(2.0 * PI));
    debug!(?center, radius, "sphere swept");
    Ok(builder::translated(
        &ball,
        Vector3::new(center[0], center[1], center[2]),
    ))
}

/// Create a planar disc face with the given center, unit normal and radius.
#[instrument(level = "debug")]
pub fn make_disc(center: [f64; 3], normal: [f64; 3], radius: f64) -> Result<Face, KernelError> {
    let c = Point3::new(center[0], center[1], center[2]);
    let n = Vector3::new(normal[0], normal[1], normal[2]).normalize();

    // Any direction perpendicular to the normal starts the rim
    let helper = if n.x.abs() < 0.9 {
        Vector3::unit_x()
    } else {
        Vector3::unit_y()
    };
    let u = n.cross(helper).normalize();

    let v = builder::vertex(c + u * radius);
    let wire = builder::rsweep(&v, c, n, Rad(2.0 * PI));
    builder::try_attach_plane(&[wire]).map_err(|e| KernelError::InvalidGeometry {
        reason: format!("failed to create disc face: {e}"),
    })
}
