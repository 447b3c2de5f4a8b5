//! Sampling helpers for disc profiles swept around an axis line.

use std::f64::consts::TAU;

use crate::transform::Transform;
use crate::types::Bounds;

/// Planar disc profile waiting to be revolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DiscProfile {
    pub center: [f64; 3],
    /// Unit normal.
    pub normal: [f64; 3],
    pub radius: f64,
}

impl DiscProfile {
    /// `samples` points on the rim, counter-clockwise about the normal.
    pub fn rim(&self, samples: usize) -> Vec<[f64; 3]> {
        let (u, v) = tangent_vectors(self.normal);
        (0..samples)
            .map(|k| {
                let t = TAU * k as f64 / samples as f64;
                let (s, c) = t.sin_cos();
                [
                    self.center[0] + self.radius * (c * u[0] + s * v[0]),
                    self.center[1] + self.radius * (c * u[1] + s * v[1]),
                    self.center[2] + self.radius * (c * u[2] + s * v[2]),
                ]
            })
            .collect()
    }
}

/// Bounds of the rim sampled at `steps + 1` positions along the sweep.
pub(crate) fn swept_bounds(
    disc: &DiscProfile,
    axis_origin: [f64; 3],
    axis: [f64; 3],
    angle: f64,
    rim_samples: usize,
    steps: usize,
) -> Option<Bounds> {
    let rim = disc.rim(rim_samples);
    let points = (0..=steps).flat_map(|step| {
        let rot = rotation_about_line(axis_origin, axis, angle * step as f64 / steps as f64);
        rim.iter()
            .map(move |&p| rot.transform_point(p))
            .collect::<Vec<_>>()
    });
    Bounds::from_points(points)
}

/// Two unit vectors spanning the plane orthogonal to `n`.
pub(crate) fn tangent_vectors(n: [f64; 3]) -> ([f64; 3], [f64; 3]) {
    let up = if n[0].abs() < 0.9 {
        [1.0, 0.0, 0.0]
    } else {
        [0.0, 1.0, 0.0]
    };
    let u = cross(up, n);
    let u_len = (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt();
    let u = [u[0] / u_len, u[1] / u_len, u[2] / u_len];
    let v = cross(n, u);
    (u, v)
}

pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Rotation about an arbitrary axis line (origin + direction).
pub(crate) fn rotation_about_line(origin: [f64; 3], axis: [f64; 3], angle: f64) -> Transform {
    Transform::translation(-origin[0], -origin[1], -origin[2])
        .then(&Transform::rotation_axis_angle(axis, angle))
        .then(&Transform::translation(origin[0], origin[1], origin[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rim_lies_on_the_disc_circle() {
        let disc = DiscProfile {
            center: [0.0, 20.0, 0.0],
            normal: [0.0, 0.0, 1.0],
            radius: 2.0,
        };
        for p in disc.rim(12) {
            let d = sub(p, disc.center);
            assert_relative_eq!(dot(d, d).sqrt(), 2.0, epsilon = 1e-12);
            assert_relative_eq!(p[2], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn quarter_sweep_bounds() {
        let disc = DiscProfile {
            center: [0.0, 10.0, 0.0],
            normal: [1.0, 0.0, 0.0],
            radius: 1.0,
        };
        // Sweep from +Y toward +Z about the X axis
        let b = swept_bounds(
            &disc,
            [0.0; 3],
            [1.0, 0.0, 0.0],
            std::f64::consts::FRAC_PI_2,
            32,
            32,
        )
        .unwrap();
        assert_relative_eq!(b.max[1], 11.0, epsilon = 1e-9);
        assert_relative_eq!(b.max[2], 11.0, epsilon = 1e-9);
        assert!(b.min[2] > -1.0 - 1e-9);
        assert!(b.min[1] > -1.0 - 1e-9);
    }
}
