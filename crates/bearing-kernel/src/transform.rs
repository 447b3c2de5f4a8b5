//! Rigid placement of solids: a 4x4 affine matrix with composable constructors.

use serde::{Deserialize, Serialize};

/// A 4x4 affine transformation matrix stored in column-major order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Column-major 4x4 matrix entries.
    pub m: [f64; 16],
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        #[rustfmt::skip]
        let m = [
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        Self { m }
    }

    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        #[rustfmt::skip]
        let m = [
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            dx,  dy,  dz,  1.0,
        ];
        Self { m }
    }

    /// Rotation around the X axis by `angle` radians.
    pub fn rotation_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        #[rustfmt::skip]
        let m = [
            1.0, 0.0, 0.0, 0.0,
            0.0, c,   s,   0.0,
            0.0, -s,  c,   0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        Self { m }
    }

    /// Rotation around the Y axis by `angle` radians.
    pub fn rotation_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        #[rustfmt::skip]
        let m = [
            c,   0.0, -s,  0.0,
            0.0, 1.0, 0.0, 0.0,
            s,   0.0, c,   0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        Self { m }
    }

    /// Rotation around the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        #[rustfmt::skip]
        let m = [
            c,   s,   0.0, 0.0,
            -s,  c,   0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        Self { m }
    }

    /// Rotation around an axis through the origin by `angle` radians (Rodrigues).
    /// A zero-length axis yields the identity.
    pub fn rotation_axis_angle(axis: [f64; 3], angle: f64) -> Self {
        let len = (axis[0] * axis[0] + axis[1] * axis[1] + axis[2] * axis[2]).sqrt();
        if len < 1e-12 {
            return Self::identity();
        }
        let (x, y, z) = (axis[0] / len, axis[1] / len, axis[2] / len);
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;

        #[rustfmt::skip]
        let m = [
            t*x*x + c,   t*x*y + s*z, t*x*z - s*y, 0.0,
            t*x*y - s*z, t*y*y + c,   t*y*z + s*x, 0.0,
            t*x*z + s*y, t*y*z - s*x, t*z*z + c,   0.0,
            0.0,         0.0,         0.0,         1.0,
        ];
        Self { m }
    }

    /// Matrix element access (row, col), 0-indexed.
    fn at(&self, row: usize, col: usize) -> f64 {
        self.m[col * 4 + row]
    }

    /// Compose: apply `self` first, then `next`.
    pub fn then(&self, next: &Transform) -> Transform {
        let mut result = [0.0f64; 16];
        for col in 0..4 {
            for row in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += next.at(row, k) * self.at(k, col);
                }
                result[col * 4 + row] = sum;
            }
        }
        Transform { m: result }
    }

    /// Transform a point (applies translation).
    pub fn transform_point(&self, p: [f64; 3]) -> [f64; 3] {
        [
            self.at(0, 0) * p[0] + self.at(0, 1) * p[1] + self.at(0, 2) * p[2] + self.at(0, 3),
            self.at(1, 0) * p[0] + self.at(1, 1) * p[1] + self.at(1, 2) * p[2] + self.at(1, 3),
            self.at(2, 0) * p[0] + self.at(2, 1) * p[1] + self.at(2, 2) * p[2] + self.at(2, 3),
        ]
    }

    /// Transform a direction (no translation).
    pub fn transform_vector(&self, v: [f64; 3]) -> [f64; 3] {
        [
            self.at(0, 0) * v[0] + self.at(0, 1) * v[1] + self.at(0, 2) * v[2],
            self.at(1, 0) * v[0] + self.at(1, 1) * v[1] + self.at(1, 2) * v[2],
            self.at(2, 0) * v[0] + self.at(2, 1) * v[1] + self.at(2, 2) * v[2],
        ]
    }
}
