// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Column-major 4×4 transforms for node model matrices and the camera.

use core::ops::Mul;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// A column-major 4×4 matrix stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column*, matching the layout WebGL's
/// `uniformMatrix4fv` expects with `transpose = false`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// A pure translation.
    #[inline]
    #[must_use]
    pub const fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, z, 1.0],
            ],
        }
    }

    /// A non-uniform scale.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            cols: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Euler rotation in radians, intrinsic `XYZ` order (`Rx · Ry · Rz`).
    #[must_use]
    pub fn from_euler_xyz(x: f64, y: f64, z: f64) -> Self {
        let (sx, cx) = (x.sin(), x.cos());
        let (sy, cy) = (y.sin(), y.cos());
        let (sz, cz) = (z.sin(), z.cos());
        Self {
            cols: [
                [cy * cz, cx * sz + sx * sy * cz, sx * sz - cx * sy * cz, 0.0],
                [-cy * sz, cx * cz - sx * sy * sz, sx * cz + cx * sy * sz, 0.0],
                [sy, -sx * cy, cx * cy, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Translation · rotation · scale.
    #[must_use]
    pub fn from_trs(position: [f64; 3], rotation: [f64; 3], scale: [f64; 3]) -> Self {
        Self::from_translation(position[0], position[1], position[2])
            * Self::from_euler_xyz(rotation[0], rotation[1], rotation[2])
            * Self::from_scale(scale[0], scale[1], scale[2])
    }

    /// An OpenGL-style perspective projection (`fov_degrees` is vertical).
    #[must_use]
    pub fn perspective(fov_degrees: f64, aspect: f64, near: f64, far: f64) -> Self {
        let f = 1.0 / (fov_degrees * core::f64::consts::PI / 360.0).tan();
        let nf = 1.0 / (near - far);
        Self {
            cols: [
                [f / aspect, 0.0, 0.0, 0.0],
                [0.0, f, 0.0, 0.0],
                [0.0, 0.0, (far + near) * nf, -1.0],
                [0.0, 0.0, 2.0 * far * near * nf, 0.0],
            ],
        }
    }

    /// Applies the transform to a point (`w = 1`), without the perspective
    /// divide.
    #[must_use]
    pub fn transform_point(&self, p: [f64; 3]) -> [f64; 4] {
        let c = &self.cols;
        let mut out = [0.0; 4];
        for (i, o) in out.iter_mut().enumerate() {
            *o = c[0][i] * p[0] + c[1][i] * p[1] + c[2][i] * p[2] + c[3][i];
        }
        out
    }

    /// Flattens to sixteen `f32`s, column after column.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "GPU uniforms are single precision"
    )]
    #[must_use]
    pub fn to_f32_array(&self) -> [f32; 16] {
        let mut out = [0.0_f32; 16];
        for (j, col) in self.cols.iter().enumerate() {
            for (i, v) in col.iter().enumerate() {
                out[j * 4 + i] = *v as f32;
            }
        }
        out
    }
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f64; 4]; 4];
        for (j, col) in out.iter_mut().enumerate() {
            for (i, v) in col.iter_mut().enumerate() {
                *v = a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
            }
        }
        Self { cols: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: [f64; 4], b: [f64; 4]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn trs_applies_scale_then_rotation_then_translation() {
        let m = Transform3d::from_trs(
            [10.0, 0.0, 0.0],
            [0.0, 0.0, core::f64::consts::FRAC_PI_2],
            [2.0, 1.0, 1.0],
        );
        // (1,0,0) → scale (2,0,0) → rotate 90° about Z (0,2,0) → translate.
        let p = m.transform_point([1.0, 0.0, 0.0]);
        assert!(close(p, [10.0, 2.0, 0.0, 1.0]), "got {p:?}");
    }

    #[test]
    fn identity_is_neutral() {
        let m = Transform3d::from_translation(1.0, 2.0, 3.0);
        assert_eq!(m * Transform3d::IDENTITY, m);
        assert_eq!(Transform3d::IDENTITY * m, m);
    }

    #[test]
    fn perspective_maps_near_plane_to_minus_one() {
        let p = Transform3d::perspective(90.0, 1.0, 1.0, 10.0);
        let clip = p.transform_point([0.0, 0.0, -1.0]);
        assert!((clip[2] / clip[3] + 1.0).abs() < 1e-9, "ndc z {}", clip[2] / clip[3]);
        let far = p.transform_point([0.0, 0.0, -10.0]);
        assert!((far[2] / far[3] - 1.0).abs() < 1e-9, "ndc z {}", far[2] / far[3]);
    }

    #[test]
    fn f32_flattening_is_column_major() {
        let m = Transform3d::from_translation(4.0, 5.0, 6.0).to_f32_array();
        assert_eq!(&m[12..15], &[4.0, 5.0, 6.0]);
        assert_eq!(m[15], 1.0);
    }
}
