// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Subdivided plane geometry.

use alloc::vec::Vec;

/// A `width × height` plane in the XY plane, centred on the origin and split
/// into `segments_x × segments_y` cells.
///
/// Vertices are emitted row by row from the top edge (`+Y`) down, left to
/// right. UVs run `0..1` left to right and `1..0` top to bottom, so the
/// image's top row lands on the plane's top edge.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaneGeometry {
    width: f64,
    height: f64,
    segments_x: u32,
    segments_y: u32,
    /// Interleaved `xyz` positions.
    pub positions: Vec<f32>,
    /// Interleaved `uv` coordinates.
    pub uvs: Vec<f32>,
    /// Triangle list indices.
    pub indices: Vec<u32>,
    uv_version: u64,
}

impl PlaneGeometry {
    /// Builds a plane. Segment counts below one are raised to one.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "vertex attributes are single precision"
    )]
    #[must_use]
    pub fn new(width: f64, height: f64, segments_x: u32, segments_y: u32) -> Self {
        let gx = segments_x.max(1);
        let gy = segments_y.max(1);
        let vertex_count = ((gx + 1) * (gy + 1)) as usize;
        let mut positions = Vec::with_capacity(vertex_count * 3);
        let mut uvs = Vec::with_capacity(vertex_count * 2);
        let seg_w = width / f64::from(gx);
        let seg_h = height / f64::from(gy);

        for iy in 0..=gy {
            let y = height / 2.0 - f64::from(iy) * seg_h;
            for ix in 0..=gx {
                let x = f64::from(ix) * seg_w - width / 2.0;
                positions.extend_from_slice(&[x as f32, y as f32, 0.0]);
                uvs.push((f64::from(ix) / f64::from(gx)) as f32);
                uvs.push((1.0 - f64::from(iy) / f64::from(gy)) as f32);
            }
        }

        let mut indices = Vec::with_capacity((gx * gy * 6) as usize);
        let row = gx + 1;
        for iy in 0..gy {
            for ix in 0..gx {
                let a = ix + row * iy;
                let b = ix + row * (iy + 1);
                let c = ix + 1 + row * (iy + 1);
                let d = ix + 1 + row * iy;
                indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }

        Self {
            width,
            height,
            segments_x: gx,
            segments_y: gy,
            positions,
            uvs,
            indices,
            uv_version: 0,
        }
    }

    /// Plane width in world units.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Plane height in world units.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Width over height, or `1.0` for a degenerate plane.
    #[must_use]
    pub fn aspect(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// `(segments_x, segments_y)`.
    #[must_use]
    pub fn segments(&self) -> (u32, u32) {
        (self.segments_x, self.segments_y)
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// The UV each vertex had when the plane was built.
    pub fn base_uv(&self, vertex: usize) -> [f64; 2] {
        let row = self.segments_x as usize + 1;
        let ix = vertex % row;
        let iy = vertex / row;
        [
            ix as f64 / f64::from(self.segments_x),
            1.0 - iy as f64 / f64::from(self.segments_y),
        ]
    }

    /// Flags the UV buffer for re-upload.
    pub fn mark_uvs_dirty(&mut self) {
        self.uv_version += 1;
    }

    /// Bumped by every [`mark_uvs_dirty`](Self::mark_uvs_dirty). GPU caches
    /// compare it against the version they last uploaded.
    #[must_use]
    pub fn uv_version(&self) -> u64 {
        self.uv_version
    }
}
