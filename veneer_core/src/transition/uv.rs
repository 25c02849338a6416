// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cover-crop UV correction for a plane whose aspect ratio is animating.

use crate::anim::lerp;
use crate::geometry::PlaneGeometry;

/// Scale and offset that crop an image of `image_aspect` so it covers a
/// plane of `plane_aspect` without distortion.
///
/// The crop is symmetric and only ever along one axis.
#[must_use]
pub fn cover(image_aspect: f64, plane_aspect: f64) -> ([f64; 2], [f64; 2]) {
    if !(image_aspect > 0.0 && plane_aspect > 0.0) {
        return ([1.0, 1.0], [0.0, 0.0]);
    }
    if image_aspect > plane_aspect {
        let visible = plane_aspect / image_aspect;
        ([visible, 1.0], [(1.0 - visible) / 2.0, 0.0])
    } else {
        let visible = image_aspect / plane_aspect;
        ([1.0, visible], [0.0, (1.0 - visible) / 2.0])
    }
}

/// Rewrites every UV of `geometry` for transition progress `p`.
///
/// ```text
/// scale  = 1 + (cover_scale - 1) · p
/// offset = cover_offset · p
/// zoom   = lerp(source_zoom, target_zoom, p)
/// uv'    = ((uv · scale + offset) - 0.5) · zoom + 0.5
/// ```
///
/// At `p = 0` this is the source's zoomed framing; at `p = 1` it is the full
/// cover crop at `target_zoom`.
#[expect(
    clippy::cast_possible_truncation,
    reason = "vertex attributes are single precision"
)]
pub fn correct_uvs(
    geometry: &mut PlaneGeometry,
    image_aspect: f64,
    p: f64,
    source_zoom: f64,
    target_zoom: f64,
) {
    let (cover_scale, cover_offset) = cover(image_aspect, geometry.aspect());
    let scale = [
        1.0 + (cover_scale[0] - 1.0) * p,
        1.0 + (cover_scale[1] - 1.0) * p,
    ];
    let offset = [cover_offset[0] * p, cover_offset[1] * p];
    let zoom = lerp(source_zoom, target_zoom, p);

    for v in 0..geometry.vertex_count() {
        let base = geometry.base_uv(v);
        let u = (base[0] * scale[0] + offset[0] - 0.5) * zoom + 0.5;
        let w = (base[1] * scale[1] + offset[1] - 0.5) * zoom + 0.5;
        geometry.uvs[v * 2] = u as f32;
        geometry.uvs[v * 2 + 1] = w as f32;
    }
    geometry.mark_uvs_dirty();
}
