// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel ↔ world coordinate conversion.
//!
//! The camera looks down −Z at the origin from `distance` units away. The
//! visible slab at `z = 0` is the world-space [`Viewport`]:
//!
//! ```text
//! height = 2 · tan(fov / 2) · distance
//! width  = height · aspect
//! ```
//!
//! DOM rects (CSS pixels, origin top-left, +Y down) map to world rects
//! (origin at the viewport centre, +Y up) through [`Projection`]. Both the
//! steady-state surface sync and the transition landing computation go
//! through the same [`Projection::dom_to_world`], so a handoff never jumps.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Point, Rect, Size};

/// The world-space extent of the visible plane at `z = 0`.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Viewport {
    /// Visible width in world units.
    pub width: f64,
    /// Visible height in world units.
    pub height: f64,
}

impl Viewport {
    /// Derives the viewport from perspective camera parameters.
    #[must_use]
    pub fn from_camera(fov_degrees: f64, aspect: f64, distance: f64) -> Self {
        let fov = fov_degrees * core::f64::consts::PI / 180.0;
        let height = 2.0 * (fov / 2.0).tan() * distance;
        Self {
            width: height * aspect,
            height,
        }
    }
}

/// A world-space axis-aligned rect described by its centre and size.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct WorldRect {
    /// Centre in world units.
    pub center: Point,
    /// Width and height in world units.
    pub size: Size,
}

/// A viewport together with the CSS-pixel screen it is displayed on.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Projection {
    /// World-space viewport.
    pub viewport: Viewport,
    /// Screen (window inner) size in CSS pixels.
    pub screen: Size,
}

impl Projection {
    /// Creates a projection.
    #[must_use]
    pub const fn new(viewport: Viewport, screen: Size) -> Self {
        Self { viewport, screen }
    }

    /// Maps a DOM bounding rect to the world rect a quad must occupy to
    /// cover it exactly.
    #[must_use]
    pub fn dom_to_world(&self, rect: Rect) -> WorldRect {
        let Viewport { width: vw, height: vh } = self.viewport;
        let Size { width: sw, height: sh } = self.screen;
        let x = ((rect.x0 + rect.width() / 2.0) / sw) * vw - vw / 2.0;
        let y = vh / 2.0 - ((rect.y0 + rect.height() / 2.0) / sh) * vh;
        WorldRect {
            center: Point::new(x, y),
            size: Size::new((rect.width() / sw) * vw, (rect.height() / sh) * vh),
        }
    }

    /// Inverse of [`dom_to_world`](Self::dom_to_world).
    #[must_use]
    pub fn world_to_dom(&self, world: WorldRect) -> Rect {
        let Viewport { width: vw, height: vh } = self.viewport;
        let Size { width: sw, height: sh } = self.screen;
        let w = world.size.width / vw * sw;
        let h = world.size.height / vh * sh;
        let cx = (world.center.x + vw / 2.0) / vw * sw;
        let cy = (vh / 2.0 - world.center.y) / vh * sh;
        Rect::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    /// Maps a CSS-pixel point (client coordinates) to world coordinates.
    #[must_use]
    pub fn dom_point_to_world(&self, p: Point) -> Point {
        let Viewport { width: vw, height: vh } = self.viewport;
        Point::new(
            p.x / self.screen.width * vw - vw / 2.0,
            vh / 2.0 - p.y / self.screen.height * vh,
        )
    }
}

/// Returns `true` when a DOM rect has no area (hidden or mid-layout).
#[must_use]
pub fn is_degenerate(rect: Rect) -> bool {
    !(rect.width() > 0.0 && rect.height() > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn projection() -> Projection {
        Projection::new(
            Viewport {
                width: 16.0,
                height: 9.0,
            },
            Size::new(1600.0, 900.0),
        )
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn ninety_degree_fov_gives_twice_distance() {
        let vp = Viewport::from_camera(90.0, 2.0, 5.0);
        // tan(45°) = 1 → height = 2 · 5.
        assert!((vp.height - 10.0).abs() < 1e-9, "got {}", vp.height);
        assert!((vp.width - 20.0).abs() < 1e-9, "got {}", vp.width);
    }

    #[test]
    fn full_screen_rect_fills_viewport() {
        let p = projection();
        let w = p.dom_to_world(Rect::new(0.0, 0.0, 1600.0, 900.0));
        assert!(close(w.center.x, 0.0) && close(w.center.y, 0.0), "{w:?}");
        assert!(close(w.size.width, 16.0) && close(w.size.height, 9.0), "{w:?}");
    }

    #[test]
    fn top_left_quadrant_maps_up_and_left() {
        let p = projection();
        let w = p.dom_to_world(Rect::new(0.0, 0.0, 800.0, 450.0));
        assert!(close(w.center.x, -4.0), "x = {}", w.center.x);
        assert!(close(w.center.y, 2.25), "y = {}", w.center.y);
        assert!(close(w.size.width, 8.0) && close(w.size.height, 4.5));
    }

    #[test]
    fn dom_round_trip_reproduces_rect() {
        let p = Projection::new(
            Viewport::from_camera(45.0, 1280.0 / 720.0, 10.0),
            Size::new(1280.0, 720.0),
        );
        for rect in [
            Rect::new(10.0, 20.0, 310.0, 220.0),
            Rect::new(-50.0, 600.0, 40.0, 1400.0),
            Rect::new(640.0, 360.0, 641.5, 360.25),
        ] {
            let back = p.world_to_dom(p.dom_to_world(rect));
            assert!(
                (back.x0 - rect.x0).abs() < 1e-6
                    && (back.y0 - rect.y0).abs() < 1e-6
                    && (back.x1 - rect.x1).abs() < 1e-6
                    && (back.y1 - rect.y1).abs() < 1e-6,
                "{rect:?} came back as {back:?}"
            );
        }
    }

    #[test]
    fn point_conversion_matches_rect_centre() {
        let p = projection();
        let rect = Rect::new(100.0, 200.0, 300.0, 500.0);
        let from_rect = p.dom_to_world(rect).center;
        let from_point = p.dom_point_to_world(rect.center());
        assert!(close(from_rect.x, from_point.x) && close(from_rect.y, from_point.y));
    }

    #[test]
    fn degenerate_rects() {
        assert!(is_degenerate(Rect::new(0.0, 0.0, 0.0, 10.0)));
        assert!(is_degenerate(Rect::new(5.0, 5.0, 10.0, 5.0)));
        assert!(!is_degenerate(Rect::new(0.0, 0.0, 1.0, 1.0)));
    }
}
