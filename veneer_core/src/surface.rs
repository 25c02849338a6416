// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DOM-synchronized surface quads.
//!
//! A [`DomSyncedSurface`] owns a group of [`SurfaceQuad`]s, one per DOM
//! element. Every frame the host calls
//!
//! 1. [`sync_all_positions`](DomSyncedSurface::sync_all_positions) to place
//!    each quad exactly over its element (scroll and layout follow), then
//! 2. [`advance_hover_and_time`](DomSyncedSurface::advance_hover_and_time)
//!    to advance shader time and ease hover effects.
//!
//! Pointer events never touch the scene directly. Listeners write into a
//! per-quad [`HoverState`] which the frame update consumes, so all scene
//! mutation happens on the frame path.
//!
//! Quads hold only weak element handles; a surface never keeps a DOM node
//! alive. Quads whose element is gone are skipped until the surface is
//! destroyed.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;
use core::task::Poll;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Point, Rect};

use crate::dom::{DomElement, ListenerScope, MarkerConfig, PointerKind, PointerSample};
use crate::events::EventHub;
use crate::geometry::PlaneGeometry;
use crate::material::{Material, uniforms};
use crate::scene::{GeometryId, MaterialId, NodeId, Scene};
use crate::signals::{Signal, TargetReady, WEBGL_TRANSITION_TARGET_READY};
use crate::texture::{TextureCache, TextureHandle, TextureLoad};
use crate::viewport::{Projection, is_degenerate};

/// Surface tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceConfig {
    /// Plane subdivisions per axis.
    pub segments: u32,
    /// Per-frame exponential smoothing factor for hover easing. Values above
    /// [`SurfaceConfig::MAX_HOVER_EASE`] are clamped.
    pub hover_ease: f64,
    /// Scale from the eased target/current gap to `hoverOffset`.
    pub offset_gain: f64,
    /// Scale from the eased target/current gap to `pointerVelocity`
    /// (before clamping to unit length).
    pub velocity_gain: f64,
}

impl SurfaceConfig {
    /// Largest accepted [`hover_ease`](Self::hover_ease).
    pub const MAX_HOVER_EASE: f64 = 0.15;

    /// Defaults: 32×32 planes, slow hover easing.
    #[must_use]
    pub const fn web() -> Self {
        Self {
            segments: 32,
            hover_ease: 0.09,
            offset_gain: 1.0,
            velocity_gain: 4.0,
        }
    }

    fn clamped(mut self) -> Self {
        self.hover_ease = self.hover_ease.clamp(0.0, Self::MAX_HOVER_EASE);
        self
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self::web()
    }
}

/// Pointer-driven state of one quad.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct HoverState {
    /// Whether the pointer is inside the quad's container.
    pub is_hovered: bool,
    /// Pointer position relative to the container, `-1..1` per axis, `+Y` up.
    pub pointer_uv: [f64; 2],
    /// World-space point the hover easing moves toward.
    pub target: Point,
    /// Eased world-space point.
    pub current: Point,
}

#[derive(Debug, Default)]
struct HoverCell {
    state: HoverState,
    entered: bool,
    left: bool,
}

/// One DOM element mirrored as a mesh.
pub struct SurfaceQuad<E: DomElement> {
    /// Mesh node.
    pub node: NodeId,
    /// Current geometry (replaced on resize).
    pub geometry: GeometryId,
    /// Owned material.
    pub material: MaterialId,
    /// Position in the surface's collection order.
    pub index: usize,
    /// Texture the material samples.
    pub texture: TextureHandle,
    element: E::Weak,
    bounds: Rect,
    hover: Rc<RefCell<HoverCell>>,
}

impl<E: DomElement> fmt::Debug for SurfaceQuad<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceQuad")
            .field("node", &self.node)
            .field("geometry", &self.geometry)
            .field("material", &self.material)
            .field("index", &self.index)
            .field("texture", &self.texture)
            .field("bounds", &self.bounds)
            .field("hover", &self.hover.borrow().state)
            .finish_non_exhaustive()
    }
}

impl<E: DomElement> SurfaceQuad<E> {
    /// The element, if it is still alive.
    #[must_use]
    pub fn element(&self) -> Option<E> {
        E::upgrade(&self.element)
    }

    /// The last synced DOM rect.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// A copy of the hover state.
    #[must_use]
    pub fn hover(&self) -> HoverState {
        self.hover.borrow().state
    }
}

/// Hover extension points. Both hooks default to no-ops.
pub trait SurfaceEffects<E: DomElement> {
    /// The pointer entered `quad`'s container.
    fn on_hover_enter(&mut self, scene: &mut Scene, quad: &SurfaceQuad<E>) {
        _ = (scene, quad);
    }

    /// The pointer left `quad`'s container.
    fn on_hover_leave(&mut self, scene: &mut Scene, quad: &SurfaceQuad<E>) {
        _ = (scene, quad);
    }
}

/// [`SurfaceEffects`] that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEffects;

impl<E: DomElement> SurfaceEffects<E> for NoEffects {}

struct PendingQuad<E: DomElement> {
    element: E::Weak,
    index: usize,
    url: String,
    load: TextureLoad,
}

/// A tracked collection of DOM-synced quads under one scene group.
pub struct DomSyncedSurface<E: DomElement> {
    group: NodeId,
    quads: Vec<SurfaceQuad<E>>,
    pending: Vec<PendingQuad<E>>,
    projection: Rc<Cell<Projection>>,
    config: SurfaceConfig,
    markers: MarkerConfig,
    scope: ListenerScope,
    effects: Box<dyn SurfaceEffects<E>>,
    failed: Vec<String>,
    destroyed: bool,
}

impl<E: DomElement> fmt::Debug for DomSyncedSurface<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomSyncedSurface")
            .field("group", &self.group)
            .field("quads", &self.quads.len())
            .field("pending", &self.pending.len())
            .field("projection", &self.projection.get())
            .field("config", &self.config)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

impl<E: DomElement> DomSyncedSurface<E> {
    /// Creates an empty surface whose group is a child of `parent`.
    pub fn new(
        scene: &mut Scene,
        parent: NodeId,
        projection: Projection,
        config: SurfaceConfig,
        markers: MarkerConfig,
    ) -> Self {
        let group = scene.create_group();
        scene.add_child(parent, group);
        Self {
            group,
            quads: Vec::new(),
            pending: Vec::new(),
            projection: Rc::new(Cell::new(projection)),
            config: config.clamped(),
            markers,
            scope: ListenerScope::new(),
            effects: Box::new(NoEffects),
            failed: Vec::new(),
            destroyed: false,
        }
    }

    /// Installs hover hooks.
    pub fn set_effects(&mut self, effects: Box<dyn SurfaceEffects<E>>) {
        self.effects = effects;
    }

    /// The aggregate group node.
    #[must_use]
    pub fn group(&self) -> NodeId {
        self.group
    }

    /// Tracked quads in collection order.
    #[must_use]
    pub fn quads(&self) -> &[SurfaceQuad<E>] {
        &self.quads
    }

    /// The tracked quad drawn by `node`.
    #[must_use]
    pub fn quad_for_node(&self, node: NodeId) -> Option<&SurfaceQuad<E>> {
        self.quads.iter().find(|q| q.node == node)
    }

    /// The tracked quad mirroring `element`.
    #[must_use]
    pub fn quad_for_element(&self, element: &E) -> Option<&SurfaceQuad<E>> {
        self.quads
            .iter()
            .find(|q| q.element().is_some_and(|e| e.same_node(element)))
    }

    /// The projection quads are placed with.
    #[must_use]
    pub fn projection(&self) -> Projection {
        self.projection.get()
    }

    /// Surface tuning (with `hover_ease` already clamped).
    #[must_use]
    pub fn config(&self) -> SurfaceConfig {
        self.config
    }

    /// Number of texture loads still outstanding from [`collect`](Self::collect).
    #[must_use]
    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    /// URLs whose texture failed to load during [`collect`](Self::collect).
    #[must_use]
    pub fn failed_sources(&self) -> &[String] {
        &self.failed
    }

    /// Measures `element` as the landing rect of a cross-page transition,
    /// under the projection quads are placed with. `None` when the element
    /// has no area.
    #[must_use]
    pub fn target_ready_for(&self, element: &E) -> Option<TargetReady> {
        let rect = element.bounding_client_rect();
        if is_degenerate(rect) {
            return None;
        }
        let Projection { viewport, screen } = self.projection.get();
        Some(TargetReady {
            rect,
            viewport,
            screen,
        })
    }

    /// Emits [`WEBGL_TRANSITION_TARGET_READY`] on `bus` for the first
    /// surface element under `root` that has a box.
    ///
    /// Returns `false` (and emits nothing) when there is no such element.
    pub fn announce_target(&self, root: &E, bus: &EventHub<Signal>) -> bool {
        let ready = root
            .query_selector_all(self.markers.surface_selector)
            .iter()
            .find_map(|element| self.target_ready_for(element));
        let Some(ready) = ready else {
            return false;
        };
        bus.emit(WEBGL_TRANSITION_TARGET_READY, &Signal::TargetReady(ready));
        true
    }

    /// Builds a quad covering `element`'s current box.
    ///
    /// The quad is not added to the scene or tracked; pass it to
    /// [`track`](Self::track) for that.
    pub fn create_surface_for(
        &self,
        scene: &mut Scene,
        texture: TextureHandle,
        element: &E,
        index: usize,
    ) -> SurfaceQuad<E> {
        let rect = element.bounding_client_rect();
        let world = self.projection.get().dom_to_world(rect);
        let segments = self.config.segments;
        let geometry = scene.add_geometry(PlaneGeometry::new(
            world.size.width,
            world.size.height,
            segments,
            segments,
        ));
        let material = scene.add_material(Material::surface(Some(texture)));
        let node = scene.create_mesh(geometry, material);
        scene.set_position(node, [world.center.x, world.center.y, 0.0]);

        let hover = HoverCell {
            state: HoverState {
                target: world.center,
                current: world.center,
                ..HoverState::default()
            },
            ..HoverCell::default()
        };
        SurfaceQuad {
            node,
            geometry,
            material,
            index,
            texture,
            element: element.downgrade(),
            bounds: rect,
            hover: Rc::new(RefCell::new(hover)),
        }
    }

    /// Adds `quad` to the group and to the tracked collection.
    pub fn track(&mut self, scene: &mut Scene, quad: SurfaceQuad<E>) {
        scene.add_child(self.group, quad.node);
        self.quads.push(quad);
    }

    /// Attaches pointer tracking for `quad`, scoped to the nearest ancestor
    /// of `element` matching `container_selector`.
    ///
    /// Returns `false` (and attaches nothing) when there is no such
    /// container.
    pub fn attach_hover_tracking(
        &self,
        quad: &SurfaceQuad<E>,
        element: &E,
        container_selector: &str,
    ) -> bool {
        let Some(container) = element.closest(container_selector) else {
            return false;
        };

        let cell = Rc::clone(&quad.hover);
        container.add_pointer_listener(
            PointerKind::Enter,
            &self.scope,
            Box::new(move |_| {
                let mut c = cell.borrow_mut();
                c.state.is_hovered = true;
                c.entered = true;
            }),
        );

        let cell = Rc::clone(&quad.hover);
        container.add_pointer_listener(
            PointerKind::Leave,
            &self.scope,
            Box::new(move |_| {
                let mut c = cell.borrow_mut();
                c.state.is_hovered = false;
                c.left = true;
            }),
        );

        let cell = Rc::clone(&quad.hover);
        let weak = container.downgrade();
        let projection = Rc::clone(&self.projection);
        container.add_pointer_listener(
            PointerKind::Move,
            &self.scope,
            Box::new(move |sample: PointerSample| {
                let mut c = cell.borrow_mut();
                if !c.state.is_hovered {
                    return;
                }
                let Some(container) = E::upgrade(&weak) else {
                    return;
                };
                let r = container.bounding_client_rect();
                if !is_degenerate(r) {
                    let u = (sample.client.x - r.x0) / r.width() * 2.0 - 1.0;
                    let v = 1.0 - (sample.client.y - r.y0) / r.height() * 2.0;
                    c.state.pointer_uv = [u.clamp(-1.0, 1.0), v.clamp(-1.0, 1.0)];
                }
                c.state.target = projection.get().dom_point_to_world(sample.client);
            }),
        );
        true
    }

    /// Finds surface elements under `root` and requests their textures.
    /// Quads are built (and hover tracking attached) as the loads settle,
    /// from [`advance_hover_and_time`](Self::advance_hover_and_time) or
    /// [`poll_pending`](Self::poll_pending).
    ///
    /// Returns the number of elements found.
    pub fn collect(&mut self, root: &E, cache: &TextureCache) -> usize {
        let elements = root.query_selector_all(self.markers.surface_selector);
        let found = elements.len();
        for element in elements {
            let index = self.quads.len() + self.pending.len();
            let Some(url) = self.markers.texture_source(&element) else {
                continue;
            };
            let load = cache.load(&url);
            self.pending.push(PendingQuad {
                element: element.downgrade(),
                index,
                url,
                load,
            });
        }
        found
    }

    /// Builds quads for every texture load that has settled.
    pub fn poll_pending(&mut self, scene: &mut Scene) {
        if self.destroyed || self.pending.is_empty() {
            return;
        }
        let mut still_pending = Vec::new();
        for mut p in core::mem::take(&mut self.pending) {
            match crate::poll_now(&mut p.load) {
                Poll::Pending => still_pending.push(p),
                Poll::Ready(Err(_)) => self.failed.push(p.url),
                Poll::Ready(Ok(texture)) => {
                    let Some(element) = E::upgrade(&p.element) else {
                        continue;
                    };
                    let quad = self.create_surface_for(scene, texture, &element, p.index);
                    self.attach_hover_tracking(&quad, &element, self.markers.container_selector);
                    self.track(scene, quad);
                }
            }
        }
        self.pending = still_pending;
        self.quads.sort_by_key(|q| q.index);
    }

    /// Places every quad exactly over its element's current box. Elements
    /// with no area (hidden or mid-layout) and dropped elements are skipped.
    pub fn sync_all_positions(&mut self, scene: &mut Scene) {
        let projection = self.projection.get();
        for quad in &mut self.quads {
            let Some(element) = E::upgrade(&quad.element) else {
                continue;
            };
            let rect = element.bounding_client_rect();
            if is_degenerate(rect) {
                continue;
            }
            let world = projection.dom_to_world(rect);
            let z = scene.position(quad.node)[2];
            scene.set_position(quad.node, [world.center.x, world.center.y, z]);
            quad.bounds = rect;

            let mut c = quad.hover.borrow_mut();
            if !c.state.is_hovered {
                c.state.target = world.center;
            }
        }
    }

    /// Advances `time` by `delta_ms * 0.001` on every quad and eases hover.
    ///
    /// Hovered quads derive `hoverOffset` and `pointerVelocity` from the gap
    /// between the eased point and its target. Non-hovered quads have both
    /// set to exactly zero while their eased point keeps settling.
    pub fn advance_hover_and_time(&mut self, scene: &mut Scene, delta_ms: f64) {
        self.poll_pending(scene);

        let Self {
            quads,
            effects,
            config,
            ..
        } = self;

        for quad in quads.iter() {
            let (entered, left) = {
                let mut c = quad.hover.borrow_mut();
                (core::mem::take(&mut c.entered), core::mem::take(&mut c.left))
            };
            if entered {
                effects.on_hover_enter(scene, quad);
            }
            if left {
                effects.on_hover_leave(scene, quad);
            }
        }

        let dt = delta_ms * 0.001;
        for quad in quads.iter() {
            let mut c = quad.hover.borrow_mut();
            let s = &mut c.state;
            s.current.x += (s.target.x - s.current.x) * config.hover_ease;
            s.current.y += (s.target.y - s.current.y) * config.hover_ease;
            let gap = [s.target.x - s.current.x, s.target.y - s.current.y];
            let hovered = s.is_hovered;
            drop(c);

            let material = scene.material_mut(quad.material);
            let time = material.float(uniforms::TIME).unwrap_or(0.0);
            material.set_float(uniforms::TIME, time + dt);

            if hovered {
                let offset = [gap[0] * config.offset_gain, gap[1] * config.offset_gain];
                material.set_vec2(uniforms::HOVER_OFFSET, offset);
                material.set_vec2(
                    uniforms::POINTER_VELOCITY,
                    clamp_unit([gap[0] * config.velocity_gain, gap[1] * config.velocity_gain]),
                );
            } else {
                material.set_vec2(uniforms::HOVER_OFFSET, [0.0, 0.0]);
                material.set_vec2(uniforms::POINTER_VELOCITY, [0.0, 0.0]);
            }
        }
    }

    /// Adopts a new projection and rebuilds every quad's geometry to its
    /// element's current box. Old geometries are disposed.
    pub fn handle_viewport_resize(&mut self, scene: &mut Scene, projection: Projection) {
        self.projection.set(projection);
        let segments = self.config.segments;
        for quad in &mut self.quads {
            let Some(element) = E::upgrade(&quad.element) else {
                continue;
            };
            let rect = element.bounding_client_rect();
            let world = projection.dom_to_world(rect);
            let geometry = scene.add_geometry(PlaneGeometry::new(
                world.size.width,
                world.size.height,
                segments,
                segments,
            ));
            scene.set_mesh_geometry(quad.node, geometry);
            scene.dispose_geometry(quad.geometry);
            quad.geometry = geometry;
            if !is_degenerate(rect) {
                let z = scene.position(quad.node)[2];
                scene.set_position(quad.node, [world.center.x, world.center.y, z]);
                quad.bounds = rect;
            }
        }
    }

    /// Shows the whole collection.
    pub fn show(&self, scene: &mut Scene) {
        if !self.destroyed {
            scene.set_visible(self.group, true);
        }
    }

    /// Hides the whole collection without destroying it.
    pub fn hide(&self, scene: &mut Scene) {
        if !self.destroyed {
            scene.set_visible(self.group, false);
        }
    }

    /// Revokes every listener, disposes every quad's geometry and material,
    /// and removes the group from the scene. Later calls do nothing.
    pub fn destroy(&mut self, scene: &mut Scene) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.scope.cancel();
        self.pending.clear();
        for quad in self.quads.drain(..) {
            scene.dispose_geometry(quad.geometry);
            scene.dispose_material(quad.material);
        }
        scene.destroy_subtree(self.group);
    }

    /// Returns `true` once destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

fn clamp_unit(v: [f64; 2]) -> [f64; 2] {
    let len = (v[0] * v[0] + v[1] * v[1]).sqrt();
    if len > 1.0 {
        [v[0] / len, v[1] / len]
    } else {
        v
    }
}
