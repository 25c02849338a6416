// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cross-page mesh transitions.
//!
//! A click on a surface quad opens a session: the quad is hidden and a clone
//! takes its place. Once the destination page reports where the matching
//! element sits, the clone flies there, reshaping and re-cropping as it
//! goes, and hands off to the DOM just before it lands.
//!
//! ```text
//!         prepare                 on_target_ready              t ≥ duration
//!  Idle ──────────▶ WaitingForTarget ──────────▶ Animating ─────────────▶ Complete ──▶ Idle
//!   ▲                    │ timeout (fade out)                                          │
//!   └────────────────────┴────────────────── cancel / newer prepare ───────────────────┘
//! ```
//!
//! All motion is a pure function of session time, advanced only through
//! [`TransitionCoordinator::advance`], so tests drive it with synthetic
//! steps.
//!
//! ## Timeline
//!
//! With the default [`TransitionConfig`] (1.5 s):
//!
//! | time        | what                                                  |
//! |-------------|-------------------------------------------------------|
//! | 0 – 1.5 s   | position and size, exponential in-out                 |
//! | 0 – 1.5 s   | `pageTransitionProgress`, linear                      |
//! | 1.0 – 1.5 s | `opacity` 1 → 0                                       |
//! | 1.3 s       | [`WEBGL_TRANSITION_HANDOFF`] is emitted               |
//!
//! Geometry is rebuilt at 64×64 every tick with cover-corrected UVs.

mod uv;

pub use uv::{correct_uvs, cover};

use alloc::rc::Rc;
use alloc::string::String;

use kurbo::{Point, Size};

use crate::anim::{Ease, Track, lerp};
use crate::events::EventHub;
use crate::geometry::PlaneGeometry;
use crate::material::uniforms;
use crate::scene::{GeometryId, MaterialId, NodeId, Scene};
use crate::signals::{
    PageId, PrepareRequest, Signal, TargetReady, WEBGL_TRANSITION_COMPLETE,
    WEBGL_TRANSITION_HANDOFF,
};
use crate::trace::{TransitionReason, Tracer};
use crate::viewport::{Projection, WorldRect};

/// Where the single transition session is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TransitionState {
    /// No session.
    #[default]
    Idle,
    /// The clone is parked over the source, waiting for a landing rect.
    WaitingForTarget,
    /// The clone is flying.
    Animating,
    /// The timeline finished; cleanup follows immediately.
    Complete,
}

/// Transition timing and shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionConfig {
    /// Flight duration in seconds.
    pub duration: f64,
    /// Session time at which the handoff is emitted.
    pub handoff_at: f64,
    /// Length of the closing opacity fade (ending at `duration`).
    pub fade_duration: f64,
    /// How long transient hover uniforms take to settle on the clone.
    pub settle_duration: f64,
    /// Subdivisions per axis of the flying plane.
    pub segments: u32,
    /// UV zoom of the source page's shader.
    pub source_zoom: f64,
    /// UV zoom of the destination page's shader.
    pub target_zoom: f64,
    /// Screens narrower than this (CSS pixels) get no transition.
    pub mobile_breakpoint: f64,
    /// How long to wait for a landing rect before giving up.
    pub target_timeout: f64,
    /// Fade-out length after giving up.
    pub abort_fade: f64,
}

impl TransitionConfig {
    /// The desktop defaults.
    #[must_use]
    pub const fn web() -> Self {
        Self {
            duration: 1.5,
            handoff_at: 1.3,
            fade_duration: 0.5,
            settle_duration: 0.1,
            segments: 64,
            source_zoom: 0.9,
            target_zoom: 1.0,
            mobile_breakpoint: 768.0,
            target_timeout: 2.0,
            abort_fade: 0.3,
        }
    }
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self::web()
    }
}

/// Transient uniforms and the values they settle to on the clone.
const SETTLE_FLOATS: [(&str, f64); 2] = [(uniforms::HOVER, 0.0), (uniforms::REVEAL, 1.0)];
const SETTLE_VEC2S: [&str; 2] = [uniforms::HOVER_OFFSET, uniforms::POINTER_VELOCITY];

/// The in-flight transition.
#[derive(Clone, Debug)]
pub struct TransitionSession {
    state: TransitionState,
    /// The flying clone.
    pub cloned_mesh: NodeId,
    /// The hidden source quad.
    pub source: NodeId,
    /// URL being navigated to.
    pub target_url: String,
    /// Page the source quad belongs to.
    pub source_page: PageId,
    material: MaterialId,
    geometry: GeometryId,
    owns_geometry: bool,
    image_aspect: f64,
    from: WorldRect,
    to: Option<WorldRect>,
    z: f64,
    /// Seconds since `prepare`.
    age: f64,
    /// Seconds since `on_target_ready`.
    flight: f64,
    /// Seconds since the target timeout fired.
    abort: Option<f64>,
    handed_off: bool,
    settle_from: ([f64; 2], [[f64; 2]; 2]),
}

impl TransitionSession {
    /// Current state.
    #[must_use]
    pub fn state(&self) -> TransitionState {
        self.state
    }

    /// Seconds since the session was opened.
    #[must_use]
    pub fn age(&self) -> f64 {
        self.age
    }

    /// Where the clone is flying to, once known.
    #[must_use]
    pub fn target(&self) -> Option<WorldRect> {
        self.to
    }

    /// Returns `true` once the handoff signal was emitted.
    #[must_use]
    pub fn handed_off(&self) -> bool {
        self.handed_off
    }
}

/// Owns the single [`TransitionSession`].
#[derive(Debug)]
pub struct TransitionCoordinator {
    config: TransitionConfig,
    session: Option<TransitionSession>,
    bus: Rc<EventHub<Signal>>,
    tracer: Tracer,
}

impl TransitionCoordinator {
    /// Creates an idle coordinator that signals on `bus`.
    #[must_use]
    pub fn new(config: TransitionConfig, bus: Rc<EventHub<Signal>>) -> Self {
        Self {
            config,
            session: None,
            bus,
            tracer: Tracer::none(),
        }
    }

    /// Attaches a tracer.
    pub fn set_tracer(&mut self, tracer: Tracer) {
        self.tracer = tracer;
    }

    /// Timing and shape.
    #[must_use]
    pub fn config(&self) -> TransitionConfig {
        self.config
    }

    /// Current state ([`TransitionState::Idle`] without a session).
    #[must_use]
    pub fn state(&self) -> TransitionState {
        self.session
            .as_ref()
            .map_or(TransitionState::Idle, |s| s.state)
    }

    /// The open session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&TransitionSession> {
        self.session.as_ref()
    }

    /// Opens a session flying `request.mesh` toward the next page.
    ///
    /// Does nothing on screens narrower than
    /// [`mobile_breakpoint`](TransitionConfig::mobile_breakpoint) or when the
    /// mesh is not a live mesh. Any open session is cancelled first.
    /// Returns `true` if a session was opened.
    pub fn prepare(&mut self, scene: &mut Scene, request: &PrepareRequest, screen: Size) -> bool {
        if screen.width < self.config.mobile_breakpoint {
            let state = self.state();
            self.tracer
                .transition(state, state, TransitionReason::Suppressed);
            return false;
        }
        let source = request.mesh;
        if !scene.is_alive(source) {
            return false;
        }
        let (Some(geometry), Some(source_material)) =
            (
                scene.mesh_geometry(source).filter(|&g| scene.has_geometry(g)),
                scene.mesh_material(source),
            )
        else {
            return false;
        };

        self.cancel(scene);

        let mut material = scene.material(source_material).clone();
        material.set_float(uniforms::OPACITY, 1.0);
        let settle_from = (
            SETTLE_FLOATS.map(|(name, settled)| material.float(name).unwrap_or(settled)),
            SETTLE_VEC2S.map(|name| material.vec2(name).unwrap_or([0.0, 0.0])),
        );
        let shape = scene.geometry(geometry);
        let (width, height) = (shape.width(), shape.height());
        let image_aspect = material
            .texture()
            .map_or_else(|| shape.aspect(), |t| t.aspect());
        let material = scene.add_material(material);

        let clone = scene.create_mesh(geometry, material);
        let root = scene.root();
        scene.add_child(root, clone);
        let mut position = scene.position(source);
        if let Some([x, y]) = request.start_position
            && x.is_finite()
            && y.is_finite()
        {
            position[0] = x;
            position[1] = y;
        }
        scene.set_position(clone, position);
        scene.set_rotation(clone, scene.rotation(source));
        scene.set_visible(clone, true);
        scene.set_visible(source, false);

        self.session = Some(TransitionSession {
            state: TransitionState::WaitingForTarget,
            cloned_mesh: clone,
            source,
            target_url: request.target_url.clone(),
            source_page: request.source_page.clone(),
            material,
            geometry,
            owns_geometry: false,
            image_aspect,
            from: WorldRect {
                center: Point::new(position[0], position[1]),
                size: Size::new(width, height),
            },
            to: None,
            z: position[2],
            age: 0.0,
            flight: 0.0,
            abort: None,
            handed_off: false,
            settle_from,
        });
        self.tracer.transition(
            TransitionState::Idle,
            TransitionState::WaitingForTarget,
            TransitionReason::Prepared,
        );
        true
    }

    /// Starts the flight toward `ready.rect`.
    ///
    /// Ignored unless a session is waiting (and has not timed out).
    pub fn on_target_ready(&mut self, ready: &TargetReady) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state != TransitionState::WaitingForTarget || session.abort.is_some() {
            return;
        }
        let projection = Projection::new(ready.viewport, ready.screen);
        session.to = Some(projection.dom_to_world(ready.rect));
        session.state = TransitionState::Animating;
        session.flight = 0.0;
        self.tracer.transition(
            TransitionState::WaitingForTarget,
            TransitionState::Animating,
            TransitionReason::TargetReady,
        );
    }

    /// Advances the session by `dt` seconds.
    pub fn advance(&mut self, scene: &mut Scene, dt: f64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let config = self.config;
        session.age += dt;
        adopt_geometry(scene, session, &config);
        settle(scene, session, &config);

        match session.state {
            TransitionState::WaitingForTarget => {
                if let Some(abort) = session.abort.as_mut() {
                    *abort += dt;
                    let p = Track::new(0.0, config.abort_fade, Ease::Linear).progress(*abort);
                    scene
                        .material_mut(session.material)
                        .set_float(uniforms::OPACITY, 1.0 - p);
                    if p >= 1.0 {
                        self.finish(scene, TransitionReason::TimedOut);
                    }
                } else if session.age >= config.target_timeout {
                    session.abort = Some(0.0);
                }
            }
            TransitionState::Animating => {
                session.flight = (session.flight + dt).min(config.duration);
                fly(scene, session, &config);
                let t = session.flight;
                if !session.handed_off && t >= config.handoff_at {
                    session.handed_off = true;
                    self.bus.emit(WEBGL_TRANSITION_HANDOFF, &Signal::None);
                }
                if t >= config.duration {
                    session.state = TransitionState::Complete;
                    self.tracer.transition(
                        TransitionState::Animating,
                        TransitionState::Complete,
                        TransitionReason::Completed,
                    );
                    self.finish(scene, TransitionReason::Completed);
                    self.bus.emit(WEBGL_TRANSITION_COMPLETE, &Signal::None);
                }
            }
            TransitionState::Idle | TransitionState::Complete => {}
        }
    }

    /// Removes the clone, disposes everything the session owns and restores
    /// the source quad. Does nothing when idle.
    pub fn cancel(&mut self, scene: &mut Scene) {
        self.finish(scene, TransitionReason::Cancelled);
    }

    fn finish(&mut self, scene: &mut Scene, reason: TransitionReason) {
        let Some(session) = self.session.take() else {
            return;
        };
        if scene.is_alive(session.cloned_mesh) {
            scene.destroy_node(session.cloned_mesh);
        }
        if session.owns_geometry {
            scene.dispose_geometry(session.geometry);
        }
        scene.dispose_material(session.material);
        if scene.is_alive(session.source) {
            scene.set_visible(session.source, true);
        }
        self.tracer
            .transition(session.state, TransitionState::Idle, reason);
    }
}

/// Gives the clone a plane of its own when the shared source geometry was
/// disposed under it (a surface resize or a page rebuild).
fn adopt_geometry(scene: &mut Scene, session: &mut TransitionSession, config: &TransitionConfig) {
    if scene.has_geometry(session.geometry) {
        return;
    }
    let size = session.from.size;
    let geometry = scene.add_geometry(PlaneGeometry::new(
        size.width,
        size.height,
        config.segments,
        config.segments,
    ));
    if scene.is_alive(session.cloned_mesh) {
        scene.set_mesh_geometry(session.cloned_mesh, geometry);
    }
    session.geometry = geometry;
    session.owns_geometry = true;
}

/// Eases transient interaction uniforms on the clone to their settled values.
fn settle(scene: &mut Scene, session: &TransitionSession, config: &TransitionConfig) {
    let p = Track::new(0.0, config.settle_duration, Ease::Power2Out).progress(session.age);
    let material = scene.material_mut(session.material);
    for (i, (name, settled)) in SETTLE_FLOATS.iter().enumerate() {
        material.set_float(name, lerp(session.settle_from.0[i], *settled, p));
    }
    for (i, name) in SETTLE_VEC2S.iter().enumerate() {
        let from = session.settle_from.1[i];
        material.set_vec2(name, [lerp(from[0], 0.0, p), lerp(from[1], 0.0, p)]);
    }
}

/// One flight tick: move, rebuild the plane, re-crop, fade.
fn fly(scene: &mut Scene, session: &mut TransitionSession, config: &TransitionConfig) {
    let Some(to) = session.to else {
        return;
    };
    let from = session.from;
    let t = session.flight;
    let p = Track::new(0.0, config.duration, Ease::ExpoInOut).progress(t);

    scene.set_position(
        session.cloned_mesh,
        [
            lerp(from.center.x, to.center.x, p),
            lerp(from.center.y, to.center.y, p),
            session.z,
        ],
    );

    let width = lerp(from.size.width, to.size.width, p);
    let height = lerp(from.size.height, to.size.height, p);
    let mut plane = PlaneGeometry::new(width, height, config.segments, config.segments);
    correct_uvs(
        &mut plane,
        session.image_aspect,
        p,
        config.source_zoom,
        config.target_zoom,
    );
    let geometry = scene.add_geometry(plane);
    scene.set_mesh_geometry(session.cloned_mesh, geometry);
    if session.owns_geometry {
        scene.dispose_geometry(session.geometry);
    }
    session.geometry = geometry;
    session.owns_geometry = true;
    scene.set_scale(session.cloned_mesh, [1.0, 1.0, 1.0]);

    let fade = Track::new(
        config.duration - config.fade_duration,
        config.fade_duration,
        Ease::Linear,
    );
    let material = scene.material_mut(session.material);
    material.set_float(
        uniforms::PAGE_TRANSITION_PROGRESS,
        Track::new(0.0, config.duration, Ease::Linear).progress(t),
    );
    material.set_float(uniforms::OPACITY, 1.0 - fade.progress(t));
}
