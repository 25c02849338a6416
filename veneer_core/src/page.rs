// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Page lifecycle.
//!
//! A [`ScenePage`] wraps one logical page of WebGL content. It is created
//! once, then toggled between active and inactive across navigations:
//!
//! ```text
//! Unborn ──create──▶ Created ──activate──▶ Active ──deactivate──▶ Leaving
//!                                            ▲                       │
//!                                            └──────activate─────────┤
//!                                                                    ▼
//!                                                       Inactive (out hook done)
//! ```
//!
//! [`destroy`](ScenePage::destroy) is terminal and valid from every state.
//! Page-specific content lives in a [`PageBehavior`]; the page owns the
//! scene group, the state machine and the lifecycle events.

use alloc::boxed::Box;
use alloc::collections::BTreeSet;
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::Cell;
use core::fmt;
use core::future::Future;
use core::pin::Pin;

use crate::clock::ClockSnapshot;
use crate::dom::{DomElement, MarkerConfig};
use crate::events::EventHub;
use crate::scene::{NodeId, NodeKind, Scene};
use crate::signals::{PageId, Signal, enter_ready};
use crate::texture::TextureCache;
use crate::trace::Tracer;
use crate::viewport::Projection;

/// Lifecycle event: content was built (once per page).
pub const CREATE: &str = "create";
/// Lifecycle event: activation started.
pub const ENTER: &str = "enter";
/// Lifecycle event: deactivation started.
pub const LEAVE: &str = "leave";
/// Lifecycle event: the page was destroyed.
pub const DESTROY: &str = "destroy";

/// Where a page is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PageLifecycleState {
    /// Not built yet.
    #[default]
    Unborn,
    /// Built, never activated.
    Created,
    /// Visible and updating.
    Active,
    /// Deactivated; waiting for the out hook to finish.
    Leaving,
    /// Hidden.
    Inactive,
    /// Torn down for good.
    Destroyed,
}

/// A failed page `load`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageError {
    /// An asset needed by the page could not be loaded.
    Load(String),
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(msg) => write!(f, "page asset failed to load: {msg}"),
        }
    }
}

impl core::error::Error for PageError {}

/// Future returned by [`PageBehavior::load`].
pub type PageLoad = Pin<Box<dyn Future<Output = Result<(), PageError>>>>;

/// A one-shot completion flag handed to the transition hooks.
///
/// Hooks may fire it right away or keep it and fire it from a later
/// [`update`](PageBehavior::update) once their animation settles.
#[derive(Clone, Debug, Default)]
pub struct Completion(Rc<Cell<bool>>);

impl Completion {
    fn new() -> Self {
        Self::default()
    }

    /// Marks the hook as finished.
    pub fn complete(&self) {
        self.0.set(true);
    }

    /// Returns `true` once [`complete`](Self::complete) was called.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.0.get()
    }
}

/// Collaborators shared by every page, lent for the duration of one call.
pub struct PageEnv<'a> {
    /// The scene graph.
    pub scene: &'a mut Scene,
    /// Current pixel ↔ world projection.
    pub projection: Projection,
    /// The shared texture cache.
    pub textures: &'a TextureCache,
    /// The process-wide signal hub.
    pub bus: &'a EventHub<Signal>,
    /// DOM marker vocabulary.
    pub markers: MarkerConfig,
    /// Trace handle.
    pub tracer: &'a Tracer,
}

impl fmt::Debug for PageEnv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageEnv")
            .field("projection", &self.projection)
            .finish_non_exhaustive()
    }
}

/// What a [`PageBehavior`] sees: the shared environment plus the page's
/// own group.
pub struct PageContext<'a> {
    /// The scene graph.
    pub scene: &'a mut Scene,
    /// The page's group. Content added under it is shown, hidden and
    /// disposed together with the page.
    pub group: NodeId,
    /// Current pixel ↔ world projection.
    pub projection: Projection,
    /// The shared texture cache.
    pub textures: &'a TextureCache,
    /// The process-wide signal hub.
    pub bus: &'a EventHub<Signal>,
    /// DOM marker vocabulary.
    pub markers: MarkerConfig,
}

impl fmt::Debug for PageContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageContext")
            .field("group", &self.group)
            .field("projection", &self.projection)
            .finish_non_exhaustive()
    }
}

impl<'a> PageContext<'a> {
    fn new(env: &'a mut PageEnv<'_>, group: NodeId) -> Self {
        Self {
            scene: &mut *env.scene,
            group,
            projection: env.projection,
            textures: env.textures,
            bus: env.bus,
            markers: env.markers,
        }
    }
}

/// Page-specific content and animation.
///
/// Only [`build`](Self::build) is required.
pub trait PageBehavior<E: DomElement> {
    /// Loads assets before the first activation.
    fn load(&mut self, textures: &TextureCache) -> PageLoad {
        _ = textures;
        Box::pin(core::future::ready(Ok(())))
    }

    /// Builds content under `cx.group` from the incoming document.
    fn build(&mut self, cx: &mut PageContext<'_>, root: &E);

    /// Starts the intro animation. Fire `done` when it settles.
    fn transition_in(&mut self, cx: &mut PageContext<'_>, root: &E, done: Completion) {
        _ = (cx, root);
        done.complete();
    }

    /// Starts the outro animation. Fire `done` when it settles; the page is
    /// hidden then.
    fn transition_out(&mut self, cx: &mut PageContext<'_>, root: &E, done: Completion) {
        _ = (cx, root);
        done.complete();
    }

    /// Per-frame logic. Only called while the page is active or leaving.
    fn update(&mut self, cx: &mut PageContext<'_>, clock: &ClockSnapshot) {
        _ = (cx, clock);
    }

    /// The projection changed.
    fn resize(&mut self, cx: &mut PageContext<'_>) {
        _ = cx;
    }

    /// Releases state the page group does not cover, such as listeners.
    fn on_destroy(&mut self, cx: &mut PageContext<'_>) {
        _ = cx;
    }

    /// Returns `true` if content built earlier no longer matches `root` and
    /// must be rebuilt before activation.
    fn needs_recreate(&self, root: &E) -> bool {
        _ = root;
        false
    }
}

/// One logical page of WebGL content.
pub struct ScenePage<E: DomElement> {
    id: PageId,
    behavior: Box<dyn PageBehavior<E>>,
    state: PageLifecycleState,
    group: Option<NodeId>,
    active: bool,
    entering: Option<Completion>,
    leaving: Option<Completion>,
    events: EventHub,
}

impl<E: DomElement> fmt::Debug for ScenePage<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenePage")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("group", &self.group)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl<E: DomElement> ScenePage<E> {
    /// Wraps `behavior` as page `id`. Nothing is built until
    /// [`create`](Self::create).
    #[must_use]
    pub fn new(id: PageId, behavior: Box<dyn PageBehavior<E>>) -> Self {
        Self {
            id,
            behavior,
            state: PageLifecycleState::Unborn,
            group: None,
            active: false,
            entering: None,
            leaving: None,
            events: EventHub::new(),
        }
    }

    /// The page identity.
    #[must_use]
    pub fn id(&self) -> &PageId {
        &self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PageLifecycleState {
        self.state
    }

    /// Returns `true` between activation and the end of the out hook.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns `true` once content has been built.
    #[must_use]
    pub fn is_created(&self) -> bool {
        !matches!(
            self.state,
            PageLifecycleState::Unborn | PageLifecycleState::Destroyed
        )
    }

    /// The page's group, once created.
    #[must_use]
    pub fn group(&self) -> Option<NodeId> {
        self.group
    }

    /// Lifecycle events ([`CREATE`], [`ENTER`], [`LEAVE`], [`DESTROY`]).
    #[must_use]
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Starts the behaviour's asset load.
    pub fn load(&mut self, textures: &TextureCache) -> PageLoad {
        self.behavior.load(textures)
    }

    /// Builds the page under a fresh, hidden group. Does nothing once
    /// created (or destroyed).
    pub fn create(&mut self, env: &mut PageEnv<'_>, root: &E) {
        if self.state != PageLifecycleState::Unborn {
            return;
        }
        let group = self.build_group(env, root);
        self.group = Some(group);
        self.set_state(env.tracer, PageLifecycleState::Created);
        self.events.notify(CREATE);
    }

    /// Tears content down and builds it again from `root`, keeping the
    /// lifecycle state and visibility. Does not fire [`CREATE`].
    pub fn recreate(&mut self, env: &mut PageEnv<'_>, root: &E) {
        let Some(old) = self.group else {
            return;
        };
        let visible = env.scene.visible(old);
        self.teardown(env, old);
        let group = self.build_group(env, root);
        env.scene.set_visible(group, visible);
        self.group = Some(group);
    }

    /// Shows the page and starts its intro. [`ENTER`] fires immediately.
    ///
    /// A pending out hook is abandoned: its completion no longer hides the
    /// page.
    pub fn activate(&mut self, env: &mut PageEnv<'_>, root: &E) {
        if self.group.is_none() {
            return;
        }
        if self.behavior.needs_recreate(root) {
            self.recreate(env, root);
        }
        let Some(group) = self.group else {
            return;
        };
        self.leaving = None;
        env.scene.set_visible(group, true);
        self.active = true;
        self.set_state(env.tracer, PageLifecycleState::Active);
        self.events.notify(ENTER);

        let done = Completion::new();
        self.entering = Some(done.clone());
        self.behavior
            .transition_in(&mut PageContext::new(env, group), root, done);
        self.poll_hooks(env);
    }

    /// Starts the outro. [`LEAVE`] fires immediately; the group is hidden
    /// when the out hook completes.
    pub fn deactivate(&mut self, env: &mut PageEnv<'_>, root: &E) {
        let Some(group) = self.group else {
            return;
        };
        if self.state != PageLifecycleState::Active {
            return;
        }
        self.entering = None;
        self.set_state(env.tracer, PageLifecycleState::Leaving);
        self.events.notify(LEAVE);

        let done = Completion::new();
        self.leaving = Some(done.clone());
        self.behavior
            .transition_out(&mut PageContext::new(env, group), root, done);
        self.poll_hooks(env);
    }

    /// Runs per-frame logic. Returns immediately unless active.
    pub fn update(&mut self, env: &mut PageEnv<'_>, clock: &ClockSnapshot) {
        if !self.active {
            return;
        }
        let Some(group) = self.group else {
            return;
        };
        self.behavior
            .update(&mut PageContext::new(env, group), clock);
        self.poll_hooks(env);
    }

    /// Forwards a projection change to the behaviour.
    pub fn resize(&mut self, env: &mut PageEnv<'_>) {
        if let Some(group) = self.group {
            self.behavior.resize(&mut PageContext::new(env, group));
        }
    }

    /// Disposes every geometry and material under the page group once,
    /// removes the group and fires [`DESTROY`]. Safe from every state;
    /// later calls do nothing.
    pub fn destroy(&mut self, env: &mut PageEnv<'_>) {
        if self.state == PageLifecycleState::Destroyed {
            return;
        }
        if let Some(group) = self.group.take() {
            self.teardown(env, group);
        }
        self.active = false;
        self.entering = None;
        self.leaving = None;
        self.set_state(env.tracer, PageLifecycleState::Destroyed);
        self.events.notify(DESTROY);
    }

    fn build_group(&mut self, env: &mut PageEnv<'_>, root: &E) -> NodeId {
        let group = env.scene.create_group();
        let parent = env.scene.root();
        env.scene.add_child(parent, group);
        env.scene.set_visible(group, false);
        self.behavior.build(&mut PageContext::new(env, group), root);
        group
    }

    fn teardown(&mut self, env: &mut PageEnv<'_>, group: NodeId) {
        self.behavior.on_destroy(&mut PageContext::new(env, group));
        if !env.scene.is_alive(group) {
            return;
        }
        let mut geometries = BTreeSet::new();
        let mut materials = BTreeSet::new();
        for node in env.scene.descendants(group) {
            if let NodeKind::Mesh {
                geometry,
                materials: mats,
            } = env.scene.kind(node)
            {
                geometries.insert(*geometry);
                materials.extend(mats.iter().copied());
            }
        }
        for geometry in geometries {
            env.scene.dispose_geometry(geometry);
        }
        for material in materials {
            env.scene.dispose_material(material);
        }
        env.scene.destroy_subtree(group);
    }

    fn poll_hooks(&mut self, env: &mut PageEnv<'_>) {
        if self.entering.as_ref().is_some_and(Completion::is_complete) {
            self.entering = None;
            env.bus.emit(&enter_ready(&self.id), &Signal::None);
        }
        if self.leaving.as_ref().is_some_and(Completion::is_complete) {
            self.leaving = None;
            self.active = false;
            if let Some(group) = self.group {
                env.scene.set_visible(group, false);
            }
            self.set_state(env.tracer, PageLifecycleState::Inactive);
        }
    }

    fn set_state(&mut self, tracer: &Tracer, to: PageLifecycleState) {
        if self.state != to {
            tracer.page(&self.id, self.state, to);
            self.state = to;
        }
    }
}
