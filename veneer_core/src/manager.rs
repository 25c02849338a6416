// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene ownership, page routing and the render call.
//!
//! [`SceneManager`] owns the [`Scene`], the [`Camera`], the [`Renderer`] and
//! the [`FrameClock`], plus a registry mapping [`PageId`]s to page
//! factories. Pages are instantiated on first activation and cached until
//! [`destroy`](SceneManager::destroy).
//!
//! Page `load` futures are polled from the frame path. An activation whose
//! load is still pending when a newer [`on_change`](SceneManager::on_change)
//! arrives is dropped in favour of the newer one.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use core::fmt;
use core::task::Poll;

use kurbo::Size;

use crate::clock::{ClockConfig, ClockSnapshot, FrameClock};
use crate::dom::{DomElement, MarkerConfig};
use crate::events::EventHub;
use crate::page::{PageBehavior, PageEnv, PageLoad, ScenePage};
use crate::scene::{Scene, Transform3d};
use crate::signals::{PageId, Signal};
use crate::texture::TextureCache;
use crate::time::HostTime;
use crate::trace::{PhaseKind, Tracer};
use crate::viewport::{Projection, Viewport};

/// Perspective camera parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov_degrees: f64,
    /// Distance from the camera to the `z = 0` plane.
    pub distance: f64,
    /// Near clip plane.
    pub near: f64,
    /// Far clip plane.
    pub far: f64,
}

impl CameraConfig {
    /// 45° field of view, ten units back.
    #[must_use]
    pub const fn web() -> Self {
        Self {
            fov_degrees: 45.0,
            distance: 10.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::web()
    }
}

/// A perspective camera on the `+Z` axis looking at the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    config: CameraConfig,
    aspect: f64,
}

impl Camera {
    /// Creates a camera with the given aspect ratio.
    #[must_use]
    pub fn new(config: CameraConfig, aspect: f64) -> Self {
        Self { config, aspect }
    }

    /// The camera parameters.
    #[must_use]
    pub fn config(&self) -> CameraConfig {
        self.config
    }

    /// Width over height.
    #[must_use]
    pub fn aspect(&self) -> f64 {
        self.aspect
    }

    /// Updates the aspect ratio.
    pub fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect;
    }

    /// The visible extent of the `z = 0` plane.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        Viewport::from_camera(self.config.fov_degrees, self.aspect, self.config.distance)
    }

    /// World → view transform.
    #[must_use]
    pub fn view_matrix(&self) -> Transform3d {
        Transform3d::from_translation(0.0, 0.0, -self.config.distance)
    }

    /// View → clip transform.
    #[must_use]
    pub fn projection_matrix(&self) -> Transform3d {
        Transform3d::perspective(
            self.config.fov_degrees,
            self.aspect,
            self.config.near,
            self.config.far,
        )
    }
}

/// Draws the scene.
///
/// The web backend implements this over WebGL2; tests use a recorder.
pub trait Renderer {
    /// Draws every visible mesh and releases GPU state for resources
    /// disposed since the previous call.
    fn render(&mut self, scene: &mut Scene, camera: &Camera);

    /// Resizes the output surface, in CSS pixels.
    fn set_size(&mut self, width: f64, height: f64);

    /// Releases every GPU resource and detaches the output surface.
    fn dispose(&mut self);
}

/// Creates a page behaviour on first activation.
pub type PageFactory<E> = Box<dyn Fn() -> Box<dyn PageBehavior<E>>>;

struct PendingActivation<E: DomElement> {
    page: PageId,
    root: E,
    load: PageLoad,
}

/// Owns the scene and routes activation between cached pages.
pub struct SceneManager<E: DomElement> {
    scene: Scene,
    camera: Camera,
    screen: Size,
    renderer: Box<dyn Renderer>,
    clock: FrameClock,
    registry: BTreeMap<PageId, PageFactory<E>>,
    pages: BTreeMap<PageId, ScenePage<E>>,
    active: Option<PageId>,
    pending: Option<PendingActivation<E>>,
    textures: Rc<TextureCache>,
    bus: Rc<EventHub<Signal>>,
    markers: MarkerConfig,
    tracer: Tracer,
    destroyed: bool,
}

impl<E: DomElement> fmt::Debug for SceneManager<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneManager")
            .field("camera", &self.camera)
            .field("screen", &self.screen)
            .field("registered", &self.registry.keys().collect::<alloc::vec::Vec<_>>())
            .field("cached", &self.pages.len())
            .field("active", &self.active)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

/// Builds the [`PageEnv`] from disjoint manager fields.
macro_rules! page_env {
    ($self:ident) => {
        PageEnv {
            scene: &mut $self.scene,
            projection: Projection::new($self.camera.viewport(), $self.screen),
            textures: &$self.textures,
            bus: &$self.bus,
            markers: $self.markers,
            tracer: &$self.tracer,
        }
    };
}

impl<E: DomElement> SceneManager<E> {
    /// Creates a manager for a `screen`-sized output surface.
    pub fn new(
        renderer: Box<dyn Renderer>,
        textures: Rc<TextureCache>,
        bus: Rc<EventHub<Signal>>,
        screen: Size,
        now: HostTime,
        camera: CameraConfig,
        clock: ClockConfig,
    ) -> Self {
        let mut manager = Self {
            scene: Scene::new(),
            camera: Camera::new(camera, aspect_of(screen)),
            screen,
            renderer,
            clock: FrameClock::new(now, clock),
            registry: BTreeMap::new(),
            pages: BTreeMap::new(),
            active: None,
            pending: None,
            textures,
            bus,
            markers: MarkerConfig::web(),
            tracer: Tracer::none(),
            destroyed: false,
        };
        manager.renderer.set_size(screen.width, screen.height);
        manager
    }

    /// Attaches a tracer to the manager, its clock and its pages.
    pub fn set_tracer(&mut self, tracer: Tracer) {
        self.clock.set_tracer(tracer.clone());
        self.tracer = tracer;
    }

    /// Replaces the DOM marker vocabulary.
    pub fn set_markers(&mut self, markers: MarkerConfig) {
        self.markers = markers;
    }

    /// Registers the factory for page `id`. Re-registering replaces the
    /// factory for pages not yet instantiated.
    pub fn register(
        &mut self,
        id: impl Into<PageId>,
        factory: impl Fn() -> Box<dyn PageBehavior<E>> + 'static,
    ) {
        self.registry.insert(id.into(), Box::new(factory));
    }

    /// Returns `true` if `id` has a factory.
    #[must_use]
    pub fn is_registered(&self, id: &PageId) -> bool {
        self.registry.contains_key(id)
    }

    /// Finds the page identity for an incoming document.
    ///
    /// The page marker on `root` or any descendant wins. Otherwise path
    /// segments of `url_path` are matched against registered identities,
    /// with `/` mapping to [`PageId::HOME`]. Returns `None` when nothing
    /// matches.
    #[must_use]
    pub fn detect_page_identity(&self, root: &E, url_path: &str) -> Option<PageId> {
        let attr = self.markers.page_attribute;
        let marked = root
            .attribute(attr)
            .or_else(|| {
                root.query_selector(self.markers.page_selector)
                    .and_then(|el| el.attribute(attr))
            })
            .filter(|v| !v.is_empty());
        if let Some(id) = marked {
            return Some(PageId::new(id));
        }

        let path = url_path.split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
        if segments.peek().is_none() {
            let home = PageId::new(PageId::HOME);
            return self.is_registered(&home).then_some(home);
        }
        segments
            .map(PageId::new)
            .find(|id| self.is_registered(id))
    }

    /// Routes activation to `page`.
    ///
    /// `None` or an unregistered identity deactivates the current page and
    /// leaves none active. Otherwise the page is instantiated if needed, the
    /// previous page is deactivated, and the page is loaded, created and
    /// activated. The load may finish on a later frame.
    pub fn on_change(&mut self, page: Option<PageId>, root: &E) {
        if self.destroyed {
            return;
        }
        self.pending = None;

        let page = page.filter(|id| self.registry.contains_key(id));
        let Some(id) = page else {
            self.deactivate_current(root);
            return;
        };

        if !self.pages.contains_key(&id)
            && let Some(factory) = self.registry.get(&id)
        {
            self.pages
                .insert(id.clone(), ScenePage::new(id.clone(), factory()));
        }

        self.deactivate_current(root);

        let Some(page) = self.pages.get_mut(&id) else {
            return;
        };
        if page.is_created() {
            {
                let mut env = page_env!(self);
                page.activate(&mut env, root);
            }
            self.active = Some(id);
            return;
        }

        let load = page.load(&self.textures);
        self.pending = Some(PendingActivation {
            page: id,
            root: root.clone(),
            load,
        });
        self.poll_pending();
    }

    /// Identity of the active page.
    #[must_use]
    pub fn active_page(&self) -> Option<&PageId> {
        self.active.as_ref()
    }

    /// Identity of the page whose load is still pending.
    #[must_use]
    pub fn pending_page(&self) -> Option<&PageId> {
        self.pending.as_ref().map(|p| &p.page)
    }

    /// A cached page.
    #[must_use]
    pub fn page(&self, id: &PageId) -> Option<&ScenePage<E>> {
        self.pages.get(id)
    }

    /// Number of cached pages.
    #[must_use]
    pub fn cached_pages(&self) -> usize {
        self.pages.len()
    }

    /// Advances the clock. Returns the snapshot when a frame should run.
    pub fn tick(&mut self, now: HostTime) -> Option<ClockSnapshot> {
        self.clock.tick(now)
    }

    /// Updates every cached page, then renders once.
    pub fn render_frame(&mut self, clock: &ClockSnapshot) {
        if self.destroyed {
            return;
        }
        self.poll_pending();

        self.tracer.phase_begin(clock.frame_index, PhaseKind::Update);
        {
            let mut env = page_env!(self);
            for page in self.pages.values_mut() {
                page.update(&mut env, clock);
            }
        }
        self.tracer.phase_end(clock.frame_index, PhaseKind::Update);

        self.tracer.phase_begin(clock.frame_index, PhaseKind::Render);
        self.renderer.render(&mut self.scene, &self.camera);
        self.tracer.phase_end(clock.frame_index, PhaseKind::Render);
    }

    /// Adopts a new screen size: camera aspect, renderer size, and the
    /// active page's `resize`.
    pub fn handle_resize(&mut self, screen: Size) {
        if self.destroyed {
            return;
        }
        self.screen = screen;
        self.camera.set_aspect(aspect_of(screen));
        self.renderer.set_size(screen.width, screen.height);
        if let Some(page) = self.active.as_ref().and_then(|id| self.pages.get_mut(id)) {
            let mut env = page_env!(self);
            page.resize(&mut env);
        }
    }

    /// Stops the clock, deactivates and destroys every cached page and
    /// disposes the renderer. Later calls do nothing.
    pub fn destroy(&mut self, root: &E) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.clock.stop();
        self.pending = None;
        self.active = None;
        {
            let mut env = page_env!(self);
            for page in self.pages.values_mut() {
                page.deactivate(&mut env, root);
                page.destroy(&mut env);
            }
        }
        self.pages.clear();
        self.renderer.render(&mut self.scene, &self.camera);
        self.renderer.dispose();
    }

    /// Returns `true` once destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// The scene graph.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The scene graph, mutably.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// The camera.
    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Screen size in CSS pixels.
    #[must_use]
    pub fn screen(&self) -> Size {
        self.screen
    }

    /// The current pixel ↔ world projection.
    #[must_use]
    pub fn projection(&self) -> Projection {
        Projection::new(self.camera.viewport(), self.screen)
    }

    /// The frame clock.
    #[must_use]
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// The frame clock, mutably (play/pause).
    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }

    /// The shared texture cache.
    #[must_use]
    pub fn textures(&self) -> &Rc<TextureCache> {
        &self.textures
    }

    /// The process-wide signal hub.
    #[must_use]
    pub fn bus(&self) -> &Rc<EventHub<Signal>> {
        &self.bus
    }

    /// The DOM marker vocabulary.
    #[must_use]
    pub fn markers(&self) -> MarkerConfig {
        self.markers
    }

    fn deactivate_current(&mut self, root: &E) {
        let Some(id) = self.active.take() else {
            return;
        };
        if let Some(page) = self.pages.get_mut(&id) {
            let mut env = page_env!(self);
            page.deactivate(&mut env, root);
        }
    }

    fn poll_pending(&mut self) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let result = match crate::poll_now(&mut pending.load) {
            Poll::Pending => return,
            Poll::Ready(result) => result,
        };
        let Some(PendingActivation { page: id, root, .. }) = self.pending.take() else {
            return;
        };
        let Some(page) = self.pages.get_mut(&id) else {
            return;
        };
        if let Err(error) = &result {
            self.tracer.page_load_failed(&id, error);
        }
        {
            let mut env = page_env!(self);
            page.create(&mut env, &root);
            page.activate(&mut env, &root);
        }
        self.active = Some(id);
    }
}

fn aspect_of(screen: Size) -> f64 {
    if screen.height > 0.0 {
        screen.width / screen.height
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use core::cell::{Cell, RefCell};

    use super::*;
    use crate::page::{Completion, PageContext, PageError, PageLifecycleState};
    use crate::testing::{FakeElement, ManualTextures, RecordingRenderer};

    #[derive(Default)]
    struct Counters {
        built: Cell<u32>,
        updates: Cell<u32>,
        resizes: Cell<u32>,
    }

    struct Simple {
        counters: Rc<Counters>,
        load: Rc<RefCell<Option<PageLoad>>>,
    }

    impl PageBehavior<FakeElement> for Simple {
        fn load(&mut self, textures: &TextureCache) -> PageLoad {
            _ = textures;
            self.load
                .borrow_mut()
                .take()
                .unwrap_or_else(|| Box::pin(core::future::ready(Ok(()))))
        }

        fn build(&mut self, _: &mut PageContext<'_>, _: &FakeElement) {
            self.counters.built.set(self.counters.built.get() + 1);
        }

        fn update(&mut self, _: &mut PageContext<'_>, _: &ClockSnapshot) {
            self.counters.updates.set(self.counters.updates.get() + 1);
        }

        fn resize(&mut self, _: &mut PageContext<'_>) {
            self.counters.resizes.set(self.counters.resizes.get() + 1);
        }

        fn transition_out(&mut self, _: &mut PageContext<'_>, _: &FakeElement, done: Completion) {
            done.complete();
        }
    }

    struct Fixture {
        manager: SceneManager<FakeElement>,
        renderer: RecordingRenderer,
        counters: BTreeMap<&'static str, Rc<Counters>>,
    }

    fn fixture(pages: &[&'static str]) -> Fixture {
        let renderer = RecordingRenderer::default();
        let textures = Rc::new(TextureCache::new(Rc::new(ManualTextures::default())));
        let mut manager = SceneManager::new(
            Box::new(renderer.clone()),
            textures,
            Rc::new(EventHub::new()),
            Size::new(1600.0, 900.0),
            HostTime::from_millis_f64(0.0),
            CameraConfig::web(),
            ClockConfig::web(),
        );
        let mut counters = BTreeMap::new();
        for &name in pages {
            let c = Rc::new(Counters::default());
            counters.insert(name, Rc::clone(&c));
            manager.register(name, move || {
                Box::new(Simple {
                    counters: Rc::clone(&c),
                    load: Rc::new(RefCell::new(None)),
                }) as Box<dyn PageBehavior<FakeElement>>
            });
        }
        Fixture {
            manager,
            renderer,
            counters,
        }
    }

    fn id(s: &str) -> PageId {
        PageId::new(s)
    }

    #[test]
    fn camera_viewport_matches_fov() {
        let camera = Camera::new(CameraConfig::web(), 2.0);
        let vp = camera.viewport();
        // 2 · tan(22.5°) · 10
        let expected = 8.284_271_247_461_901;
        assert!((vp.height - expected).abs() < 1e-12);
        assert!((vp.width - 2.0 * expected).abs() < 1e-12);
    }

    #[test]
    fn detect_prefers_marker_then_path() {
        let f = fixture(&["home", "work", "about"]);
        let root = FakeElement::new("main");
        assert_eq!(f.manager.detect_page_identity(&root, "/"), Some(id("home")));
        assert_eq!(
            f.manager.detect_page_identity(&root, "/work/project-a?x=1"),
            Some(id("work"))
        );
        assert_eq!(f.manager.detect_page_identity(&root, "/contact"), None);

        root.append(FakeElement::new("section").with_attr("data-webgl-page", "about"));
        assert_eq!(
            f.manager.detect_page_identity(&root, "/work"),
            Some(id("about")),
            "marker wins over the path"
        );
        root.set_attr("data-webgl-page", "work");
        assert_eq!(f.manager.detect_page_identity(&root, "/"), Some(id("work")));
    }

    #[test]
    fn root_path_without_home_matches_nothing() {
        let f = fixture(&["work"]);
        assert_eq!(
            f.manager.detect_page_identity(&FakeElement::new("main"), "/"),
            None
        );
    }

    #[test]
    fn change_instantiates_lazily_and_caches() {
        let mut f = fixture(&["home", "work"]);
        let root = FakeElement::new("main");
        assert_eq!(f.manager.cached_pages(), 0);

        f.manager.on_change(Some(id("home")), &root);
        assert_eq!(f.manager.active_page(), Some(&id("home")));
        f.manager.on_change(Some(id("work")), &root);
        f.manager.on_change(Some(id("home")), &root);
        assert_eq!(f.manager.cached_pages(), 2);
        assert_eq!(f.counters["home"].built.get(), 1, "revisits reuse the page");
        assert_eq!(
            f.manager.page(&id("work")).unwrap().state(),
            PageLifecycleState::Inactive
        );
    }

    #[test]
    fn change_to_same_page_is_safe() {
        let mut f = fixture(&["home"]);
        let root = FakeElement::new("main");
        f.manager.on_change(Some(id("home")), &root);
        f.manager.on_change(Some(id("home")), &root);
        let page = f.manager.page(&id("home")).unwrap();
        assert!(page.is_active());
        assert!(f.manager.scene().visible(page.group().unwrap()));
    }

    #[test]
    fn change_to_nothing_leaves_no_active_page() {
        let mut f = fixture(&["home"]);
        let root = FakeElement::new("main");
        f.manager.on_change(Some(id("home")), &root);
        f.manager.on_change(None, &root);
        assert_eq!(f.manager.active_page(), None);
        assert!(!f.manager.page(&id("home")).unwrap().is_active());

        f.manager.on_change(Some(id("unregistered")), &root);
        assert_eq!(f.manager.active_page(), None);

        // The loop keeps rendering.
        f.manager.render_frame(&ClockSnapshot::default());
        assert_eq!(f.renderer.log.borrow().frames.len(), 1);
    }

    #[test]
    fn render_updates_every_page_but_only_active_runs() {
        let mut f = fixture(&["home", "work"]);
        let root = FakeElement::new("main");
        f.manager.on_change(Some(id("home")), &root);
        f.manager.on_change(Some(id("work")), &root);
        f.manager.render_frame(&ClockSnapshot::default());
        f.manager.render_frame(&ClockSnapshot::default());
        assert_eq!(f.counters["home"].updates.get(), 0);
        assert_eq!(f.counters["work"].updates.get(), 2);
        assert_eq!(f.renderer.log.borrow().frames.len(), 2, "one render per frame");
    }

    #[test]
    fn resize_reaches_active_page_only() {
        let mut f = fixture(&["home", "work"]);
        let root = FakeElement::new("main");
        f.manager.on_change(Some(id("home")), &root);
        f.manager.on_change(Some(id("work")), &root);
        f.manager.handle_resize(Size::new(800.0, 800.0));
        assert_eq!(f.counters["home"].resizes.get(), 0);
        assert_eq!(f.counters["work"].resizes.get(), 1);
        assert_eq!(f.manager.camera().aspect(), 1.0);
        assert_eq!(
            f.renderer.log.borrow().sizes,
            vec![(1600.0, 900.0), (800.0, 800.0)]
        );
    }

    #[test]
    fn pending_load_activates_on_a_later_frame() {
        let mut f = fixture(&[]);
        let root = FakeElement::new("main");
        let counters = Rc::new(Counters::default());
        let gate = Rc::new(Cell::new(false));
        let slot: Rc<RefCell<Option<PageLoad>>> = Rc::new(RefCell::new(None));
        {
            let gate = Rc::clone(&gate);
            *slot.borrow_mut() = Some(Box::pin(core::future::poll_fn(move |_| {
                if gate.get() {
                    Poll::Ready(Err(PageError::Load("font".into())))
                } else {
                    Poll::Pending
                }
            })));
        }
        let (c, s) = (Rc::clone(&counters), Rc::clone(&slot));
        f.manager.register("home", move || {
            Box::new(Simple {
                counters: Rc::clone(&c),
                load: Rc::clone(&s),
            }) as Box<dyn PageBehavior<FakeElement>>
        });

        f.manager.on_change(Some(id("home")), &root);
        assert_eq!(f.manager.pending_page(), Some(&id("home")));
        assert_eq!(f.manager.active_page(), None);
        f.manager.render_frame(&ClockSnapshot::default());
        assert_eq!(counters.built.get(), 0);

        // A failed load still activates, in a degraded state.
        gate.set(true);
        f.manager.render_frame(&ClockSnapshot::default());
        assert_eq!(f.manager.active_page(), Some(&id("home")));
        assert_eq!(counters.built.get(), 1);
        assert_eq!(f.manager.pending_page(), None);
    }

    #[test]
    fn destroy_tears_everything_down() {
        let mut f = fixture(&["home", "work"]);
        let root = FakeElement::new("main");
        f.manager.on_change(Some(id("home")), &root);
        f.manager.on_change(Some(id("work")), &root);
        f.manager.destroy(&root);
        f.manager.destroy(&root);
        assert!(f.manager.clock().is_stopped());
        assert_eq!(f.manager.cached_pages(), 0);
        assert_eq!(f.manager.scene().node_count(), 1);
        assert!(f.renderer.log.borrow().disposed);
        assert_eq!(f.manager.tick(HostTime::from_millis_f64(16.0)), None);
    }
}
