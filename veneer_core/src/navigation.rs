// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Glue between the document router and the WebGL side.
//!
//! The router calls [`NavigationOrchestrator::on_leave`] before it swaps
//! documents and [`NavigationOrchestrator::on_enter_complete`] once the new
//! root is in place. The host frame callback calls
//! [`NavigationOrchestrator::frame`], which runs, in order:
//!
//! 1. the clock tick,
//! 2. the scroll tick,
//! 3. queued transition signals (`prepare`, `target-ready`),
//! 4. the transition advance,
//! 5. page updates and the render call.
//!
//! Transition signals arriving on the bus are queued rather than handled in
//! place, so a bus handler never re-enters the coordinator.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::dom::DomElement;
use crate::events::EventHub;
use crate::manager::SceneManager;
use crate::signals::{
    Signal, TRANSITION_COMPLETE, TRANSITION_START, WEBGL_TRANSITION_PREPARE,
    WEBGL_TRANSITION_TARGET_READY,
};
use crate::time::HostTime;
use crate::trace::{NavigationPhase, PhaseKind, Tracer};
use crate::transition::{TransitionConfig, TransitionCoordinator};

const NAMESPACE: &str = "veneer:navigation";

/// Smooth-scroll driver.
pub trait ScrollController {
    /// Resumes smooth scrolling.
    fn start(&mut self);
    /// Freezes smooth scrolling.
    fn stop(&mut self);
    /// Jumps to the top.
    fn reset(&mut self);
    /// Advances by one frame.
    fn tick(&mut self, delta_ms: f64);
}

/// DOM component managers that rebind to each new document.
pub trait DomComponents<E: DomElement> {
    /// Re-initializes components under `root`.
    fn reinit(&mut self, root: &E);
}

/// Composes the router hooks with the scene manager and the transition
/// coordinator.
pub struct NavigationOrchestrator<E: DomElement> {
    manager: SceneManager<E>,
    transitions: TransitionCoordinator,
    scroll: Box<dyn ScrollController>,
    components: Box<dyn DomComponents<E>>,
    bus: Rc<EventHub<Signal>>,
    inbox: Rc<RefCell<Vec<Signal>>>,
    outgoing: Option<E>,
    tracer: Tracer,
}

impl<E: DomElement> fmt::Debug for NavigationOrchestrator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationOrchestrator")
            .field("manager", &self.manager)
            .field("transitions", &self.transitions)
            .field("queued", &self.inbox.borrow().len())
            .field("leaving", &self.outgoing.is_some())
            .finish_non_exhaustive()
    }
}

impl<E: DomElement> NavigationOrchestrator<E> {
    /// Wires the orchestrator to the manager's bus.
    pub fn new(
        manager: SceneManager<E>,
        transition: TransitionConfig,
        scroll: Box<dyn ScrollController>,
        components: Box<dyn DomComponents<E>>,
    ) -> Self {
        let bus = Rc::clone(manager.bus());
        let inbox: Rc<RefCell<Vec<Signal>>> = Rc::default();
        for event in [WEBGL_TRANSITION_PREPARE, WEBGL_TRANSITION_TARGET_READY] {
            let inbox = Rc::clone(&inbox);
            bus.on_ns(event, NAMESPACE, move |signal: &Signal| {
                inbox.borrow_mut().push(signal.clone());
            });
        }
        Self {
            transitions: TransitionCoordinator::new(transition, Rc::clone(&bus)),
            manager,
            scroll,
            components,
            bus,
            inbox,
            outgoing: None,
            tracer: Tracer::none(),
        }
    }

    /// Attaches a tracer to every component.
    pub fn set_tracer(&mut self, tracer: Tracer) {
        self.manager.set_tracer(tracer.clone());
        self.transitions.set_tracer(tracer.clone());
        self.tracer = tracer;
    }

    /// The scene manager.
    #[must_use]
    pub fn manager(&self) -> &SceneManager<E> {
        &self.manager
    }

    /// The scene manager, mutably.
    pub fn manager_mut(&mut self) -> &mut SceneManager<E> {
        &mut self.manager
    }

    /// The transition coordinator.
    #[must_use]
    pub fn transitions(&self) -> &TransitionCoordinator {
        &self.transitions
    }

    /// The outgoing root that will be removed on enter, if a navigation is
    /// in progress.
    #[must_use]
    pub fn outgoing_root(&self) -> Option<&E> {
        self.outgoing.as_ref()
    }

    /// The router is about to swap away from `outgoing`.
    ///
    /// When `outgoing` is a loader overlay, the page content root under
    /// `document` is removed on enter instead.
    pub fn on_leave(&mut self, outgoing: &E, document: &E) {
        self.scroll.stop();
        self.bus.emit(TRANSITION_START, &Signal::None);
        let markers = self.manager.markers();
        let removal = if outgoing.has_attribute(markers.loader_attribute) {
            document
                .query_selector(markers.content_selector)
                .unwrap_or_else(|| outgoing.clone())
        } else {
            outgoing.clone()
        };
        self.outgoing = Some(removal);
        self.tracer.navigation(NavigationPhase::Leave, None);
    }

    /// The router has put `incoming` in place for `url_path`.
    pub fn on_enter_complete(&mut self, incoming: &E, url_path: &str) {
        if let Some(outgoing) = self.outgoing.take()
            && !outgoing.same_node(incoming)
        {
            outgoing.remove();
        }
        self.scroll.reset();
        self.scroll.start();
        self.components.reinit(incoming);
        self.bus.emit(TRANSITION_COMPLETE, &Signal::None);

        let page = self.manager.detect_page_identity(incoming, url_path);
        self.tracer.navigation(NavigationPhase::Enter, page.as_ref());
        self.manager.on_change(page, incoming);
    }

    /// Runs one frame at host time `now`.
    ///
    /// Returns `false` once the clock is stopped and the host loop should
    /// end.
    pub fn frame(&mut self, now: HostTime) -> bool {
        let Some(clock) = self.manager.tick(now) else {
            return !self.manager.clock().is_stopped();
        };
        self.scroll.tick(clock.delta_ms);
        self.pump_signals();

        self.tracer.phase_begin(clock.frame_index, PhaseKind::Transition);
        self.transitions
            .advance(self.manager.scene_mut(), clock.delta_ms * 0.001);
        self.tracer.phase_end(clock.frame_index, PhaseKind::Transition);

        self.manager.render_frame(&clock);
        true
    }

    /// Cancels any transition, destroys the manager and unhooks from the bus.
    pub fn destroy(&mut self, root: &E) {
        self.transitions.cancel(self.manager.scene_mut());
        self.manager.destroy(root);
        for event in [WEBGL_TRANSITION_PREPARE, WEBGL_TRANSITION_TARGET_READY] {
            self.bus.off(event, None, Some(NAMESPACE));
        }
        self.inbox.borrow_mut().clear();
    }

    fn pump_signals(&mut self) {
        let queued = core::mem::take(&mut *self.inbox.borrow_mut());
        for signal in queued {
            match signal {
                Signal::Prepare(request) => {
                    let screen = self.manager.screen();
                    self.transitions
                        .prepare(self.manager.scene_mut(), &request, screen);
                }
                Signal::TargetReady(ready) => self.transitions.on_target_ready(&ready),
                Signal::None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::vec;

    use kurbo::{Rect, Size};

    use super::*;
    use crate::clock::ClockConfig;
    use crate::geometry::PlaneGeometry;
    use crate::manager::CameraConfig;
    use crate::material::Material;
    use crate::page::{PageBehavior, PageContext};
    use crate::scene::NodeId;
    use crate::signals::{PageId, PrepareRequest, TargetReady};
    use crate::testing::{FakeElement, ManualTextures, RecordingRenderer};
    use crate::texture::TextureCache;
    use crate::transition::TransitionState;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Scroll(Log);

    impl ScrollController for Scroll {
        fn start(&mut self) {
            self.0.borrow_mut().push("scroll:start".into());
        }
        fn stop(&mut self) {
            self.0.borrow_mut().push("scroll:stop".into());
        }
        fn reset(&mut self) {
            self.0.borrow_mut().push("scroll:reset".into());
        }
        fn tick(&mut self, _: f64) {}
    }

    struct Components(Log);

    impl DomComponents<FakeElement> for Components {
        fn reinit(&mut self, _: &FakeElement) {
            self.0.borrow_mut().push("components:reinit".into());
        }
    }

    /// A page with one quad; records its mesh so tests can click it.
    struct Cards(Rc<RefCell<Option<NodeId>>>);

    impl PageBehavior<FakeElement> for Cards {
        fn build(&mut self, cx: &mut PageContext<'_>, _: &FakeElement) {
            let g = cx.scene.add_geometry(PlaneGeometry::new(2.0, 2.0, 8, 8));
            let m = cx.scene.add_material(Material::surface(None));
            let mesh = cx.scene.create_mesh(g, m);
            cx.scene.add_child(cx.group, mesh);
            *self.0.borrow_mut() = Some(mesh);
        }
    }

    struct Fixture {
        nav: NavigationOrchestrator<FakeElement>,
        log: Log,
        mesh: Rc<RefCell<Option<NodeId>>>,
        renderer: RecordingRenderer,
    }

    fn fixture() -> Fixture {
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
        let mesh = Rc::new(RefCell::new(None));
        let m = Rc::clone(&mesh);
        manager.register("home", move || {
            Box::new(Cards(Rc::clone(&m))) as Box<dyn PageBehavior<FakeElement>>
        });

        let log: Log = Rc::default();
        for event in [TRANSITION_START, TRANSITION_COMPLETE] {
            let log = Rc::clone(&log);
            manager
                .bus()
                .on(event, move |_| log.borrow_mut().push(event.into()));
        }
        let nav = NavigationOrchestrator::new(
            manager,
            TransitionConfig::web(),
            Box::new(Scroll(Rc::clone(&log))),
            Box::new(Components(Rc::clone(&log))),
        );
        Fixture {
            nav,
            log,
            mesh,
            renderer,
        }
    }

    fn ms(v: f64) -> HostTime {
        HostTime::from_millis_f64(v)
    }

    #[test]
    fn leave_then_enter_runs_in_order() {
        let mut f = fixture();
        let document = FakeElement::new("body");
        let old = document.append(FakeElement::new("main").with_attr("data-page-content", ""));
        let new = document.append(FakeElement::new("main").with_attr("data-webgl-page", "home"));

        f.nav.on_leave(&old, &document);
        assert_eq!(*f.log.borrow(), vec!["scroll:stop", "transition:start"]);
        assert!(f.nav.outgoing_root().unwrap().same_node(&old));

        f.nav.on_enter_complete(&new, "/");
        assert!(!old.is_attached(), "outgoing root removed");
        assert!(new.is_attached());
        assert_eq!(
            *f.log.borrow(),
            vec![
                "scroll:stop",
                "transition:start",
                "scroll:reset",
                "scroll:start",
                "components:reinit",
                "transition:complete",
            ]
        );
        assert_eq!(f.nav.manager().active_page(), Some(&PageId::new("home")));
    }

    #[test]
    fn loader_overlay_removes_content_root() {
        let mut f = fixture();
        let document = FakeElement::new("body");
        let loader = document.append(FakeElement::new("div").with_attr("data-loader", ""));
        let content = document.append(FakeElement::new("main").with_attr("data-page-content", ""));
        f.nav.on_leave(&loader, &document);
        assert!(f.nav.outgoing_root().unwrap().same_node(&content));

        let incoming = document.append(FakeElement::new("main"));
        f.nav.on_enter_complete(&incoming, "/nowhere");
        assert!(!content.is_attached());
        assert!(loader.is_attached());
        assert_eq!(f.nav.manager().active_page(), None, "no WebGL for this page");
    }

    #[test]
    fn frame_renders_and_stops_with_the_clock() {
        let mut f = fixture();
        let root = FakeElement::new("main");
        f.nav.on_enter_complete(&root, "/");
        assert!(f.nav.frame(ms(16.0)));
        assert!(f.nav.frame(ms(32.0)));
        assert_eq!(f.renderer.log.borrow().frames.len(), 2);

        f.nav.manager_mut().clock_mut().pause();
        assert!(f.nav.frame(ms(48.0)), "paused clocks keep the loop alive");
        assert_eq!(f.renderer.log.borrow().frames.len(), 2);

        f.nav.destroy(&root);
        assert!(!f.nav.frame(ms(64.0)));
    }

    #[test]
    fn bus_signals_drive_the_transition_on_the_frame_path() {
        let mut f = fixture();
        let root = FakeElement::new("main");
        f.nav.on_enter_complete(&root, "/");
        f.nav.frame(ms(16.0));
        let mesh = f.mesh.borrow().unwrap();

        let bus = Rc::clone(f.nav.manager().bus());
        bus.emit(
            WEBGL_TRANSITION_PREPARE,
            &Signal::Prepare(PrepareRequest {
                mesh,
                target_url: "/work".into(),
                source_page: PageId::new("home"),
                start_position: None,
            }),
        );
        assert_eq!(f.nav.transitions().state(), TransitionState::Idle, "queued");
        f.nav.frame(ms(32.0));
        assert_eq!(f.nav.transitions().state(), TransitionState::WaitingForTarget);

        let projection = f.nav.manager().projection();
        bus.emit(
            WEBGL_TRANSITION_TARGET_READY,
            &Signal::TargetReady(TargetReady {
                rect: Rect::new(100.0, 100.0, 500.0, 400.0),
                viewport: projection.viewport,
                screen: projection.screen,
            }),
        );
        f.nav.frame(ms(48.0));
        assert_eq!(f.nav.transitions().state(), TransitionState::Animating);

        // 60 ms capped frames: 1.5 s needs 25 more.
        let mut t = 48.0;
        for _ in 0..30 {
            t += 60.0;
            f.nav.frame(ms(t));
        }
        assert_eq!(f.nav.transitions().state(), TransitionState::Idle);
        assert!(f.nav.manager().scene().visible(mesh));
    }

    #[test]
    fn destroy_unhooks_from_the_bus() {
        let mut f = fixture();
        let root = FakeElement::new("main");
        let bus = Rc::clone(f.nav.manager().bus());
        assert_eq!(bus.handler_count(WEBGL_TRANSITION_PREPARE), 1);
        f.nav.destroy(&root);
        assert_eq!(bus.handler_count(WEBGL_TRANSITION_PREPARE), 0);
        assert_eq!(bus.handler_count(WEBGL_TRANSITION_TARGET_READY), 0);
    }
}
