// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory stand-ins for the host used by unit tests.

use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use alloc::string::{String, ToString as _};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use kurbo::Rect;

use crate::dom::{DomElement, ListenerScope, PointerHandler, PointerKind, PointerSample};
use crate::manager::{Camera, Renderer};
use crate::scene::{NodeId, Scene};
use crate::texture::{LoadCompletion, TextureHandle, TextureId, TextureSource};

type Listener = (u64, PointerKind, Rc<RefCell<PointerHandler>>);

#[derive(Default)]
pub(crate) struct FakeNode {
    tag: String,
    attrs: RefCell<BTreeMap<String, String>>,
    rect: Cell<Rect>,
    parent: RefCell<Weak<FakeNode>>,
    children: RefCell<Vec<FakeElement>>,
    listeners: RefCell<Vec<Listener>>,
    next_listener: Cell<u64>,
}

/// An element in an in-memory tree.
///
/// Selectors are limited to `[attr]` and `[attr="value"]`.
#[derive(Clone)]
pub(crate) struct FakeElement(Rc<FakeNode>);

impl core::fmt::Debug for FakeElement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FakeElement")
            .field("tag", &self.0.tag)
            .field("attrs", &self.0.attrs.borrow())
            .finish_non_exhaustive()
    }
}

impl FakeElement {
    pub(crate) fn new(tag: &str) -> Self {
        Self(Rc::new(FakeNode {
            tag: tag.to_string(),
            ..FakeNode::default()
        }))
    }

    pub(crate) fn with_attr(self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub(crate) fn with_rect(self, rect: Rect) -> Self {
        self.set_rect(rect);
        self
    }

    pub(crate) fn set_attr(&self, name: &str, value: &str) {
        self.0
            .attrs
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
    }

    pub(crate) fn set_rect(&self, rect: Rect) {
        self.0.rect.set(rect);
    }

    /// Appends `child` and returns it.
    pub(crate) fn append(&self, child: Self) -> Self {
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child.clone());
        child
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.0.parent.borrow().upgrade().is_some()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }

    /// Delivers a pointer event to every listener of `kind`.
    pub(crate) fn dispatch(&self, kind: PointerKind, sample: PointerSample) {
        let snapshot: Vec<_> = self
            .0
            .listeners
            .borrow()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, h)| Rc::clone(h))
            .collect();
        for handler in snapshot {
            (&mut *handler.borrow_mut())(sample);
        }
    }

    fn matches(&self, selector: &str) -> bool {
        let inner = selector
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or_else(|| panic!("unsupported test selector {selector:?}"));
        match inner.split_once('=') {
            Some((name, value)) => {
                let value = value.trim_matches('"');
                self.attribute(name).as_deref() == Some(value)
            }
            None => self.has_attribute(inner),
        }
    }

    fn collect(&self, selector: &str, out: &mut Vec<Self>, first_only: bool) {
        for child in self.0.children.borrow().iter() {
            if first_only && !out.is_empty() {
                return;
            }
            if child.matches(selector) {
                out.push(child.clone());
            }
            child.collect(selector, out, first_only);
        }
    }
}

impl DomElement for FakeElement {
    type Weak = Weak<FakeNode>;

    fn downgrade(&self) -> Self::Weak {
        Rc::downgrade(&self.0)
    }

    fn upgrade(weak: &Self::Weak) -> Option<Self> {
        weak.upgrade().map(Self)
    }

    fn bounding_client_rect(&self) -> Rect {
        self.0.rect.get()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.attrs.borrow().get(name).cloned()
    }

    fn closest(&self, selector: &str) -> Option<Self> {
        let mut current = Some(self.clone());
        while let Some(el) = current {
            if el.matches(selector) {
                return Some(el);
            }
            current = el.0.parent.borrow().upgrade().map(Self);
        }
        None
    }

    fn query_selector(&self, selector: &str) -> Option<Self> {
        let mut out = Vec::new();
        self.collect(selector, &mut out, true);
        out.into_iter().next()
    }

    fn query_selector_all(&self, selector: &str) -> Vec<Self> {
        let mut out = Vec::new();
        self.collect(selector, &mut out, false);
        out
    }

    fn remove(&self) {
        let parent = self.0.parent.replace(Weak::new());
        if let Some(parent) = parent.upgrade() {
            parent
                .children
                .borrow_mut()
                .retain(|c| !Rc::ptr_eq(&c.0, &self.0));
        }
    }

    fn same_node(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn add_pointer_listener(&self, kind: PointerKind, scope: &ListenerScope, handler: PointerHandler) {
        let id = self.0.next_listener.get();
        self.0.next_listener.set(id + 1);
        self.0
            .listeners
            .borrow_mut()
            .push((id, kind, Rc::new(RefCell::new(handler))));
        let node = Rc::downgrade(&self.0);
        scope.on_cancel(move || {
            if let Some(node) = node.upgrade() {
                node.listeners.borrow_mut().retain(|(i, _, _)| *i != id);
            }
        });
    }
}

/// A texture source that settles loads only when told to.
#[derive(Default)]
pub(crate) struct ManualTextures {
    pub(crate) fetches: RefCell<Vec<String>>,
    pending: RefCell<Vec<LoadCompletion>>,
    pub(crate) released: RefCell<Vec<TextureId>>,
    next: Cell<u32>,
}

impl ManualTextures {
    /// Resolves the oldest pending fetch with a `width × height` texture.
    pub(crate) fn resolve_next(&self, width: u32, height: u32) -> TextureHandle {
        let completion = self.pending.borrow_mut().remove(0);
        let id = TextureId(self.next.get());
        self.next.set(id.0 + 1);
        let texture = TextureHandle { id, width, height };
        completion.resolve(texture);
        texture
    }

    /// Resolves every pending fetch.
    pub(crate) fn resolve_all(&self, width: u32, height: u32) {
        while !self.pending.borrow().is_empty() {
            self.resolve_next(width, height);
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl TextureSource for ManualTextures {
    fn fetch(&self, url: &str, completion: LoadCompletion) {
        self.fetches.borrow_mut().push(url.to_string());
        self.pending.borrow_mut().push(completion);
    }

    fn release(&self, texture: TextureId) {
        self.released.borrow_mut().push(texture);
    }
}

/// What [`RecordingRenderer`] saw.
#[derive(Debug, Default)]
pub(crate) struct RenderLog {
    pub(crate) frames: Vec<Vec<NodeId>>,
    pub(crate) sizes: Vec<(f64, f64)>,
    pub(crate) disposed: bool,
}

/// A renderer that records each frame's draw list.
#[derive(Clone, Default)]
pub(crate) struct RecordingRenderer {
    pub(crate) log: Rc<RefCell<RenderLog>>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, scene: &mut Scene, _camera: &Camera) {
        let _ = scene.drain_disposed();
        self.log.borrow_mut().frames.push(scene.render_list());
    }

    fn set_size(&mut self, width: f64, height: f64) {
        self.log.borrow_mut().sizes.push((width, height));
    }

    fn dispose(&mut self) {
        self.log.borrow_mut().disposed = true;
    }
}
