// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The DOM boundary.
//!
//! The core never touches a browser API directly. Everything it needs from
//! the document goes through [`DomElement`], which the web backend
//! implements over `web_sys::Element` and the tests implement over an
//! in-memory tree.
//!
//! Pointer listeners are registered against a [`ListenerScope`]. Cancelling
//! the scope revokes every listener registered with it, regardless of which
//! element it was attached to.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use kurbo::{Point, Rect};

/// Which pointer event a listener receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerKind {
    /// The pointer entered the element.
    Enter,
    /// The pointer left the element.
    Leave,
    /// The pointer moved over the element.
    Move,
}

/// The part of a pointer event the core reads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    /// Position in client (viewport) CSS pixels.
    pub client: Point,
}

/// Pointer callback.
pub type PointerHandler = Box<dyn FnMut(PointerSample)>;

/// A handle to one element of the host document.
///
/// Implementations are cheap reference handles: cloning shares the
/// underlying node.
pub trait DomElement: Clone + 'static {
    /// A handle that does not keep the node alive.
    type Weak: Clone + 'static;

    /// Creates a weak handle.
    fn downgrade(&self) -> Self::Weak;

    /// Resolves a weak handle, or `None` once the node is gone.
    fn upgrade(weak: &Self::Weak) -> Option<Self>;

    /// `getBoundingClientRect()` in CSS pixels.
    fn bounding_client_rect(&self) -> Rect;

    /// Reads an attribute.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Returns `true` if the attribute is present.
    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Nearest inclusive ancestor matching `selector`.
    fn closest(&self, selector: &str) -> Option<Self>;

    /// First descendant matching `selector`.
    fn query_selector(&self, selector: &str) -> Option<Self>;

    /// Every descendant matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Vec<Self>;

    /// Removes the node from its parent.
    fn remove(&self);

    /// Returns `true` if both handles refer to the same node.
    fn same_node(&self, other: &Self) -> bool;

    /// Attaches a pointer listener that lives until `scope` is cancelled.
    fn add_pointer_listener(&self, kind: PointerKind, scope: &ListenerScope, handler: PointerHandler);
}

/// A cancellation token shared by a group of listeners.
///
/// Each registration adds a teardown closure; [`cancel`](Self::cancel) runs
/// them all exactly once. Teardowns added after cancellation run
/// immediately.
#[derive(Clone, Default)]
pub struct ListenerScope {
    inner: Rc<ScopeInner>,
}

#[derive(Default)]
struct ScopeInner {
    cancelled: Cell<bool>,
    teardowns: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl fmt::Debug for ListenerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerScope")
            .field("cancelled", &self.inner.cancelled.get())
            .field("listeners", &self.inner.teardowns.borrow().len())
            .finish()
    }
}

impl ListenerScope {
    /// Creates a live scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a teardown to run on cancellation.
    pub fn on_cancel(&self, teardown: impl FnOnce() + 'static) {
        if self.inner.cancelled.get() {
            teardown();
        } else {
            self.inner.teardowns.borrow_mut().push(Box::new(teardown));
        }
    }

    /// Runs every registered teardown. Later calls do nothing.
    pub fn cancel(&self) {
        if self.inner.cancelled.replace(true) {
            return;
        }
        let teardowns = core::mem::take(&mut *self.inner.teardowns.borrow_mut());
        for teardown in teardowns {
            teardown();
        }
    }

    /// Returns `true` once cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.get()
    }

    /// Number of teardowns waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.teardowns.borrow().len()
    }
}

/// Attribute and selector names of the DOM marker contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerConfig {
    /// Attribute naming the current page identity.
    pub page_attribute: &'static str,
    /// Selector form of [`page_attribute`](Self::page_attribute).
    pub page_selector: &'static str,
    /// Container that scopes hover detection.
    pub container_selector: &'static str,
    /// Elements that become surface quads.
    pub surface_selector: &'static str,
    /// Texture-source override on a surface element.
    pub source_override_attribute: &'static str,
    /// Fallback texture-source attribute.
    pub source_attribute: &'static str,
    /// The content root the router swaps.
    pub content_selector: &'static str,
    /// Attribute marking a loader overlay root.
    pub loader_attribute: &'static str,
}

impl MarkerConfig {
    /// The `data-webgl*` vocabulary.
    #[must_use]
    pub const fn web() -> Self {
        Self {
            page_attribute: "data-webgl-page",
            page_selector: "[data-webgl-page]",
            container_selector: "[data-webgl-container]",
            surface_selector: "[data-webgl]",
            source_override_attribute: "data-webgl-src",
            source_attribute: "src",
            content_selector: "[data-page-content]",
            loader_attribute: "data-loader",
        }
    }

    /// Texture URL for a surface element: the override attribute if set and
    /// non-empty, else the plain source attribute.
    #[must_use]
    pub fn texture_source<E: DomElement>(&self, element: &E) -> Option<String> {
        element
            .attribute(self.source_override_attribute)
            .filter(|s| !s.is_empty())
            .or_else(|| element.attribute(self.source_attribute))
            .filter(|s| !s.is_empty())
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self::web()
    }
}
