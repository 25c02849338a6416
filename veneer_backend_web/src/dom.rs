// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`DomElement`] over `web_sys::Element`.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use kurbo::{Point, Rect};
use veneer_core::dom::{DomElement, ListenerScope, PointerHandler, PointerKind, PointerSample};
use wasm_bindgen::JsCast as _;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{Element, MouseEvent};

#[wasm_bindgen]
extern "C" {
    /// The JS `WeakRef` built-in.
    #[wasm_bindgen(js_name = "WeakRef")]
    type JsWeakRef;

    #[wasm_bindgen(constructor, js_class = "WeakRef")]
    fn new(target: &JsValue) -> JsWeakRef;

    #[wasm_bindgen(method, js_class = "WeakRef", js_name = "deref")]
    fn target(this: &JsWeakRef) -> JsValue;
}

/// A handle to a live document element.
#[derive(Clone, Debug)]
pub struct WebElement(Element);

/// A `WeakRef` to a [`WebElement`]. Upgrading fails once the element has
/// been collected or detached from the document.
#[derive(Clone)]
pub struct WeakElement(Rc<JsWeakRef>);

impl core::fmt::Debug for WeakElement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("WeakElement").finish_non_exhaustive()
    }
}

impl WebElement {
    /// Wraps an element.
    #[must_use]
    pub fn new(element: Element) -> Self {
        Self(element)
    }

    /// The wrapped element.
    #[must_use]
    pub fn element(&self) -> &Element {
        &self.0
    }
}

impl From<Element> for WebElement {
    fn from(element: Element) -> Self {
        Self(element)
    }
}

/// DOM event name for a pointer listener.
pub(crate) fn event_name(kind: PointerKind) -> &'static str {
    match kind {
        PointerKind::Enter => "pointerenter",
        PointerKind::Leave => "pointerleave",
        PointerKind::Move => "pointermove",
    }
}

impl DomElement for WebElement {
    type Weak = WeakElement;

    fn downgrade(&self) -> WeakElement {
        WeakElement(Rc::new(JsWeakRef::new(self.0.as_ref())))
    }

    fn upgrade(weak: &WeakElement) -> Option<Self> {
        weak.0
            .target()
            .dyn_into::<Element>()
            .ok()
            .filter(|el| el.is_connected())
            .map(Self)
    }

    fn bounding_client_rect(&self) -> Rect {
        let r = self.0.get_bounding_client_rect();
        Rect::new(r.left(), r.top(), r.right(), r.bottom())
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.0.has_attribute(name)
    }

    fn closest(&self, selector: &str) -> Option<Self> {
        self.0.closest(selector).ok().flatten().map(Self)
    }

    fn query_selector(&self, selector: &str) -> Option<Self> {
        self.0.query_selector(selector).ok().flatten().map(Self)
    }

    fn query_selector_all(&self, selector: &str) -> Vec<Self> {
        let Ok(list) = self.0.query_selector_all(selector) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .map(Self)
            .collect()
    }

    fn remove(&self) {
        self.0.remove();
    }

    fn same_node(&self, other: &Self) -> bool {
        self.0.is_same_node(Some(&other.0))
    }

    fn add_pointer_listener(&self, kind: PointerKind, scope: &ListenerScope, mut handler: PointerHandler) {
        if scope.is_cancelled() {
            return;
        }
        let closure = Closure::wrap(Box::new(move |e: MouseEvent| {
            handler(PointerSample {
                client: Point::new(f64::from(e.client_x()), f64::from(e.client_y())),
            });
        }) as Box<dyn FnMut(MouseEvent)>);

        let name = event_name(kind);
        if self
            .0
            .add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())
            .is_err()
        {
            return;
        }
        let target = self.0.clone();
        scope.on_cancel(move || {
            let _ = target.remove_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
            drop(closure);
        });
    }
}
