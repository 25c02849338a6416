// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Browser-only checks for the DOM adapter. Run with
//! `wasm-pack test --headless --firefox veneer_backend_web`.

#![cfg(target_arch = "wasm32")]

use std::cell::Cell;
use std::rc::Rc;

use veneer_backend_web::WebElement;
use veneer_core::dom::{DomElement, ListenerScope, PointerKind};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{Element, MouseEvent, MouseEventInit};

wasm_bindgen_test_configure!(run_in_browser);

fn attached(inner_html: &str) -> Element {
    let document = web_sys::window().unwrap().document().unwrap();
    let host = document.create_element("div").unwrap();
    host.set_inner_html(inner_html);
    document.body().unwrap().append_child(&host).unwrap();
    host
}

#[wasm_bindgen_test]
fn weak_handles_fail_after_removal() {
    let host = WebElement::new(attached(r#"<img data-webgl src="a.jpg">"#));
    let img = host.query_selector("[data-webgl]").unwrap();
    let weak = img.downgrade();
    assert!(WebElement::upgrade(&weak).is_some(), "attached element upgrades");
    img.remove();
    assert!(WebElement::upgrade(&weak).is_none(), "detached element does not");
    host.remove();
}

#[wasm_bindgen_test]
fn cancelling_the_scope_removes_listeners() {
    let host = WebElement::new(attached("<span></span>"));
    let hits = Rc::new(Cell::new(0));
    let scope = ListenerScope::new();
    let h = Rc::clone(&hits);
    host.add_pointer_listener(
        PointerKind::Move,
        &scope,
        Box::new(move |_| h.set(h.get() + 1)),
    );

    let init = MouseEventInit::new();
    init.set_client_x(10);
    let event = MouseEvent::new_with_mouse_event_init_dict("pointermove", &init).unwrap();
    host.element().dispatch_event(&event).unwrap();
    assert_eq!(hits.get(), 1, "listener fired");

    scope.cancel();
    host.element().dispatch_event(&event).unwrap();
    assert_eq!(hits.get(), 1, "listener removed");
    host.remove();
}
