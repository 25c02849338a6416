// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Native window scrolling behind the core [`ScrollController`] seam.
//!
//! The browser does the scrolling itself. Stopping locks the root element's
//! overflow so nothing moves while the router swaps documents.

use veneer_core::navigation::ScrollController;
use wasm_bindgen::JsCast as _;
use web_sys::{HtmlElement, Window};

/// [`ScrollController`] over `window` scrolling.
#[derive(Debug)]
pub struct WindowScroll {
    window: Window,
    stopped: bool,
}

impl WindowScroll {
    /// Controls scrolling of `window`.
    #[must_use]
    pub fn new(window: Window) -> Self {
        Self {
            window,
            stopped: false,
        }
    }

    /// Returns `true` while scrolling is locked.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn set_overflow(&self, value: Option<&str>) {
        let Some(root) = self
            .window
            .document()
            .and_then(|d| d.document_element())
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
        else {
            return;
        };
        let style = root.style();
        let _ = match value {
            Some(v) => style.set_property("overflow", v),
            None => style.remove_property("overflow").map(drop),
        };
    }
}

impl ScrollController for WindowScroll {
    fn start(&mut self) {
        if self.stopped {
            self.stopped = false;
            self.set_overflow(None);
        }
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.set_overflow(Some("hidden"));
        }
    }

    fn reset(&mut self) {
        self.window.scroll_to_with_x_and_y(0.0, 0.0);
    }

    fn tick(&mut self, _delta_ms: f64) {}
}
