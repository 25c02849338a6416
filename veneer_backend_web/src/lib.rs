// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Web backend for veneer.
//!
//! This crate provides the browser side of the `veneer_core` seams:
//!
//! - [`RafLoop`]: `requestAnimationFrame` tick source
//! - [`WebElement`]: [`DomElement`](veneer_core::dom::DomElement) over
//!   `web_sys::Element`
//! - [`WebGlRenderer`]: [`Renderer`](veneer_core::manager::Renderer) over
//!   WebGL2
//! - [`ImageTextureSource`]: texture decoding through `HtmlImageElement`
//! - [`WindowScroll`]: [`ScrollController`](veneer_core::navigation::ScrollController)
//!   over native scrolling

#![no_std]

extern crate alloc;

mod dom;
mod raf;
mod renderer;
mod scroll;
mod textures;

use alloc::rc::Rc;
use core::cell::RefCell;

use kurbo::Size;
use veneer_core::dom::DomElement;
use veneer_core::navigation::NavigationOrchestrator;
use veneer_core::time::HostTime;

pub use dom::{WeakElement, WebElement};
pub use raf::RafLoop;
pub use renderer::{InitError, MAX_PIXEL_RATIO, WebGlRenderer};
pub use scroll::WindowScroll;
pub use textures::ImageTextureSource;

/// Returns the current host time from `performance.now()`.
#[must_use]
pub fn now() -> HostTime {
    HostTime::from_millis_f64(raf::performance_now())
}

/// The window's inner size in CSS pixels.
#[must_use]
pub fn window_size() -> Option<Size> {
    let window = web_sys::window()?;
    let width = window.inner_width().ok()?.as_f64()?;
    let height = window.inner_height().ok()?.as_f64()?;
    Some(Size::new(width, height))
}

/// Drives `orchestrator` from a started [`RafLoop`].
///
/// The loop ends by itself once the orchestrator's frame clock is stopped.
pub fn drive<E: DomElement>(orchestrator: Rc<RefCell<NavigationOrchestrator<E>>>) -> RafLoop {
    let raf = RafLoop::new(move |now| orchestrator.borrow_mut().frame(now));
    raf.start();
    raf
}
