// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types for WebGL overlays that track DOM content.
//!
//! `veneer_core` keeps a small scene graph of textured planes in step with
//! the document: each marked element gets a quad that follows its bounding
//! box, reacts to the pointer, and can fly to the matching element on the
//! next page when the user navigates. Nothing here touches a browser API;
//! the DOM, the texture decoder, the renderer and the smooth-scroll driver
//! are traits that `veneer_backend_web` implements. It is `no_std`
//! compatible (with `alloc`).
//!
//! # Architecture
//!
//! ```text
//!   router hooks                     host frame callback
//!       │                                   │
//!       ▼                                   ▼
//!   NavigationOrchestrator ──────► FrameClock::tick()
//!       │                                   │
//!       │ on_change                         ▼
//!       ▼                         TransitionCoordinator::advance()
//!   SceneManager ──► ScenePage ──► DomSyncedSurface
//!       │                │                  │
//!       │                └──── EventHub ◄───┘ (prepare / target-ready)
//!       ▼
//!   Renderer::render()
//! ```
//!
//! **[`scene`]**: Generational node, geometry and material stores with
//! parent/child topology and world transforms.
//!
//! **[`events`]**: Named publish/subscribe hub with namespaces and one-shot
//! handlers, used for the page lifecycle and the transition signals.
//!
//! **[`clock`]**: Capped-delta frame clock with play, pause and stop.
//!
//! **[`texture`]**: Deduplicating texture cache over a
//! [`TextureSource`](texture::TextureSource).
//!
//! **[`surface`]**: DOM-synced quads with hover distortion.
//!
//! **[`page`]** and **[`manager`]**: Per-page scene groups with a lifecycle,
//! and the registry that routes navigation to them.
//!
//! **[`transition`]**: The cross-page clone-and-fly state machine.
//!
//! **[`navigation`]**: Router hooks and the per-frame ordering.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and the
//! [`Tracer`](trace::Tracer) handle.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};

pub mod anim;
pub mod clock;
pub mod dom;
pub mod events;
pub mod geometry;
pub mod manager;
pub mod material;
pub mod navigation;
pub mod page;
pub mod scene;
pub mod signals;
pub mod surface;
pub mod texture;
pub mod time;
pub mod trace;
pub mod transition;
pub mod viewport;

#[cfg(test)]
mod testing;

/// Polls `fut` once without a real waker.
///
/// Loads are re-polled every frame, so no wakeup is needed.
pub(crate) fn poll_now<F: Future + Unpin>(fut: &mut F) -> Poll<F::Output> {
    let mut cx = Context::from_waker(Waker::noop());
    Pin::new(fut).poll(&mut cx)
}
