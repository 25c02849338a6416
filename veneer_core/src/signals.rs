// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-wide signal vocabulary.
//!
//! These are the event names and payloads exchanged over the shared
//! [`EventHub<Signal>`](crate::events::EventHub) between the core and the
//! DOM-side collaborators (router glue, click handlers, reveal components).
//!
//! | Event | Payload |
//! |---|---|
//! | [`TRANSITION_START`] | [`Signal::None`] |
//! | [`TRANSITION_COMPLETE`] | [`Signal::None`] |
//! | `<page>:enter-ready` ([`enter_ready`]) | [`Signal::None`] |
//! | [`WEBGL_TRANSITION_PREPARE`] | [`Signal::Prepare`] |
//! | [`WEBGL_TRANSITION_TARGET_READY`] | [`Signal::TargetReady`] |
//! | [`WEBGL_TRANSITION_HANDOFF`] | [`Signal::None`] |
//! | [`WEBGL_TRANSITION_COMPLETE`] | [`Signal::None`] |

use alloc::format;
use alloc::string::String;
use core::fmt;

use kurbo::{Rect, Size};

use crate::scene::NodeId;
use crate::viewport::Viewport;

/// Navigation is about to swap documents.
pub const TRANSITION_START: &str = "transition:start";
/// The incoming document is in place and scrolling has resumed.
pub const TRANSITION_COMPLETE: &str = "transition:complete";
/// A DOM click asked for a mesh to fly to the next page.
pub const WEBGL_TRANSITION_PREPARE: &str = "webgl:transition:prepare";
/// The destination page reported where the flying mesh should land.
pub const WEBGL_TRANSITION_TARGET_READY: &str = "webgl:transition:target-ready";
/// The DOM should start fading its real content in.
pub const WEBGL_TRANSITION_HANDOFF: &str = "webgl:transition:handoff";
/// The flying mesh is gone.
pub const WEBGL_TRANSITION_COMPLETE: &str = "webgl:transition:complete";

/// Builds the `<page>:enter-ready` event name for `page`.
#[must_use]
pub fn enter_ready(page: &PageId) -> String {
    format!("{}:enter-ready", page.as_str())
}

/// Identity of a logical page of WebGL content (e.g. `home`, `project`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(String);

impl PageId {
    /// The conventional identity for the root path.
    pub const HOME: &'static str = "home";

    /// Creates a page identity.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageId({})", self.0)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Payload of [`WEBGL_TRANSITION_PREPARE`].
#[derive(Clone, Debug, PartialEq)]
pub struct PrepareRequest {
    /// The source surface mesh that should fly.
    pub mesh: NodeId,
    /// URL being navigated to.
    pub target_url: String,
    /// Page the mesh belongs to.
    pub source_page: PageId,
    /// Optional world-space start position override.
    pub start_position: Option<[f64; 2]>,
}

/// Payload of [`WEBGL_TRANSITION_TARGET_READY`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetReady {
    /// Landing rect in CSS pixels, relative to the viewport.
    pub rect: Rect,
    /// World-space viewport at the time of measurement.
    pub viewport: Viewport,
    /// Screen size in CSS pixels.
    pub screen: Size,
}

/// Payload carried on the shared signal hub.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Signal {
    /// No payload.
    #[default]
    None,
    /// See [`PrepareRequest`].
    Prepare(PrepareRequest),
    /// See [`TargetReady`].
    TargetReady(TargetReady),
}
