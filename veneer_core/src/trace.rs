// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics.
//!
//! This module provides a [`TraceSink`] trait with one method per event that
//! the frame loop, page lifecycle, texture cache and transition coordinator
//! report. All method bodies default to no-ops, so implementing only the
//! events you care about is fine.
//!
//! [`Tracer`] is a cheap, cloneable handle to an optional shared sink. Every
//! component that reports events holds one. When the `trace` feature is
//! **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace` enables the `Tracer` method bodies.

use alloc::rc::Rc;
use core::cell::RefCell;

use crate::page::PageLifecycleState;
use crate::signals::PageId;
use crate::texture::LoadError;
use crate::time::HostTime;
use crate::transition::TransitionState;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which part of a frame is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Page `update` calls.
    Update,
    /// Cross-page transition advance.
    Transition,
    /// Renderer submission.
    Render,
}

/// Why a transition changed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransitionReason {
    /// A session was opened by `prepare`.
    Prepared,
    /// `prepare` was ignored on a narrow viewport.
    Suppressed,
    /// The destination reported its landing rect.
    TargetReady,
    /// The timeline ran to the end.
    Completed,
    /// The session was cancelled (explicitly or by a newer `prepare`).
    Cancelled,
    /// No landing rect arrived in time.
    TimedOut,
}

/// Outcome of one texture cache interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureOutcome {
    /// A new underlying fetch was started.
    Requested,
    /// The request joined an in-flight fetch or hit the resolved cache.
    Deduplicated,
    /// The fetch resolved.
    Loaded,
    /// The fetch rejected.
    Failed,
}

/// Which side of a navigation is being reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NavigationPhase {
    /// The outgoing document is leaving.
    Leave,
    /// The incoming document finished entering.
    Enter,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted for every frame the clock dispatches.
#[derive(Clone, Copy, Debug)]
pub struct FrameTickEvent {
    /// Monotonic frame counter.
    pub frame_index: u64,
    /// Host time of the tick.
    pub now: HostTime,
    /// Capped delta handed to listeners, in milliseconds.
    pub delta_ms: f64,
    /// Accumulated playing time, in milliseconds.
    pub elapsed_ms: f64,
}

/// Marks the beginning of a frame phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
}

/// Marks the end of a frame phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
}

/// A page moved between lifecycle states.
#[derive(Clone, Debug)]
pub struct PageEvent<'a> {
    /// The page identity.
    pub page: &'a PageId,
    /// Previous state.
    pub from: PageLifecycleState,
    /// New state.
    pub to: PageLifecycleState,
}

/// A transition session moved between states.
#[derive(Clone, Copy, Debug)]
pub struct TransitionEvent {
    /// Previous state.
    pub from: TransitionState,
    /// New state.
    pub to: TransitionState,
    /// Why.
    pub reason: TransitionReason,
}

/// A texture cache interaction.
#[derive(Clone, Copy, Debug)]
pub struct TextureEvent<'a> {
    /// Source URL.
    pub url: &'a str,
    /// What happened.
    pub outcome: TextureOutcome,
}

/// A navigation boundary was crossed.
#[derive(Clone, Copy, Debug)]
pub struct NavigationEvent<'a> {
    /// Leave or enter.
    pub phase: NavigationPhase,
    /// Detected destination page (enter only).
    pub page: Option<&'a PageId>,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events.
///
/// All methods have default no-op implementations.
pub trait TraceSink {
    /// Called when the clock dispatches a tick.
    fn on_frame_tick(&mut self, e: &FrameTickEvent) {
        _ = e;
    }

    /// Called at the beginning of a frame phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a frame phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called when a page changes lifecycle state.
    fn on_page(&mut self, e: &PageEvent<'_>) {
        _ = e;
    }

    /// Called when a page's `load` hook fails.
    fn on_page_load_failed(&mut self, page: &PageId, error: &crate::page::PageError) {
        _ = (page, error);
    }

    /// Called when the transition coordinator changes state.
    fn on_transition(&mut self, e: &TransitionEvent) {
        _ = e;
    }

    /// Called for each texture cache interaction.
    fn on_texture(&mut self, e: &TextureEvent<'_>) {
        _ = e;
    }

    /// Called when a texture fetch rejects.
    fn on_texture_error(&mut self, url: &str, error: &LoadError) {
        _ = (url, error);
    }

    /// Called at navigation boundaries.
    fn on_navigation(&mut self, e: &NavigationEvent<'_>) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer handle
// ---------------------------------------------------------------------------

/// A shared, reference-counted sink.
pub type SharedSink = Rc<RefCell<dyn TraceSink>>;

/// Cloneable handle to an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing.
#[derive(Clone, Default)]
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<SharedSink>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($self:ident, |$s:ident| $body:expr) => {{
        #[cfg(feature = "trace")]
        if let Some(sink) = &$self.sink {
            // A sink that re-enters the tracer from inside a callback is
            // skipped rather than panicking on the double borrow.
            if let Ok(mut $s) = sink.try_borrow_mut() {
                $body;
            }
        }
    }};
}

impl Tracer {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: SharedSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {}
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Emits a [`FrameTickEvent`].
    #[inline]
    pub fn frame_tick(&self, e: &FrameTickEvent) {
        _ = e;
        dispatch!(self, |s| s.on_frame_tick(e));
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&self, frame_index: u64, phase: PhaseKind) {
        _ = (frame_index, phase);
        dispatch!(self, |s| s.on_phase_begin(&PhaseBeginEvent { frame_index, phase }));
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&self, frame_index: u64, phase: PhaseKind) {
        _ = (frame_index, phase);
        dispatch!(self, |s| s.on_phase_end(&PhaseEndEvent { frame_index, phase }));
    }

    /// Emits a [`PageEvent`].
    #[inline]
    pub fn page(&self, page: &PageId, from: PageLifecycleState, to: PageLifecycleState) {
        _ = (page, from, to);
        dispatch!(self, |s| s.on_page(&PageEvent { page, from, to }));
    }

    /// Reports a failed page `load`.
    #[inline]
    pub fn page_load_failed(&self, page: &PageId, error: &crate::page::PageError) {
        _ = (page, error);
        dispatch!(self, |s| s.on_page_load_failed(page, error));
    }

    /// Emits a [`TransitionEvent`].
    #[inline]
    pub fn transition(&self, from: TransitionState, to: TransitionState, reason: TransitionReason) {
        _ = (from, to, reason);
        dispatch!(self, |s| s.on_transition(&TransitionEvent { from, to, reason }));
    }

    /// Emits a [`TextureEvent`].
    #[inline]
    pub fn texture(&self, url: &str, outcome: TextureOutcome) {
        _ = (url, outcome);
        dispatch!(self, |s| s.on_texture(&TextureEvent { url, outcome }));
    }

    /// Reports a rejected texture fetch.
    #[inline]
    pub fn texture_error(&self, url: &str, error: &LoadError) {
        _ = (url, error);
        dispatch!(self, |s| s.on_texture_error(url, error));
    }

    /// Emits a [`NavigationEvent`].
    #[inline]
    pub fn navigation(&self, phase: NavigationPhase, page: Option<&PageId>) {
        _ = (phase, page);
        dispatch!(self, |s| s.on_navigation(&NavigationEvent { phase, page }));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
