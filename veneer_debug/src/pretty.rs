// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use veneer_core::page::PageError;
use veneer_core::signals::PageId;
use veneer_core::texture::LoadError;
use veneer_core::trace::{
    FrameTickEvent, NavigationEvent, NavigationPhase, PageEvent, PhaseBeginEvent, PhaseEndEvent,
    PhaseKind, TextureEvent, TraceSink, TransitionEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the destination.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn phase_name(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::Update => "update",
        PhaseKind::Transition => "transition",
        PhaseKind::Render => "render",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_frame_tick(&mut self, e: &FrameTickEvent) {
        let _ = writeln!(
            self.writer,
            "[tick] frame={} now={:.1}ms delta={:.2}ms elapsed={:.1}ms",
            e.frame_index,
            e.now.as_millis_f64(),
            e.delta_ms,
            e.elapsed_ms,
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {}",
            e.frame_index,
            phase_name(e.phase),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {}",
            e.frame_index,
            phase_name(e.phase),
        );
    }

    fn on_page(&mut self, e: &PageEvent<'_>) {
        let _ = writeln!(
            self.writer,
            "[page] {} {:?} -> {:?}",
            e.page.as_str(),
            e.from,
            e.to,
        );
    }

    fn on_page_load_failed(&mut self, page: &PageId, error: &PageError) {
        let _ = writeln!(self.writer, "[page] {} load FAILED: {error}", page.as_str());
    }

    fn on_transition(&mut self, e: &TransitionEvent) {
        let _ = writeln!(
            self.writer,
            "[transition] {:?} -> {:?} ({:?})",
            e.from, e.to, e.reason,
        );
    }

    fn on_texture(&mut self, e: &TextureEvent<'_>) {
        let _ = writeln!(self.writer, "[texture] {:?} {}", e.outcome, e.url);
    }

    fn on_texture_error(&mut self, url: &str, error: &LoadError) {
        let _ = writeln!(self.writer, "[texture] FAILED {url}: {error}");
    }

    fn on_navigation(&mut self, e: &NavigationEvent<'_>) {
        let phase = match e.phase {
            NavigationPhase::Leave => "leave",
            NavigationPhase::Enter => "enter",
        };
        let page = e.page.map_or("-", PageId::as_str);
        let _ = writeln!(self.writer, "[nav:{phase}] page={page}");
    }
}
