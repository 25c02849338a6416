// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`ChromeTraceSink`] collects events as they arrive and
//! [`export`](ChromeTraceSink::export)s them as [Chrome Trace Event
//! Format][tef] JSON, loadable in `chrome://tracing` or
//! [Perfetto](https://ui.perfetto.dev/).
//!
//! Frame ticks carry their own timestamp. Every other event is stamped by
//! the clock the sink was created with, so phase spans get real durations.
//!
//! [tef]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use veneer_core::page::PageError;
use veneer_core::signals::PageId;
use veneer_core::texture::LoadError;
use veneer_core::time::HostTime;
use veneer_core::trace::{
    FrameTickEvent, NavigationEvent, PageEvent, PhaseBeginEvent, PhaseEndEvent, TextureEvent,
    TraceSink, TransitionEvent,
};

/// Thread ids used to separate tracks in the viewer.
const FRAME_TRACK: u32 = 0;
const PAGE_TRACK: u32 = 1;
const TRANSITION_TRACK: u32 = 2;
const TEXTURE_TRACK: u32 = 3;

/// Collects trace events for Chrome Trace Event Format export.
pub struct ChromeTraceSink {
    clock: Box<dyn FnMut() -> HostTime>,
    events: Vec<Value>,
}

impl std::fmt::Debug for ChromeTraceSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeTraceSink")
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl ChromeTraceSink {
    /// Creates a sink that stamps events with `clock`.
    #[must_use]
    pub fn new(clock: impl FnMut() -> HostTime + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            events: Vec::new(),
        }
    }

    /// Number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drops every collected event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Writes the collected events as a JSON array.
    pub fn export(&self, writer: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(writer, &self.events)?;
        Ok(())
    }

    fn now_us(&mut self) -> u64 {
        (self.clock)().0
    }

    fn instant(&mut self, name: &str, cat: &str, tid: u32, args: Value) {
        let ts = self.now_us();
        self.events.push(json!({
            "ph": "i",
            "name": name,
            "cat": cat,
            "ts": ts,
            "pid": 0,
            "tid": tid,
            "s": "t",
            "args": args,
        }));
    }
}

impl TraceSink for ChromeTraceSink {
    fn on_frame_tick(&mut self, e: &FrameTickEvent) {
        self.events.push(json!({
            "ph": "i",
            "name": "FrameTick",
            "cat": "Clock",
            "ts": e.now.0,
            "pid": 0,
            "tid": FRAME_TRACK,
            "s": "g",
            "args": {
                "frame_index": e.frame_index,
                "delta_ms": e.delta_ms,
                "elapsed_ms": e.elapsed_ms,
            }
        }));
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let ts = self.now_us();
        self.events.push(json!({
            "ph": "B",
            "name": format!("{:?}", e.phase),
            "cat": "Frame",
            "ts": ts,
            "pid": 0,
            "tid": FRAME_TRACK,
            "args": { "frame_index": e.frame_index }
        }));
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let ts = self.now_us();
        self.events.push(json!({
            "ph": "E",
            "name": format!("{:?}", e.phase),
            "cat": "Frame",
            "ts": ts,
            "pid": 0,
            "tid": FRAME_TRACK,
            "args": { "frame_index": e.frame_index }
        }));
    }

    fn on_page(&mut self, e: &PageEvent<'_>) {
        let args = json!({
            "page": e.page.as_str(),
            "from": format!("{:?}", e.from),
            "to": format!("{:?}", e.to),
        });
        self.instant("Page", "Page", PAGE_TRACK, args);
    }

    fn on_page_load_failed(&mut self, page: &PageId, error: &PageError) {
        let args = json!({ "page": page.as_str(), "error": error.to_string() });
        self.instant("PageLoadFailed", "Page", PAGE_TRACK, args);
    }

    fn on_transition(&mut self, e: &TransitionEvent) {
        let args = json!({
            "from": format!("{:?}", e.from),
            "to": format!("{:?}", e.to),
            "reason": format!("{:?}", e.reason),
        });
        self.instant("Transition", "Transition", TRANSITION_TRACK, args);
    }

    fn on_texture(&mut self, e: &TextureEvent<'_>) {
        let args = json!({ "url": e.url, "outcome": format!("{:?}", e.outcome) });
        self.instant("Texture", "Texture", TEXTURE_TRACK, args);
    }

    fn on_texture_error(&mut self, url: &str, error: &LoadError) {
        let args = json!({ "url": url, "error": error.to_string() });
        self.instant("TextureError", "Texture", TEXTURE_TRACK, args);
    }

    fn on_navigation(&mut self, e: &NavigationEvent<'_>) {
        let args = json!({
            "phase": format!("{:?}", e.phase),
            "page": e.page.map(PageId::as_str),
        });
        self.instant("Navigation", "Page", PAGE_TRACK, args);
    }
}
