// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame ticker with a capped delta.
//!
//! [`FrameClock`] is driven by the host's frame callback (see the web
//! backend's `RafLoop`). Each [`tick`](FrameClock::tick) computes
//!
//! ```text
//! delta = min(now - last_tick, max_delta)
//! ```
//!
//! and, while playing, adds it to `elapsed` and emits [`TICK`] with a
//! [`ClockSnapshot`]. The cap keeps animations from lurching forward after
//! a backgrounded tab resumes.
//!
//! Pausing gates accumulation and emission only; the host keeps ticking.
//! [`stop`](FrameClock::stop) is terminal: a stopped clock ignores ticks
//! and [`play`](FrameClock::play), and the host loop is expected to end.

use crate::events::EventHub;
use crate::time::HostTime;
use crate::trace::{FrameTickEvent, Tracer};

/// Event emitted by [`FrameClock`] on every playing tick.
pub const TICK: &str = "tick";

/// Clock tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockConfig {
    /// Upper bound on a single frame's delta, in milliseconds.
    pub max_delta_ms: f64,
}

impl ClockConfig {
    /// Browser defaults: deltas are capped at 60 ms.
    #[must_use]
    pub const fn web() -> Self {
        Self { max_delta_ms: 60.0 }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::web()
    }
}

/// The clock state handed to tick listeners and page updates.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct ClockSnapshot {
    /// Capped time since the previous tick, in milliseconds.
    pub delta_ms: f64,
    /// Accumulated playing time, in milliseconds.
    pub elapsed_ms: f64,
    /// Number of playing ticks so far.
    pub frame_index: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunState {
    Playing,
    Paused,
    Stopped,
}

/// Capped-delta frame clock.
#[derive(Debug)]
pub struct FrameClock {
    config: ClockConfig,
    last_tick: HostTime,
    delta_ms: f64,
    elapsed_ms: f64,
    frame_index: u64,
    state: RunState,
    events: EventHub<ClockSnapshot>,
    tracer: Tracer,
}

impl FrameClock {
    /// Creates a clock that is already playing, with `now` as its first
    /// reference point.
    #[must_use]
    pub fn new(now: HostTime, config: ClockConfig) -> Self {
        Self {
            config,
            last_tick: now,
            delta_ms: 0.0,
            elapsed_ms: 0.0,
            frame_index: 0,
            state: RunState::Playing,
            events: EventHub::new(),
            tracer: Tracer::none(),
        }
    }

    /// Attaches a tracer.
    pub fn set_tracer(&mut self, tracer: Tracer) {
        self.tracer = tracer;
    }

    /// Advances the clock to `now`.
    ///
    /// Returns the snapshot that was emitted, or `None` when paused or
    /// stopped.
    pub fn tick(&mut self, now: HostTime) -> Option<ClockSnapshot> {
        if self.state == RunState::Stopped {
            return None;
        }
        let raw = now.saturating_duration_since(self.last_tick).as_millis_f64();
        self.last_tick = now;
        self.delta_ms = raw.min(self.config.max_delta_ms);

        if self.state != RunState::Playing {
            return None;
        }
        self.elapsed_ms += self.delta_ms;
        self.frame_index += 1;
        let snapshot = self.snapshot();
        self.tracer.frame_tick(&FrameTickEvent {
            frame_index: snapshot.frame_index,
            now,
            delta_ms: snapshot.delta_ms,
            elapsed_ms: snapshot.elapsed_ms,
        });
        self.events.emit(TICK, &snapshot);
        Some(snapshot)
    }

    /// Resumes accumulation and emission. No effect once stopped.
    pub fn play(&mut self) {
        if self.state == RunState::Paused {
            self.state = RunState::Playing;
        }
    }

    /// Suspends accumulation and emission.
    pub fn pause(&mut self) {
        if self.state == RunState::Playing {
            self.state = RunState::Paused;
        }
    }

    /// Stops the clock permanently.
    pub fn stop(&mut self) {
        self.state = RunState::Stopped;
    }

    /// Returns `true` while playing.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state == RunState::Playing
    }

    /// Returns `true` once [`stop`](Self::stop) has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state == RunState::Stopped
    }

    /// The most recent capped delta, in milliseconds.
    #[must_use]
    pub fn delta_ms(&self) -> f64 {
        self.delta_ms
    }

    /// Accumulated playing time, in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// The current state as a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            delta_ms: self.delta_ms,
            elapsed_ms: self.elapsed_ms,
            frame_index: self.frame_index,
        }
    }

    /// The clock's own event hub ([`TICK`]).
    #[must_use]
    pub fn events(&self) -> &EventHub<ClockSnapshot> {
        &self.events
    }
}
