// Copyright 2026 the Veneer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Easing curves and time-windowed animation tracks.
//!
//! Animations in this crate are pure functions of a session-local clock. A
//! [`Track`] describes *when* a value moves (delay and duration) and *how*
//! (an [`Ease`]); callers evaluate [`Track::progress`] with the current
//! session time and interpolate whatever they animate. Nothing here owns
//! state, so a timeline can be advanced by synthetic steps in tests and
//! produce exactly the values a real frame loop would.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// An easing curve mapping linear progress in `[0, 1]` to eased progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Ease {
    /// No easing.
    #[default]
    Linear,
    /// Cubic deceleration.
    Power2Out,
    /// Cubic acceleration then deceleration.
    Power2InOut,
    /// Sinusoidal acceleration then deceleration.
    SineInOut,
    /// Exponential acceleration then deceleration (strong).
    ExpoInOut,
}

impl Ease {
    /// Applies the curve. Input is clamped to `[0, 1]`.
    #[must_use]
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Power2Out => {
                let u = 1.0 - t;
                1.0 - u * u * u
            }
            Self::Power2InOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = -2.0 * t + 2.0;
                    1.0 - u * u * u / 2.0
                }
            }
            Self::SineInOut => -((core::f64::consts::PI * t).cos() - 1.0) / 2.0,
            Self::ExpoInOut => {
                if t <= 0.0 {
                    0.0
                } else if t >= 1.0 {
                    1.0
                } else if t < 0.5 {
                    2.0_f64.powf(20.0 * t - 10.0) / 2.0
                } else {
                    (2.0 - 2.0_f64.powf(-20.0 * t + 10.0)) / 2.0
                }
            }
        }
    }
}

/// A window of time over which one value animates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Track {
    /// Seconds from the timeline start before the track begins.
    pub delay: f64,
    /// Seconds the track takes once started.
    pub duration: f64,
    /// Curve applied to the linear progress.
    pub ease: Ease,
}

impl Track {
    /// Creates a track.
    #[must_use]
    pub const fn new(delay: f64, duration: f64, ease: Ease) -> Self {
        Self {
            delay,
            duration,
            ease,
        }
    }

    /// Timeline time at which the track finishes.
    #[must_use]
    pub fn end(&self) -> f64 {
        self.delay + self.duration
    }

    /// Eased progress in `[0, 1]` at timeline time `t` (seconds).
    #[must_use]
    pub fn progress(&self, t: f64) -> f64 {
        if self.duration <= 0.0 {
            return if t >= self.delay { 1.0 } else { 0.0 };
        }
        self.ease.apply((t - self.delay) / self.duration)
    }
}

/// Linear interpolation.
#[inline]
#[must_use]
pub fn lerp(a: f64, b: f64, p: f64) -> f64 {
    a + (b - a) * p
}
