//! # Sunshine Face Core Library
//!
//! This library is the display engine behind an always-on wearable clock face.
//! It draws exactly one screen (time, date and the last forecast pushed from a
//! paired phone) and keeps that screen correct across the two power states a
//! wearable display lives in.
//!
//! ## Design Philosophy
//!
//! ### One queue, no locks
//! Lifecycle callbacks, timer fires and weather updates are all messages on a
//! single queue owned by [`engine::FaceEngine`]. Nothing mutates the power
//! state or the weather snapshot concurrently, so no locking is needed.
//!
//! ### Power states
//! - **Interactive**: full palette, smoothed text, `H:MM:SS`, redrawn once per
//!   second on wall-clock second boundaries.
//! - **Ambient**: black background, single foreground colour, `H:MM`, redrawn
//!   by the platform's own minute tick. On low-bit hardware text smoothing is
//!   switched off.
//!
//! ### Data Flow
//! 1. **Lifecycle**: host event → [`power::PowerMachine`] → scheduler / sync
//!    side effects
//! 2. **Tick**: [`scheduler::RedrawScheduler`] fires → frame drawn
//! 3. **Weather**: [`sync::WeatherSync`] forwards a parsed payload → snapshot
//!    replaced → frame drawn
//!
//! ## Core Types
//! - [`WeatherSnapshot`]: last-known forecast, replaced wholesale on each update
//! - [`ClockReading`]: wall-clock time in the active zone, sampled per frame
//! - [`ScreenShape`]: square or round panel, selects the layout constants

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// Module declarations
pub mod clock;
pub mod config;
pub mod engine;
pub mod framebuffer;
pub mod power;
pub mod render;
pub mod scheduler;
pub mod sync;
pub mod weather;

pub use weather::{ConditionIcon, IconImage};

/// Last-known forecast from the paired device.
///
/// Created on the first valid sync event and replaced wholesale on every
/// later one; fields are never merged across updates. The icon is a shared
/// handle into the engine's icon cache.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use sunshine_face_lib::{ConditionIcon, WeatherSnapshot};
/// use sunshine_face_lib::weather::rasterize;
///
/// let snapshot = WeatherSnapshot {
///     high_temperature: "75°".to_string(),
///     low_temperature: "54°".to_string(),
///     condition: ConditionIcon::Rain,
///     icon: Arc::new(rasterize(ConditionIcon::Rain, 32)),
/// };
///
/// assert_eq!(snapshot.icon.width(), 32);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct WeatherSnapshot {
    /// Forecast high, already formatted by the phone (e.g. "75°")
    pub high_temperature: String,
    /// Forecast low, already formatted by the phone (e.g. "54°")
    pub low_temperature: String,
    /// Icon category resolved from the payload's condition code
    pub condition: ConditionIcon,
    /// Rasterized icon for `condition`
    pub icon: Arc<IconImage>,
}

/// Wall-clock time in the active time zone.
///
/// Sampled fresh for every frame and never cached: the redraw cadence
/// (1 s interactive, 1 min ambient) already matches the precision shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockReading {
    pub local: DateTime<FixedOffset>,
}

impl ClockReading {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            local: now.with_timezone(&offset),
        }
    }

    /// `H:MM` in ambient mode, `H:MM:SS` in interactive mode.
    ///
    /// Seconds are never shown in ambient mode because the display only
    /// refreshes once a minute there.
    pub fn time_text(&self, ambient: bool, twelve_hour: bool) -> String {
        let pattern = match (twelve_hour, ambient) {
            (false, true) => "%-H:%M",
            (false, false) => "%-H:%M:%S",
            (true, true) => "%-I:%M",
            (true, false) => "%-I:%M:%S",
        };
        self.local.format(pattern).to_string()
    }

    /// Fixed English pattern, upper-cased: `SUN, OCT 18 2026`.
    pub fn date_text(&self) -> String {
        self.local.format("%a, %b %d %Y").to_string().to_uppercase()
    }
}

/// Physical panel shape reported by the host at insets time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenShape {
    #[default]
    Square,
    Round,
}
