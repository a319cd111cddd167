//! # Power State Machine
//!
//! Host lifecycle callbacks arrive as [`LifecycleEvent`] values and are fed to
//! [`PowerMachine::apply`], a single transition function. The machine returns
//! the side effects the engine must carry out ([`Effects`]) instead of
//! performing them itself, which keeps it testable without a runtime.
//!
//! ```text
//!            visible=true (ambient flag picks the target)
//!   Hidden ───────────────────────────────▶ VisibleInteractive ⇄ VisibleAmbient
//!     ▲                                                │               │
//!     └─────────────── visible=false ──────────────────┴───────────────┘
//! ```
//!
//! Repeating the current value of an event (ambient→ambient, visible→visible)
//! is a no-op: no redraw, no palette recomputation, no scheduler churn.

use crate::config::ThemeConfig;
use crate::ScreenShape;
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use log::{debug, info};

/// Callbacks the host may deliver. These are the only inputs that mutate
/// [`PowerState`] or reload layout metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    VisibilityChanged(bool),
    AmbientModeChanged(bool),
    PropertiesChanged { low_bit_ambient: bool },
    InsetsChanged(ScreenShape),
    TimeZoneChanged,
    /// The platform's once-a-minute tick, delivered in ambient mode
    TimeTick,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayPhase {
    Hidden,
    VisibleInteractive,
    VisibleAmbient,
}

/// Starts hidden and interactive, with full-colour hardware assumed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PowerState {
    pub visible: bool,
    pub ambient: bool,
    /// Display drops colour depth in ambient mode
    pub low_bit_ambient: bool,
}

impl PowerState {
    pub fn phase(&self) -> DisplayPhase {
        match (self.visible, self.ambient) {
            (false, _) => DisplayPhase::Hidden,
            (true, false) => DisplayPhase::VisibleInteractive,
            (true, true) => DisplayPhase::VisibleAmbient,
        }
    }

    /// The redraw scheduler runs iff this holds.
    pub fn scheduler_should_run(&self) -> bool {
        self.visible && !self.ambient
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionChange {
    Subscribe,
    Unsubscribe,
}

/// Work the engine must do after a transition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Effects {
    pub redraw: bool,
    pub reevaluate_scheduler: bool,
    pub subscription: Option<SubscriptionChange>,
    pub reload_metrics: Option<ScreenShape>,
    pub refresh_time_zone: bool,
}

/// Paint for one text row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextPaint {
    pub color: Rgb888,
    pub anti_alias: bool,
}

/// Colours and smoothing for one frame. Always derived from the theme and
/// the current [`PowerState`], never edited independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayPalette {
    pub background: Rgb888,
    pub time: TextPaint,
    pub date: TextPaint,
    pub high_temperature: TextPaint,
    pub low_temperature: TextPaint,
    pub line: Rgb888,
    pub icon: Rgb888,
}

impl DisplayPalette {
    pub fn derive(theme: &ThemeConfig, state: &PowerState) -> Self {
        let primary = theme.digital_text.rgb();
        let (background, secondary) = if state.ambient {
            (Rgb888::BLACK, primary)
        } else {
            (theme.background.rgb(), theme.digital_text_light.rgb())
        };
        let anti_alias = !(state.ambient && state.low_bit_ambient);
        let paint = |color| TextPaint { color, anti_alias };

        Self {
            background,
            time: paint(primary),
            date: paint(secondary),
            high_temperature: paint(primary),
            low_temperature: paint(secondary),
            line: secondary,
            icon: theme.icon.rgb(),
        }
    }
}

/// Owns [`PowerState`] and the palette derived from it.
#[derive(Debug)]
pub struct PowerMachine {
    state: PowerState,
    theme: ThemeConfig,
    palette: DisplayPalette,
    palette_generation: u64,
}

impl PowerMachine {
    pub fn new(theme: ThemeConfig) -> Self {
        let state = PowerState::default();
        let palette = DisplayPalette::derive(&theme, &state);
        Self {
            state,
            theme,
            palette,
            palette_generation: 0,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn phase(&self) -> DisplayPhase {
        self.state.phase()
    }

    pub fn palette(&self) -> &DisplayPalette {
        &self.palette
    }

    /// Bumped every time the palette is recomputed.
    pub fn palette_generation(&self) -> u64 {
        self.palette_generation
    }

    pub fn apply(&mut self, event: LifecycleEvent) -> Effects {
        let before = self.state.phase();
        let effects = match event {
            LifecycleEvent::VisibilityChanged(visible) => {
                if visible == self.state.visible {
                    return Effects::default();
                }
                self.state.visible = visible;
                Effects {
                    redraw: true,
                    reevaluate_scheduler: true,
                    subscription: Some(if visible {
                        SubscriptionChange::Subscribe
                    } else {
                        SubscriptionChange::Unsubscribe
                    }),
                    // The zone may have changed while we were hidden.
                    refresh_time_zone: visible,
                    ..Effects::default()
                }
            }
            LifecycleEvent::AmbientModeChanged(ambient) => {
                if ambient == self.state.ambient {
                    return Effects::default();
                }
                self.state.ambient = ambient;
                self.recompute_palette();
                Effects {
                    redraw: true,
                    reevaluate_scheduler: true,
                    ..Effects::default()
                }
            }
            LifecycleEvent::PropertiesChanged { low_bit_ambient } => {
                if low_bit_ambient == self.state.low_bit_ambient {
                    return Effects::default();
                }
                self.state.low_bit_ambient = low_bit_ambient;
                // Smoothing only depends on this flag while ambient.
                if !self.state.ambient {
                    return Effects::default();
                }
                self.recompute_palette();
                Effects {
                    redraw: true,
                    ..Effects::default()
                }
            }
            LifecycleEvent::InsetsChanged(shape) => Effects {
                redraw: true,
                reload_metrics: Some(shape),
                ..Effects::default()
            },
            LifecycleEvent::TimeZoneChanged => Effects {
                redraw: true,
                refresh_time_zone: true,
                ..Effects::default()
            },
            LifecycleEvent::TimeTick => Effects {
                redraw: true,
                ..Effects::default()
            },
        };

        let after = self.state.phase();
        if before != after {
            info!("display phase {:?} -> {:?}", before, after);
        } else {
            debug!("{:?} handled in {:?}", event, after);
        }
        effects
    }

    fn recompute_palette(&mut self) {
        self.palette = DisplayPalette::derive(&self.theme, &self.state);
        self.palette_generation += 1;
    }
}
