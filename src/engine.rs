//! # Display Engine
//!
//! One [`FaceEngine`] per display session. It owns the power state, the
//! weather snapshot, the icon cache, the redraw scheduler and the weather
//! subscription, and it is the only thing that mutates them.
//!
//! ## Event queue
//! Host callbacks, timer fires and weather updates all arrive as
//! [`EngineMessage`]s on one unbounded channel and are handled strictly in
//! order. Redraw requests raised while handling a message are coalesced into
//! at most one frame, drawn after the message is handled. Nothing is drawn
//! while hidden.
//!
//! ## Output
//! The engine never owns the output surface. The host hands it a [`Surface`];
//! each frame is drawn between `lock` and `post`.

use crate::clock::Clock;
use crate::config::Config;
use crate::power::{
    DisplayPalette, DisplayPhase, Effects, LifecycleEvent, PowerMachine, PowerState,
    SubscriptionChange,
};
use crate::render::{draw_face, FaceMetrics, FrameInputs, LayoutMetrics};
use crate::scheduler::{RedrawScheduler, TickId};
use crate::sync::{DataLayer, WeatherSync, WeatherUpdate};
use crate::weather::{ConditionIcon, IconCache};
use crate::{ClockReading, ScreenShape, WeatherSnapshot};
use chrono::FixedOffset;
use embedded_graphics::{pixelcolor::Rgb888, prelude::*};
use log::{debug, info, trace};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

/// Everything the engine reacts to.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineMessage {
    Lifecycle(LifecycleEvent),
    /// Interactive redraw timer fired
    Tick(TickId),
    /// Forecast from the subscription with this generation
    Weather { generation: u64, update: WeatherUpdate },
    /// End of session
    Shutdown,
}

/// The host's output surface.
pub trait Surface {
    type Target: DrawTarget<Color = Rgb888> + OriginDimensions;

    /// Borrow the drawing target for one frame.
    fn lock(&mut self) -> &mut Self::Target;

    /// Hand the finished frame to the compositor.
    fn post(&mut self);
}

/// Cloneable sender side of the engine queue.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    tx: UnboundedSender<EngineMessage>,
}

impl EngineHandle {
    /// Returns false once the engine has stopped.
    pub fn send(&self, message: EngineMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn lifecycle(&self, event: LifecycleEvent) -> bool {
        self.send(EngineMessage::Lifecycle(event))
    }

    pub fn shutdown(&self) -> bool {
        self.send(EngineMessage::Shutdown)
    }
}

pub struct FaceEngine<L: DataLayer, S: Surface> {
    config: Config,
    clock: Arc<dyn Clock>,
    power: PowerMachine,
    shape: ScreenShape,
    metrics: FaceMetrics,
    offset: FixedOffset,
    weather: Option<WeatherSnapshot>,
    icons: IconCache,
    scheduler: RedrawScheduler,
    sync: WeatherSync<L>,
    surface: S,
    redraw_pending: bool,
    frames_drawn: u64,
    last_layout: Option<LayoutMetrics>,
    stopped: bool,
    rx: UnboundedReceiver<EngineMessage>,
}

impl<L: DataLayer, S: Surface> FaceEngine<L, S> {
    /// Must be called inside a Tokio runtime: timers and the subscription
    /// are spawned tasks.
    pub fn new(config: Config, clock: Arc<dyn Clock>, layer: Arc<L>, surface: S) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shape = config.screen.shape;
        let metrics = FaceMetrics::from_layout(config.layout.for_shape(shape));
        let scheduler = RedrawScheduler::new(
            Duration::from_millis(config.clock.interactive_update_ms),
            CancellationToken::new(),
            tx.clone(),
        );
        let sync = WeatherSync::new(layer, config.sync.weather_path.clone(), tx.clone());
        let engine = Self {
            power: PowerMachine::new(config.theme.clone()),
            offset: clock.local_offset(),
            icons: IconCache::new(metrics.icon_size),
            weather: None,
            shape,
            metrics,
            scheduler,
            sync,
            surface,
            redraw_pending: false,
            frames_drawn: 0,
            last_layout: None,
            stopped: false,
            config,
            clock,
            rx,
        };
        (engine, EngineHandle { tx })
    }

    pub fn power_state(&self) -> PowerState {
        self.power.state()
    }

    pub fn phase(&self) -> DisplayPhase {
        self.power.phase()
    }

    pub fn palette(&self) -> &DisplayPalette {
        self.power.palette()
    }

    pub fn palette_generation(&self) -> u64 {
        self.power.palette_generation()
    }

    pub fn weather(&self) -> Option<&WeatherSnapshot> {
        self.weather.as_ref()
    }

    pub fn metrics(&self) -> &FaceMetrics {
        &self.metrics
    }

    pub fn shape(&self) -> ScreenShape {
        self.shape
    }

    pub fn time_zone(&self) -> FixedOffset {
        self.offset
    }

    pub fn scheduler(&self) -> &RedrawScheduler {
        &self.scheduler
    }

    pub fn sync(&self) -> &WeatherSync<L> {
        &self.sync
    }

    pub fn icons(&self) -> &IconCache {
        &self.icons
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Layout of the most recent frame.
    pub fn last_layout(&self) -> Option<&LayoutMetrics> {
        self.last_layout.as_ref()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Handles one message, then draws if anything asked for a redraw.
    pub fn handle(&mut self, message: EngineMessage) -> ControlFlow<()> {
        if self.stopped {
            return ControlFlow::Break(());
        }
        trace!("handling {message:?}");
        match message {
            EngineMessage::Lifecycle(event) => {
                let effects = self.power.apply(event);
                self.carry_out(effects);
            }
            EngineMessage::Tick(id) => {
                let now_ms = self.clock.now().timestamp_millis();
                if self.scheduler.on_fired(id, now_ms) {
                    self.invalidate();
                }
            }
            EngineMessage::Weather { generation, update } => {
                if self.sync.accepts(generation) {
                    self.set_weather(update);
                } else {
                    debug!("dropping weather from stale subscription {generation}");
                }
            }
            EngineMessage::Shutdown => {
                self.teardown();
                return ControlFlow::Break(());
            }
        }

        if self.redraw_pending {
            self.redraw_pending = false;
            if self.power.state().visible {
                self.draw();
            }
        }
        ControlFlow::Continue(())
    }

    /// Handles everything currently queued without waiting. Returns the
    /// number of messages handled.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            handled += 1;
            if self.handle(message).is_break() {
                break;
            }
        }
        handled
    }

    /// Runs until `Shutdown`. The engine holds senders of its own for timers
    /// and the subscription, so dropping every handle does not stop it.
    pub async fn run(mut self) -> Self {
        info!("face engine running");
        while let Some(message) = self.rx.recv().await {
            if self.handle(message).is_break() {
                break;
            }
        }
        self.teardown();
        info!("face engine stopped after {} frames", self.frames_drawn);
        self
    }

    fn carry_out(&mut self, effects: Effects) {
        // Unsubscribe first so nothing below can race a torn-down stream.
        match effects.subscription {
            Some(SubscriptionChange::Unsubscribe) => self.sync.unsubscribe(),
            Some(SubscriptionChange::Subscribe) => self.sync.subscribe(),
            None => {}
        }
        if effects.refresh_time_zone {
            self.offset = self.clock.local_offset();
            debug!("time zone offset {}", self.offset);
        }
        if let Some(shape) = effects.reload_metrics {
            self.reload_metrics(shape);
        }
        if effects.reevaluate_scheduler {
            self.scheduler
                .update(self.power.state().scheduler_should_run());
        }
        if effects.redraw {
            self.invalidate();
        }
    }

    fn reload_metrics(&mut self, shape: ScreenShape) {
        self.shape = shape;
        self.metrics = FaceMetrics::from_layout(self.config.layout.for_shape(shape));
        self.icons.resize(self.metrics.icon_size);
        if let Some(snapshot) = self.weather.as_mut() {
            snapshot.icon = self.icons.get(snapshot.condition);
        }
        info!("loaded {:?} layout", shape);
    }

    fn set_weather(&mut self, update: WeatherUpdate) {
        let condition = ConditionIcon::from_condition_code(update.weather_condition);
        info!(
            "weather {} / {} ({:?}, code {})",
            update.high_temperature, update.low_temperature, condition, update.weather_condition
        );
        self.weather = Some(WeatherSnapshot {
            high_temperature: update.high_temperature,
            low_temperature: update.low_temperature,
            condition,
            icon: self.icons.get(condition),
        });
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.redraw_pending = true;
    }

    fn draw(&mut self) {
        let reading = ClockReading::new(self.clock.now(), self.offset);
        let inputs = FrameInputs {
            ambient: self.power.state().ambient,
            twelve_hour: self.config.clock.twelve_hour,
            reading: &reading,
            weather: self.weather.as_ref(),
        };
        let target = self.surface.lock();
        let layout = draw_face(target, &self.metrics, self.power.palette(), &inputs);
        self.surface.post();
        self.frames_drawn += 1;
        trace!("frame {} drawn: {}", self.frames_drawn, layout.time.text);
        self.last_layout = Some(layout);
    }

    fn teardown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.sync.unsubscribe();
        self.scheduler.shutdown();
        self.weather = None;
        debug!("engine session torn down");
    }
}
