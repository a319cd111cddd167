//! # Display Session Scenarios
//!
//! Each test plays a sequence of host callbacks and weather pushes against a
//! complete [`FaceEngine`] and checks the frames it draws. Time is paused so
//! the redraw scheduler never fires on its own between steps.

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use sunshine_face_lib::clock::ManualClock;
use sunshine_face_lib::config::Config;
use sunshine_face_lib::engine::{EngineHandle, EngineMessage, FaceEngine, Surface};
use sunshine_face_lib::framebuffer::FrameBuffer;
use sunshine_face_lib::power::{DisplayPhase, LifecycleEvent};
use sunshine_face_lib::render::text_width;
use sunshine_face_lib::sync::{DataEvent, LoopbackDataLayer, WeatherUpdate, WEATHER_PATH};
use sunshine_face_lib::{ConditionIcon, ScreenShape};

struct RecordingSurface {
    frame: FrameBuffer,
    posts: usize,
}

impl Surface for RecordingSurface {
    type Target = FrameBuffer;

    fn lock(&mut self) -> &mut FrameBuffer {
        &mut self.frame
    }

    fn post(&mut self) {
        self.posts += 1;
    }
}

type TestEngine = FaceEngine<LoopbackDataLayer, RecordingSurface>;

struct Session {
    engine: TestEngine,
    handle: EngineHandle,
    layer: Arc<LoopbackDataLayer>,
    clock: Arc<ManualClock>,
}

/// Saturday 9 March 2024, 14:05:07 UTC.
fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
}

fn session_with(config: Config) -> Session {
    let clock = Arc::new(ManualClock::new(
        start_time(),
        FixedOffset::east_opt(0).unwrap(),
    ));
    let layer = Arc::new(LoopbackDataLayer::new());
    let surface = RecordingSurface {
        frame: FrameBuffer::new(config.screen.width, config.screen.height),
        posts: 0,
    };
    let (engine, handle) = FaceEngine::new(config, clock.clone(), Arc::clone(&layer), surface);
    Session {
        engine,
        handle,
        layer,
        clock,
    }
}

fn session() -> Session {
    session_with(Config::default())
}

impl Session {
    /// Lets spawned timers and the subscription task run, handling whatever
    /// they queue.
    async fn settle(&mut self) {
        for _ in 0..8 {
            tokio::task::yield_now().await;
            self.engine.drain();
        }
    }

    async fn send(&mut self, event: LifecycleEvent) {
        assert!(self.handle.lifecycle(event));
        self.settle().await;
    }

    async fn push_weather(&mut self, payload: serde_json::Value) {
        self.layer.publish(DataEvent::changed(WEATHER_PATH, payload));
        self.settle().await;
    }

    fn scheduler_matches_power_state(&self) -> bool {
        let state = self.engine.power_state();
        self.engine.scheduler().is_running() == (state.visible && !state.ambient)
    }

    fn frame(&self) -> &FrameBuffer {
        &self.engine.surface().frame
    }
}

fn forecast() -> serde_json::Value {
    json!({
        "high_temperature": "75°",
        "low_temperature": "54°",
        "weather_condition": 200,
    })
}

/// Test that the redraw timer runs exactly while the face is visible and interactive.
#[tokio::test(start_paused = true)]
async fn scheduler_runs_only_while_visible_and_interactive() {
    let mut s = session();
    assert!(s.scheduler_matches_power_state());

    let steps = [
        LifecycleEvent::VisibilityChanged(true),
        LifecycleEvent::AmbientModeChanged(true),
        LifecycleEvent::AmbientModeChanged(true),
        LifecycleEvent::VisibilityChanged(false),
        LifecycleEvent::AmbientModeChanged(false),
        LifecycleEvent::VisibilityChanged(true),
        LifecycleEvent::PropertiesChanged {
            low_bit_ambient: true,
        },
        LifecycleEvent::AmbientModeChanged(true),
        LifecycleEvent::AmbientModeChanged(false),
        LifecycleEvent::TimeZoneChanged,
        LifecycleEvent::VisibilityChanged(false),
    ];
    for event in steps {
        s.send(event).await;
        assert!(
            s.scheduler_matches_power_state(),
            "scheduler out of step after {event:?} in {:?}",
            s.engine.phase()
        );
    }
}

/// Test that interactive mode redraws on each second boundary with fresh time.
#[tokio::test(start_paused = true)]
async fn interactive_frames_follow_the_clock_once_a_second() {
    let mut s = session();
    s.send(LifecycleEvent::VisibilityChanged(true)).await;
    assert_eq!(s.engine.phase(), DisplayPhase::VisibleInteractive);
    let first = s.engine.frames_drawn();
    assert!(first >= 1);
    assert_eq!(s.engine.last_layout().unwrap().time.text, "14:05:07");

    s.clock.advance(ChronoDuration::seconds(1));
    tokio::time::advance(std::time::Duration::from_millis(1000)).await;
    s.settle().await;

    assert_eq!(s.engine.frames_drawn(), first + 1);
    assert_eq!(s.engine.last_layout().unwrap().time.text, "14:05:08");
}

/// Test that entering ambient mode twice neither redraws nor recomputes the palette.
#[tokio::test(start_paused = true)]
async fn repeated_ambient_event_is_a_no_op() {
    let mut s = session();
    s.send(LifecycleEvent::VisibilityChanged(true)).await;
    s.send(LifecycleEvent::AmbientModeChanged(true)).await;
    let frames = s.engine.frames_drawn();
    let generation = s.engine.palette_generation();
    let palette = *s.engine.palette();

    s.send(LifecycleEvent::AmbientModeChanged(true)).await;

    assert_eq!(s.engine.frames_drawn(), frames);
    assert_eq!(s.engine.palette_generation(), generation);
    assert_eq!(*s.engine.palette(), palette);
}

/// Test that a pushed forecast is drawn with its icon left of the centred high.
#[tokio::test(start_paused = true)]
async fn storm_forecast_is_drawn_with_icon_left_of_high() {
    let mut s = session();
    s.send(LifecycleEvent::VisibilityChanged(true)).await;
    assert!(s.engine.sync().is_subscribed());
    assert_eq!(s.layer.listener_count(), 1);

    let before = s.engine.frames_drawn();
    s.push_weather(forecast()).await;
    assert!(s.engine.frames_drawn() > before);

    let snapshot = s.engine.weather().expect("forecast applied");
    assert_eq!(snapshot.high_temperature, "75°");
    assert_eq!(snapshot.low_temperature, "54°");
    assert_eq!(snapshot.condition, ConditionIcon::Storm);

    let layout = s.engine.last_layout().unwrap();
    let metrics = *s.engine.metrics();
    let center = 160;
    assert_eq!(layout.time.text, "14:05:07");
    assert_eq!(layout.date.text, "SAT, MAR 09 2024");
    assert_eq!(
        layout.time.origin.x,
        center - text_width(metrics.time_font, &layout.time.text) as i32 / 2
    );
    assert_eq!(
        layout.date.origin.x,
        center - text_width(metrics.date_font, &layout.date.text) as i32 / 2
    );

    let weather = layout.weather.as_ref().expect("weather row");
    let (left, right) = weather.separator;
    assert_eq!(left.y, right.y);
    assert_eq!(left.x + right.x, 2 * center);
    assert!(left.y > layout.date.origin.y && left.y < weather.high.origin.y);

    assert_eq!(weather.high.origin.x, center - weather.high.width as i32 / 2);
    let icon = weather.icon.expect("interactive frames show the icon");
    assert!(icon.x + metrics.icon_size as i32 <= weather.high.origin.x);
    assert_eq!(
        weather.low.origin.x,
        weather.high.origin.x + weather.high.width as i32 + metrics.gap
    );

    let theme = Config::default().theme;
    assert!(s.frame().count_color(theme.icon.rgb()) > 0);
    assert!(s.frame().count_color(theme.background.rgb()) > 0);
}

/// Test that low-bit ambient frames drop seconds and the icon and use one colour.
#[tokio::test(start_paused = true)]
async fn ambient_frame_is_single_colour_without_seconds_or_icon() {
    let mut s = session();
    s.send(LifecycleEvent::PropertiesChanged {
        low_bit_ambient: true,
    })
    .await;
    s.send(LifecycleEvent::VisibilityChanged(true)).await;
    s.push_weather(forecast()).await;

    s.send(LifecycleEvent::AmbientModeChanged(true)).await;
    assert_eq!(s.engine.phase(), DisplayPhase::VisibleAmbient);
    assert!(!s.engine.scheduler().is_running());

    let layout = s.engine.last_layout().unwrap();
    assert_eq!(layout.time.text, "14:05");
    let weather = layout.weather.as_ref().expect("weather row");
    assert!(weather.icon.is_none());

    // "75° 54°" is centred as one block.
    let block_left = weather.high.origin.x;
    let block_right = weather.low.origin.x + weather.low.width as i32;
    assert!((block_left + block_right - 320).abs() <= 1);

    // Black background, one foreground colour, no smoothing half-tones.
    assert_eq!(
        s.frame().distinct_colors(),
        vec![0x000000, 0xFFFFFF]
    );
}

/// Test that the platform minute tick redraws the ambient face.
#[tokio::test(start_paused = true)]
async fn minute_tick_redraws_in_ambient() {
    let mut s = session();
    s.send(LifecycleEvent::VisibilityChanged(true)).await;
    s.send(LifecycleEvent::AmbientModeChanged(true)).await;
    let frames = s.engine.frames_drawn();

    s.clock.advance(ChronoDuration::minutes(1));
    s.send(LifecycleEvent::TimeTick).await;

    assert_eq!(s.engine.frames_drawn(), frames + 1);
    assert_eq!(s.engine.last_layout().unwrap().time.text, "14:06");
}

/// Test that malformed, deleted or foreign events leave the forecast untouched.
#[tokio::test(start_paused = true)]
async fn malformed_or_foreign_events_keep_the_previous_forecast() {
    let mut s = session();
    s.send(LifecycleEvent::VisibilityChanged(true)).await;
    s.push_weather(forecast()).await;
    let kept = s.engine.weather().cloned();

    s.push_weather(json!({ "high_temperature": "80°" })).await;
    s.push_weather(json!("not an object")).await;
    s.layer.publish(DataEvent::changed(
        "/steps",
        json!({
            "high_temperature": "1°",
            "low_temperature": "0°",
            "weather_condition": 800,
        }),
    ));
    s.layer.publish(DataEvent::deleted(WEATHER_PATH));
    s.settle().await;

    assert_eq!(s.engine.weather().cloned(), kept);
}

/// Test that an unlisted condition code still gets an icon.
#[tokio::test(start_paused = true)]
async fn unknown_condition_code_uses_the_fallback_icon() {
    let mut s = session();
    s.send(LifecycleEvent::VisibilityChanged(true)).await;
    s.push_weather(json!({
        "high_temperature": "12°",
        "low_temperature": "3°",
        "weather_condition": 9999,
    }))
    .await;

    let snapshot = s.engine.weather().expect("forecast applied");
    assert_eq!(snapshot.condition, ConditionIcon::Unknown);
    assert!(snapshot.icon.mask().set_count() > 0);
}

/// Test that hiding and showing again tears down and resubscribes exactly once.
#[tokio::test(start_paused = true)]
async fn hide_then_show_resubscribes_exactly_once() {
    let mut s = session();
    s.send(LifecycleEvent::VisibilityChanged(true)).await;
    s.send(LifecycleEvent::VisibilityChanged(false)).await;
    assert!(!s.engine.sync().is_subscribed());
    assert_eq!(s.layer.listener_count(), 0);

    s.send(LifecycleEvent::VisibilityChanged(true)).await;

    assert_eq!(s.engine.sync().teardown_count(), 1);
    assert_eq!(s.engine.sync().subscribe_count(), 2);
    assert_eq!(s.layer.disconnect_count(), 1);
    assert_eq!(s.layer.listener_count(), 1);
    assert_eq!(s.layer.publish(DataEvent::changed(WEATHER_PATH, forecast())), 1);
}

/// Test that updates tagged with a dead subscription generation are dropped.
#[tokio::test(start_paused = true)]
async fn updates_from_an_old_subscription_are_ignored() {
    let mut s = session();
    s.send(LifecycleEvent::VisibilityChanged(true)).await;

    let update = WeatherUpdate {
        high_temperature: "99°".to_string(),
        low_temperature: "98°".to_string(),
        weather_condition: 800,
    };
    for generation in [0, 7] {
        assert!(s.handle.send(EngineMessage::Weather {
            generation,
            update: update.clone(),
        }));
    }
    s.settle().await;

    assert!(s.engine.weather().is_none());
}

/// Test that a failed handshake still leaves time and date on screen.
#[tokio::test(start_paused = true)]
async fn connection_failure_still_shows_time_and_date() {
    let mut s = session();
    s.layer.set_connect_failure(true);
    s.send(LifecycleEvent::VisibilityChanged(true)).await;

    assert_eq!(s.layer.connect_count(), 1);
    assert_eq!(s.layer.listener_count(), 0);
    assert!(s.engine.weather().is_none());

    let layout = s.engine.last_layout().expect("frame drawn");
    assert!(layout.weather.is_none());
    assert!(!layout.time.text.is_empty());
    assert!(!layout.date.text.is_empty());
}

/// Test that a time-zone change is applied to the next frame.
#[tokio::test(start_paused = true)]
async fn time_zone_change_is_picked_up() {
    let mut s = session();
    s.send(LifecycleEvent::VisibilityChanged(true)).await;

    s.clock.set_offset(FixedOffset::east_opt(9 * 3600).unwrap());
    s.send(LifecycleEvent::TimeZoneChanged).await;

    assert_eq!(s.engine.time_zone(), FixedOffset::east_opt(9 * 3600).unwrap());
    let layout = s.engine.last_layout().unwrap();
    assert_eq!(layout.time.text, "23:05:07");
    assert_eq!(layout.date.text, "SAT, MAR 09 2024");
}

/// Test that the zone is re-read when the face becomes visible.
#[tokio::test(start_paused = true)]
async fn zone_is_refreshed_when_becoming_visible() {
    let mut s = session();
    s.clock.set_offset(FixedOffset::west_opt(5 * 3600).unwrap());
    s.send(LifecycleEvent::VisibilityChanged(true)).await;

    assert_eq!(s.engine.last_layout().unwrap().time.text, "9:05:07");
}

/// Test that round insets swap in round metrics and a resized icon.
#[tokio::test(start_paused = true)]
async fn round_insets_reload_metrics_and_icon() {
    let mut s = session();
    s.send(LifecycleEvent::VisibilityChanged(true)).await;
    s.push_weather(forecast()).await;
    assert_eq!(s.engine.weather().unwrap().icon.width(), 32);

    s.send(LifecycleEvent::InsetsChanged(ScreenShape::Round)).await;

    let round = Config::default().layout.round;
    assert_eq!(s.engine.shape(), ScreenShape::Round);
    assert_eq!(s.engine.metrics().icon_size, round.icon_size);
    assert_eq!(s.engine.icons().size(), round.icon_size);
    assert_eq!(s.engine.weather().unwrap().icon.width(), round.icon_size);
    assert_eq!(
        s.engine.last_layout().unwrap().time.origin.y,
        round.time_y_offset
    );
}

/// Test that shutdown drops the forecast and stops timers and sync.
#[tokio::test(start_paused = true)]
async fn shutdown_discards_session_state() {
    let mut s = session();
    s.send(LifecycleEvent::VisibilityChanged(true)).await;
    s.push_weather(forecast()).await;

    assert!(s.handle.shutdown());
    s.settle().await;

    assert!(s.engine.is_stopped());
    assert!(s.engine.weather().is_none());
    assert!(!s.engine.scheduler().is_running());
    assert!(!s.engine.sync().is_subscribed());
    assert_eq!(s.layer.listener_count(), 0);

    // A late push reaches nobody.
    assert_eq!(s.layer.publish(DataEvent::changed(WEATHER_PATH, forecast())), 0);
}

/// Test that showing and hiding in one batch never reaches the data layer.
#[tokio::test(start_paused = true)]
async fn show_then_hide_in_one_batch_never_connects() {
    for _ in 0..50 {
        let mut s = session();
        assert!(s.handle.lifecycle(LifecycleEvent::VisibilityChanged(true)));
        assert!(s.handle.lifecycle(LifecycleEvent::VisibilityChanged(false)));
        s.engine.drain();
        s.settle().await;

        assert_eq!(s.engine.phase(), DisplayPhase::Hidden);
        assert!(!s.engine.sync().is_subscribed());
        assert_eq!(s.layer.connect_count(), 0);
        assert!(!s.layer.is_connected());
        assert_eq!(s.layer.listener_count(), 0);
    }
}

/// Test that a suspended connection keeps the last forecast until the next show.
#[tokio::test(start_paused = true)]
async fn suspension_keeps_forecast_and_recovers_on_next_show() {
    let mut s = session();
    s.send(LifecycleEvent::VisibilityChanged(true)).await;
    s.push_weather(forecast()).await;
    assert!(s.layer.is_connected());

    s.layer.suspend();
    s.settle().await;
    assert!(!s.layer.is_connected());
    assert_eq!(s.layer.publish(DataEvent::changed(WEATHER_PATH, forecast())), 0);
    let frames = s.engine.frames_drawn();
    s.send(LifecycleEvent::TimeTick).await;
    assert_eq!(s.engine.frames_drawn(), frames + 1);
    assert_eq!(s.engine.weather().unwrap().high_temperature, "75°");

    s.send(LifecycleEvent::VisibilityChanged(false)).await;
    s.send(LifecycleEvent::VisibilityChanged(true)).await;
    assert!(s.layer.is_connected());
    s.push_weather(json!({
        "high_temperature": "61°",
        "low_temperature": "48°",
        "weather_condition": 801,
    }))
    .await;

    let snapshot = s.engine.weather().expect("forecast after reconnect");
    assert_eq!(snapshot.high_temperature, "61°");
    assert_eq!(snapshot.condition, ConditionIcon::LightClouds);
}

/// Test that the date row rolls over at local midnight.
#[tokio::test(start_paused = true)]
async fn date_rolls_over_at_midnight() {
    let mut s = session();
    s.send(LifecycleEvent::VisibilityChanged(true)).await;
    s.send(LifecycleEvent::AmbientModeChanged(true)).await;

    s.clock.set(Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 30).unwrap());
    s.send(LifecycleEvent::TimeTick).await;

    let layout = s.engine.last_layout().unwrap();
    assert_eq!(layout.time.text, "0:00");
    assert_eq!(layout.date.text, "SUN, MAR 10 2024");
}
