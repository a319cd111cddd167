//! # Sunshine Face Demo Host
//!
//! Stands in for the wearable platform: it creates a display session, feeds
//! it the lifecycle callbacks a watch would deliver, pushes a forecast through
//! the in-process data layer and shows what the engine draws.
//!
//! Run with `--stdout` to print every posted frame as ASCII art; without it
//! only the log shows what happened (`RUST_LOG=debug` for the full story).

// Test modules
#[cfg(test)]
mod tests;

use anyhow::Context;
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use log::{info, warn};
use serde_json::json;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use sunshine_face_lib::clock::SystemClock;
use sunshine_face_lib::config::{Config, ScreenConfig};
use sunshine_face_lib::engine::{EngineHandle, FaceEngine, Surface};
use sunshine_face_lib::framebuffer::FrameBuffer;
use sunshine_face_lib::power::LifecycleEvent;
use sunshine_face_lib::sync::{DataEvent, LoopbackDataLayer};

/// Terminal cells per frame pixel block.
const ASCII_CELL: u32 = 4;

/// Frame buffer that optionally dumps each posted frame to the terminal.
struct TerminalSurface {
    buffer: FrameBuffer,
    print_frames: bool,
    posted: u64,
}

impl TerminalSurface {
    fn new(screen: &ScreenConfig, print_frames: bool) -> Self {
        Self {
            buffer: FrameBuffer::new(screen.width, screen.height),
            print_frames,
            posted: 0,
        }
    }
}

impl Surface for TerminalSurface {
    type Target = FrameBuffer;

    fn lock(&mut self) -> &mut FrameBuffer {
        &mut self.buffer
    }

    fn post(&mut self) {
        self.posted += 1;
        if self.print_frames {
            // Every frame starts by clearing to the background.
            let background = self.buffer.pixel(0, 0).unwrap_or(Rgb888::BLACK);
            println!("--- frame {} ---", self.posted);
            println!("{}", self.buffer.to_ascii(background, ASCII_CELL));
        }
    }
}

/// Plays one short watch session against the engine.
async fn demo_session(
    handle: EngineHandle,
    layer: Arc<LoopbackDataLayer>,
    config: Config,
) -> anyhow::Result<()> {
    handle.lifecycle(LifecycleEvent::PropertiesChanged {
        low_bit_ambient: true,
    });
    handle.lifecycle(LifecycleEvent::InsetsChanged(config.screen.shape));
    handle.lifecycle(LifecycleEvent::VisibilityChanged(true));

    // The subscription is up once the handshake completes.
    tokio::time::timeout(Duration::from_secs(2), async {
        while layer.listener_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .context("weather subscription never came up")?;

    let delivered = layer.publish(DataEvent::changed(
        config.sync.weather_path.clone(),
        json!({
            "high_temperature": "75°",
            "low_temperature": "54°",
            "weather_condition": 200,
        }),
    ));
    info!("demo forecast delivered to {delivered} listener(s)");

    tokio::time::sleep(Duration::from_millis(2500)).await;

    handle.lifecycle(LifecycleEvent::AmbientModeChanged(true));
    handle.lifecycle(LifecycleEvent::TimeTick);
    tokio::time::sleep(Duration::from_secs(1)).await;

    handle.lifecycle(LifecycleEvent::AmbientModeChanged(false));
    tokio::time::sleep(Duration::from_millis(1500)).await;

    handle.lifecycle(LifecycleEvent::VisibilityChanged(false));
    Ok(())
}

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Development mode: render frames to stdout
    let print_frames = env::args().any(|arg| arg == "--stdout");

    let config = Config::load();
    let rt = tokio::runtime::Runtime::new()?;

    let engine = rt.block_on(async {
        let layer = Arc::new(LoopbackDataLayer::new());
        let surface = TerminalSurface::new(&config.screen, print_frames);
        let (engine, handle) = FaceEngine::new(
            config.clone(),
            Arc::new(SystemClock),
            Arc::clone(&layer),
            surface,
        );

        let script = tokio::spawn({
            let handle = handle.clone();
            let config = config.clone();
            async move {
                let result = demo_session(handle.clone(), layer, config).await;
                // The engine only stops on Shutdown, so always send it.
                handle.shutdown();
                result
            }
        });

        let engine = engine.run().await;
        match script.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("demo session ended early: {e:#}"),
            Err(e) => warn!("demo session task failed: {e}"),
        }
        engine
    });

    info!(
        "session finished: {} frames drawn, {} posted, {} subscription(s), {} teardown(s)",
        engine.frames_drawn(),
        engine.surface().posted,
        engine.sync().subscribe_count(),
        engine.sync().teardown_count()
    );
    Ok(())
}
