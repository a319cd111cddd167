//! # Weather Sync Channel
//!
//! The paired phone publishes forecasts as data items on a well-known path.
//! This module subscribes to that stream while the display is visible and
//! forwards each valid payload to the engine queue.
//!
//! ## Payload
//! ```json
//! { "high_temperature": "75°", "low_temperature": "54°", "weather_condition": 200 }
//! ```
//! Events on other paths and deleted items are ignored. Payloads missing a
//! field are dropped; the previous snapshot stays on screen.
//!
//! ## Lifetime
//! A subscription is established on becoming visible (connect, then
//! subscribe) and torn down on becoming hidden. Teardown cancels the
//! forwarding task's token synchronously and bumps nothing else: any update
//! already queued carries the old generation and the engine discards it.
//!
//! ## Failures
//! Connection failures and suspensions are logged and otherwise swallowed.
//! The face simply shows no (or the last) weather until the next visible
//! period reconnects. There is no retry loop here.

use crate::engine::EngineMessage;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

/// Logical path forecasts are published on.
pub const WEATHER_PATH: &str = "/weather";

#[derive(Error, Debug)]
pub enum SyncError {
    /// Handshake with the companion transport failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Subscribe attempted without a live connection
    #[error("not connected")]
    NotConnected,

    /// Payload on the weather path is missing or mistypes a field
    #[error("malformed weather payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataEventKind {
    Changed,
    Deleted,
}

/// One item change delivered by the data layer.
#[derive(Clone, Debug, PartialEq)]
pub struct DataEvent {
    pub kind: DataEventKind,
    pub path: String,
    pub payload: serde_json::Value,
}

impl DataEvent {
    pub fn changed(path: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: DataEventKind::Changed,
            path: path.into(),
            payload,
        }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            kind: DataEventKind::Deleted,
            path: path.into(),
            payload: serde_json::Value::Null,
        }
    }
}

/// A forecast as sent by the phone, before icon resolution.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WeatherUpdate {
    pub high_temperature: String,
    pub low_temperature: String,
    pub weather_condition: i32,
}

impl WeatherUpdate {
    /// `Ok(None)` for events this channel does not care about.
    pub fn from_event(event: &DataEvent, path: &str) -> Result<Option<Self>, SyncError> {
        if event.kind != DataEventKind::Changed || event.path != path {
            return Ok(None);
        }
        Ok(Some(Self::deserialize(&event.payload)?))
    }
}

/// The companion transport. Delivery is push-based: after `subscribe` every
/// data event, on any path, is sent down the returned channel until
/// `disconnect` or a suspension closes it.
#[async_trait]
pub trait DataLayer: Send + Sync + 'static {
    async fn connect(&self) -> Result<(), SyncError>;

    fn subscribe(&self, path: &str) -> Result<UnboundedReceiver<DataEvent>, SyncError>;

    fn disconnect(&self);
}

#[derive(Debug)]
struct ActiveSubscription {
    generation: u64,
    token: CancellationToken,
}

/// Owns at most one live subscription.
#[derive(Debug)]
pub struct WeatherSync<L: DataLayer> {
    layer: Arc<L>,
    path: String,
    tx: UnboundedSender<EngineMessage>,
    active: Option<ActiveSubscription>,
    generation: u64,
    subscribes: usize,
    teardowns: usize,
}

impl<L: DataLayer> WeatherSync<L> {
    pub fn new(layer: Arc<L>, path: impl Into<String>, tx: UnboundedSender<EngineMessage>) -> Self {
        Self {
            layer,
            path: path.into(),
            tx,
            active: None,
            generation: 0,
            subscribes: 0,
            teardowns: 0,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.active.is_some()
    }

    /// Whether an update tagged `generation` came from the live subscription.
    pub fn accepts(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes
    }

    pub fn teardown_count(&self) -> usize {
        self.teardowns
    }

    /// Starts connect + subscribe in the background. No-op when already
    /// subscribed.
    pub fn subscribe(&mut self) {
        if self.active.is_some() {
            debug!("weather subscription already active");
            return;
        }
        self.generation += 1;
        let token = CancellationToken::new();
        tokio::spawn(forward(
            Arc::clone(&self.layer),
            self.path.clone(),
            self.tx.clone(),
            self.generation,
            token.clone(),
        ));
        self.subscribes += 1;
        self.active = Some(ActiveSubscription {
            generation: self.generation,
            token,
        });
    }

    /// Cancels the forwarding task and disconnects. No-op when idle.
    pub fn unsubscribe(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
            self.layer.disconnect();
            self.teardowns += 1;
            debug!("weather subscription {} torn down", active.generation);
        }
    }
}

async fn forward<L: DataLayer>(
    layer: Arc<L>,
    path: String,
    tx: UnboundedSender<EngineMessage>,
    generation: u64,
    token: CancellationToken,
) {
    let session = async {
        layer.connect().await?;
        if token.is_cancelled() {
            // Torn down while the handshake was in flight.
            layer.disconnect();
            return Ok(());
        }
        let mut events = layer.subscribe(&path)?;
        info!("listening for weather on {path}");
        while let Some(event) = events.recv().await {
            match WeatherUpdate::from_event(&event, &path) {
                Ok(Some(update)) => {
                    if tx.send(EngineMessage::Weather { generation, update }).is_err() {
                        break;
                    }
                }
                Ok(None) => debug!("ignoring {:?} on {}", event.kind, event.path),
                Err(e) => warn!("dropping weather event: {e}"),
            }
        }
        Ok::<(), SyncError>(())
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => debug!("weather subscription {generation} cancelled"),
        result = session => match result {
            Ok(()) => info!("weather stream closed by data layer"),
            Err(e) => warn!("weather sync unavailable: {e}"),
        },
    }
}

#[derive(Debug, Default)]
struct LoopbackState {
    connected: bool,
    fail_connect: bool,
    listeners: Vec<UnboundedSender<DataEvent>>,
}

/// In-process data layer: whatever is published is delivered to every
/// current listener. Stands in for the companion transport in development
/// mode and tests.
#[derive(Debug, Default)]
pub struct LoopbackDataLayer {
    state: Mutex<LoopbackState>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl LoopbackDataLayer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers `event` and returns how many listeners received it.
    pub fn publish(&self, event: DataEvent) -> usize {
        let mut state = self.state();
        state.listeners.retain(|l| !l.is_closed());
        state
            .listeners
            .iter()
            .filter(|l| l.send(event.clone()).is_ok())
            .count()
    }

    /// Makes subsequent `connect` calls fail.
    pub fn set_connect_failure(&self, fail: bool) {
        self.state().fail_connect = fail;
    }

    /// Drops the connection as a platform suspension would.
    pub fn suspend(&self) {
        let mut state = self.state();
        state.connected = false;
        state.listeners.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.iter().filter(|l| !l.is_closed()).count()
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataLayer for LoopbackDataLayer {
    async fn connect(&self) -> Result<(), SyncError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if state.fail_connect {
            return Err(SyncError::ConnectionFailed("loopback refused".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    fn subscribe(&self, path: &str) -> Result<UnboundedReceiver<DataEvent>, SyncError> {
        let mut state = self.state();
        if !state.connected {
            return Err(SyncError::NotConnected);
        }
        debug!("loopback listener added for {path}");
        let (tx, rx) = mpsc::unbounded_channel();
        state.listeners.push(tx);
        Ok(rx)
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        state.connected = false;
        state.listeners.clear();
    }
}
