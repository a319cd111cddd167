//! # Redraw Scheduler
//!
//! Requests a redraw once per interval while the display is visible and
//! interactive. Ticks are aligned to wall-clock boundaries: after each fire
//! the next delay is `interval - (now mod interval)`, so callback latency never
//! accumulates into drift.
//!
//! ## Single pending slot
//! At most one timer is outstanding. Every timer is a spawned task that races
//! a sleep against a [`CancellationToken`]; arming a new timer always cancels
//! the previous one first. Each timer also carries a [`TickId`] so a tick that
//! was already queued when its timer was cancelled is recognised as stale.
//!
//! Ambient mode uses the platform's minute tick instead, so nothing runs here
//! while ambient.

use crate::engine::EngineMessage;
use log::{debug, trace};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

pub type TickId = u64;

/// Delay from `now_ms` to the next multiple of `interval`.
///
/// Always in `1..=interval` milliseconds: a call made exactly on a boundary
/// waits a full interval rather than firing twice for the same instant.
pub fn next_tick_delay(now_ms: i64, interval: Duration) -> Duration {
    let period = (interval.as_millis() as i64).max(1);
    Duration::from_millis((period - now_ms.rem_euclid(period)) as u64)
}

#[derive(Debug)]
struct PendingTick {
    id: TickId,
    token: CancellationToken,
}

#[derive(Debug)]
pub struct RedrawScheduler {
    interval: Duration,
    session: CancellationToken,
    pending: Option<PendingTick>,
    running: bool,
    next_id: TickId,
    tx: UnboundedSender<EngineMessage>,
}

impl RedrawScheduler {
    /// `session` is the engine's teardown token; cancelling it stops every
    /// timer this scheduler ever armed.
    pub fn new(
        interval: Duration,
        session: CancellationToken,
        tx: UnboundedSender<EngineMessage>,
    ) -> Self {
        Self {
            interval,
            session,
            pending: None,
            running: false,
            next_id: 0,
            tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Starts or stops to match `should_run`.
    pub fn update(&mut self, should_run: bool) {
        if should_run {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Begins ticking with an immediate redraw. No-op if already running.
    pub fn start(&mut self) {
        if self.running || self.session.is_cancelled() {
            return;
        }
        debug!("redraw scheduler started");
        self.running = true;
        self.arm(Duration::ZERO);
    }

    /// Cancels the pending timer. No-op if already stopped.
    pub fn stop(&mut self) {
        self.cancel_pending();
        if self.running {
            debug!("redraw scheduler stopped");
            self.running = false;
        }
    }

    /// Stops and cancels the session token. The scheduler never starts again.
    pub fn shutdown(&mut self) {
        self.stop();
        self.session.cancel();
    }

    /// Called by the engine when `Tick(id)` is dequeued. Returns whether the
    /// tick is current; stale ticks are dropped without redrawing.
    pub fn on_fired(&mut self, id: TickId, now_ms: i64) -> bool {
        match &self.pending {
            Some(pending) if pending.id == id => {}
            _ => {
                trace!("dropping stale tick {id}");
                return false;
            }
        }
        self.pending = None;
        if self.running {
            self.arm(next_tick_delay(now_ms, self.interval));
        }
        true
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.token.cancel();
        }
    }

    fn arm(&mut self, delay: Duration) {
        self.cancel_pending();
        let id = self.next_id;
        self.next_id += 1;
        let token = self.session.child_token();
        let timer = token.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // Receiver gone means the engine has stopped.
                    let _ = tx.send(EngineMessage::Tick(id));
                }
            }
        });
        trace!("tick {id} armed in {delay:?}");
        self.pending = Some(PendingTick { id, token });
    }
}
