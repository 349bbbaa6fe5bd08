//! Tick sources.
//!
//! Anything that periodically calls [`TickSink::on_tick`] can drive a diagram:
//! [`TokioTicker`] does so in real time on a tokio runtime, [`ManualClock`]
//! does so on demand for deterministic tests and offline rendering.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Receiver of animation ticks.
pub trait TickSink {
    /// Apply `dt` of elapsed time. Returning `false` asks the source to stop.
    fn on_tick(&self, dt: Duration) -> bool;
}

/// Steps a sink by a fixed `dt` whenever asked.
pub struct ManualClock<'a, S: TickSink + ?Sized> {
    sink: &'a S,
    step: Duration,
    elapsed: Duration,
}

impl<'a, S: TickSink + ?Sized> ManualClock<'a, S> {
    pub fn new(sink: &'a S, step: Duration) -> Self {
        Self {
            sink,
            step,
            elapsed: Duration::ZERO,
        }
    }

    /// Deliver one tick. Returns the sink's answer.
    pub fn tick(&mut self) -> bool {
        self.elapsed += self.step;
        self.sink.on_tick(self.step)
    }

    /// Deliver up to `n` ticks, stopping early if the sink asks to.
    pub fn advance(&mut self, n: usize) -> usize {
        for delivered in 0..n {
            if !self.tick() {
                return delivered + 1;
            }
        }
        n
    }

    /// Tick until `done` holds, giving up after `max_ticks`. Returns whether
    /// `done` was reached.
    pub fn run_until(&mut self, max_ticks: usize, mut done: impl FnMut() -> bool) -> bool {
        for _ in 0..max_ticks {
            if done() {
                return true;
            }
            if !self.tick() {
                return done();
            }
        }
        done()
    }

    /// Simulated time delivered so far.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Real-time tick source on the current tokio runtime.
///
/// Ticks are delivered sequentially from a single task. Under load, missed
/// ticks are skipped and the next delivered `dt` covers the whole gap, so
/// time is never applied out of order. The task ends when the callback
/// returns `false`, or when the ticker is stopped or dropped.
#[derive(Debug)]
pub struct TokioTicker {
    handle: JoinHandle<()>,
    period: Duration,
}

impl TokioTicker {
    /// Spawn on the current runtime. Panics outside a tokio runtime, like
    /// `tokio::spawn`.
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(Duration) -> bool + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            let mut last = Instant::now();
            loop {
                interval.tick().await;
                let now = Instant::now();
                let dt = now - last;
                last = now;
                if !on_tick(dt) {
                    debug!("tick sink asked to stop");
                    break;
                }
            }
        });
        info!(period_ms = period.as_millis() as u64, "ticker started");
        Self { handle, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stop delivering ticks. Takes effect before the next tick fires.
    pub fn stop(&self) {
        if !self.handle.is_finished() {
            self.handle.abort();
            info!("ticker stopped");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TokioTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
