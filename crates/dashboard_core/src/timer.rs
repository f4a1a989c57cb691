use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{sync::mpsc, time::MissedTickBehavior};
use tracing::debug;

pub const ELAPSED_TICK: Duration = Duration::from_secs(1);
pub const OPERATION_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Printer elapsed time, derived from the print start timestamp.
    Elapsed,
    /// Generic "current operation" duration display.
    OperationDuration,
}

/// Owning handle to a periodic task. Dropping it cancels the task.
pub struct TimerHandle {
    kind: TimerKind,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    pub fn new(kind: TimerKind, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            kind,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

pub trait Scheduler: Send + Sync {
    fn every(&self, kind: TimerKind, period: Duration) -> TimerHandle;
}

/// Spawns interval tasks that post their kind back to the runtime loop.
#[derive(Clone)]
pub struct TokioScheduler {
    ticks: mpsc::UnboundedSender<TimerKind>,
}

impl TokioScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerKind>) {
        let (ticks, rx) = mpsc::unbounded_channel();
        (Self { ticks }, rx)
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, kind: TimerKind, period: Duration) -> TimerHandle {
        let ticks = self.ticks.clone();
        let task = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if ticks.send(kind).is_err() {
                    break;
                }
            }
        });
        debug!(?kind, period_ms = period.as_millis() as u64, "timer: started");
        let abort = task.abort_handle();
        TimerHandle::new(kind, move || {
            abort.abort();
            debug!(?kind, "timer: cancelled");
        })
    }
}

/// Scheduler that spawns nothing and tracks how many handles of each kind
/// are alive. Used where ticks are driven by hand.
#[derive(Debug, Clone, Default)]
pub struct RecordingScheduler {
    live: Arc<Mutex<HashMap<TimerKind, usize>>>,
    started: Arc<Mutex<Vec<TimerKind>>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self, kind: TimerKind) -> usize {
        self.live
            .lock()
            .map(|live| live.get(&kind).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn started(&self, kind: TimerKind) -> usize {
        self.started
            .lock()
            .map(|started| started.iter().filter(|k| **k == kind).count())
            .unwrap_or(0)
    }
}

impl Scheduler for RecordingScheduler {
    fn every(&self, kind: TimerKind, _period: Duration) -> TimerHandle {
        if let Ok(mut started) = self.started.lock() {
            started.push(kind);
        }
        if let Ok(mut live) = self.live.lock() {
            *live.entry(kind).or_insert(0) += 1;
        }
        let live = Arc::clone(&self.live);
        TimerHandle::new(kind, move || {
            if let Ok(mut live) = live.lock() {
                if let Some(count) = live.get_mut(&kind) {
                    *count = count.saturating_sub(1);
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/timer_tests.rs"]
mod tests;
