use std::sync::Arc;

use shared::{
    domain::RecipeStep,
    protocol::{AlertLevel, LogMessage},
};
use tracing::info;

use crate::{
    clock::Clock,
    state::{DashboardState, LinkStatus, Notice, MAX_LOG_LINES, MAX_NOTICES},
    timer::{Scheduler, TimerHandle, TimerKind, ELAPSED_TICK, OPERATION_TICK},
};

/// Single owner of the dashboard view-model and of the timers derived from it.
///
/// The print start time and the elapsed timer handle are only ever changed
/// together, so `print_start_time().is_some()` always equals
/// [`ViewModelStore::is_elapsed_running`].
pub struct ViewModelStore {
    state: DashboardState,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    elapsed_timer: Option<TimerHandle>,
    operation_timer: Option<TimerHandle>,
}

impl ViewModelStore {
    pub fn new(clock: Arc<dyn Clock>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            state: DashboardState::default(),
            clock,
            scheduler,
            elapsed_timer: None,
            operation_timer: None,
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut DashboardState {
        &mut self.state
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn is_elapsed_running(&self) -> bool {
        self.elapsed_timer.is_some()
    }

    pub fn is_operation_running(&self) -> bool {
        self.operation_timer.is_some()
    }

    /// STOPPED -> RUNNING. Returns false when the timer was already running.
    pub fn start_elapsed_timer(&mut self) -> bool {
        if self.elapsed_timer.is_some() {
            return false;
        }
        let now = self.clock.now_ms();
        self.state.printer.print_start_time = Some(now);
        self.state.printer.seconds_elapsed = Some(0);
        self.elapsed_timer = Some(self.scheduler.every(TimerKind::Elapsed, ELAPSED_TICK));
        info!(start_ms = now, "timer: elapsed timer started");
        true
    }

    /// RUNNING -> STOPPED. Clears the derived elapsed value and the start time.
    pub fn stop_elapsed_timer(&mut self) {
        if self.elapsed_timer.take().is_some() {
            info!("timer: elapsed timer stopped");
        }
        self.state.printer.print_start_time = None;
        self.state.printer.seconds_elapsed = None;
    }

    pub fn tick_elapsed(&mut self) {
        if let Some(start) = self.state.printer.print_start_time {
            self.state.printer.seconds_elapsed = Some(seconds_since(start, self.clock.now_ms()));
        }
    }

    /// Starts, or restarts from a new origin, the operation duration timer.
    pub fn start_operation_timer(&mut self, started_at: i64) {
        if self.state.operation.started_at == Some(started_at) && self.operation_timer.is_some() {
            return;
        }
        self.state.operation.started_at = Some(started_at);
        self.state.operation.duration_secs = Some(seconds_since(started_at, self.clock.now_ms()));
        self.operation_timer = Some(
            self.scheduler
                .every(TimerKind::OperationDuration, OPERATION_TICK),
        );
    }

    /// Stops the duration timer, keeping the last computed duration on display.
    pub fn stop_operation_timer(&mut self) {
        self.operation_timer = None;
        self.state.operation.started_at = None;
    }

    pub fn tick_operation(&mut self) {
        if let Some(start) = self.state.operation.started_at {
            self.state.operation.duration_secs = Some(seconds_since(start, self.clock.now_ms()));
        }
    }

    pub fn tick(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Elapsed => self.tick_elapsed(),
            TimerKind::OperationDuration => self.tick_operation(),
        }
    }

    pub fn touch(&mut self) {
        self.state.last_update = Some(self.clock.now_ms());
    }

    pub fn set_last_update(&mut self, at_ms: i64) {
        self.state.last_update = Some(at_ms);
    }

    pub fn set_link(&mut self, link: LinkStatus) {
        self.state.link = link;
    }

    pub fn set_recipe(&mut self, mut steps: Vec<RecipeStep>) {
        steps.sort_by_key(|step| step.layer);
        self.state.recipe = steps;
    }

    /// Queues a transient notification and returns it for immediate display.
    pub fn push_notice(&mut self, level: AlertLevel, message: impl Into<String>) -> Notice {
        let notice = Notice {
            level,
            message: message.into(),
            at_ms: self.clock.now_ms(),
        };
        self.state.notices.push_back(notice.clone());
        while self.state.notices.len() > MAX_NOTICES {
            self.state.notices.pop_front();
        }
        notice
    }

    pub fn push_log(&mut self, line: LogMessage) {
        self.state.log_tail.push_back(line);
        while self.state.log_tail.len() > MAX_LOG_LINES {
            self.state.log_tail.pop_front();
        }
    }
}

fn seconds_since(start_ms: i64, now_ms: i64) -> u64 {
    u64::try_from((now_ms - start_ms).max(0) / 1000).unwrap_or(0)
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
