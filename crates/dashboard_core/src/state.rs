//! Last-known printer, sequence and connection state held for the lifetime of
//! a dashboard session.

use std::collections::{BTreeMap, VecDeque};

use shared::{
    domain::{PumpId, RecipeStep},
    protocol::{AlertLevel, LogMessage},
};

use crate::transport::{ConnectionState, TransportMode};

pub const DEFAULT_MATERIAL: &str = "None";
pub const DEFAULT_STATUS: &str = "Unknown";
pub const DEFAULT_OPERATION: &str = "idle";
pub const DEFAULT_PUMP_STATUS: &str = "idle";
pub const MAX_NOTICES: usize = 20;
pub const MAX_LOG_LINES: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct PrinterState {
    pub status: String,
    pub connected: bool,
    pub current_layer: u32,
    pub total_layers: u32,
    /// Raw server value; clamped to 0..=100 only when rendered.
    pub progress_percent: f64,
    pub seconds_elapsed: Option<u64>,
    pub seconds_remaining: Option<u64>,
    pub(crate) print_start_time: Option<i64>,
    pub current_material: String,
    pub next_material: String,
    pub next_change_layer: u32,
    pub mm_active: bool,
}

impl Default for PrinterState {
    fn default() -> Self {
        Self {
            status: DEFAULT_STATUS.to_string(),
            connected: false,
            current_layer: 0,
            total_layers: 0,
            progress_percent: 0.0,
            seconds_elapsed: None,
            seconds_remaining: None,
            print_start_time: None,
            current_material: DEFAULT_MATERIAL.to_string(),
            next_material: DEFAULT_MATERIAL.to_string(),
            next_change_layer: 0,
            mm_active: false,
        }
    }
}

impl PrinterState {
    /// Epoch milliseconds at which the running print was first observed.
    pub fn print_start_time(&self) -> Option<i64> {
        self.print_start_time
    }

    /// Clears every job-scoped field so a finished job cannot leak into the next.
    pub(crate) fn reset_progress(&mut self) {
        self.current_layer = 0;
        self.total_layers = 0;
        self.progress_percent = 0.0;
        self.seconds_elapsed = None;
        self.seconds_remaining = None;
        self.current_material = DEFAULT_MATERIAL.to_string();
        self.next_material = DEFAULT_MATERIAL.to_string();
        self.next_change_layer = 0;
        self.mm_active = false;
    }
}

/// Multi-material sequence counters. `current_step` may transiently exceed
/// `total_steps`; nothing here enforces the ordering.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SequenceState {
    pub current_step: u32,
    pub total_steps: u32,
    pub step_name: String,
    pub step_progress: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationState {
    pub current: String,
    pub(crate) started_at: Option<i64>,
    pub duration_secs: Option<u64>,
}

impl Default for OperationState {
    fn default() -> Self {
        Self {
            current: DEFAULT_OPERATION.to_string(),
            started_at: None,
            duration_secs: None,
        }
    }
}

impl OperationState {
    pub fn started_at(&self) -> Option<i64> {
        self.started_at
    }
}

/// Liveness of the backend controller process, tracked apart from the
/// transport connection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControllerLiveness {
    pub online: Option<bool>,
    pub status: Option<String>,
    pub last_seen: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinkStatus {
    pub state: ConnectionState,
    pub mode: TransportMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: AlertLevel,
    pub message: String,
    pub at_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub printer: PrinterState,
    pub sequence: SequenceState,
    pub operation: OperationState,
    pub pumps: BTreeMap<PumpId, String>,
    pub controller: ControllerLiveness,
    pub link: LinkStatus,
    pub recipe: Vec<RecipeStep>,
    pub notices: VecDeque<Notice>,
    pub log_tail: VecDeque<LogMessage>,
    pub last_update: Option<i64>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            printer: PrinterState::default(),
            sequence: SequenceState::default(),
            operation: OperationState::default(),
            pumps: PumpId::ALL
                .into_iter()
                .map(|pump| (pump, DEFAULT_PUMP_STATUS.to_string()))
                .collect(),
            controller: ControllerLiveness::default(),
            link: LinkStatus::default(),
            recipe: Vec::new(),
            notices: VecDeque::new(),
            log_tail: VecDeque::new(),
            last_update: None,
        }
    }
}
