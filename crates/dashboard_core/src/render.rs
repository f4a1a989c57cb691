//! Pure projection of [`DashboardState`] into presentation values, and the
//! [`UiSink`] seam those values are written through.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Local, TimeZone};
use shared::{domain::PumpId, protocol::AlertLevel};

use crate::{
    state::{DashboardState, Notice},
    transport::{ConnectionState, TransportMode},
};

const MAX_LABEL_CHARS: usize = 24;
const PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Success,
    Warning,
    Danger,
    Info,
    Neutral,
}

impl Tier {
    pub fn badge_class(self) -> &'static str {
        match self {
            Tier::Success => "bg-success",
            Tier::Warning => "bg-warning",
            Tier::Danger => "bg-danger",
            Tier::Info => "bg-info",
            Tier::Neutral => "bg-secondary",
        }
    }
}

impl From<AlertLevel> for Tier {
    fn from(level: AlertLevel) -> Self {
        match level {
            AlertLevel::Success => Tier::Success,
            AlertLevel::Warning => Tier::Warning,
            AlertLevel::Danger => Tier::Danger,
            AlertLevel::Info => Tier::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    StatusLabel,
    PrinterConnection,
    LayerCount,
    LayerProgress,
    PrintProgress,
    Elapsed,
    Remaining,
    CurrentMaterial,
    NextMaterial,
    NextChangeLayer,
    MultiMaterial,
    SequenceStep,
    SequenceName,
    SequenceProgress,
    Operation,
    OperationDuration,
    Pump(PumpId),
    RecipeTable,
    ConnectionIndicator,
    ControllerIndicator,
    LastUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiAction {
    RestartController,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowStatus {
    Completed,
    Next,
    Pending,
}

impl RowStatus {
    pub fn label(self) -> &'static str {
        match self {
            RowStatus::Completed => "Completed",
            RowStatus::Next => "Next",
            RowStatus::Pending => "Pending",
        }
    }

    pub fn tier(self) -> Tier {
        match self {
            RowStatus::Completed => Tier::Success,
            RowStatus::Next => Tier::Warning,
            RowStatus::Pending => Tier::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeRow {
    pub layer: u32,
    pub material: String,
    pub status: RowStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub text: String,
    pub tier: Tier,
}

impl Badge {
    fn new(text: impl Into<String>, tier: Tier) -> Self {
        Self {
            text: text.into(),
            tier,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Meter {
    pub text: String,
    /// Always within 0..=100.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    pub badge: Badge,
    pub action: Option<UiAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub status: Badge,
    pub printer_connection: Badge,
    pub layer_count: String,
    pub layer_progress: Option<Meter>,
    pub print_progress: Meter,
    pub elapsed: String,
    pub remaining: String,
    pub current_material: String,
    pub next_material: String,
    pub next_change_layer: String,
    pub multi_material: Badge,
    pub sequence_step: String,
    pub sequence_name: String,
    pub sequence_progress: Option<Meter>,
    pub operation: Badge,
    pub operation_duration: String,
    pub pumps: BTreeMap<PumpId, Badge>,
    pub recipe: Vec<RecipeRow>,
    pub connection: Indicator,
    pub controller: Indicator,
    pub last_update: String,
}

/// Builds the presentation values for `state`. Reads only.
pub fn project(state: &DashboardState) -> DashboardView {
    let printer = &state.printer;
    let sequence = &state.sequence;

    let layer_count = if printer.total_layers > 0 {
        format!("{} / {}", printer.current_layer, printer.total_layers)
    } else {
        printer.current_layer.to_string()
    };
    let layer_progress = (printer.total_layers > 0).then(|| {
        meter(f64::from(printer.current_layer) / f64::from(printer.total_layers) * 100.0)
    });

    let sequence_step = if sequence.total_steps > 0 {
        format!("Step {} of {}", sequence.current_step, sequence.total_steps)
    } else {
        PLACEHOLDER.to_string()
    };
    let sequence_progress = (sequence.total_steps > 0).then(|| {
        meter(f64::from(sequence.current_step) / f64::from(sequence.total_steps) * 100.0)
    });

    DashboardView {
        status: Badge::new(display_label(&printer.status), status_tier(&printer.status)),
        printer_connection: if printer.connected {
            Badge::new("Connected", Tier::Success)
        } else {
            Badge::new("Disconnected", Tier::Danger)
        },
        layer_count,
        layer_progress,
        print_progress: meter(printer.progress_percent),
        elapsed: format_duration(printer.seconds_elapsed),
        remaining: format_duration(printer.seconds_remaining),
        current_material: printer.current_material.clone(),
        next_material: printer.next_material.clone(),
        next_change_layer: if printer.next_change_layer > 0 {
            format!("Layer {}", printer.next_change_layer)
        } else {
            PLACEHOLDER.to_string()
        },
        multi_material: if printer.mm_active {
            Badge::new("Active", Tier::Success)
        } else {
            Badge::new("Inactive", Tier::Neutral)
        },
        sequence_step,
        sequence_name: if sequence.step_name.is_empty() {
            PLACEHOLDER.to_string()
        } else {
            sequence.step_name.clone()
        },
        sequence_progress,
        operation: Badge::new(
            display_label(&state.operation.current),
            status_tier(&state.operation.current),
        ),
        operation_duration: format_duration(state.operation.duration_secs),
        pumps: state
            .pumps
            .iter()
            .map(|(pump, status)| (*pump, Badge::new(display_label(status), pump_tier(status))))
            .collect(),
        recipe: recipe_rows(state),
        connection: connection_indicator(state.link.state, state.link.mode),
        controller: controller_indicator(state.controller.online),
        last_update: state
            .last_update
            .and_then(|ms| Local.timestamp_millis_opt(ms).single())
            .map(|at| at.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
    }
}

fn recipe_rows(state: &DashboardState) -> Vec<RecipeRow> {
    let current = state.printer.current_layer;
    let next_change = state.printer.next_change_layer;
    state
        .recipe
        .iter()
        .map(|step| RecipeRow {
            layer: step.layer,
            material: step.material.clone(),
            status: row_status(step.layer, current, next_change),
        })
        .collect()
}

/// Completed takes priority over Next, Next over Pending.
pub fn row_status(layer: u32, current_layer: u32, next_change_layer: u32) -> RowStatus {
    if current_layer > 0 && layer <= current_layer {
        RowStatus::Completed
    } else if next_change_layer > 0 && layer == next_change_layer {
        RowStatus::Next
    } else {
        RowStatus::Pending
    }
}

fn connection_indicator(state: ConnectionState, mode: TransportMode) -> Indicator {
    let (text, tier) = match state {
        ConnectionState::Connecting => ("Connecting...".to_string(), Tier::Warning),
        ConnectionState::Connected => ("Connected".to_string(), Tier::Success),
        ConnectionState::Disconnected => ("Disconnected".to_string(), Tier::Danger),
        ConnectionState::Error { failures } => {
            (format!("Connection error ({failures})"), Tier::Danger)
        }
    };
    let text = match mode {
        TransportMode::WebSocket => text,
        TransportMode::Compatible => format!("{text} [compat]"),
    };
    Indicator {
        badge: Badge::new(text, tier),
        action: None,
    }
}

fn controller_indicator(online: Option<bool>) -> Indicator {
    match online {
        Some(true) => Indicator {
            badge: Badge::new("Controller online", Tier::Success),
            action: None,
        },
        Some(false) => Indicator {
            badge: Badge::new("Controller offline", Tier::Danger),
            action: Some(UiAction::RestartController),
        },
        None => Indicator {
            badge: Badge::new("Controller unknown", Tier::Neutral),
            action: None,
        },
    }
}

fn meter(raw_percent: f64) -> Meter {
    let percent = clamp_percent(raw_percent);
    let text = if percent.fract() == 0.0 {
        format!("{percent:.0}%")
    } else {
        format!("{percent:.1}%")
    };
    Meter { text, percent }
}

pub fn clamp_percent(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 100.0)
    }
}

pub fn format_duration(seconds: Option<u64>) -> String {
    match seconds {
        Some(total) => format!(
            "{:02}:{:02}:{:02}",
            total / 3600,
            (total % 3600) / 60,
            total % 60
        ),
        None => PLACEHOLDER.to_string(),
    }
}

/// Fixed label table with a fallback that turns underscores into spaces and
/// truncates long labels.
pub fn display_label(label: &str) -> String {
    let mapped = match label.trim().to_ascii_lowercase().as_str() {
        "print" | "printing" => Some("Printing"),
        "pause" | "paused" => Some("Paused"),
        "stop" | "stopped" | "stopprn" => Some("Stopped"),
        "idle" => Some("Idle"),
        "ready" => Some("Ready"),
        "error" => Some("Error"),
        "unknown" => Some("Unknown"),
        "complete" | "completed" => Some("Completed"),
        "running" => Some("Running"),
        "multi_material_printing" => Some("Multi-Material Printing"),
        _ => None,
    };
    if let Some(mapped) = mapped {
        return mapped.to_string();
    }
    let spaced = label.trim().replace('_', " ");
    if spaced.chars().count() > MAX_LABEL_CHARS {
        let head: String = spaced.chars().take(MAX_LABEL_CHARS).collect();
        format!("{head}…")
    } else {
        spaced
    }
}

pub fn status_tier(label: &str) -> Tier {
    let lower = label.to_ascii_lowercase();
    if lower.contains("print") {
        Tier::Success
    } else if lower.contains("pause") {
        Tier::Warning
    } else if lower.contains("stop") || lower.contains("error") || lower.contains("fail") {
        Tier::Danger
    } else if lower.contains("idle") || lower.contains("ready") {
        Tier::Info
    } else {
        Tier::Neutral
    }
}

fn pump_tier(status: &str) -> Tier {
    if status.to_ascii_lowercase().starts_with("running") {
        Tier::Success
    } else {
        status_tier(status)
    }
}

/// Presentation surface. Targets a surface does not carry are skipped.
pub trait UiSink {
    fn has_target(&self, target: Target) -> bool;
    fn set_text(&mut self, target: Target, text: &str);
    fn set_tier(&mut self, target: Target, tier: Tier);
    fn set_progress(&mut self, target: Target, percent: f64);
    fn set_rows(&mut self, target: Target, rows: &[RecipeRow]);
    fn set_action(&mut self, target: Target, action: Option<UiAction>);
    fn notify(&mut self, notice: &Notice);
    /// Called once after every target of a render pass has been written.
    fn flush(&mut self) {}
}

/// Writes every projection of `view` into `sink`.
pub fn render(view: &DashboardView, sink: &mut dyn UiSink) {
    let mut out = Writer { sink };

    out.badge(Target::StatusLabel, &view.status);
    out.badge(Target::PrinterConnection, &view.printer_connection);
    out.text(Target::LayerCount, &view.layer_count);
    match &view.layer_progress {
        Some(progress) => out.meter(Target::LayerProgress, progress),
        None => out.text(Target::LayerProgress, PLACEHOLDER),
    }
    out.meter(Target::PrintProgress, &view.print_progress);
    out.text(Target::Elapsed, &view.elapsed);
    out.text(Target::Remaining, &view.remaining);
    out.text(Target::CurrentMaterial, &view.current_material);
    out.text(Target::NextMaterial, &view.next_material);
    out.text(Target::NextChangeLayer, &view.next_change_layer);
    out.badge(Target::MultiMaterial, &view.multi_material);
    out.text(Target::SequenceStep, &view.sequence_step);
    out.text(Target::SequenceName, &view.sequence_name);
    match &view.sequence_progress {
        Some(progress) => out.meter(Target::SequenceProgress, progress),
        None => out.text(Target::SequenceProgress, PLACEHOLDER),
    }
    out.badge(Target::Operation, &view.operation);
    out.text(Target::OperationDuration, &view.operation_duration);
    for (pump, badge) in &view.pumps {
        out.badge(Target::Pump(*pump), badge);
    }
    if out.sink.has_target(Target::RecipeTable) {
        out.sink.set_rows(Target::RecipeTable, &view.recipe);
    }
    out.indicator(Target::ConnectionIndicator, &view.connection);
    out.indicator(Target::ControllerIndicator, &view.controller);
    out.text(Target::LastUpdate, &view.last_update);
    out.sink.flush();
}

struct Writer<'a> {
    sink: &'a mut dyn UiSink,
}

impl Writer<'_> {
    fn text(&mut self, target: Target, text: &str) {
        if self.sink.has_target(target) {
            self.sink.set_text(target, text);
        }
    }

    fn badge(&mut self, target: Target, badge: &Badge) {
        if self.sink.has_target(target) {
            self.sink.set_text(target, &badge.text);
            self.sink.set_tier(target, badge.tier);
        }
    }

    fn meter(&mut self, target: Target, meter: &Meter) {
        if self.sink.has_target(target) {
            self.sink.set_text(target, &meter.text);
            self.sink.set_progress(target, meter.percent);
        }
    }

    fn indicator(&mut self, target: Target, indicator: &Indicator) {
        if self.sink.has_target(target) {
            self.sink.set_text(target, &indicator.badge.text);
            self.sink.set_tier(target, indicator.badge.tier);
            self.sink.set_action(target, indicator.action);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Slot {
    pub text: Option<String>,
    pub tier: Option<Tier>,
    pub progress: Option<f64>,
    pub rows: Option<Vec<RecipeRow>>,
    pub action: Option<UiAction>,
}

/// In-memory surface. With `only` set it exposes just those targets.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    only: Option<HashSet<Target>>,
    slots: HashMap<Target, Slot>,
    notices: Vec<Notice>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targets(targets: impl IntoIterator<Item = Target>) -> Self {
        Self {
            only: Some(targets.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn slot(&self, target: Target) -> Option<&Slot> {
        self.slots.get(&target)
    }

    pub fn text(&self, target: Target) -> Option<&str> {
        self.slots.get(&target).and_then(|slot| slot.text.as_deref())
    }

    pub fn slots(&self) -> &HashMap<Target, Slot> {
        &self.slots
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn slot_mut(&mut self, target: Target) -> &mut Slot {
        self.slots.entry(target).or_default()
    }
}

impl UiSink for MemorySink {
    fn has_target(&self, target: Target) -> bool {
        self.only
            .as_ref()
            .map_or(true, |only| only.contains(&target))
    }

    fn set_text(&mut self, target: Target, text: &str) {
        self.slot_mut(target).text = Some(text.to_string());
    }

    fn set_tier(&mut self, target: Target, tier: Tier) {
        self.slot_mut(target).tier = Some(tier);
    }

    fn set_progress(&mut self, target: Target, percent: f64) {
        self.slot_mut(target).progress = Some(percent);
    }

    fn set_rows(&mut self, target: Target, rows: &[RecipeRow]) {
        self.slot_mut(target).rows = Some(rows.to_vec());
    }

    fn set_action(&mut self, target: Target, action: Option<UiAction>) {
        self.slot_mut(target).action = action;
    }

    fn notify(&mut self, notice: &Notice) {
        self.notices.push(notice.clone());
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
