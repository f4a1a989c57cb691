//! Turns `status_update` / `system_status` payloads into field-level writes on
//! the [`ViewModelStore`].
//!
//! Every write is a partial merge: a field that is absent, null or fails to
//! parse leaves the stored value untouched. Payloads carrying a `component`
//! tag are incremental updates scoped to one subsystem; everything else is a
//! flat snapshot.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde_json::{Map, Value};
use shared::{domain::PumpId, protocol::Component};
use tracing::{debug, info};

use crate::store::ViewModelStore;

const STATUS_LABEL_PREFIX: &str = "printer status:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Snapshot,
    Component(Component),
    Ignored,
}

/// Applies one `status_update` payload.
pub fn apply_status_update(store: &mut ViewModelStore, payload: &Value) -> Outcome {
    let Some(top) = payload.as_object() else {
        debug!("normalizer: ignoring non-object status payload");
        return Outcome::Ignored;
    };

    let (fields, outcome) = match top.get("component") {
        Some(tag) => {
            let Some(component) = tag.as_str().and_then(|tag| tag.parse::<Component>().ok())
            else {
                debug!(tag = %tag, "normalizer: ignoring unknown component tag");
                return Outcome::Ignored;
            };
            let fields = Fields::component(top);
            apply_component(store, component, &fields);
            (fields, Outcome::Component(component))
        }
        None => {
            let fields = Fields::snapshot(top);
            apply_snapshot(store, &fields);
            (fields, Outcome::Snapshot)
        }
    };

    apply_operation_origin(store, &fields);
    apply_liveness(store, &fields);
    mark_updated(store, &fields);
    outcome
}

/// Applies a `system_status` payload; only controller liveness and operation
/// fields are read from it.
pub fn apply_system_status(store: &mut ViewModelStore, payload: &Value) {
    let Some(top) = payload.as_object() else {
        debug!("normalizer: ignoring non-object system_status payload");
        return;
    };
    let fields = Fields::snapshot(top);
    apply_liveness(store, &fields);
    apply_operation_origin(store, &fields);
    mark_updated(store, &fields);
}

/// The payload's own `last_update` wins; receive time is used only when the
/// payload carries none.
fn mark_updated(store: &mut ViewModelStore, fields: &Fields<'_>) {
    match fields.timestamp("last_update") {
        Stamp::At(at) => store.set_last_update(at),
        Stamp::Absent | Stamp::Null => store.touch(),
    }
}

fn apply_snapshot(store: &mut ViewModelStore, fields: &Fields<'_>) {
    let state = store.state_mut();
    let printer = &mut state.printer;

    if let Some(label) = fields.status_label(&["printer_status", "status"]) {
        printer.status = label;
    }
    merge(&mut printer.connected, fields.flag(&["printer_connected", "connected"]));
    merge(&mut printer.current_layer, fields.count(&["current_layer"]));
    merge(&mut printer.total_layers, fields.count(&["total_layers"]));
    merge(
        &mut printer.progress_percent,
        fields.float(&["progress_percent", "progress"]),
    );
    if let Some(remaining) = fields.seconds(&["print_time_remaining", "seconds_remaining"]) {
        printer.seconds_remaining = Some(remaining);
    }
    merge(&mut printer.current_material, fields.text(&["current_material"]));
    merge(&mut printer.next_material, fields.text(&["next_material"]));
    merge(&mut printer.next_change_layer, fields.count(&["next_change_layer"]));
    merge(&mut printer.mm_active, fields.flag(&["mm_active"]));

    merge(&mut state.operation.current, fields.text(&["current_operation"]));
    if state.operation.started_at.is_none() {
        if let Some(duration) = fields.seconds(&["operation_duration"]) {
            state.operation.duration_secs = Some(duration);
        }
    }

    if let Some(pumps) = fields.object("pump_status") {
        for pump in PumpId::ALL {
            if let Some(status) = pumps.get(pump.key()).and_then(pump_status_text) {
                state.pumps.insert(pump, status);
            }
        }
    }

    if let Some(sequence) = fields.object("sequence_progress") {
        apply_sequence(store, &Fields::snapshot(sequence));
    }
}

fn apply_component(store: &mut ViewModelStore, component: Component, fields: &Fields<'_>) {
    match component {
        Component::PrinterStatus => apply_printer_status(store, fields),
        Component::Progress | Component::Monitor => {
            let printer = &mut store.state_mut().printer;
            merge(&mut printer.current_layer, fields.count(&["current_layer", "layer"]));
            merge(&mut printer.total_layers, fields.count(&["total_layers"]));
            if let Some(label) = fields.status_label(&["printer_status", "state", "status"]) {
                printer.status = label;
            }
            merge(&mut printer.connected, fields.flag(&["connected", "printer_connected"]));
            merge(
                &mut printer.progress_percent,
                fields.float(&["progress_percent", "progress", "percent_complete"]),
            );
            if let Some(remaining) = fields.seconds(&[
                "print_time_remaining",
                "seconds_remaining",
                "time_remaining",
            ]) {
                printer.seconds_remaining = Some(remaining);
            }
        }
        Component::Material => {
            let printer = &mut store.state_mut().printer;
            merge(&mut printer.current_material, fields.text(&["current_material"]));
            merge(&mut printer.next_material, fields.text(&["next_material"]));
            merge(
                &mut printer.next_change_layer,
                fields.count(&["next_change_layer", "change_layer"]),
            );
        }
        Component::Sequence => apply_sequence(store, fields),
        Component::Command | Component::Experiment => {
            if let Some(active) = fields.text(&["status"]).as_deref().and_then(mm_activity) {
                store.state_mut().printer.mm_active = active;
            }
        }
    }
}

fn apply_printer_status(store: &mut ViewModelStore, fields: &Fields<'_>) {
    let connected = fields.flag(&["connected", "printer_connected"]);
    merge(&mut store.state_mut().printer.connected, connected);

    let Some(label) = fields.status_label(&["printer_status", "state", "status"]) else {
        return;
    };
    let previous = std::mem::replace(&mut store.state_mut().printer.status, label.clone());

    if is_printing_label(&label) {
        if store.start_elapsed_timer() {
            info!(%previous, status = %label, "normalizer: print started");
        }
    } else if is_terminal_label(&label)
        && (!is_terminal_label(&previous) || store.is_elapsed_running())
    {
        store.stop_elapsed_timer();
        store.state_mut().printer.reset_progress();
        info!(%previous, status = %label, "normalizer: job ended, progress reset");
    }
}

fn apply_sequence(store: &mut ViewModelStore, fields: &Fields<'_>) {
    let sequence = &mut store.state_mut().sequence;
    merge(&mut sequence.current_step, fields.count(&["current_step"]));
    merge(&mut sequence.total_steps, fields.count(&["total_steps"]));
    merge(&mut sequence.step_name, fields.text(&["step_name", "operation_step"]));
    merge(&mut sequence.step_progress, fields.float(&["step_progress"]));
}

fn apply_operation_origin(store: &mut ViewModelStore, fields: &Fields<'_>) {
    match fields.timestamp("operation_start_time") {
        Stamp::Absent => {}
        Stamp::Null => {
            if store.is_operation_running() {
                store.stop_operation_timer();
            }
        }
        Stamp::At(started_at) => store.start_operation_timer(started_at),
    }
}

fn apply_liveness(store: &mut ViewModelStore, fields: &Fields<'_>) {
    let online = fields.flag(&[
        "print_manager_connected",
        "controller_online",
        "controller_connected",
    ]);
    let status = fields
        .text(&["print_manager_status", "controller_status"])
        .filter(|status| !status.is_empty());
    if online.is_none() && status.is_none() {
        return;
    }
    let now = store.now_ms();
    let controller = &mut store.state_mut().controller;
    if let Some(online) = online {
        if controller.online != Some(online) {
            info!(online, "normalizer: controller liveness changed");
        }
        controller.online = Some(online);
        if online {
            controller.last_seen = Some(now);
        }
    }
    if status.is_some() {
        controller.status = status;
    }
}

/// Best-effort reading of a free-text command status.
fn mm_activity(status: &str) -> Option<bool> {
    let lower = status.to_ascii_lowercase();
    if lower.contains("start") {
        Some(true)
    } else if lower.contains("stop") || lower.contains("completed") {
        Some(false)
    } else {
        None
    }
}

/// Reduces `"Printer Status: X"` to `X` and trims. Empty labels are absent.
pub fn normalize_status_label(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let label = match trimmed.get(..STATUS_LABEL_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(STATUS_LABEL_PREFIX) => {
            trimmed[STATUS_LABEL_PREFIX.len()..].trim()
        }
        _ => trimmed,
    };
    (!label.is_empty()).then(|| label.to_string())
}

pub fn is_printing_label(label: &str) -> bool {
    let lower = label.trim().to_ascii_lowercase();
    lower == "print" || lower.starts_with("printing")
}

pub fn is_terminal_label(label: &str) -> bool {
    matches!(
        label.trim().to_ascii_lowercase().as_str(),
        "stop" | "stopped" | "stopprn" | "idle" | "ready"
    )
}

fn merge<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn pump_status_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_empty(text),
        Value::Object(pump) => pump.get("status").and_then(Value::as_str).and_then(non_empty),
        _ => None,
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

enum Stamp {
    Absent,
    Null,
    At(i64),
}

/// Defensive field lookup over a payload. Component events are read from
/// their nested `data` object first, then from the top level.
struct Fields<'a> {
    data: Option<&'a Map<String, Value>>,
    top: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn snapshot(top: &'a Map<String, Value>) -> Self {
        Self { data: None, top }
    }

    fn component(top: &'a Map<String, Value>) -> Self {
        Self {
            data: top.get("data").and_then(Value::as_object),
            top,
        }
    }

    fn raw(&self, key: &str) -> Option<&'a Value> {
        self.data
            .and_then(|data| data.get(key))
            .or_else(|| self.top.get(key))
    }

    fn first<T>(&self, keys: &[&str], parse: impl Fn(&Value) -> Option<T>) -> Option<T> {
        keys.iter()
            .filter_map(|key| self.raw(key))
            .find_map(|value| parse(value))
    }

    fn object(&self, key: &str) -> Option<&'a Map<String, Value>> {
        self.raw(key).and_then(Value::as_object)
    }

    /// Free text. An explicit empty string is a value and clears the field.
    fn text(&self, keys: &[&str]) -> Option<String> {
        self.first(keys, |value| match value {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
    }

    fn status_label(&self, keys: &[&str]) -> Option<String> {
        self.first(keys, |value| value.as_str().and_then(normalize_status_label))
    }

    fn float(&self, keys: &[&str]) -> Option<f64> {
        self.first(keys, parse_float)
    }

    fn count(&self, keys: &[&str]) -> Option<u32> {
        self.first(keys, |value| {
            parse_float(value)
                .filter(|number| *number >= 0.0 && *number <= f64::from(u32::MAX))
                .map(|number| number.floor() as u32)
        })
    }

    fn seconds(&self, keys: &[&str]) -> Option<u64> {
        self.first(keys, |value| {
            parse_float(value)
                .filter(|number| *number >= 0.0)
                .map(|number| number.floor() as u64)
        })
    }

    fn flag(&self, keys: &[&str]) -> Option<bool> {
        self.first(keys, |value| match value {
            Value::Bool(flag) => Some(*flag),
            Value::Number(number) => number.as_i64().map(|n| n != 0),
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Some(true),
                "false" | "no" | "0" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    fn timestamp(&self, key: &str) -> Stamp {
        match self.raw(key) {
            None => Stamp::Absent,
            Some(Value::Null) => Stamp::Null,
            Some(value) => parse_timestamp(value).map_or(Stamp::Absent, Stamp::At),
        }
    }
}

fn parse_float(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Accepts epoch seconds or milliseconds, RFC 3339, or a zone-less ISO
/// timestamp interpreted in local time.
fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => {
            let raw = number.as_f64()?;
            if !raw.is_finite() || raw <= 0.0 {
                return None;
            }
            Some(if raw < 1e12 {
                (raw * 1000.0) as i64
            } else {
                raw as i64
            })
        }
        Value::String(text) => {
            let text = text.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Some(parsed.timestamp_millis());
            }
            let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
            Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|local| local.timestamp_millis())
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/normalizer_tests.rs"]
mod tests;
