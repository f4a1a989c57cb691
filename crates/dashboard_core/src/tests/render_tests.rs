use std::sync::Arc;

use serde_json::json;
use shared::domain::RecipeStep;

use super::*;
use crate::{
    clock::ManualClock, normalizer, state::LinkStatus, store::ViewModelStore,
    timer::RecordingScheduler,
};

fn printing_state() -> DashboardState {
    let mut state = DashboardState::default();
    state.printer.status = "printing".into();
    state.printer.connected = true;
    state.printer.current_layer = 10;
    state.printer.total_layers = 40;
    state.printer.progress_percent = 25.0;
    state.printer.seconds_elapsed = Some(3_725);
    state.printer.next_change_layer = 15;
    state.recipe = vec![
        RecipeStep::new("A", 5),
        RecipeStep::new("B", 10),
        RecipeStep::new("C", 15),
    ];
    state
}

#[test]
fn reapplying_a_snapshot_renders_identically() {
    let clock = ManualClock::new(1_700_000_000_000);
    let mut store = ViewModelStore::new(Arc::new(clock.clone()), Arc::new(RecordingScheduler::new()));
    let snapshot = json!({
        "printer_status": "printing",
        "current_layer": 10,
        "total_layers": 40,
        "progress_percent": 25.0,
        "last_update": "2024-05-01T10:00:00",
    });

    normalizer::apply_status_update(&mut store, &snapshot);
    let mut first = MemorySink::new();
    render(&project(store.state()), &mut first);

    clock.advance_secs(5);
    normalizer::apply_status_update(&mut store, &snapshot);
    let mut second = first.clone();
    render(&project(store.state()), &mut second);

    assert_eq!(first.slots(), second.slots());
    assert_ne!(first.text(Target::LastUpdate), Some("-"));
}

#[test]
fn progress_is_clamped_for_display_only() {
    let mut state = printing_state();
    state.printer.progress_percent = 137.0;
    let view = project(&state);
    assert_eq!(view.print_progress.percent, 100.0);
    assert_eq!(view.print_progress.text, "100%");
    assert_eq!(state.printer.progress_percent, 137.0);

    state.printer.progress_percent = -5.0;
    let view = project(&state);
    assert_eq!(view.print_progress.percent, 0.0);
    assert_eq!(view.print_progress.text, "0%");

    state.printer.progress_percent = 42.5;
    assert_eq!(project(&state).print_progress.text, "42.5%");
}

#[test]
fn idle_label_renders_with_info_tier() {
    let mut state = DashboardState::default();
    state.printer.status = crate::normalizer::normalize_status_label("Printer Status: IDLE")
        .unwrap_or_default();
    let view = project(&state);
    assert_eq!(view.status.text, "Idle");
    assert_eq!(view.status.tier, Tier::Info);
}

#[test]
fn labels_map_or_fall_back() {
    assert_eq!(display_label("stopprn"), "Stopped");
    assert_eq!(display_label("PAUSED"), "Paused");
    assert_eq!(display_label("warming_up"), "warming up");
    let long = display_label("a_very_long_status_label_from_firmware");
    assert_eq!(long, "a very long status label…");
    assert_eq!(long.chars().count(), 25);
}

#[test]
fn tiers_follow_label_keywords() {
    assert_eq!(status_tier("printing"), Tier::Success);
    assert_eq!(status_tier("paused"), Tier::Warning);
    assert_eq!(status_tier("stopprn"), Tier::Danger);
    assert_eq!(status_tier("print_failed"), Tier::Success);
    assert_eq!(status_tier("homing failed"), Tier::Danger);
    assert_eq!(status_tier("ready"), Tier::Info);
    assert_eq!(status_tier("Unknown"), Tier::Neutral);
}

#[test]
fn recipe_rows_prefer_completed_over_next() {
    let view = project(&printing_state());
    let statuses: Vec<_> = view.recipe.iter().map(|row| row.status).collect();
    assert_eq!(
        statuses,
        vec![RowStatus::Completed, RowStatus::Completed, RowStatus::Next]
    );

    assert_eq!(row_status(15, 15, 15), RowStatus::Completed);
    assert_eq!(row_status(20, 15, 25), RowStatus::Pending);
    assert_eq!(row_status(5, 0, 0), RowStatus::Pending);
}

#[test]
fn missing_targets_are_skipped() {
    let view = project(&printing_state());
    let mut sink = MemorySink::with_targets([Target::StatusLabel, Target::Elapsed]);
    render(&view, &mut sink);

    assert_eq!(sink.slots().len(), 2);
    assert_eq!(sink.text(Target::StatusLabel), Some("Printing"));
    assert_eq!(sink.text(Target::Elapsed), Some("01:02:05"));
    assert!(sink.slot(Target::RecipeTable).is_none());
}

#[test]
fn layer_and_sequence_meters_need_totals() {
    let mut state = DashboardState::default();
    state.printer.current_layer = 7;
    let view = project(&state);
    assert_eq!(view.layer_count, "7");
    assert!(view.layer_progress.is_none());
    assert!(view.sequence_progress.is_none());
    assert_eq!(view.sequence_step, "-");

    state.printer.total_layers = 28;
    state.sequence.current_step = 5;
    state.sequence.total_steps = 4;
    let view = project(&state);
    assert_eq!(view.layer_count, "7 / 28");
    assert_eq!(view.layer_progress.map(|m| m.percent), Some(25.0));
    assert_eq!(view.sequence_progress.map(|m| m.percent), Some(100.0));
}

#[test]
fn elapsed_placeholder_until_timer_runs() {
    let view = project(&DashboardState::default());
    assert_eq!(view.elapsed, "-");
    assert_eq!(view.remaining, "-");
    assert_eq!(format_duration(Some(59)), "00:00:59");
    assert_eq!(format_duration(Some(36_000)), "10:00:00");
}

#[test]
fn offline_controller_offers_restart() {
    let mut state = DashboardState::default();
    assert_eq!(project(&state).controller.action, None);

    state.controller.online = Some(false);
    let view = project(&state);
    assert_eq!(view.controller.badge.tier, Tier::Danger);
    assert_eq!(view.controller.action, Some(UiAction::RestartController));

    let mut sink = MemorySink::new();
    render(&view, &mut sink);
    assert_eq!(
        sink.slot(Target::ControllerIndicator).and_then(|s| s.action),
        Some(UiAction::RestartController)
    );
}

#[test]
fn connection_indicator_marks_compatible_mode() {
    let mut state = DashboardState::default();
    assert_eq!(project(&state).connection.badge.text, "Connecting...");

    state.link = LinkStatus {
        state: ConnectionState::Connected,
        mode: TransportMode::Compatible,
    };
    let view = project(&state);
    assert_eq!(view.connection.badge.text, "Connected [compat]");
    assert_eq!(view.connection.badge.tier, Tier::Success);
}

#[test]
fn pumps_render_with_running_tier() {
    let mut state = DashboardState::default();
    state.pumps.insert(PumpId::PumpB, "running_f".into());
    let view = project(&state);
    assert_eq!(view.pumps[&PumpId::PumpB].tier, Tier::Success);
    assert_eq!(view.pumps[&PumpId::PumpB].text, "running f");
    assert_eq!(view.pumps[&PumpId::PumpA].text, "Idle");
}
