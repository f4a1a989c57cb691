use dashboard_core::{
    render::{project, render},
    state::DashboardState,
};
use shared::domain::RecipeStep;

use super::*;

fn output(sink: TerminalSink<Vec<u8>>) -> String {
    String::from_utf8(sink.into_inner()).unwrap()
}

#[test]
fn unchanged_frames_are_written_once() {
    let view = project(&DashboardState::default());
    let mut sink = TerminalSink::new(Vec::new());
    render(&view, &mut sink);
    render(&view, &mut sink);

    let text = output(sink);
    assert_eq!(text.matches("Status").count(), 1);
    assert!(text.contains("Controller unknown"));
}

#[test]
fn recipe_rows_follow_the_fields() {
    let mut state = DashboardState::default();
    state.printer.current_layer = 15;
    state.recipe = vec![RecipeStep::new("A", 10), RecipeStep::new("B", 20)];
    let mut sink = TerminalSink::new(Vec::new());
    render(&project(&state), &mut sink);

    let text = output(sink);
    let recipe = text.find("Recipe\n").expect("recipe section");
    assert!(text[recipe..].contains("Completed"));
    assert!(text[recipe..].contains("Pending"));
}

#[test]
fn notices_are_tagged_by_level() {
    let mut sink = TerminalSink::new(Vec::new());
    sink.notify(&Notice {
        level: AlertLevel::Danger,
        message: "Pump B stalled".into(),
        at_ms: 0,
    });
    assert_eq!(output(sink), "[error] Pump B stalled\n");
}
