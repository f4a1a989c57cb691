use std::{collections::BTreeMap, fmt::Write as _, io::Write};

use dashboard_core::{
    render::{RecipeRow, UiAction},
    state::Notice,
    Target, Tier, UiSink,
};
use shared::protocol::AlertLevel;

/// Plain-text surface. Each render pass becomes one frame, written only when
/// it differs from the previous one; notices are written as they arrive.
pub struct TerminalSink<W: Write> {
    out: W,
    fields: BTreeMap<Target, Field>,
    rows: Vec<RecipeRow>,
    last_frame: String,
}

#[derive(Debug, Default, Clone)]
struct Field {
    text: String,
    tier: Option<Tier>,
    action: Option<UiAction>,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            fields: BTreeMap::new(),
            rows: Vec::new(),
            last_frame: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn field(&mut self, target: Target) -> &mut Field {
        self.fields.entry(target).or_default()
    }

    fn frame(&self) -> String {
        let mut frame = String::new();
        for (target, field) in &self.fields {
            let _ = write!(frame, "{:<20}{}", label(*target), field.text);
            if let Some(tier) = field.tier {
                let _ = write!(frame, " [{}]", tier.badge_class());
            }
            if field.action == Some(UiAction::RestartController) {
                frame.push_str(" (run `dashboard restart`)");
            }
            frame.push('\n');
        }
        if !self.rows.is_empty() {
            frame.push_str("Recipe\n");
            for row in &self.rows {
                let _ = writeln!(
                    frame,
                    "  layer {:>5}  {:<12}{}",
                    row.layer,
                    row.material,
                    row.status.label()
                );
            }
        }
        frame
    }
}

impl<W: Write> UiSink for TerminalSink<W> {
    fn has_target(&self, _target: Target) -> bool {
        true
    }

    fn set_text(&mut self, target: Target, text: &str) {
        self.field(target).text = text.to_string();
    }

    fn set_tier(&mut self, target: Target, tier: Tier) {
        self.field(target).tier = Some(tier);
    }

    fn set_progress(&mut self, _target: Target, _percent: f64) {}

    fn set_rows(&mut self, _target: Target, rows: &[RecipeRow]) {
        self.rows = rows.to_vec();
    }

    fn set_action(&mut self, target: Target, action: Option<UiAction>) {
        self.field(target).action = action;
    }

    fn notify(&mut self, notice: &Notice) {
        let tag = match notice.level {
            AlertLevel::Success => "ok",
            AlertLevel::Warning => "warn",
            AlertLevel::Danger => "error",
            AlertLevel::Info => "info",
        };
        let _ = writeln!(self.out, "[{tag}] {}", notice.message);
    }

    fn flush(&mut self) {
        let frame = self.frame();
        if frame == self.last_frame {
            return;
        }
        let _ = writeln!(self.out, "{frame}");
        let _ = self.out.flush();
        self.last_frame = frame;
    }
}

fn label(target: Target) -> &'static str {
    match target {
        Target::StatusLabel => "Status",
        Target::PrinterConnection => "Printer",
        Target::LayerCount => "Layer",
        Target::LayerProgress => "Layer progress",
        Target::PrintProgress => "Print progress",
        Target::Elapsed => "Elapsed",
        Target::Remaining => "Remaining",
        Target::CurrentMaterial => "Material",
        Target::NextMaterial => "Next material",
        Target::NextChangeLayer => "Next change",
        Target::MultiMaterial => "Multi-material",
        Target::SequenceStep => "Sequence",
        Target::SequenceName => "Sequence name",
        Target::SequenceProgress => "Sequence progress",
        Target::Operation => "Operation",
        Target::OperationDuration => "Operation time",
        Target::Pump(pump) => pump.display_name(),
        Target::RecipeTable => "Recipe",
        Target::ConnectionIndicator => "Connection",
        Target::ControllerIndicator => "Controller",
        Target::LastUpdate => "Updated",
    }
}

#[cfg(test)]
#[path = "tests/terminal_tests.rs"]
mod tests;
