use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpId {
    PumpA,
    PumpB,
    PumpC,
    DrainPump,
}

impl PumpId {
    pub const ALL: [PumpId; 4] = [
        PumpId::PumpA,
        PumpId::PumpB,
        PumpId::PumpC,
        PumpId::DrainPump,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PumpId::PumpA => "pump_a",
            PumpId::PumpB => "pump_b",
            PumpId::PumpC => "pump_c",
            PumpId::DrainPump => "drain_pump",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            PumpId::PumpA => "Pump A",
            PumpId::PumpB => "Pump B",
            PumpId::PumpC => "Pump C",
            PumpId::DrainPump => "Drain Pump",
        }
    }

    pub fn motor(self) -> Motor {
        match self {
            PumpId::PumpA => Motor::A,
            PumpId::PumpB => Motor::B,
            PumpId::PumpC => Motor::C,
            PumpId::DrainPump => Motor::D,
        }
    }
}

/// Stepper motor letter used by the pump actuation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Motor {
    A,
    B,
    C,
    D,
}

impl FromStr for Motor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Motor::A),
            "B" => Ok(Motor::B),
            "C" => Ok(Motor::C),
            "D" => Ok(Motor::D),
            other => Err(format!("invalid motor '{other}' (must be A, B, C, or D)")),
        }
    }
}

impl fmt::Display for Motor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Motor::A => "A",
            Motor::B => "B",
            Motor::C => "C",
            Motor::D => "D",
        };
        f.write_str(letter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PumpDirection {
    #[serde(rename = "F")]
    Forward,
    #[serde(rename = "R")]
    Reverse,
}

impl FromStr for PumpDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "F" | "FORWARD" => Ok(PumpDirection::Forward),
            "R" | "REVERSE" => Ok(PumpDirection::Reverse),
            other => Err(format!("invalid direction '{other}' (must be F or R)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterAction {
    Pause,
    Resume,
    Stop,
}

impl PrinterAction {
    pub fn path_segment(self) -> &'static str {
        match self {
            PrinterAction::Pause => "pause",
            PrinterAction::Resume => "resume",
            PrinterAction::Stop => "stop",
        }
    }
}

impl FromStr for PrinterAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pause" => Ok(PrinterAction::Pause),
            "resume" => Ok(PrinterAction::Resume),
            "stop" => Ok(PrinterAction::Stop),
            other => Err(format!("invalid printer action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{other}'")),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

/// One material change in a multi-material recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeStep {
    pub material: String,
    pub layer: u32,
}

impl RecipeStep {
    pub fn new(material: impl Into<String>, layer: u32) -> Self {
        Self {
            material: material.into(),
            layer,
        }
    }
}

/// Parses the controller's `A,50:B,120:C,200` recipe text.
///
/// Entries that are not `material,layer` pairs are skipped. The result is
/// sorted by layer.
pub fn parse_recipe(text: &str) -> Vec<RecipeStep> {
    let mut steps: Vec<RecipeStep> = text
        .split(':')
        .filter_map(|entry| {
            let (material, layer) = entry.split_once(',')?;
            let material = material.trim();
            if material.is_empty() {
                return None;
            }
            let layer = layer.trim().parse::<u32>().ok()?;
            Some(RecipeStep {
                material: material.to_string(),
                layer,
            })
        })
        .collect();
    steps.sort_by_key(|step| step.layer);
    steps
}

pub fn format_recipe(steps: &[RecipeStep]) -> String {
    steps
        .iter()
        .map(|step| format!("{},{}", step.material, step.layer))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
