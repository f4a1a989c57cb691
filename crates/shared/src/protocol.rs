use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{Motor, PumpDirection, RecipeStep},
    error::ValidationError,
};

pub const STATUS_UPDATE: &str = "status_update";
pub const SYSTEM_ALERT: &str = "system_alert";
pub const SYSTEM_STATUS: &str = "system_status";
pub const LOG_MESSAGE: &str = "log_message";
/// Output lines of a running multi-material sequence.
pub const MATERIAL_CHANGE_LOG: &str = "material_change_log";
pub const PRINTER_FILES_RESPONSE: &str = "printer_files_response";
pub const REQUEST_PRINTER_FILES: &str = "request_printer_files";

pub const MAX_PUMP_DURATION_SECS: u32 = 300;

/// Subsystem tag carried by incremental status pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Component {
    PrinterStatus,
    Progress,
    Monitor,
    Material,
    Sequence,
    Command,
    Experiment,
}

impl FromStr for Component {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRINTER_STATUS" => Ok(Component::PrinterStatus),
            "PROGRESS" => Ok(Component::Progress),
            "MONITOR" => Ok(Component::Monitor),
            "MATERIAL" => Ok(Component::Material),
            "SEQUENCE" => Ok(Component::Sequence),
            "COMMAND" => Ok(Component::Command),
            "EXPERIMENT" => Ok(Component::Experiment),
            other => Err(format!("unknown component '{other}'")),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::PrinterStatus => "PRINTER_STATUS",
            Component::Progress => "PROGRESS",
            Component::Monitor => "MONITOR",
            Component::Material => "MATERIAL",
            Component::Sequence => "SEQUENCE",
            Component::Command => "COMMAND",
            Component::Experiment => "EXPERIMENT",
        };
        f.write_str(name)
    }
}

/// A named real-time event as it travels over the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl ChannelMessage {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// `{success, message?, ...data}` response shape shared by every REST call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Success,
    Warning,
    Danger,
    #[default]
    #[serde(other)]
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemAlert {
    pub message: String,
    #[serde(default, rename = "type")]
    pub level: AlertLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    #[serde(default)]
    pub level: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterFile {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileListing {
    #[serde(default)]
    pub files: Vec<PrinterFile>,
    #[serde(default)]
    pub count: usize,
}

/// Channel reply to a `request_printer_files` emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesResponse {
    pub request_id: String,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub listing: FileListing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpCommand {
    pub motor: Motor,
    pub direction: PumpDirection,
    pub duration: u32,
}

impl PumpCommand {
    pub fn new(
        motor: Motor,
        direction: PumpDirection,
        duration: u32,
    ) -> Result<Self, ValidationError> {
        if duration == 0 || duration > MAX_PUMP_DURATION_SECS {
            return Err(ValidationError::new(
                "duration",
                format!("{duration}s is outside 1-{MAX_PUMP_DURATION_SECS} seconds"),
            ));
        }
        Ok(Self {
            motor,
            direction,
            duration,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartPrintRequest {
    pub filename: String,
}

impl StartPrintRequest {
    pub fn new(filename: impl Into<String>) -> Result<Self, ValidationError> {
        let filename = filename.into();
        if filename.trim().is_empty() {
            return Err(ValidationError::new("filename", "filename is required"));
        }
        Ok(Self { filename })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLevelRequest {
    pub component: String,
    pub level: String,
}

impl LogLevelRequest {
    pub fn new(
        component: impl Into<String>,
        level: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let component = component.into();
        let level = level.into().trim().to_ascii_uppercase();
        if component.trim().is_empty() {
            return Err(ValidationError::new("component", "component is required"));
        }
        if level.is_empty() {
            return Err(ValidationError::new("level", "level is required"));
        }
        Ok(Self { component, level })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDocument(pub Vec<RecipeStep>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_printer_ip")]
    pub printer_ip: String,
    #[serde(default = "default_printer_port")]
    pub printer_port: u16,
    #[serde(default)]
    pub wifi_ssid: String,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u32,
}

fn default_printer_ip() -> String {
    "192.168.4.3".to_string()
}

fn default_printer_port() -> u16 {
    8080
}

fn default_connection_timeout() -> u32 {
    10
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            printer_ip: default_printer_ip(),
            printer_port: default_printer_port(),
            wifi_ssid: String::new(),
            connection_timeout: default_connection_timeout(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let octets: Vec<&str> = self.printer_ip.split('.').collect();
        if octets.len() != 4 || octets.iter().any(|octet| octet.parse::<u8>().is_err()) {
            return Err(ValidationError::new(
                "printer_ip",
                format!("'{}' is not an IPv4 address", self.printer_ip),
            ));
        }
        if self.printer_port == 0 {
            return Err(ValidationError::new("printer_port", "port must be non-zero"));
        }
        if self.connection_timeout == 0 {
            return Err(ValidationError::new(
                "connection_timeout",
                "timeout must be at least one second",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingOutputs {
    #[serde(default = "enabled")]
    pub console: bool,
    #[serde(default)]
    pub file: bool,
    #[serde(default = "enabled")]
    pub web_stream: bool,
}

fn enabled() -> bool {
    true
}

impl Default for LoggingOutputs {
    fn default() -> Self {
        Self {
            console: true,
            file: false,
            web_stream: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub levels: BTreeMap<String, String>,
    #[serde(default)]
    pub outputs: LoggingOutputs,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let levels = [
            "print_manager",
            "mmu_control",
            "pump_control",
            "printer_comms",
            "web_interface",
        ]
        .into_iter()
        .map(|component| (component.to_string(), "INFO".to_string()))
        .collect();
        Self {
            levels,
            outputs: LoggingOutputs::default(),
        }
    }
}

const PUMP_CONFIG_SECTIONS: [&str; 4] = ["pumps", "material_change", "safety", "maintenance"];
const PUMP_ENTRY_KEYS: [&str; 6] = [
    "name",
    "description",
    "gpio_pin",
    "flow_rate_ml_per_second",
    "max_volume_ml",
    "calibration",
];

/// Structural check applied to a pump profile document before it is saved.
pub fn validate_pump_config(config: &Value) -> Result<(), ValidationError> {
    let Some(root) = config.as_object() else {
        return Err(ValidationError::new("pump_config", "must be a JSON object"));
    };
    if let Some(missing) = PUMP_CONFIG_SECTIONS
        .iter()
        .find(|section| !root.contains_key(**section))
    {
        return Err(ValidationError::new(
            "pump_config",
            format!("missing section '{missing}'"),
        ));
    }
    let Some(pumps) = root.get("pumps").and_then(Value::as_object) else {
        return Err(ValidationError::new("pumps", "must be an object"));
    };
    for (pump_id, pump) in pumps {
        let Some(pump) = pump.as_object() else {
            return Err(ValidationError::new(
                "pumps",
                format!("entry '{pump_id}' must be an object"),
            ));
        };
        if let Some(missing) = PUMP_ENTRY_KEYS.iter().find(|key| !pump.contains_key(**key)) {
            return Err(ValidationError::new(
                "pumps",
                format!("entry '{pump_id}' is missing '{missing}'"),
            ));
        }
        if !pump["gpio_pin"].is_i64() && !pump["gpio_pin"].is_u64() {
            return Err(ValidationError::new(
                "gpio_pin",
                format!("entry '{pump_id}' must use an integer pin"),
            ));
        }
        for numeric in ["flow_rate_ml_per_second", "max_volume_ml"] {
            if !pump[numeric].is_number() {
                return Err(ValidationError::new(
                    "pumps",
                    format!("entry '{pump_id}' field '{numeric}' must be numeric"),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
