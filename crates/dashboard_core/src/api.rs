//! REST client for the controller's `/api` surface.

use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Map, Value};
use shared::{
    domain::{PrinterAction, PumpId, RecipeStep},
    error::{ErrorCode, ValidationError},
    protocol::{
        validate_pump_config, ApiEnvelope, FileListing, LogLevelRequest, LogMessage,
        LoggingConfig, NetworkConfig, PumpCommand, RecipeDocument, StartPrintRequest,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::error::ClientError;

/// Envelope of an action endpoint: `success`, optional `message`, and
/// whatever extra fields the controller attached.
pub type Reply = ApiEnvelope<Map<String, Value>>;

pub const DEFAULT_RECENT_LOGS: u32 = 100;

#[derive(Clone)]
pub struct ControllerApi {
    http: Client,
    server_url: String,
}

impl ControllerApi {
    pub fn new(http: Client, server_url: &Url) -> Self {
        Self {
            http,
            server_url: server_url.as_str().trim_end_matches('/').to_string(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Raw status snapshot, the same shape pushed as `status_update`.
    pub async fn status(&self) -> Result<Value, ClientError> {
        self.send(self.http.get(self.url("/api/status"))).await
    }

    pub async fn recipe(&self) -> Result<Vec<RecipeStep>, ClientError> {
        let value = self.send(self.http.get(self.url("/api/recipe"))).await?;
        let RecipeDocument(mut steps) = decode(value)?;
        steps.sort_by_key(|step| step.layer);
        Ok(steps)
    }

    pub async fn save_recipe(&self, steps: &[RecipeStep]) -> Result<Reply, ClientError> {
        self.post("/api/recipe", &RecipeDocument(steps.to_vec())).await
    }

    pub async fn printer_action(&self, action: PrinterAction) -> Result<Reply, ClientError> {
        let path = format!("/api/printer/{}", action.path_segment());
        self.post(&path, &json!({})).await
    }

    pub async fn run_pump(&self, command: &PumpCommand) -> Result<Reply, ClientError> {
        self.post("/api/pump", command).await
    }

    pub async fn start_multi_material(&self) -> Result<Reply, ClientError> {
        self.post("/api/multi-material/start", &json!({})).await
    }

    pub async fn stop_multi_material(&self) -> Result<Reply, ClientError> {
        self.post("/api/multi-material/stop", &json!({})).await
    }

    pub async fn emergency_stop(&self) -> Result<Reply, ClientError> {
        self.post("/api/emergency-stop", &json!({})).await
    }

    pub async fn printer_files(&self) -> Result<FileListing, ClientError> {
        let value = self.send(self.http.get(self.url("/api/printer/files"))).await?;
        let envelope: ApiEnvelope<FileListing> = decode(value)?;
        Ok(envelope.data)
    }

    pub async fn start_print(&self, request: &StartPrintRequest) -> Result<Reply, ClientError> {
        StartPrintRequest::new(request.filename.clone())?;
        self.post("/api/printer/start-print", request).await
    }

    pub async fn pump_config(&self) -> Result<Value, ClientError> {
        self.send(self.http.get(self.url("/api/config/pump"))).await
    }

    pub async fn save_pump_config(&self, config: &Value) -> Result<Reply, ClientError> {
        validate_pump_config(config)?;
        self.post("/api/config/pump", config).await
    }

    pub async fn network_config(&self) -> Result<NetworkConfig, ClientError> {
        let value = self.send(self.http.get(self.url("/api/config/network"))).await?;
        decode(value)
    }

    pub async fn save_network_config(&self, config: &NetworkConfig) -> Result<Reply, ClientError> {
        config.validate()?;
        self.post("/api/config/network", config).await
    }

    /// Probes the printer link; `printer_ip` defaults to the saved network
    /// configuration on the controller side.
    pub async fn test_connection(&self, printer_ip: Option<&str>) -> Result<Reply, ClientError> {
        let body = match printer_ip {
            Some(ip) => json!({ "printer_ip": ip }),
            None => json!({}),
        };
        self.post("/api/config/test-connection", &body).await
    }

    pub async fn logging_config(&self) -> Result<LoggingConfig, ClientError> {
        let value = self.send(self.http.get(self.url("/api/logging/config"))).await?;
        decode(value)
    }

    pub async fn save_logging_config(&self, config: &LoggingConfig) -> Result<Reply, ClientError> {
        self.post("/api/logging/config", config).await
    }

    pub async fn recent_logs(&self, count: u32) -> Result<Vec<LogMessage>, ClientError> {
        let request = self
            .http
            .get(self.url("/api/logging/recent"))
            .query(&[("count", count)]);
        decode(self.send(request).await?)
    }

    pub async fn set_log_level(&self, request: &LogLevelRequest) -> Result<Reply, ClientError> {
        LogLevelRequest::new(request.component.clone(), request.level.clone())?;
        self.post("/api/logging/level", request).await
    }

    pub async fn run_diagnostic(&self, name: &str) -> Result<Reply, ClientError> {
        let name = name.trim();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ValidationError::new("diagnostic", format!("invalid name '{name}'")).into());
        }
        self.post(&format!("/api/diagnostics/{name}"), &json!({})).await
    }

    pub async fn calibrate(&self, pump: PumpId) -> Result<Reply, ClientError> {
        self.post(&format!("/api/calibration/{}", pump.key()), &json!({}))
            .await
    }

    pub async fn restart_controller(&self) -> Result<Reply, ClientError> {
        self.post("/api/controller/restart", &json!({})).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Reply, ClientError> {
        let value = self.send(self.http.post(self.url(path)).json(body)).await?;
        if value.is_null() {
            return Ok(Reply {
                success: true,
                message: None,
                data: Map::new(),
            });
        }
        decode(value)
    }

    /// Sends `request` and turns non-2xx statuses and `success: false`
    /// envelopes into [`ClientError::Rejected`].
    async fn send(&self, request: RequestBuilder) -> Result<Value, ClientError> {
        let response = request.send().await.map_err(|err| {
            warn!(error = %err, "api: request failed");
            ClientError::Network(err)
        })?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await?;
        let parsed = if body.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str::<Value>(&body)
        };

        if !status.is_success() {
            let message = parsed
                .ok()
                .as_ref()
                .and_then(|value| value.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            warn!(%url, status = status.as_u16(), %message, "api: request rejected");
            return Err(ClientError::rejected(ErrorCode::from_status(status.as_u16()), message));
        }
        let value = parsed.map_err(|err| ClientError::Decode(format!("{url}: {err}")))?;
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            warn!(%url, %message, "api: controller reported failure");
            return Err(ClientError::rejected(ErrorCode::Rejected, message));
        }
        debug!(%url, status = status.as_u16(), "api: ok");
        Ok(value)
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|err| ClientError::Decode(err.to_string()))
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
