use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::domain::{Motor, PumpDirection};
use tokio::{net::TcpListener, sync::Mutex};

use super::*;

#[derive(Clone, Default)]
struct Recorded {
    posts: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn record(state: &Recorded, path: impl Into<String>, body: Value) {
    state.posts.lock().await.push((path.into(), body));
}

async fn handle_pump(State(state): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    record(&state, "/api/pump", body).await;
    Json(json!({"success": true, "message": "Pump command queued", "command_id": 42}))
}

async fn handle_printer(
    State(state): State<Recorded>,
    Path(action): Path<String>,
) -> (StatusCode, Json<Value>) {
    record(&state, format!("/api/printer/{action}"), Value::Null).await;
    if action == "pause" {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"success": false, "message": "Controller modules not available"})),
        )
    } else {
        (StatusCode::OK, Json(json!({"success": false, "action": action})))
    }
}

async fn handle_recipe() -> Json<Value> {
    Json(json!([
        {"material": "B", "layer": 120},
        {"material": "A", "layer": 50}
    ]))
}

async fn handle_files() -> Json<Value> {
    Json(json!({
        "success": true,
        "files": [{"name": "cube.ctb", "size": 2048, "type": "ctb"}],
        "count": 1
    }))
}

async fn handle_logs(Query(query): Query<std::collections::HashMap<String, String>>) -> Json<Value> {
    let count: usize = query.get("count").and_then(|c| c.parse().ok()).unwrap_or(100);
    let lines: Vec<Value> = (0..count)
        .map(|idx| json!({"level": "INFO", "logger": "web", "message": format!("line {idx}")}))
        .collect();
    Json(Value::Array(lines))
}

async fn handle_network() -> Json<Value> {
    Json(json!({"printer_ip": "10.0.0.9", "printer_port": 6000}))
}

async fn spawn_controller() -> (ControllerApi, Recorded) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = Recorded::default();
    let app = Router::new()
        .route("/api/pump", post(handle_pump))
        .route("/api/printer/files", get(handle_files))
        .route("/api/printer/:action", post(handle_printer))
        .route("/api/recipe", get(handle_recipe))
        .route("/api/logging/recent", get(handle_logs))
        .route("/api/config/network", get(handle_network))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let url = Url::parse(&format!("http://{addr}")).expect("url");
    (ControllerApi::new(Client::new(), &url), state)
}

#[tokio::test]
async fn pump_command_is_posted_and_acknowledged() {
    let (api, state) = spawn_controller().await;
    let command = PumpCommand::new(Motor::B, PumpDirection::Reverse, 30).unwrap();
    let reply = api.run_pump(&command).await.expect("pump");
    assert!(reply.success);
    assert_eq!(reply.message.as_deref(), Some("Pump command queued"));
    assert_eq!(reply.data.get("command_id"), Some(&json!(42)));

    let posts = state.posts.lock().await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].1, json!({"motor": "B", "direction": "R", "duration": 30}));
}

#[tokio::test]
async fn error_status_and_failed_envelope_are_rejections() {
    let (api, _) = spawn_controller().await;

    let err = api.printer_action(PrinterAction::Pause).await.unwrap_err();
    match err {
        ClientError::Rejected(api_err) => {
            assert_eq!(api_err.code, ErrorCode::Unavailable);
            assert_eq!(api_err.message, "Controller modules not available");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = api.printer_action(PrinterAction::Stop).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Rejected(ref api_err) if api_err.code == ErrorCode::Rejected
    ));
    assert_eq!(err.user_message(), "request failed");
}

#[tokio::test]
async fn unknown_route_maps_to_not_found() {
    let (api, _) = spawn_controller().await;
    let err = api.emergency_stop().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Rejected(ref api_err) if api_err.code == ErrorCode::NotFound
    ));
}

#[tokio::test]
async fn recipe_comes_back_sorted() {
    let (api, _) = spawn_controller().await;
    let recipe = api.recipe().await.expect("recipe");
    assert_eq!(recipe, vec![RecipeStep::new("A", 50), RecipeStep::new("B", 120)]);
}

#[tokio::test]
async fn file_listing_and_logs_decode() {
    let (api, _) = spawn_controller().await;
    let listing = api.printer_files().await.expect("files");
    assert_eq!(listing.count, 1);
    assert_eq!(listing.files[0].kind.as_deref(), Some("ctb"));

    let logs = api.recent_logs(3).await.expect("logs");
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[2].message, "line 2");

    let network = api.network_config().await.expect("network");
    assert_eq!(network.printer_ip, "10.0.0.9");
    assert_eq!(network.connection_timeout, 10);
}

#[tokio::test]
async fn invalid_forms_never_reach_the_controller() {
    let (api, state) = spawn_controller().await;

    let err = api.save_pump_config(&json!({"pumps": {}})).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let request = StartPrintRequest {
        filename: "  ".into(),
    };
    assert!(matches!(
        api.start_print(&request).await,
        Err(ClientError::Validation(_))
    ));

    assert!(matches!(
        api.run_diagnostic("../etc").await,
        Err(ClientError::Validation(_))
    ));

    assert!(state.posts.lock().await.is_empty());
}
