use std::collections::HashMap;

use super::*;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_match_controller_cadence() {
    let settings = Settings::default();
    assert_eq!(settings.server_url().unwrap().as_str(), "http://localhost:5000/");
    let policy = settings.reconnect_policy();
    assert_eq!(policy.fallback_after_errors, 3);
    assert_eq!(policy.base_delay, Duration::from_millis(1000));
    assert_eq!(policy.max_delay, Duration::from_millis(5000));
    assert_eq!(settings.poll_interval(), Duration::from_secs(2));
    assert_eq!(settings.file_request_timeout(), Duration::from_secs(10));
}

#[test]
fn env_overrides_and_ignores_garbage_numbers() {
    let mut settings = Settings::default();
    settings.apply_env(env(&[
        ("DASHBOARD_SERVER_URL", "http://legacy:5000"),
        ("APP__SERVER_URL", "http://printer.local:5000"),
        ("APP__DEBUG_MODE", "true"),
        ("APP__FALLBACK_AFTER_ERRORS", "5"),
        ("APP__POLL_INTERVAL_MS", "soon"),
    ]));
    assert_eq!(settings.server_url, "http://printer.local:5000");
    assert!(settings.debug_mode);
    assert_eq!(settings.fallback_after_errors, 5);
    assert_eq!(settings.poll_interval_ms, 2000);
}

#[test]
fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dashboard.toml");
    fs::write(
        &path,
        "server_url = \"https://controller:8443\"\nreconnect_delay_max_ms = 8000\ndebug_mode = true\n",
    )
    .unwrap();

    let settings = load_settings(Some(&path)).unwrap();
    assert_eq!(settings.server_url().unwrap().scheme(), "https");
    assert_eq!(settings.reconnect_delay_max_ms, 8000);
    assert_eq!(settings.reconnect_delay_ms, 1000);
}

#[test]
fn missing_file_falls_back_to_defaults_and_bad_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_settings(Some(&dir.path().join("absent.toml"))).is_ok());

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "server_url = [unterminated").unwrap();
    assert!(matches!(
        load_settings(Some(&bad)),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn rejects_non_http_server_urls() {
    let settings = Settings {
        server_url: "ws://controller:5000".into(),
        ..Settings::default()
    };
    assert!(matches!(
        settings.server_url(),
        Err(ConfigError::ServerUrl { .. })
    ));
}
