use std::path::Path;
use std::process::Output;

use serde_json::{Value, json};
use tokio::process::Command;
use wiremock::MockServer;

/// API base URL of a mock server.
pub fn api_url(server: &MockServer) -> String {
    format!("http://127.0.0.1:{}/api/v1", server.address().port())
}

/// A `user` object as the API returns it.
pub fn user_json(id: u64, username: &str, role: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "email": format!("{}@example.com", username),
        "role": role,
        "is_active": true,
        "created_at": "2024-03-01T09:30:00",
        "updated_at": "2024-03-01T09:30:00",
        "last_login": "2024-03-02T08:00:00"
    })
}

/// Run the CLI with an isolated data directory against `api`.
pub async fn run_cli(args: &[&str], data_dir: &Path, api: &str) -> Output {
    Command::new(env!("CARGO_BIN_EXE_qbank"))
        .args(args)
        .env("QBANK_DATA_DIR", data_dir)
        .env("QBANK_API_URL", api)
        .env("NO_COLOR", "1")
        .env_remove("QBANK_PASSWORD")
        .env_remove("QBANK_TIMEOUT_SECS")
        .env_remove("RUST_LOG")
        .output()
        .await
        .expect("Failed to execute CLI")
}

/// Run the CLI and expect success, returning stdout.
pub async fn run_cli_success(args: &[&str], data_dir: &Path, api: &str) -> String {
    let output = run_cli(args, data_dir, api).await;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Read the persisted session file as JSON.
pub fn stored_session(data_dir: &Path) -> Value {
    let raw = std::fs::read_to_string(data_dir.join("session.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}
