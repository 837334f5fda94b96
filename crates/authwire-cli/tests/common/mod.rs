use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Run the CLI binary against an isolated session file.
pub async fn run_cli(args: &[&str], session_file: &Path) -> Output {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let session_file = session_file.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_authwire"));
        cmd.args(&args);
        cmd.env("AUTHWIRE_SESSION_FILE", &session_file);
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("AUTHWIRE_API");
        cmd.output().expect("Failed to execute CLI")
    })
    .await
    .expect("CLI task panicked")
}

/// Run the CLI and expect success.
pub async fn run_cli_success(args: &[&str], session_file: &Path) -> String {
    let output = run_cli(args, session_file).await;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Run the CLI and expect failure.
pub async fn run_cli_failure(args: &[&str], session_file: &Path) -> String {
    let output = run_cli(args, session_file).await;
    if output.status.success() {
        panic!("CLI command should have failed: {:?}", args);
    }
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Session file path inside a temp directory.
pub fn session_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("session.json")
}

/// Read the persisted session as raw JSON.
pub fn read_session(path: &Path) -> Value {
    let json = std::fs::read_to_string(path).expect("session file should exist");
    serde_json::from_str(&json).expect("session file should be JSON")
}

/// Mount a login endpoint issuing `A1`/`R1` and log in through the CLI.
pub async fn login(server: &MockServer, session_file: &Path) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"accessToken": "A1", "refreshToken": "R1"})),
        )
        .mount(server)
        .await;

    let uri = server.uri();
    run_cli_success(
        &[
            "login",
            "--identifier",
            "alice@example.com",
            "--password",
            "secret",
            "--api",
            &uri,
        ],
        session_file,
    )
    .await;
}
