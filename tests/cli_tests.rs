use std::fs;
use std::process::{Command, Stdio};

const BIN: &str = env!("CARGO_BIN_EXE_readiness-check");

#[test]
fn missing_config_exits_non_zero_without_report() {
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(BIN)
        .env("IAASTESTCONFIGDIR", dir.path())
        .stdin(Stdio::null())
        .output()
        .expect("binary runs");

    assert!(!out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(!stdout.contains("Total TCP Listeners"));
    assert!(!stdout.contains("Hit Enter"));

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(stderr.matches("config file not found").count(), 1);
    assert!(stderr.contains("cannot start without a configuration"));
}

#[test]
fn malformed_config_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("config.json"), "{ not json").unwrap();
    let out = Command::new(BIN)
        .arg("--config-dir")
        .arg(dir.path())
        .stdin(Stdio::null())
        .output()
        .expect("binary runs");

    assert!(!out.status.success());
    assert!(!String::from_utf8_lossy(&out.stdout).contains("Total"));
}

#[test]
fn unattended_run_reports_and_writes_json() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("config.json"),
        r#"{
            "remoteHost": "127.0.0.1",
            "remoteConnectionDetails": [],
            "localConnectionDetails": [
                {"port": "0", "protocol": "tcp", "description": "ephemeral"},
                {"port": "0", "protocol": "sctp", "description": "ignored"}
            ]
        }"#,
    )
    .unwrap();
    let json_path = dir.path().join("report.json");

    let out = Command::new(BIN)
        .env("IAASTESTCONFIGDIR", dir.path())
        .args(["--no-wait", "--settle-ms", "300", "--bind-ip", "127.0.0.1"])
        .arg("--output")
        .arg(&json_path)
        .stdin(Stdio::null())
        .output()
        .expect("binary runs");

    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Total TCP Listeners Set up:  1"));
    assert!(stdout.contains("Total UDP Listeners Set up:  0"));

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(report["counters"]["tcp_listeners"], 1);
}

#[test]
fn interactive_run_proceeds_at_end_of_input() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("config.json"), "{}").unwrap();

    let out = Command::new(BIN)
        .env("IAASTESTCONFIGDIR", dir.path())
        .stdin(Stdio::null())
        .output()
        .expect("binary runs");

    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Hit Enter when all ports are listening"));
    assert!(stdout.contains("Total TCP Responses Received:  0"));
}
