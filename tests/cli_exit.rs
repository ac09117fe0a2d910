//! Command line failures: exit code and the final diagnostic line
//!
//! Every case fails during configuration, before any credentials or
//! network access are needed.

use std::process::{Command, Output};

const CONFIG_ENV: [&str; 9] = [
    "GOOGLE_CLOUD_PROJECT",
    "GOOGLE_CLOUD_ASSET_TYPES",
    "GOOGLE_CLOUD_ASSET_SCOPE",
    "GOOGLE_CLOUD_DATASET_ID",
    "GOOGLE_CLOUD_DATASET_REGION",
    "GOOGLE_CLOUD_INVENTORY_TABLE_ID",
    "ASSET_SYNC_LOG_LEVEL",
    "ASSET_SYNC_LOG_FILTER",
    "ASSET_SYNC_LOG_FILE",
];

fn asset_sync(args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_asset-sync"));
    for var in CONFIG_ENV {
        command.env_remove(var);
    }
    command
        .args([
            "--project",
            "demo-host",
            "--asset-types",
            "compute.googleapis.com/Address",
            "--scope",
            "buckets/demo-host",
        ])
        .args(args)
        .output()
        .expect("binary should start")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_bad_scope_exits_with_configuration_code() {
    let output = asset_sync(&["--log-level", "off"]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = stdout(&output);
    assert!(stdout.contains("Error: GOOGLE_CLOUD_ASSET_SCOPE"), "stdout: {stdout}");
}

#[test]
fn test_error_reaches_stdout_when_logging_to_file() {
    let dir = std::env::temp_dir().join(format!("asset-sync-{}", uuid::Uuid::new_v4().simple()));
    let log_file = dir.join("run.log");

    let output = asset_sync(&["--log-file", log_file.to_str().expect("utf-8 temp path")]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = stdout(&output);
    assert!(stdout.contains("Error: GOOGLE_CLOUD_ASSET_SCOPE"), "stdout: {stdout}");
    let _ = std::fs::remove_dir_all(dir);
}
