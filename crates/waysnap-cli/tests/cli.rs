//! Integration tests for the waysnap CLI.
//!
//! Each test imports the fixture network into a temporary directory and
//! drives the binary with `assert_cmd`.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
}

/// A temporary copy of the fixture configuration whose `graph.path`
/// resolves inside the temp dir.
struct TestEnv {
    _temp_dir: TempDir,
    config: PathBuf,
    store: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = temp_dir.path().join("waysnap.json");
        fs::copy(fixtures_dir().join("waysnap.json"), &config).expect("copy config");
        let store = temp_dir.path().join("network.db");
        Self {
            _temp_dir: temp_dir,
            config,
            store,
        }
    }

    fn imported() -> Self {
        let env = Self::new();
        env.cli()
            .args(["import"])
            .arg(fixtures_dir().join("network.json"))
            .assert()
            .success();
        env
    }

    fn cli(&self) -> Command {
        let mut cmd = Command::cargo_bin("waysnap-cli").expect("binary exists");
        cmd.env_remove("WAYSNAP_CONFIG")
            .arg("--config")
            .arg(&self.config);
        cmd
    }
}

fn network() -> PathBuf {
    fixtures_dir().join("network.json")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

#[test]
fn import_writes_store_from_config() {
    let env = TestEnv::new();
    env.cli()
        .arg("import")
        .arg(network())
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 5 ways"));
    assert!(env.store.exists());
}

#[test]
fn import_json_summary() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let output = temp_dir.path().join("custom.db");

    let assert = Command::cargo_bin("waysnap-cli")
        .expect("binary exists")
        .env_remove("WAYSNAP_CONFIG")
        .args(["--format", "json", "import"])
        .arg(network())
        .args(["--output", path_str(&output), "--tile-size", "0.25"])
        .assert()
        .success();

    let summary: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("json summary");
    assert_eq!(summary["ways"], 5);
    assert_eq!(summary["tile_size"], 0.25);
    assert!(summary["components"].as_u64().unwrap() >= 2);
    assert!(output.exists());
}

#[test]
fn import_without_destination_fails() {
    Command::cargo_bin("waysnap-cli")
        .expect("binary exists")
        .env_remove("WAYSNAP_CONFIG")
        .arg("import")
        .arg(network())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no output path"));
}

#[test]
fn check_config_reports_modes_and_tiles() {
    let env = TestEnv::imported();
    env.cli()
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"))
        .stdout(predicate::str::contains("pedestrian"))
        .stdout(predicate::str::contains("tiles:"));
}

#[test]
fn check_config_fails_without_store() {
    let env = TestEnv::new();
    env.cli()
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open tile store"));

    env.cli()
        .args(["check-config", "--skip-store"])
        .assert()
        .success()
        .stdout(predicate::str::contains("downstream:  loopback"));
}

#[test]
fn request_locate_prints_ways() {
    let env = TestEnv::imported();
    env.cli()
        .args([
            "request",
            r#"/locate?json={"locations":[{"lat":50.85,"lon":4.352}]}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""way_id":100"#))
        .stdout(predicate::str::contains(r#""way_id":200"#));
}

#[test]
fn request_route_prints_handoff_document() {
    let env = TestEnv::imported();
    let body = r#"{
        "costing": "auto",
        "locations": [{"lat": 50.85, "lon": 4.35}, {"lat": 50.85, "lon": 4.354}]
    }"#;
    env.cli()
        .args(["request", "/route", "-X", "post", "--body", body])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""costing": "auto""#));
}

#[test]
fn request_rejection_reports_status() {
    let env = TestEnv::imported();
    let body_file = env.config.with_file_name("island.json");
    fs::write(
        &body_file,
        r#"{"costing":"auto","locations":[{"lat":50.85,"lon":4.35},{"lat":10.0,"lon":10.001}]}"#,
    )
    .expect("write body");

    env.cli()
        .args(["request", "/route", "-X", "POST", "--body-file"])
        .arg(&body_file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("404"))
        .stderr(predicate::str::contains("unconnected regions"));
}
