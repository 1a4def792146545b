//! `--json` keeps stdout machine-readable: one JSON document per command.

use assert_cmd::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

const VALID: &str = r#"
[decider]
safe_height = 0.0
crawl_height = -0.26
short_place_height = -0.06
tall_place_height = -0.16
x_cam2gripper = 0.0
y_cam2gripper = 0.0
"#;

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.output().unwrap();
    let text = String::from_utf8(out.stdout).unwrap();
    let line = text.lines().last().expect("stdout has a line");
    serde_json::from_str(line).expect("stdout is JSON")
}

#[test]
fn run_summary_is_json() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, VALID).unwrap();

    let mut cmd = Command::cargo_bin("crane").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--json")
        .args(["run", "--sim", "--cycles", "4"]);
    let v = stdout_json(&mut cmd);
    assert_eq!(v["cycles"], 4);
    assert_eq!(v["final_state"], "FOR_APPROX");
    assert!(v["telemetry"]["decoded"].as_u64().is_some());
}

#[test]
fn decode_is_json() {
    let mut cmd = Command::cargo_bin("crane").unwrap();
    cmd.args(["--json", "decode", "0x0064 0000 0000 0000"]);
    let v = stdout_json(&mut cmd);
    assert_eq!(v["len"], 8);
    assert_eq!(v["telemetry"]["mm"][0], 100);
    assert_eq!(v["command"]["grip"], false);
}

#[test]
fn errors_are_json_with_reason() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("crane").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("--json")
        .args(["run", "--sim"]);
    let out = cmd.output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    let text = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
    assert_eq!(v["reason"], "Error");
    assert!(v["message"].as_str().unwrap().contains("could not be read"));
}
