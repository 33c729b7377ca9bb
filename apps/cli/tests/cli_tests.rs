//! spot-cli 端到端测试
//!
//! 所有测试都使用临时配置文件，不读写用户目录；驱动测试只使用 `--sim`。

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cli(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("spot-cli").unwrap();
    cmd.arg("--config")
        .arg(config_dir.path().join("config.toml"))
        .env_remove("SPOT_CLI_CONFIG")
        .env_remove("BOSDYN_CLIENT_USERNAME")
        .env_remove("BOSDYN_CLIENT_PASSWORD")
        .env("RUST_LOG", "info");
    cmd
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("driver"))
        .stdout(predicate::str::contains("nav-goal"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_set_then_get() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["config", "set", "--hostname", "10.0.0.9", "--robot-frame", "body"])
        .assert()
        .success();

    cli(&dir)
        .args(["config", "get", "hostname"])
        .assert()
        .success()
        .stdout("10.0.0.9\n");
    cli(&dir)
        .args(["config", "get", "robot_frame"])
        .assert()
        .success()
        .stdout("body\n");

    let saved = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(saved.contains("hostname = \"10.0.0.9\""));
}

#[test]
fn test_config_path_honors_flag() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_get_unknown_key_fails() {
    let dir = TempDir::new().unwrap();
    cli(&dir).args(["config", "get", "password"]).assert().failure();
}

#[test]
fn test_driver_requires_sim_backend() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .arg("driver")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--sim"));
}

#[test]
fn test_driver_lease_failure_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["driver", "--sim", "--sim-fail-at", "lease", "--settle-delay-ms", "0"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to acquire lease"))
        .stderr(predicate::str::contains("Released session"));
}

#[test]
fn test_driver_publishes_tf_and_shuts_down() {
    let dir = TempDir::new().unwrap();
    let cmd_vel = r#"{"topic":"/cmd_vel","data":{"linear":{"x":0.3,"y":0.0,"z":0.0},"angular":{"x":0.0,"y":0.0,"z":0.1}}}"#;

    let output = cli(&dir)
        .args([
            "driver",
            "--sim",
            "--settle-delay-ms",
            "0",
            "--robot-frame",
            "body_link",
            "--max-runtime-ms",
            "600",
        ])
        .write_stdin(format!("{}\n", cmd_vel))
        .assert()
        .success()
        .stderr(predicate::str::contains("Robot standing"))
        .stderr(predicate::str::contains("Released lease"))
        .get_output()
        .stdout
        .clone();

    let messages = json_lines(&output);
    let tf = messages
        .iter()
        .find(|m| m["topic"] == "/tf")
        .expect("at least one /tf message");
    assert_eq!(tf["data"]["header"]["frame_id"], "odom");
    assert_eq!(tf["data"]["child_frame_id"], "body_link");
}

#[test]
fn test_nav_goal_transforms_into_robot_frame() {
    let dir = TempDir::new().unwrap();
    let input = [
        r#"{"topic":"/tf","data":{"header":{"stamp":{"sec":0,"nanosec":0},"frame_id":"odom"},"child_frame_id":"base_link","transform":{"translation":{"x":2.0,"y":0.0,"z":0.0},"rotation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0}}}}"#,
        r#"{"topic":"/goal_pose","data":{"header":{"stamp":{"sec":0,"nanosec":0},"frame_id":"odom"},"pose":{"position":{"x":5.0,"y":1.0,"z":0.0},"orientation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0}}}}"#,
    ]
    .join("\n");

    let output = cli(&dir)
        .arg("nav-goal")
        .write_stdin(input + "\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let messages = json_lines(&output);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["topic"], "move_relative_xy/goal");
    let x = messages[0]["data"]["x"].as_f64().unwrap();
    let y = messages[0]["data"]["y"].as_f64().unwrap();
    assert!((x - 3.0).abs() < 1e-9);
    assert!((y - 1.0).abs() < 1e-9);
}

#[test]
fn test_nav_goal_without_transform_is_dropped() {
    let dir = TempDir::new().unwrap();
    let goal = r#"{"topic":"/goal_pose","data":{"header":{"stamp":{"sec":0,"nanosec":0},"frame_id":"map"},"pose":{"position":{"x":1.0,"y":0.0,"z":0.0},"orientation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0}}}}"#;

    cli(&dir)
        .args(["nav-goal", "--transform-timeout-ms", "10"])
        .write_stdin(format!("{}\n", goal))
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Goal dropped"));
}

#[test]
fn test_nav_goal_static_tf_flag() {
    let dir = TempDir::new().unwrap();
    let goal = r#"{"topic":"/goal_pose","data":{"header":{"stamp":{"sec":0,"nanosec":0},"frame_id":"map"},"pose":{"position":{"x":1.0,"y":0.0,"z":0.0},"orientation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0}}}}"#;

    cli(&dir)
        .args(["nav-goal", "--tf", "map,base_link,0,0,0"])
        .write_stdin(format!("{}\n", goal))
        .assert()
        .success()
        .stdout(predicate::str::contains("move_relative_xy/goal"));
}

#[test]
fn test_nav_goal_drop_lists_known_frames() {
    let dir = TempDir::new().unwrap();
    let goal = r#"{"topic":"/goal_pose","data":{"header":{"stamp":{"sec":0,"nanosec":0},"frame_id":"map"},"pose":{"position":{"x":1.0,"y":0.0,"z":0.0},"orientation":{"x":0.0,"y":0.0,"z":0.0,"w":1.0}}}}"#;

    cli(&dir)
        .env("RUST_LOG", "spot_cli::commands::nav_goal=debug")
        .args([
            "nav-goal",
            "--tf",
            "odom,base_link,1,0,0",
            "--transform-timeout-ms",
            "10",
        ])
        .write_stdin(format!("{}\n", goal))
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Known frames: [base_link, odom]"));
}
