#![cfg(all(unix, feature = "cli"))]

use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/pheadcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

/// Each probe connection becomes a short-lived session on the simulator.
fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while UnixStream::connect(path).is_err() {
        if start.elapsed() >= timeout {
            panic!("simulator did not bind {}", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn phead() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_phead"));
    cmd.env_remove("PHEAD_SOCKET")
        .env_remove("PHEAD_SERIAL")
        .env_remove("PHEAD_PROFILE")
        .env_remove("RUST_LOG")
        .arg("--log-level")
        .arg("error");
    cmd
}

struct Simulator {
    child: Child,
    dir: PathBuf,
    sock_path: PathBuf,
}

impl Simulator {
    fn start(tag: &str, profile_json: Option<&str>) -> Self {
        let dir = unique_temp_dir(tag);
        let sock_path = dir.join("head.sock");

        let mut cmd = phead();
        cmd.arg("serve").arg("--socket").arg(&sock_path);
        if let Some(json) = profile_json {
            let profile_path = dir.join("profile.json");
            std::fs::write(&profile_path, json).expect("profile should be writable");
            cmd.arg("--profile").arg(&profile_path);
        }
        let child = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("serve should start");

        wait_for_socket(&sock_path, Duration::from_secs(3));
        Self {
            child,
            dir,
            sock_path,
        }
    }

    fn run(&self, args: &[&str]) -> Output {
        let mut cmd = phead();
        cmd.arg("--format").arg("json");
        let (subcommand, rest) = args.split_first().expect("subcommand required");
        cmd.arg(subcommand).arg("--socket").arg(&self.sock_path);
        cmd.args(rest).output().expect("command should run")
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn json_stdout(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).expect("stdout should be json")
}

#[test]
fn describe_reports_default_head() {
    let sim = Simulator::start("describe", None);
    let output = sim.run(&["describe"]);

    assert!(output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["model"], "SD-PHEAD-1");
    assert_eq!(json["firmware"], "1.0");
}

#[test]
fn ping_reports_latency() {
    let sim = Simulator::start("ping", None);
    let output = sim.run(&["ping", "--count", "3"]);

    assert!(output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["attempts"], 3);
    assert_eq!(json["ok"], 3);
}

#[test]
fn send_named_command() {
    let sim = Simulator::start("send", None);
    let output = sim.run(&["send", "calibration", "calibrate", "30"]);

    assert!(output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["command"], "calibration/calibrate");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["frame"], "A00100CC");
}

#[test]
fn device_error_exits_20() {
    let sim = Simulator::start("nobattery", None);
    let output = sim.run(&["send", "battery", "read_battery"]);

    assert_eq!(output.status.code(), Some(20));
    let json = json_stdout(&output);
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"], "NO_BATTERY");
    assert_eq!(json["error_code"], 4);
}

#[test]
fn profile_changes_power_mode() {
    let sim = Simulator::start(
        "profile",
        Some(r#"{"power_mode": "battery", "battery_level": 3700}"#),
    );
    let output = sim.run(&["send", "battery", "read_battery"]);

    assert!(output.status.success());
    assert_eq!(json_stdout(&output)["payload"], "740E");
}

#[test]
fn send_raw_frame() {
    let sim = Simulator::start("raw", None);
    let output = sim.run(&["send", "--frame", "BD 02 01 05 CC"]);

    assert_eq!(output.status.code(), Some(20));
    assert_eq!(json_stdout(&output)["error"], "BAD_COMMAND");
}

#[test]
fn missing_socket_exits_3() {
    let dir = unique_temp_dir("missing");
    let output = phead()
        .arg("ping")
        .arg("--socket")
        .arg(dir.join("nobody.sock"))
        .output()
        .expect("ping should run");

    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn no_link_exits_64() {
    let output = phead().arg("describe").output().expect("describe should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn invalid_profile_is_rejected() {
    let dir = unique_temp_dir("badprofile");
    let profile_path = dir.join("profile.json");
    std::fs::write(&profile_path, r#"{"uv_map": 0}"#).expect("profile should be writable");

    let output = phead()
        .arg("serve")
        .arg("--socket")
        .arg(dir.join("head.sock"))
        .arg("--profile")
        .arg(&profile_path)
        .output()
        .expect("serve should run");

    assert_eq!(output.status.code(), Some(60));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = phead().arg("version").output().expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("phead {}", env!("CARGO_PKG_VERSION"))
    );
}
