//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("nexflash");
    // Keep the developer's environment out of the contract
    cmd.env_remove("NEXFLASH_PORT")
        .env_remove("NEXFLASH_BAUD")
        .env_remove("NEXFLASH_NON_INTERACTIVE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("nexflash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("upload")
                .and(predicate::str::contains("probe"))
                .and(predicate::str::contains("list-ports"))
                .and(predicate::str::contains("completions")),
        );
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nexflash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn list_ports_json_returns_valid_json() {
    // In environments without serial ports this still exercises the JSON path
    let mut cmd = cli_cmd();
    let output = cmd
        .args(["list-ports", "--json"])
        .output()
        .expect("command should execute");

    let stdout = String::from_utf8_lossy(&output.stdout);
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&stdout) {
        assert!(parsed.is_array(), "should be a JSON array");
    }
}

#[test]
fn completions_bash_exits_zero() {
    let mut cmd = cli_cmd();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .code(0)
        .stdout(predicate::str::contains("nexflash"));
}

// ============================================================================
// Exit Code Tests
// ============================================================================

/// Exit code 2: usage error (unknown command, invalid arguments)
#[test]
fn exit_code_two_for_usage_error_unknown_command() {
    let mut cmd = cli_cmd();
    cmd.arg("unknown-command-xyz")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized").or(predicate::str::contains("unknown")));
}

#[test]
fn exit_code_two_for_usage_error_invalid_flag() {
    let mut cmd = cli_cmd();
    cmd.arg("--invalid-flag-xyz")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn exit_code_two_for_upload_without_firmware() {
    let mut cmd = cli_cmd();
    cmd.arg("upload")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("FIRMWARE"));
}

#[test]
fn exit_code_two_for_invalid_baud() {
    let mut cmd = cli_cmd();
    cmd.args(["--baud", "fast", "probe"])
        .assert()
        .failure()
        .code(2);
}

/// Exit code 1: unreadable firmware file
#[test]
fn exit_code_one_for_missing_firmware_file() {
    let dir = tempdir().expect("tempdir should be created");
    let nonexistent = dir
        .path()
        .join("does_not_exist.tft");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("--non-interactive")
        .arg("upload")
        .arg(nonexistent.as_os_str())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("does_not_exist.tft"));
}

#[test]
fn upload_json_error_keeps_stdout_clean() {
    let dir = tempdir().expect("tempdir should be created");
    let nonexistent = dir
        .path()
        .join("missing.tft");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("upload")
        .arg("--json")
        .arg(nonexistent.as_os_str())
        .assert()
        .failure()
        .stdout(predicate::str::is_empty());
}

/// Exit code 3: explicitly named config file that cannot be used
#[test]
fn exit_code_three_for_explicit_invalid_config() {
    let dir = tempdir().expect("tempdir should be created");
    let config = dir
        .path()
        .join("custom.toml");
    fs::write(&config, "invalid toml [[[").expect("write invalid config");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("list-ports")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("TOML"));
}

#[test]
fn exit_code_three_for_missing_explicit_config() {
    let dir = tempdir().expect("tempdir should be created");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("completions")
        .arg("bash")
        .assert()
        .failure()
        .code(3);
}

#[test]
fn invalid_local_config_warns_and_continues() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("nexflash.toml"), "invalid toml [[[")
        .expect("write invalid config");

    let mut cmd = cli_cmd();
    let output = cmd
        .current_dir(dir.path())
        .arg("completions")
        .arg("bash")
        .output()
        .expect("command should execute");

    assert!(
        output
            .status
            .success(),
        "command should succeed despite config warning"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TOML"), "should warn about invalid TOML");
}

/// Opening a port that does not exist is a device failure
#[test]
fn exit_code_four_for_missing_port() {
    let dir = tempdir().expect("tempdir should be created");
    let firmware = dir
        .path()
        .join("panel.tft");
    fs::write(&firmware, vec![0u8; 64]).expect("write dummy firmware");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("-p")
        .arg("INVALID_PORT_NAME_XYZ")
        .arg("upload")
        .arg(&firmware)
        .assert()
        .failure()
        .code(4);
}

// ============================================================================
// Unknown Command/Flag Suggestion Tests
// ============================================================================

#[test]
fn unknown_command_suggests_similar() {
    let mut cmd = cli_cmd();
    cmd.arg("uplaod")
        .assert()
        .failure()
        .stderr(predicate::str::contains("upload"));
}

#[test]
fn unknown_flag_suggests_similar() {
    let mut cmd = cli_cmd();
    cmd.arg("list-ports")
        .arg("--jason")
        .assert()
        .failure()
        .stderr(predicate::str::contains("json"));
}
