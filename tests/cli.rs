use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated from the user's config and credentials
fn transcriptor(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("transcriptor").unwrap();
    cmd.current_dir(workdir.path())
        .env("XDG_CONFIG_HOME", workdir.path().join("xdg"))
        .env("HOME", workdir.path())
        .env_remove("VOLC_APP_KEY")
        .env_remove("VOLC_ACCESS_KEY")
        .env_remove("VOLC_RESOURCE_ID")
        .env_remove("VOLC_ASR_MODEL_NAME")
        .env_remove("VOLC_ASR_MODE")
        .env_remove("RUST_LOG");
    cmd
}

fn audio_file(workdir: &TempDir) -> std::path::PathBuf {
    let path = workdir.path().join("clip.mp3");
    std::fs::write(&path, b"ID3 fake audio").unwrap();
    path
}

#[test]
fn help_lists_commands() {
    let workdir = TempDir::new().unwrap();
    transcriptor(&workdir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("transcribe"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("resolve"));
}

#[test]
fn missing_argument_is_a_usage_error() {
    let workdir = TempDir::new().unwrap();
    transcriptor(&workdir).arg("transcribe").assert().code(2);
}

#[test]
fn invalid_mode_is_a_usage_error() {
    let workdir = TempDir::new().unwrap();
    let audio = audio_file(&workdir);
    transcriptor(&workdir)
        .arg("transcribe")
        .arg(&audio)
        .args(["--mode", "turbo"])
        .assert()
        .code(2);
}

#[test]
fn missing_file_reports_json_error() {
    let workdir = TempDir::new().unwrap();
    transcriptor(&workdir)
        .args(["--quiet", "transcribe", "does-not-exist.mp3", "--app-key", "app", "--access-key", "key"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(r#""status": "error""#))
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn flash_without_access_key_fails_before_network() {
    let workdir = TempDir::new().unwrap();
    let audio = audio_file(&workdir);
    transcriptor(&workdir)
        .args(["--quiet", "transcribe"])
        .arg(&audio)
        .args(["--app-key", "app", "--mode", "flash"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("access key"));
}

#[test]
fn missing_app_key_reported_from_env_free_run() {
    let workdir = TempDir::new().unwrap();
    let audio = audio_file(&workdir);
    transcriptor(&workdir)
        .args(["--quiet", "transcribe"])
        .arg(&audio)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("app key"));
}

#[test]
fn polling_timeout_shorter_than_interval_is_rejected() {
    let workdir = TempDir::new().unwrap();
    let audio = audio_file(&workdir);
    transcriptor(&workdir)
        .args(["--quiet", "transcribe"])
        .arg(&audio)
        .args(["--app-key", "app", "--mode", "standard"])
        .args(["--poll-interval-ms", "1000", "--poll-timeout-ms", "10"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("poll interval"));
}

#[test]
fn unsupported_share_text_is_rejected() {
    let workdir = TempDir::new().unwrap();
    transcriptor(&workdir)
        .args(["--quiet", "resolve", "no link in here"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unsupported input"));
}

#[test]
fn explicit_config_file_is_used() {
    let workdir = TempDir::new().unwrap();
    let config = workdir.path().join("custom.yaml");
    std::fs::write(&config, "asr:\n  resource_id: volc.seedasr.auc\n  poll_interval_ms: 700\n").unwrap();

    transcriptor(&workdir)
        .arg("--config")
        .arg(&config)
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("volc.seedasr.auc"))
        .stdout(predicate::str::contains("every 700ms"));
}

#[test]
fn invalid_config_file_is_reported() {
    let workdir = TempDir::new().unwrap();
    let config = workdir.path().join("bad.yaml");
    std::fs::write(&config, "asr:\n  poll_interval_ms: 0\n").unwrap();

    transcriptor(&workdir)
        .arg("--config")
        .arg(&config)
        .arg("platforms")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("poll_interval_ms"));
}

#[test]
fn platforms_lists_extractors() {
    let workdir = TempDir::new().unwrap();
    transcriptor(&workdir)
        .arg("platforms")
        .assert()
        .success()
        .stdout(predicate::str::contains("Douyin"))
        .stdout(predicate::str::contains("Local File"));
}

#[test]
fn run_defaults_to_standard_protocol_without_access_key() {
    let workdir = TempDir::new().unwrap();
    transcriptor(&workdir)
        .args(["--quiet", "run", "no link in here", "--app-key", "app"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unsupported input"))
        .stderr(predicate::str::contains("access key").not());
}
