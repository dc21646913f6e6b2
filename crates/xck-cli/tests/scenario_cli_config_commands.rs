use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

fn config_dir() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config")
}

#[test]
fn config_hash_prints_hash_and_canonical_json() -> anyhow::Result<()> {
    let base = config_dir().join("defaults/base.yaml");

    Command::cargo_bin("xck")?
        .arg("config-hash")
        .arg(&base)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("config_hash="))
        .stdout(predicate::str::contains("push-subscription"));
    Ok(())
}

#[test]
fn config_check_reports_layered_values() -> anyhow::Result<()> {
    let dir = config_dir();

    Command::cargo_bin("xck")?
        .arg("config-check")
        .arg("--config")
        .arg(dir.join("defaults/base.yaml"))
        .arg("--config")
        .arg(dir.join("deployments/pollers_count.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("required_channels=poller-A,poller-B"))
        .stdout(predicate::str::contains("settlement_window_ms=12000"))
        .stdout(predicate::str::contains("unused_keys=0"));
    Ok(())
}

#[test]
fn config_check_fail_unused_rejects_stray_keys() -> anyhow::Result<()> {
    let mut extra = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    writeln!(extra, "reporter:\n  colour: blue")?;

    let base = config_dir().join("defaults/base.yaml");

    Command::cargo_bin("xck")?
        .arg("config-check")
        .arg("--config")
        .arg(&base)
        .arg("--config")
        .arg(extra.path())
        .arg("--fail-unused")
        .assert()
        .failure();
    Ok(())
}
