// CLI surface tests
// Only commands that need no backend are exercised here

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("qc-checklist").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_no_subcommand_shows_how_to_start() {
    cli()
        .assert()
        .success()
        .stdout(predicate::str::contains("qc-checklist exec --serial"))
        .stdout(predicate::str::contains("template push"));
}

#[test]
fn test_help_lists_commands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("lookup"))
        .stdout(predicate::str::contains("template"));
}

#[test]
fn test_exec_requires_serial() {
    cli()
        .arg("exec")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--serial"));
}

#[test]
fn test_template_check_accepts_valid_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{ "modelo": "PM2200", "items": [{{ "ordem": 1, "descricao": "Aperto", "tempo_seg": 30 }}] }}"#
    )
    .unwrap();

    cli()
        .args(["template", "check"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("PM2200"))
        .stdout(predicate::str::contains("Template is valid"));
}

#[test]
fn test_template_check_rejects_missing_model() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{ "items": [{{ "descricao": "Aperto", "tempo_seg": 30 }}] }}"#).unwrap();

    cli()
        .args(["template", "check"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("model is required"));
}

#[test]
fn test_config_prints_effective_settings() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .current_dir(dir.path())
        .env("QC_CHECKLIST_EXECUTION__HOLD_MS", "1500")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[execution]"))
        .stdout(predicate::str::contains("hold_ms = 1500"))
        .stdout(predicate::str::contains("base_url = \"http://localhost:5000\""));
}
