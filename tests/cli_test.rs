//! Integration tests for the sfpromote binary.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const AUTH_URL: &str = "force://PlatformCLI::5Aep861cliTestSecret@example.my.salesforce.com";

fn setup_project(config: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join(".sfpromote");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.yml"), config).unwrap();
    temp
}

/// Commands that stand in for the sf CLI.
const LOCAL_CONFIG: &str = r#"
settings:
  ephemeral_dirs: []
commands:
  versions: []
  install: "true"
  login: "test -s ${auth_file}"
  devhub_login: "true"
  validate: "true"
  deploy: "echo '{\"status\":0,\"result\":{\"id\":\"0Af000000000001\",\"status\":\"Succeeded\"}}'"
  limits: "echo '{\"status\":0,\"result\":[]}'"
  last_commit_message: "echo 'PROJ-7 tidy triggers'"
  logout: "true"
"#;

fn sfpromote(temp: &TempDir) -> Command {
    let mut cmd = Command::new(cargo_bin("sfpromote"));
    cmd.current_dir(temp.path())
        .arg("--project")
        .arg(temp.path())
        .env_remove("ENVIRONMENT")
        .env_remove("RUN_TESTS")
        .env_remove("SKIP_CODE_ANALYSIS")
        .env_remove("DEPLOY_ONLY")
        .env_remove("TEST_LEVEL")
        .env_remove("VERSION_TAG")
        .env_remove("BUILD_URL")
        .env_remove("SFDX_AUTH_URL_DEV");
    cmd
}

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("sfpromote"));
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Salesforce DX"))
        .stdout(predicate::str::contains("approve"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("sfpromote"));
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn unknown_environment_exits_with_config_code() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(LOCAL_CONFIG);
    sfpromote(&temp)
        .args(["run", "--env", "STAGING"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("STAGING"));
    assert!(!temp.path().join(".sfpromote/runs").exists());
    Ok(())
}

#[test]
fn environment_comes_from_env_var() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(LOCAL_CONFIG);
    sfpromote(&temp)
        .env("ENVIRONMENT", "production")
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PRODUCTION"))
        .stdout(predicate::str::contains("Approval"));
    Ok(())
}

#[test]
fn dry_run_prints_plan() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(LOCAL_CONFIG);
    sfpromote(&temp)
        .args(["run", "--env", "DEV", "--deploy-only", "true", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy only"))
        .stdout(predicate::str::contains("Deploy"));
    assert!(!temp.path().join(".sfpromote/runs").exists());
    Ok(())
}

#[test]
fn invalid_config_exits_with_config_code() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project("coverage:\n  minimum: 140\n");
    sfpromote(&temp)
        .args(["run", "--env", "DEV", "--dry-run"])
        .assert()
        .code(2);
    Ok(())
}

#[test]
fn dev_run_deploys_and_is_recorded() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(LOCAL_CONFIG);
    sfpromote(&temp)
        .env("SFDX_AUTH_URL_DEV", AUTH_URL)
        .args([
            "run",
            "--env",
            "DEV",
            "--run-tests",
            "false",
            "--skip-code-analysis",
            "true",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(AUTH_URL).not());

    sfpromote(&temp)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok]"))
        .stdout(predicate::str::contains("DEV"));

    sfpromote(&temp)
        .args(["show", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"SUCCESS\""))
        .stdout(predicate::str::contains("PROJ-7"));

    let runs = fs::read_dir(temp.path().join(".sfpromote/runs"))?
        .filter_map(|entry| entry.ok())
        .collect::<Vec<_>>();
    assert_eq!(runs.len(), 1);
    let run_dir = runs[0].path();
    assert!(!run_dir.join("auth").exists());
    let console = fs::read_to_string(run_dir.join("console.log"))?;
    assert!(!console.contains("cliTestSecret"));
    assert!(!temp.path().join(".sfpromote/run.lock").exists());
    Ok(())
}

#[test]
fn project_path_with_spaces_still_logs_in() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let root = temp.path().join("my project");
    fs::create_dir_all(root.join(".sfpromote"))?;
    fs::write(root.join(".sfpromote").join("config.yml"), LOCAL_CONFIG)?;

    let mut cmd = Command::new(cargo_bin("sfpromote"));
    cmd.current_dir(&root)
        .arg("--project")
        .arg(&root)
        .env_remove("ENVIRONMENT")
        .env_remove("VERSION_TAG")
        .env_remove("BUILD_URL")
        .env("SFDX_AUTH_URL_DEV", AUTH_URL)
        .args([
            "run",
            "--env",
            "DEV",
            "--run-tests",
            "false",
            "--skip-code-analysis",
            "true",
        ])
        .assert()
        .success();
    Ok(())
}

#[test]
fn version_tag_with_shell_syntax_is_refused() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(LOCAL_CONFIG);
    let marker = temp.path().join("INJECTED");
    let tag = format!("v1.2.3;touch$IFS{}", marker.display());

    sfpromote(&temp)
        .args(["run", "--env", "PRODUCTION", "--dry-run", "--version-tag", &tag])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not a valid tag name"));

    assert!(!marker.exists());
    Ok(())
}

#[test]
fn missing_credential_fails_the_run() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(LOCAL_CONFIG);
    sfpromote(&temp)
        .args([
            "run",
            "--env",
            "DEV",
            "--run-tests",
            "false",
            "--skip-code-analysis",
            "true",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("SFDX_AUTH_URL_DEV"));
    Ok(())
}

#[test]
fn approve_needs_a_waiting_run() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(LOCAL_CONFIG);
    sfpromote(&temp)
        .args([
            "approve",
            "run_1700000000000_deadbeef",
            "--approver",
            "Dana",
            "--role",
            "release-manager",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("run_1700000000000_deadbeef"));
    Ok(())
}

#[test]
fn init_then_config_shows_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    sfpromote(&temp).arg("init").assert().success();
    assert!(temp.path().join(".sfpromote/config.yml").exists());

    sfpromote(&temp)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    sfpromote(&temp)
        .args(["config", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"minimum\": 75.0"));
    Ok(())
}

#[test]
fn config_schema_is_json() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let output = sfpromote(&temp).args(["config", "--schema"]).output()?;
    assert!(output.status.success());
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert!(schema["properties"]["settings"].is_object());
    Ok(())
}

#[test]
fn completions_generate() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("sfpromote"));
    cmd.args(["completions", "bash"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("sfpromote"));
    Ok(())
}
