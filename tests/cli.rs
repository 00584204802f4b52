#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const TWO_ACCOUNTS: &str = "\
defaultPortal: prod
portals:
  - name: prod
    portalId: 123
    authType: personalaccesskey
    personalAccessKey: pak-prod
  - name: sandbox
    portalId: 456
    authType: personalaccesskey
    personalAccessKey: pak-sandbox
";

fn hs(home: &Path) -> Command {
    let mut cmd = Command::new(cargo_bin("hs"));
    cmd.env("HOME", home)
        .env_remove("RUST_LOG")
        .env_remove("HUBSPOT_API_BASE_URL")
        .current_dir(home);
    cmd
}

fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("hubspot.config.yml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn help_lists_commands() {
    let temp = TempDir::new().unwrap();
    hs(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("accounts"))
        .stdout(predicate::str::contains("test-account"));
}

#[test]
fn accounts_list_shows_table() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), TWO_ACCOUNTS);

    hs(temp.path())
        .args(["accounts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sandbox"))
        .stdout(predicate::str::contains("456"));
}

#[test]
fn removing_last_account_keeps_the_file() {
    let temp = TempDir::new().unwrap();
    let config = write_config(
        temp.path(),
        "defaultPortal: solo\nportals:\n  - name: solo\n    portalId: 9\n    authType: apikey\n    apiKey: k\n",
    );

    hs(temp.path())
        .arg("--config")
        .arg(&config)
        .args(["accounts", "remove", "solo"])
        .assert()
        .success();

    let written = fs::read_to_string(&config).unwrap();
    assert!(written.contains("portals: []"), "got:\n{}", written);
    assert!(!written.contains("defaultPortal"));
}

#[test]
fn config_set_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), TWO_ACCOUNTS);

    let set = || {
        hs(temp.path())
            .args(["config", "set", "--default-cms-publish-mode=draft"])
            .assert()
            .success();
        fs::read_to_string(&config).unwrap()
    };

    let first = set();
    let second = set();
    assert_eq!(first, second);
    assert!(first.contains("defaultCmsPublishMode: draft"));
}

#[test]
fn unknown_account_fails_with_exit_code() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), TWO_ACCOUNTS);

    hs(temp.path())
        .args(["accounts", "use", "nope"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn override_file_round_trip() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), TWO_ACCOUNTS);

    hs(temp.path())
        .args(["accounts", "create-override", "sandbox"])
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(temp.path().join(".hsaccount")).unwrap().trim(),
        "sandbox"
    );

    hs(temp.path())
        .args(["accounts", "remove-override"])
        .assert()
        .success();
    assert!(!temp.path().join(".hsaccount").exists());
}

#[test]
fn create_scaffolds_without_config() {
    let temp = TempDir::new().unwrap();

    hs(temp.path())
        .args(["create", "module", "hero"])
        .assert()
        .success();
    assert!(temp.path().join("hero.module/meta.json").is_file());

    hs(temp.path())
        .args(["create", "function", "api", "--endpoint", "hello"])
        .assert()
        .success();
    let manifest = fs::read_to_string(temp.path().join("api.functions/serverless.json")).unwrap();
    assert!(manifest.contains("hello"));

    // same route twice is refused
    hs(temp.path())
        .args(["create", "function", "api", "--endpoint", "hello"])
        .assert()
        .failure();
}

#[test]
fn remove_accepts_account_flag() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), TWO_ACCOUNTS);

    hs(temp.path())
        .args(["accounts", "remove", "--account=sandbox"])
        .assert()
        .success();

    let written = fs::read_to_string(&config).unwrap();
    assert!(!written.contains("sandbox"), "got:\n{}", written);
    assert!(written.contains("prod"));
}

#[test]
fn hscms_binary_runs_the_same_cli() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), TWO_ACCOUNTS);

    Command::new(cargo_bin("hscms"))
        .env("HOME", temp.path())
        .current_dir(temp.path())
        .args(["accounts", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sandbox"));

    Command::new(cargo_bin("hscms"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: hscms"));
}
