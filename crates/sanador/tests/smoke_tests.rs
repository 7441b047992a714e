//! Smoke tests for sanador CLI
//!
//! These tests verify basic CLI functionality works correctly.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the sanador binary, isolated in `dir`
fn sanador(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sanador").expect("sanador binary should exist");
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    sanador(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    sanador(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("store"))
        .stdout(predicate::str::contains("repair-check"));
}

#[test]
fn test_no_args_shows_help() {
    let dir = TempDir::new().unwrap();
    sanador(&dir).assert().failure(); // Requires a subcommand
}

// ============================================================================
// Repair Tests
// ============================================================================

#[test]
fn test_repair_check_accepts_and_normalizes() {
    let dir = TempDir::new().unwrap();
    sanador(&dir)
        .args([
            "repair-check",
            "await page.getByRole('button',{name:'Submit'}).click();",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "await page.getByRole('button', { name: 'Submit' }).click();",
        ));
}

#[test]
fn test_repair_check_rejects_arbitrary_code() {
    let dir = TempDir::new().unwrap();
    sanador(&dir)
        .args(["repair-check", "require('fs').rmSync('/')"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_patch_rewrites_one_line() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("checkout.spec.ts");
    fs::write(
        &file,
        "test('buy', async ({ page }) => {\n    await page.click('#submit-old');\n});\n",
    )
    .unwrap();

    sanador(&dir)
        .args([
            "patch",
            "checkout.spec.ts",
            "--line",
            "2",
            "--code",
            "await page.getByRole('button', { name: 'Submit' }).click();",
        ])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        "test('buy', async ({ page }) => {\n    await page.getByRole('button', { name: 'Submit' }).click();\n});\n"
    );
}

#[test]
fn test_patch_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    sanador(&dir)
        .args(["patch", "nope.spec.ts", "-l", "1", "--code", "await page.click('#a');"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

// ============================================================================
// Store and Log Tests
// ============================================================================

#[test]
fn test_store_list_empty() {
    let dir = TempDir::new().unwrap();
    sanador(&dir)
        .args(["store", "--path", "heal.json", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Heal store is empty"));
}

#[test]
fn test_store_list_reads_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("heal.json"),
        r#"{"click|log in":{"type":"role","role":"button","name":"log in"}}"#,
    )
    .unwrap();
    sanador(&dir)
        .args(["store", "--path", "heal.json", "list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"click|log in\""));
}

#[test]
fn test_log_show_empty() {
    let dir = TempDir::new().unwrap();
    sanador(&dir)
        .args(["log", "--path", "healed.json", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No healed steps recorded"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("sanar.yaml"), "page_ident: \"not an ident\"\n").unwrap();
    sanador(&dir)
        .args(["store", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("page_ident"));
}
