use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn projgrep(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("projgrep").unwrap();
    cmd.env("NO_COLOR", "1")
        .arg("--config")
        .arg(config_dir.join("config.toml"));
    cmd
}

fn sample_tree() -> TempDir {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("shop/src")).unwrap();
    fs::write(
        root.path().join("shop/src/cart.js"),
        "const total = a | b;\n// pattern here\n",
    )
    .unwrap();
    fs::write(root.path().join("shop/logo.png"), "pattern").unwrap();
    fs::write(root.path().join("readme.txt"), "pattern at the top\n").unwrap();
    root
}

#[test]
fn search_writes_markdown_report() -> Result<(), Box<dyn std::error::Error>> {
    let root = sample_tree();
    let out = TempDir::new()?;
    let cfg = TempDir::new()?;

    projgrep(cfg.path())
        .arg("search")
        .arg("pattern")
        .arg("--root")
        .arg(root.path())
        .arg("--output-dir")
        .arg(out.path())
        .arg("--no-progress")
        .assert()
        .success()
        .stdout(predicate::str::contains("Search complete"))
        .stdout(predicate::str::contains("Matching lines: 2"));

    let reports: Vec<_> = fs::read_dir(out.path())?.collect::<Result<_, _>>()?;
    assert_eq!(reports.len(), 1);
    let name = reports[0].file_name().to_string_lossy().into_owned();
    assert!(name.starts_with("search_results_pattern_"));
    assert!(name.ends_with(".md"));

    let report = fs::read_to_string(reports[0].path())?;
    assert!(report.contains("| shop | cart.js | .js | 2 | // pattern here |"));
    assert!(report.contains("| unknown | readme.txt | .txt | 1 | pattern at the top |"));
    assert!(!report.contains("logo.png"));
    Ok(())
}

#[test]
fn custom_mode_with_json_report() -> Result<(), Box<dyn std::error::Error>> {
    let root = sample_tree();
    let out = TempDir::new()?;
    let cfg = TempDir::new()?;

    projgrep(cfg.path())
        .args(["search", "total", "--mode", "custom", "--extensions", "JS"])
        .arg("--root")
        .arg(root.path())
        .arg("--output-dir")
        .arg(out.path())
        .args(["--format", "json", "--no-progress", "--jobs", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Files searched: 1"));

    let report = fs::read_dir(out.path())?.next().unwrap()?.path();
    assert_eq!(report.extension().unwrap(), "json");
    let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(report)?)?;
    assert_eq!(parsed[0]["content"], "const total = a | b;");
    Ok(())
}

#[test]
fn blank_query_is_rejected() {
    let cfg = TempDir::new().unwrap();
    projgrep(cfg.path())
        .args(["search", "   ", "--no-progress"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be empty"));
}

#[test]
fn unwritable_output_dir_fails_the_search() {
    let root = sample_tree();
    let out = TempDir::new().unwrap();
    let blocker = out.path().join("plain-file");
    fs::write(&blocker, "").unwrap();
    let cfg = TempDir::new().unwrap();

    projgrep(cfg.path())
        .arg("search")
        .arg("pattern")
        .arg("--root")
        .arg(root.path())
        .arg("--output-dir")
        .arg(blocker.join("reports"))
        .arg("--no-progress")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Search failed"));
}

#[test]
fn config_set_root_persists() {
    let root = sample_tree();
    let cfg = TempDir::new().unwrap();
    let canonical = root.path().canonicalize().unwrap();

    projgrep(cfg.path())
        .args(["config", "set-root"])
        .arg(root.path())
        .assert()
        .success();

    projgrep(cfg.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(canonical.to_string_lossy().into_owned()));

    let out = TempDir::new().unwrap();
    projgrep(cfg.path())
        .args(["search", "pattern", "--no-progress", "--output-dir"])
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Matching files: 2"));
}

#[test]
fn completions_are_generated() {
    let cfg = TempDir::new().unwrap();
    projgrep(cfg.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("projgrep"));
}
