// this_file: tests/cli.rs
//! CLI integration tests for the glyphcache binary

use assert_cmd::prelude::*;
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("glyphcache").expect("binary exists");
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("GLYPHCACHE_CACHE_SIZE");
    cmd.env_remove("GLYPHCACHE_RENDER_FILTER");
    cmd
}

#[test]
fn test_cli_version_prints() {
    bin()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("glyphcache version"));
}

#[test]
fn test_cli_config_prints_defaults() {
    bin()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cache_size_log2\": 8"))
        .stdout(predicate::str::contains("\"render_filter\": \"default\""));
}

#[test]
fn test_cli_config_reads_file_and_env() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"cache_size_log2": 4, "render_filter": "light"}}"#).unwrap();

    bin()
        .args(["--config", file.path().to_str().unwrap(), "config"])
        .env("GLYPHCACHE_RENDER_FILTER", "none")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"cache_size_log2\": 4"))
        .stdout(predicate::str::contains("\"render_filter\": \"none\""));
}

#[test]
fn test_cli_rejects_unknown_config_keys() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"cache_size": 4}}"#).unwrap();

    bin()
        .args(["--config", file.path().to_str().unwrap(), "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_cli_render_missing_font_fails() {
    bin()
        .args(["render", "--font", "/nonexistent/font.ttf", "--text", "Hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load font"));
}

#[test]
fn test_cli_render_rejects_non_font() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"this is not a font file").unwrap();

    bin()
        .args(["-q", "render", "--font", file.path().to_str().unwrap(), "--text", "Hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid font file format"));
}
