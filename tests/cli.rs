//! Process-level checks of the `edward` binary.

use std::process::Command;

use tempfile::TempDir;

fn edward(dir: &TempDir) -> Command {
    let config = dir.path().join("edward.json");
    std::fs::write(
        &config,
        format!(r#"{{ "data_dir": {:?} }}"#, dir.path().display().to_string()),
    )
    .unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_edward"));
    cmd.arg("--config").arg(&config);
    for var in ["REDDIT_CLIENT_ID", "REDDIT_CLIENT_SECRET", "REDDIT_USERNAME", "REDDIT_PASSWORD", "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_reddit_without_credentials_names_the_variable() {
    let dir = TempDir::new().unwrap();
    let output = edward(&dir)
        .args(["--training", "reddit"])
        .env("REDDIT_CLIENT_ID", "id")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("export REDDIT_CLIENT_SECRET=''"), "stderr was: {stderr}");
    // Fails before the statement store is even opened.
    assert!(!dir.path().join("edward.db").exists());
}

#[test]
fn test_corpus_then_export() {
    let dir = TempDir::new().unwrap();
    let corpus = dir.path().join("corpus.json");
    let export = dir.path().join("export.json");
    std::fs::write(&corpus, r#"{"conversations": [["hello", "hi there"]]}"#).unwrap();

    let status = edward(&dir)
        .args(["--training", "corpus", "--corpus"])
        .arg(&corpus)
        .arg("--export")
        .arg(&export)
        .status()
        .unwrap();

    assert!(status.success());
    let written = std::fs::read_to_string(&export).unwrap();
    assert!(written.contains("hi there"));
}

#[test]
fn test_invalid_limit_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = edward(&dir).args(["--limit", "0"]).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("limit"));
}

#[test]
fn test_subreddit_with_path_characters_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = edward(&dir).args(["--subreddit", "all/../api"]).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("topic"));
}

#[test]
fn test_feedback_mode_reads_until_eof() {
    let dir = TempDir::new().unwrap();
    let output = edward(&dir)
        .args(["--training", "feedback"])
        .stdin(std::process::Stdio::null())
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Type something to begin..."));
}
