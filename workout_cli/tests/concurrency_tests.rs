//! Concurrency tests for the workout binary.
//!
//! These tests verify that multiple processes sharing one store file:
//! - Never lose each other's workouts
//! - Cannot both claim the same title
//! - Leave the store as valid JSON

use assert_cmd::Command;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::TempDir;

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("workout").expect("Failed to find workout binary");
    cmd.env("XDG_CONFIG_HOME", dir.join("config"))
        .env("HOME", dir)
        .arg("--store")
        .arg(dir.join("store.json"))
        .arg("--user")
        .arg("tester");
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn workouts(dir: &Path) -> serde_json::Map<String, Value> {
    let contents = std::fs::read_to_string(dir.join("store.json")).expect("Failed to read store");
    let store: Value = serde_json::from_str(&contents).expect("Store is not valid JSON");
    store["users"]["tester"]["workouts"]
        .as_object()
        .cloned()
        .unwrap_or_default()
}

#[test]
fn test_parallel_creates_all_persist() {
    let temp_dir = setup_test_dir();
    let dir: PathBuf = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let dir = dir.clone();
            thread::spawn(move || {
                cli(&dir)
                    .args(["create", "--title", &format!("Workout {}", i)])
                    .args(["--exercise", "push_up"])
                    .output()
                    .expect("Failed to run workout")
            })
        })
        .collect();

    for handle in handles {
        let output = handle.join().unwrap();
        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let saved = workouts(&dir);
    assert_eq!(saved.len(), 6, "Expected 6 workouts, got {:?}", saved.keys());
}

#[test]
fn test_parallel_same_title_single_winner() {
    let temp_dir = setup_test_dir();
    let dir: PathBuf = temp_dir.path().to_path_buf();

    let handles: Vec<_> = ["back_squat", "deadlift", "lunge", "plank"]
        .into_iter()
        .map(|exercise| {
            let dir = dir.clone();
            thread::spawn(move || {
                cli(&dir)
                    .args(["create", "--title", "Legs", "--exercise", exercise])
                    .output()
                    .expect("Failed to run workout")
            })
        })
        .collect();

    let outputs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = outputs.iter().filter(|o| o.status.success()).count();
    assert_eq!(winners, 1);

    for output in outputs.iter().filter(|o| !o.status.success()) {
        assert!(String::from_utf8_lossy(&output.stderr).contains("That title is already used"));
    }

    let saved = workouts(&dir);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved["Legs"]["exercises"].as_array().unwrap().len(), 1);
}

#[test]
fn test_reads_during_writes() {
    let temp_dir = setup_test_dir();
    let dir: PathBuf = temp_dir.path().to_path_buf();

    cli(&dir)
        .args(["create", "--title", "Base", "--exercise", "dip"])
        .assert()
        .success();

    let writer = {
        let dir = dir.clone();
        thread::spawn(move || {
            for i in 0..4 {
                cli(&dir)
                    .args(["create", "--title", &format!("Extra {}", i)])
                    .args(["--exercise", "plank"])
                    .assert()
                    .success();
            }
        })
    };

    for _ in 0..4 {
        cli(&dir).arg("list").assert().success();
    }
    writer.join().unwrap();

    assert_eq!(workouts(&dir).len(), 5);
}
