//! Exit statuses and console output of the two binaries

mod common;

use common::{alice_session, archive_bytes, scratch_dir, write_file};
use std::fs;
use std::process::Command;

#[test]
fn test_usage_without_argument() {
    let output = Command::new(env!("CARGO_BIN_EXE_worldpicker"))
        .output()
        .expect("Failed to run worldpicker");
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
}

#[test]
fn test_missing_file_exit_status() {
    let dir = scratch_dir("cli-missing");
    let output = Command::new(env!("CARGO_BIN_EXE_worldpicker"))
        .arg(dir.join("nope.archipelago"))
        .output()
        .expect("Failed to run worldpicker");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("file not found"));
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_successful_run() {
    let dir = scratch_dir("cli-ok");
    let input = write_file(&dir, "run.archipelago", &archive_bytes(1, &alice_session()));
    let output = Command::new(env!("CARGO_BIN_EXE_worldpicker"))
        .arg(&input)
        .output()
        .expect("Failed to run worldpicker");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("SUCCESS: Report generated"));
    assert!(dir.join("run_spheres_readable.txt").exists());
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_archive_dump_binary() {
    let dir = scratch_dir("cli-dump");
    let input = write_file(&dir, "dump.archipelago", &archive_bytes(2, &alice_session()));
    let output = Command::new(env!("CARGO_BIN_EXE_archive-dump"))
        .arg(&input)
        .output()
        .expect("Failed to run archive-dump");
    assert!(output.status.success());
    assert!(dir.join("dump.archipelago.raw.pickle").exists());
    assert!(dir.join("dump.archipelago.decoded.txt").exists());
    assert!(dir.join("dump_spheres_readable.txt").exists());
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_archive_dump_reports_unwritten_side_outputs() {
    let dir = scratch_dir("cli-dump-blocked");
    let input = write_file(&dir, "held.archipelago", &archive_bytes(1, &alice_session()));
    fs::create_dir_all(dir.join("held.archipelago.raw.pickle")).unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_archive-dump"))
        .arg(&input)
        .output()
        .expect("Failed to run archive-dump");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Raw stream:    not written (see log)"));
    assert!(stdout.contains("held.archipelago.decoded.txt"));
    assert!(dir.join("held_spheres_readable.txt").exists());
    fs::remove_dir_all(&dir).unwrap();
}
