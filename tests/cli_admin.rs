// Drives the non-interactive subcommands of the compiled binary.

use assert_cmd::Command;
use tempfile::{tempdir, TempDir};

fn cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("escaperoom").unwrap();
    cmd.env("HOME", dir.path())
        .env("RUST_LOG", "warn")
        .arg("--config")
        .arg(dir.path().join("config.json"))
        .arg("--db")
        .arg(dir.path().join("ledger.db"));
    cmd
}

fn stdout(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn leaderboard_ranks_seeded_baseline() {
    let dir = tempdir().unwrap();
    let out = stdout(cmd(&dir).args(["leaderboard", "--json"]));
    let board: serde_json::Value = serde_json::from_str(&out).unwrap();
    let board = board.as_array().unwrap();

    assert_eq!(board.len(), 5);
    assert_eq!(board[0]["team"], "Team Alpha");
    assert_eq!(board[0]["missions_completed"], 4);
    assert_eq!(board[0]["total_points"], 6.0);
    assert_eq!(board[0]["total_time_secs"], 555);
    assert_eq!(board[4]["team"], "Audit Squad");
}

#[test]
fn admin_add_edit_delete() {
    let dir = tempdir().unwrap();

    stdout(cmd(&dir).args([
        "admin", "add", "--team", "Audit Squad", "--mission", "Mission 2", "--points", "3",
    ]));
    let list = stdout(cmd(&dir).args(["admin", "list"]));
    assert_eq!(list.lines().count(), 13);
    assert!(list.lines().last().unwrap().contains("Bonus"));

    let out = stdout(cmd(&dir).args(["leaderboard", "--json"]));
    let board: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(board[1]["team"], "Audit Squad");
    assert_eq!(board[1]["total_points"], 3.5);
    assert_eq!(board[1]["missions_completed"], 1);

    stdout(cmd(&dir).args(["admin", "edit", "12", "--points", "0.5"]));
    stdout(cmd(&dir).args(["admin", "delete", "0"]));

    let out = stdout(cmd(&dir).args(["leaderboard", "--json"]));
    let board: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(board[0]["team"], "Team Alpha");
    assert_eq!(board[0]["total_points"], 4.0);
}

#[test]
fn admin_rejects_bad_input() {
    let dir = tempdir().unwrap();
    cmd(&dir)
        .args(["admin", "add", "--team", "X", "--mission", "Mx", "--points", "1"])
        .assert()
        .failure();
    cmd(&dir)
        .args(["admin", "add", "--team", " ", "--mission", "1", "--points", "1"])
        .assert()
        .failure();
    cmd(&dir).args(["admin", "delete", "99"]).assert().failure();
    cmd(&dir).args(["admin", "reset"]).assert().failure();

    let list = stdout(cmd(&dir).args(["admin", "list"]));
    assert_eq!(list.lines().count(), 12);
}

#[test]
fn export_then_import_restores_ledger() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("backup.csv");

    stdout(cmd(&dir).arg("admin").arg("export").arg(&csv));
    stdout(cmd(&dir).args(["admin", "delete", "0"]));
    stdout(cmd(&dir).arg("admin").arg("import").arg(&csv));

    let list = stdout(cmd(&dir).args(["admin", "list"]));
    assert_eq!(list.lines().count(), 12);
    assert!(list.lines().next().unwrap().contains("Bonus"));

    let json = stdout(cmd(&dir).args(["admin", "export", "-"]));
    let records: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 12);
}

#[test]
fn import_refuses_invalid_file_and_keeps_ledger() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("bad.csv");
    std::fs::write(
        &csv,
        "training_code,team,mission_id,mission_name,action,points,time_taken_secs,timestamp,evidence_file_name\n\
         T1,Alpha,1,M01,Submission,1.0,100,2026-01-04T09:00:00,a.xlsx\n\
         T1,   ,0,M00,Submission,NaN,0,2026-01-04T09:00:00,\n",
    )
    .unwrap();

    let before = stdout(cmd(&dir).args(["admin", "list"]));
    let output = cmd(&dir).arg("admin").arg("import").arg(&csv).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("InvalidRow"));

    assert_eq!(stdout(cmd(&dir).args(["admin", "list"])), before);
}

#[test]
fn first_run_writes_default_config() {
    let dir = tempdir().unwrap();
    stdout(cmd(&dir).arg("missions"));
    let text = std::fs::read_to_string(dir.path().join("config.json")).unwrap();
    let config: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(config["overtime_grace_secs"], 120);
}

#[test]
fn reset_with_confirmation() {
    let dir = tempdir().unwrap();
    stdout(cmd(&dir).args(["admin", "delete", "0"]));
    stdout(cmd(&dir).args(["admin", "reset", "--yes"]));
    let list = stdout(cmd(&dir).args(["admin", "list"]));
    assert_eq!(list.lines().count(), 12);
}

#[test]
fn missions_lists_catalog() {
    let dir = tempdir().unwrap();
    let out = stdout(cmd(&dir).arg("missions"));
    assert_eq!(out.lines().count(), 5);
    assert!(out.starts_with("M01"));
}
