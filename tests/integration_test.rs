use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn stickyboard_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stickyboard"));
    cmd.env_remove("STICKYBOARD_LOG");
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    stickyboard_cmd()
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap()
}

fn run_ok(dir: &Path, args: &[&str]) -> String {
    let output = run(dir, args);
    assert!(
        output.status.success(),
        "{:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn list_json(dir: &Path) -> Vec<serde_json::Value> {
    let stdout = run_ok(dir, &["list", "--json"]);
    serde_json::from_str(&stdout).unwrap()
}

fn add_json(dir: &Path, args: &[&str]) -> serde_json::Value {
    let mut full = vec!["add"];
    full.extend_from_slice(args);
    full.push("--json");
    serde_json::from_str(&run_ok(dir, &full)).unwrap()
}

fn id_prefix(note: &serde_json::Value) -> String {
    note["id"].as_str().unwrap()[..8].to_string()
}

#[test]
fn test_init_creates_board_directory() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["init"]);

    assert!(output.status.success());
    assert!(tmp.path().join(".stickyboard").exists());
    assert!(tmp.path().join(".stickyboard/board.loro").exists());
    assert!(tmp.path().join(".stickyboard/config.yaml").exists());
}

#[test]
fn test_init_twice_fails() {
    let tmp = TempDir::new().unwrap();
    run_ok(tmp.path(), &["init"]);

    let output = run(tmp.path(), &["init"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Already initialized"));
}

#[test]
fn test_add_without_init_fails() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["add", "buy milk"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Not in a stickyboard project"));
}

#[test]
fn test_add_blank_text_fails() {
    let tmp = TempDir::new().unwrap();
    run_ok(tmp.path(), &["init"]);

    let output = run(tmp.path(), &["add", "   "]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Note text is empty"));
    assert!(list_json(tmp.path()).is_empty());
}

#[test]
fn test_full_board_workflow() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    run_ok(dir, &["init"]);

    let milk = add_json(dir, &["buy milk"]);
    assert_eq!(milk["kind"], "text");
    assert_eq!(milk["content"], "buy milk");
    assert_eq!(milk["z_index"], 1);

    let mom = add_json(dir, &["call mom"]);
    assert_eq!(mom["z_index"], 2);

    let notes = list_json(dir);
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0]["id"], milk["id"]);
    assert_eq!(notes[1]["id"], mom["id"]);

    // Dragging picks the note up (to the front) and clamps to the surface.
    let stdout = run_ok(dir, &["move", &id_prefix(&milk), "5000", "5000"]);
    assert!(stdout.contains("Moved note"));
    let notes = list_json(dir);
    assert_eq!(notes[1]["id"], milk["id"]);
    assert_eq!(notes[1]["z_index"], 3);
    assert_eq!(notes[1]["position"]["x"], 1280.0 - 192.0 - 10.0);
    assert_eq!(notes[1]["position"]["y"], 800.0 - 192.0 - 10.0);

    run_ok(dir, &["move", &id_prefix(&milk), "-50", "-50"]);
    let notes = list_json(dir);
    assert_eq!(notes[1]["position"]["x"], 10.0);
    assert_eq!(notes[1]["position"]["y"], 10.0);

    let stdout = run_ok(dir, &["front", &id_prefix(&mom)]);
    assert!(stdout.contains("to front"));
    let notes = list_json(dir);
    assert_eq!(notes[1]["id"], mom["id"]);
    assert_eq!(notes[1]["z_index"], 4);

    let stdout = run_ok(dir, &["front", &id_prefix(&mom)]);
    assert!(stdout.contains("already in front"));

    run_ok(dir, &["delete", &id_prefix(&mom)]);
    let notes = list_json(dir);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["id"], milk["id"]);

    let stdout = run_ok(dir, &["list"]);
    assert!(stdout.contains("buy milk"));
}

#[test]
fn test_add_with_icon_creates_image_note() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    run_ok(dir, &["init"]);
    let icon = dir.join("cat.png");
    std::fs::write(&icon, [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]).unwrap();

    let note = add_json(dir, &["cat", "--icon", icon.to_str().unwrap()]);

    assert_eq!(note["kind"], "image");
    assert_eq!(note["status"], "saved");
    assert!(note["content"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[test]
fn test_export_and_merge_between_boards() {
    let alice = TempDir::new().unwrap();
    let bob = TempDir::new().unwrap();
    run_ok(alice.path(), &["init"]);
    run_ok(bob.path(), &["init"]);

    let alpha = add_json(alice.path(), &["alpha"]);
    add_json(bob.path(), &["beta"]);

    let snapshot = alice.path().join("alice.loro");
    let stdout = run_ok(alice.path(), &["export", snapshot.to_str().unwrap()]);
    assert!(stdout.contains("Exported 1 notes"));

    let stdout = run_ok(bob.path(), &["merge", snapshot.to_str().unwrap()]);
    assert!(stdout.contains("2 notes (was 1)"));

    let notes = list_json(bob.path());
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().any(|n| n["id"] == alpha["id"]));
}

#[test]
fn test_unknown_note_fails() {
    let tmp = TempDir::new().unwrap();
    run_ok(tmp.path(), &["init"]);

    let output = run(tmp.path(), &["delete", "deadbeef"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Note not found"));
}
