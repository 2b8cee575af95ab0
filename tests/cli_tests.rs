//! Integration tests for the CLI interface

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn roomsweep(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("roomsweep").unwrap();
    cmd.current_dir(temp.path())
        .env_remove("ROOMSWEEP_ACCESS_TOKEN")
        .env_remove("ROOMSWEEP_HOMESERVER_URL")
        .env_remove("ROOMSWEEP_DATA_DIR")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help_flag() {
    let temp = TempDir::new().unwrap();
    roomsweep(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("find-bad-events"))
        .stdout(predicate::str::contains("collate-bad-servers"))
        .stdout(predicate::str::contains("find-bulk-spam"))
        .stdout(predicate::str::contains("redact"));
}

#[test]
fn test_fetch_help_lists_flags() {
    let temp = TempDir::new().unwrap();
    roomsweep(&temp)
        .args(["fetch", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--room-id"))
        .stdout(predicate::str::contains("--stop-date"))
        .stdout(predicate::str::contains("--resume"))
        .stdout(predicate::str::contains("--flush-interval"));
}

#[test]
fn test_invalid_pattern_exits_with_config_code() {
    let temp = TempDir::new().unwrap();
    roomsweep(&temp)
        .args(["find-bad-events", "--room-id", "!r:example.org", "--grep", "(unclosed"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_fetch_without_homeserver_exits_with_config_code() {
    let temp = TempDir::new().unwrap();
    roomsweep(&temp)
        .args(["fetch", "--room-id", "!r:example.org"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No homeserver URL"));
}

#[test]
fn test_zero_limit_exits_with_config_code() {
    let temp = TempDir::new().unwrap();
    roomsweep(&temp)
        .args([
            "fetch",
            "--homeserver-url",
            "http://127.0.0.1:9",
            "--room-id",
            "!r:example.org",
            "--limit",
            "0",
        ])
        .assert()
        .code(2);
}

#[test]
fn test_resume_without_checkpoint_exits_with_checkpoint_code() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");
    roomsweep(&temp)
        .arg("--data-dir")
        .arg(&data_dir)
        .args([
            "fetch",
            "--homeserver-url",
            "http://127.0.0.1:9",
            "--room-id",
            "!r:example.org",
            "--resume",
        ])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("no resume checkpoint"));
}

#[test]
fn test_corrupt_checkpoint_exits_with_checkpoint_code() {
    let temp = TempDir::new().unwrap();
    let messages = temp.path().join("data").join("!r_example.org").join("messages");
    std::fs::create_dir_all(&messages).unwrap();
    std::fs::write(messages.join("resume.json"), "{not json").unwrap();

    roomsweep(&temp)
        .args([
            "fetch",
            "--homeserver-url",
            "http://127.0.0.1:9",
            "--room-id",
            "!r:example.org",
            "--resume",
        ])
        .assert()
        .code(3);
}

#[test]
fn test_find_bad_events_and_collate_from_data_dir() {
    let temp = TempDir::new().unwrap();
    let messages = temp.path().join("data").join("!r_example.org").join("messages");
    std::fs::create_dir_all(&messages).unwrap();
    std::fs::write(
        messages.join("start_a__end_b.ndjson"),
        concat!(
            r#"{"event_id":"$1","type":"m.room.message","sender":"@s:spam.example","content":{"body":"SPAM here"}}"#,
            "\n",
            r#"{"event_id":"$2","type":"m.room.message","sender":"@a:example.org","content":{"body":"hi"}}"#,
            "\n"
        ),
    )
    .unwrap();

    roomsweep(&temp)
        .args(["find-bad-events", "--room-id", "!r:example.org", "--grep", "spam"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 bad events from 1 senders"));

    roomsweep(&temp)
        .args(["collate-bad-servers", "--room-id", "!r:example.org"])
        .assert()
        .success()
        .stdout(predicate::str::contains("into 1 servers"));

    let room_dir = temp.path().join("data").join("!r_example.org");
    let servers: Vec<_> = std::fs::read_dir(&room_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with("bad-servers-"))
        .collect();
    assert_eq!(servers.len(), 1);
    assert_eq!(
        std::fs::read_to_string(room_dir.join(&servers[0])).unwrap(),
        "spam.example\n"
    );
}

#[test]
fn test_config_file_supplies_data_dir() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("roomsweep.toml"),
        "data_dir = \"archive\"\n",
    )
    .unwrap();

    // nothing fetched into ./archive yet
    roomsweep(&temp)
        .args(["collate-bad-servers", "--room-id", "!r:example.org"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("archive"));
}
