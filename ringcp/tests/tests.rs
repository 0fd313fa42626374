use assert_cmd::Command;
use common::audit::{AuditEvent, EventKind};
use predicates::prelude::*;
use tempfile::tempdir;

struct Files {
    _dir: tempfile::TempDir,
    src: std::path::PathBuf,
    dst: std::path::PathBuf,
    log: std::path::PathBuf,
}

fn setup(contents: &[u8]) -> Files {
    let dir = tempdir().unwrap();
    let src = dir.path().join("source");
    std::fs::write(&src, contents).unwrap();
    Files {
        src,
        dst: dir.path().join("copy"),
        log: dir.path().join("copy.log"),
        _dir: dir,
    }
}

fn ringcp(n_in: &str, n_out: &str, files: &Files, buffer_size: &str) -> Command {
    let mut cmd = Command::cargo_bin("ringcp").unwrap();
    cmd.arg(n_in)
        .arg(n_out)
        .arg(&files.src)
        .arg(&files.dst)
        .arg(buffer_size)
        .arg(&files.log)
        .args(["--max-delay", "0s"]);
    cmd
}

fn audit(files: &Files) -> Vec<AuditEvent> {
    std::fs::read_to_string(&files.log)
        .unwrap()
        .lines()
        .map(|line| line.parse().unwrap())
        .collect()
}

#[test]
fn check_ringcp_help() {
    let mut cmd = Command::cargo_bin("ringcp").unwrap();
    cmd.arg("--help").assert();
}

#[test]
fn copies_two_bytes_and_logs_every_step() {
    let files = setup(b"AB");
    ringcp("1", "1", &files, "4").assert().success();
    assert_eq!(std::fs::read(&files.dst).unwrap(), b"AB");
    let log = std::fs::read_to_string(&files.log).unwrap();
    assert!(log.lines().all(|line| {
        let fields: Vec<_> = line.split(' ').collect();
        fields.len() == 5
            && fields[2].starts_with('O')
            && fields[3].starts_with('B')
            && fields[4].starts_with('I')
    }));
    assert!(log.contains("read_byte PT0 O1 B65 I-1\n"));
    assert!(log.contains("produce PT0 O1 B65 I1\n"));
    assert!(log.contains("consume CT0 O1 B65 I1\n"));
    assert!(log.contains("write_byte CT0 O1 B65 I-1\n"));
    assert!(log.contains("write_byte CT0 O2 B66 I-1\n"));
    let events = audit(&files);
    for offset in [1, 2] {
        for kind in [
            EventKind::ReadByte,
            EventKind::Produce,
            EventKind::Consume,
            EventKind::WriteByte,
        ] {
            let count = events
                .iter()
                .filter(|event| event.byte != 255)
                .filter(|event| event.offset == offset && event.kind == kind)
                .count();
            assert_eq!(count, 1, "{:?} of offset {}", kind, offset);
        }
    }
    // 8 data events plus the end-of-file probe of the single producer
    assert_eq!(events.len(), 9);
}

#[test]
fn empty_source_logs_one_probe_per_producer() {
    let files = setup(b"");
    ringcp("3", "2", &files, "4").assert().success();
    assert!(std::fs::read(&files.dst).unwrap().is_empty());
    let events = audit(&files);
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|event| event.kind == EventKind::ReadByte));
}

#[test]
fn four_producers_one_consumer_tiny_buffer() {
    let source: Vec<u8> = (0..100).collect();
    let files = setup(&source);
    ringcp("4", "1", &files, "2").assert().success();
    assert_eq!(std::fs::read(&files.dst).unwrap(), source);
    let events = audit(&files);
    for kind in [EventKind::Produce, EventKind::Consume, EventKind::WriteByte] {
        let mut offsets: Vec<_> = events
            .iter()
            .filter(|event| event.kind == kind)
            .map(|event| event.offset)
            .collect();
        offsets.sort_unstable();
        assert_eq!(offsets, (1..=100).collect::<Vec<i64>>());
    }
    // the ring holds 2 items in 3 slots, so slot indices never leave 0..=2
    assert!(
        events
            .iter()
            .filter_map(|event| event.index)
            .all(|index| index <= 2)
    );
}

#[test]
fn interleaved_mode_with_pauses() {
    let source: Vec<u8> = (0..500).map(|i| (i % 256) as u8).collect();
    let files = setup(&source);
    let mut cmd = Command::cargo_bin("ringcp").unwrap();
    cmd.arg("3")
        .arg("3")
        .arg(&files.src)
        .arg(&files.dst)
        .arg("5")
        .arg(&files.log)
        .args(["--max-delay", "20us", "--transaction-mode", "interleaved"])
        .assert()
        .success();
    assert_eq!(std::fs::read(&files.dst).unwrap(), source);
}

#[test]
fn summary_is_printed_on_request() {
    let files = setup(b"hello");
    ringcp("2", "2", &files, "3")
        .arg("--summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("bytes written: 5"))
        .stdout(predicate::str::contains("eof probes: 2"));
}

#[test]
fn wrong_argument_count_fails_before_any_io() {
    let files = setup(b"data");
    let mut cmd = Command::cargo_bin("ringcp").unwrap();
    cmd.arg("1")
        .arg("1")
        .arg(&files.src)
        .arg(&files.dst)
        .arg("4")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
    assert!(!files.dst.exists());
    assert!(!files.log.exists());
}

#[test]
fn too_many_arguments_fail() {
    let files = setup(b"data");
    ringcp("1", "1", &files, "4")
        .arg("extra")
        .assert()
        .failure()
        .code(2);
    assert!(!files.dst.exists());
}

#[test]
fn zero_tasks_or_buffer_are_rejected() {
    for (n_in, n_out, buffer_size) in [("0", "1", "1"), ("1", "0", "1"), ("1", "1", "0")] {
        let files = setup(b"data");
        ringcp(n_in, n_out, &files, buffer_size)
            .assert()
            .failure()
            .code(2);
        assert!(!files.dst.exists());
    }
}

#[test]
fn missing_source_is_reported() {
    let files = setup(b"");
    std::fs::remove_file(&files.src).unwrap();
    ringcp("1", "1", &files, "1")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("source"));
    assert!(!files.dst.exists());
}

#[test]
fn quiet_suppresses_error_output() {
    let files = setup(b"");
    std::fs::remove_file(&files.src).unwrap();
    ringcp("1", "1", &files, "1")
        .arg("--quiet")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::is_empty());
}
