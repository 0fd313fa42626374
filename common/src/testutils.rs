use crate::audit::{AuditEvent, EventKind};

pub struct Scratch {
    _dir: tempfile::TempDir,
    pub src: std::path::PathBuf,
    pub dst: std::path::PathBuf,
    pub log: std::path::PathBuf,
}

/// Creates a temporary directory holding a source file with `contents`.
pub async fn setup_source(contents: &[u8]) -> anyhow::Result<Scratch> {
    let dir = tempfile::tempdir()?;
    let src = dir.path().join("src.bin");
    tokio::fs::write(&src, contents).await?;
    Ok(Scratch {
        src,
        dst: dir.path().join("dst.bin"),
        log: dir.path().join("audit.log"),
        _dir: dir,
    })
}

/// Deterministic bytes cycling through a prime-sized alphabet so neighbouring offsets differ.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

pub async fn read_audit(path: &std::path::Path) -> anyhow::Result<Vec<AuditEvent>> {
    let contents = tokio::fs::read_to_string(path).await?;
    contents.lines().map(str::parse).collect()
}

/// Checks that every source byte shows up exactly once per event kind with matching values, and
/// that each producer logged exactly one end-of-file probe.
///
/// With `ordered`, also checks that the events of each byte appear in pipeline order.
pub fn check_audit(
    events: &[AuditEvent],
    source: &[u8],
    producers: usize,
    ordered: bool,
) {
    let len = source.len();
    let mut seen = vec![[0usize; 4]; len + 1];
    let mut first_seen = vec![[usize::MAX; 4]; len + 1];
    for (line, event) in events.iter().enumerate() {
        let offset = usize::try_from(event.offset).expect("negative offset in audit log");
        assert!(offset <= len, "offset {} past the source end", offset);
        let kind = event.kind as usize;
        seen[offset][kind] += 1;
        first_seen[offset][kind] = first_seen[offset][kind].min(line);
        if offset > 0 && event.kind != EventKind::ReadByte {
            assert_eq!(event.byte, source[offset - 1], "wrong byte in {}", event);
        }
        match event.kind {
            EventKind::Produce | EventKind::Consume => assert!(event.index.is_some()),
            EventKind::ReadByte | EventKind::WriteByte => assert!(event.index.is_none()),
        }
    }
    for (offset, counts) in seen.iter().enumerate().skip(1) {
        let expected_reads = if offset == len { 1 + producers } else { 1 };
        assert_eq!(
            counts[EventKind::ReadByte as usize],
            expected_reads,
            "reads of offset {}",
            offset
        );
        for (kind, what) in [
            (EventKind::Produce, "produces"),
            (EventKind::Consume, "consumes"),
            (EventKind::WriteByte, "writes"),
        ] {
            assert_eq!(counts[kind as usize], 1, "{} of offset {}", what, offset);
        }
        if ordered {
            let first = first_seen[offset];
            assert!(
                first[EventKind::ReadByte as usize] < first[EventKind::Produce as usize]
                    && first[EventKind::Produce as usize] < first[EventKind::Consume as usize]
                    && first[EventKind::Consume as usize] < first[EventKind::WriteByte as usize],
                "events of offset {} out of order: {:?}",
                offset,
                first
            );
        }
    }
    let reads = events
        .iter()
        .filter(|event| event.kind == EventKind::ReadByte)
        .count();
    assert_eq!(reads, len + producers);
    if len == 0 {
        assert_eq!(seen[0][EventKind::ReadByte as usize], producers);
    }
}
