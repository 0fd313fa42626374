//! Audit log of every byte moved through the pipeline
//!
//! Each event is written as one line:
//!
//! ```text
//! <event> <kindTag><ordinal> O<offset> B<byteValue> I<index>
//! ```
//!
//! where `<index>` is the ring slot for `produce`/`consume` events and `-1` otherwise. Other
//! tooling parses these lines, so field order and the `-1` sentinel must not change.

use anyhow::{Context, Result, anyhow};
use enum_map::{Enum, EnumMap};
use tokio::io::AsyncWriteExt;

use crate::item::Item;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub enum EventKind {
    ReadByte,
    Produce,
    Consume,
    WriteByte,
}

impl EventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ReadByte => "read_byte",
            EventKind::Produce => "produce",
            EventKind::Consume => "consume",
            EventKind::WriteByte => "write_byte",
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read_byte" => Ok(EventKind::ReadByte),
            "produce" => Ok(EventKind::Produce),
            "consume" => Ok(EventKind::Consume),
            "write_byte" => Ok(EventKind::WriteByte),
            _ => Err(anyhow!("unknown audit event {:?}", s)),
        }
    }
}

pub type EventCounts = EnumMap<EventKind, u64>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    fn tag(&self) -> &'static str {
        match self {
            Role::Producer => "PT",
            Role::Consumer => "CT",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaskId {
    pub role: Role,
    pub ordinal: usize,
}

impl TaskId {
    #[must_use]
    pub fn producer(ordinal: usize) -> Self {
        Self {
            role: Role::Producer,
            ordinal,
        }
    }

    #[must_use]
    pub fn consumer(ordinal: usize) -> Self {
        Self {
            role: Role::Consumer,
            ordinal,
        }
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", self.role.tag(), self.ordinal)
    }
}

impl std::str::FromStr for TaskId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        let (role, ordinal) = if let Some(ordinal) = s.strip_prefix("PT") {
            (Role::Producer, ordinal)
        } else if let Some(ordinal) = s.strip_prefix("CT") {
            (Role::Consumer, ordinal)
        } else {
            return Err(anyhow!("unknown task tag in {:?}", s));
        };
        let ordinal = ordinal
            .parse()
            .with_context(|| format!("bad task ordinal in {:?}", s))?;
        Ok(Self { role, ordinal })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AuditEvent {
    pub kind: EventKind,
    pub task: TaskId,
    pub offset: i64,
    pub byte: u8,
    /// Ring slot index, only present for `produce` and `consume`
    pub index: Option<usize>,
}

impl AuditEvent {
    #[must_use]
    pub fn read_byte(task: TaskId, offset: i64, byte: u8) -> Self {
        Self {
            kind: EventKind::ReadByte,
            task,
            offset,
            byte,
            index: None,
        }
    }

    #[must_use]
    pub fn produce(task: TaskId, item: &Item, index: usize) -> Self {
        Self {
            kind: EventKind::Produce,
            task,
            offset: item.offset,
            byte: item.byte,
            index: Some(index),
        }
    }

    #[must_use]
    pub fn consume(task: TaskId, item: &Item, index: usize) -> Self {
        Self {
            kind: EventKind::Consume,
            task,
            offset: item.offset,
            byte: item.byte,
            index: Some(index),
        }
    }

    #[must_use]
    pub fn write_byte(task: TaskId, item: &Item) -> Self {
        Self {
            kind: EventKind::WriteByte,
            task,
            offset: item.offset,
            byte: item.byte,
            index: None,
        }
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {} O{} B{} I",
            self.kind.as_str(),
            self.task,
            self.offset,
            self.byte
        )?;
        match self.index {
            Some(index) => write!(f, "{}", index),
            None => write!(f, "-1"),
        }
    }
}

fn field<'a>(
    parts: &mut std::str::SplitWhitespace<'a>,
    prefix: &str,
    line: &str,
) -> Result<&'a str> {
    parts
        .next()
        .and_then(|part| part.strip_prefix(prefix))
        .with_context(|| format!("missing {:?} field in audit line {:?}", prefix, line))
}

impl std::str::FromStr for AuditEvent {
    type Err = anyhow::Error;
    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let kind = field(&mut parts, "", line)?.parse()?;
        let task = field(&mut parts, "", line)?.parse()?;
        let offset = field(&mut parts, "O", line)?
            .parse()
            .with_context(|| format!("bad offset in audit line {:?}", line))?;
        let byte = field(&mut parts, "B", line)?
            .parse()
            .with_context(|| format!("bad byte value in audit line {:?}", line))?;
        let index = match field(&mut parts, "I", line)? {
            "-1" => None,
            index => Some(
                index
                    .parse()
                    .with_context(|| format!("bad slot index in audit line {:?}", line))?,
            ),
        };
        if parts.next().is_some() {
            return Err(anyhow!("trailing fields in audit line {:?}", line));
        }
        Ok(Self {
            kind,
            task,
            offset,
            byte,
            index,
        })
    }
}

/// Buffered, append-only audit log shared by all tasks.
#[derive(Debug)]
pub struct AuditLog {
    log: tokio::sync::Mutex<tokio::io::BufWriter<tokio::fs::File>>,
}

impl AuditLog {
    /// Creates (or truncates) the log file at `path`.
    pub async fn create(path: &std::path::Path) -> Result<Self> {
        let log_file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("failed to open log file: {:?}", path))?;
        Ok(Self {
            log: tokio::sync::Mutex::new(tokio::io::BufWriter::new(log_file)),
        })
    }

    pub async fn record(&self, event: &AuditEvent) -> Result<()> {
        let line = format!("{}\n", event);
        let mut log = self.log.lock().await;
        log.write_all(line.as_bytes())
            .await
            .context("failed to write to log file")
    }

    pub async fn flush(&self) -> Result<()> {
        let mut log = self.log.lock().await;
        log.flush().await.context("failed to flush log file")
    }
}
