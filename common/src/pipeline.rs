use anyhow::{Context, anyhow};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::instrument;

use crate::audit::{AuditEvent, AuditLog, EventCounts, EventKind, TaskId};
use crate::backoff::Backoff;
use crate::config::{PipelineConfig, TransactionMode};
use crate::destination::Destination;
use crate::item::Item;
use crate::source::{Source, SourceGuard};
use crate::{consumer, producer};

/// Error type for copy operations that preserves the summary gathered before the failure.
///
/// The Display implementation shows the full error chain.
#[derive(Debug, thiserror::Error)]
#[error("{source:#}")]
pub struct Error {
    #[source]
    pub source: anyhow::Error,
    pub summary: Summary,
}

impl Error {
    #[must_use]
    pub fn new(source: anyhow::Error, summary: Summary) -> Self {
        Error { source, summary }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct Summary {
    pub bytes_read: u64,
    pub bytes_written: u64,
    /// Reads that observed end-of-file, one per finished producer
    pub eof_probes: u64,
    pub events: EventCounts,
    /// Highest number of items the ring held at once
    pub ring_peak: usize,
    pub walltime: std::time::Duration,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        let mut events = self.events;
        for (kind, &count) in &other.events {
            events[kind] += count;
        }
        Self {
            bytes_read: self.bytes_read + other.bytes_read,
            bytes_written: self.bytes_written + other.bytes_written,
            eof_probes: self.eof_probes + other.eof_probes,
            events,
            ring_peak: std::cmp::max(self.ring_peak, other.ring_peak),
            walltime: std::cmp::max(self.walltime, other.walltime),
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bytes read: {}\n\
            bytes written: {}\n\
            eof probes: {}\n\
            read_byte events: {}\n\
            produce events: {}\n\
            consume events: {}\n\
            write_byte events: {}\n\
            ring peak occupancy: {}\n\
            walltime: {}",
            bytesize::ByteSize(self.bytes_read),
            bytesize::ByteSize(self.bytes_written),
            self.eof_probes,
            self.events[EventKind::ReadByte],
            self.events[EventKind::Produce],
            self.events[EventKind::Consume],
            self.events[EventKind::WriteByte],
            self.ring_peak,
            humantime::format_duration(self.walltime),
        )
    }
}

/// State shared by every producer and consumer of one copy.
#[derive(Debug)]
pub struct Shared {
    pub ring: bounded::RingBuffer<Item>,
    pub source: Source,
    pub destination: Destination,
    pub audit: AuditLog,
    pub backoff: Backoff,
    pub mode: TransactionMode,
    consumer_transaction: tokio::sync::Mutex<()>,
    producers_left: AtomicUsize,
}

/// Held by a running producer. The last one to be dropped closes the ring.
pub struct ProducerGuard<'a> {
    shared: &'a Shared,
}

impl Drop for ProducerGuard<'_> {
    fn drop(&mut self) {
        if self.shared.producers_left.fetch_sub(1, Ordering::AcqRel) == 1 {
            tracing::debug!("last producer finished, closing ring buffer");
            self.shared.ring.close();
        }
    }
}

impl Shared {
    pub fn new(
        config: &PipelineConfig,
        source: Source,
        destination: Destination,
        audit: AuditLog,
    ) -> Result<Self, bounded::Error> {
        Ok(Self {
            ring: bounded::RingBuffer::new(config.buffer_size)?,
            source,
            destination,
            audit,
            backoff: Backoff::new(config.max_delay),
            mode: config.transaction_mode,
            consumer_transaction: tokio::sync::Mutex::new(()),
            producers_left: AtomicUsize::new(config.producers),
        })
    }

    /// Registers a running producer. Every producer counted in the config must hold exactly one.
    pub fn producer_guard(&self) -> ProducerGuard<'_> {
        ProducerGuard { shared: self }
    }

    /// Keeps the source lock for the rest of the producer transaction in exclusive mode, and
    /// releases it right away in interleaved mode.
    pub fn producer_transaction<'a>(&self, source: SourceGuard<'a>) -> Option<SourceGuard<'a>> {
        match self.mode {
            TransactionMode::Exclusive => Some(source),
            TransactionMode::Interleaved => {
                drop(source);
                None
            }
        }
    }

    /// Waits for the consumer transaction lock, or returns `None` in interleaved mode.
    pub async fn consumer_transaction(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match self.mode {
            TransactionMode::Exclusive => Some(self.consumer_transaction.lock().await),
            TransactionMode::Interleaved => None,
        }
    }

    pub async fn record(&self, event: &AuditEvent, summary: &mut Summary) -> anyhow::Result<()> {
        self.audit.record(event).await?;
        summary.events[event.kind] += 1;
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    Continue,
    Done,
}

async fn join_tasks(
    tasks: &mut tokio::task::JoinSet<Result<Summary, Error>>,
    summary: &mut Summary,
) -> anyhow::Result<()> {
    while let Some(res) = tasks.join_next().await {
        match res.context("copy task panicked or was cancelled")? {
            Ok(task_summary) => *summary = *summary + task_summary,
            Err(error) => {
                *summary = *summary + error.summary;
                return Err(error.source);
            }
        }
    }
    Ok(())
}

/// Refuses to truncate the source by opening it again as the destination or the audit log.
async fn check_distinct(
    src: &std::path::Path,
    dst: &std::path::Path,
    log: &std::path::Path,
) -> anyhow::Result<()> {
    let Ok(src) = tokio::fs::canonicalize(src).await else {
        // a missing source is reported when it's opened
        return Ok(());
    };
    for (what, path) in [("destination", dst), ("audit log", log)] {
        let Ok(path) = tokio::fs::canonicalize(path).await else {
            continue;
        };
        if path == src {
            return Err(anyhow!("{} {:?} is the source file", what, path));
        }
    }
    Ok(())
}

/// Copies `src` to `dst` through the ring buffer, recording every event in the audit log at `log`.
#[instrument]
pub async fn copy(
    src: &std::path::Path,
    dst: &std::path::Path,
    log: &std::path::Path,
    config: &PipelineConfig,
) -> Result<Summary, Error> {
    let started = std::time::Instant::now();
    config
        .validate()
        .map_err(|msg| Error::new(anyhow!(msg), Default::default()))?;
    check_distinct(src, dst, log)
        .await
        .map_err(|err| Error::new(err, Default::default()))?;
    let source = Source::open(src)
        .await
        .map_err(|err| Error::new(err, Default::default()))?;
    let destination = Destination::create(dst)
        .await
        .map_err(|err| Error::new(err, Default::default()))?;
    let audit = AuditLog::create(log)
        .await
        .map_err(|err| Error::new(err, Default::default()))?;
    let shared = std::sync::Arc::new(
        Shared::new(config, source, destination, audit)
            .context("failed to set up ring buffer")
            .map_err(|err| Error::new(err, Default::default()))?,
    );
    // producers and consumers share one join set: a failed consumer must not leave producers
    // blocked on a full ring while we wait for them
    let mut tasks = tokio::task::JoinSet::new();
    for ordinal in 0..config.producers {
        tasks.spawn(producer::produce(shared.clone(), TaskId::producer(ordinal)));
    }
    for ordinal in 0..config.consumers {
        tasks.spawn(consumer::consume(shared.clone(), TaskId::consumer(ordinal)));
    }
    let mut summary = Summary::default();
    let joined = join_tasks(&mut tasks, &mut summary).await;
    summary.ring_peak = shared.ring.peak();
    if let Err(error) = joined {
        tasks.abort_all();
        if let Err(flush_error) = shared.audit.flush().await {
            tracing::error!("{:#}", flush_error);
        }
        summary.walltime = started.elapsed();
        return Err(Error::new(error, summary));
    }
    shared
        .audit
        .flush()
        .await
        .map_err(|err| Error::new(err, summary))?;
    summary.walltime = started.elapsed();
    tracing::info!(
        "copied {} bytes with {} producers and {} consumers",
        summary.bytes_written,
        config.producers,
        config.consumers
    );
    Ok(summary)
}
