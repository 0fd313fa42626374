use anyhow::Context;
use std::sync::Arc;
use tracing::instrument;

use crate::audit::{AuditEvent, TaskId};
use crate::pipeline::{Error, Shared, Step, Summary};
use crate::source::{EOF_BYTE, Read};

/// Reads the source byte by byte into the ring until end-of-file.
///
/// Each producer discovers end-of-file on its own read; nothing tells the other producers to stop.
#[instrument(skip(shared))]
pub async fn produce(shared: Arc<Shared>, task: TaskId) -> Result<Summary, Error> {
    let _running = shared.producer_guard();
    let mut summary = Summary::default();
    shared.backoff.pause().await;
    loop {
        match step(&shared, task, &mut summary).await {
            Ok(Step::Continue) => shared.backoff.pause().await,
            Ok(Step::Done) => break,
            Err(error) => {
                tracing::error!("producer {} failed: {:#}", task, &error);
                return Err(Error::new(error, summary));
            }
        }
    }
    tracing::debug!("producer {} reached end of source", task);
    Ok(summary)
}

/// One read-log-enqueue transaction.
async fn step(shared: &Shared, task: TaskId, summary: &mut Summary) -> anyhow::Result<Step> {
    let mut source = shared.source.lock().await;
    let read = source.next_byte().await?;
    let _transaction = shared.producer_transaction(source);
    match read {
        Read::Eof { offset } => {
            summary.eof_probes += 1;
            shared
                .record(&AuditEvent::read_byte(task, offset, EOF_BYTE), summary)
                .await?;
            Ok(Step::Done)
        }
        Read::Byte(item) => {
            summary.bytes_read += 1;
            shared
                .record(
                    &AuditEvent::read_byte(task, item.offset, item.byte),
                    summary,
                )
                .await?;
            let staged = shared
                .ring
                .stage(item)
                .await
                .with_context(|| format!("failed to enqueue byte at offset {}", item.offset))?;
            shared
                .record(&AuditEvent::produce(task, &item, staged.index()), summary)
                .await?;
            staged.publish();
            Ok(Step::Continue)
        }
    }
}
