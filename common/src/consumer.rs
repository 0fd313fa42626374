use anyhow::Context;
use std::sync::Arc;
use tracing::instrument;

use crate::audit::{AuditEvent, TaskId};
use crate::pipeline::{Error, Shared, Step, Summary};

/// Drains the ring into the destination until every producer is done and the ring is empty.
#[instrument(skip(shared))]
pub async fn consume(shared: Arc<Shared>, task: TaskId) -> Result<Summary, Error> {
    let mut summary = Summary::default();
    shared.backoff.pause().await;
    let source_len = shared
        .source
        .snapshot_len()
        .await
        .map_err(|error| Error::new(error, summary))?;
    loop {
        match step(&shared, task, source_len, &mut summary).await {
            Ok(Step::Continue) => shared.backoff.pause().await,
            Ok(Step::Done) => break,
            Err(error) => {
                tracing::error!("consumer {} failed: {:#}", task, &error);
                return Err(Error::new(error, summary));
            }
        }
    }
    tracing::debug!("consumer {} found the ring closed and drained", task);
    Ok(summary)
}

/// One dequeue-log-write transaction.
async fn step(
    shared: &Shared,
    task: TaskId,
    source_len: u64,
    summary: &mut Summary,
) -> anyhow::Result<Step> {
    let _transaction = shared.consumer_transaction().await;
    let Some((item, index)) = shared.ring.pop().await.context("failed to dequeue byte")? else {
        return Ok(Step::Done);
    };
    shared
        .record(&AuditEvent::consume(task, &item, index), summary)
        .await?;
    if item.offset > i64::try_from(source_len).unwrap_or(i64::MAX) {
        tracing::warn!(
            "offset {} is past the source length {} seen when {} started",
            item.offset,
            source_len,
            task
        );
    }
    shared.destination.write_byte(&item).await?;
    summary.bytes_written += 1;
    shared
        .record(&AuditEvent::write_byte(task, &item), summary)
        .await?;
    Ok(Step::Continue)
}
