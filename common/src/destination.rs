use anyhow::{Context, Result};
use std::os::unix::fs::FileExt;

use crate::item::Item;

/// Destination file written one byte at a time at explicit positions.
///
/// Writes are positional (`pwrite`), there is no shared file cursor, so concurrent writers to
/// distinct positions do not interfere.
#[derive(Debug)]
pub struct Destination {
    path: std::path::PathBuf,
    file: std::sync::Arc<std::fs::File>,
}

impl Destination {
    /// Creates (or truncates) the destination file.
    pub async fn create(path: &std::path::Path) -> Result<Self> {
        let file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("cannot open {:?} for writing", path))?;
        Ok(Self {
            path: path.to_owned(),
            file: std::sync::Arc::new(file.into_std().await),
        })
    }

    pub async fn write_byte(&self, item: &Item) -> Result<()> {
        let position = item.position()?;
        let file = self.file.clone();
        let byte = item.byte;
        tokio::task::spawn_blocking(move || file.write_all_at(&[byte], position))
            .await
            .context("destination write was cancelled")?
            .with_context(|| format!("failed writing {:?} at position {}", self.path, position))
    }
}
