use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use crate::item::Item;

/// Byte value logged for the read that observes end-of-file.
pub const EOF_BYTE: u8 = u8::MAX;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Read {
    Byte(Item),
    /// End of the source, `offset` is the final cursor position
    Eof {
        offset: i64,
    },
}

#[derive(Debug)]
struct Cursor {
    reader: tokio::io::BufReader<tokio::fs::File>,
    position: i64,
}

/// Source file with a single read cursor shared by all producers.
///
/// Reads are serialized: the cursor can only be advanced through a [`SourceGuard`], so every byte
/// is handed out exactly once no matter how many producers race for it.
#[derive(Debug)]
pub struct Source {
    path: std::path::PathBuf,
    cursor: tokio::sync::Mutex<Cursor>,
}

pub struct SourceGuard<'a> {
    cursor: tokio::sync::MutexGuard<'a, Cursor>,
    path: &'a std::path::Path,
}

impl Source {
    pub async fn open(path: &std::path::Path) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("cannot open {:?} for reading", path))?;
        Ok(Self {
            path: path.to_owned(),
            cursor: tokio::sync::Mutex::new(Cursor {
                reader: tokio::io::BufReader::new(file),
                position: 0,
            }),
        })
    }

    /// Waits for exclusive access to the read cursor.
    pub async fn lock(&self) -> SourceGuard<'_> {
        SourceGuard {
            cursor: self.cursor.lock().await,
            path: &self.path,
        }
    }

    /// Current length of the source file on disk.
    pub async fn snapshot_len(&self) -> Result<u64> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .with_context(|| format!("failed reading metadata from {:?}", &self.path))?;
        Ok(metadata.len())
    }
}

impl SourceGuard<'_> {
    /// Reads the next byte and advances the shared cursor.
    pub async fn next_byte(&mut self) -> Result<Read> {
        match self.cursor.reader.read_u8().await {
            Ok(byte) => {
                self.cursor.position += 1;
                Ok(Read::Byte(Item::new(byte, self.cursor.position)))
            }
            Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => Ok(Read::Eof {
                offset: self.cursor.position,
            }),
            Err(error) => Err(error).with_context(|| {
                format!(
                    "failed reading {:?} at offset {}",
                    self.path, self.cursor.position
                )
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yields_post_read_offsets_then_eof() -> Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("src");
        tokio::fs::write(&path, b"xyz").await?;
        let source = Source::open(&path).await?;
        assert_eq!(source.snapshot_len().await?, 3);
        let mut reads = vec![];
        loop {
            let read = source.lock().await.next_byte().await?;
            reads.push(read);
            if matches!(read, Read::Eof { .. }) {
                break;
            }
        }
        assert_eq!(
            reads,
            vec![
                Read::Byte(Item::new(b'x', 1)),
                Read::Byte(Item::new(b'y', 2)),
                Read::Byte(Item::new(b'z', 3)),
                Read::Eof { offset: 3 },
            ]
        );
        // every later read keeps observing the end of the file
        assert_eq!(
            source.lock().await.next_byte().await?,
            Read::Eof { offset: 3 }
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_source_is_immediately_exhausted() -> Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("empty");
        tokio::fs::write(&path, b"").await?;
        let source = Source::open(&path).await?;
        assert_eq!(
            source.lock().await.next_byte().await?,
            Read::Eof { offset: 0 }
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_source_reports_path() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let path = tmp_dir.path().join("missing");
        let error = Source::open(&path).await.unwrap_err();
        assert!(format!("{:#}", error).contains("missing"));
    }
}
