use anyhow::anyhow;

/// A single source byte tagged with the source position right after it was read (1-based).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Item {
    pub byte: u8,
    pub offset: i64,
}

impl Item {
    #[must_use]
    pub fn new(byte: u8, offset: i64) -> Self {
        Self { byte, offset }
    }

    /// Destination position of the byte.
    ///
    /// Offsets follow the post-read cursor convention of [`crate::source::Source`], so the byte
    /// itself lives one position earlier.
    pub fn position(&self) -> anyhow::Result<u64> {
        self.offset
            .checked_sub(1)
            .and_then(|position| u64::try_from(position).ok())
            .ok_or_else(|| anyhow!("invalid item offset {}", self.offset))
    }
}
