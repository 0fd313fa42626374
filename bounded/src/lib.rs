//! Bounded circular buffer shared by concurrent producer and consumer tasks
//!
//! This crate provides [`RingBuffer`], a fixed-capacity FIFO ring used by `ringcp` to hand single
//! bytes from reader tasks to writer tasks.
//!
//! # Overview
//!
//! The ring stores items in `size + 1` slots and keeps one slot empty, so at most `size` items are
//! live at any time. Two cursors walk the slots:
//!
//! - **write cursor** (head) - where the next pushed item lands
//! - **read cursor** (tail) - where the next popped item is taken from
//!
//! Both cursors wrap around modulo the slot count. Every cursor-and-slot update happens as a single
//! step under one mutex, and that mutex is never held across an await point.
//!
//! # Waiting
//!
//! Producers and consumers never spin. Waiting is done with two token-bucket semaphores:
//!
//! 1. **free slots** - starts at `size`, one permit is consumed by every push and returned by
//!    every pop
//! 2. **published items** - starts at 0, one permit is added for every item that becomes visible
//!    and consumed by every pop
//!
//! A push on a full ring parks the task until a consumer frees a slot, and a pop on an empty ring
//! parks the task until a producer publishes an item.
//!
//! # Staging
//!
//! [`RingBuffer::stage`] inserts an item without making it visible to consumers. The returned
//! [`Staged`] guard publishes the item when [`Staged::publish`] is called or when the guard is
//! dropped. This lets a producer record the slot it used before any consumer can observe it.
//!
//! Visibility follows slot order: consumers only receive an item once it and every item staged
//! before it have been published. Publishing a later item while an earlier one is still staged
//! does not wake any consumer.
//!
//! # Closing
//!
//! [`RingBuffer::close`] marks the end of the stream. Consumers keep receiving the remaining items
//! and then get `None` from every subsequent [`RingBuffer::pop`]:
//!
//! ```rust
//! # async fn example() -> Result<(), bounded::Error> {
//! let ring = bounded::RingBuffer::new(4)?;
//! ring.push(b'A').await?;
//! ring.close();
//! assert_eq!(ring.pop().await?, Some((b'A', 1)));
//! assert_eq!(ring.pop().await?, None);
//! # Ok(())
//! # }
//! ```

mod ring;
mod semaphore;

pub use ring::{RingBuffer, Staged};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("ring buffer size must be at least 1")]
    ZeroCapacity,
    #[error("ring buffer is closed")]
    Closed,
    #[error("ring buffer is full")]
    Full,
    #[error("ring buffer cursor lock is poisoned")]
    Poisoned,
}
