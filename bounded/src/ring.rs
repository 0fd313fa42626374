use crate::Error;
use crate::semaphore::Slots;

#[derive(Debug)]
struct Slot<T> {
    item: Option<T>,
    published: bool,
}

#[derive(Debug)]
struct Ring<T> {
    slots: Vec<Slot<T>>,
    head: usize,
    /// First slot not yet visible to consumers, between `tail` and `head`
    ready: usize,
    tail: usize,
    len: usize,
    peak: usize,
    closed: bool,
}

impl<T> Ring<T> {
    fn advance(&self, cursor: usize) -> usize {
        let next = cursor + 1;
        if next >= self.slots.len() { 0 } else { next }
    }

    /// Stores `item` unpublished, returns the slot it landed in and the new write cursor.
    fn insert(&mut self, item: T) -> Result<(usize, usize), Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        let slot = self.head;
        let next = self.advance(slot);
        if next == self.tail {
            return Err(Error::Full);
        }
        self.slots[slot] = Slot {
            item: Some(item),
            published: false,
        };
        self.head = next;
        self.len += 1;
        self.peak = self.peak.max(self.len);
        Ok((slot, next))
    }

    /// Marks `slot` published and returns how many items became visible to consumers.
    ///
    /// Items become visible in slot order, so publishing a slot ahead of a staged one only takes
    /// effect once the earlier slot is published too.
    fn publish(&mut self, slot: usize) -> usize {
        self.slots[slot].published = true;
        let mut visible = 0;
        while self.ready != self.head && self.slots[self.ready].published {
            self.ready = self.advance(self.ready);
            visible += 1;
        }
        visible
    }

    fn remove(&mut self) -> Option<(T, usize)> {
        if self.tail == self.ready {
            return None;
        }
        let slot = &mut self.slots[self.tail];
        slot.published = false;
        let item = slot.item.take()?;
        let next = self.advance(self.tail);
        self.tail = next;
        self.len -= 1;
        Some((item, next))
    }
}

/// Fixed-capacity circular buffer shared by any number of producers and consumers.
///
/// Indices returned by [`push`](Self::push), [`stage`](Self::stage) and [`pop`](Self::pop) are the
/// cursor positions right after the operation, i.e. the slot the cursor now points at.
#[derive(Debug)]
pub struct RingBuffer<T> {
    ring: std::sync::Mutex<Ring<T>>,
    free: Slots,
    published: Slots,
    size: usize,
}

/// An item that occupies a slot but is not yet visible to consumers.
///
/// The item is published when [`publish`](Self::publish) is called or when the guard is dropped.
/// Consumers receive items in slot order, so a published item stays hidden while an item staged
/// before it is still unpublished.
#[must_use = "a staged item is published as soon as the guard is dropped"]
#[derive(Debug)]
pub struct Staged<'a, T> {
    buffer: &'a RingBuffer<T>,
    slot: usize,
    index: usize,
    published: bool,
}

impl<T> Staged<'_, T> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn publish(mut self) -> usize {
        self.release();
        self.index
    }

    fn release(&mut self) {
        if !self.published {
            self.published = true;
            let visible = self.buffer.stats().publish(self.slot);
            self.buffer.published.release(visible);
        }
    }
}

impl<T> Drop for Staged<'_, T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> RingBuffer<T> {
    /// Creates a ring able to hold `size` live items (`size + 1` slots).
    pub fn new(size: usize) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::ZeroCapacity);
        }
        let capacity = size.checked_add(1).ok_or(Error::ZeroCapacity)?;
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot {
            item: None,
            published: false,
        });
        Ok(Self {
            ring: std::sync::Mutex::new(Ring {
                slots,
                head: 0,
                ready: 0,
                tail: 0,
                len: 0,
                peak: 0,
                closed: false,
            }),
            free: Slots::new(size),
            published: Slots::new(0),
            size,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Ring<T>>, Error> {
        self.ring.lock().map_err(|_| Error::Poisoned)
    }

    fn stats(&self) -> std::sync::MutexGuard<'_, Ring<T>> {
        self.ring
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Inserts `item`, waiting while the ring is full. The item is not visible to consumers until
    /// the returned guard and the guards of all items staged before it are published or dropped.
    pub async fn stage(&self, item: T) -> Result<Staged<'_, T>, Error> {
        if self.lock()?.closed {
            return Err(Error::Closed);
        }
        let permit = self.free.take().await?;
        let (slot, index) = self.lock()?.insert(item)?;
        permit.forget();
        Ok(Staged {
            buffer: self,
            slot,
            index,
            published: false,
        })
    }

    /// Inserts and publishes `item`, waiting while the ring is full.
    pub async fn push(&self, item: T) -> Result<usize, Error> {
        Ok(self.stage(item).await?.publish())
    }

    /// Inserts and publishes `item` if a slot is free right now.
    pub fn try_push(&self, item: T) -> Result<usize, Error> {
        let permit = self.free.try_take().ok_or(Error::Full)?;
        let mut ring = self.lock()?;
        let (slot, index) = ring.insert(item)?;
        let visible = ring.publish(slot);
        drop(ring);
        permit.forget();
        self.published.release(visible);
        Ok(index)
    }

    /// Removes the oldest item, waiting while the ring is empty.
    ///
    /// Returns `None` once the ring has been closed and every item has been taken.
    pub async fn pop(&self) -> Result<Option<(T, usize)>, Error> {
        let permit = self.published.take().await?;
        self.take(permit)
    }

    /// Removes the oldest published item if there is one right now.
    pub fn try_pop(&self) -> Result<Option<(T, usize)>, Error> {
        match self.published.try_take() {
            Some(permit) => self.take(permit),
            None => Ok(None),
        }
    }

    fn take(&self, permit: tokio::sync::SemaphorePermit<'_>) -> Result<Option<(T, usize)>, Error> {
        let removed = self.lock()?.remove();
        match removed {
            Some(popped) => {
                permit.forget();
                self.free.release(1);
                Ok(Some(popped))
            }
            // closed and drained: the permit goes back so the next waiter observes it too
            None => Ok(None),
        }
    }

    /// Marks the end of the stream and wakes consumers waiting on an empty ring.
    pub fn close(&self) {
        let mut ring = self.stats();
        if !ring.closed {
            ring.closed = true;
            self.published.release(1);
            tracing::trace!("ring buffer closed with {} items left", ring.len);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stats().closed
    }

    /// Number of items currently stored, published or not.
    pub fn len(&self) -> usize {
        self.stats().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of live items.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of slots, one more than [`size`](Self::size).
    pub fn capacity(&self) -> usize {
        self.size + 1
    }

    /// Highest number of live items observed so far.
    pub fn peak(&self) -> usize {
        self.stats().peak
    }

    /// Number of items that can be pushed without waiting.
    pub fn free_slots(&self) -> usize {
        self.free.available()
    }
}
