use crate::Error;

/// Counts ring slots of one kind (free or published) and parks tasks until one is available.
#[derive(Debug)]
pub struct Slots {
    sem: tokio::sync::Semaphore,
}

impl Slots {
    pub fn new(value: usize) -> Self {
        Self {
            sem: tokio::sync::Semaphore::new(value),
        }
    }

    pub async fn take(&self) -> Result<tokio::sync::SemaphorePermit<'_>, Error> {
        self.sem.acquire().await.map_err(|_| Error::Closed)
    }

    pub fn try_take(&self) -> Option<tokio::sync::SemaphorePermit<'_>> {
        self.sem.try_acquire().ok()
    }

    pub fn release(&self, value: usize) {
        self.sem.add_permits(value);
    }

    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }
}
