use rand::Rng;

/// Random pause taken by tasks between iterations to shake up the interleaving.
#[derive(Debug, Copy, Clone)]
pub struct Backoff {
    max_delay: std::time::Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(max_delay: std::time::Duration) -> Self {
        Self { max_delay }
    }

    /// Uniformly distributed delay in `[0, max_delay]`.
    pub fn next_delay(&self) -> std::time::Duration {
        if self.max_delay.is_zero() {
            return std::time::Duration::ZERO;
        }
        let max_nanos = u64::try_from(self.max_delay.as_nanos()).unwrap_or(u64::MAX);
        // rng is not Send, keep it out of any await
        let nanos = rand::thread_rng().gen_range(0..=max_nanos);
        std::time::Duration::from_nanos(nanos)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
    }
}
