use std::time::Duration;

use tokio::{
    sync::Mutex,
    time::{sleep_until, Instant},
};

/// Spaces RPC requests evenly at a fixed rate.
///
/// Callers queue on the next free slot, so bursts are smoothed rather than
/// rejected.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / requests_per_second.max(1),
            next_slot: Mutex::new(Instant::now()),
        }
    }

    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.interval;
            slot
        };
        sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn requests_are_spaced_by_the_rate() {
        let limiter = RateLimiter::new(10);
        let start = Instant::now();

        for _ in 0..5 {
            limiter.acquire().await;
        }

        // First request is immediate, the next four wait 100ms each.
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_is_not_banked() {
        let limiter = RateLimiter::new(2);
        tokio::time::sleep(Duration::from_secs(10)).await;

        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;

        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }
}
