//! Token bucket primitive.
//!
//! # Responsibilities
//! - Hold one client's admission state: capacity, refill rate, available tokens
//! - Non-blocking withdrawal on the request path
//! - Capped single-token refill, driven by the bucket's refill task

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Admission state for one client.
///
/// `available` moves under CAS only: a consumed token is never returned,
/// and refills never push the count past `capacity`.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    refill_rate: u32,
    available: AtomicU32,
    /// Milliseconds since `created`; stamped on successful withdraw/refill.
    last_activity_ms: AtomicU64,
    created: Instant,
}

impl TokenBucket {
    /// Create a bucket holding `initial` tokens, clamped to capacity.
    ///
    /// `refill_rate` must be at least 1; callers reject zero-rate rules
    /// before building a bucket.
    pub fn new(capacity: u32, refill_rate: u32, initial: u32) -> Self {
        Self {
            capacity,
            refill_rate,
            available: AtomicU32::new(initial.min(capacity)),
            last_activity_ms: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_rate(&self) -> u32 {
        self.refill_rate
    }

    /// Tokens currently available.
    pub fn available(&self) -> u32 {
        self.available.load(Ordering::Relaxed)
    }

    /// Interval between single-token refills.
    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs(1) / self.refill_rate
    }

    /// Take one token. Never blocks; `false` means the bucket is empty.
    pub fn try_withdraw(&self) -> bool {
        let mut prev = self.available.load(Ordering::Relaxed);
        loop {
            if prev == 0 {
                return false;
            }
            match self.available.compare_exchange_weak(
                prev,
                prev - 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.touch();
                    return true;
                }
                Err(x) => prev = x,
            }
        }
    }

    /// Add one token, capped at capacity. Returns whether a token landed.
    pub fn refill_one(&self) -> bool {
        let mut prev = self.available.load(Ordering::Relaxed);
        loop {
            if prev >= self.capacity {
                return false;
            }
            match self.available.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.touch();
                    return true;
                }
                Err(x) => prev = x,
            }
        }
    }

    /// Time since the last successful withdraw or refill.
    ///
    /// A full bucket's no-op refills do not count as activity, so an unused
    /// client goes idle once its bucket tops out.
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed));
        self.created.elapsed().saturating_sub(last)
    }

    fn touch(&self) {
        let elapsed = self.created.elapsed().as_millis() as u64;
        self.last_activity_ms.store(elapsed, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn withdraws_exactly_capacity_tokens() {
        let bucket = TokenBucket::new(5, 1, 5);
        let admitted = (0..12).filter(|_| bucket.try_withdraw()).count();
        assert_eq!(admitted, 5);
        assert_eq!(bucket.available(), 0);
        assert!(!bucket.try_withdraw());
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let bucket = TokenBucket::new(2, 1, 2);
        assert!(!bucket.refill_one());
        assert_eq!(bucket.available(), 2);

        assert!(bucket.try_withdraw());
        assert!(bucket.refill_one());
        assert_eq!(bucket.available(), 2);
    }

    #[test]
    fn initial_tokens_clamp_to_capacity() {
        let bucket = TokenBucket::new(3, 1, 10);
        assert_eq!(bucket.available(), 3);
    }

    #[test]
    fn zero_capacity_always_denies() {
        let bucket = TokenBucket::new(0, 1, 0);
        assert!(!bucket.try_withdraw());
        assert!(!bucket.refill_one());
        assert_eq!(bucket.available(), 0);
    }

    #[test]
    fn refill_interval_divides_one_second_by_rate() {
        assert_eq!(TokenBucket::new(10, 1, 0).refill_interval(), Duration::from_secs(1));
        assert_eq!(TokenBucket::new(10, 4, 0).refill_interval(), Duration::from_millis(250));
        assert_eq!(TokenBucket::new(10, 1000, 0).refill_interval(), Duration::from_millis(1));
    }

    #[test]
    fn concurrent_withdrawals_never_oversell() {
        let bucket = Arc::new(TokenBucket::new(100, 1, 100));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let bucket = Arc::clone(&bucket);
            handles.push(std::thread::spawn(move || {
                (0..100).filter(|_| bucket.try_withdraw()).count()
            }));
        }
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
        assert_eq!(bucket.available(), 0);
    }

    #[test]
    fn fresh_bucket_reports_little_idle_time() {
        let bucket = TokenBucket::new(1, 1, 1);
        assert!(bucket.try_withdraw());
        assert!(bucket.idle_for() < Duration::from_secs(1));
    }
}
