//! Token-bucket rate limiting with persisted, hot-reloadable rules.
//!
//! # Data Flow
//!
//! ```text
//!   request ──> allow(client_id)
//!                 │ read lock
//!                 ├─ bucket found ──> atomic withdraw ──> admit / deny
//!                 └─ none ──> write lock ──> rule store
//!                               ├─ rule        ──> new bucket + refill task
//!                               └─ none / error ──> fail open
//!
//!   set_rule ──> rule store ──> update queue ──> apply task
//!                                                  │ write lock
//!                                                  └─ retire old bucket,
//!                                                     carry tokens over,
//!                                                     install new bucket
//!
//!   sweeper ──(every sweep interval)──> evict buckets idle past retention
//! ```
//!
//! # Design Decisions
//! - Withdrawals take the registry read lock and a single atomic
//!   compare-and-swap, so steady-state admission never contends with
//!   bucket management.
//! - Every bucket owns one refill task, cancelled through a one-shot
//!   sender that each retirement path consumes at most once.
//! - The apply task re-reads the store for every queued update; the store
//!   is the source of truth and a stale queue entry can only install a
//!   fresher rule.

pub mod bucket;
pub mod limiter;

pub use bucket::TokenBucket;
pub use limiter::{BucketSnapshot, RateLimitError, RateLimiter};
