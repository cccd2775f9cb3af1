//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast to every long-running task
//!     → probe loop, limiter workers and HTTP servers drain and exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; tasks subscribe, `main` owns the sender
//! - Per-bucket refill tasks are not subscribers: their lifetime is tied
//!   to their bucket, not to the process

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
