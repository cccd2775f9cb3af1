//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request admitted → pool.rs
//!     → scan from cursor+1, skipping dead backends (backend.rs liveness)
//!     → live backend found: advance cursor, hand out Arc<Backend>
//!     → full cycle empty: None (caller maps to 503)
//! ```
//!
//! # Design Decisions
//! - Round robin only; the cursor is the single piece of selection state
//! - Liveness flags are atomics so probe writes never contend with the
//!   cursor lock
//! - Dead backends are skipped, never removed; the prober may revive them

pub mod backend;
pub mod pool;
