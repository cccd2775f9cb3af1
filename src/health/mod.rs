//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Probe loop (prober.rs):
//!     Periodic timer
//!     → TCP connect to each backend, bounded by the probe timeout
//!     → store the result on the backend's liveness flag
//! ```
//!
//! # Design Decisions
//! - A probe result flips liveness directly; no consecutive-failure window
//! - A connect that opens is the whole check; no protocol handshake
//! - Liveness is only ever written here; request failures do not mark
//!   backends dead

pub mod prober;
