//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Track liveness (written by the health prober, read by selection)

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// Configured identifier, used in logs, metrics and admin listings.
    pub name: String,
    /// The address requests are forwarded to.
    pub addr: SocketAddr,
    /// Liveness flag. Only the prober writes it.
    alive: AtomicBool,
}

impl Backend {
    /// Create a new backend. Starts alive so traffic flows before the
    /// first probe sweep completes.
    pub fn new(name: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            name: name.into(),
            addr,
            alive: AtomicBool::new(true),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Relaxed);
    }
}
