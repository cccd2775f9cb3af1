//! Backend pool management.
//!
//! # Responsibilities
//! - Own the ordered list of backends (the round-robin cycle)
//! - Select the next live backend, skipping dead ones

use std::sync::{Arc, Mutex};

use crate::balancer::backend::Backend;
use crate::config::BackendConfig;

/// Round-robin pool over a fixed set of backends.
///
/// The cursor marks the last backend handed out. Selection scans one full
/// cycle starting just after it and advances the cursor only when a live
/// backend is found, so a cycle that comes up empty leaves the rotation
/// where it was.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    cursor: Mutex<usize>,
}

impl BackendPool {
    /// Build a pool from configuration, in config order.
    ///
    /// Unparseable addresses are skipped with a warning; config validation
    /// rejects them before a real deployment gets this far.
    pub fn new(configs: &[BackendConfig]) -> Self {
        let backends: Vec<Arc<Backend>> = configs
            .iter()
            .filter_map(|c| match c.address.parse() {
                Ok(addr) => Some(Arc::new(Backend::new(c.name.clone(), addr))),
                Err(_) => {
                    tracing::warn!(name = %c.name, address = %c.address, "Skipping backend with invalid address");
                    None
                }
            })
            .collect();

        // Cursor starts on the last slot so the first selection is index 0.
        let cursor = Mutex::new(backends.len().saturating_sub(1));
        Self { backends, cursor }
    }

    /// Select the next live backend, or `None` when the whole pool is down.
    ///
    /// Visits each backend at most once per call.
    pub fn next(&self) -> Option<Arc<Backend>> {
        let len = self.backends.len();
        if len == 0 {
            return None;
        }

        let mut cursor = self.cursor.lock().expect("pool cursor mutex poisoned");
        for step in 1..=len {
            let idx = (*cursor + step) % len;
            if self.backends[idx].is_alive() {
                *cursor = idx;
                return Some(Arc::clone(&self.backends[idx]));
            }
        }
        None
    }

    /// All backends, for probing and admin listings.
    pub fn all(&self) -> &[Arc<Backend>] {
        &self.backends
    }
}
