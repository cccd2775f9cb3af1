//! Active TCP health probing.
//!
//! # Responsibilities
//! - Periodically probe every backend with a bounded TCP connect
//! - Flip backend liveness from each probe result

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::balancer::pool::BackendPool;
use crate::config::HealthCheckConfig;
use crate::observability::metrics;

pub struct HealthProber {
    pool: Arc<BackendPool>,
    config: HealthCheckConfig,
}

impl HealthProber {
    pub fn new(pool: Arc<BackendPool>, config: HealthCheckConfig) -> Self {
        Self { pool, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Health probing disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            "Health prober starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; swallow it so backends keep
        // their boot-time liveness until a full interval has passed.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health prober received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once and store the results.
    ///
    /// Probes run sequentially; a sweep is bounded by
    /// `backends * timeout_secs`, which the interval is expected to cover.
    async fn sweep(&self) {
        let timeout = Duration::from_secs(self.config.timeout_secs);

        for backend in self.pool.all() {
            let alive = probe(backend.addr, timeout).await;
            let was_alive = backend.is_alive();
            backend.set_alive(alive);

            if alive != was_alive {
                if alive {
                    tracing::info!(backend = %backend.name, addr = %backend.addr, "Backend is back up");
                } else {
                    tracing::warn!(backend = %backend.name, addr = %backend.addr, "Backend is down");
                }
            } else {
                tracing::debug!(backend = %backend.name, addr = %backend.addr, alive, "Probe result unchanged");
            }

            metrics::record_backend_health(&backend.name, alive);
        }
    }
}

/// One bounded TCP connect. Any failure, including timeout, counts as dead.
async fn probe(addr: SocketAddr, timeout: Duration) -> bool {
    matches!(time::timeout(timeout, TcpStream::connect(addr)).await, Ok(Ok(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn probe_reaches_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(probe(addr, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn probe_fails_on_closed_port() {
        // Bind then drop to find a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(!probe(addr, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn sweep_flips_liveness_both_ways() {
        let live = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live_addr = live.local_addr().unwrap();
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = dead.local_addr().unwrap();
        drop(dead);

        let pool = Arc::new(BackendPool::new(&[
            BackendConfig { name: "up".to_string(), address: live_addr.to_string() },
            BackendConfig { name: "down".to_string(), address: dead_addr.to_string() },
        ]));
        // Start both in the wrong state so the sweep has to flip each one.
        pool.all()[0].set_alive(false);
        pool.all()[1].set_alive(true);

        let prober = HealthProber::new(
            Arc::clone(&pool),
            HealthCheckConfig { enabled: true, interval_secs: 20, timeout_secs: 1 },
        );
        prober.sweep().await;

        assert!(pool.all()[0].is_alive());
        assert!(!pool.all()[1].is_alive());
    }
}
