//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use turngate::admin::{run_admin_server, AdminState};
use turngate::balancer::pool::BackendPool;
use turngate::config::{BackendConfig, TurngateConfig};
use turngate::health::prober::HealthProber;
use turngate::lifecycle::Shutdown;
use turngate::ratelimit::RateLimiter;
use turngate::store::MemoryRuleStore;
use turngate::HttpServer;

/// Start a mock backend on an ephemeral port, returning its address.
///
/// Each connection reads the request head, answers 200 with the given
/// body, and closes.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        if socket.read(&mut buf).await.is_err() {
                            return;
                        }
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// A config wired to the given backends, with health probing and metrics
/// off so tests control liveness themselves.
pub fn test_config(backends: &[SocketAddr]) -> TurngateConfig {
    let mut config = TurngateConfig::default();
    config.backends = backends
        .iter()
        .enumerate()
        .map(|(i, addr)| BackendConfig {
            name: format!("b{}", i + 1),
            address: addr.to_string(),
        })
        .collect();
    config.health_check.enabled = false;
    config.observability.metrics_enabled = false;
    config.admin.enabled = true;
    config.admin.api_key = "test-admin-key".to_string();
    config
}

/// A fully wired proxy running on ephemeral ports.
#[allow(dead_code)]
pub struct TestProxy {
    pub proxy_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub pool: Arc<BackendPool>,
    pub limiter: Arc<RateLimiter>,
    pub shutdown: Arc<Shutdown>,
}

/// Assemble and spawn the whole proxy from a config.
///
/// Listeners are bound before the servers are spawned, so requests made
/// immediately after this returns land in the accept backlog.
pub async fn start_proxy(config: TurngateConfig) -> TestProxy {
    let shutdown = Arc::new(Shutdown::new());

    let pool = Arc::new(BackendPool::new(&config.backends));
    if config.health_check.enabled {
        let prober = HealthProber::new(Arc::clone(&pool), config.health_check.clone());
        tokio::spawn(prober.run(shutdown.subscribe()));
    }

    let store = Arc::new(MemoryRuleStore::from_rules(&config.rate_limit.rules));
    let limiter = RateLimiter::new(store, config.rate_limit.clone(), &shutdown);

    let admin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_addr = admin_listener.local_addr().unwrap();
    let admin_state = AdminState {
        pool: Arc::clone(&pool),
        limiter: Arc::clone(&limiter),
        api_key: config.admin.api_key.clone(),
    };
    let admin_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = run_admin_server(admin_listener, admin_state, admin_shutdown).await;
    });

    let proxy_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = proxy_listener.local_addr().unwrap();
    let server = HttpServer::new(&config, Arc::clone(&pool), Arc::clone(&limiter));
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(proxy_listener, server_shutdown).await;
    });

    TestProxy {
        proxy_addr,
        admin_addr,
        pool,
        limiter,
        shutdown,
    }
}

/// Client without connection pooling, so each request dials fresh.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
