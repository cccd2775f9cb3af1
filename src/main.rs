//! Turngate, a round-robin reverse proxy with per-client rate limiting.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌───────────────────────────────────────────────┐
//!                          │                   TURNGATE                     │
//!                          │                                                │
//!   Client Request         │  ┌─────────┐   ┌───────────┐   ┌──────────┐   │
//!   ───────────────────────┼─▶│  http   │──▶│ ratelimit │──▶│ balancer │───┼──▶ Backend
//!                          │  │ server  │   │  (allow?) │   │  (next)  │   │    Server
//!                          │  └─────────┘   └─────┬─────┘   └────┬─────┘   │
//!                          │                      │              │         │
//!                          │                ┌─────▼─────┐  ┌─────▼─────┐   │
//!                          │                │   store   │  │  health   │   │
//!                          │                │  (rules)  │  │  prober   │   │
//!                          │                └─────▲─────┘  └───────────┘   │
//!                          │                      │                        │
//!                          │  ┌─────────┐   ┌─────┴─────┐                  │
//!   Operator               │  │  admin  │──▶│ set_rule  │                  │
//!   ───────────────────────┼─▶│   API   │   │  (queue)  │                  │
//!                          │  └─────────┘   └───────────┘                  │
//!                          │                                                │
//!                          │  config · lifecycle · observability           │
//!                          └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use turngate::admin::{self, AdminState};
use turngate::balancer::pool::BackendPool;
use turngate::config::{load_config, resolve_config_path};
use turngate::health::prober::HealthProber;
use turngate::lifecycle::{signals, Shutdown};
use turngate::observability::metrics;
use turngate::ratelimit::RateLimiter;
use turngate::store::MemoryRuleStore;
use turngate::HttpServer;

#[derive(Parser)]
#[command(name = "turngate", version, about = "Round-robin reverse proxy with per-client rate limiting")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config_path = args
        .config
        .or_else(resolve_config_path)
        .ok_or("no config file found; set --config, CONFIG_PATH, or create ./turngate.toml")?;
    let config = load_config(&config_path)?;

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("turngate={},tower_http=info", config.observability.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "turngate starting"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Arc::new(Shutdown::new());

    let pool = Arc::new(BackendPool::new(&config.backends));
    tracing::info!(backends = pool.all().len(), "Backend pool ready");

    let prober = HealthProber::new(Arc::clone(&pool), config.health_check.clone());
    tokio::spawn(prober.run(shutdown.subscribe()));

    let store = Arc::new(MemoryRuleStore::from_rules(&config.rate_limit.rules));
    let limiter = RateLimiter::new(store, config.rate_limit.clone(), &shutdown);

    if config.admin.enabled {
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        let admin_state = AdminState {
            pool: Arc::clone(&pool),
            limiter: Arc::clone(&limiter),
            api_key: config.admin.api_key.clone(),
        };
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::run_admin_server(admin_listener, admin_state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin server error");
            }
        });
    }

    tokio::spawn(signals::listen(Arc::clone(&shutdown)));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(&config, pool, limiter);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
