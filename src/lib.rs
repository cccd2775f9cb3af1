//! Turngate reverse-proxy library.
//!
//! Exposes the building blocks of the proxy so the binaries and the
//! integration tests can wire them together: the backend pool and its
//! prober, the token-bucket rate limiter, the HTTP front end, and the
//! admin API.

pub mod admin;
pub mod balancer;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod ratelimit;
pub mod store;

pub use config::TurngateConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
