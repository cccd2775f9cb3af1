//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, timeout and trace layers)
//!     → rate limiter gate (429 on an empty bucket)
//!     → backend pool pick (503 when none is alive)
//!     → URI rewrite, forward, stream the response back
//! ```

pub mod server;

pub use server::HttpServer;
