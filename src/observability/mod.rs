//! Observability subsystem.
//!
//! Structured logging is wired up in `main` through `tracing-subscriber`;
//! this module owns the Prometheus metrics surface. Every recording helper
//! degrades to a no-op when no exporter is installed.

pub mod metrics;
