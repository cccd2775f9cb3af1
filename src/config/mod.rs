//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! turngate.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TurngateConfig (validated, immutable)
//!     → shared by value or Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; rate-limit rules change at runtime
//!   through the admin API and the rule store, not through file reloads
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config_path, ConfigError};
pub use schema::TurngateConfig;
pub use schema::AdminConfig;
pub use schema::BackendConfig;
pub use schema::HealthCheckConfig;
pub use schema::RateLimitConfig;
pub use schema::RuleConfig;
