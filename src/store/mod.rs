//! Rate-limit rule storage.
//!
//! # Responsibilities
//! - Define the persistence contract for per-client admission rules
//! - Ship the in-memory implementation the proxy runs with
//!
//! # Design Decisions
//! - The store is a trait so deployments can back rules with a database
//!   without touching the limiter; whatever the store returns is treated
//!   as the source of truth
//! - Reads return `Option`: "no rule" is a normal outcome, not an error

pub mod memory;

pub use memory::MemoryRuleStore;

use async_trait::async_trait;
use thiserror::Error;

/// A per-client admission rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRule {
    /// Maximum tokens the client's bucket can hold. Zero always denies.
    pub capacity: u32,
    /// Tokens added per second. Must be at least 1.
    pub refill_rate: u32,
}

/// Errors surfaced by rule stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rule store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence contract for rate-limit rules.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Fetch the rule for a client. `Ok(None)` means no rule is configured.
    async fn get_rule(&self, client_id: &str) -> Result<Option<ClientRule>, StoreError>;

    /// Insert or replace the rule for a client. Idempotent upsert.
    async fn set_rule(&self, client_id: &str, rule: ClientRule) -> Result<(), StoreError>;
}
