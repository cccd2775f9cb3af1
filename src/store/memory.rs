//! In-memory rule store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::RuleConfig;
use crate::store::{ClientRule, RuleStore, StoreError};

/// Process-local rule store, seedable from configuration.
///
/// The only implementation shipped with the proxy; rules do not survive a
/// restart. Deployments needing durable rules implement [`RuleStore`] over
/// their own database.
#[derive(Default)]
pub struct MemoryRuleStore {
    rules: RwLock<HashMap<String, ClientRule>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with the configured rules.
    pub fn from_rules(rules: &[RuleConfig]) -> Self {
        let map = rules
            .iter()
            .map(|r| {
                (
                    r.client_id.clone(),
                    ClientRule {
                        capacity: r.capacity,
                        refill_rate: r.rate,
                    },
                )
            })
            .collect();
        Self {
            rules: RwLock::new(map),
        }
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn get_rule(&self, client_id: &str) -> Result<Option<ClientRule>, StoreError> {
        Ok(self.rules.read().await.get(client_id).copied())
    }

    async fn set_rule(&self, client_id: &str, rule: ClientRule) -> Result<(), StoreError> {
        self.rules.write().await.insert(client_id.to_string(), rule);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_client_has_no_rule() {
        let store = MemoryRuleStore::new();
        assert_eq!(store.get_rule("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let store = MemoryRuleStore::new();
        let rule = ClientRule { capacity: 10, refill_rate: 2 };
        store.set_rule("acme", rule).await.unwrap();
        assert_eq!(store.get_rule("acme").await.unwrap(), Some(rule));
    }

    #[tokio::test]
    async fn set_replaces_existing_rule() {
        let store = MemoryRuleStore::new();
        store
            .set_rule("acme", ClientRule { capacity: 10, refill_rate: 2 })
            .await
            .unwrap();
        store
            .set_rule("acme", ClientRule { capacity: 3, refill_rate: 1 })
            .await
            .unwrap();
        assert_eq!(
            store.get_rule("acme").await.unwrap(),
            Some(ClientRule { capacity: 3, refill_rate: 1 })
        );
    }

    #[tokio::test]
    async fn from_rules_seeds_the_store() {
        let store = MemoryRuleStore::from_rules(&[RuleConfig {
            client_id: "acme".to_string(),
            capacity: 100,
            rate: 10,
        }]);
        assert_eq!(
            store.get_rule("acme").await.unwrap(),
            Some(ClientRule { capacity: 100, refill_rate: 10 })
        );
    }
}
