//! Per-client admission control.
//!
//! # Responsibilities
//! - Registry of token buckets keyed by client identity
//! - Lazy bucket creation from the rule store, failing open without a rule
//! - Per-bucket refill tasks, cancelled exactly once on retirement
//! - Rule updates applied in submission order through a bounded queue
//! - Idle bucket eviction

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::{self, MissedTickBehavior};

use crate::config::RateLimitConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::ratelimit::bucket::TokenBucket;
use crate::store::{ClientRule, RuleStore};

/// Capacity of the rule-update queue feeding the apply task.
const UPDATE_QUEUE_DEPTH: usize = 100;

/// Errors surfaced by [`RateLimiter::set_rule`].
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
    #[error("rule-update queue closed")]
    QueueClosed,
}

/// A registry slot: the live bucket plus its refill-task control.
struct BucketEntry {
    bucket: Arc<TokenBucket>,
    /// Consumed by whichever retirement path fires first.
    stop: oneshot::Sender<()>,
}

/// Point-in-time view of one bucket, for the admin surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BucketSnapshot {
    pub client_id: String,
    pub capacity: u32,
    pub refill_rate: u32,
    pub available: u32,
    pub idle_secs: u64,
}

/// Admission control over all clients.
///
/// Withdrawals run under the registry read lock and bucket swaps under the
/// write lock, so a request sees the old bucket or the new one, never a
/// torn mix, and a token spent on a retiring bucket is counted in its
/// carryover.
pub struct RateLimiter {
    store: Arc<dyn RuleStore>,
    buckets: RwLock<HashMap<String, BucketEntry>>,
    update_tx: mpsc::Sender<String>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Build the limiter and spawn its rule-apply and sweep workers.
    pub fn new(store: Arc<dyn RuleStore>, config: RateLimitConfig, shutdown: &Shutdown) -> Arc<Self> {
        let (update_tx, update_rx) = mpsc::channel(UPDATE_QUEUE_DEPTH);

        let limiter = Arc::new(Self {
            store,
            buckets: RwLock::new(HashMap::new()),
            update_tx,
            config,
        });

        tokio::spawn(Arc::clone(&limiter).run_apply(update_rx, shutdown.subscribe()));
        tokio::spawn(Arc::clone(&limiter).run_sweeper(shutdown.subscribe()));

        limiter
    }

    /// Check whether one request from `client_id` may proceed.
    ///
    /// Never blocks beyond a short registry lock; the common path is an
    /// atomic withdrawal on an existing bucket.
    pub async fn allow(&self, client_id: &str) -> bool {
        {
            let buckets = self.buckets.read().await;
            if let Some(entry) = buckets.get(client_id) {
                return entry.bucket.try_withdraw();
            }
        }
        self.init_bucket(client_id).await
    }

    /// First sighting of a client: create its bucket under the write lock.
    ///
    /// The store query runs while the lock is held, which serializes
    /// first-seen initialization and guarantees at most one bucket and one
    /// refill task per client.
    async fn init_bucket(&self, client_id: &str) -> bool {
        let mut buckets = self.buckets.write().await;

        // Another request may have created the bucket while we waited.
        if let Some(entry) = buckets.get(client_id) {
            return entry.bucket.try_withdraw();
        }

        let rule = match self.store.get_rule(client_id).await {
            Ok(Some(rule)) => rule,
            Ok(None) => {
                tracing::debug!(client = %client_id, "No rate-limit rule, allowing");
                return true;
            }
            Err(e) => {
                tracing::warn!(client = %client_id, error = %e, "Rule store unavailable, failing open");
                return true;
            }
        };

        if rule.refill_rate == 0 {
            tracing::warn!(client = %client_id, "Rule has zero refill rate, failing open");
            return true;
        }

        tracing::info!(
            client = %client_id,
            capacity = rule.capacity,
            rate = rule.refill_rate,
            "Creating bucket"
        );

        let entry = spawn_bucket(rule, rule.capacity);
        let admitted = entry.bucket.try_withdraw();
        buckets.insert(client_id.to_string(), entry);
        metrics::record_bucket_count(buckets.len());
        admitted
    }

    /// Persist a rule, then queue it for application to any live bucket.
    ///
    /// The store write comes first: if it fails nothing changes in memory,
    /// and the apply task re-reads the store, so the installed bucket always
    /// reflects the last persisted value.
    pub async fn set_rule(&self, client_id: &str, rule: ClientRule) -> Result<(), RateLimitError> {
        self.store.set_rule(client_id, rule).await?;

        self.update_tx
            .send(client_id.to_string())
            .await
            .map_err(|_| RateLimitError::QueueClosed)?;

        Ok(())
    }

    /// Live buckets in the registry.
    pub async fn bucket_count(&self) -> usize {
        self.buckets.read().await.len()
    }

    /// Point-in-time view of every live bucket, sorted by client id.
    pub async fn snapshot(&self) -> Vec<BucketSnapshot> {
        let buckets = self.buckets.read().await;
        let mut snapshots: Vec<BucketSnapshot> = buckets
            .iter()
            .map(|(id, entry)| BucketSnapshot {
                client_id: id.clone(),
                capacity: entry.bucket.capacity(),
                refill_rate: entry.bucket.refill_rate(),
                available: entry.bucket.available(),
                idle_secs: entry.bucket.idle_for().as_secs(),
            })
            .collect();
        snapshots.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        snapshots
    }

    /// Single consumer of the rule-update queue.
    async fn run_apply(
        self: Arc<Self>,
        mut updates: mpsc::Receiver<String>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                update = updates.recv() => {
                    match update {
                        Some(client_id) => self.apply_update(&client_id).await,
                        None => break,
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rule-apply task received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Swap a live bucket over to the latest persisted rule.
    async fn apply_update(&self, client_id: &str) {
        let mut buckets = self.buckets.write().await;

        // No live bucket means nothing to swap; the next request picks the
        // new rule up through lazy initialization.
        if !buckets.contains_key(client_id) {
            return;
        }

        let rule = match self.store.get_rule(client_id).await {
            Ok(Some(rule)) => rule,
            Ok(None) => {
                tracing::warn!(client = %client_id, "Rule vanished from store, keeping current bucket");
                return;
            }
            Err(e) => {
                tracing::warn!(client = %client_id, error = %e, "Rule store unavailable, keeping current bucket");
                return;
            }
        };

        if rule.refill_rate == 0 {
            tracing::warn!(client = %client_id, "Rule has zero refill rate, keeping current bucket");
            return;
        }

        let Some(old) = buckets.remove(client_id) else {
            return;
        };

        let carryover = old.bucket.available().min(rule.capacity);
        retire(old);

        tracing::info!(
            client = %client_id,
            capacity = rule.capacity,
            rate = rule.refill_rate,
            carryover,
            "Swapping bucket"
        );

        buckets.insert(client_id.to_string(), spawn_bucket(rule, carryover));
    }

    /// Periodically evict buckets idle past the retention window.
    async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(Duration::from_secs(self.config.sweep_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_idle().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Bucket sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One eviction pass over the whole registry.
    async fn sweep_idle(&self) {
        let idle_cutoff = Duration::from_secs(self.config.idle_timeout_secs);
        let mut buckets = self.buckets.write().await;

        let expired: Vec<String> = buckets
            .iter()
            .filter(|(_, entry)| entry.bucket.idle_for() > idle_cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        if expired.is_empty() {
            return;
        }

        for client_id in expired {
            if let Some(entry) = buckets.remove(&client_id) {
                tracing::info!(client = %client_id, "Evicting idle bucket");
                retire(entry);
            }
        }
        metrics::record_bucket_count(buckets.len());
    }
}

/// Build a bucket holding `initial` tokens and start its refill task.
fn spawn_bucket(rule: ClientRule, initial: u32) -> BucketEntry {
    let bucket = Arc::new(TokenBucket::new(rule.capacity, rule.refill_rate, initial));
    let (stop_tx, stop_rx) = oneshot::channel();
    tokio::spawn(run_refill(Arc::clone(&bucket), stop_rx));
    BucketEntry {
        bucket,
        stop: stop_tx,
    }
}

/// Fire the entry's stop signal.
///
/// The refill task also exits when the sender is dropped, so a send failure
/// only means the task is already gone.
fn retire(entry: BucketEntry) {
    let _ = entry.stop.send(());
}

/// Add one token every refill interval until the stop signal fires.
///
/// Missed ticks are skipped, never batched: a stalled bucket does not burst
/// when the task catches up.
async fn run_refill(bucket: Arc<TokenBucket>, mut stop: oneshot::Receiver<()>) {
    let mut ticker = time::interval(bucket.refill_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; swallow it so the first token
    // lands one full interval after the bucket goes live.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                bucket.refill_one();
            }
            _ = &mut stop => {
                break;
            }
        }
    }
}
