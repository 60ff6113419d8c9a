use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::RegistryConfig;
use crate::counter::QuotaCounter;
use crate::error::QuotaError;
use crate::metrics::{INCREMENTS_ACCEPTED, INCREMENTS_REJECTED, TRACKED_COUNTERS};
use crate::models::{CounterState, DrainedState};
use crate::observer::{DropObserver, TracingObserver};
use crate::worker::{SignalSenders, increment_worker, overage_worker};

/// Concurrent key -> counter store fed by an asynchronous increment pipeline.
///
/// `incr` only queues work; the increment and overage workers spawned by
/// [`QuotaRegistry::new`] apply it. Reads go straight to the shared maps and
/// may trail increments that are still queued.
pub struct QuotaRegistry {
    counters: Arc<DashMap<String, QuotaCounter>>,
    overages: Arc<DashSet<String>>,
    intake_tx: mpsc::Sender<String>,
    config: RegistryConfig,
    increment_handle: JoinHandle<()>,
    overage_handle: JoinHandle<()>,
}

impl QuotaRegistry {
    /// Builds a registry and spawns its two workers on the current tokio runtime.
    ///
    /// Panics when called outside a runtime, like `tokio::spawn`.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    pub fn with_observer(config: RegistryConfig, observer: Arc<dyn DropObserver>) -> Self {
        let config = config.normalized();
        let (intake_tx, intake_rx) = mpsc::channel::<String>(config.intake_capacity);
        let (block_tx, block_rx) = mpsc::channel::<String>(config.signal_capacity);
        let (clear_tx, clear_rx) = mpsc::channel::<String>(config.signal_capacity);

        let counters = Arc::new(DashMap::new());
        let overages = Arc::new(DashSet::new());

        let overage_handle = tokio::spawn(overage_worker(block_rx, clear_rx, Arc::clone(&overages)));
        let increment_handle = tokio::spawn(increment_worker(
            intake_rx,
            Arc::clone(&counters),
            SignalSenders {
                block: block_tx,
                clear: clear_tx,
            },
            observer,
        ));

        info!(
            intake_capacity = config.intake_capacity,
            signal_capacity = config.signal_capacity,
            "quota registry started"
        );

        Self {
            counters,
            overages,
            intake_tx,
            config,
            increment_handle,
            overage_handle,
        }
    }

    pub fn config(&self) -> RegistryConfig {
        self.config
    }

    // Queue one unit of usage for key. Never waits.
    pub fn incr(&self, key: &str) -> Result<(), QuotaError> {
        match self.intake_tx.try_send(key.to_string()) {
            Ok(()) => {
                INCREMENTS_ACCEPTED.inc();
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                INCREMENTS_REJECTED.inc();
                Err(QuotaError::QueueFull {
                    capacity: self.config.intake_capacity,
                })
            }
            Err(TrySendError::Closed(_)) => Err(QuotaError::Closed),
        }
    }

    // Current usage, 0 for keys without a quota
    pub fn get(&self, key: &str) -> i64 {
        self.counters
            .get(key)
            .map(|ctr| ctr.local_total())
            .unwrap_or(0)
    }

    pub fn is_blocked(&self, key: &str) -> bool {
        self.overages.contains(key)
    }

    // Creates the counter for key, replacing any existing one
    pub fn new_quota(&self, key: &str, period_secs: u32, allowance: i64, total: i64) -> CounterState {
        let ctr = QuotaCounter::new(period_secs, allowance, total);
        let state = ctr.state();
        self.counters.insert(key.to_string(), ctr);
        TRACKED_COUNTERS.set(self.counters.len() as i64);
        state
    }

    pub fn counter(&self, key: &str) -> Option<CounterState> {
        self.counters.get(key).map(|ctr| ctr.state())
    }

    pub fn snapshot(&self) -> HashMap<String, CounterState> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }

    /// Reconciles with a snapshot from elsewhere.
    ///
    /// Each entry replaces the local counter outright via [`Self::new_quota`]
    /// using the external period, allowance and total. Local increments not
    /// already reflected in the external total are lost, and the reset window
    /// restarts now.
    pub fn merge(&self, external: &HashMap<String, CounterState>) {
        for (key, state) in external {
            self.new_quota(key, state.period_secs, state.allowance, state.total);
        }
    }

    pub fn clean(&self, age_secs: u32) -> Vec<String> {
        self.clean_at(age_secs, Utc::now())
    }

    // Drops every counter whose is_stale check holds and returns their keys
    // so callers can evict them elsewhere.
    pub fn clean_at(&self, age_secs: u32, now: DateTime<Utc>) -> Vec<String> {
        let candidates: Vec<String> = self
            .counters
            .iter()
            .filter(|entry| entry.value().is_stale_at(age_secs, now))
            .map(|entry| entry.key().clone())
            .collect();

        // re-check on removal: a merge may have replaced the counter meanwhile
        let removed: Vec<String> = candidates
            .into_iter()
            .filter_map(|key| {
                self.counters
                    .remove_if(&key, |_, ctr| ctr.is_stale_at(age_secs, now))
                    .map(|(key, _)| key)
            })
            .collect();

        TRACKED_COUNTERS.set(self.counters.len() as i64);
        if !removed.is_empty() {
            info!(removed = removed.len(), age_secs, "cleaned stale quotas");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn blocked_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.overages.iter().map(|key| key.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Stops accepting increments and waits for both workers to drain.
    ///
    /// Every increment accepted before this call is applied, and every signal
    /// that made it onto a signal queue is applied to the overage set, before
    /// the final state is taken.
    pub async fn shutdown(self) -> DrainedState {
        let QuotaRegistry {
            counters,
            overages,
            intake_tx,
            increment_handle,
            overage_handle,
            ..
        } = self;

        drop(intake_tx);

        if let Err(e) = increment_handle.await {
            warn!(error = %e, "increment worker ended abnormally");
        }
        if let Err(e) = overage_handle.await {
            warn!(error = %e, "overage worker ended abnormally");
        }

        let mut blocked: Vec<String> = overages.iter().map(|key| key.key().clone()).collect();
        blocked.sort();
        let states = counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect();

        info!("quota registry stopped");
        DrainedState {
            counters: states,
            blocked,
        }
    }
}
