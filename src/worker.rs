use chrono::Utc;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

use crate::counter::QuotaCounter;
use crate::metrics::{BLOCKED_KEYS, COUNTER_RESETS, INCREMENTS_APPLIED, SIGNALS_DROPPED, UNKNOWN_KEY_DROPS};
use crate::models::Signal;
use crate::observer::DropObserver;

// Senders for the two overage signal queues
pub struct SignalSenders {
    pub block: mpsc::Sender<String>,
    pub clear: mpsc::Sender<String>,
}

impl SignalSenders {
    fn emit(&self, key: &str, signal: Signal, observer: &dyn DropObserver) {
        let tx = match signal {
            Signal::Block => &self.block,
            Signal::Clear => &self.clear,
        };

        // never wait on the tracker; a lost signal is corrected by a later increment
        match tx.try_send(key.to_string()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                SIGNALS_DROPPED.with_label_values(&[signal.as_str()]).inc();
                observer.signal_dropped(key, signal);
            }
        }
    }
}

/// Single consumer of the intake queue.
///
/// Every counter mutation goes through here, one key at a time and in
/// submission order, which is what keeps concurrent `incr` calls from losing
/// updates without a lock per key. Exits once the intake queue is closed and
/// drained, dropping the signal senders so the overage worker can finish too.
pub async fn increment_worker(
    mut rx: mpsc::Receiver<String>,
    counters: Arc<DashMap<String, QuotaCounter>>,
    signals: SignalSenders,
    observer: Arc<dyn DropObserver>,
) {
    info!("increment worker started");

    while let Some(key) = rx.recv().await {
        let Some(mut counter) = counters.get_mut(&key) else {
            UNKNOWN_KEY_DROPS.inc();
            observer.unknown_key(&key);
            continue;
        };

        let now = Utc::now();
        let was_reset = counter.check_and_apply_reset_at(now);
        // checked before this increment lands: the signal reflects the previous count
        let blocked = counter.is_blocked();
        counter.apply_increment_at(now);
        let local_total = counter.local_total();
        drop(counter);

        INCREMENTS_APPLIED.inc();

        if was_reset {
            COUNTER_RESETS.inc();
            debug!(key = %key, "reset window rolled over");
            signals.emit(&key, Signal::Clear, observer.as_ref());
        }

        if blocked {
            debug!(key = %key, local_total, "quota exhausted");
            signals.emit(&key, Signal::Block, observer.as_ref());
        }
    }

    info!("increment worker stopped");
}

// Single consumer of the block/clear queues, owns writes to the overage set.
// Pending blocks are applied before pending clears: a block queued ahead of a
// reset must not outlive the clear that reset produced.
pub async fn overage_worker(
    mut block_rx: mpsc::Receiver<String>,
    mut clear_rx: mpsc::Receiver<String>,
    overages: Arc<DashSet<String>>,
) {
    info!("overage worker started");

    loop {
        tokio::select! {
            biased;
            Some(key) = block_rx.recv() => {
                // load-or-store: duplicates leave a single entry
                if overages.insert(key.clone()) {
                    debug!(key = %key, "key blocked");
                }
            }
            Some(key) = clear_rx.recv() => {
                if overages.remove(&key).is_some() {
                    debug!(key = %key, "key unblocked");
                }
            }
            else => break,
        }
        BLOCKED_KEYS.set(overages.len() as i64);
    }

    info!("overage worker stopped");
}
