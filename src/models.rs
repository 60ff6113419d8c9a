use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::counter::QuotaCounter;

// Point-in-time copy of a counter, used for export and reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterState {
    pub total: i64,
    #[serde(default)]
    pub fresh_count: i64,
    pub max: i64,
    pub allowance: i64,
    pub period_secs: u32,
    pub reset_at: DateTime<Utc>,
    pub last_update_at: DateTime<Utc>,
}

impl CounterState {
    // Snapshot as an external node would send it: only period/allowance/total matter for merge
    pub fn new(period_secs: u32, allowance: i64, total: i64) -> Self {
        QuotaCounter::new(period_secs, allowance, total).state()
    }

    pub fn local_total(&self) -> i64 {
        self.total + self.fresh_count
    }
}

impl From<&QuotaCounter> for CounterState {
    fn from(ctr: &QuotaCounter) -> Self {
        ctr.state()
    }
}

// Notification from the increment pipeline to the overage tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Block,
    Clear,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Block => "block",
            Signal::Clear => "clear",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// What is left once a registry has shut down and both queues are drained
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrainedState {
    pub counters: HashMap<String, CounterState>,
    pub blocked: Vec<String>,
}
