use lazy_static::lazy_static;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, TextEncoder, register_int_counter,
    register_int_counter_vec, register_int_gauge,
};

lazy_static! {
    pub static ref INCREMENTS_ACCEPTED: IntCounter =
        register_int_counter!("quota_increments_accepted_total", "Increments accepted onto the intake queue").unwrap();
    pub static ref INCREMENTS_REJECTED: IntCounter =
        register_int_counter!("quota_increments_rejected_total", "Increments rejected because the intake queue was full").unwrap();
    pub static ref INCREMENTS_APPLIED: IntCounter =
        register_int_counter!("quota_increments_applied_total", "Increments applied to a counter").unwrap();
    pub static ref UNKNOWN_KEY_DROPS: IntCounter =
        register_int_counter!("quota_unknown_key_drops_total", "Increments dropped for keys with no quota").unwrap();
    pub static ref SIGNALS_DROPPED: IntCounterVec = register_int_counter_vec!(
        "quota_signals_dropped_total",
        "Block/clear signals dropped because the signal queue was full",
        &["signal"]
    )
    .unwrap();
    pub static ref COUNTER_RESETS: IntCounter =
        register_int_counter!("quota_counter_resets_total", "Reset windows rolled over").unwrap();
    /// Size of the last registry that created or cleaned counters; assumes one registry per process.
    pub static ref TRACKED_COUNTERS: IntGauge =
        register_int_gauge!("quota_tracked_counters", "Counters currently held by the registry").unwrap();
    /// Overage set size of the last registry whose tracker ran; assumes one registry per process.
    pub static ref BLOCKED_KEYS: IntGauge =
        register_int_gauge!("quota_blocked_keys", "Keys currently in the overage set").unwrap();
}

// Text exposition of every registered metric
pub fn render() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
