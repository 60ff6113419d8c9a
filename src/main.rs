use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};

use quota_tracker::config::Args;
use quota_tracker::{QuotaError, QuotaRegistry, RegistryConfig, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let registry = QuotaRegistry::new(RegistryConfig::with_queue_capacity(args.queue_capacity));

    let keys: Vec<String> = (1..=args.keys).map(|i| format!("key-{}", i)).collect();
    for key in &keys {
        registry.new_quota(key, args.period, args.allowance, 0);
    }
    info!(
        keys = keys.len(),
        allowance = args.allowance,
        period = args.period,
        "quotas created"
    );

    let mut rejected = 0usize;
    for round in 0..args.increments {
        for key in &keys {
            match registry.incr(key) {
                Ok(()) => {}
                Err(QuotaError::QueueFull { .. }) => rejected += 1,
                Err(e) => return Err(e.into()),
            }
        }

        for key in &keys {
            if registry.is_blocked(key) {
                info!(key = %key, round, usage = registry.get(key), "key over quota");
            }
        }

        tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
    }

    if rejected > 0 {
        warn!(rejected, "increments rejected by a full queue");
    }

    if args.clean_age > 0 {
        let removed = registry.clean(args.clean_age);
        info!(removed = ?removed, "stale quotas removed");
    }

    let drained = registry.shutdown().await;
    for (key, state) in &drained.counters {
        println!(
            "{}: usage {} / {} (blocked: {})",
            key,
            state.local_total(),
            state.max,
            drained.blocked.contains(key)
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&drained)?);
    }

    if args.metrics {
        print!("{}", metrics::render()?);
    }

    Ok(())
}
