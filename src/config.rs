use clap::Parser;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

// Queue sizes, fixed when a registry is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    pub intake_capacity: usize,
    pub signal_capacity: usize,
}

impl RegistryConfig {
    pub fn with_queue_capacity(capacity: usize) -> Self {
        Self {
            intake_capacity: capacity,
            signal_capacity: capacity,
        }
    }

    // tokio channels need at least one slot
    pub(crate) fn normalized(self) -> Self {
        Self {
            intake_capacity: self.intake_capacity.max(1),
            signal_capacity: self.signal_capacity.max(1),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "quota-tracker")]
#[command(about = "Drive the in-memory quota tracker with synthetic traffic")]
pub struct Args {
    // Capacity of the intake and signal queues
    #[arg(short, long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    // Number of keys to create
    #[arg(short, long, default_value_t = 2)]
    pub keys: usize,

    // Allowance per reset window
    #[arg(short, long, default_value_t = 20)]
    pub allowance: i64,

    // Reset window in seconds
    #[arg(long, default_value_t = 10)]
    pub period: u32,

    // Increments sent per key
    #[arg(short, long, default_value_t = 50)]
    pub increments: usize,

    // Pause between rounds of increments, in milliseconds
    #[arg(long, default_value_t = 1)]
    pub delay_ms: u64,

    // Age passed to clean once traffic stops (0 disables cleaning)
    #[arg(long, default_value_t = 0)]
    pub clean_age: u32,

    // Print the final snapshot as JSON
    #[arg(long)]
    pub json: bool,

    // Print Prometheus metrics before exiting
    #[arg(long)]
    pub metrics: bool,
}
