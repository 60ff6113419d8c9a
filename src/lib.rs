//! In-memory quota tracking.
//!
//! A [`QuotaRegistry`] holds one [`QuotaCounter`] per key. `incr` queues
//! usage onto a bounded channel drained by a single increment worker; a
//! second worker keeps the set of keys that went over their allowance.
//! `get`, `is_blocked` and `snapshot` read shared state directly and are
//! eventually consistent with queued increments.

pub mod config;
pub mod counter;
pub mod error;
pub mod metrics;
pub mod models;
pub mod observer;
pub mod registry;
pub mod worker;

pub use config::{DEFAULT_QUEUE_CAPACITY, RegistryConfig};
pub use counter::QuotaCounter;
pub use error::QuotaError;
pub use models::{CounterState, DrainedState, Signal};
pub use observer::{DropObserver, TracingObserver};
pub use registry::QuotaRegistry;
