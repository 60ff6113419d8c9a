use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaError {
    // intake queue saturated, the increment was not recorded
    #[error("quota buffer full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("increment pipeline is not running")]
    Closed,
}
