//! Store configuration

use std::time::Duration;

use crate::persistence::STORAGE_KEY;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Cart store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Storage key the cart is persisted under.
    pub key: String,

    /// Attempts made for each write before it is reported as failed. `0` is treated as `1`.
    pub max_attempts: u32,

    /// Delay before the first retry; doubled for every further retry.
    pub retry_backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key: STORAGE_KEY.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}
