//! Cart store errors.

use std::sync::Arc;

use thiserror::Error;
use tokio::{sync::watch::error::RecvError, task::JoinError};

use crate::persistence::{LoadError, PersistError};

/// A cart handle was used without a mounted [`CartProvider`](super::CartProvider).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The handle was never bound to a provider, or its provider has been unmounted.
    #[error("cart must be used within a CartProvider")]
    OutsideProvider,
}

/// Errors reported by the cart store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store was accessed outside of its provider.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The stored cart could not be restored.
    #[error("failed to load cart")]
    Load(#[source] Arc<LoadError>),

    /// A cart revision could not be written to storage.
    #[error("cart revision {revision} was not stored")]
    Persist {
        /// Revision whose write failed
        revision: u64,

        /// Cause of the failure
        #[source]
        source: Arc<PersistError>,
    },

    /// The persistence worker stopped before the awaited work completed.
    #[error("persistence worker stopped")]
    WorkerStopped(#[source] RecvError),

    /// The persistence worker panicked or was cancelled.
    #[error("persistence worker failed")]
    Worker(#[source] JoinError),
}
