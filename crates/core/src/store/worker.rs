//! Persistence worker
//!
//! Restores the stored cart once, then writes queued snapshots in revision order, keeping only
//! the newest when several are waiting.

use std::sync::{Arc, Weak};

use tokio::{
    sync::{mpsc, watch},
    time,
};
use tracing::{debug, error, warn};

use crate::{
    cart::CartSnapshot,
    persistence::{self, LoadError, PersistError},
    storage::KeyValueStore,
};

use super::{Durability, Shared, StoreConfig, WriteFailure};

/// A snapshot waiting to be written.
#[derive(Debug)]
pub(super) struct WriteRequest {
    pub(super) snapshot: CartSnapshot,
}

pub(super) struct PersistenceWorker {
    pub(super) storage: Arc<dyn KeyValueStore>,
    pub(super) config: StoreConfig,
    pub(super) shared: Weak<Shared>,
    pub(super) queue: mpsc::UnboundedReceiver<WriteRequest>,
    pub(super) durability: watch::Sender<Durability>,
}

impl PersistenceWorker {
    pub(super) async fn run(mut self) {
        self.load().await;

        while let Some(mut request) = self.queue.recv().await {
            while let Ok(newer) = self.queue.try_recv() {
                request = newer;
            }

            self.write(&request.snapshot).await;
        }

        debug!(key = %self.config.key, "persistence worker finished");
    }

    async fn load(&self) {
        let loaded = match self.storage.get(&self.config.key).await {
            Ok(raw) => persistence::decode(raw.as_deref()),
            Err(source) => Err(LoadError::Storage(source)),
        };

        let Some(shared) = self.shared.upgrade() else {
            debug!(key = %self.config.key, "provider unmounted before the stored cart was read");

            return;
        };

        let hydrated = shared.hydrate(loaded);

        drop(shared);

        self.durability.send_modify(|progress| {
            progress.load = hydrated.load;

            if let Some(revision) = hydrated.in_sync {
                progress.persisted_revision = progress.persisted_revision.max(revision);
            }
        });
    }

    async fn write(&self, snapshot: &CartSnapshot) {
        let revision = snapshot.revision();

        let payload = match persistence::encode(snapshot) {
            Ok(payload) => payload,
            Err(source) => {
                error!(revision, error = %source, "failed to serialize cart");
                self.fail(revision, PersistError::Encode(source));

                return;
            }
        };

        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = self.config.retry_backoff;
        let mut attempt = 1;

        loop {
            match self.storage.set(&self.config.key, &payload).await {
                Ok(()) => {
                    debug!(revision, attempt, items = snapshot.len(), "stored cart");

                    self.durability.send_modify(|progress| {
                        progress.persisted_revision = progress.persisted_revision.max(revision);
                    });

                    return;
                }
                Err(source) if attempt < max_attempts => {
                    warn!(revision, attempt, error = %source, "failed to store cart; retrying");

                    time::sleep(backoff).await;

                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(source) => {
                    error!(
                        revision,
                        attempts = attempt,
                        error = %source,
                        "giving up storing cart; storage no longer matches the in-memory cart"
                    );

                    self.fail(
                        revision,
                        PersistError::Storage {
                            attempts: attempt,
                            source,
                        },
                    );

                    return;
                }
            }
        }
    }

    fn fail(&self, revision: u64, error: PersistError) {
        self.durability.send_modify(|progress| {
            progress.failure = Some(WriteFailure {
                revision,
                error: Arc::new(error),
            });
        });
    }
}
