//! Cart store.
//!
//! A [`CartProvider`] owns the authoritative cart for as long as it is mounted. Consumers reach it
//! through [`CartHandle`]s, which stop working once the provider is unmounted.
//!
//! Every mutation runs through [`Cart::apply`] on the latest state under a single lock, publishes
//! a new [`CartSnapshot`] and queues the snapshot for the persistence worker. Callers never wait
//! on storage; [`CartHandle::flush`] and [`CartHandle::durability`] expose the outcome of writes
//! to those who care.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use smallvec::SmallVec;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    cart::{Cart, CartAction, CartSnapshot},
    items::{Product, ProductId},
    persistence::{LoadError, PersistError},
    storage::KeyValueStore,
};

mod config;
mod errors;
mod worker;

pub use config::StoreConfig;
pub use errors::{ConfigurationError, StoreError};

use worker::{PersistenceWorker, WriteRequest};

/// Progress of the initial load.
#[derive(Debug, Clone, Default)]
pub enum LoadState {
    /// The stored cart has not been read yet.
    #[default]
    Pending,

    /// The stored cart was read, or there was none.
    Loaded,

    /// The stored cart could not be read; the store continued with what it had in memory.
    Failed(Arc<LoadError>),
}

/// A write that was given up on.
#[derive(Debug, Clone)]
pub struct WriteFailure {
    /// Revision that was being written
    pub revision: u64,

    /// Cause of the failure
    pub error: Arc<PersistError>,
}

/// How far storage has caught up with the in-memory cart.
#[derive(Debug, Clone, Default)]
pub struct Durability {
    /// Progress of the initial load
    pub load: LoadState,

    /// Newest revision known to match storage. Stays at zero after a failed load until a
    /// write succeeds.
    pub persisted_revision: u64,

    /// Most recent abandoned write, if any
    pub failure: Option<WriteFailure>,
}

#[derive(Debug)]
struct State {
    cart: Cart,
    revision: u64,

    // Effective actions taken before the stored cart arrived; `None` once loaded.
    pending: Option<SmallVec<[CartAction; 4]>>,

    writes: mpsc::UnboundedSender<WriteRequest>,
}

impl State {
    fn publish(&mut self, snapshots: &watch::Sender<CartSnapshot>) -> CartSnapshot {
        self.revision += 1;

        let snapshot = self.cart.snapshot(self.revision);

        snapshots.send_replace(snapshot.clone());

        snapshot
    }

    fn enqueue(&self, snapshot: CartSnapshot) {
        let revision = snapshot.revision();

        if self.writes.send(WriteRequest { snapshot }).is_err() {
            warn!(revision, "persistence worker has stopped; cart change will not be stored");
        }
    }
}

/// Outcome of merging the stored cart into the in-memory one.
#[derive(Debug)]
struct Hydrated {
    load: LoadState,

    // Revision that already matches storage, when nothing had to be written. Never set after a
    // failed load: what storage holds is unknown.
    in_sync: Option<u64>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    snapshots: watch::Sender<CartSnapshot>,
    durability: watch::Receiver<Durability>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, action: CartAction) -> CartSnapshot {
        let mut state = self.lock();

        let replay = state.pending.is_some().then(|| action.clone());

        if !state.cart.apply(action) {
            return self.snapshots.borrow().clone();
        }

        let snapshot = state.publish(&self.snapshots);

        if let Some(pending) = state.pending.as_mut() {
            pending.extend(replay);

            return snapshot;
        }

        state.enqueue(snapshot.clone());

        snapshot
    }

    fn hydrate(&self, loaded: Result<Cart, LoadError>) -> Hydrated {
        let mut state = self.lock();

        let pending = state.pending.take().unwrap_or_default();
        let replayed = pending.len();

        let load = match loaded {
            Ok(mut cart) => {
                debug!(items = cart.len(), replayed, "restored stored cart");

                if cart.is_empty() && replayed == 0 {
                    return Hydrated {
                        load: LoadState::Loaded,
                        in_sync: Some(state.revision),
                    };
                }

                for action in pending {
                    cart.apply(action);
                }

                state.cart = cart;
                state.publish(&self.snapshots);

                LoadState::Loaded
            }
            Err(error) => {
                warn!(error = %error, "failed to restore stored cart; continuing with in-memory cart");

                LoadState::Failed(Arc::new(error))
            }
        };

        if replayed == 0 {
            let in_sync = matches!(load, LoadState::Loaded).then_some(state.revision);

            return Hydrated { load, in_sync };
        }

        state.enqueue(self.snapshots.borrow().clone());

        Hydrated {
            load,
            in_sync: None,
        }
    }
}

/// Owner of the cart for the lifetime of the consumers it serves.
#[derive(Debug)]
pub struct CartProvider {
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl CartProvider {
    /// Mounts a provider with an empty cart and starts restoring the stored one.
    ///
    /// Returns immediately; use [`CartHandle::loaded`] to wait for the stored cart. Must be called
    /// from within a Tokio runtime.
    pub fn mount(storage: Arc<dyn KeyValueStore>, config: StoreConfig) -> Self {
        let (writes, queue) = mpsc::unbounded_channel();
        let (snapshots, _) = watch::channel(CartSnapshot::default());
        let (durability_tx, durability) = watch::channel(Durability::default());

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                cart: Cart::new(),
                revision: 0,
                pending: Some(SmallVec::new()),
                writes,
            }),
            snapshots,
            durability,
        });

        let worker = PersistenceWorker {
            storage,
            config,
            shared: Arc::downgrade(&shared),
            queue,
            durability: durability_tx,
        };

        Self {
            shared,
            worker: tokio::spawn(worker.run()),
        }
    }

    /// Returns a handle for a consumer of this cart.
    pub fn handle(&self) -> CartHandle {
        CartHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Releases the in-memory cart and waits for queued writes to finish.
    ///
    /// Changes made before the stored cart arrived are merged into it first, so they are not
    /// lost. Handles fail with [`ConfigurationError::OutsideProvider`] from this point on.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Worker`] if the persistence worker panicked.
    pub async fn unmount(self) -> Result<(), StoreError> {
        let Self { shared, worker } = self;

        let mut durability = shared.durability.clone();

        if let Err(source) = durability
            .wait_for(|progress| !matches!(progress.load, LoadState::Pending))
            .await
        {
            debug!(error = %source, "persistence worker stopped before the stored cart was read");
        }

        drop(shared);

        worker.await.map_err(StoreError::Worker)
    }
}

/// A consumer's access to the cart.
///
/// A default handle is not bound to any provider.
#[derive(Debug, Clone, Default)]
pub struct CartHandle {
    shared: Weak<Shared>,
}

impl CartHandle {
    fn upgrade(&self) -> Result<Arc<Shared>, ConfigurationError> {
        self.shared
            .upgrade()
            .ok_or(ConfigurationError::OutsideProvider)
    }

    /// Returns the current contents of the cart.
    ///
    /// Before the stored cart has been restored this is the empty cart plus any changes made
    /// since mounting.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::OutsideProvider`] if no provider is mounted for this handle.
    pub fn snapshot(&self) -> Result<CartSnapshot, ConfigurationError> {
        Ok(self.upgrade()?.snapshots.borrow().clone())
    }

    /// Adds one unit of `product`, creating its line when it is not in the cart yet.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::OutsideProvider`] if no provider is mounted for this handle.
    pub fn add_to_cart(&self, product: Product) -> Result<CartSnapshot, ConfigurationError> {
        self.dispatch(CartAction::Add(product))
    }

    /// Adds one unit to the line for `id`; does nothing if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::OutsideProvider`] if no provider is mounted for this handle.
    pub fn increment(&self, id: impl Into<ProductId>) -> Result<CartSnapshot, ConfigurationError> {
        self.dispatch(CartAction::Increment(id.into()))
    }

    /// Removes one unit from the line for `id`, stopping at zero; does nothing if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::OutsideProvider`] if no provider is mounted for this handle.
    pub fn decrement(&self, id: impl Into<ProductId>) -> Result<CartSnapshot, ConfigurationError> {
        self.dispatch(CartAction::Decrement(id.into()))
    }

    /// Applies `action` to the latest cart and returns the resulting snapshot.
    ///
    /// The change is visible to every consumer on return; it is written to storage in the
    /// background.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::OutsideProvider`] if no provider is mounted for this handle.
    pub fn dispatch(&self, action: CartAction) -> Result<CartSnapshot, ConfigurationError> {
        Ok(self.upgrade()?.dispatch(action))
    }

    /// Subscribes to cart changes. The receiver is notified once per new snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::OutsideProvider`] if no provider is mounted for this handle.
    pub fn subscribe(&self) -> Result<watch::Receiver<CartSnapshot>, ConfigurationError> {
        Ok(self.upgrade()?.snapshots.subscribe())
    }

    /// Subscribes to storage progress, for reporting load and write failures.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::OutsideProvider`] if no provider is mounted for this handle.
    pub fn durability(&self) -> Result<watch::Receiver<Durability>, ConfigurationError> {
        Ok(self.upgrade()?.durability.clone())
    }

    /// Waits until the stored cart has been restored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Load`] if the stored cart could not be read. The store stays usable.
    pub async fn loaded(&self) -> Result<(), StoreError> {
        let mut durability = self.durability()?;

        let progress = durability
            .wait_for(|progress| !matches!(progress.load, LoadState::Pending))
            .await
            .map_err(StoreError::WorkerStopped)?;

        match &progress.load {
            LoadState::Failed(error) => Err(StoreError::Load(Arc::clone(error))),
            LoadState::Pending | LoadState::Loaded => Ok(()),
        }
    }

    /// Waits until every change made before this call has been written, or its write has failed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Persist`] if the write of the current revision was abandoned.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let (target, mut durability) = {
            let shared = self.upgrade()?;
            let revision = shared.lock().revision;

            (revision, shared.durability.clone())
        };

        let progress = durability
            .wait_for(|progress| {
                progress.persisted_revision >= target
                    || progress
                        .failure
                        .as_ref()
                        .is_some_and(|failure| failure.revision >= target)
            })
            .await
            .map_err(StoreError::WorkerStopped)?;

        if progress.persisted_revision >= target {
            return Ok(());
        }

        match &progress.failure {
            Some(failure) => Err(StoreError::Persist {
                revision: failure.revision,
                source: Arc::clone(&failure.error),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests;
