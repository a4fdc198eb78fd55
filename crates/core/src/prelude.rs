//! Prelude

pub use crate::{
    cart::{Cart, CartAction, CartSnapshot},
    items::{CartItem, Product, ProductId},
    persistence::{LoadError, PersistError, STORAGE_KEY},
    storage::{KeyValueStore, MemoryStore, StorageError},
    store::{
        CartHandle, CartProvider, ConfigurationError, Durability, LoadState, StoreConfig, StoreError,
        WriteFailure,
    },
};
