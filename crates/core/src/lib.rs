//! Marketplace Cart
//!
//! An in-memory shopping cart for a storefront client, mirrored to a device-local key-value
//! store on every change.
//!
//! Consumers never own the cart directly: a [`store::CartProvider`] owns the authoritative state
//! and hands out [`store::CartHandle`]s, which read snapshots and dispatch the three mutations
//! (add, increment, decrement). Persistence runs on a background worker and never blocks a
//! mutation.

pub mod cart;
pub mod items;
pub mod persistence;
pub mod prelude;
pub mod storage;
pub mod store;
