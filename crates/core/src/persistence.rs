//! Persisted cart format.
//!
//! The cart is stored as a JSON array of lines under a single key:
//!
//! ```json
//! [{"id":"p1","title":"Shirt","image_url":"u","price":50,"quantity":2}]
//! ```

use thiserror::Error;

use crate::{cart::Cart, items::CartItem, storage::StorageError};

/// Key the cart is stored under.
pub const STORAGE_KEY: &str = "@GoMarketplace:products";

/// Errors raised while restoring a stored cart.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The stored record could not be read.
    #[error("failed to read stored cart")]
    Storage(#[source] StorageError),

    /// A record exists but is not a list of cart lines.
    #[error("stored cart is malformed")]
    Malformed(#[source] serde_json::Error),

}

/// Errors raised while writing the cart to storage.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The cart could not be serialized.
    #[error("failed to serialize cart")]
    Encode(#[source] serde_json::Error),

    /// Every write attempt was rejected by the storage backend.
    #[error("failed to write cart after {attempts} attempt(s)")]
    Storage {
        /// Number of attempts made
        attempts: u32,

        /// Error from the final attempt
        #[source]
        source: StorageError,
    },
}

/// Serializes cart lines into their stored form.
///
/// # Errors
///
/// Returns a `serde_json::Error` if a line cannot be serialized.
pub fn encode(items: &[CartItem]) -> Result<String, serde_json::Error> {
    serde_json::to_string(items)
}

/// Restores a cart from its stored form.
///
/// An absent or blank record is an empty cart, not an error. Lines repeating a product are
/// merged into the first one.
///
/// # Errors
///
/// Returns [`LoadError::Malformed`] if the record is present but is not a list of cart lines.
pub fn decode(raw: Option<&str>) -> Result<Cart, LoadError> {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return Ok(Cart::new());
    };

    let items: Vec<CartItem> = serde_json::from_str(raw).map_err(LoadError::Malformed)?;

    Ok(Cart::from_items(items))
}
