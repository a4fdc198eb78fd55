//! Items

use std::fmt::{Display, Formatter, Result as FmtResult};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog product identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a product identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProductId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A catalog product, as handed to the cart by a product listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Product identifier
    pub id: ProductId,

    /// Display name
    pub title: String,

    /// Display image reference
    pub image_url: String,

    /// Unit price
    pub price: Decimal,
}

/// A line in the cart: one product and the number of units of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product identifier
    pub id: ProductId,

    /// Display name
    pub title: String,

    /// Display image reference
    pub image_url: String,

    /// Unit price
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub price: Decimal,

    /// Units in the cart
    pub quantity: u32,
}

impl CartItem {
    /// Creates a line holding a single unit of the given product.
    pub fn from_product(product: Product) -> Self {
        let Product {
            id,
            title,
            image_url,
            price,
        } = product;

        Self {
            id,
            title,
            image_url,
            price,
            quantity: 1,
        }
    }
}
