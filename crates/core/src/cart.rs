//! Cart

use std::{ops::Deref, slice, sync::Arc};

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::items::{CartItem, Product, ProductId};

/// A change requested by a cart consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Add one unit of a product, creating its line when it is not in the cart yet.
    Add(Product),

    /// Add one unit to an existing line.
    Increment(ProductId),

    /// Remove one unit from an existing line, stopping at zero.
    Decrement(ProductId),
}

/// The ordered, id-unique list of cart lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cart from previously stored lines.
    ///
    /// A line repeating an earlier product id is folded into the first line for that id: its
    /// quantity is added (saturating) and its other fields are discarded.
    pub fn from_items(items: Vec<CartItem>) -> Self {
        let mut positions = FxHashMap::<ProductId, usize>::default();
        let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());

        for item in items {
            if let Some(&position) = positions.get(&item.id) {
                warn!(id = %item.id, "merging duplicate cart line");

                let first = &mut merged[position];
                first.quantity = first.quantity.saturating_add(item.quantity);

                continue;
            }

            positions.insert(item.id.clone(), merged.len());
            merged.push(item);
        }

        Self { items: merged }
    }

    /// Applies an action, returning `true` if the cart changed.
    ///
    /// This is the only way the lines of a cart are modified.
    pub fn apply(&mut self, action: CartAction) -> bool {
        match action {
            CartAction::Add(product) => {
                if let Some(item) = self.get_mut(&product.id) {
                    return increment_quantity(item);
                }

                self.items.push(CartItem::from_product(product));

                true
            }
            CartAction::Increment(id) => self.get_mut(&id).is_some_and(increment_quantity),
            CartAction::Decrement(id) => self.get_mut(&id).is_some_and(|item| {
                if item.quantity == 0 {
                    return false;
                }

                item.quantity -= 1;

                true
            }),
        }
    }

    /// Returns the line for the given product, if any.
    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    fn get_mut(&mut self, id: &ProductId) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    /// Cart lines in first-added order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Number of lines in the cart.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Captures the current lines as an immutable snapshot.
    pub fn snapshot(&self, revision: u64) -> CartSnapshot {
        CartSnapshot {
            items: Arc::from(self.items.as_slice()),
            revision,
        }
    }
}

fn increment_quantity(item: &mut CartItem) -> bool {
    match item.quantity.checked_add(1) {
        Some(quantity) => {
            item.quantity = quantity;

            true
        }
        None => false,
    }
}

/// An immutable read of the cart at one revision.
///
/// Cloning a snapshot is cheap; a new one is produced for every change to the cart.
#[derive(Debug, Clone)]
pub struct CartSnapshot {
    items: Arc<[CartItem]>,
    revision: u64,
}

impl CartSnapshot {
    /// The revision this snapshot was taken at. Revision `0` is the cart before any change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the line for the given product, if any.
    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Returns the snapshot lines as an owned cart.
    pub fn to_cart(&self) -> Cart {
        Cart {
            items: self.items.to_vec(),
        }
    }
}

impl Default for CartSnapshot {
    fn default() -> Self {
        Cart::new().snapshot(0)
    }
}

impl<'a> IntoIterator for &'a CartSnapshot {
    type Item = &'a CartItem;
    type IntoIter = slice::Iter<'a, CartItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Deref for CartSnapshot {
    type Target = [CartItem];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}
