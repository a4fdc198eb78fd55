//! Cart rendering

use std::io;

use marketplace_cart::cart::CartSnapshot;
use rusty_money::{Findable, Money, iso::Currency};
use tabled::{
    builder::Builder,
    settings::{
        Alignment, Style,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

/// Errors raised while printing a cart.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The display currency is not an ISO 4217 code.
    #[error("unknown currency code {0}")]
    UnknownCurrency(String),

    /// The output could not be written.
    #[error("failed to write cart")]
    Io(#[from] io::Error),
}

/// Looks up the ISO currency prices are displayed in.
///
/// # Errors
///
/// Returns [`RenderError::UnknownCurrency`] if `code` is not an ISO 4217 code.
pub fn display_currency(code: &str) -> Result<&'static Currency, RenderError> {
    Currency::find(&code.to_ascii_uppercase())
        .ok_or_else(|| RenderError::UnknownCurrency(code.to_string()))
}

/// Writes the cart as a table, one row per line.
///
/// # Errors
///
/// Returns [`RenderError::Io`] if writing to `out` fails.
pub fn write_cart(
    out: &mut impl io::Write,
    cart: &CartSnapshot,
    currency: &'static Currency,
) -> Result<(), RenderError> {
    if cart.is_empty() {
        writeln!(out, "Cart is empty")?;

        return Ok(());
    }

    let mut builder = Builder::default();

    builder.push_record(["ID", "Title", "Image", "Unit Price", "Quantity"]);

    for item in cart {
        builder.push_record([
            item.id.to_string(),
            item.title.clone(),
            item.image_url.clone(),
            Money::from_decimal(item.price, currency).to_string(),
            item.quantity.to_string(),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Rows::first(), Alignment::center());
    table.modify(Columns::new(3..5), Alignment::right());

    writeln!(out, "{table}")?;

    Ok(())
}
