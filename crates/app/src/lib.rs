//! Command-line storefront cart backed by a JSON file on disk.

pub mod config;
pub mod file_store;
pub mod observability;
pub mod render;
