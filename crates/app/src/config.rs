//! App configuration

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use marketplace_cart::{persistence::STORAGE_KEY, store::StoreConfig};
use rust_decimal::Decimal;

/// Marketplace cart CLI configuration
#[derive(Debug, Parser)]
#[command(name = "marketplace-app", about = "Marketplace cart CLI", long_about = None)]
pub struct AppConfig {
    /// Storage settings
    #[command(flatten)]
    pub storage: StorageConfig,

    /// Logging settings
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// ISO 4217 code prices are displayed in
    #[arg(long, env = "CART_CURRENCY", default_value = "USD")]
    pub currency: String,

    /// Cart command to run
    #[command(subcommand)]
    pub command: Command,
}

impl AppConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }
}

/// Storage settings.
#[derive(Debug, Args)]
pub struct StorageConfig {
    /// JSON file holding the key-value storage
    #[arg(
        long,
        env = "CART_STORAGE_PATH",
        default_value = ".marketplace/storage.json"
    )]
    pub storage_path: PathBuf,

    /// Key the cart is stored under
    #[arg(long, env = "CART_STORAGE_KEY", default_value = STORAGE_KEY)]
    pub storage_key: String,

    /// Attempts made for each cart write
    #[arg(long, env = "CART_MAX_WRITE_ATTEMPTS", default_value_t = 3_u32)]
    pub max_write_attempts: u32,

    /// Delay before retrying a failed write, doubled per retry
    #[arg(long, env = "CART_RETRY_BACKOFF_MS", default_value_t = 100_u64)]
    pub retry_backoff_ms: u64,
}

impl StorageConfig {
    /// Cart store settings derived from these options.
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            key: self.storage_key.clone(),
            max_attempts: self.max_write_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Cart commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the cart
    Show,

    /// Add one unit of a product to the cart
    Add(AddArgs),

    /// Add one unit to a cart line
    Increment {
        /// Product identifier
        id: String,
    },

    /// Remove one unit from a cart line
    Decrement {
        /// Product identifier
        id: String,
    },
}

/// Product details for `add`.
#[derive(Debug, Args)]
pub struct AddArgs {
    /// Product identifier
    #[arg(long)]
    pub id: String,

    /// Display name
    #[arg(long)]
    pub title: String,

    /// Display image reference
    #[arg(long)]
    pub image_url: String,

    /// Unit price, e.g. `12.99`
    #[arg(long)]
    pub price: Decimal,
}
