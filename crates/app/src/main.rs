//! Marketplace Cart CLI

use std::{error::Error as StdError, io, process, sync::Arc};

use marketplace_app::{
    config::{AppConfig, Command},
    file_store::FileStore,
    observability,
    render::{self, RenderError},
};
use marketplace_cart::{
    cart::CartSnapshot,
    items::{Product, ProductId},
    store::{CartHandle, CartProvider, ConfigurationError, StoreError},
};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

#[tokio::main]
pub async fn main() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(error) => error.exit(),
    };

    if let Err(error) = observability::init(&config.logging) {
        #[expect(
            clippy::print_stderr,
            reason = "logging failed to initialise, must use eprintln"
        )]
        {
            eprintln!("{error}");
        }

        process::exit(1);
    }

    if let Err(error) = run(config).await {
        #[expect(clippy::print_stderr, reason = "final error report for the user")]
        {
            eprintln!("{}", error_chain(&error));
        }

        process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    let currency = render::display_currency(&config.currency)?;

    let storage = Arc::new(FileStore::new(&config.storage.storage_path));
    let provider = CartProvider::mount(storage, config.storage.store_config());
    let cart = provider.handle();

    if let Err(error) = cart.loaded().await {
        warn!(
            path = %config.storage.storage_path.display(),
            "{}; continuing with an empty cart",
            error_chain(&error)
        );
    }

    let snapshot = apply(&cart, config.command)?;
    let flushed = cart.flush().await;

    provider.unmount().await?;

    render::write_cart(&mut io::stdout().lock(), &snapshot, currency)?;

    flushed?;

    Ok(())
}

fn apply(cart: &CartHandle, command: Command) -> Result<CartSnapshot, ConfigurationError> {
    let (snapshot, touched) = match command {
        Command::Show => return cart.snapshot(),
        Command::Add(args) => {
            let id = ProductId::from(args.id);

            let snapshot = cart.add_to_cart(Product {
                id: id.clone(),
                title: args.title,
                image_url: args.image_url,
                price: args.price,
            })?;

            (snapshot, id)
        }
        Command::Increment { id } => {
            let id = ProductId::from(id);

            (cart.increment(id.clone())?, id)
        }
        Command::Decrement { id } => {
            let id = ProductId::from(id);

            (cart.decrement(id.clone())?, id)
        }
    };

    match snapshot.get(&touched) {
        Some(item) => info!(id = %touched, quantity = item.quantity, "updated cart line"),
        None => warn!(id = %touched, "product is not in the cart"),
    }

    Ok(snapshot)
}

fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}
