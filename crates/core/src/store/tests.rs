use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use rust_decimal::Decimal;
use testresult::TestResult;

use crate::{
    items::Product,
    persistence::{self, LoadError, PersistError, STORAGE_KEY},
    storage::{KeyValueStore, MemoryStore, MockKeyValueStore, StorageError},
};

use super::*;

fn shirt() -> Product {
    Product {
        id: "p1".into(),
        title: "Shirt".to_string(),
        image_url: "u".to_string(),
        price: Decimal::new(50, 0),
    }
}

fn socks() -> Product {
    Product {
        id: "p2".into(),
        title: "Socks".to_string(),
        image_url: "v".to_string(),
        price: Decimal::new(1299, 2),
    }
}

fn fast_retries(max_attempts: u32) -> StoreConfig {
    StoreConfig {
        max_attempts,
        retry_backoff: Duration::ZERO,
        ..StoreConfig::default()
    }
}

fn quantity(snapshot: &CartSnapshot, id: &str) -> Option<u32> {
    snapshot.get(&id.into()).map(|item| item.quantity)
}

async fn stored(storage: &MemoryStore) -> Result<Cart, LoadError> {
    let raw = storage.get(STORAGE_KEY).await.map_err(LoadError::Storage)?;

    persistence::decode(raw.as_deref())
}

#[tokio::test]
async fn loads_empty_cart_when_nothing_is_stored() -> TestResult {
    let provider = CartProvider::mount(Arc::new(MemoryStore::new()), StoreConfig::default());
    let cart = provider.handle();

    cart.loaded().await?;

    assert!(cart.snapshot()?.is_empty());

    Ok(())
}

#[tokio::test]
async fn restores_stored_cart() -> TestResult {
    let raw = r#"[{"id":"p1","title":"Shirt","image_url":"u","price":50,"quantity":2}]"#;
    let storage = Arc::new(MemoryStore::with_entries([(STORAGE_KEY, raw)]));

    let provider = CartProvider::mount(storage, StoreConfig::default());
    let cart = provider.handle();

    cart.loaded().await?;

    assert_eq!(quantity(&cart.snapshot()?, "p1"), Some(2));

    Ok(())
}

#[tokio::test]
async fn mutations_are_visible_immediately_and_persisted_on_flush() -> TestResult {
    let storage = Arc::new(MemoryStore::new());
    let provider = CartProvider::mount(storage.clone(), fast_retries(3));
    let cart = provider.handle();

    cart.loaded().await?;

    let snapshot = cart.add_to_cart(shirt())?;

    assert_eq!(quantity(&snapshot, "p1"), Some(1));
    assert_eq!(quantity(&cart.snapshot()?, "p1"), Some(1));

    cart.add_to_cart(socks())?;
    cart.increment("p2")?;
    cart.flush().await?;

    let restored = stored(&storage).await?;

    assert_eq!(restored.items(), &*cart.snapshot()?);

    Ok(())
}

#[tokio::test]
async fn changes_before_load_are_replayed_onto_stored_cart() -> TestResult {
    let raw = r#"[{"id":"p1","title":"Shirt","image_url":"u","price":50,"quantity":2}]"#;
    let storage = Arc::new(MemoryStore::with_entries([(STORAGE_KEY, raw)]));

    let provider = CartProvider::mount(storage.clone(), fast_retries(3));
    let cart = provider.handle();

    // The worker has not run yet, so this lands on the empty cart first.
    let early = cart.add_to_cart(shirt())?;
    assert_eq!(quantity(&early, "p1"), Some(1));

    // No line exists for this product, so there is nothing to replay.
    cart.increment("p2")?;

    cart.loaded().await?;
    cart.flush().await?;

    assert_eq!(quantity(&cart.snapshot()?, "p1"), Some(3));
    assert_eq!(
        stored(&storage).await?.get(&"p1".into()).map(|item| item.quantity),
        Some(3)
    );

    Ok(())
}

#[tokio::test]
async fn stored_duplicate_line_keeps_the_rest_of_the_cart() -> TestResult {
    let raw = r#"[
        {"id":"p1","title":"Shirt","image_url":"u","price":50,"quantity":2},
        {"id":"p9","title":"Hat","image_url":"h","price":15,"quantity":4},
        {"id":"p1","title":"Shirt","image_url":"u","price":50,"quantity":1}
    ]"#;
    let storage = Arc::new(MemoryStore::with_entries([(STORAGE_KEY, raw)]));

    let provider = CartProvider::mount(storage.clone(), fast_retries(3));
    let cart = provider.handle();

    cart.loaded().await?;

    let snapshot = cart.snapshot()?;

    assert_eq!(snapshot.len(), 2);
    assert_eq!(quantity(&snapshot, "p1"), Some(3));
    assert_eq!(quantity(&snapshot, "p9"), Some(4));

    cart.add_to_cart(socks())?;
    cart.flush().await?;

    let restored = stored(&storage).await?;
    let lines: Vec<_> = restored
        .items()
        .iter()
        .map(|item| (item.id.as_str(), item.quantity))
        .collect();

    assert_eq!(lines, [("p1", 3), ("p9", 4), ("p2", 1)]);

    Ok(())
}

#[tokio::test]
async fn malformed_record_is_reported_and_cart_stays_usable() -> TestResult {
    let storage = Arc::new(MemoryStore::with_entries([(STORAGE_KEY, "{not json")]));

    let provider = CartProvider::mount(storage.clone(), fast_retries(3));
    let cart = provider.handle();

    let result = cart.loaded().await;

    assert!(
        matches!(&result, Err(StoreError::Load(error)) if matches!(**error, LoadError::Malformed(_))),
        "expected Load(Malformed), got {result:?}"
    );
    assert!(cart.snapshot()?.is_empty());
    assert_eq!(cart.durability()?.borrow().persisted_revision, 0);

    let revision = cart.add_to_cart(shirt())?.revision();
    cart.flush().await?;

    assert_eq!(stored(&storage).await?.len(), 1);
    assert_eq!(cart.durability()?.borrow().persisted_revision, revision);

    Ok(())
}

#[tokio::test]
async fn unreadable_storage_is_reported() -> TestResult {
    let mut storage = MockKeyValueStore::new();
    storage
        .expect_get()
        .returning(|_| Err(StorageError::Backend("locked".to_string())));

    let provider = CartProvider::mount(Arc::new(storage), StoreConfig::default());
    let cart = provider.handle();

    let result = cart.loaded().await;

    assert!(
        matches!(&result, Err(StoreError::Load(error)) if matches!(**error, LoadError::Storage(_))),
        "expected Load(Storage), got {result:?}"
    );

    Ok(())
}

#[tokio::test]
async fn failed_writes_are_retried() -> TestResult {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let mut storage = MockKeyValueStore::new();
    storage.expect_get().returning(|_| Ok(None));
    storage.expect_set().returning(move |_, _| {
        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(StorageError::Backend("busy".to_string()))
        } else {
            Ok(())
        }
    });

    let provider = CartProvider::mount(Arc::new(storage), fast_retries(3));
    let cart = provider.handle();

    cart.loaded().await?;
    cart.add_to_cart(shirt())?;
    cart.flush().await?;

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(cart.durability()?.borrow().failure.is_none());

    Ok(())
}

#[tokio::test]
async fn abandoned_write_is_reported_without_rolling_back() -> TestResult {
    let mut storage = MockKeyValueStore::new();
    storage.expect_get().returning(|_| Ok(None));
    storage
        .expect_set()
        .times(2)
        .returning(|_, _| Err(StorageError::Backend("disk full".to_string())));

    let provider = CartProvider::mount(Arc::new(storage), fast_retries(2));
    let cart = provider.handle();

    cart.loaded().await?;
    cart.add_to_cart(shirt())?;

    let result = cart.flush().await;

    assert!(
        matches!(
            &result,
            Err(StoreError::Persist { revision: 1, source })
                if matches!(**source, PersistError::Storage { attempts: 2, .. })
        ),
        "expected Persist at revision 1, got {result:?}"
    );
    assert_eq!(quantity(&cart.snapshot()?, "p1"), Some(1));
    assert!(cart.durability()?.borrow().failure.is_some());

    Ok(())
}

#[tokio::test]
async fn no_op_mutations_do_not_notify_or_write() -> TestResult {
    let mut storage = MockKeyValueStore::new();
    storage.expect_get().returning(|_| Ok(None));
    storage.expect_set().never();

    let provider = CartProvider::mount(Arc::new(storage), StoreConfig::default());
    let cart = provider.handle();

    cart.loaded().await?;

    let changes = cart.subscribe()?;

    cart.increment("missing")?;
    cart.decrement("missing")?;
    cart.flush().await?;

    assert!(!changes.has_changed()?);
    assert_eq!(cart.snapshot()?.revision(), 0);

    Ok(())
}

#[tokio::test]
async fn subscribers_see_each_new_snapshot() -> TestResult {
    let provider = CartProvider::mount(Arc::new(MemoryStore::new()), StoreConfig::default());
    let cart = provider.handle();

    cart.loaded().await?;

    let mut changes = cart.subscribe()?;

    cart.add_to_cart(shirt())?;

    assert!(changes.has_changed()?);
    assert_eq!(quantity(&changes.borrow_and_update(), "p1"), Some(1));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_are_not_lost() -> TestResult {
    let storage = Arc::new(MemoryStore::new());
    let provider = CartProvider::mount(storage.clone(), fast_retries(3));
    let cart = provider.handle();

    cart.loaded().await?;
    cart.add_to_cart(shirt())?;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let cart = cart.clone();

            tokio::spawn(async move {
                for _ in 0..25 {
                    cart.increment("p1")?;
                }

                Ok::<_, ConfigurationError>(())
            })
        })
        .collect();

    for task in tasks {
        task.await??;
    }

    cart.flush().await?;

    assert_eq!(quantity(&cart.snapshot()?, "p1"), Some(201));
    assert_eq!(
        stored(&storage).await?.get(&"p1".into()).map(|item| item.quantity),
        Some(201)
    );

    Ok(())
}

#[tokio::test]
async fn unbound_handle_is_a_configuration_error() {
    let cart = CartHandle::default();

    assert_eq!(
        cart.snapshot().err(),
        Some(ConfigurationError::OutsideProvider)
    );
    assert_eq!(
        cart.add_to_cart(shirt()).err(),
        Some(ConfigurationError::OutsideProvider)
    );
    assert!(matches!(
        cart.flush().await,
        Err(StoreError::Configuration(ConfigurationError::OutsideProvider))
    ));
}

#[tokio::test]
async fn unmount_drains_writes_and_detaches_handles() -> TestResult {
    let storage = Arc::new(MemoryStore::new());
    let provider = CartProvider::mount(storage.clone(), fast_retries(3));
    let cart = provider.handle();

    cart.add_to_cart(shirt())?;
    cart.add_to_cart(shirt())?;

    provider.unmount().await?;

    assert_eq!(
        cart.increment("p1").err(),
        Some(ConfigurationError::OutsideProvider)
    );
    assert_eq!(
        stored(&storage).await?.get(&"p1".into()).map(|item| item.quantity),
        Some(2)
    );

    Ok(())
}
