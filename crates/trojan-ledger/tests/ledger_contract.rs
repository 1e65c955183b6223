//! Behaviour shared by every ledger backend, exercised through `Arc<dyn Ledger>`.

use std::sync::Arc;

use trojan_ledger::storage::{MemoryStorage, Storage};
use trojan_ledger::{
    AddMode, Key, Ledger, LedgerConfig, MemoryLedger, PersistentLedger, PersistentLedgerConfig,
    Traffic, build_ledger, canonical_key, derive_key, sha224_hex,
};

fn backends() -> Vec<(&'static str, Arc<dyn Ledger>)> {
    vec![
        ("memory", Arc::new(MemoryLedger::new()) as Arc<dyn Ledger>),
        (
            "persistent",
            Arc::new(PersistentLedger::new(
                Arc::new(MemoryStorage::new()),
                PersistentLedgerConfig::new(),
            )) as Arc<dyn Ledger>,
        ),
    ]
}

async fn traffic_of(ledger: &dyn Ledger, secret: &str) -> Option<Traffic> {
    let wanted = canonical_key(secret).into_string();
    ledger
        .snapshot()
        .await
        .unwrap()
        .into_iter()
        .find(|(k, _)| *k == wanted)
        .map(|(_, t)| t)
}

#[tokio::test]
async fn test_add_then_validate_any_form() {
    for (name, ledger) in backends() {
        ledger.add("s3cret").await.unwrap();

        let hex = sha224_hex("s3cret");
        let derived = derive_key("s3cret");
        let canonical = canonical_key("s3cret");
        assert!(ledger.validate(Key::Raw("s3cret")).await, "{name}: raw");
        assert!(ledger.validate(Key::Derived(&derived)).await, "{name}: derived");
        assert!(ledger.validate(Key::from(hex.as_str())).await, "{name}: hex");
        assert!(ledger.validate(Key::from(&canonical)).await, "{name}: canonical");
        assert!(!ledger.validate(Key::Raw("unrelated")).await, "{name}: unknown");
    }
}

#[tokio::test]
async fn test_add_key_with_derived_form() {
    for (name, ledger) in backends() {
        let hex = sha224_hex("via-derived");
        ledger.add_key(Key::from(hex.as_str())).await.unwrap();
        assert!(ledger.validate(Key::Raw("via-derived")).await, "{name}");
    }
}

#[tokio::test]
async fn test_del_then_validate() {
    for (name, ledger) in backends() {
        ledger.add("gone").await.unwrap();
        ledger.del("gone").await.unwrap();
        assert!(!ledger.validate(Key::Raw("gone")).await, "{name}");
        ledger.del("gone").await.unwrap();
        ledger.del_key(Key::Derived(&derive_key("gone"))).await.unwrap();
    }
}

#[tokio::test]
async fn test_consume_accumulates() {
    for (name, ledger) in backends() {
        ledger.add("user").await.unwrap();
        ledger.consume(Key::Raw("user"), 10, 20).await.unwrap();
        ledger.consume(Key::Raw("user"), 5, 0).await.unwrap();
        assert_eq!(
            traffic_of(ledger.as_ref(), "user").await,
            Some(Traffic::new(15, 20)),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_range_visits_exact_values() {
    for (name, ledger) in backends() {
        ledger.add("A").await.unwrap();
        ledger.add("B").await.unwrap();
        ledger.consume(Key::Raw("A"), 1, 2).await.unwrap();
        ledger.consume(Key::Raw("B"), 3, 4).await.unwrap();

        let mut visited = Vec::new();
        ledger
            .range(&mut |k: &str, up: i64, down: i64| visited.push((k.to_owned(), up, down)))
            .await
            .unwrap();
        visited.sort();

        let mut expected = vec![
            (canonical_key("A").into_string(), 1, 2),
            (canonical_key("B").into_string(), 3, 4),
        ];
        expected.sort();
        assert_eq!(visited, expected, "{name}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_consume_no_lost_updates() {
    const N: i64 = 64;
    for (name, ledger) in backends() {
        ledger.add("shared").await.unwrap();

        let tasks: Vec<_> = (0..N)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.consume(Key::Raw("shared"), 1, 1).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(
            traffic_of(ledger.as_ref(), "shared").await,
            Some(Traffic::new(N, N)),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_default_add_mode_asymmetry() {
    let memory = MemoryLedger::new();
    let persistent = PersistentLedger::new(
        Arc::new(MemoryStorage::new()),
        PersistentLedgerConfig::new(),
    );
    assert_eq!(memory.add_mode(), AddMode::Reset);
    assert_eq!(persistent.add_mode(), AddMode::KeepExisting);

    for ledger in [&memory as &dyn Ledger, &persistent as &dyn Ledger] {
        ledger.add_key(Key::Raw("k")).await.unwrap();
        ledger.consume(Key::Raw("k"), 3, 3).await.unwrap();
        ledger.add_key(Key::Raw("k")).await.unwrap();
    }

    assert_eq!(traffic_of(&memory, "k").await, Some(Traffic::default()));
    assert_eq!(traffic_of(&persistent, "k").await, Some(Traffic::new(3, 3)));
}

#[tokio::test]
async fn test_shared_storage_between_ledgers() {
    // Two ledgers over one storage behave like two processes.
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let config: LedgerConfig = toml::from_str("type = \"persistent\"").unwrap();
    let first = build_ledger(&config, Some(storage.clone())).await.unwrap();
    let second = build_ledger(&config, Some(storage.clone())).await.unwrap();

    first.add("roaming").await.unwrap();
    assert!(second.validate(Key::Raw("roaming")).await);

    let a = {
        let first = first.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                first.consume(Key::Raw("roaming"), 1, 0).await.unwrap();
            }
        })
    };
    let b = {
        let second = second.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                second.consume(Key::Raw("roaming"), 0, 1).await.unwrap();
            }
        })
    };
    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(
        traffic_of(first.as_ref(), "roaming").await,
        Some(Traffic::new(20, 20))
    );
}
