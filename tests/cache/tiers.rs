use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use stockpulse::cache::{CacheStore, CacheTier};

type Prices = BTreeMap<String, f64>;

const TTL: Duration = Duration::from_secs(30);

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn prices(a: f64) -> Prices {
    BTreeMap::from([("a".to_string(), a)])
}

#[tokio::test]
async fn fresh_until_age_reaches_ttl() {
    let store: CacheStore<Prices> = CacheStore::new(TTL);
    store.write("k", prices(1.0), t0()).await;

    let hit = store
        .read_at("k", t0() + TimeDelta::milliseconds(29_999))
        .await
        .expect("still fresh");
    assert_eq!(hit.payload, prices(1.0));
    assert_eq!(hit.tier, CacheTier::Memory);

    assert!(store.read_at("k", t0() + TimeDelta::seconds(30)).await.is_none());
    // Stale entries are never deleted.
    assert!(store.peek("k").await.is_some());
}

#[tokio::test]
async fn later_write_replaces_earlier() {
    let store: CacheStore<Prices> = CacheStore::new(TTL);
    store.write("k", prices(1.0), t0()).await;
    store.write("k", prices(2.0), t0() + TimeDelta::seconds(5)).await;
    let hit = store.read_at("k", t0() + TimeDelta::seconds(6)).await.unwrap();
    assert_eq!(hit.payload, prices(2.0));
    assert_eq!(hit.age, Duration::from_secs(1));
}

#[tokio::test]
async fn disk_hit_is_promoted_with_original_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let writer: CacheStore<Prices> = CacheStore::with_disk_dir(TTL, dir.path());
    writer.write("k", prices(3.5), t0()).await;

    // A fresh process: empty memory, same directory.
    let reader: CacheStore<Prices> = CacheStore::with_disk_dir(TTL, dir.path());
    let first = reader.read_at("k", t0() + TimeDelta::seconds(10)).await.unwrap();
    assert_eq!(first.tier, CacheTier::Disk);
    assert_eq!(first.age, Duration::from_secs(10));
    assert_eq!(first.written_at, t0());

    std::fs::remove_file(reader.disk_path("k").unwrap()).unwrap();
    let second = reader.read_at("k", t0() + TimeDelta::seconds(20)).await.unwrap();
    assert_eq!(second.tier, CacheTier::Memory);
    assert_eq!(second.written_at, t0());
    assert_eq!(second.payload, prices(3.5));
}

#[tokio::test]
async fn stale_disk_entry_is_a_miss_but_hydrates() {
    let dir = tempfile::tempdir().unwrap();
    let writer: CacheStore<Prices> = CacheStore::with_disk_dir(TTL, dir.path());
    writer.write("k", prices(4.0), t0()).await;

    let reader: CacheStore<Prices> = CacheStore::with_disk_dir(TTL, dir.path());
    assert!(reader.read_at("k", t0() + TimeDelta::minutes(5)).await.is_none());
    assert!(reader.peek("k").await.is_none());

    assert!(reader.hydrate("k").await);
    assert_eq!(reader.peek("k").await.unwrap().data, prices(4.0));
}

#[tokio::test]
async fn disk_document_layout() {
    let dir = tempfile::tempdir().unwrap();
    let store: CacheStore<Prices> = CacheStore::with_disk_dir(TTL, dir.path());
    store.write("cache_stock_data", prices(10.5), t0()).await;

    let path = dir.path().join("cache_stock_data.json");
    let doc: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(doc["timestamp"].as_f64(), Some(t0().timestamp() as f64));
    assert_eq!(doc["data"], serde_json::json!({"a": 10.5}));
}

#[tokio::test]
async fn legacy_fractional_timestamp_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let secs = t0().timestamp() as f64 + 0.25;
    std::fs::write(
        dir.path().join("k.json"),
        format!(r#"{{"timestamp": {secs}, "data": {{"a": 7.0}}}}"#),
    )
    .unwrap();

    let store: CacheStore<Prices> = CacheStore::with_disk_dir(TTL, dir.path());
    let hit = store.read_at("k", t0() + TimeDelta::seconds(1)).await.unwrap();
    assert_eq!(hit.payload, prices(7.0));
    assert_eq!(hit.age, Duration::from_millis(750));
}

#[tokio::test]
async fn corrupt_file_is_a_miss_then_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("k.json");
    std::fs::write(&path, b"{not json").unwrap();

    let store: CacheStore<Prices> = CacheStore::with_disk_dir(TTL, dir.path());
    assert!(store.read_at("k", t0()).await.is_none());

    store.write("k", prices(9.0), t0()).await;
    let fresh: CacheStore<Prices> = CacheStore::with_disk_dir(TTL, dir.path());
    let hit = fresh.read_at("k", t0()).await.unwrap();
    assert_eq!(hit.tier, CacheTier::Disk);
    assert_eq!(hit.payload, prices(9.0));
}

#[tokio::test]
async fn slightly_future_timestamp_counts_as_fresh() {
    let store: CacheStore<Prices> = CacheStore::new(TTL);
    store.write("k", prices(1.0), t0() + TimeDelta::seconds(5)).await;
    let hit = store.read_at("k", t0()).await.unwrap();
    assert_eq!(hit.age, Duration::ZERO);

    store.write("k", prices(1.0), t0() + TimeDelta::hours(1)).await;
    assert!(store.read_at("k", t0()).await.is_none());
}
