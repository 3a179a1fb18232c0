/// Persistent map tests
///
/// End-to-end behavior of the synchronization engine against the in-process client.
/// Run with: cargo test --test persistent_map_tests
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tablemap::{
    ConnectionConfig, Hydration, MapError, MemoryClient, PersistentMap, SyncState, Value,
};

fn open(client: &Arc<MemoryClient>, name: &str, hydration: Hydration) -> PersistentMap {
    PersistentMap::with_client(name, hydration, client.clone()).unwrap()
}

fn cache() -> HashMap<String, Value> {
    HashMap::new()
}

#[tokio::test]
async fn test_concrete_scenario() {
    let client = Arc::new(MemoryClient::new());
    let map = open(&client, "My Data!", Hydration::Lazy);
    assert_eq!(map.name(), "my_data_");

    map.init(&mut cache()).await.unwrap();
    assert!(client.table_exists("my_data_").await);

    map.set_async("42", json!({"a": 1})).await.unwrap();
    assert_eq!(map.fetch("42").await.unwrap(), Some(Value::from(json!({"a": 1}))));

    // Leading bracket forces a JSON parse, which fails for this scalar.
    map.set_async("42", "[literal]").await.unwrap();
    assert_eq!(client.raw_value("my_data_", "42").await.as_deref(), Some("[literal]"));
    assert!(matches!(map.fetch("42").await, Err(MapError::Codec(_))));

    // And a scalar that happens to be valid JSON comes back structured.
    map.set_async("42", "[1,2]").await.unwrap();
    assert_eq!(map.fetch("42").await.unwrap(), Some(Value::Structured(json!([1, 2]))));
}

#[tokio::test]
async fn test_eager_hydration_restores_collection() {
    let client = Arc::new(MemoryClient::new());

    {
        let writer = open(&client, "settings", Hydration::Eager);
        writer.init(&mut cache()).await.unwrap();
        writer.set_async("prefix", "!").await.unwrap();
        writer.set_async(7i64, 3.5f64).await.unwrap();
        writer
            .set_async("roles", json!({"admin": ["alice"], "mods": []}))
            .await
            .unwrap();
    }

    // A fresh adapter over the same table simulates a restart.
    let reader = open(&client, "settings", Hydration::Eager);
    let mut restored = cache();
    reader.init(&mut restored).await.unwrap();

    assert_eq!(restored.len(), 3);
    assert_eq!(restored["prefix"], Value::from("!"));
    assert_eq!(restored["7"], Value::from("3.5"));
    assert_eq!(restored["roles"], Value::from(json!({"admin": ["alice"], "mods": []})));
}

#[tokio::test]
async fn test_lazy_init_leaves_collection_untouched() {
    let client = Arc::new(MemoryClient::new());
    let seed = open(&client, "lazy", Hydration::Eager);
    seed.init(&mut cache()).await.unwrap();
    seed.set_async("k", "v").await.unwrap();

    let lazy = open(&client, "lazy", Hydration::Lazy);
    let mut target = cache();
    lazy.init(&mut target).await.unwrap();

    assert!(target.is_empty());
    assert_eq!(lazy.fetch("k").await.unwrap(), Some(Value::from("v")));
    // fetch does not populate the caller's collection
    assert!(target.is_empty());
}

#[tokio::test]
async fn test_fetch_missing_key_is_none() {
    let client = Arc::new(MemoryClient::new());
    let map = open(&client, "items", Hydration::Lazy);
    map.init(&mut cache()).await.unwrap();

    assert_eq!(map.fetch("nope").await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_missing_key_succeeds() {
    let client = Arc::new(MemoryClient::new());
    let map = open(&client, "items", Hydration::Lazy);
    map.init(&mut cache()).await.unwrap();

    map.delete_async("ghost").await.unwrap();
    assert_eq!(map.fetch("ghost").await.unwrap(), None);

    map.set_async("real", "1").await.unwrap();
    map.delete_async("real").await.unwrap();
    assert_eq!(map.fetch("real").await.unwrap(), None);
    assert!(!map.has("real").await.unwrap());
}

#[tokio::test]
async fn test_bulk_delete_empties_table() {
    let client = Arc::new(MemoryClient::new());
    let map = open(&client, "items", Hydration::Eager);
    map.init(&mut cache()).await.unwrap();

    for i in 0..5i64 {
        map.set_async(i, i * 10).await.unwrap();
    }
    assert_eq!(map.count().await.unwrap(), 5);

    map.bulk_delete().await.unwrap();

    let mut refreshed = cache();
    assert_eq!(map.fetch_all(&mut refreshed).await.unwrap(), 0);
    assert!(refreshed.is_empty());
}

#[tokio::test]
async fn test_schema_bootstrap_is_idempotent() {
    let client = Arc::new(MemoryClient::new());
    let map = open(&client, "items", Hydration::Eager);
    map.init(&mut cache()).await.unwrap();
    map.set_async("k", "v").await.unwrap();

    map.ensure_schema().await.unwrap();
    map.ensure_schema().await.unwrap();

    let mut reloaded = cache();
    let readiness = map.init(&mut reloaded).await.unwrap();
    assert!(readiness.is_ready());
    assert_eq!(reloaded.get("k"), Some(&Value::from("v")));
    assert_eq!(map.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_upsert_overwrites_existing_key() {
    let client = Arc::new(MemoryClient::new());
    let map = open(&client, "items", Hydration::Lazy);
    map.init(&mut cache()).await.unwrap();

    map.set_async("k", "first").await.unwrap();
    map.set_async("k", json!(["second"])).await.unwrap();

    assert_eq!(map.count().await.unwrap(), 1);
    assert_eq!(map.fetch("k").await.unwrap(), Some(Value::from(json!(["second"]))));
}

#[tokio::test]
async fn test_statements_are_parameterized() {
    let client = Arc::new(MemoryClient::new());
    let map = open(&client, "items", Hydration::Lazy);
    map.init(&mut cache()).await.unwrap();

    let hostile = "x'; DROP TABLE items; --";
    map.set_async(hostile, "v").await.unwrap();
    map.delete_async(hostile).await.unwrap();

    for (sql, _params) in client.history().await {
        assert!(!sql.contains(hostile), "{}", sql);
    }
    let history = client.history().await;
    let (delete_sql, delete_params) = history.last().unwrap();
    assert_eq!(delete_sql, r#"DELETE FROM "items" WHERE key = $1"#);
    assert_eq!(delete_params, &vec![hostile.to_string()]);
}

#[tokio::test]
async fn test_readiness_waiters_released_by_init() {
    let client = Arc::new(MemoryClient::new());
    let map = open(&client, "items", Hydration::Eager);

    let early = map.readiness();
    let waiter = tokio::spawn(async move { early.wait().await });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiter.is_finished());

    map.init(&mut cache()).await.unwrap();
    waiter.await.unwrap().unwrap();

    // Late subscribers pass straight through.
    map.readiness().wait().await.unwrap();
    assert_eq!(map.state(), SyncState::Ready);
}

#[tokio::test]
async fn test_failed_bootstrap_never_signals_ready() {
    let client = Arc::new(MemoryClient::new());
    let map = open(&client, "items", Hydration::Eager);
    client.fail_next("could not connect to server").await;

    assert!(matches!(map.init(&mut cache()).await, Err(MapError::Storage(_))));

    let waited = tokio::time::timeout(Duration::from_millis(20), map.readiness().wait()).await;
    assert!(waited.is_err(), "readiness must not fire after a failed bootstrap");
    assert!(matches!(map.set_async("k", "v").await, Err(MapError::NotReady(_))));
}

#[tokio::test]
async fn test_hydration_failure_surfaces_from_init() {
    let client = Arc::new(MemoryClient::new());
    let seed = open(&client, "broken", Hydration::Lazy);
    seed.init(&mut cache()).await.unwrap();
    seed.set_async("bad", "{not json").await.unwrap();

    let eager = open(&client, "broken", Hydration::Eager);
    let err = eager.init(&mut cache()).await.unwrap_err();
    assert!(matches!(err, MapError::Codec(_)));
    assert_eq!(eager.state(), SyncState::Hydrating);
}

#[tokio::test]
async fn test_persist_all_writes_existing_entries() {
    let client = Arc::new(MemoryClient::new());
    let map = open(&client, "import", Hydration::Lazy);
    map.init(&mut cache()).await.unwrap();

    let mut source: BTreeMap<String, Value> = BTreeMap::new();
    source.insert("a".into(), Value::from(1i64));
    source.insert("b".into(), Value::from(json!({"nested": true})));

    assert_eq!(map.persist_all(&source).await.unwrap(), 2);
    assert_eq!(map.fetch("b").await.unwrap(), Some(Value::from(json!({"nested": true}))));

    source.insert(String::new(), Value::from("empty key"));
    let sent = client.history().await.len();
    assert!(matches!(map.persist_all(&source).await, Err(MapError::InvalidKeyKind(_))));
    assert_eq!(client.history().await.len(), sent);
}

#[tokio::test]
async fn test_concurrent_writes_to_distinct_keys() {
    let client = Arc::new(MemoryClient::new());
    let map = Arc::new(open(&client, "parallel", Hydration::Lazy));
    map.init(&mut cache()).await.unwrap();

    let handles: Vec<_> = (0..20i64)
        .map(|i| map.set(i, json!({"n": i})).unwrap())
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(map.count().await.unwrap(), 20);
    assert_eq!(map.fetch(13i64).await.unwrap(), Some(Value::from(json!({"n": 13}))));
}

#[tokio::test]
async fn test_close_releases_client() {
    let client = Arc::new(MemoryClient::new());
    let map = open(&client, "items", Hydration::Lazy);
    map.init(&mut cache()).await.unwrap();

    map.close().await;
    assert!(client.is_closed());
    assert!(matches!(map.fetch("k").await, Err(MapError::Storage(_))));
}

#[test]
fn test_construction_requires_configuration() {
    let missing_name = ConnectionConfig::with_url("", "postgres://u:p@localhost/db");
    assert!(matches!(
        PersistentMap::connect(missing_name),
        Err(MapError::Configuration(_))
    ));

    let incomplete = ConnectionConfig::with_params("items", "u", "p", "", 5432, "db");
    assert!(matches!(
        PersistentMap::connect(incomplete),
        Err(MapError::Configuration(_))
    ));

    let client = Arc::new(MemoryClient::new());
    assert!(PersistentMap::with_client("", Hydration::Eager, client).is_err());
}

#[test]
fn test_valid_config_outside_runtime_returns_error() {
    let config = ConnectionConfig::with_url("items", "postgres://u:p@localhost/db");
    assert!(matches!(
        PersistentMap::connect(config),
        Err(MapError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_valid_params_config_connects_lazily() {
    let config = ConnectionConfig::with_params("Guild Settings", "u", "p", "localhost", 5432, "db")
        .hydration(Hydration::Lazy);
    let map = PersistentMap::connect(config).unwrap();

    assert_eq!(map.name(), "guild_settings");
    assert_eq!(map.hydration(), Hydration::Lazy);
    assert_eq!(map.state(), SyncState::Unstarted);
}
