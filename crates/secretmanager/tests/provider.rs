//! End-to-end poll-cycle tests against an in-memory secret store.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata_config::{ConfigError, ConfigResult, ConfigTree, Provider};
use strata_secretmanager::{IdentityResolver, SecretEntry, SecretManager, SecretStore};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

const PROJECT: &str = "demo";

#[derive(Clone)]
struct MockSecret {
    etag: String,
    payload: Vec<u8>,
}

struct MockStore {
    secrets: Mutex<BTreeMap<String, MockSecret>>,
    failing_access: Mutex<HashSet<String>>,
    fail_list: AtomicBool,
    list_calls: AtomicUsize,
    access_calls: AtomicUsize,
}

impl MockStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            secrets: Mutex::new(BTreeMap::new()),
            failing_access: Mutex::new(HashSet::new()),
            fail_list: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            access_calls: AtomicUsize::new(0),
        })
    }

    fn put(&self, short_name: &str, etag: &str, payload: &str) {
        let name = format!("projects/{PROJECT}/secrets/{short_name}");
        self.secrets.lock().unwrap().insert(
            name,
            MockSecret {
                etag: etag.to_string(),
                payload: payload.as_bytes().to_vec(),
            },
        );
    }

    fn break_access(&self, short_name: &str) {
        let name = format!("projects/{PROJECT}/secrets/{short_name}");
        self.failing_access.lock().unwrap().insert(name);
    }

    fn heal_access(&self, short_name: &str) {
        let name = format!("projects/{PROJECT}/secrets/{short_name}");
        self.failing_access.lock().unwrap().remove(&name);
    }
}

#[async_trait]
impl SecretStore for MockStore {
    async fn list(&self, project: &str, _filter: Option<&str>) -> ConfigResult<Vec<SecretEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ConfigError::list_failed(project, "injected list failure"));
        }
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .iter()
            .map(|(name, secret)| SecretEntry {
                name: name.clone(),
                etag: secret.etag.clone(),
            })
            .collect())
    }

    async fn access_latest(&self, name: &str) -> ConfigResult<Vec<u8>> {
        self.access_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_access.lock().unwrap().contains(name) {
            return Err(ConfigError::fetch_failed(
                name.rsplit('/').next().unwrap_or(name),
                "injected access failure",
            ));
        }
        self.secrets
            .lock()
            .unwrap()
            .get(name)
            .map(|secret| secret.payload.clone())
            .ok_or_else(|| ConfigError::fetch_failed(name, "not found"))
    }
}

struct FlakyIdentity {
    calls: AtomicUsize,
    fail_first: usize,
}

#[async_trait]
impl IdentityResolver for FlakyIdentity {
    async fn project_id(&self) -> ConfigResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            Err(ConfigError::identity_unresolved("metadata unreachable"))
        } else {
            Ok(PROJECT.to_string())
        }
    }
}

fn provider_with(store: Arc<MockStore>) -> SecretManager {
    SecretManager::builder()
        .with_project(PROJECT)
        .with_store(store)
        .build()
}

fn tree_value(tree: ConfigTree) -> Value {
    Value::Object(tree)
}

// ---------------------------------------------------------------------------
// One-shot load
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_load_folds_secrets_into_nested_tree() {
    let store = MockStore::new();
    store.put("db-host", "e1", "localhost");
    store.put("db-port", "e2", "5432");
    let provider = provider_with(store.clone());

    let values = provider.load().await.unwrap();
    assert_eq!(
        tree_value(values),
        json!({"db": {"host": "localhost", "port": "5432"}})
    );
    assert_eq!(store.access_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unchanged_second_load_issues_no_fetches() {
    let store = MockStore::new();
    store.put("db-host", "e1", "localhost");
    let provider = provider_with(store.clone());

    let first = provider.load().await.unwrap();
    assert!(!first.is_empty());
    assert_eq!(store.access_calls.load(Ordering::SeqCst), 1);

    let second = provider.load().await.unwrap();
    assert!(second.is_empty());
    assert_eq!(store.access_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn etag_change_triggers_refetch() {
    let store = MockStore::new();
    store.put("db-host", "e1", "localhost");
    let provider = provider_with(store.clone());

    provider.load().await.unwrap();
    store.put("db-host", "e2", "db.internal");

    let values = provider.load().await.unwrap();
    assert_eq!(tree_value(values), json!({"db": {"host": "db.internal"}}));
}

#[tokio::test]
async fn fetch_failure_aborts_cycle_and_next_load_retries() {
    let store = MockStore::new();
    store.put("db-host", "e1", "localhost");
    store.put("db-port", "e2", "5432");
    store.break_access("db-port");
    let provider = provider_with(store.clone());

    let err = provider.load().await.unwrap_err();
    assert!(matches!(
        err,
        ConfigError::FetchFailed { ref identifier, .. } if identifier == "db-port"
    ));

    // The snapshot was not committed, so the same change is re-detected
    // and the full tree is delivered once the store recovers.
    store.heal_access("db-port");
    let values = provider.load().await.unwrap();
    assert_eq!(
        tree_value(values),
        json!({"db": {"host": "localhost", "port": "5432"}})
    );
}

#[tokio::test]
async fn list_failure_surfaces_to_load_caller() {
    let store = MockStore::new();
    store.fail_list.store(true, Ordering::SeqCst);
    let provider = provider_with(store.clone());

    let err = provider.load().await.unwrap_err();
    assert!(matches!(err, ConfigError::ListFailed { .. }));
}

#[tokio::test]
async fn empty_store_loads_an_empty_tree() {
    let store = MockStore::new();
    let provider = provider_with(store.clone());

    // First poll of an empty listing still counts as a change.
    let values = provider.load().await.unwrap();
    assert!(values.is_empty());
    assert_eq!(store.access_calls.load(Ordering::SeqCst), 0);

    // And it commits, so the second load sees no change either.
    let again = provider.load().await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn empty_split_identifiers_are_filtered_out() {
    let store = MockStore::new();
    store.put("db-host", "e1", "localhost");
    store.put("placeholder", "e2", "ignored");
    let provider = SecretManager::builder()
        .with_project(PROJECT)
        .with_store(store.clone())
        .with_splitter(|name| {
            if name == "placeholder" {
                Vec::new()
            } else {
                name.split('-').map(str::to_string).collect()
            }
        })
        .build();

    let values = provider.load().await.unwrap();
    assert_eq!(tree_value(values), json!({"db": {"host": "localhost"}}));
}

// ---------------------------------------------------------------------------
// Watch loop
// ---------------------------------------------------------------------------

fn fast_watcher(store: Arc<MockStore>) -> SecretManager {
    SecretManager::builder()
        .with_project(PROJECT)
        .with_store(store)
        .with_poll_interval(Duration::from_millis(10))
        .build()
}

async fn recv_tree(rx: &mut tokio::sync::mpsc::UnboundedReceiver<ConfigTree>) -> ConfigTree {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a change callback")
        .expect("watch loop dropped the channel")
}

#[tokio::test(flavor = "multi_thread")]
async fn watch_delivers_on_change_and_stops_on_cancel() {
    let store = MockStore::new();
    store.put("db-host", "e1", "localhost");
    let provider = Arc::new(fast_watcher(store.clone()));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let watcher = provider.clone();
    let watch_token = token.clone();
    let handle = tokio::spawn(async move {
        watcher
            .watch(watch_token, Arc::new(move |values| {
                let _ = tx.send(values);
            }))
            .await
    });

    let first = recv_tree(&mut rx).await;
    assert_eq!(tree_value(first), json!({"db": {"host": "localhost"}}));

    store.put("db-host", "e2", "db.internal");
    let second = recv_tree(&mut rx).await;
    assert_eq!(tree_value(second), json!({"db": {"host": "db.internal"}}));

    token.cancel();
    handle.await.unwrap().unwrap();

    // No callbacks after cancellation.
    store.put("db-host", "e3", "late");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn watch_does_not_redeliver_unchanged_trees() {
    let store = MockStore::new();
    store.put("db-host", "e1", "localhost");
    let provider = Arc::new(fast_watcher(store.clone()));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let watcher = provider.clone();
    let watch_token = token.clone();
    let handle = tokio::spawn(async move {
        watcher
            .watch(watch_token, Arc::new(move |values| {
                let _ = tx.send(values);
            }))
            .await
    });

    recv_tree(&mut rx).await;

    // Several more ticks with identical etags: nothing may be delivered.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());

    token.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn watch_survives_transient_list_failures() {
    let store = MockStore::new();
    store.put("db-host", "e1", "localhost");
    store.fail_list.store(true, Ordering::SeqCst);
    let provider = Arc::new(fast_watcher(store.clone()));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let watcher = provider.clone();
    let watch_token = token.clone();
    let handle = tokio::spawn(async move {
        watcher
            .watch(watch_token, Arc::new(move |values| {
                let _ = tx.send(values);
            }))
            .await
    });

    // Let a few failing cycles elapse, then recover.
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.fail_list.store(false, Ordering::SeqCst);

    let values = recv_tree(&mut rx).await;
    assert_eq!(tree_value(values), json!({"db": {"host": "localhost"}}));
    assert!(store.list_calls.load(Ordering::SeqCst) > 1);

    token.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn watch_retries_identity_resolution_until_it_succeeds() {
    let store = MockStore::new();
    store.put("db-host", "e1", "localhost");
    let identity = Arc::new(FlakyIdentity {
        calls: AtomicUsize::new(0),
        fail_first: 2,
    });
    let provider = Arc::new(
        SecretManager::builder()
            .with_identity(identity.clone())
            .with_store(store.clone())
            .with_poll_interval(Duration::from_millis(10))
            .build(),
    );

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let watcher = provider.clone();
    let watch_token = token.clone();
    let handle = tokio::spawn(async move {
        watcher
            .watch(watch_token, Arc::new(move |values| {
                let _ = tx.send(values);
            }))
            .await
    });

    let values = recv_tree(&mut rx).await;
    assert_eq!(tree_value(values), json!({"db": {"host": "localhost"}}));
    // Two failed resolutions were retried, the third stuck.
    assert_eq!(identity.calls.load(Ordering::SeqCst), 3);

    token.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn watch_never_delivers_a_partial_tree() {
    let store = MockStore::new();
    store.put("db-host", "e1", "localhost");
    store.put("db-port", "e2", "5432");
    store.break_access("db-port");
    let provider = Arc::new(fast_watcher(store.clone()));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let watcher = provider.clone();
    let watch_token = token.clone();
    let handle = tokio::spawn(async move {
        watcher
            .watch(watch_token, Arc::new(move |values| {
                let _ = tx.send(values);
            }))
            .await
    });

    // Failing cycles must not emit anything.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());

    // Once the store recovers the full tree arrives in one piece.
    store.heal_access("db-port");
    let values = recv_tree(&mut rx).await;
    assert_eq!(
        tree_value(values),
        json!({"db": {"host": "localhost", "port": "5432"}})
    );

    token.cancel();
    handle.await.unwrap().unwrap();
}
