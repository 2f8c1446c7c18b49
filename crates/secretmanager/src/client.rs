//! Remote store abstraction and the lazily initialized client proxy

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use strata_config::ConfigResult;
use tokio::sync::OnceCell;

/// One listed secret: full resource name plus its version fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEntry {
    /// Resource name, e.g. `projects/demo/secrets/db-host`.
    pub name: String,
    /// Opaque fingerprint that changes iff the latest version changed.
    pub etag: String,
}

/// The remote secret store, as seen by the synchronization engine.
///
/// Implementations own transport details (pagination, auth, endpoints);
/// callers see a flat listing and per-secret payload retrieval.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// List every secret visible under `project`, optionally restricted by
    /// a server-side `filter` expression. Pagination is internal; the
    /// returned listing is complete.
    async fn list(&self, project: &str, filter: Option<&str>) -> ConfigResult<Vec<SecretEntry>>;

    /// Retrieve the payload of the latest version of one secret.
    async fn access_latest(&self, name: &str) -> ConfigResult<Vec<u8>>;
}

/// Resolves the deployment's project identifier.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// The project under which secrets are listed.
    async fn project_id(&self) -> ConfigResult<String>;
}

type StoreFactory = Box<dyn Fn() -> ConfigResult<Arc<dyn SecretStore>> + Send + Sync>;

/// Lazily resolves the project identity and constructs the store client on
/// first use. Both initializations happen at most once per proxy lifetime;
/// failures are surfaced to every caller and re-attempted on the next call
/// (never cached).
pub(crate) struct ClientProxy {
    identity: Arc<dyn IdentityResolver>,
    factory: StoreFactory,
    project: OnceCell<String>,
    store: OnceCell<Arc<dyn SecretStore>>,
}

impl ClientProxy {
    pub(crate) fn new(identity: Arc<dyn IdentityResolver>, factory: StoreFactory) -> Self {
        Self {
            identity,
            factory,
            project: OnceCell::new(),
            store: OnceCell::new(),
        }
    }

    /// Pre-seed the project id, skipping identity resolution entirely.
    pub(crate) fn with_project(mut self, project: String) -> Self {
        self.project = OnceCell::new_with(Some(project));
        self
    }

    /// Pre-seed the store client, skipping lazy construction entirely.
    pub(crate) fn with_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = OnceCell::new_with(Some(store));
        self
    }

    pub(crate) async fn project(&self) -> ConfigResult<&str> {
        self.project
            .get_or_try_init(|| self.identity.project_id())
            .await
            .map(String::as_str)
    }

    pub(crate) async fn store(&self) -> ConfigResult<Arc<dyn SecretStore>> {
        self.store
            .get_or_try_init(|| async { (self.factory)() })
            .await
            .cloned()
    }

    /// The resolved project id, if resolution already happened.
    pub(crate) fn cached_project(&self) -> Option<&str> {
        self.project.get().map(String::as_str)
    }
}

impl fmt::Debug for ClientProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientProxy")
            .field("project", &self.project.get())
            .field("store_initialized", &self.store.initialized())
            .finish()
    }
}
