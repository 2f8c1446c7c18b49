//! Secret Manager provider: loader facade, poll loop, and folding

use crate::client::{ClientProxy, IdentityResolver, SecretStore};
use crate::fetch::fetch_all;
use crate::fingerprint::{FingerprintSnapshot, FingerprintStore};
use crate::identity::MetadataIdentity;
use crate::rest::{ClientOptions, RestSecretStore};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use strata_config::{ChangeHandler, ConfigResult, ConfigTree, Provider, tree};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Maps a secret's short name to the path segments locating its value in
/// the configuration tree.
pub type Splitter = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// The human-assigned short name: the final segment of the resource name.
pub(crate) fn short_name(resource: &str) -> &str {
    resource.rsplit('/').next().unwrap_or(resource)
}

fn hyphen_splitter() -> Splitter {
    Arc::new(|name| name.split('-').map(str::to_string).collect())
}

/// Configuration provider backed by GCP Secret Manager.
///
/// One-shot [`Provider::load`] performs a single list→compare→fetch→fold
/// cycle; [`Provider::watch`] repeats it on a fixed interval and delivers
/// each newly built tree to the change callback. Both share the same
/// fingerprint store, so a one-shot load and a running watch never duplicate
/// a fetch for an unchanged listing.
pub struct SecretManager {
    poll_interval: Duration,
    splitter: Splitter,
    filter: Option<String>,
    proxy: ClientProxy,
    fingerprints: FingerprintStore,
}

impl SecretManager {
    /// Start building a provider.
    pub fn builder() -> SecretManagerBuilder {
        SecretManagerBuilder::default()
    }

    /// One full poll cycle: list fingerprints, compare against the committed
    /// snapshot, fan-out fetch on change, fold into a tree.
    ///
    /// Returns `Ok(None)` when nothing changed. The snapshot is committed
    /// only after every fetch succeeded, so a failed cycle re-detects the
    /// same change on the next tick and retries the fetches.
    async fn load_cycle(&self, token: &CancellationToken) -> ConfigResult<Option<ConfigTree>> {
        let project = self.proxy.project().await?;
        let store = self.proxy.store().await?;

        let entries = store.list(project, self.filter.as_deref()).await?;
        let snapshot = FingerprintSnapshot::from_entries(entries);
        if !self.fingerprints.changed(&snapshot) {
            return Ok(None);
        }

        tracing::debug!(
            count = snapshot.len(),
            "change detected; fetching latest versions"
        );
        let names: Vec<String> = snapshot.identifiers().cloned().collect();
        let fetched = fetch_all(&store, names, token).await?;
        self.fingerprints.commit(snapshot);

        let mut values = ConfigTree::new();
        for (name, payload) in fetched {
            let segments = (self.splitter)(short_name(&name));
            if segments.is_empty() || (segments.len() == 1 && segments[0].is_empty()) {
                // Malformed or placeholder name: filtered, not an error.
                continue;
            }
            let value = Value::String(String::from_utf8_lossy(&payload).into_owned());
            tree::insert(&mut values, &segments, value);
        }

        Ok(Some(values))
    }
}

#[async_trait]
impl Provider for SecretManager {
    async fn load(&self) -> ConfigResult<ConfigTree> {
        let token = CancellationToken::new();
        Ok(self.load_cycle(&token).await?.unwrap_or_default())
    }

    async fn watch(&self, token: CancellationToken, on_change: ChangeHandler) -> ConfigResult<()> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // tokio's first tick completes immediately; consume it so the first
        // poll happens one full interval after watch starts.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = token.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }

            tokio::select! {
                () = token.cancelled() => return Ok(()),
                outcome = self.load_cycle(&token) => match outcome {
                    Ok(Some(values)) => on_change(values),
                    Ok(None) => {
                        tracing::debug!(provider = %self, "no change detected");
                    }
                    Err(err) => {
                        tracing::warn!(
                            project = self.proxy.cached_project().unwrap_or(""),
                            filter = self.filter.as_deref().unwrap_or(""),
                            error = %err,
                            "error reloading from Secret Manager",
                        );
                    }
                }
            }
        }
    }

    fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SecretManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "secret-manager:{}",
            self.proxy.cached_project().unwrap_or("")
        )
    }
}

impl fmt::Debug for SecretManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretManager")
            .field("poll_interval", &self.poll_interval)
            .field("filter", &self.filter)
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// Builder for [`SecretManager`].
pub struct SecretManagerBuilder {
    poll_interval: Duration,
    splitter: Option<Splitter>,
    filter: Option<String>,
    project: Option<String>,
    identity: Option<Arc<dyn IdentityResolver>>,
    store: Option<Arc<dyn SecretStore>>,
    client_options: ClientOptions,
}

impl Default for SecretManagerBuilder {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            splitter: None,
            filter: None,
            project: None,
            identity: None,
            store: None,
            client_options: ClientOptions::default(),
        }
    }
}

impl SecretManagerBuilder {
    /// Poll cadence for [`Provider::watch`]. Zero falls back to the default
    /// of one minute.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Strategy for splitting a secret's short name into tree path
    /// segments. Defaults to hyphen-delimited.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_splitter<F>(mut self, splitter: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        self.splitter = Some(Arc::new(splitter));
        self
    }

    /// Server-side filter expression restricting which secrets are listed.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Pin the project id, skipping metadata-server resolution.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Pass-through options for constructing the REST client.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_client_options(mut self, options: ClientOptions) -> Self {
        self.client_options = options;
        self
    }

    /// Replace the identity resolver (emulators, tests).
    #[must_use = "builder methods must be chained or built"]
    pub fn with_identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Replace the remote store client (emulators, tests).
    #[must_use = "builder methods must be chained or built"]
    pub fn with_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Finish building the provider.
    pub fn build(self) -> SecretManager {
        let poll_interval = if self.poll_interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            self.poll_interval
        };
        let identity = self
            .identity
            .unwrap_or_else(|| Arc::new(MetadataIdentity::new()));
        let client_options = self.client_options;
        let factory = Box::new(move || {
            RestSecretStore::new(client_options.clone())
                .map(|store| Arc::new(store) as Arc<dyn SecretStore>)
        });

        let mut proxy = ClientProxy::new(identity, factory);
        if let Some(project) = self.project {
            proxy = proxy.with_project(project);
        }
        if let Some(store) = self.store {
            proxy = proxy.with_store(store);
        }

        SecretManager {
            poll_interval,
            splitter: self.splitter.unwrap_or_else(hyphen_splitter),
            filter: self.filter,
            proxy,
            fingerprints: FingerprintStore::default(),
        }
    }
}
