//! Concurrent fan-out retrieval with fail-fast semantics
//!
//! One task per identifier, no concurrency cap: the changed set is assumed
//! small relative to runtime limits. The first task to fail cancels all
//! siblings through a shared child token and its error wins; later failures
//! are dropped. Every spawned task is joined before returning, so no work
//! leaks past the call boundary.

use crate::client::SecretStore;
use crate::manager::short_name;
use std::collections::HashMap;
use std::sync::Arc;
use strata_config::{ConfigError, ConfigResult};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Retrieve the latest payload of every identifier concurrently.
///
/// All-or-nothing: either every requested identifier is present in the
/// returned map, or the call fails with the first captured error.
/// Cancelling `parent` cancels all outstanding retrievals promptly.
pub(crate) async fn fetch_all(
    store: &Arc<dyn SecretStore>,
    names: Vec<String>,
    parent: &CancellationToken,
) -> ConfigResult<HashMap<String, Vec<u8>>> {
    let token = parent.child_token();
    let mut tasks = JoinSet::new();

    for name in names {
        let store = Arc::clone(store);
        let task_token = token.clone();
        tasks.spawn(async move {
            let fetched = tokio::select! {
                () = task_token.cancelled() => Err(ConfigError::fetch_failed(
                    short_name(&name),
                    "cancelled before completion",
                )),
                res = store.access_latest(&name) => res,
            };
            fetched.map(|payload| (name, payload))
        });
    }

    let mut values = HashMap::new();
    let mut first_error: Option<ConfigError> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok((name, payload))) => {
                values.insert(name, payload);
            }
            Ok(Err(err)) => {
                if first_error.is_none() {
                    first_error = Some(err);
                    token.cancel();
                }
            }
            Err(join_err) => {
                if first_error.is_none() {
                    first_error = Some(ConfigError::watch_error(format!(
                        "fetch task panicked: {join_err}"
                    )));
                    token.cancel();
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(values),
    }
}
