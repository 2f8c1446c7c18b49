//! Provider trait for pluggable configuration sources

use crate::error::ConfigResult;
use crate::tree::ConfigTree;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Callback invoked with a freshly built configuration tree whenever a
/// watching provider detects a change.
pub type ChangeHandler = Arc<dyn Fn(ConfigTree) + Send + Sync>;

/// A pluggable configuration source.
///
/// Implementations produce a [`ConfigTree`] either once ([`Provider::load`])
/// or continuously ([`Provider::watch`]). Watch loops are expected to be
/// resilient: per-cycle errors are logged and the loop keeps polling until
/// the cancellation token fires.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Perform a single synchronization cycle and return the resulting tree.
    ///
    /// Returns an empty tree when nothing changed since the last recorded
    /// state; callers needing the previous tree must cache it themselves.
    async fn load(&self) -> ConfigResult<ConfigTree>;

    /// Poll for changes until the token is cancelled, invoking `on_change`
    /// with each newly built tree.
    ///
    /// Returns `Ok(())` on cancellation. Transient per-cycle errors never
    /// terminate the loop.
    async fn watch(&self, token: CancellationToken, on_change: ChangeHandler) -> ConfigResult<()>;

    /// Human-readable provider name for diagnostics.
    fn name(&self) -> String;
}
