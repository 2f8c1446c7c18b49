//! Strata Secret Manager provider
//!
//! Synchronizes configuration from GCP Secret Manager. On each poll the
//! provider lists secret fingerprints (etags), compares them against the
//! last committed snapshot, and only on a change fans out one concurrent
//! fetch per secret, folds the flat names into a nested tree, and hands it
//! to the change callback. Unchanged listings transfer no payloads at all.
//!
//! # Example
//!
//! ```rust,no_run
//! use strata_config::Provider;
//! use strata_secretmanager::SecretManager;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> strata_config::ConfigResult<()> {
//! let provider = SecretManager::builder()
//!     .with_poll_interval(Duration::from_secs(30))
//!     .with_filter("labels.app=demo")
//!     .build();
//!
//! // One-shot load.
//! let values = provider.load().await?;
//!
//! // Or poll continuously until cancelled.
//! let token = CancellationToken::new();
//! provider
//!     .watch(token, Arc::new(|values| println!("reloaded: {values:?}")))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![deny(unused_must_use)]

mod client;
mod fetch;
mod fingerprint;
mod identity;
mod manager;
mod rest;

pub use client::{IdentityResolver, SecretEntry, SecretStore};
pub use identity::MetadataIdentity;
pub use manager::{SecretManager, SecretManagerBuilder, Splitter};
pub use rest::{ClientOptions, RestSecretStore};
