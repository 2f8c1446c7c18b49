//! Strata Config - pluggable configuration loading
//!
//! This crate defines the surface that configuration providers plug into:
//! the [`Provider`] trait for one-shot and watching sources, the nested
//! [`ConfigTree`] data model, and the shared error taxonomy.
//!
//! Concrete providers (such as the Secret Manager provider in
//! `strata-secretmanager`) implement [`Provider`] and fold their flat key
//! spaces into nested trees with [`tree::insert`].

#![deny(unused_must_use)]
#![warn(missing_docs)]

pub mod error;
pub mod provider;
pub mod tree;

pub use error::{ConfigError, ConfigResult};
pub use provider::{ChangeHandler, Provider};
pub use tree::ConfigTree;
