//! Change detection over listed secret fingerprints
//!
//! A [`FingerprintSnapshot`] captures the full observed state of the remote
//! store at one poll instant: every listed secret identifier paired with its
//! version fingerprint (etag). Snapshots are immutable once built and are
//! replaced wholesale; a concurrent reader sees either the previous snapshot
//! or the new one, never a mix.

use crate::client::SecretEntry;
use arc_swap::ArcSwapOption;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable identifier → fingerprint mapping for one poll instant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct FingerprintSnapshot {
    entries: HashMap<String, String>,
}

impl FingerprintSnapshot {
    pub(crate) fn from_entries(entries: Vec<SecretEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.name, entry.etag))
                .collect(),
        }
    }

    /// Identifiers present in this snapshot, in no particular order.
    pub(crate) fn identifiers(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Holds the last committed snapshot and answers "did anything change?".
///
/// The snapshot is swapped atomically as a whole reference, so the one-shot
/// loader and a concurrently running watch loop share it without locking.
#[derive(Debug, Default)]
pub(crate) struct FingerprintStore {
    current: ArcSwapOption<FingerprintSnapshot>,
}

impl FingerprintStore {
    /// Structural, order-independent comparison against the committed
    /// snapshot. The first poll (nothing committed yet) always reports a
    /// change, even for an empty listing.
    pub(crate) fn changed(&self, next: &FingerprintSnapshot) -> bool {
        match self.current.load_full() {
            Some(last) => *last != *next,
            None => true,
        }
    }

    /// Replace the committed snapshot in one atomic swap.
    pub(crate) fn commit(&self, next: FingerprintSnapshot) {
        self.current.store(Some(Arc::new(next)));
    }
}
