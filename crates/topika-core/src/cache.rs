//! # Type Cache
//!
//! The in-memory map from type URI to fully-resolved [`TypeModel`], plus
//! the endless-recursion guard used while populating it.
//!
//! The cache is a derived, rebuildable projection of the graph store. It is
//! never time-expired; entries leave only through explicit removal (type
//! deletion or redefinition).
//!
//! ## Concurrency
//!
//! The cache is owned by the engine and reached through `&mut self` only.
//! The exclusive borrow is the single-flight mechanism: two concurrent
//! fetches of one URI cannot exist against one engine, so the recursion
//! guard fires exclusively on true reentrancy, never on a thread race.

use crate::model::TypeModel;
use crate::types::TopikaError;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

// =============================================================================
// TYPE CACHE
// =============================================================================

/// Process-lifetime cache of resolved type models, keyed by type URI.
#[derive(Debug, Clone, Default)]
pub struct TypeCache {
    types: BTreeMap<String, TypeModel>,
}

impl TypeCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached model for the given URI, if present.
    #[must_use]
    pub fn get_if_present(&self, type_uri: &str) -> Option<&TypeModel> {
        self.types.get(type_uri)
    }

    /// Mutable access to a cached model (store engine: view-config
    /// attachment, assoc def insertion).
    pub(crate) fn get_mut(&mut self, type_uri: &str) -> Option<&mut TypeModel> {
        self.types.get_mut(type_uri)
    }

    /// Insert or replace a model under its own URI.
    pub fn put(&mut self, model: TypeModel) {
        self.types.insert(model.uri.clone(), model);
    }

    /// Remove a type from the cache.
    ///
    /// Removal is an exactly-once contract, used on type deletion or
    /// redefinition; removing an absent entry signals a bookkeeping bug and
    /// raises `TypeCacheInconsistency`.
    pub fn remove(&mut self, type_uri: &str) -> Result<TypeModel, TopikaError> {
        info!(type_uri, "removing type from type cache");
        self.types
            .remove(type_uri)
            .ok_or_else(|| TopikaError::TypeCacheInconsistency(type_uri.to_string()))
    }

    /// Drop an entry if present. Used to roll back a partially-populated
    /// entry when a fetch fails after the early insert.
    pub(crate) fn discard(&mut self, type_uri: &str) {
        self.types.remove(type_uri);
    }

    /// Whether the URI is cached.
    #[must_use]
    pub fn contains(&self, type_uri: &str) -> bool {
        self.types.contains_key(type_uri)
    }

    /// Number of cached types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// =============================================================================
// RECURSION GUARD
// =============================================================================

/// Detects a type URI re-entered during its own load.
///
/// Fetching a type may require fetching satellite types; the guard turns an
/// endless mutual recursion into an error. It is a detection mechanism, not
/// a lock (see the module docs for why no lock is needed).
#[derive(Debug, Clone, Default)]
pub struct RecursionGuard {
    load_in_progress: BTreeSet<String>,
}

impl RecursionGuard {
    /// Create an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a load. Fails if the URI is already being loaded.
    pub fn enter(&mut self, type_uri: &str) -> Result<(), TopikaError> {
        if !self.load_in_progress.insert(type_uri.to_string()) {
            return Err(TopikaError::EndlessRecursion(type_uri.to_string()));
        }
        Ok(())
    }

    /// Clear a load registration. Must run on every exit path, success or
    /// failure.
    pub fn leave(&mut self, type_uri: &str) {
        self.load_in_progress.remove(type_uri);
    }

    /// Whether a load of the URI is in progress.
    #[must_use]
    pub fn is_loading(&self, type_uri: &str) -> bool {
        self.load_in_progress.contains(type_uri)
    }
}

// =============================================================================
// TESTS
// =============================================================================
