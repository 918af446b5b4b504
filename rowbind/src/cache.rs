//! Scope-bounded memoization of resolution results
//!
//! Resolution walks a factory chain and matches descriptors structurally,
//! which is cheap once but wasteful on every bind of a hot type. Each scope
//! therefore memoizes resolved handlers, including confirmed misses, keyed
//! by descriptor. Entries live for the scope's current configuration
//! snapshot; a registration flushes them (see `ConfigScope::configure`).
//!
//! The map must serve concurrent readers when a root scope is shared across
//! connections before any child customization, so it uses a sharded
//! concurrent map of once-cells: reads are lock-free, and each key computes
//! at most once under contention.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::descriptor::TypeDescriptor;

/// Outcome of one chain walk; negative results are memoized too, so a type
/// with no handler fails fast on every subsequent request in this scope.
pub enum Resolved<H> {
    Found(H),
    NoMatch,
}

impl<H: Clone> Clone for Resolved<H> {
    fn clone(&self) -> Self {
        match self {
            Self::Found(handler) => Self::Found(handler.clone()),
            Self::NoMatch => Self::NoMatch,
        }
    }
}

/// Memoized descriptor-to-handler mapping for one consumer kind.
pub struct ResolutionCache<H> {
    entries: DashMap<TypeDescriptor, Arc<OnceLock<Resolved<H>>>>,
}

impl<H> Default for ResolutionCache<H> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<H: Clone> ResolutionCache<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result for `requested`, computing it with
    /// `resolve` on first use.
    ///
    /// The shard guard is released before `resolve` runs, so a factory may
    /// recursively resolve other descriptors through the same cache.
    pub fn get_or_resolve(
        &self,
        requested: &TypeDescriptor,
        resolve: impl FnOnce() -> Option<H>,
    ) -> Resolved<H> {
        let cell = {
            let entry = self.entries.entry(requested.clone()).or_default();
            Arc::clone(entry.value())
        };
        cell.get_or_init(|| {
            log::trace!("cache miss for {requested}, resolving");
            match resolve() {
                Some(handler) => Resolved::Found(handler),
                None => Resolved::NoMatch,
            }
        })
        .clone()
    }

    /// Drop every entry; called when the owning scope starts a new
    /// configuration snapshot.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
