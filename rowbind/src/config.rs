//! Hierarchical configuration scopes
//!
//! A [`ConfigScope`] is a keyed container of configuration blocks: one
//! factory chain per handler kind plus ad hoc blocks such as case
//! normalization. Scopes derive by copy: a child snapshots the parent's
//! blocks at creation and the two are causally independent afterwards, so a
//! connection or statement can override rules locally without mutating the
//! process-wide root.
//!
//! Blocks materialize lazily with their defaults, at most once per scope
//! per kind; defaults must be deterministic and side-effect-free so two
//! identical scopes behave identically. The sole contract a block needs for
//! scoping to work is `Clone` producing an independent copy.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::argument::{ArgumentBinder, Arguments};
use crate::cache::{Resolved, ResolutionCache};
use crate::chain::ConsumerKind;
use crate::collector::{Collector, Collectors};
use crate::descriptor::TypeDescriptor;
use crate::error::NoHandlerFoundError;
use crate::mapper::{ColumnMapper, ColumnMappers, RowMapper, RowMappers};
use crate::value::ResultShape;

/// A configuration kind that can live in a scope.
///
/// `Default` supplies the lazy per-scope instance; `Clone` is the
/// independent-deep-copy contract that copy-on-derive relies on.
pub trait ScopedConfig: Default + Clone + Send + Sync + 'static {}

/// Type-erased storage for one configuration block.
trait Slot: Any + Send + Sync {
    fn clone_slot(&self) -> Arc<dyn Slot>;
    fn as_any(&self) -> &dyn Any;
}

impl<C: ScopedConfig> Slot for C {
    fn clone_slot(&self) -> Arc<dyn Slot> {
        Arc::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Per-scope memoization: one resolution cache per handler kind, plus the
/// result-shape-keyed cache of specialized row producers.
struct ScopeCaches {
    arguments: ResolutionCache<Arc<dyn ArgumentBinder>>,
    column_mappers: ResolutionCache<Arc<dyn ColumnMapper>>,
    row_mappers: ResolutionCache<Arc<dyn RowMapper>>,
    collectors: ResolutionCache<Collector>,
    specialized_rows: DashMap<(TypeDescriptor, ResultShape), Arc<dyn RowMapper>>,
}

impl ScopeCaches {
    fn new() -> Self {
        Self {
            arguments: ResolutionCache::new(),
            column_mappers: ResolutionCache::new(),
            row_mappers: ResolutionCache::new(),
            collectors: ResolutionCache::new(),
            specialized_rows: DashMap::new(),
        }
    }

    /// A registration started a new configuration snapshot; memoized
    /// results from the old snapshot must not survive it.
    fn flush(&self) {
        self.arguments.clear();
        self.column_mappers.clear();
        self.row_mappers.clear();
        self.collectors.clear();
        self.specialized_rows.clear();
    }
}

/// One hierarchical configuration and resolution-cache unit, tied to one
/// unit of work (process root, connection, or statement).
pub struct ConfigScope {
    slots: RwLock<HashMap<TypeId, Arc<dyn Slot>>>,
    caches: ScopeCaches,
}

impl Default for ConfigScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigScope {
    /// An empty scope with no blocks materialized and no core rules
    /// installed; see `builtins::install` for the core rule set.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            caches: ScopeCaches::new(),
        }
    }

    /// Derive a child scope from a snapshot of this scope's blocks.
    ///
    /// Every materialized block is copied through its `Clone` contract at
    /// this instant; later mutation of either scope is invisible to the
    /// other. Caches start empty in the child: memoized results are owned
    /// by the scope that produced them.
    pub fn create_child(&self) -> ConfigScope {
        let copied = self
            .slots
            .read()
            .unwrap()
            .iter()
            .map(|(key, slot)| (*key, slot.clone_slot()))
            .collect();
        log::trace!("derived child scope");
        ConfigScope {
            slots: RwLock::new(copied),
            caches: ScopeCaches::new(),
        }
    }

    /// Fetch the block of kind `C`, materializing its default on first use.
    fn slot<C: ScopedConfig>(&self) -> Arc<dyn Slot> {
        if let Some(slot) = self.slots.read().unwrap().get(&TypeId::of::<C>()) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().unwrap();
        let slot = slots
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Arc::new(C::default()) as Arc<dyn Slot>);
        Arc::clone(slot)
    }

    /// Read access to the block of kind `C`.
    ///
    /// No lock is held while `f` runs, so `f` may resolve handlers through
    /// this scope.
    pub fn with<C: ScopedConfig, R>(&self, f: impl FnOnce(&C) -> R) -> R {
        let slot = self.slot::<C>();
        let block = slot
            .as_any()
            .downcast_ref::<C>()
            .expect("config slot holds its registered kind");
        f(block)
    }

    /// Mutate this scope's own block of kind `C`.
    ///
    /// The block is cloned, mutated, and swapped back in, so readers in
    /// other threads only ever observe a complete before or after state.
    /// Mutation starts a new configuration snapshot: all memoized
    /// resolution results of this scope are flushed.
    pub fn configure<C: ScopedConfig>(&self, f: impl FnOnce(&mut C)) {
        let mut owned: C = self.with::<C, C>(|block| block.clone());
        f(&mut owned);
        self.slots
            .write()
            .unwrap()
            .insert(TypeId::of::<C>(), Arc::new(owned) as Arc<dyn Slot>);
        self.caches.flush();
    }

    /// Resolve an argument binder for `requested` through the cache and
    /// chain; a confirmed miss is memoized and reported as a hard failure.
    pub fn argument_binder_for(
        &self,
        requested: &TypeDescriptor,
    ) -> Result<Arc<dyn ArgumentBinder>, NoHandlerFoundError> {
        let resolved = self.caches.arguments.get_or_resolve(requested, || {
            self.with::<Arguments, _>(|block| block.chain().find(requested, self))
        });
        match resolved {
            Resolved::Found(binder) => Ok(binder),
            Resolved::NoMatch => Err(NoHandlerFoundError::new(ConsumerKind::Argument, requested)),
        }
    }

    pub fn column_mapper_for(
        &self,
        requested: &TypeDescriptor,
    ) -> Result<Arc<dyn ColumnMapper>, NoHandlerFoundError> {
        let resolved = self.caches.column_mappers.get_or_resolve(requested, || {
            self.with::<ColumnMappers, _>(|block| block.chain().find(requested, self))
        });
        match resolved {
            Resolved::Found(mapper) => Ok(mapper),
            Resolved::NoMatch => Err(NoHandlerFoundError::new(
                ConsumerKind::ColumnMapper,
                requested,
            )),
        }
    }

    pub fn row_mapper_for(
        &self,
        requested: &TypeDescriptor,
    ) -> Result<Arc<dyn RowMapper>, NoHandlerFoundError> {
        let resolved = self.caches.row_mappers.get_or_resolve(requested, || {
            self.with::<RowMappers, _>(|block| block.chain().find(requested, self))
        });
        match resolved {
            Resolved::Found(mapper) => Ok(mapper),
            Resolved::NoMatch => Err(NoHandlerFoundError::new(ConsumerKind::RowMapper, requested)),
        }
    }

    pub fn collector_for(
        &self,
        requested: &TypeDescriptor,
    ) -> Result<Collector, NoHandlerFoundError> {
        let resolved = self.caches.collectors.get_or_resolve(requested, || {
            self.with::<Collectors, _>(|block| block.chain().find(requested, self))
        });
        match resolved {
            Resolved::Found(collector) => Ok(collector),
            Resolved::NoMatch => Err(NoHandlerFoundError::new(ConsumerKind::Collector, requested)),
        }
    }

    /// Specialized row producer memoized for one result shape, if present.
    pub(crate) fn cached_specialization(
        &self,
        requested: &TypeDescriptor,
        shape: &ResultShape,
    ) -> Option<Arc<dyn RowMapper>> {
        self.caches
            .specialized_rows
            .get(&(requested.clone(), shape.clone()))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Memoize a successful specialization for one result shape.
    /// Specialization failures are never retained.
    pub(crate) fn store_specialization(
        &self,
        requested: &TypeDescriptor,
        shape: &ResultShape,
        mapper: &Arc<dyn RowMapper>,
    ) {
        self.caches
            .specialized_rows
            .insert((requested.clone(), shape.clone()), Arc::clone(mapper));
    }
}
