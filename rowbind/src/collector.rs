//! Reduction of mapped row streams into containers
//!
//! A [`Collector`] pairs an element type with a [`Reducer`]; resolving a
//! container descriptor yields both, the row pipeline maps each row to the
//! element type, and the reducer folds the elements into the container.
//!
//! Collectors register per concrete container parametrization through the
//! generic factory constructors below; elements cross the reducer boundary
//! erased and are downcast back inside.

use std::any::Any;
use std::collections::HashSet;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::chain::{ExactFactory, FactoryChain, HandlerFactory};
use crate::config::ScopedConfig;
use crate::context::ResultContext;
use crate::descriptor::{StaticType, TypeDescriptor};
use crate::error::{AmbiguousResultCardinalityError, MappingError, RowbindError};
use crate::mapper::specialized_row_producer;
use crate::value::RowCursor;

/// Folds a stream of erased elements into one erased container.
///
/// Reducers are stateless; accumulation state lives in the container value
/// threaded through the calls, so one resolved reducer serves concurrent
/// reductions.
pub trait Reducer: Send + Sync {
    /// A fresh, empty accumulation container.
    fn start(&self) -> Box<dyn Any>;

    fn accumulate(&self, container: &mut dyn Any, element: Box<dyn Any>)
        -> Result<(), RowbindError>;

    /// Convert the accumulation container into the final result value.
    fn finish(&self, container: Box<dyn Any>) -> Result<Box<dyn Any>, RowbindError>;
}

/// A resolved reduction strategy: which element type to map each row to,
/// and how to fold the elements.
#[derive(Clone)]
pub struct Collector {
    element: TypeDescriptor,
    reducer: Arc<dyn Reducer>,
}

impl Collector {
    pub fn new(element: TypeDescriptor, reducer: Arc<dyn Reducer>) -> Self {
        Self { element, reducer }
    }

    pub fn element(&self) -> &TypeDescriptor {
        &self.element
    }

    pub fn reducer(&self) -> &dyn Reducer {
        self.reducer.as_ref()
    }
}

/// Configuration block holding the collector chain.
#[derive(Clone, Default)]
pub struct Collectors {
    chain: FactoryChain<Collector>,
}

impl ScopedConfig for Collectors {}

impl Collectors {
    pub fn register(&mut self, factory: Arc<dyn HandlerFactory<Collector>>) {
        self.chain.register(factory);
    }

    pub(crate) fn chain(&self) -> &FactoryChain<Collector> {
        &self.chain
    }
}

fn element_mismatch<C: 'static>() -> RowbindError {
    MappingError::RowConversion {
        target: std::any::type_name::<C>().to_string(),
        reason: "row producer returned an element of an unexpected runtime type".to_string(),
    }
    .into()
}

/// Folds elements into a `Vec<T>` in row order.
pub struct SequenceReducer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SequenceReducer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SequenceReducer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Reducer for SequenceReducer<T> {
    fn start(&self) -> Box<dyn Any> {
        Box::new(Vec::<T>::new())
    }

    fn accumulate(
        &self,
        container: &mut dyn Any,
        element: Box<dyn Any>,
    ) -> Result<(), RowbindError> {
        let items = container
            .downcast_mut::<Vec<T>>()
            .ok_or_else(element_mismatch::<Vec<T>>)?;
        let element = element.downcast::<T>().map_err(|_| element_mismatch::<Vec<T>>())?;
        items.push(*element);
        Ok(())
    }

    fn finish(&self, container: Box<dyn Any>) -> Result<Box<dyn Any>, RowbindError> {
        Ok(container)
    }
}

/// Folds elements into a `HashSet<T>`; duplicates collapse silently.
pub struct SetReducer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SetReducer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SetReducer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + 'static> Reducer for SetReducer<T> {
    fn start(&self) -> Box<dyn Any> {
        Box::new(HashSet::<T>::new())
    }

    fn accumulate(
        &self,
        container: &mut dyn Any,
        element: Box<dyn Any>,
    ) -> Result<(), RowbindError> {
        let items = container
            .downcast_mut::<HashSet<T>>()
            .ok_or_else(element_mismatch::<HashSet<T>>)?;
        let element = element
            .downcast::<T>()
            .map_err(|_| element_mismatch::<HashSet<T>>())?;
        items.insert(*element);
        Ok(())
    }

    fn finish(&self, container: Box<dyn Any>) -> Result<Box<dyn Any>, RowbindError> {
        Ok(container)
    }
}

/// Folds `(K, V)` entries into an insertion-ordered map; a repeated key is
/// a hard failure, not a silent overwrite.
pub struct MapReducer<K, V> {
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> MapReducer<K, V> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K, V> Default for MapReducer<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + 'static, V: 'static> Reducer for MapReducer<K, V> {
    fn start(&self) -> Box<dyn Any> {
        Box::new(IndexMap::<K, V>::new())
    }

    fn accumulate(
        &self,
        container: &mut dyn Any,
        element: Box<dyn Any>,
    ) -> Result<(), RowbindError> {
        let entries = container
            .downcast_mut::<IndexMap<K, V>>()
            .ok_or_else(element_mismatch::<IndexMap<K, V>>)?;
        let entry = element
            .downcast::<(K, V)>()
            .map_err(|_| element_mismatch::<IndexMap<K, V>>())?;
        let (key, value) = *entry;
        if entries.contains_key(&key) {
            return Err(MappingError::RowConversion {
                target: std::any::type_name::<IndexMap<K, V>>().to_string(),
                reason: "two rows produced the same map key".to_string(),
            }
            .into());
        }
        entries.insert(key, value);
        Ok(())
    }

    fn finish(&self, container: Box<dyn Any>) -> Result<Box<dyn Any>, RowbindError> {
        Ok(container)
    }
}

/// Folds at most one element into an `Option<T>`.
///
/// Zero rows is `None`, one row is `Some`; a second row fails the whole
/// reduction rather than keeping either value.
pub struct OptionalReducer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> OptionalReducer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for OptionalReducer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Reducer for OptionalReducer<T> {
    fn start(&self) -> Box<dyn Any> {
        Box::new(None::<T>)
    }

    fn accumulate(
        &self,
        container: &mut dyn Any,
        element: Box<dyn Any>,
    ) -> Result<(), RowbindError> {
        let slot = container
            .downcast_mut::<Option<T>>()
            .ok_or_else(element_mismatch::<Option<T>>)?;
        if slot.is_some() {
            return Err(AmbiguousResultCardinalityError { rows_seen: 2 }.into());
        }
        let element = element
            .downcast::<T>()
            .map_err(|_| element_mismatch::<Option<T>>())?;
        *slot = Some(*element);
        Ok(())
    }

    fn finish(&self, container: Box<dyn Any>) -> Result<Box<dyn Any>, RowbindError> {
        Ok(container)
    }
}

/// Collector factory for `Vec<T>`.
pub fn sequence_collector_factory<T: StaticType>() -> Arc<dyn HandlerFactory<Collector>> {
    Arc::new(ExactFactory::new(
        Vec::<T>::descriptor(),
        Collector::new(T::descriptor(), Arc::new(SequenceReducer::<T>::new())),
    ))
}

/// Collector factory for `HashSet<T>`.
pub fn set_collector_factory<T>() -> Arc<dyn HandlerFactory<Collector>>
where
    T: StaticType + Eq + Hash,
{
    Arc::new(ExactFactory::new(
        HashSet::<T>::descriptor(),
        Collector::new(T::descriptor(), Arc::new(SetReducer::<T>::new())),
    ))
}

/// Collector factory for `IndexMap<K, V>`, mapping each row to a `(K, V)`
/// entry.
pub fn map_collector_factory<K, V>() -> Arc<dyn HandlerFactory<Collector>>
where
    K: StaticType + Eq + Hash,
    V: StaticType,
{
    Arc::new(ExactFactory::new(
        IndexMap::<K, V>::descriptor(),
        Collector::new(
            <(K, V)>::descriptor(),
            Arc::new(MapReducer::<K, V>::new()),
        ),
    ))
}

/// Collector factory for `Option<T>` with strict at-most-one-row arity.
pub fn optional_collector_factory<T: StaticType>() -> Arc<dyn HandlerFactory<Collector>> {
    Arc::new(ExactFactory::new(
        Option::<T>::descriptor(),
        Collector::new(T::descriptor(), Arc::new(OptionalReducer::<T>::new())),
    ))
}

/// Map every remaining cursor row to the collector's element type and reduce
/// into the requested container.
pub fn collect_rows(
    cursor: &mut dyn RowCursor,
    container: &TypeDescriptor,
    ctx: &ResultContext,
) -> Result<Box<dyn Any>, RowbindError> {
    let collector = ctx.scope().collector_for(container)?;
    let mapper = specialized_row_producer(ctx, collector.element())?;
    let mut acc = collector.reducer().start();
    while cursor.advance() {
        let element = mapper.map_row(cursor, ctx)?;
        collector.reducer().accumulate(acc.as_mut(), element)?;
    }
    collector.reducer().finish(acc)
}

/// Typed variant of [`collect_rows`] for callers that know the container
/// statically.
pub fn collect_into<C: StaticType>(
    cursor: &mut dyn RowCursor,
    ctx: &ResultContext,
) -> Result<C, RowbindError> {
    let requested = C::descriptor();
    collect_rows(cursor, &requested, ctx)?
        .downcast::<C>()
        .map(|container| *container)
        .map_err(|_| {
            MappingError::RowConversion {
                target: requested.to_string(),
                reason: "collector produced a container of an unexpected runtime type".to_string(),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feed<R: Reducer>(reducer: &R, elements: Vec<Box<dyn Any>>) -> Result<Box<dyn Any>, RowbindError> {
        let mut acc = reducer.start();
        for element in elements {
            reducer.accumulate(acc.as_mut(), element)?;
        }
        reducer.finish(acc)
    }

    #[test]
    fn sequence_reducer_preserves_row_order() {
        let reducer = SequenceReducer::<i64>::new();
        let result = feed(&reducer, vec![Box::new(3_i64), Box::new(1_i64), Box::new(2_i64)])
            .unwrap()
            .downcast::<Vec<i64>>()
            .unwrap();
        assert_eq!(*result, vec![3, 1, 2]);
    }

    #[test]
    fn set_reducer_collapses_duplicates() {
        let reducer = SetReducer::<i64>::new();
        let result = feed(&reducer, vec![Box::new(1_i64), Box::new(1_i64), Box::new(2_i64)])
            .unwrap()
            .downcast::<HashSet<i64>>()
            .unwrap();
        assert_eq!(*result, HashSet::from([1, 2]));
    }

    #[test]
    fn map_reducer_rejects_duplicate_keys() {
        let reducer = MapReducer::<String, i64>::new();
        let err = feed(
            &reducer,
            vec![
                Box::new(("a".to_string(), 1_i64)),
                Box::new(("a".to_string(), 2_i64)),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, RowbindError::Mapping(_)));
    }

    #[test]
    fn optional_reducer_handles_zero_and_one_row() {
        let reducer = OptionalReducer::<i64>::new();

        let none = feed(&reducer, vec![]).unwrap().downcast::<Option<i64>>().unwrap();
        assert_eq!(*none, None);

        let one = feed(&reducer, vec![Box::new(7_i64)])
            .unwrap()
            .downcast::<Option<i64>>()
            .unwrap();
        assert_eq!(*one, Some(7));
    }

    #[test]
    fn optional_reducer_fails_on_a_second_row() {
        let reducer = OptionalReducer::<i64>::new();
        let err = feed(&reducer, vec![Box::new(1_i64), Box::new(2_i64)]).unwrap_err();
        assert!(matches!(err, RowbindError::AmbiguousCardinality(_)));
    }

    #[test]
    fn collector_factories_claim_their_exact_container() {
        let scope = crate::config::ConfigScope::new();
        let factory = sequence_collector_factory::<i64>();
        assert!(factory
            .try_match(&Vec::<i64>::descriptor(), &scope)
            .is_some());
        assert!(factory
            .try_match(&Vec::<String>::descriptor(), &scope)
            .is_none());

        let resolved = factory
            .try_match(&Vec::<i64>::descriptor(), &scope)
            .unwrap();
        assert_eq!(resolved.element(), &i64::descriptor());
    }
}
