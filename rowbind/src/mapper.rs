//! Row and column producers: from result cursors to program values
//!
//! A [`RowMapper`] converts one whole row into one value; a
//! [`ColumnMapper`] converts one column. Both resolve through the same
//! chain-and-cache mechanism as argument binders; when no row mapper claims
//! a type, a column mapper for the same type is adapted to read column 0.
//!
//! Producers may specialize once per result shape to precompute per-column
//! work; specialized producers are memoized per `(type, shape)` in the
//! scope, because one type can map differently against different column
//! sets.

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::chain::{ConsumerKind, FactoryChain, HandlerFactory, MatchFactory, Specificity};
use crate::config::{ConfigScope, ScopedConfig};
use crate::context::ResultContext;
use crate::descriptor::{StaticType, TypeDescriptor};
use crate::error::{DuplicateColumnNameError, MappingError, NoHandlerFoundError, RowbindError};
use crate::value::{ResultShape, RowCursor, SqlValue};

/// Converts one result column into one typed value.
pub trait ColumnMapper: Send + Sync {
    fn map_column(
        &self,
        cursor: &dyn RowCursor,
        position: usize,
        ctx: &ResultContext,
    ) -> Result<Box<dyn Any>, MappingError>;
}

/// Converts one result row into one typed value.
pub trait RowMapper: Send + Sync {
    fn map_row(
        &self,
        cursor: &dyn RowCursor,
        ctx: &ResultContext,
    ) -> Result<Box<dyn Any>, MappingError>;

    /// Precompute per-shape state, returning a producer to use for every
    /// row of this shape; `None` means this producer needs no
    /// specialization.
    fn specialize(
        &self,
        _shape: &ResultShape,
        _ctx: &ResultContext,
    ) -> Result<Option<Arc<dyn RowMapper>>, RowbindError> {
        Ok(None)
    }
}

/// Configuration block holding the column-mapper chain.
#[derive(Clone, Default)]
pub struct ColumnMappers {
    chain: FactoryChain<Arc<dyn ColumnMapper>>,
}

impl ScopedConfig for ColumnMappers {}

impl ColumnMappers {
    pub fn register(&mut self, factory: Arc<dyn HandlerFactory<Arc<dyn ColumnMapper>>>) {
        self.chain.register(factory);
    }

    pub(crate) fn chain(&self) -> &FactoryChain<Arc<dyn ColumnMapper>> {
        &self.chain
    }
}

/// Configuration block holding the row-mapper chain.
#[derive(Clone, Default)]
pub struct RowMappers {
    chain: FactoryChain<Arc<dyn RowMapper>>,
}

impl ScopedConfig for RowMappers {}

impl RowMappers {
    pub fn register(&mut self, factory: Arc<dyn HandlerFactory<Arc<dyn RowMapper>>>) {
        self.chain.register(factory);
    }

    pub(crate) fn chain(&self) -> &FactoryChain<Arc<dyn RowMapper>> {
        &self.chain
    }
}

/// Column-name case normalization applied by the map producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseChange {
    /// Leave names as the cursor reports them.
    #[default]
    Nop,
    Lower,
    Upper,
}

impl CaseChange {
    pub fn apply(&self, name: &str) -> String {
        match self {
            Self::Nop => name.to_string(),
            Self::Lower => name.to_lowercase(),
            Self::Upper => name.to_uppercase(),
        }
    }
}

/// Configuration block for the generic map producer.
#[derive(Debug, Clone, Default)]
pub struct MapMappers {
    case_change: CaseChange,
}

impl ScopedConfig for MapMappers {}

impl MapMappers {
    pub fn case_change(&self) -> CaseChange {
        self.case_change
    }

    pub fn set_case_change(&mut self, case_change: CaseChange) {
        self.case_change = case_change;
    }
}

/// Scalar column producer with a fixed extraction from [`SqlValue`].
///
/// The extractor returns the unconsumed value on mismatch so the error can
/// show what was actually found.
pub struct ScalarColumnMapper<T: 'static> {
    extract: fn(SqlValue) -> Result<T, SqlValue>,
}

impl<T: 'static> ScalarColumnMapper<T> {
    pub fn new(extract: fn(SqlValue) -> Result<T, SqlValue>) -> Self {
        Self { extract }
    }
}

fn column_value(
    cursor: &dyn RowCursor,
    position: usize,
) -> Result<SqlValue, MappingError> {
    cursor
        .value_at(position)
        .ok_or(MappingError::PositionOutOfRange {
            position,
            width: cursor.column_count(),
        })
}

fn column_name(cursor: &dyn RowCursor, position: usize) -> String {
    cursor
        .column_label(position)
        .unwrap_or("?")
        .to_string()
}

impl<T: 'static> ColumnMapper for ScalarColumnMapper<T> {
    fn map_column(
        &self,
        cursor: &dyn RowCursor,
        position: usize,
        _ctx: &ResultContext,
    ) -> Result<Box<dyn Any>, MappingError> {
        let value = column_value(cursor, position)?;
        match (self.extract)(value) {
            Ok(extracted) => Ok(Box::new(extracted)),
            Err(found) => Err(MappingError::ColumnType {
                column: column_name(cursor, position),
                position,
                expected: std::any::type_name::<T>(),
                found: found.to_string(),
            }),
        }
    }
}

/// `Option<T>` column producer: nulls become `None`, everything else goes
/// through the scalar extraction.
pub struct OptionColumnMapper<T: 'static> {
    extract: fn(SqlValue) -> Result<T, SqlValue>,
}

impl<T: 'static> OptionColumnMapper<T> {
    pub fn new(extract: fn(SqlValue) -> Result<T, SqlValue>) -> Self {
        Self { extract }
    }
}

impl<T: 'static> ColumnMapper for OptionColumnMapper<T> {
    fn map_column(
        &self,
        cursor: &dyn RowCursor,
        position: usize,
        _ctx: &ResultContext,
    ) -> Result<Box<dyn Any>, MappingError> {
        let value = column_value(cursor, position)?;
        if value.is_null() {
            return Ok(Box::new(None::<T>));
        }
        match (self.extract)(value) {
            Ok(extracted) => Ok(Box::new(Some(extracted))),
            Err(found) => Err(MappingError::ColumnType {
                column: column_name(cursor, position),
                position,
                expected: std::any::type_name::<Option<T>>(),
                found: found.to_string(),
            }),
        }
    }
}

/// Adapts a column producer into a row producer reading column 0.
pub struct SingleColumnRowMapper {
    inner: Arc<dyn ColumnMapper>,
}

impl SingleColumnRowMapper {
    pub fn new(inner: Arc<dyn ColumnMapper>) -> Self {
        Self { inner }
    }
}

impl RowMapper for SingleColumnRowMapper {
    fn map_row(
        &self,
        cursor: &dyn RowCursor,
        ctx: &ResultContext,
    ) -> Result<Box<dyn Any>, MappingError> {
        self.inner.map_column(cursor, 0, ctx)
    }
}

/// Row producer for `(K, V)` entries read from the first two columns.
pub struct EntryRowMapper<K: 'static, V: 'static> {
    key: Arc<dyn ColumnMapper>,
    value: Arc<dyn ColumnMapper>,
    _marker: std::marker::PhantomData<fn() -> (K, V)>,
}

impl<K: 'static, V: 'static> EntryRowMapper<K, V> {
    pub fn new(key: Arc<dyn ColumnMapper>, value: Arc<dyn ColumnMapper>) -> Self {
        Self {
            key,
            value,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<K: 'static, V: 'static> RowMapper for EntryRowMapper<K, V> {
    fn map_row(
        &self,
        cursor: &dyn RowCursor,
        ctx: &ResultContext,
    ) -> Result<Box<dyn Any>, MappingError> {
        let entry_mismatch = || MappingError::RowConversion {
            target: std::any::type_name::<(K, V)>().to_string(),
            reason: "column producer returned an unexpected runtime type".to_string(),
        };
        let key = self
            .key
            .map_column(cursor, 0, ctx)?
            .downcast::<K>()
            .map_err(|_| entry_mismatch())?;
        let value = self
            .value
            .map_column(cursor, 1, ctx)?
            .downcast::<V>()
            .map_err(|_| entry_mismatch())?;
        Ok(Box::new((*key, *value)))
    }
}

/// Row-mapper factory for `(K, V)` entries, resolving the key and value
/// column producers from the scope at match time.
pub fn entry_row_mapper_factory<K, V>() -> Arc<dyn HandlerFactory<Arc<dyn RowMapper>>>
where
    K: StaticType,
    V: StaticType,
{
    Arc::new(MatchFactory::new(Specificity::Exact, |requested, scope| {
        if *requested != <(K, V)>::descriptor() {
            return None;
        }
        let key = scope.column_mapper_for(&K::descriptor()).ok()?;
        let value = scope.column_mapper_for(&V::descriptor()).ok()?;
        Some(Arc::new(EntryRowMapper::<K, V>::new(key, value)) as Arc<dyn RowMapper>)
    }))
}

/// The generic map producer: one row becomes an ordered name-to-value map.
///
/// Column labels are enumerated once per result shape, normalized with the
/// scope's configured [`CaseChange`], and rejected on duplicates, since a
/// name-keyed map cannot hold two values under one key.
pub struct MapRowMapper;

impl MapRowMapper {
    fn keyed_for(
        shape: &ResultShape,
        ctx: &ResultContext,
    ) -> Result<KeyedMapRowMapper, RowbindError> {
        let case_change = ctx.scope().with::<MapMappers, _>(|c| c.case_change());
        let mut labels = Vec::with_capacity(shape.width());
        let mut seen = HashSet::with_capacity(shape.width());
        for raw in shape.labels() {
            let name = case_change.apply(raw);
            if !seen.insert(name.clone()) {
                return Err(DuplicateColumnNameError { name }.into());
            }
            labels.push(name);
        }
        Ok(KeyedMapRowMapper { labels })
    }
}

impl RowMapper for MapRowMapper {
    fn map_row(
        &self,
        cursor: &dyn RowCursor,
        ctx: &ResultContext,
    ) -> Result<Box<dyn Any>, MappingError> {
        // unspecialized path; the pipeline normally specializes first
        let shape = ResultShape::from_cursor(cursor);
        let keyed = Self::keyed_for(&shape, ctx).map_err(|e| MappingError::RowConversion {
            target: "Map<String, SqlValue>".to_string(),
            reason: e.to_string(),
        })?;
        keyed.map_row(cursor, ctx)
    }

    fn specialize(
        &self,
        shape: &ResultShape,
        ctx: &ResultContext,
    ) -> Result<Option<Arc<dyn RowMapper>>, RowbindError> {
        Ok(Some(Arc::new(Self::keyed_for(shape, ctx)?)))
    }
}

struct KeyedMapRowMapper {
    labels: Vec<String>,
}

impl RowMapper for KeyedMapRowMapper {
    fn map_row(
        &self,
        cursor: &dyn RowCursor,
        _ctx: &ResultContext,
    ) -> Result<Box<dyn Any>, MappingError> {
        let mut row = IndexMap::with_capacity(self.labels.len());
        for (position, label) in self.labels.iter().enumerate() {
            let value = column_value(cursor, position)?;
            row.insert(label.clone(), value);
        }
        Ok(Box::new(row))
    }
}

/// Resolve a row producer for `requested`, falling back to a single-column
/// read when no row mapper claims the type.
pub fn row_producer_for(
    scope: &ConfigScope,
    requested: &TypeDescriptor,
) -> Result<Arc<dyn RowMapper>, RowbindError> {
    if let Ok(mapper) = scope.row_mapper_for(requested) {
        return Ok(mapper);
    }
    let column = scope
        .column_mapper_for(requested)
        .map_err(|_| NoHandlerFoundError::new(ConsumerKind::RowMapper, requested))?;
    Ok(Arc::new(SingleColumnRowMapper::new(column)))
}

/// Resolve and specialize a row producer for the context's result shape,
/// memoizing successful specializations per `(type, shape)`.
pub fn specialized_row_producer(
    ctx: &ResultContext,
    requested: &TypeDescriptor,
) -> Result<Arc<dyn RowMapper>, RowbindError> {
    let scope = ctx.scope();
    if let Some(mapper) = scope.cached_specialization(requested, ctx.shape()) {
        return Ok(mapper);
    }
    let resolved = row_producer_for(scope, requested)?;
    let mapper = match resolved.specialize(ctx.shape(), ctx)? {
        Some(specialized) => specialized,
        None => resolved,
    };
    scope.store_specialization(requested, ctx.shape(), &mapper);
    Ok(mapper)
}

/// Map every remaining row of the cursor to the requested type.
pub fn map_all(
    cursor: &mut dyn RowCursor,
    requested: &TypeDescriptor,
    ctx: &ResultContext,
) -> Result<Vec<Box<dyn Any>>, RowbindError> {
    let mapper = specialized_row_producer(ctx, requested)?;
    let mut rows = Vec::new();
    while cursor.advance() {
        rows.push(mapper.map_row(cursor, ctx)?);
    }
    Ok(rows)
}

/// Typed variant of [`map_all`] for callers that know the target statically.
pub fn map_all_as<T: StaticType>(
    cursor: &mut dyn RowCursor,
    ctx: &ResultContext,
) -> Result<Vec<T>, RowbindError> {
    let requested = T::descriptor();
    map_all(cursor, &requested, ctx)?
        .into_iter()
        .map(|row| {
            row.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
                MappingError::RowConversion {
                    target: requested.to_string(),
                    reason: "row producer returned an unexpected runtime type".to_string(),
                }
                .into()
            })
        })
        .collect()
}
