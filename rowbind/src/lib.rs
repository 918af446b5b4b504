//! Rowbind
//!
//! Type-directed binding of program values to SQL statement parameters and
//! mapping of result rows back to program values.
//!
//! ## Architecture
//!
//! Everything hangs off hierarchical [`ConfigScope`]s:
//!
//! - **Type descriptors**: structural, generics-aware resolution keys
//! - **Factory chains**: precedence-ordered registries, one per handler kind
//! - **Resolution caches**: per-scope memoization of chain walks, misses included
//! - **Pipelines**: argument binding, row/column mapping, and collector reduction
//!
//! Scopes derive by copy, so a connection or statement can override rules
//! locally without touching the process-wide root. The statement-execution
//! and result-iteration layers stay behind the [`ParameterSink`] and
//! [`RowCursor`] traits.

pub mod argument;
pub mod builtins;
pub mod cache;
pub mod chain;
pub mod collector;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod mapper;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests;

// Re-export public API
pub use argument::{
    bind_value, Argument, ArgumentBinder, Arguments, DescribedArgument, NullArgument,
    OptionBinder, ScalarBinder, ValueArgument,
};
pub use builtins::{core_scope, install};
pub use cache::{Resolved, ResolutionCache};
pub use chain::{
    ConsumerKind, ExactFactory, FactoryChain, HandlerFactory, MatchFactory, QualifiedFactory,
    ShapeFactory, Specificity,
};
pub use collector::{
    collect_into, collect_rows, map_collector_factory, optional_collector_factory,
    sequence_collector_factory, set_collector_factory, Collector, Collectors, MapReducer,
    OptionalReducer, Reducer, SequenceReducer, SetReducer,
};
pub use config::{ConfigScope, ScopedConfig};
pub use context::{ResultContext, StatementContext};
pub use descriptor::{BoundTypes, StaticType, TypeDescriptor, TypeKey};
pub use error::{
    AmbiguousResultCardinalityError, BindingError, DuplicateColumnNameError, MappingError,
    NoHandlerFoundError, RowbindError, TypeResolutionError,
};
pub use mapper::{
    entry_row_mapper_factory, map_all, map_all_as, row_producer_for, specialized_row_producer,
    CaseChange, ColumnMapper, ColumnMappers, EntryRowMapper, MapMappers, MapRowMapper,
    OptionColumnMapper, RowMapper, RowMappers, ScalarColumnMapper, SingleColumnRowMapper,
};
pub use value::{ParameterSink, ResultShape, RowCursor, SqlTypeTag, SqlValue};
