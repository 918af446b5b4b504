//! Error types for the resolution and mapping engine
//!
//! One enum (or struct) per concern, aggregated into [`RowbindError`].
//! Every failure here is a hard failure reported to the immediate caller:
//! an unresolvable type is never silently downgraded to a default
//! representation, because guessing a wire representation risks silent data
//! corruption.

use miette::Diagnostic;
use thiserror::Error;

use crate::chain::ConsumerKind;
use crate::descriptor::TypeDescriptor;

/// Unified error for all resolution, binding, mapping, and collecting
/// operations.
#[derive(Error, Diagnostic, Debug)]
pub enum RowbindError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    TypeResolution(#[from] TypeResolutionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    NoHandlerFound(#[from] NoHandlerFoundError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    AmbiguousCardinality(#[from] AmbiguousResultCardinalityError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    DuplicateColumn(#[from] DuplicateColumnNameError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Binding(#[from] BindingError),
}

/// A type signature could not be concretized.
#[derive(Error, Diagnostic, Debug)]
pub enum TypeResolutionError {
    #[error("no type descriptor is registered for runtime type {type_id}")]
    #[diagnostic(
        code(rowbind::types::unregistered_runtime_type),
        help(
            "register the type with BoundTypes::register::<T>() on this scope, \
             or pass a declared TypeDescriptor to the bind call"
        )
    )]
    UnregisteredRuntimeType { type_id: String },
}

/// The resolution chain was exhausted with no match.
///
/// Carries the requested type and consumer kind so the failure can be
/// diagnosed without re-running with tracing enabled.
#[derive(Error, Diagnostic, Debug)]
#[error("no {kind} is registered for type {type_repr}")]
#[diagnostic(
    code(rowbind::resolve::no_handler),
    help("register a matching factory on this scope or re-derive it from one that has it")
)]
pub struct NoHandlerFoundError {
    pub kind: ConsumerKind,
    pub type_repr: String,
}

impl NoHandlerFoundError {
    pub fn new(kind: ConsumerKind, requested: &TypeDescriptor) -> Self {
        Self {
            kind,
            type_repr: requested.to_string(),
        }
    }
}

/// A single-value reduction saw more than one row.
#[derive(Error, Diagnostic, Debug)]
#[error("expected at most one row, but the result contained {rows_seen}")]
#[diagnostic(
    code(rowbind::collect::ambiguous_cardinality),
    help("reduce into a sequence container, or constrain the query to a single row")
)]
pub struct AmbiguousResultCardinalityError {
    pub rows_seen: usize,
}

/// Two result columns normalize to the same name.
#[derive(Error, Diagnostic, Debug)]
#[error("column {name} appears more than once in this result shape")]
#[diagnostic(
    code(rowbind::map::duplicate_column),
    help("alias one of the columns in the query, or change the configured case normalization")
)]
pub struct DuplicateColumnNameError {
    pub name: String,
}

/// A producer failed converting a specific row or column.
#[derive(Error, Diagnostic, Debug)]
pub enum MappingError {
    #[error("column {column} (position {position}) could not be read as {expected}: found {found}")]
    #[diagnostic(code(rowbind::map::column_type))]
    ColumnType {
        column: String,
        position: usize,
        expected: &'static str,
        found: String,
    },

    #[error("column position {position} is out of range for a {width}-column row")]
    #[diagnostic(code(rowbind::map::position_out_of_range))]
    PositionOutOfRange { position: usize, width: usize },

    #[error("row could not be converted to {target}: {reason}")]
    #[diagnostic(code(rowbind::map::row_conversion))]
    RowConversion { target: String, reason: String },
}

/// A binder failed applying a value to a statement parameter slot.
#[derive(Error, Diagnostic, Debug)]
pub enum BindingError {
    #[error("parameter {position} was rejected by the statement: {reason}")]
    #[diagnostic(code(rowbind::bind::rejected))]
    Rejected { position: usize, reason: String },

    #[error("binder for {expected} received a value of a different runtime type")]
    #[diagnostic(
        code(rowbind::bind::value_type_mismatch),
        help("the resolved binder and the bound value disagree; check BoundTypes registrations and declared types")
    )]
    ValueTypeMismatch { expected: &'static str },
}
