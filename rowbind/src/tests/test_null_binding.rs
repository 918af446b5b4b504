//! Null binding: typed nulls, the untyped-null fallback, and its
//! per-scope replacement.

use std::fmt;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use crate::argument::{Argument, Arguments, NullArgument};
use crate::builtins::core_scope;
use crate::context::StatementContext;
use crate::error::BindingError;
use crate::testing::{RecordingSink, SinkOp, TypedOnlySink};
use crate::value::{ParameterSink, SqlTypeTag};
use crate::{bind_value, StaticType};

fn ctx() -> StatementContext {
    StatementContext::new(Arc::new(core_scope()))
}

#[test]
fn a_null_with_a_type_code_binds_typed() {
    let ctx = ctx();
    let mut sink = RecordingSink::new();

    let argument = bind_value(&ctx, None, None, Some(SqlTypeTag::Integer)).unwrap();
    argument.apply(0, &mut sink, &ctx).unwrap();
    assert_eq!(sink.ops, vec![(0, SinkOp::Null(SqlTypeTag::Integer))]);
}

#[test]
fn a_null_without_a_type_code_uses_the_default_fallback() {
    let ctx = ctx();
    let mut sink = RecordingSink::new();

    let argument = bind_value(&ctx, None, None, None).unwrap();
    argument.apply(0, &mut sink, &ctx).unwrap();
    assert_eq!(sink.ops, vec![(0, SinkOp::UntypedNull)]);
}

#[test]
fn a_none_value_binds_a_typed_null_through_the_option_binder() {
    let ctx = ctx();
    let mut sink = RecordingSink::new();

    let argument = bind_value(
        &ctx,
        Some(&None::<String>),
        Some(&Option::<String>::descriptor()),
        None,
    )
    .unwrap();
    argument.apply(2, &mut sink, &ctx).unwrap();
    assert_eq!(sink.ops, vec![(2, SinkOp::Null(SqlTypeTag::Text))]);
}

/// Fallback that degrades untyped nulls to text-typed nulls.
struct TextNullFallback;

impl Argument for TextNullFallback {
    fn apply(
        &self,
        position: usize,
        sink: &mut dyn ParameterSink,
        _ctx: &StatementContext,
    ) -> Result<(), BindingError> {
        sink.set_null(position, SqlTypeTag::Text)
    }
}

impl fmt::Display for TextNullFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NULL")
    }
}

#[test]
fn the_untyped_null_fallback_is_scope_configurable() {
    let scope = Arc::new(core_scope());
    scope.configure::<Arguments>(|a| a.set_untyped_null(Arc::new(TextNullFallback)));
    let ctx = StatementContext::new(scope);
    let mut sink = RecordingSink::new();

    let argument = bind_value(&ctx, None, None, None).unwrap();
    argument.apply(0, &mut sink, &ctx).unwrap();
    assert_eq!(sink.ops, vec![(0, SinkOp::Null(SqlTypeTag::Text))]);
}

#[test]
fn fallback_overrides_respect_scope_isolation() {
    let parent = Arc::new(core_scope());
    let child = Arc::new(parent.create_child());
    child.configure::<Arguments>(|a| a.set_untyped_null(Arc::new(TextNullFallback)));

    let mut parent_sink = RecordingSink::new();
    let parent_ctx = StatementContext::new(Arc::clone(&parent));
    NullArgument::untyped()
        .apply(0, &mut parent_sink, &parent_ctx)
        .unwrap();
    assert_eq!(parent_sink.ops, vec![(0, SinkOp::UntypedNull)]);

    let mut child_sink = RecordingSink::new();
    let child_ctx = StatementContext::new(child);
    NullArgument::untyped()
        .apply(0, &mut child_sink, &child_ctx)
        .unwrap();
    assert_eq!(child_sink.ops, vec![(0, SinkOp::Null(SqlTypeTag::Text))]);
}

#[test]
fn sinks_without_untyped_nulls_reject_the_default_fallback() {
    let ctx = ctx();
    let mut sink = TypedOnlySink::new();

    let argument = bind_value(&ctx, None, None, None).unwrap();
    let err = argument.apply(3, &mut sink, &ctx).unwrap_err();
    assert!(matches!(err, BindingError::Rejected { position: 3, .. }));
}
