//! Memoization behaviour of scope-level resolution, observed through
//! counting factories.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use crate::argument::{Argument, ArgumentBinder, Arguments, ValueArgument};
use crate::chain::{MatchFactory, Specificity};
use crate::config::ConfigScope;
use crate::context::{ResultContext, StatementContext};
use crate::descriptor::{StaticType, TypeDescriptor};
use crate::error::{BindingError, MappingError};
use crate::mapper::{specialized_row_producer, RowMapper, RowMappers};
use crate::testing::VecCursor;
use crate::value::{RowCursor, SqlValue};

struct TokenBinder {
    label: &'static str,
}

impl ArgumentBinder for TokenBinder {
    fn bind(
        &self,
        _value: &dyn Any,
        _ctx: &StatementContext,
    ) -> Result<Box<dyn Argument>, BindingError> {
        Ok(Box::new(ValueArgument::new(SqlValue::Text(
            self.label.to_string(),
        ))))
    }

    fn renders_value(&self) -> bool {
        true
    }
}

fn counting_factory(
    claimed: TypeDescriptor,
    walks: Arc<AtomicUsize>,
    label: &'static str,
) -> Arc<MatchFactory<Arc<dyn ArgumentBinder>>> {
    Arc::new(MatchFactory::new(Specificity::Exact, move |requested, _| {
        walks.fetch_add(1, Ordering::SeqCst);
        (*requested == claimed).then(|| Arc::new(TokenBinder { label }) as Arc<dyn ArgumentBinder>)
    }))
}

#[test]
fn repeated_resolution_walks_the_chain_once() {
    let scope = ConfigScope::new();
    let walks = Arc::new(AtomicUsize::new(0));
    let factory = counting_factory(i64::descriptor(), Arc::clone(&walks), "int");
    scope.configure::<Arguments>(|a| a.register(factory));

    for _ in 0..3 {
        scope.argument_binder_for(&i64::descriptor()).unwrap();
    }
    assert_eq!(walks.load(Ordering::SeqCst), 1);
}

#[test]
fn confirmed_misses_are_memoized_per_scope() {
    let scope = ConfigScope::new();
    let walks = Arc::new(AtomicUsize::new(0));
    let factory = counting_factory(i64::descriptor(), Arc::clone(&walks), "int");
    scope.configure::<Arguments>(|a| a.register(factory));

    for _ in 0..3 {
        assert!(scope.argument_binder_for(&String::descriptor()).is_err());
    }
    // one walk to confirm the miss, then served from cache
    assert_eq!(walks.load(Ordering::SeqCst), 1);
}

#[test]
fn registration_starts_a_fresh_snapshot() {
    let scope = ConfigScope::new();
    let walks = Arc::new(AtomicUsize::new(0));
    let factory = counting_factory(i64::descriptor(), Arc::clone(&walks), "int");
    scope.configure::<Arguments>(|a| a.register(factory));

    scope.argument_binder_for(&i64::descriptor()).unwrap();
    assert_eq!(walks.load(Ordering::SeqCst), 1);

    let other = counting_factory(String::descriptor(), Arc::new(AtomicUsize::new(0)), "text");
    scope.configure::<Arguments>(|a| a.register(other));

    scope.argument_binder_for(&i64::descriptor()).unwrap();
    assert_eq!(walks.load(Ordering::SeqCst), 2);
}

#[test]
fn caches_are_not_shared_with_derived_scopes() {
    let parent = ConfigScope::new();
    let walks = Arc::new(AtomicUsize::new(0));
    let factory = counting_factory(i64::descriptor(), Arc::clone(&walks), "int");
    parent.configure::<Arguments>(|a| a.register(factory));

    parent.argument_binder_for(&i64::descriptor()).unwrap();
    let child = parent.create_child();
    child.argument_binder_for(&i64::descriptor()).unwrap();

    // the child resolved through its own empty cache
    assert_eq!(walks.load(Ordering::SeqCst), 2);
}

struct CountingRowMapper {
    specializations: Arc<AtomicUsize>,
}

impl RowMapper for CountingRowMapper {
    fn map_row(
        &self,
        _cursor: &dyn RowCursor,
        _ctx: &ResultContext,
    ) -> Result<Box<dyn Any>, MappingError> {
        Ok(Box::new(()))
    }

    fn specialize(
        &self,
        _shape: &crate::value::ResultShape,
        _ctx: &ResultContext,
    ) -> Result<Option<Arc<dyn RowMapper>>, crate::RowbindError> {
        self.specializations.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Arc::new(CountingRowMapper {
            specializations: Arc::clone(&self.specializations),
        })))
    }
}

#[test]
fn successful_specializations_are_memoized_per_shape() {
    struct Marker;
    let requested = TypeDescriptor::scalar::<Marker>();

    let scope = Arc::new(ConfigScope::new());
    let specializations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&specializations);
    let claimed = requested.clone();
    scope.configure::<RowMappers>(|block| {
        block.register(Arc::new(MatchFactory::new(
            Specificity::Exact,
            move |descriptor: &TypeDescriptor, _: &ConfigScope| {
                (*descriptor == claimed).then(|| {
                    Arc::new(CountingRowMapper {
                        specializations: Arc::clone(&counter),
                    }) as Arc<dyn RowMapper>
                })
            },
        )));
    });

    let cursor = VecCursor::new(vec!["a"], vec![]);
    let ctx = ResultContext::new(Arc::clone(&scope), &cursor);

    specialized_row_producer(&ctx, &requested).unwrap();
    specialized_row_producer(&ctx, &requested).unwrap();
    assert_eq!(specializations.load(Ordering::SeqCst), 1);

    // a different shape specializes again
    let wider = VecCursor::new(vec!["a", "b"], vec![]);
    let wider_ctx = ResultContext::new(scope, &wider);
    specialized_row_producer(&wider_ctx, &requested).unwrap();
    assert_eq!(specializations.load(Ordering::SeqCst), 2);
}
