//! Derivation and precedence behaviour of configuration scopes, observed
//! through the resolution surface.

use std::any::Any;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use crate::argument::{Argument, ArgumentBinder, Arguments, ValueArgument};
use crate::chain::{ExactFactory, MatchFactory, Specificity};
use crate::config::ConfigScope;
use crate::context::StatementContext;
use crate::descriptor::{StaticType, TypeDescriptor};
use crate::error::BindingError;
use crate::value::SqlValue;

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

fn register_token(scope: &ConfigScope, claimed: TypeDescriptor, label: &'static str) {
    scope.configure::<Arguments>(|a| {
        a.register(Arc::new(ExactFactory::new(
            claimed,
            Arc::new(TokenBinder { label }) as Arc<dyn ArgumentBinder>,
        )));
    });
}

fn resolve_label(scope: &Arc<ConfigScope>, requested: &TypeDescriptor) -> String {
    let ctx = StatementContext::new(Arc::clone(scope));
    let binder = scope.argument_binder_for(requested).unwrap();
    let argument = binder.bind(&(), &ctx).unwrap();
    argument.to_string()
}

#[test]
fn later_registrations_shadow_earlier_ones_for_the_same_type() {
    let scope = Arc::new(ConfigScope::new());
    register_token(&scope, i64::descriptor(), "first");
    assert_eq!(resolve_label(&scope, &i64::descriptor()), "'first'");

    register_token(&scope, i64::descriptor(), "second");
    assert_eq!(resolve_label(&scope, &i64::descriptor()), "'second'");
}

#[test]
fn overriding_one_type_leaves_other_types_untouched() {
    let scope = Arc::new(ConfigScope::new());
    register_token(&scope, i64::descriptor(), "int");
    register_token(&scope, String::descriptor(), "text");
    register_token(&scope, i64::descriptor(), "int-v2");

    assert_eq!(resolve_label(&scope, &String::descriptor()), "'text'");
    assert_eq!(resolve_label(&scope, &i64::descriptor()), "'int-v2'");
}

#[test]
fn derived_scopes_inherit_registrations_at_derive_time() {
    let parent = Arc::new(ConfigScope::new());
    register_token(&parent, i64::descriptor(), "inherited");

    let child = Arc::new(parent.create_child());
    assert_eq!(resolve_label(&child, &i64::descriptor()), "'inherited'");
}

#[test]
fn child_overrides_never_leak_into_the_parent() {
    let parent = Arc::new(ConfigScope::new());
    register_token(&parent, i64::descriptor(), "parent");

    let child = Arc::new(parent.create_child());
    register_token(&child, i64::descriptor(), "child");

    assert_eq!(resolve_label(&child, &i64::descriptor()), "'child'");
    assert_eq!(resolve_label(&parent, &i64::descriptor()), "'parent'");
}

#[test]
fn parent_registrations_after_derive_never_reach_the_child() {
    let parent = Arc::new(ConfigScope::new());
    register_token(&parent, i64::descriptor(), "before");

    let child = Arc::new(parent.create_child());
    register_token(&parent, i64::descriptor(), "after");

    assert_eq!(resolve_label(&child, &i64::descriptor()), "'before'");
}

#[test]
fn an_exact_claim_beats_a_newer_catch_all() {
    let scope = Arc::new(ConfigScope::new());
    register_token(&scope, i64::descriptor(), "exact");
    scope.configure::<Arguments>(|a| {
        a.register(Arc::new(MatchFactory::new(Specificity::CatchAll, |_, _| {
            Some(Arc::new(TokenBinder { label: "anything" }) as Arc<dyn ArgumentBinder>)
        })));
    });

    assert_eq!(resolve_label(&scope, &i64::descriptor()), "'exact'");
    // unclaimed types still fall through to the catch-all
    assert_eq!(resolve_label(&scope, &String::descriptor()), "'anything'");
}

#[test]
fn qualified_descriptors_resolve_independently_of_their_base() {
    let scope = Arc::new(ConfigScope::new());
    register_token(&scope, String::descriptor(), "plain");
    register_token(
        &scope,
        TypeDescriptor::qualified("json", String::descriptor()),
        "json",
    );

    assert_eq!(resolve_label(&scope, &String::descriptor()), "'plain'");
    assert_eq!(
        resolve_label(
            &scope,
            &TypeDescriptor::qualified("json", String::descriptor())
        ),
        "'json'"
    );
}
