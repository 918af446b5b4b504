//! Argument binding: from program values to statement parameters
//!
//! An [`ArgumentBinder`] is resolved once per type through the scope's
//! chain and cache; it turns one program value into an [`Argument`], which
//! applies that value to one parameter slot. Null values route through
//! [`NullArgument`]: typed when the caller (or an `Option` binder) supplied
//! a SQL type code, otherwise through the scope-configured untyped-null
//! fallback, because many protocols require a type code even for null.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::chain::{FactoryChain, HandlerFactory};
use crate::config::ScopedConfig;
use crate::context::StatementContext;
use crate::descriptor::{BoundTypes, TypeDescriptor};
use crate::error::{BindingError, RowbindError};
use crate::value::{ParameterSink, SqlTypeTag, SqlValue};

/// One value bound to one statement parameter slot.
///
/// `Display` must yield a loggable representation of the binding.
pub trait Argument: fmt::Display + Send + Sync {
    fn apply(
        &self,
        position: usize,
        sink: &mut dyn ParameterSink,
        ctx: &StatementContext,
    ) -> Result<(), BindingError>;
}

/// Converts one typed program value into an [`Argument`].
///
/// Binders are value-independent and reusable, which is what makes them
/// cacheable per type.
pub trait ArgumentBinder: Send + Sync {
    fn bind(
        &self,
        value: &dyn Any,
        ctx: &StatementContext,
    ) -> Result<Box<dyn Argument>, BindingError>;

    /// Whether arguments from this binder already describe the bound value
    /// in their `Display` output. Declared here, at registration time, so
    /// the binding pipeline never has to probe argument types per call.
    fn renders_value(&self) -> bool {
        false
    }
}

impl fmt::Debug for dyn Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Configuration block holding the argument-binder chain and the
/// untyped-null fallback.
#[derive(Clone)]
pub struct Arguments {
    chain: FactoryChain<Arc<dyn ArgumentBinder>>,
    untyped_null: Arc<dyn Argument>,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            chain: FactoryChain::new(),
            untyped_null: Arc::new(UntypedNullArgument),
        }
    }
}

impl ScopedConfig for Arguments {}

impl Arguments {
    pub fn register(&mut self, factory: Arc<dyn HandlerFactory<Arc<dyn ArgumentBinder>>>) {
        self.chain.register(factory);
    }

    /// Replace the argument used for nulls bound without a type code.
    pub fn set_untyped_null(&mut self, argument: Arc<dyn Argument>) {
        self.untyped_null = argument;
    }

    pub fn untyped_null(&self) -> Arc<dyn Argument> {
        Arc::clone(&self.untyped_null)
    }

    pub(crate) fn chain(&self) -> &FactoryChain<Arc<dyn ArgumentBinder>> {
        &self.chain
    }
}

/// A concrete SQL value argument.
pub struct ValueArgument {
    value: SqlValue,
}

impl ValueArgument {
    pub fn new(value: SqlValue) -> Self {
        Self { value }
    }
}

impl Argument for ValueArgument {
    fn apply(
        &self,
        position: usize,
        sink: &mut dyn ParameterSink,
        _ctx: &StatementContext,
    ) -> Result<(), BindingError> {
        sink.set_value(position, self.value.clone())
    }
}

impl fmt::Display for ValueArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A SQL null, typed when a type code is known.
///
/// Without a type code, application routes through the scope-configured
/// untyped-null fallback exactly once per apply.
pub struct NullArgument {
    tag: Option<SqlTypeTag>,
}

impl NullArgument {
    pub fn typed(tag: SqlTypeTag) -> Self {
        Self { tag: Some(tag) }
    }

    pub fn untyped() -> Self {
        Self { tag: None }
    }

    pub fn tag(&self) -> Option<SqlTypeTag> {
        self.tag
    }
}

impl Argument for NullArgument {
    fn apply(
        &self,
        position: usize,
        sink: &mut dyn ParameterSink,
        ctx: &StatementContext,
    ) -> Result<(), BindingError> {
        match self.tag {
            Some(tag) => sink.set_null(position, tag),
            None => {
                let fallback = ctx.scope().with::<Arguments, _>(|a| a.untyped_null());
                fallback.apply(position, sink, ctx)
            }
        }
    }
}

impl fmt::Display for NullArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NULL")
    }
}

/// Default untyped-null fallback: hand the null to the sink without a type
/// code and let the statement layer decide.
struct UntypedNullArgument;

impl Argument for UntypedNullArgument {
    fn apply(
        &self,
        position: usize,
        sink: &mut dyn ParameterSink,
        _ctx: &StatementContext,
    ) -> Result<(), BindingError> {
        sink.set_untyped_null(position)
    }
}

impl fmt::Display for UntypedNullArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NULL")
    }
}

/// Wrapper giving an opaque argument a human-readable description.
///
/// Applied only when the binder does not declare `renders_value`; the
/// description falls back to the bound type, since erased values carry no
/// text of their own.
pub struct DescribedArgument {
    inner: Box<dyn Argument>,
    description: String,
}

impl DescribedArgument {
    pub fn wrap(
        binder: &dyn ArgumentBinder,
        argument: Box<dyn Argument>,
        bound_type: &TypeDescriptor,
    ) -> Box<dyn Argument> {
        if binder.renders_value() {
            return argument;
        }
        Box::new(Self {
            inner: argument,
            description: format!("{bound_type} argument"),
        })
    }
}

impl Argument for DescribedArgument {
    fn apply(
        &self,
        position: usize,
        sink: &mut dyn ParameterSink,
        ctx: &StatementContext,
    ) -> Result<(), BindingError> {
        self.inner.apply(position, sink, ctx)
    }
}

impl fmt::Display for DescribedArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

/// Binder for a scalar type with a fixed conversion into [`SqlValue`].
pub struct ScalarBinder<T: 'static> {
    convert: fn(&T) -> SqlValue,
}

impl<T: 'static> ScalarBinder<T> {
    pub fn new(convert: fn(&T) -> SqlValue) -> Self {
        Self { convert }
    }
}

impl<T: 'static> ArgumentBinder for ScalarBinder<T> {
    fn bind(
        &self,
        value: &dyn Any,
        _ctx: &StatementContext,
    ) -> Result<Box<dyn Argument>, BindingError> {
        let value = value
            .downcast_ref::<T>()
            .ok_or(BindingError::ValueTypeMismatch {
                expected: std::any::type_name::<T>(),
            })?;
        Ok(Box::new(ValueArgument::new((self.convert)(value))))
    }

    fn renders_value(&self) -> bool {
        true
    }
}

/// Binder for `Option<T>`: present values convert like the scalar binder,
/// absent values become a typed null.
pub struct OptionBinder<T: 'static> {
    convert: fn(&T) -> SqlValue,
    tag: SqlTypeTag,
}

impl<T: 'static> OptionBinder<T> {
    pub fn new(convert: fn(&T) -> SqlValue, tag: SqlTypeTag) -> Self {
        Self { convert, tag }
    }
}

impl<T: 'static> ArgumentBinder for OptionBinder<T> {
    fn bind(
        &self,
        value: &dyn Any,
        _ctx: &StatementContext,
    ) -> Result<Box<dyn Argument>, BindingError> {
        let value = value
            .downcast_ref::<Option<T>>()
            .ok_or(BindingError::ValueTypeMismatch {
                expected: std::any::type_name::<Option<T>>(),
            })?;
        Ok(match value {
            Some(present) => Box::new(ValueArgument::new((self.convert)(present))),
            None => Box::new(NullArgument::typed(self.tag)),
        })
    }

    fn renders_value(&self) -> bool {
        true
    }
}

/// Bind one program value for one parameter slot.
///
/// `value: None` is an explicit SQL null; it needs either `null_tag` or the
/// scope's untyped-null fallback. Otherwise the binder is resolved from the
/// declared descriptor, or from the scope's `BoundTypes` table when no type
/// was declared.
pub fn bind_value(
    ctx: &StatementContext,
    value: Option<&dyn Any>,
    declared: Option<&TypeDescriptor>,
    null_tag: Option<SqlTypeTag>,
) -> Result<Box<dyn Argument>, RowbindError> {
    let Some(value) = value else {
        return Ok(match null_tag {
            Some(tag) => Box::new(NullArgument::typed(tag)),
            None => Box::new(NullArgument::untyped()),
        });
    };

    let requested = match declared {
        Some(descriptor) => descriptor.clone(),
        None => ctx
            .scope()
            .with::<BoundTypes, _>(|table| table.descriptor_of(value))?,
    };

    let binder = ctx.scope().argument_binder_for(&requested)?;
    let argument = binder.bind(value, ctx)?;
    Ok(DescribedArgument::wrap(
        binder.as_ref(),
        argument,
        &requested,
    ))
}
