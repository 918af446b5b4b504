//! Ordered factory chains with precedence-aware lookup
//!
//! A [`FactoryChain`] is an ordered, append-only sequence of factories, each
//! of which can claim a [`TypeDescriptor`]. Lookup walks from the most
//! recently registered factory to the oldest, so later registrations shadow
//! earlier ones for the same claim; between claims of different fit,
//! [`Specificity`] decides regardless of registration order.
//!
//! Chains are cloned with a flat copy of their factory handles, so deriving
//! a scope snapshots a chain structurally without copying factories.

use std::fmt;
use std::sync::Arc;

use crate::config::ConfigScope;
use crate::descriptor::{TypeDescriptor, TypeKey};

/// Which handler kind a resolution request is for; carried in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsumerKind {
    Argument,
    ColumnMapper,
    RowMapper,
    Collector,
}

impl fmt::Display for ConsumerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Argument => "argument binder",
            Self::ColumnMapper => "column mapper",
            Self::RowMapper => "row mapper",
            Self::Collector => "collector",
        };
        write!(f, "{name}")
    }
}

/// How closely a factory's claim fits the requested descriptor.
///
/// Ordering is ascending fit: an exact claim always beats a shape claim,
/// which always beats a catch-all, independent of registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Specificity {
    /// Claims by predicate alone.
    CatchAll,
    /// Claims every parametrization of one base type.
    Shape,
    /// Claims one whole descriptor.
    Exact,
}

/// A pure matching function from descriptor to handler.
///
/// Factories must have no side effects beyond returning a handler; they may
/// consult the scope to resolve constituent handlers.
pub trait HandlerFactory<H>: Send + Sync {
    /// Attempt to produce a handler for `requested`; `None` when this
    /// factory does not claim the type.
    fn try_match(&self, requested: &TypeDescriptor, scope: &ConfigScope) -> Option<H>;

    /// Fit of this factory's claims, fixed at construction.
    fn specificity(&self) -> Specificity {
        Specificity::Exact
    }
}

/// Ordered collection of factories for one handler kind.
pub struct FactoryChain<H> {
    factories: Vec<Arc<dyn HandlerFactory<H>>>,
}

impl<H> Default for FactoryChain<H> {
    fn default() -> Self {
        Self {
            factories: Vec::new(),
        }
    }
}

impl<H> Clone for FactoryChain<H> {
    fn clone(&self) -> Self {
        Self {
            factories: self.factories.clone(),
        }
    }
}

impl<H> FactoryChain<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a factory with highest precedence among equal-fit claims.
    pub fn register(&mut self, factory: Arc<dyn HandlerFactory<H>>) {
        self.factories.push(factory);
    }

    /// Walk the chain newest-to-oldest and return the best claim.
    ///
    /// An exact claim short-circuits; otherwise the most specific claim
    /// wins, and among equally specific claims the newest registration
    /// wins.
    pub fn find(&self, requested: &TypeDescriptor, scope: &ConfigScope) -> Option<H> {
        log::trace!(
            "walking {} factories for {requested}",
            self.factories.len()
        );
        let mut best: Option<(Specificity, H)> = None;
        for factory in self.factories.iter().rev() {
            if let Some(handler) = factory.try_match(requested, scope) {
                let fit = factory.specificity();
                if fit == Specificity::Exact {
                    return Some(handler);
                }
                match &best {
                    Some((current, _)) if *current >= fit => {}
                    _ => best = Some((fit, handler)),
                }
            }
        }
        best.map(|(_, handler)| handler)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Factory claiming exactly one descriptor.
pub struct ExactFactory<H> {
    claimed: TypeDescriptor,
    handler: H,
}

impl<H> ExactFactory<H> {
    pub fn new(claimed: TypeDescriptor, handler: H) -> Self {
        Self { claimed, handler }
    }
}

impl<H: Clone + Send + Sync> HandlerFactory<H> for ExactFactory<H> {
    fn try_match(&self, requested: &TypeDescriptor, _scope: &ConfigScope) -> Option<H> {
        (self.claimed == *requested).then(|| self.handler.clone())
    }
}

/// Factory claiming every parametrization of one base type, building the
/// handler from the requested type arguments.
pub struct ShapeFactory<H> {
    base: TypeKey,
    build: Box<dyn Fn(&TypeDescriptor, &ConfigScope) -> Option<H> + Send + Sync>,
}

impl<H> ShapeFactory<H> {
    pub fn new(
        base: TypeKey,
        build: impl Fn(&TypeDescriptor, &ConfigScope) -> Option<H> + Send + Sync + 'static,
    ) -> Self {
        Self {
            base,
            build: Box::new(build),
        }
    }
}

impl<H: Send + Sync> HandlerFactory<H> for ShapeFactory<H> {
    fn try_match(&self, requested: &TypeDescriptor, scope: &ConfigScope) -> Option<H> {
        if requested.base() != Some(self.base) {
            return None;
        }
        (self.build)(requested, scope)
    }

    fn specificity(&self) -> Specificity {
        Specificity::Shape
    }
}

/// Factory claiming by arbitrary predicate, with a declared fit.
pub struct MatchFactory<H> {
    matcher: Box<dyn Fn(&TypeDescriptor, &ConfigScope) -> Option<H> + Send + Sync>,
    specificity: Specificity,
}

impl<H> MatchFactory<H> {
    pub fn new(
        specificity: Specificity,
        matcher: impl Fn(&TypeDescriptor, &ConfigScope) -> Option<H> + Send + Sync + 'static,
    ) -> Self {
        Self {
            matcher: Box::new(matcher),
            specificity,
        }
    }
}

impl<H: Send + Sync> HandlerFactory<H> for MatchFactory<H> {
    fn try_match(&self, requested: &TypeDescriptor, scope: &ConfigScope) -> Option<H> {
        (self.matcher)(requested, scope)
    }

    fn specificity(&self) -> Specificity {
        self.specificity
    }
}

/// Factory claiming only descriptors qualified by one tag, delegating the
/// unqualified descriptor to an inner factory.
pub struct QualifiedFactory<H> {
    tag: &'static str,
    inner: Arc<dyn HandlerFactory<H>>,
}

impl<H> QualifiedFactory<H> {
    pub fn new(tag: &'static str, inner: Arc<dyn HandlerFactory<H>>) -> Self {
        Self { tag, inner }
    }
}

impl<H: Send + Sync> HandlerFactory<H> for QualifiedFactory<H> {
    fn try_match(&self, requested: &TypeDescriptor, scope: &ConfigScope) -> Option<H> {
        match requested {
            TypeDescriptor::Qualified { tag, inner } if *tag == self.tag => {
                self.inner.try_match(inner, scope)
            }
            _ => None,
        }
    }

    fn specificity(&self) -> Specificity {
        self.inner.specificity()
    }
}
