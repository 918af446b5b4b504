//! Structural type descriptors used as resolution keys
//!
//! A [`TypeDescriptor`] identifies a possibly-generic program type as a value:
//! an erased base type plus its ordered type arguments. Descriptors have
//! structural equality and hashing so they can key caches and registries.
//! The shape set is closed (scalar, parametrized, array, qualified) and
//! matched by pattern dispatch; there is no runtime reflection.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;

use crate::config::ScopedConfig;
use crate::error::TypeResolutionError;

/// Identity of an erased Rust type: its [`TypeId`] plus a name for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for a concrete Rust type, named after the type itself.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Key for a marker type carrying an explicit display name.
    ///
    /// Used for container constructors (`Vec`, `Option`, ...) where the
    /// marker type's own path would make poor diagnostics.
    pub fn tagged<T: 'static>(name: &'static str) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", short_name(self.name))
    }
}

/// Strip the module path from a type name, leaving the final segment.
fn short_name(full: &str) -> &str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

/// Erased constructor markers for parametrized container descriptors.
///
/// Each marker stands for one container shape independent of its element
/// types, so `Vec<i64>` and `Vec<String>` share a base key and differ only
/// in their type arguments.
pub mod containers {
    /// Sequence constructor (`Vec<T>`).
    pub enum Sequence {}
    /// Set constructor (`HashSet<T>`).
    pub enum SetOf {}
    /// Ordered mapping constructor (`IndexMap<K, V>`).
    pub enum MapOf {}
    /// Optional constructor (`Option<T>`).
    pub enum OptionOf {}
    /// Key/value entry constructor (`(K, V)`).
    pub enum EntryOf {}
}

/// Structural, generics-aware identifier for a program type.
///
/// Immutable; two descriptors are equal iff their base types and all type
/// arguments are recursively equal, and hashing is consistent with equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// A non-generic type: `i64`, `String`, `SqlValue`.
    Scalar(TypeKey),
    /// A generic type applied to concrete arguments: `Vec<i64>`, `Option<String>`.
    Parametrized {
        base: TypeKey,
        args: Vec<TypeDescriptor>,
    },
    /// A homogeneous array of one element type.
    Array(Box<TypeDescriptor>),
    /// A descriptor refined by an auxiliary tag; tagged descriptors are
    /// distinct resolution keys from their unqualified form.
    Qualified {
        tag: &'static str,
        inner: Box<TypeDescriptor>,
    },
}

impl TypeDescriptor {
    /// Descriptor of a type that describes itself via [`StaticType`].
    pub fn of<T: StaticType>() -> Self {
        T::descriptor()
    }

    /// A scalar descriptor for a concrete Rust type.
    pub fn scalar<T: 'static>() -> Self {
        Self::Scalar(TypeKey::of::<T>())
    }

    pub fn parametrized(base: TypeKey, args: Vec<TypeDescriptor>) -> Self {
        Self::Parametrized { base, args }
    }

    /// `Vec<element>`.
    pub fn sequence_of(element: TypeDescriptor) -> Self {
        Self::Parametrized {
            base: TypeKey::tagged::<containers::Sequence>("Vec"),
            args: vec![element],
        }
    }

    /// `HashSet<element>`.
    pub fn set_of(element: TypeDescriptor) -> Self {
        Self::Parametrized {
            base: TypeKey::tagged::<containers::SetOf>("HashSet"),
            args: vec![element],
        }
    }

    /// `IndexMap<key, value>`.
    pub fn map_of(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::Parametrized {
            base: TypeKey::tagged::<containers::MapOf>("Map"),
            args: vec![key, value],
        }
    }

    /// `Option<inner>`.
    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Parametrized {
            base: TypeKey::tagged::<containers::OptionOf>("Option"),
            args: vec![inner],
        }
    }

    /// A `(key, value)` row entry.
    pub fn entry_of(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::Parametrized {
            base: TypeKey::tagged::<containers::EntryOf>("Entry"),
            args: vec![key, value],
        }
    }

    pub fn array_of(element: TypeDescriptor) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn qualified(tag: &'static str, inner: TypeDescriptor) -> Self {
        Self::Qualified {
            tag,
            inner: Box::new(inner),
        }
    }

    /// The erased base type, if this shape has one.
    pub fn base(&self) -> Option<TypeKey> {
        match self {
            Self::Scalar(key) => Some(*key),
            Self::Parametrized { base, .. } => Some(*base),
            Self::Array(_) => None,
            Self::Qualified { inner, .. } => inner.base(),
        }
    }

    /// The ordered generic arguments; empty for non-generic shapes.
    pub fn type_arguments(&self) -> &[TypeDescriptor] {
        match self {
            Self::Parametrized { args, .. } => args,
            _ => &[],
        }
    }

    /// This descriptor with any qualification tags stripped.
    pub fn unqualified(&self) -> &TypeDescriptor {
        match self {
            Self::Qualified { inner, .. } => inner.unqualified(),
            other => other,
        }
    }

    pub fn is_qualified(&self) -> bool {
        matches!(self, Self::Qualified { .. })
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(key) => write!(f, "{key}"),
            Self::Parametrized { base, args } => {
                write!(f, "{base}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Self::Array(element) => write!(f, "[{element}]"),
            Self::Qualified { tag, inner } => write!(f, "#{tag} {inner}"),
        }
    }
}

/// Types that can describe themselves as a [`TypeDescriptor`].
///
/// This is the declared-type entry point: callers supply fully concrete
/// types at the point of binding or mapping, and the blanket container
/// implementations compose element descriptors structurally.
pub trait StaticType: 'static {
    fn descriptor() -> TypeDescriptor;
}

macro_rules! scalar_static_type {
    ($($ty:ty),* $(,)?) => {
        $(impl StaticType for $ty {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::scalar::<$ty>()
            }
        })*
    };
}

scalar_static_type!(bool, u8, i16, i32, i64, f32, f64, String);

impl<T: StaticType> StaticType for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::optional(T::descriptor())
    }
}

impl<T: StaticType> StaticType for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::sequence_of(T::descriptor())
    }
}

impl<T: StaticType + Eq + Hash> StaticType for HashSet<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::set_of(T::descriptor())
    }
}

impl<K: StaticType + Eq + Hash, V: StaticType> StaticType for IndexMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map_of(K::descriptor(), V::descriptor())
    }
}

impl<K: StaticType, V: StaticType> StaticType for (K, V) {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::entry_of(K::descriptor(), V::descriptor())
    }
}

/// Scope-configured table from erased runtime types to their descriptors.
///
/// When a value is bound without a declared type, only its [`TypeId`] is
/// recoverable; this table concretizes it. A miss is a hard
/// [`TypeResolutionError`], never a guessed representation.
#[derive(Debug, Clone, Default)]
pub struct BoundTypes {
    descriptors: HashMap<TypeId, TypeDescriptor>,
}

impl BoundTypes {
    pub fn register<T: StaticType>(&mut self) {
        self.descriptors.insert(TypeId::of::<T>(), T::descriptor());
    }

    /// Register an explicit descriptor for a runtime type, overriding any
    /// previous registration.
    pub fn register_as<T: 'static>(&mut self, descriptor: TypeDescriptor) {
        self.descriptors.insert(TypeId::of::<T>(), descriptor);
    }

    pub fn descriptor_of(&self, value: &dyn Any) -> Result<TypeDescriptor, TypeResolutionError> {
        self.descriptors
            .get(&value.type_id())
            .cloned()
            .ok_or_else(|| TypeResolutionError::UnregisteredRuntimeType {
                type_id: format!("{:?}", value.type_id()),
            })
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.descriptors.contains_key(&TypeId::of::<T>())
    }
}

impl ScopedConfig for BoundTypes {}
