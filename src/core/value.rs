//! Type-erased dimension values.
//!
//! Every dimension of a composite state holds a value of some concrete Rust
//! type. The machine stores them behind [`Value`], which keeps structural
//! equality and hashing so partial states can be used as map keys.

use std::any::{Any, TypeId};
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Trait for values that can occupy a dimension.
///
/// Implemented automatically for every `Any + Debug + Eq + Hash + Send + Sync`
/// type, so plain enums and small records work out of the box:
///
/// ```rust
/// use foxflow::core::Value;
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// enum Arm {
///     Stowed,
///     Raised,
/// }
///
/// let value = Value::new(Arm::Raised);
/// assert_eq!(value.downcast_ref::<Arm>(), Some(&Arm::Raised));
/// assert_ne!(value, Value::new(Arm::Stowed));
/// ```
pub trait DimensionValue: Any + Debug + Send + Sync {
    /// Upcast for downcasting back to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Structural equality across erased values of possibly different types.
    fn dyn_eq(&self, other: &dyn DimensionValue) -> bool;

    /// Feed the concrete type and the value into `state`.
    fn dyn_hash(&self, state: &mut dyn Hasher);

    /// Name of the concrete type, for diagnostics.
    fn type_name(&self) -> &'static str;
}

impl<T> DimensionValue for T
where
    T: Any + Debug + Eq + Hash + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn DimensionValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A cheaply clonable, immutable dimension value.
#[derive(Clone)]
pub struct Value(Arc<dyn DimensionValue>);

impl Value {
    /// Wrap a concrete value. Wrapping a `Value` again returns a clone of it.
    pub fn new<T: DimensionValue>(value: T) -> Self {
        if let Some(existing) = (&value as &dyn Any).downcast_ref::<Value>() {
            return existing.clone();
        }
        Self(Arc::new(value))
    }

    /// Borrow the concrete value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Check whether the concrete value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// `TypeId` of the concrete value (its variant kind).
    pub fn kind(&self) -> TypeId {
        self.0.as_any().type_id()
    }

    /// Name of the concrete type.
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dyn_hash(state);
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(self.0.as_ref(), f)
    }
}
