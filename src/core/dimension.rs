//! Dimension descriptors and transition-limiting capabilities.
//!
//! A dimension is one independently transitionable slot of a composite
//! state. Its declared type is a set of accepted variant kinds; each kind can
//! optionally limit which values it may move to.

use super::value::{DimensionValue, Value};
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// Restricts transitions between values of the same concrete type.
///
/// Usually implemented by enums, either by hand or with
/// [`limits_transitions!`](crate::limits_transitions).
///
/// ```rust
/// use foxflow::core::LimitsStateTransitions;
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// enum Intake {
///     Idle,
///     Running,
///     Jammed,
/// }
///
/// impl LimitsStateTransitions for Intake {
///     fn can_transition_state(&self, next: &Self) -> bool {
///         !matches!((self, next), (Intake::Jammed, Intake::Running))
///     }
/// }
///
/// assert!(!Intake::Jammed.can_transition_state(&Intake::Running));
/// ```
pub trait LimitsStateTransitions {
    /// Whether moving from `self` to `next` is allowed.
    fn can_transition_state(&self, next: &Self) -> bool;
}

/// Restricts transitions out of a variant kind of an open dimension.
///
/// Used when a dimension accepts several concrete types and a value needs to
/// decide which other kinds it may become. `other` may be of any accepted
/// kind, including the value's own.
pub trait LimitsTypeTransitions {
    /// Whether moving from `self` to `other` is allowed.
    fn can_transition_type(&self, other: &Value) -> bool;
}

pub(crate) type Rule = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Capability set of one variant kind.
#[derive(Clone)]
pub(crate) struct VariantRules {
    pub(crate) kind: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) same_type: Option<Rule>,
    pub(crate) cross_variant: Option<Rule>,
}

impl VariantRules {
    fn new<T: DimensionValue>() -> Self {
        Self {
            kind: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            same_type: None,
            cross_variant: None,
        }
    }

    pub(crate) fn is_constrained(&self) -> bool {
        self.same_type.is_some() || self.cross_variant.is_some()
    }
}

/// Descriptor of one dimension: name, initial value, accepted kinds and
/// their capabilities.
///
/// ```rust
/// use foxflow::core::{Dimension, LimitsStateTransitions};
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// enum Gear {
///     Low,
///     High,
/// }
///
/// impl LimitsStateTransitions for Gear {
///     fn can_transition_state(&self, next: &Self) -> bool {
///         self != next
///     }
/// }
///
/// let plain = Dimension::new("gear", Gear::Low);
/// let limited = Dimension::limited("gear", Gear::Low);
///
/// assert!(!plain.is_constrained());
/// assert!(limited.is_constrained());
/// ```
#[derive(Clone)]
pub struct Dimension {
    pub(crate) name: String,
    pub(crate) initial: Value,
    pub(crate) variants: Vec<VariantRules>,
    pub(crate) auto_managed: bool,
}

impl Dimension {
    /// Unconstrained dimension accepting values of `T`.
    pub fn new<T: DimensionValue>(name: impl Into<String>, initial: T) -> Self {
        Self {
            name: name.into(),
            initial: Value::new(initial),
            variants: vec![VariantRules::new::<T>()],
            auto_managed: false,
        }
    }

    /// Dimension whose `T` values limit same-type transitions.
    pub fn limited<T>(name: impl Into<String>, initial: T) -> Self
    where
        T: DimensionValue + LimitsStateTransitions,
    {
        Self::new(name, initial).limits_state::<T>()
    }

    /// Dimension whose value is driven by an external mode source each poll.
    ///
    /// Auto-managed dimensions are never constrained. Only the mode source
    /// moves them; guards and forced transitions may not target them.
    pub fn auto_managed<T: DimensionValue>(name: impl Into<String>, initial: T) -> Self {
        let mut dimension = Self::new(name, initial);
        dimension.auto_managed = true;
        dimension
    }

    /// Accept values of another kind `T` in this dimension.
    pub fn variant<T: DimensionValue>(mut self) -> Self {
        self.variant_mut::<T>();
        self
    }

    /// Attach the same-type rule of `T`, accepting `T` if not already accepted.
    pub fn limits_state<T>(mut self) -> Self
    where
        T: DimensionValue + LimitsStateTransitions,
    {
        let rule: Rule = Arc::new(|from: &Value, to: &Value| {
            match (from.downcast_ref::<T>(), to.downcast_ref::<T>()) {
                (Some(from), Some(to)) => from.can_transition_state(to),
                _ => true,
            }
        });
        self.variant_mut::<T>().same_type = Some(rule);
        self
    }

    /// Attach the cross-variant rule of `T`, accepting `T` if not already accepted.
    pub fn limits_type<T>(mut self) -> Self
    where
        T: DimensionValue + LimitsTypeTransitions,
    {
        let rule: Rule = Arc::new(|from: &Value, to: &Value| {
            from.downcast_ref::<T>()
                .is_none_or(|from| from.can_transition_type(to))
        });
        self.variant_mut::<T>().cross_variant = Some(rule);
        self
    }

    /// Dimension name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Initial value.
    pub fn initial(&self) -> &Value {
        &self.initial
    }

    /// Whether the value is sourced from an external mode source.
    pub fn is_auto_managed(&self) -> bool {
        self.auto_managed
    }

    /// Whether any accepted kind limits its transitions.
    pub fn is_constrained(&self) -> bool {
        !self.auto_managed && self.variants.iter().any(VariantRules::is_constrained)
    }

    /// Whether `value` is of an accepted kind.
    pub fn accepts(&self, value: &Value) -> bool {
        self.rules_for(value).is_some()
    }

    pub(crate) fn rules_for(&self, value: &Value) -> Option<&VariantRules> {
        let kind = value.kind();
        self.variants.iter().find(|rules| rules.kind == kind)
    }

    pub(crate) fn accepts_kind(&self, kind: TypeId) -> bool {
        self.variants.iter().any(|rules| rules.kind == kind)
    }

    fn variant_mut<T: DimensionValue>(&mut self) -> &mut VariantRules {
        let kind = TypeId::of::<T>();
        let position = match self.variants.iter().position(|rules| rules.kind == kind) {
            Some(position) => position,
            None => {
                self.variants.push(VariantRules::new::<T>());
                self.variants.len() - 1
            }
        };
        &mut self.variants[position]
    }
}

impl fmt::Debug for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self.variants.iter().map(|rules| rules.type_name).collect();
        f.debug_struct("Dimension")
            .field("name", &self.name)
            .field("initial", &self.initial)
            .field("kinds", &kinds)
            .field("auto_managed", &self.auto_managed)
            .finish()
    }
}
