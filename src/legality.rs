//! Transition legality over composite states.
//!
//! Legality is decided per dimension and combined with "don't care"
//! semantics: only dimensions present in both the source and the target are
//! checked. A dimension absent from the target is not touched by the
//! transition and can never make it illegal.

use crate::core::{Dimension, Value};
use crate::machine::InvalidTransition;
use crate::subset::PartialState;

/// Legality checks for the dimensions of one machine.
#[derive(Debug, Clone, Copy)]
pub struct Legality<'a> {
    dimensions: &'a [Dimension],
}

impl<'a> Legality<'a> {
    pub fn new(dimensions: &'a [Dimension]) -> Self {
        Self { dimensions }
    }

    /// Whether every dimension shared by `from` and `to` may move.
    ///
    /// With `from` being the full current state this is the composite
    /// transition check; with two partials it is the registration-time check
    /// over their common dimensions.
    pub fn is_legal(&self, from: &PartialState, to: &PartialState) -> bool {
        self.first_violation(from, to).is_none()
    }

    /// Like [`is_legal`](Self::is_legal), reporting the first offending dimension.
    pub fn check(&self, from: &PartialState, to: &PartialState) -> Result<(), InvalidTransition> {
        match self.first_violation(from, to) {
            None => Ok(()),
            Some((dimension, current, next)) => Err(InvalidTransition::Illegal {
                dimension: self.dimensions[dimension].name().to_string(),
                from: format!("{current:?}"),
                to: format!("{next:?}"),
            }),
        }
    }

    /// Whether a single dimension may move from `current` to `next`.
    pub fn dimension_allows(&self, dimension: usize, current: &Value, next: &Value) -> bool {
        let Some(descriptor) = self.dimensions.get(dimension) else {
            return true;
        };
        if descriptor.is_auto_managed() {
            return true;
        }
        let Some(rules) = descriptor.rules_for(current) else {
            return true;
        };

        let same_type = current.kind() == next.kind();
        let state_ok = match &rules.same_type {
            Some(rule) if same_type => rule(current, next),
            _ => true,
        };
        let type_ok = rules
            .cross_variant
            .as_ref()
            .is_none_or(|rule| rule(current, next));

        state_ok && type_ok
    }

    fn first_violation<'s>(
        &self,
        from: &'s PartialState,
        to: &'s PartialState,
    ) -> Option<(usize, &'s Value, &'s Value)> {
        to.iter().find_map(|(dimension, next)| {
            let current = from.get(dimension)?;
            (!self.dimension_allows(dimension, current, next)).then_some((dimension, current, next))
        })
    }
}
