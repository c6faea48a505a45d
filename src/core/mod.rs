//! Core value types of a composite state machine.
//!
//! This module contains the pieces every other layer builds on:
//! - Type-erased dimension values
//! - Dimension descriptors and their transition-limiting capabilities
//! - Guard predicates for automatic transitions
//! - Bounded transition history

mod dimension;
mod guard;
mod history;
mod value;

pub use dimension::{Dimension, LimitsStateTransitions, LimitsTypeTransitions};
pub use guard::Guard;
pub use history::{TransitionCause, TransitionHistory, TransitionRecord};
pub use value::{DimensionValue, Value};
