//! Errors raised while building and driving a state machine.

use thiserror::Error;

/// Errors that can occur when building a state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("No dimensions defined. Add at least one dimension")]
    NoDimensions,

    #[error("Too many dimensions ({count}), at most {max} are supported")]
    TooManyDimensions { count: usize, max: usize },

    #[error("Dimension '{name}' is defined more than once")]
    DuplicateDimension { name: String },

    #[error("Dimension '{name}' accepts no value types")]
    NoVariants { name: String },

    #[error("Initial value {value} is not accepted by dimension '{name}'")]
    InitialValueRejected { name: String, value: String },

    #[error("More than one auto-managed dimension defined ('{first}' and '{second}')")]
    MultipleAutoManaged { first: String, second: String },

    #[error("Auto-managed dimension '{dimension}' has no mode source. Call .mode_source(source)")]
    MissingModeSource { dimension: String },

    #[error("A mode source was given but no dimension is auto-managed")]
    UnusedModeSource,
}

/// A transition that is not allowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTransition {
    #[error("Cannot transition dimension '{dimension}' from {from} to {to}")]
    Illegal {
        dimension: String,
        from: String,
        to: String,
    },

    #[error("Transition from {from} to {to} is marked to fail loudly")]
    FailLoudly { from: String, to: String },
}

/// API calls that make no sense for the machine they are made on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MisuseError {
    #[error("A partial state needs at least one value")]
    EmptyPartial,

    #[error("No dimension is called '{name}'")]
    UnknownDimension { name: String },

    #[error("No dimension accepts values of type {type_name}")]
    UnmatchedValue { type_name: String },

    #[error("Values of type {type_name} fit several dimensions ({candidates:?}), name one explicitly")]
    AmbiguousValue {
        type_name: String,
        candidates: Vec<String>,
    },

    #[error("Dimension '{dimension}' is given more than once")]
    DuplicateDimension { dimension: String },

    #[error("Dimension '{dimension}' does not accept values of type {type_name}")]
    ValueTypeMismatch {
        dimension: String,
        type_name: String,
    },

    #[error("Dimension '{dimension}' is auto-managed and cannot be a transition target")]
    AutoManagedTarget { dimension: String },
}

/// Any error surfaced by the state machine API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error(transparent)]
    Misuse(#[from] MisuseError),

    #[error("Action failed: {0}")]
    Action(String),
}

impl Error {
    /// Whether this is a rejected transition (illegal or fail-loudly).
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_culprit() {
        let error = InvalidTransition::Illegal {
            dimension: "basic".to_string(),
            from: "Start".to_string(),
            to: "End".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Cannot transition dimension 'basic' from Start to End"
        );

        let error = MisuseError::AutoManagedTarget {
            dimension: "robot_mode".to_string(),
        };
        assert!(error.to_string().contains("robot_mode"));
    }

    #[test]
    fn conversions_keep_the_category() {
        let error: Error = InvalidTransition::FailLoudly {
            from: "{}".to_string(),
            to: "{}".to_string(),
        }
        .into();
        assert!(error.is_invalid_transition());

        let error: Error = ConstructionError::NoDimensions.into();
        assert!(!error.is_invalid_transition());
        assert_eq!(
            error.to_string(),
            "No dimensions defined. Add at least one dimension"
        );
    }
}
