//! Authoritative mode sources for auto-managed dimensions.
//!
//! An auto-managed dimension is not moved by guards. Each
//! [`StateMachine::poll`](crate::StateMachine::poll) refreshes the machine's
//! [`ModeSource`] and, when its reading differs from the dimension's value,
//! applies that reading before any guard is looked at.

use crate::core::{Dimension, DimensionValue, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// External source of truth for the auto-managed dimension.
pub trait ModeSource: Send {
    /// Re-read the underlying status. Called once per poll.
    fn refresh(&mut self) {}

    /// Latest reading.
    fn current_value(&self) -> Value;
}

/// Operating mode reported by a driver station.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum RobotMode {
    #[default]
    Disabled,
    Autonomous,
    Teleop,
    Test,
}

impl RobotMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

impl fmt::Display for RobotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disabled => "disabled",
            Self::Autonomous => "autonomous",
            Self::Teleop => "teleop",
            Self::Test => "test",
        };
        f.write_str(name)
    }
}

impl Dimension {
    /// The conventional auto-managed `robot_mode` dimension, starting disabled.
    pub fn robot_mode() -> Self {
        Dimension::auto_managed("robot_mode", RobotMode::Disabled)
    }
}

/// Mode source set by hand, for simulation and tests.
///
/// Clones share the reading, so a clone kept by the caller steers the copy
/// owned by the machine.
///
/// ```rust
/// use foxflow::mode::{ManualModeSource, ModeSource, RobotMode};
///
/// let source = ManualModeSource::new(RobotMode::Disabled);
/// let handle = source.clone();
///
/// handle.set(RobotMode::Teleop);
/// assert_eq!(source.get(), RobotMode::Teleop);
/// ```
#[derive(Clone, Debug)]
pub struct ManualModeSource<T> {
    current: Arc<Mutex<T>>,
}

impl<T: DimensionValue + Clone> ManualModeSource<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn set(&self, value: T) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }

    pub fn get(&self) -> T {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T: DimensionValue + Clone> ModeSource for ManualModeSource<T> {
    fn current_value(&self) -> Value {
        Value::new(self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_mode_dimension_is_auto_managed() {
        let dimension = Dimension::robot_mode();

        assert!(dimension.is_auto_managed());
        assert_eq!(dimension.name(), "robot_mode");
        assert_eq!(dimension.initial(), &Value::new(RobotMode::Disabled));
        assert!(dimension.accepts(&Value::new(RobotMode::Teleop)));
    }

    #[test]
    fn manual_source_clones_share_the_reading() {
        let mut source = ManualModeSource::new(RobotMode::Disabled);
        let handle = source.clone();

        handle.set(RobotMode::Autonomous);
        source.refresh();

        assert_eq!(source.current_value(), Value::new(RobotMode::Autonomous));
    }

    #[test]
    fn robot_mode_round_trips_through_serde() {
        let json = serde_json::to_string(&RobotMode::Teleop).unwrap();
        let mode: RobotMode = serde_json::from_str(&json).unwrap();

        assert_eq!(mode, RobotMode::Teleop);
        assert!(mode.is_enabled());
        assert!(!RobotMode::default().is_enabled());
        assert_eq!(RobotMode::Test.to_string(), "test");
    }
}
