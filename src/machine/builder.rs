//! Builder for constructing state machines.

use super::config::MachineConfig;
use super::error::ConstructionError;
use super::StateMachine;
use crate::core::Dimension;
use crate::mode::ModeSource;
use crate::scheduler::{CommandScheduler, Scheduler};
use crate::subset::{PartialState, SubsetIndex};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Validated parts a machine is assembled from.
pub(crate) struct Blueprint {
    pub(crate) config: MachineConfig,
    pub(crate) dimensions: Vec<Dimension>,
    pub(crate) index: SubsetIndex,
    pub(crate) initial: PartialState,
    pub(crate) auto_managed: Option<usize>,
    pub(crate) mode_source: Option<Box<dyn ModeSource>>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
}

/// Builder for constructing state machines with a fluent API.
///
/// # Example
///
/// ```rust
/// use foxflow::core::Dimension;
/// use foxflow::mode::{ManualModeSource, RobotMode};
/// use foxflow::{MachineConfig, StateMachine};
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// enum Arm { Stowed, Raised }
///
/// let machine = StateMachine::builder()
///     .config(MachineConfig::named("arm"))
///     .dimension(Dimension::robot_mode())
///     .dimension(Dimension::new("arm", Arm::Stowed))
///     .mode_source(ManualModeSource::new(RobotMode::Disabled))
///     .build()
///     .unwrap();
///
/// assert_eq!(machine.name(), "arm");
/// assert_eq!(machine.current_state().get::<RobotMode>(), Some(&RobotMode::Disabled));
/// ```
#[derive(Default)]
pub struct StateMachineBuilder {
    dimensions: Vec<Dimension>,
    mode_source: Option<Box<dyn ModeSource>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    config: MachineConfig,
}

impl StateMachineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dimension. Dimensions keep the order they are added in.
    pub fn dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    /// Add several dimensions at once.
    pub fn dimensions(mut self, dimensions: impl IntoIterator<Item = Dimension>) -> Self {
        self.dimensions.extend(dimensions);
        self
    }

    /// Source of the auto-managed dimension (required if one exists).
    pub fn mode_source(mut self, source: impl ModeSource + 'static) -> Self {
        self.mode_source = Some(Box::new(source));
        self
    }

    /// Scheduler that receives transition commands.
    ///
    /// Defaults to a fresh [`CommandScheduler`] per machine.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    /// Shorthand for setting only the configured name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Build the state machine.
    /// Returns an error if the dimensions are structurally invalid.
    pub fn build(self) -> Result<StateMachine, ConstructionError> {
        let index = SubsetIndex::new(self.dimensions.len())?;

        let mut names = HashSet::new();
        for dimension in &self.dimensions {
            if !names.insert(dimension.name()) {
                return Err(ConstructionError::DuplicateDimension {
                    name: dimension.name().to_string(),
                });
            }
            if dimension.variants.is_empty() {
                return Err(ConstructionError::NoVariants {
                    name: dimension.name().to_string(),
                });
            }
            if !dimension.accepts(dimension.initial()) {
                return Err(ConstructionError::InitialValueRejected {
                    name: dimension.name().to_string(),
                    value: format!("{:?}", dimension.initial()),
                });
            }
        }

        let auto_managed = self.auto_managed()?;
        match (auto_managed, &self.mode_source) {
            (Some(position), None) => {
                return Err(ConstructionError::MissingModeSource {
                    dimension: self.dimensions[position].name().to_string(),
                })
            }
            (None, Some(_)) => return Err(ConstructionError::UnusedModeSource),
            _ => {}
        }

        let initial = index
            .partial(
                self.dimensions
                    .iter()
                    .enumerate()
                    .map(|(position, dimension)| (position, dimension.initial().clone()))
                    .collect(),
            )
            .ok_or(ConstructionError::NoDimensions)?;

        Ok(StateMachine::from_blueprint(Blueprint {
            config: self.config,
            dimensions: self.dimensions,
            index,
            initial,
            auto_managed,
            mode_source: self.mode_source,
            scheduler: self
                .scheduler
                .unwrap_or_else(|| Arc::new(CommandScheduler::new())),
        }))
    }

    fn auto_managed(&self) -> Result<Option<usize>, ConstructionError> {
        let mut found: Option<usize> = None;
        for (position, dimension) in self.dimensions.iter().enumerate() {
            if !dimension.is_auto_managed() {
                continue;
            }
            if let Some(first) = found {
                return Err(ConstructionError::MultipleAutoManaged {
                    first: self.dimensions[first].name().to_string(),
                    second: dimension.name().to_string(),
                });
            }
            found = Some(position);
        }
        Ok(found)
    }
}

impl fmt::Debug for StateMachineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachineBuilder")
            .field("dimensions", &self.dimensions)
            .field("mode_source", &self.mode_source.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{ManualModeSource, RobotMode};
    use crate::subset::MAX_DIMENSIONS;

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    enum Arm {
        Stowed,
    }

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    enum Drive {
        Idle,
    }

    #[test]
    fn builder_requires_dimensions() {
        let result = StateMachineBuilder::new().build();

        assert!(matches!(result, Err(ConstructionError::NoDimensions)));
    }

    #[test]
    fn builder_limits_dimension_count() {
        let result = StateMachineBuilder::new()
            .dimensions((0..=MAX_DIMENSIONS).map(|i| Dimension::new(format!("d{i}"), i as u32)))
            .build();

        assert!(matches!(
            result,
            Err(ConstructionError::TooManyDimensions { count: 17, max: 16 })
        ));
    }

    #[test]
    fn builder_rejects_duplicate_names() {
        let result = StateMachineBuilder::new()
            .dimension(Dimension::new("arm", Arm::Stowed))
            .dimension(Dimension::new("arm", Drive::Idle))
            .build();

        assert_eq!(
            result.err(),
            Some(ConstructionError::DuplicateDimension {
                name: "arm".to_string()
            })
        );
    }

    #[test]
    fn builder_rejects_second_auto_managed_dimension() {
        let result = StateMachineBuilder::new()
            .dimension(Dimension::robot_mode())
            .dimension(Dimension::auto_managed("field_mode", Drive::Idle))
            .mode_source(ManualModeSource::new(RobotMode::Disabled))
            .build();

        assert!(matches!(
            result,
            Err(ConstructionError::MultipleAutoManaged { .. })
        ));
    }

    #[test]
    fn mode_source_and_auto_dimension_come_together() {
        let missing = StateMachineBuilder::new()
            .dimension(Dimension::robot_mode())
            .build();
        assert!(matches!(
            missing,
            Err(ConstructionError::MissingModeSource { .. })
        ));

        let unused = StateMachineBuilder::new()
            .dimension(Dimension::new("arm", Arm::Stowed))
            .mode_source(ManualModeSource::new(RobotMode::Disabled))
            .build();
        assert!(matches!(unused, Err(ConstructionError::UnusedModeSource)));
    }

    #[test]
    fn fluent_api_builds_machine() {
        let machine = StateMachineBuilder::new()
            .name("intake")
            .dimension(Dimension::new("arm", Arm::Stowed))
            .dimension(Dimension::new("drive", Drive::Idle))
            .build()
            .unwrap();

        let state = machine.current_state();
        assert_eq!(machine.name(), "intake");
        assert_eq!(state.get::<Arm>(), Some(&Arm::Stowed));
        assert_eq!(state.get::<Drive>(), Some(&Drive::Idle));
        assert_eq!(state.names(), &["arm".to_string(), "drive".to_string()]);
    }
}
