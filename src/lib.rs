//! Foxflow: composite state machines for robot control loops
//!
//! The state of a robot is rarely one enum. Foxflow models it as a tuple of
//! independent dimensions (drivetrain mode, arm position, operating mode...)
//! that can be transitioned one at a time or together, under per-dimension
//! legality rules.
//!
//! # Core Concepts
//!
//! - **Dimension**: one independently transitionable slot, see [`core::Dimension`]
//! - **Partial state**: values for some of the dimensions; guards, commands
//!   and triggers are registered against partial states
//! - **Guard**: a predicate sampled by [`StateMachine::poll`]; the first one
//!   that holds, in registration order, selects the next transition
//! - **Command**: a [`scheduler::DeferredAction`] handed to the scheduler when
//!   its transition is applied
//! - **Trigger**: a level condition "this partial state is active", sampled
//!   by an [`trigger::EventLoop`]
//!
//! # Example
//!
//! ```rust
//! use foxflow::core::Dimension;
//! use foxflow::{limits_transitions, partial, StateMachine};
//!
//! #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
//! enum Elevator {
//!     Bottom,
//!     Middle,
//!     Top,
//! }
//!
//! limits_transitions! {
//!     Elevator {
//!         Bottom => [Middle],
//!         Middle => [Bottom, Top],
//!         Top => [Middle],
//!     }
//! }
//!
//! #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
//! enum Intake {
//!     Idle,
//!     Running,
//! }
//!
//! let machine = StateMachine::new(vec![
//!     Dimension::limited("elevator", Elevator::Bottom),
//!     Dimension::new("intake", Intake::Idle),
//! ])
//! .unwrap();
//!
//! // Skipping the middle stage is rejected when registering.
//! let bottom = machine.specify(partial![Elevator::Bottom]).unwrap();
//! assert!(bottom.to(partial![Elevator::Top]).is_err());
//!
//! bottom.to(partial![Elevator::Middle, Intake::Running]).unwrap().always();
//! machine.poll().unwrap();
//!
//! let state = machine.current_state();
//! assert_eq!(state.get::<Elevator>(), Some(&Elevator::Middle));
//! assert_eq!(state.get::<Intake>(), Some(&Intake::Running));
//! ```

mod macros;

pub mod cache;
pub mod core;
pub mod legality;
pub mod machine;
pub mod mode;
pub mod scheduler;
pub mod subset;
pub mod trigger;

// Re-export commonly used types
pub use crate::core::{Dimension, Guard, TransitionCause, Value};
pub use machine::{
    ConstructionError, Error, FromHandle, InvalidTransition, MachineConfig, MisuseError,
    StateMachine, StateMachineBuilder, ToHandle,
};
pub use scheduler::{CommandScheduler, DeferredAction, Scheduler};
pub use subset::{CompositeState, Partial, PartialState};
pub use trigger::{EventLoop, Trigger};
