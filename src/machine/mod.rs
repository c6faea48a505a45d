//! The composite state machine.
//!
//! A [`StateMachine`] holds one value per dimension. Transitions are
//! registered between partial states: a guard or command registered from
//! `{arm: Stowed}` applies whatever the other dimensions hold. Each
//! [`poll`](StateMachine::poll) applies at most one transition.
//!
//! # Example
//!
//! ```rust
//! use foxflow::core::Dimension;
//! use foxflow::scheduler::DeferredAction;
//! use foxflow::{partial, StateMachine};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
//! enum Arm { Stowed, Raised }
//!
//! #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
//! enum Claw { Open, Closed }
//!
//! let machine = StateMachine::new(vec![
//!     Dimension::new("arm", Arm::Stowed),
//!     Dimension::new("claw", Claw::Open),
//! ])
//! .unwrap();
//!
//! let button = Arc::new(AtomicBool::new(false));
//! let pressed = Arc::clone(&button);
//! machine
//!     .specify(partial![Arm::Stowed])
//!     .unwrap()
//!     .to(partial![Arm::Raised, Claw::Closed])
//!     .unwrap()
//!     .when(move || pressed.load(Ordering::SeqCst))
//!     .run(DeferredAction::run_once(|| println!("raising")));
//!
//! machine.poll().unwrap();
//! assert_eq!(machine.current_state().get::<Arm>(), Some(&Arm::Stowed));
//!
//! button.store(true, Ordering::SeqCst);
//! machine.poll().unwrap();
//! assert_eq!(machine.current_state().get::<Arm>(), Some(&Arm::Raised));
//! assert_eq!(machine.current_state().get::<Claw>(), Some(&Claw::Closed));
//! ```

mod builder;
mod config;
mod error;
mod handles;

pub use builder::StateMachineBuilder;
pub use config::MachineConfig;
pub use error::{ConstructionError, Error, InvalidTransition, MisuseError};
pub use handles::{FromHandle, ToHandle};

use crate::cache::{CommandCache, CommandTable, FailLoudlyTable, GuardCache, GuardTable, Sequence};
use crate::core::{Dimension, Guard, TransitionCause, TransitionHistory, TransitionRecord};
use crate::legality::Legality;
use crate::mode::ModeSource;
use crate::scheduler::{DeferredAction, Scheduler};
use crate::subset::{resolve, CompositeState, Partial, PartialState, SubsetIndex};
use crate::trigger::{ActiveSet, EventLoop, Trigger, TriggerTable};
use builder::Blueprint;
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, trace, warn};

/// Everything that changes while the machine runs.
struct MachineCore {
    state: PartialState,
    from_enabled: Vec<bool>,
    to_enabled: Vec<bool>,
    next_sequence: Sequence,
    guards: GuardTable,
    commands: CommandTable,
    fail_loudly: FailLoudlyTable,
    guard_cache: Arc<GuardCache>,
    command_cache: Arc<CommandCache>,
    triggers: TriggerTable,
    history: TransitionHistory,
    mode_source: Option<Box<dyn ModeSource>>,
}

impl MachineCore {
    fn take_sequence(&mut self) -> Sequence {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

struct Shared {
    name: String,
    dimensions: Vec<Dimension>,
    names: Arc<[String]>,
    index: SubsetIndex,
    auto_managed: Option<usize>,
    scheduler: Arc<dyn Scheduler>,
    active: ActiveSet,
    core: Mutex<MachineCore>,
}

/// Handle to a composite state machine.
///
/// Clones share the same machine. Guards and commands run without the
/// machine's internal lock held, so they may read the machine; a guard must
/// not register transitions or poll the machine it belongs to.
#[derive(Clone)]
pub struct StateMachine {
    shared: Arc<Shared>,
}

impl StateMachine {
    /// Start building a machine.
    pub fn builder() -> StateMachineBuilder {
        StateMachineBuilder::new()
    }

    /// Machine over `dimensions` with the default scheduler and config.
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, ConstructionError> {
        StateMachineBuilder::new().dimensions(dimensions).build()
    }

    /// Machine with a single dimension.
    pub fn single(dimension: Dimension) -> Result<Self, ConstructionError> {
        StateMachineBuilder::new().dimension(dimension).build()
    }

    fn from_blueprint(blueprint: Blueprint) -> Self {
        let Blueprint {
            config,
            dimensions,
            index,
            initial,
            auto_managed,
            mode_source,
            scheduler,
        } = blueprint;

        let names: Arc<[String]> = dimensions.iter().map(|d| d.name().to_string()).collect();
        let subsets = index.len();
        let core = MachineCore {
            state: initial,
            from_enabled: vec![false; subsets],
            to_enabled: vec![false; subsets],
            next_sequence: 0,
            guards: GuardTable::default(),
            commands: CommandTable::default(),
            fail_loudly: FailLoudlyTable::default(),
            guard_cache: Arc::default(),
            command_cache: Arc::default(),
            triggers: TriggerTable::default(),
            history: TransitionHistory::with_capacity(config.history_capacity),
            mode_source,
        };

        info!(
            machine = %config.name,
            dimensions = dimensions.len(),
            subsets,
            auto_managed = auto_managed.map(|position| dimensions[position].name()),
            "state machine created"
        );

        Self {
            shared: Arc::new(Shared {
                name: config.name,
                dimensions,
                names,
                index,
                auto_managed,
                scheduler,
                active: Arc::new(RwLock::new(HashSet::new())),
                core: Mutex::new(core),
            }),
        }
    }

    /// Configured machine name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Dimension descriptors, in declaration order.
    pub fn dimensions(&self) -> &[Dimension] {
        &self.shared.dimensions
    }

    /// Every non-empty subset of the dimensions.
    pub fn subsets(&self) -> &SubsetIndex {
        &self.shared.index
    }

    /// Scheduler receiving this machine's commands.
    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::clone(&self.shared.scheduler)
    }

    /// Snapshot of every dimension's value.
    pub fn current_state(&self) -> CompositeState {
        let core = self.shared.lock();
        self.shared.composite(&core.state)
    }

    /// Whether every value of `partial` matches the current state.
    pub fn is_active(&self, partial: Partial) -> Result<bool, Error> {
        let partial = self.resolve(&partial)?;
        Ok(self.shared.lock().state.covers(&partial))
    }

    /// Snapshot of the recorded transitions.
    pub fn history(&self) -> TransitionHistory {
        self.shared.lock().history.clone()
    }

    /// Begin a registration from `partial`.
    ///
    /// Only resolves the partial; nothing is registered until a guard,
    /// command or trigger is attached.
    pub fn specify(&self, partial: Partial) -> Result<FromHandle<'_>, Error> {
        let from = self.resolve(&partial)?;
        Ok(FromHandle::new(self, from))
    }

    /// Action that forces a transition to `partial` each time it executes.
    ///
    /// The action is run-once and ignores the scheduler's disable signal. It
    /// is still legality checked; a rejected transition is returned as the
    /// action's error.
    pub fn transition_to(&self, partial: Partial) -> Result<DeferredAction, Error> {
        let target = self.resolve(&partial)?;
        self.reject_auto_managed(&target)?;

        let name = format!("{}: transition to {:?}", self.shared.name, target);
        let machine = Arc::downgrade(&self.shared);
        let action = DeferredAction::try_run_once(move || match machine.upgrade() {
            Some(shared) => StateMachine { shared }.update_state(&target, TransitionCause::Forced),
            None => Ok(()),
        });
        Ok(action.ignoring_disable(true).named(name))
    }

    /// Apply at most one transition.
    ///
    /// A changed reading of the auto-managed dimension wins over every guard.
    /// Otherwise the first guard, in registration order, that holds selects
    /// the target. Returns what caused the transition, or `None` if nothing
    /// moved.
    pub fn poll(&self) -> Result<Option<TransitionCause>, Error> {
        let guards = {
            let mut core = self.shared.lock();
            if let Some(next) = self.shared.mode_change(&mut core)? {
                let commands = self
                    .shared
                    .apply(&mut core, &next, TransitionCause::AutoManaged)?;
                drop(core);
                self.shared.dispatch(commands)?;
                return Ok(Some(TransitionCause::AutoManaged));
            }
            Arc::clone(&core.guard_cache)
        };

        // Guards are sampled without the lock so they may read the machine.
        let Some(target) = guards.first_ready() else {
            return Ok(None);
        };
        self.update_state(target, TransitionCause::Guard)?;
        Ok(Some(TransitionCause::Guard))
    }

    /// Repeating action that polls this machine on every scheduler tick.
    pub fn poll_action(&self) -> DeferredAction {
        let machine = Arc::downgrade(&self.shared);
        DeferredAction::try_run(move || match machine.upgrade() {
            Some(shared) => StateMachine { shared }.poll().map(|_| ()),
            None => Ok(()),
        })
        .ignoring_disable(true)
        .named(format!("{}: poll", self.shared.name))
    }

    fn update_state(&self, next: &PartialState, cause: TransitionCause) -> Result<(), Error> {
        let commands = {
            let mut core = self.shared.lock();
            self.shared.apply(&mut core, next, cause)?
        };
        self.shared.dispatch(commands)
    }

    fn resolve(&self, partial: &Partial) -> Result<PartialState, MisuseError> {
        resolve(partial, &self.shared.dimensions, &self.shared.index)
    }

    fn reject_auto_managed(&self, target: &PartialState) -> Result<(), MisuseError> {
        match self.shared.auto_managed {
            Some(position) if target.contains(position) => Err(MisuseError::AutoManagedTarget {
                dimension: self.shared.dimensions[position].name().to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn register_guard(&self, from: &PartialState, to: &PartialState, guard: Guard) {
        let mut core = self.shared.lock();
        let sequence = core.take_sequence();
        core.guards.insert(sequence, from.clone(), to.clone(), guard);
        self.shared.after_registration(&mut core, from);
    }

    fn register_command(&self, from: &PartialState, to: &PartialState, action: DeferredAction) {
        let mut core = self.shared.lock();
        let sequence = core.take_sequence();
        core.commands.insert(sequence, from.clone(), to.clone(), action);
        self.shared.enable_to(&mut core, to);
        self.shared.after_registration(&mut core, from);
    }

    fn register_fail_loudly(&self, from: &PartialState, to: &PartialState) {
        let mut core = self.shared.lock();
        core.fail_loudly.insert(from.clone(), to.clone());
        self.shared.after_registration(&mut core, from);
    }

    fn trigger(&self, from: &PartialState, event_loop: Arc<EventLoop>) -> Trigger {
        let mut core = self.shared.lock();
        self.shared.after_registration(&mut core, from);
        core.triggers
            .get_or_insert(from.clone(), event_loop, &self.shared.active, &self.shared.scheduler)
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MachineCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn composite(&self, state: &PartialState) -> CompositeState {
        CompositeState::new(state.clone(), Arc::clone(&self.names))
    }

    fn enable_from(&self, core: &mut MachineCore, partial: &PartialState) {
        let slot = &mut core.from_enabled[partial.subset().index()];
        if !*slot {
            *slot = true;
            trace!(machine = %self.name, subset = ?partial.subset(), role = "from", "role enabled");
        }
    }

    fn enable_to(&self, core: &mut MachineCore, partial: &PartialState) {
        let slot = &mut core.to_enabled[partial.subset().index()];
        if !*slot {
            *slot = true;
            trace!(machine = %self.name, subset = ?partial.subset(), role = "to", "role enabled");
        }
    }

    /// Enable the from role of `from` and, if it is live, rebuild the caches
    /// so the registration is visible on the next poll.
    fn after_registration(&self, core: &mut MachineCore, from: &PartialState) {
        self.enable_from(core, from);
        if core.state.covers(from) {
            self.refresh(core);
        }
    }

    /// Recompute the active from-set and rebuild both caches from scratch.
    fn refresh(&self, core: &mut MachineCore) {
        let active: HashSet<PartialState> = self
            .index
            .projections(&core.state, &core.from_enabled)
            .into_iter()
            .collect();
        core.guard_cache = GuardCache::regenerate(&active, &core.guards);
        core.command_cache = CommandCache::regenerate(&active, &core.commands);
        trace!(
            machine = %self.name,
            active = active.len(),
            guards = core.guard_cache.len(),
            commands = core.command_cache.len(),
            "caches regenerated"
        );
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = active;
    }

    /// Reading of the mode source, if it differs from the current value.
    fn mode_change(&self, core: &mut MachineCore) -> Result<Option<PartialState>, Error> {
        let (Some(position), Some(source)) = (self.auto_managed, core.mode_source.as_mut()) else {
            return Ok(None);
        };
        source.refresh();
        let reading = source.current_value();
        if core.state.get(position) == Some(&reading) {
            return Ok(None);
        }

        let dimension = &self.dimensions[position];
        if !dimension.accepts(&reading) {
            return Err(MisuseError::ValueTypeMismatch {
                dimension: dimension.name().to_string(),
                type_name: reading.type_name().to_string(),
            }
            .into());
        }
        Ok(self.index.partial(vec![(position, reading)]))
    }

    /// Move the machine to `next` and return the commands to schedule.
    ///
    /// Commands are looked up in the cache built for the state being left.
    fn apply(
        &self,
        core: &mut MachineCore,
        next: &PartialState,
        cause: TransitionCause,
    ) -> Result<Vec<DeferredAction>, Error> {
        if cause != TransitionCause::AutoManaged {
            if let Some(position) = self.auto_managed.filter(|&position| next.contains(position)) {
                let error = MisuseError::AutoManagedTarget {
                    dimension: self.dimensions[position].name().to_string(),
                };
                warn!(machine = %self.name, ?cause, %error, "transition rejected");
                return Err(error.into());
            }
        }
        if let Err(error) = Legality::new(&self.dimensions).check(&core.state, next) {
            warn!(machine = %self.name, ?cause, %error, "transition rejected");
            return Err(error.into());
        }
        {
            let active = self.active.read().unwrap_or_else(PoisonError::into_inner);
            if let Some((from, to)) = core.fail_loudly.find(&active, next) {
                let error = InvalidTransition::FailLoudly {
                    from: format!("{from:?}"),
                    to: format!("{to:?}"),
                };
                warn!(machine = %self.name, ?cause, %error, "transition rejected");
                return Err(error.into());
            }
        }

        let targets = self.index.projections(next, &core.to_enabled);
        let commands = core.command_cache.actions_for(&targets);

        let merged = self.index.inject(&core.state, next);
        let previous = std::mem::replace(&mut core.state, merged);
        if core.history.capacity() > 0 {
            let record = TransitionRecord {
                from: self.composite(&previous),
                to: self.composite(&core.state),
                cause,
                timestamp: Utc::now(),
            };
            core.history.record(record);
        }
        self.refresh(core);

        debug!(
            machine = %self.name,
            ?cause,
            from = ?previous,
            to = ?core.state,
            commands = commands.len(),
            "transition applied"
        );
        Ok(commands)
    }

    /// Schedule every command; a failing one does not stop the rest.
    fn dispatch(&self, commands: Vec<DeferredAction>) -> Result<(), Error> {
        let mut outcome = Ok(());
        for command in commands {
            let result = self.scheduler.schedule(command);
            if let Err(error) = &result {
                warn!(machine = %self.name, %error, "transition command failed");
            }
            if outcome.is_ok() {
                outcome = result;
            }
        }
        outcome
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.shared.lock();
        f.debug_struct("StateMachine")
            .field("name", &self.shared.name)
            .field("state", &self.shared.composite(&core.state))
            .field("guards", &core.guards.len())
            .field("commands", &core.commands.len())
            .field("triggers", &core.triggers.len())
            .finish()
    }
}
