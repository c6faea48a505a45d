//! Registration handles returned by [`StateMachine::specify`].

use super::{Error, StateMachine};
use crate::core::Guard;
use crate::legality::Legality;
use crate::scheduler::DeferredAction;
use crate::subset::{Partial, PartialState};
use crate::trigger::{EventLoop, Trigger};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// A resolved from-partial, ready to be given a target or a trigger.
pub struct FromHandle<'m> {
    machine: &'m StateMachine,
    from: PartialState,
}

impl<'m> FromHandle<'m> {
    pub(crate) fn new(machine: &'m StateMachine, from: PartialState) -> Self {
        Self { machine, from }
    }

    /// The resolved from-partial.
    pub fn partial(&self) -> &PartialState {
        &self.from
    }

    /// Target the transition at `partial`.
    ///
    /// Legality is checked right away over the dimensions both partials
    /// share; an illegal pair fails here rather than at poll time.
    ///
    /// A target may name the auto-managed dimension so commands and
    /// fail-loudly rules can react to mode changes. Only the mode source
    /// moves that dimension: a guard into such a target makes
    /// [`poll`](StateMachine::poll) fail with
    /// [`MisuseError::AutoManagedTarget`](super::MisuseError::AutoManagedTarget).
    pub fn to(&self, partial: Partial) -> Result<ToHandle<'m>, Error> {
        let to = self.machine.resolve(&partial)?;
        if let Err(error) = Legality::new(self.machine.dimensions()).check(&self.from, &to) {
            warn!(machine = %self.machine.name(), %error, "registration rejected");
            return Err(error.into());
        }
        Ok(ToHandle {
            machine: self.machine,
            from: self.from.clone(),
            to,
        })
    }

    /// The trigger for this partial, bound to [`EventLoop::default_loop`].
    pub fn trigger(&self) -> Trigger {
        self.trigger_on(EventLoop::default_loop())
    }

    /// The trigger for this partial, bound to `event_loop` if it is created
    /// by this call.
    pub fn trigger_on(&self, event_loop: Arc<EventLoop>) -> Trigger {
        self.machine.trigger(&self.from, event_loop)
    }
}

impl fmt::Debug for FromHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromHandle")
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// A legal `(from, to)` pair. Every method registers immediately and returns
/// the handle for chaining.
pub struct ToHandle<'m> {
    machine: &'m StateMachine,
    from: PartialState,
    to: PartialState,
}

impl<'m> ToHandle<'m> {
    /// Partial the transition leaves.
    pub fn from(&self) -> &PartialState {
        &self.from
    }

    /// Partial the transition enters.
    pub fn to(&self) -> &PartialState {
        &self.to
    }

    /// Take the transition on a poll where `predicate` holds.
    pub fn when<F>(self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.guard(Guard::new(predicate))
    }

    /// Take the transition on a poll where `guard` holds.
    pub fn guard(self, guard: Guard) -> Self {
        self.machine.register_guard(&self.from, &self.to, guard);
        self
    }

    /// Take the transition on the next poll that reaches this guard.
    pub fn always(self) -> Self {
        self.guard(Guard::always())
    }

    /// Schedule `action` whenever this transition is applied.
    pub fn run(self, action: DeferredAction) -> Self {
        self.machine.register_command(&self.from, &self.to, action);
        self
    }

    /// Make this transition an error whenever it is attempted.
    pub fn fail_loudly(self) -> Self {
        self.machine.register_fail_loudly(&self.from, &self.to);
        self
    }
}

impl fmt::Debug for ToHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToHandle")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}
