//! Deferred actions and the scheduler that runs them.
//!
//! The state machine never runs transition commands itself. It hands them to
//! a [`Scheduler`], which decides when and how often they execute.
//! [`CommandScheduler`] is a small synchronous implementation suitable for
//! simulation, tests and simple control loops.

use crate::machine::Error;
use crate::trigger::EventLoop;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{trace, warn};

type ActionBody = Arc<dyn Fn() -> Result<(), Error> + Send + Sync>;

/// How an action runs once scheduled.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ActionKind {
    /// Executes once, at schedule time.
    Once,
    /// Executes on every scheduler tick until canceled.
    Repeating,
}

/// A unit of work handed to a [`Scheduler`].
///
/// Actions are cheap to clone; clones share the same body.
///
/// # Example
///
/// ```rust
/// use foxflow::scheduler::{CommandScheduler, DeferredAction, Scheduler};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&ticks);
/// let scheduler = CommandScheduler::new();
///
/// scheduler
///     .schedule(DeferredAction::run(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }))
///     .unwrap();
/// scheduler.run().unwrap();
/// scheduler.run().unwrap();
///
/// assert_eq!(ticks.load(Ordering::SeqCst), 2);
/// ```
#[derive(Clone)]
pub struct DeferredAction {
    kind: ActionKind,
    ignoring_disable: bool,
    name: Option<String>,
    body: ActionBody,
}

impl DeferredAction {
    /// Action that runs `f` once when scheduled.
    pub fn run_once<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::try_run_once(move || {
            f();
            Ok(())
        })
    }

    /// Fallible run-once action; the error surfaces from [`Scheduler::schedule`].
    pub fn try_run_once<F>(f: F) -> Self
    where
        F: Fn() -> Result<(), Error> + Send + Sync + 'static,
    {
        Self::with_kind(ActionKind::Once, Arc::new(f))
    }

    /// Action that runs `f` on every tick until canceled.
    pub fn run<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::try_run(move || {
            f();
            Ok(())
        })
    }

    /// Fallible repeating action; errors surface from [`Scheduler::run`].
    pub fn try_run<F>(f: F) -> Self
    where
        F: Fn() -> Result<(), Error> + Send + Sync + 'static,
    {
        Self::with_kind(ActionKind::Repeating, Arc::new(f))
    }

    fn with_kind(kind: ActionKind, body: ActionBody) -> Self {
        Self {
            kind,
            ignoring_disable: false,
            name: None,
            body,
        }
    }

    /// Whether the action still runs while the scheduler is disabled.
    pub fn ignoring_disable(mut self, ignoring: bool) -> Self {
        self.ignoring_disable = ignoring;
        self
    }

    /// Attach a name, used in logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn runs_when_disabled(&self) -> bool {
        self.ignoring_disable
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Run the body once.
    pub fn execute(&self) -> Result<(), Error> {
        (self.body)()
    }

    /// Whether both handles share one body.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

impl fmt::Debug for DeferredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredAction")
            .field("kind", &self.kind)
            .field("ignoring_disable", &self.ignoring_disable)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Executes deferred actions on behalf of a state machine.
pub trait Scheduler: Send + Sync {
    /// Accept an action. Run-once actions may execute before this returns.
    fn schedule(&self, action: DeferredAction) -> Result<(), Error>;

    /// Drive one tick of every scheduled action.
    ///
    /// A failing action does not stop the tick; the first error is returned.
    fn run(&self) -> Result<(), Error>;

    /// Drop every pending action.
    fn cancel_all(&self);
}

/// Synchronous reference scheduler.
///
/// Run-once actions execute inside [`schedule`](Scheduler::schedule);
/// repeating actions execute on every [`run`](Scheduler::run) until
/// [`cancel_all`](Scheduler::cancel_all). While disabled, actions that do not
/// ignore the disable signal are neither started nor ticked.
///
/// A scheduler built with [`with_event_loop`](Self::with_event_loop) polls
/// that loop at the start of every tick.
pub struct CommandScheduler {
    repeating: Mutex<Vec<DeferredAction>>,
    enabled: Mutex<bool>,
    event_loop: Option<Arc<EventLoop>>,
}

impl CommandScheduler {
    /// An enabled scheduler with nothing scheduled.
    pub fn new() -> Self {
        Self {
            repeating: Mutex::new(Vec::new()),
            enabled: Mutex::new(true),
            event_loop: None,
        }
    }

    /// Poll `event_loop` before the repeating actions on every tick.
    pub fn with_event_loop(mut self, event_loop: Arc<EventLoop>) -> Self {
        self.event_loop = Some(event_loop);
        self
    }

    /// Set the external enable signal.
    pub fn set_enabled(&self, enabled: bool) {
        *self.enabled.lock().unwrap_or_else(PoisonError::into_inner) = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of repeating actions currently scheduled.
    pub fn pending(&self) -> usize {
        self.repeating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn allowed(&self, action: &DeferredAction) -> bool {
        action.runs_when_disabled() || self.is_enabled()
    }
}

impl Default for CommandScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandScheduler")
            .field("pending", &self.pending())
            .field("enabled", &self.is_enabled())
            .field("event_loop", &self.event_loop)
            .finish()
    }
}

impl Scheduler for CommandScheduler {
    fn schedule(&self, action: DeferredAction) -> Result<(), Error> {
        if !self.allowed(&action) {
            trace!(action = ?action.name(), "scheduler disabled, dropping action");
            return Ok(());
        }
        match action.kind() {
            ActionKind::Once => action.execute(),
            ActionKind::Repeating => {
                self.repeating
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(action);
                Ok(())
            }
        }
    }

    fn run(&self) -> Result<(), Error> {
        let mut outcome = match &self.event_loop {
            Some(event_loop) => event_loop.poll(),
            None => Ok(()),
        };
        // Snapshot so actions may schedule more work while running.
        let actions = self
            .repeating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for action in actions.iter().filter(|action| self.allowed(action)) {
            let result = action.execute();
            if let Err(error) = &result {
                warn!(action = ?action.name(), %error, "repeating action failed");
            }
            if outcome.is_ok() {
                outcome = result;
            }
        }
        outcome
    }

    fn cancel_all(&self) {
        self.repeating
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
