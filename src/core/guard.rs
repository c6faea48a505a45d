//! Guard predicates for automatic transitions.
//!
//! A guard is a boolean condition sampled by [`StateMachine::poll`]. Unlike a
//! classic FSM guard it takes no state argument: whether its transition is
//! even considered is decided by the from-partial it was registered against.
//!
//! [`StateMachine::poll`]: crate::machine::StateMachine::poll

use std::fmt;
use std::sync::Arc;

/// Condition that gates an automatic transition.
///
/// Guards are cheap to clone; clones share the same predicate.
///
/// # Example
///
/// ```rust
/// use foxflow::core::Guard;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let beam_broken = Arc::new(AtomicBool::new(false));
/// let sensor = Arc::clone(&beam_broken);
/// let guard = Guard::new(move || sensor.load(Ordering::SeqCst));
///
/// assert!(!guard.check());
/// beam_broken.store(true, Ordering::SeqCst);
/// assert!(guard.check());
/// ```
#[derive(Clone)]
pub struct Guard {
    predicate: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl Guard {
    /// Create a guard from a predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Guard that is always true.
    pub fn always() -> Self {
        Self::new(|| true)
    }

    /// Sample the predicate.
    pub fn check(&self) -> bool {
        (self.predicate)()
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").finish_non_exhaustive()
    }
}
