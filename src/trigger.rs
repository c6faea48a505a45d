//! Level triggers over partial states and the event loop that samples them.
//!
//! A [`Trigger`] is true while its partial state is consistent with the
//! machine's current state. Edge callbacks are not evaluated by the machine;
//! they are bound to an [`EventLoop`] which the control loop polls.

use crate::machine::Error;
use crate::scheduler::{DeferredAction, Scheduler};
use crate::subset::PartialState;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

/// Active from-set shared between a machine and its triggers.
pub(crate) type ActiveSet = Arc<RwLock<HashSet<PartialState>>>;

type Binding = Box<dyn FnMut() -> Result<(), Error> + Send>;

/// Samples bound level conditions and fires their edge callbacks.
#[derive(Default)]
pub struct EventLoop {
    bindings: Mutex<Vec<Binding>>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide loop used by triggers created without an explicit loop.
    ///
    /// Bindings stay registered for the life of the process, but an edge
    /// binding whose machine is gone no longer fires or keeps that machine's
    /// state alive. Call [`clear`](Self::clear) to drop them outright.
    pub fn default_loop() -> Arc<EventLoop> {
        static DEFAULT: OnceLock<Arc<EventLoop>> = OnceLock::new();
        Arc::clone(DEFAULT.get_or_init(|| Arc::new(EventLoop::new())))
    }

    /// Add a callback run on every [`poll`](Self::poll).
    pub fn bind<F>(&self, binding: F)
    where
        F: FnMut() -> Result<(), Error> + Send + 'static,
    {
        self.lock().push(Box::new(binding));
    }

    /// Run every binding once, in bind order.
    ///
    /// All bindings run even if one fails; the first error is returned.
    pub fn poll(&self) -> Result<(), Error> {
        let mut running = std::mem::take(&mut *self.lock());
        let mut outcome = Ok(());
        for binding in running.iter_mut() {
            let result = binding();
            if outcome.is_ok() {
                outcome = result;
            }
        }

        // Bindings added while polling go after the existing ones.
        let mut bindings = self.lock();
        let added = std::mem::take(&mut *bindings);
        running.extend(added);
        *bindings = running;
        outcome
    }

    /// Drop every binding.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Binding>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("bindings", &self.len())
            .finish()
    }
}

struct TriggerInner {
    target: PartialState,
    active: ActiveSet,
    event_loop: Arc<EventLoop>,
    scheduler: Arc<dyn Scheduler>,
}

/// Level condition "this partial state is currently active".
///
/// Obtained from [`FromHandle::trigger`](crate::machine::FromHandle::trigger);
/// the machine hands out one trigger per partial state, so edge detection
/// state bound through it is never split across instances.
#[derive(Clone)]
pub struct Trigger {
    inner: Arc<TriggerInner>,
}

impl Trigger {
    pub(crate) fn new(
        target: PartialState,
        active: ActiveSet,
        event_loop: Arc<EventLoop>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            inner: Arc::new(TriggerInner {
                target,
                active,
                event_loop,
                scheduler,
            }),
        }
    }

    /// Whether the partial state is active right now.
    pub fn get(&self) -> bool {
        self.inner
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&self.inner.target)
    }

    pub fn target(&self) -> &PartialState {
        &self.inner.target
    }

    pub fn event_loop(&self) -> &Arc<EventLoop> {
        &self.inner.event_loop
    }

    /// Whether both handles are the same trigger.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Schedule `action` whenever the trigger goes from false to true.
    pub fn on_true(&self, action: DeferredAction) -> &Self {
        self.bind_edge(move |previous, current| !previous && current, action)
    }

    /// Schedule `action` whenever the trigger goes from true to false.
    pub fn on_false(&self, action: DeferredAction) -> &Self {
        self.bind_edge(move |previous, current| previous && !current, action)
    }

    /// Schedule `action` whenever the trigger changes.
    pub fn on_change(&self, action: DeferredAction) -> &Self {
        self.bind_edge(move |previous, current| previous != current, action)
    }

    /// The binding holds the trigger weakly: once the owning machine and
    /// every handle are dropped it stops firing and releases the machine's
    /// scheduler and active set.
    fn bind_edge<F>(&self, fires: F, action: DeferredAction) -> &Self
    where
        F: Fn(bool, bool) -> bool + Send + 'static,
    {
        let trigger = Arc::downgrade(&self.inner);
        // Edge state starts from the level at bind time.
        let mut previous = self.get();
        self.inner.event_loop.bind(move || {
            let Some(inner) = trigger.upgrade() else {
                return Ok(());
            };
            let trigger = Trigger { inner };
            let current = trigger.get();
            let fired = fires(previous, current);
            previous = current;
            if fired {
                trigger.inner.scheduler.schedule(action.clone())?;
            }
            Ok(())
        });
        self
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("target", &self.inner.target)
            .field("active", &self.get())
            .finish()
    }
}

/// One memoized trigger per partial state.
#[derive(Default)]
pub(crate) struct TriggerTable {
    triggers: IndexMap<PartialState, Trigger>,
}

impl TriggerTable {
    /// Existing trigger for `target`, or a new one bound to `event_loop`.
    ///
    /// The event loop of the first call wins.
    pub(crate) fn get_or_insert(
        &mut self,
        target: PartialState,
        event_loop: Arc<EventLoop>,
        active: &ActiveSet,
        scheduler: &Arc<dyn Scheduler>,
    ) -> Trigger {
        self.triggers
            .entry(target.clone())
            .or_insert_with(|| {
                Trigger::new(target, Arc::clone(active), event_loop, Arc::clone(scheduler))
            })
            .clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.triggers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::scheduler::CommandScheduler;
    use crate::subset::SubsetIndex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        index: SubsetIndex,
        active: ActiveSet,
        scheduler: Arc<dyn Scheduler>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                index: SubsetIndex::new(1).unwrap(),
                active: Arc::new(RwLock::new(HashSet::new())),
                scheduler: Arc::new(CommandScheduler::new()),
            }
        }

        fn state(&self, value: u8) -> PartialState {
            self.index.partial(vec![(0, Value::new(value))]).unwrap()
        }

        fn set_active(&self, state: Option<PartialState>) {
            let mut active = self.active.write().unwrap();
            active.clear();
            active.extend(state);
        }
    }

    fn counter() -> (Arc<AtomicUsize>, DeferredAction) {
        let count = Arc::new(AtomicUsize::new(0));
        let clone = Arc::clone(&count);
        let action = DeferredAction::run_once(move || {
            clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, action)
    }

    #[test]
    fn trigger_reads_active_set_lazily() {
        let fixture = Fixture::new();
        let trigger = Trigger::new(
            fixture.state(1),
            Arc::clone(&fixture.active),
            Arc::new(EventLoop::new()),
            Arc::clone(&fixture.scheduler),
        );

        assert!(!trigger.get());
        fixture.set_active(Some(fixture.state(1)));
        assert!(trigger.get());
        fixture.set_active(None);
        assert!(!trigger.get());
    }

    #[test]
    fn table_memoizes_per_partial_state() {
        let fixture = Fixture::new();
        let mut table = TriggerTable::default();
        let first_loop = Arc::new(EventLoop::new());

        let a = table.get_or_insert(
            fixture.state(1),
            Arc::clone(&first_loop),
            &fixture.active,
            &fixture.scheduler,
        );
        let b = table.get_or_insert(
            fixture.state(1),
            Arc::new(EventLoop::new()),
            &fixture.active,
            &fixture.scheduler,
        );
        let c = table.get_or_insert(
            fixture.state(2),
            Arc::clone(&first_loop),
            &fixture.active,
            &fixture.scheduler,
        );

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert!(Arc::ptr_eq(b.event_loop(), &first_loop));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn on_true_fires_on_rising_edges_only() {
        let fixture = Fixture::new();
        let event_loop = Arc::new(EventLoop::new());
        let trigger = Trigger::new(
            fixture.state(1),
            Arc::clone(&fixture.active),
            Arc::clone(&event_loop),
            Arc::clone(&fixture.scheduler),
        );
        let (count, action) = counter();
        trigger.on_true(action);

        event_loop.poll().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        fixture.set_active(Some(fixture.state(1)));
        event_loop.poll().unwrap();
        event_loop.poll().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        fixture.set_active(None);
        event_loop.poll().unwrap();
        fixture.set_active(Some(fixture.state(1)));
        event_loop.poll().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn edge_state_starts_at_bind_time() {
        let fixture = Fixture::new();
        fixture.set_active(Some(fixture.state(1)));
        let event_loop = Arc::new(EventLoop::new());
        let trigger = Trigger::new(
            fixture.state(1),
            Arc::clone(&fixture.active),
            Arc::clone(&event_loop),
            Arc::clone(&fixture.scheduler),
        );
        let (rising, on_true) = counter();
        let (falling, on_false) = counter();
        let (changes, on_change) = counter();
        trigger.on_true(on_true).on_false(on_false).on_change(on_change);

        event_loop.poll().unwrap();
        assert_eq!(rising.load(Ordering::SeqCst), 0);

        fixture.set_active(None);
        event_loop.poll().unwrap();

        assert_eq!(rising.load(Ordering::SeqCst), 0);
        assert_eq!(falling.load(Ordering::SeqCst), 1);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_trigger_releases_its_machine_state() {
        let fixture = Fixture::new();
        let event_loop = Arc::new(EventLoop::new());
        let trigger = Trigger::new(
            fixture.state(1),
            Arc::clone(&fixture.active),
            Arc::clone(&event_loop),
            Arc::clone(&fixture.scheduler),
        );
        let (count, action) = counter();
        trigger.on_true(action);
        assert_eq!(Arc::strong_count(&fixture.active), 2);

        drop(trigger);
        fixture.set_active(Some(fixture.state(1)));
        event_loop.poll().unwrap();

        assert_eq!(Arc::strong_count(&fixture.active), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(event_loop.len(), 1);
    }

    #[test]
    fn event_loop_keeps_bindings_added_while_polling() {
        let event_loop = Arc::new(EventLoop::new());
        let inner = Arc::clone(&event_loop);
        let mut added = false;
        event_loop.bind(move || {
            if !added {
                inner.bind(|| Ok(()));
                added = true;
            }
            Ok(())
        });

        event_loop.poll().unwrap();
        assert_eq!(event_loop.len(), 2);

        event_loop.clear();
        assert!(event_loop.is_empty());
    }

    #[test]
    fn default_loop_is_shared() {
        assert!(Arc::ptr_eq(&EventLoop::default_loop(), &EventLoop::default_loop()));
    }
}
