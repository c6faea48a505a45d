//! Transition history tracking.
//!
//! Every applied transition is recorded with the full composite state before
//! and after, what caused it, and when. The history is bounded: once it holds
//! `capacity` records the oldest one is dropped.

use crate::subset::CompositeState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// What made the machine change state.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TransitionCause {
    /// A registered guard evaluated true during `poll`.
    Guard,
    /// A `transition_to` action was executed.
    Forced,
    /// The mode source reported a new value for the auto-managed dimension.
    AutoManaged,
}

/// Record of a single applied transition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransitionRecord {
    /// State before the transition
    pub from: CompositeState,
    /// State after the transition
    pub to: CompositeState,
    pub cause: TransitionCause,
    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
}

/// Bounded, ordered history of applied transitions.
#[derive(Clone, Debug, Serialize)]
pub struct TransitionHistory {
    capacity: usize,
    records: VecDeque<TransitionRecord>,
}

impl TransitionHistory {
    /// Empty history keeping at most `capacity` records; `0` keeps none.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Append a record, evicting the oldest when full.
    pub fn record(&mut self, record: TransitionRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// States traversed: the first recorded source, then every target.
    ///
    /// # Example
    ///
    /// ```rust
    /// use foxflow::core::Dimension;
    /// use foxflow::{Partial, StateMachine};
    ///
    /// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    /// enum Phase { One, Two, Three }
    ///
    /// let machine = StateMachine::single(Dimension::new("phase", Phase::One)).unwrap();
    /// machine.specify(Partial::of(Phase::One)).unwrap().to(Partial::of(Phase::Two)).unwrap().always();
    /// machine.specify(Partial::of(Phase::Two)).unwrap().to(Partial::of(Phase::Three)).unwrap().always();
    /// machine.poll().unwrap();
    /// machine.poll().unwrap();
    ///
    /// let history = machine.history();
    /// let path: Vec<Option<&Phase>> = history.path().iter().map(|s| s.get::<Phase>()).collect();
    /// assert_eq!(path, vec![Some(&Phase::One), Some(&Phase::Two), Some(&Phase::Three)]);
    /// ```
    pub fn path(&self) -> Vec<&CompositeState> {
        let mut path = Vec::with_capacity(self.records.len() + 1);
        if let Some(first) = self.records.front() {
            path.push(&first.from);
        }
        path.extend(self.records.iter().map(|record| &record.to));
        path
    }

    /// Time between the first and last recorded transition.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
