//! Registration tables and the caches derived from them.
//!
//! Guards, commands and fail-loudly markers are registered against a
//! from-partial and stay there for the life of the machine. The caches only
//! hold the entries whose from-partial is currently active; they are rebuilt
//! from scratch whenever the active set changes and swapped in as a whole.

use crate::core::Guard;
use crate::scheduler::DeferredAction;
use crate::subset::PartialState;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Position of a registration in the global registration order.
pub type Sequence = u64;

#[derive(Clone, Debug)]
struct GuardRegistration {
    sequence: Sequence,
    target: PartialState,
    guard: Guard,
}

#[derive(Clone, Debug)]
struct CommandRegistration {
    sequence: Sequence,
    target: PartialState,
    action: DeferredAction,
}

/// Guards keyed by from-partial, in registration order.
#[derive(Clone, Debug, Default)]
pub struct GuardTable {
    entries: IndexMap<PartialState, Vec<GuardRegistration>>,
}

impl GuardTable {
    pub fn insert(&mut self, sequence: Sequence, from: PartialState, to: PartialState, guard: Guard) {
        self.entries.entry(from).or_default().push(GuardRegistration {
            sequence,
            target: to,
            guard,
        });
    }

    /// Number of registered guards.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Commands keyed by from-partial, in registration order.
#[derive(Clone, Debug, Default)]
pub struct CommandTable {
    entries: IndexMap<PartialState, Vec<CommandRegistration>>,
}

impl CommandTable {
    pub fn insert(
        &mut self,
        sequence: Sequence,
        from: PartialState,
        to: PartialState,
        action: DeferredAction,
    ) {
        self.entries.entry(from).or_default().push(CommandRegistration {
            sequence,
            target: to,
            action,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `(from, to)` pairs that must never be taken.
#[derive(Clone, Debug, Default)]
pub struct FailLoudlyTable {
    entries: IndexMap<PartialState, Vec<PartialState>>,
}

impl FailLoudlyTable {
    pub fn insert(&mut self, from: PartialState, to: PartialState) {
        let targets = self.entries.entry(from).or_default();
        if !targets.contains(&to) {
            targets.push(to);
        }
    }

    /// First forbidden pair whose from-partial is active and whose target is
    /// part of `next`.
    pub fn find(
        &self,
        active: &HashSet<PartialState>,
        next: &PartialState,
    ) -> Option<(&PartialState, &PartialState)> {
        self.entries
            .iter()
            .filter(|(from, _)| active.contains(*from))
            .find_map(|(from, targets)| {
                targets
                    .iter()
                    .find(|target| next.covers(target))
                    .map(|target| (from, target))
            })
    }
}

/// One guard visible to [`StateMachine::poll`](crate::StateMachine::poll).
#[derive(Clone, Debug)]
pub struct GuardEntry {
    pub sequence: Sequence,
    pub guard: Guard,
    pub target: PartialState,
}

/// Guards of every active from-partial, ordered by registration.
#[derive(Clone, Debug, Default)]
pub struct GuardCache {
    entries: Vec<GuardEntry>,
}

impl GuardCache {
    pub fn regenerate(active: &HashSet<PartialState>, table: &GuardTable) -> Arc<Self> {
        let mut entries: Vec<GuardEntry> = table
            .entries
            .iter()
            .filter(|(from, _)| active.contains(*from))
            .flat_map(|(_, registrations)| registrations.iter())
            .map(|registration| GuardEntry {
                sequence: registration.sequence,
                guard: registration.guard.clone(),
                target: registration.target.clone(),
            })
            .collect();
        entries.sort_by_key(|entry| entry.sequence);
        Arc::new(Self { entries })
    }

    /// Target of the first guard that currently holds.
    pub fn first_ready(&self) -> Option<&PartialState> {
        self.entries
            .iter()
            .find(|entry| entry.guard.check())
            .map(|entry| &entry.target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GuardEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Commands of every active from-partial, grouped by target.
///
/// Commands registered from different from-partials against the same target
/// are concatenated, never deduplicated.
#[derive(Clone, Debug, Default)]
pub struct CommandCache {
    by_target: IndexMap<PartialState, Vec<(Sequence, DeferredAction)>>,
}

impl CommandCache {
    pub fn regenerate(active: &HashSet<PartialState>, table: &CommandTable) -> Arc<Self> {
        let mut by_target: IndexMap<PartialState, Vec<(Sequence, DeferredAction)>> =
            IndexMap::new();
        for registration in table
            .entries
            .iter()
            .filter(|(from, _)| active.contains(*from))
            .flat_map(|(_, registrations)| registrations.iter())
        {
            by_target
                .entry(registration.target.clone())
                .or_default()
                .push((registration.sequence, registration.action.clone()));
        }
        for actions in by_target.values_mut() {
            actions.sort_by_key(|(sequence, _)| *sequence);
        }
        Arc::new(Self { by_target })
    }

    /// Commands for any of `targets`, in registration order.
    pub fn actions_for(&self, targets: &[PartialState]) -> Vec<DeferredAction> {
        let mut matched: Vec<&(Sequence, DeferredAction)> = targets
            .iter()
            .filter_map(|target| self.by_target.get(target))
            .flatten()
            .collect();
        matched.sort_by_key(|(sequence, _)| *sequence);
        matched.into_iter().map(|(_, action)| action.clone()).collect()
    }

    /// Number of cached commands across all targets.
    pub fn len(&self) -> usize {
        self.by_target.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }
}
