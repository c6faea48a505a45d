//! Property-based tests for the subset model and the poll protocol.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use foxflow::core::{Dimension, LimitsStateTransitions};
use foxflow::subset::{Subset, SubsetIndex};
use foxflow::{EventLoop, Partial, StateMachine};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum Basic {
    Start,
    StateA,
    End,
}

impl LimitsStateTransitions for Basic {
    fn can_transition_state(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (Basic::Start, Basic::StateA) | (Basic::StateA, Basic::End)
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum TwoState {
    A,
    B,
}

prop_compose! {
    fn arbitrary_basic()(variant in 0..3u8) -> Basic {
        match variant {
            0 => Basic::Start,
            1 => Basic::StateA,
            _ => Basic::End,
        }
    }
}

prop_compose! {
    fn arbitrary_two_state()(a in any::<bool>()) -> TwoState {
        if a { TwoState::A } else { TwoState::B }
    }
}

fn record_machine(basic: Basic, two_state: TwoState) -> StateMachine {
    StateMachine::new(vec![
        Dimension::limited("basic", basic),
        Dimension::new("two_state", two_state),
    ])
    .unwrap()
}

proptest! {
    #[test]
    fn subset_index_is_complete(n in 1usize..=10) {
        let index = SubsetIndex::new(n).unwrap();
        let masks: HashSet<u32> = index.iter().map(Subset::mask).collect();
        let full: Vec<&Subset> = index.iter().filter(|s| s.len() == n).collect();

        prop_assert_eq!(index.len(), (1usize << n) - 1);
        prop_assert_eq!(masks.len(), index.len());
        prop_assert!(index.iter().all(|s| !s.is_empty()));
        prop_assert_eq!(full.len(), 1);
        prop_assert_eq!(full[0].id(), index.full());
    }

    #[test]
    fn subsets_preserve_dimension_order(n in 1usize..=8) {
        let index = SubsetIndex::new(n).unwrap();
        for subset in index.iter() {
            prop_assert!(subset.dimensions().windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn other_dimensions_never_block_registration(
        current in arbitrary_basic(),
        from in arbitrary_basic(),
        target in arbitrary_two_state(),
    ) {
        let machine = record_machine(current, TwoState::A);

        let result = machine
            .specify(Partial::of(from))
            .unwrap()
            .to(Partial::of(target));

        prop_assert!(result.is_ok());
    }

    #[test]
    fn registration_legality_matches_the_rule(from in arbitrary_basic(), to in arbitrary_basic()) {
        let machine = record_machine(Basic::Start, TwoState::A);

        let result = machine.specify(Partial::of(from)).unwrap().to(Partial::of(to));

        prop_assert_eq!(result.is_ok(), from.can_transition_state(&to));
        let state = machine.current_state();
        prop_assert_eq!(state.get::<Basic>(), Some(&Basic::Start));
    }

    #[test]
    fn each_poll_takes_one_step(steps in 1u8..8, polls in 0usize..12) {
        let machine = StateMachine::single(Dimension::new("step", 0u8)).unwrap();
        for step in 0..steps {
            machine
                .specify(Partial::of(step))
                .unwrap()
                .to(Partial::of(step + 1))
                .unwrap()
                .always();
        }

        for _ in 0..polls {
            machine.poll().unwrap();
        }

        let expected = polls.min(steps as usize) as u8;
        let state = machine.current_state();
        prop_assert_eq!(state.get::<u8>(), Some(&expected));
        prop_assert_eq!(machine.history().len(), expected as usize);
    }

    #[test]
    fn first_true_guard_in_registration_order_wins(guards in prop::collection::vec(any::<bool>(), 1..8)) {
        let machine = StateMachine::single(Dimension::new("target", 0u8)).unwrap();
        let from = machine.specify(Partial::of(0u8)).unwrap();
        for (position, &ready) in guards.iter().enumerate() {
            from.to(Partial::of(position as u8 + 1)).unwrap().when(move || ready);
        }

        machine.poll().unwrap();

        let expected = guards
            .iter()
            .position(|&ready| ready)
            .map_or(0, |position| position as u8 + 1);
        let state = machine.current_state();
        prop_assert_eq!(state.get::<u8>(), Some(&expected));
    }

    #[test]
    fn trigger_level_tracks_the_state(targets in prop::collection::vec((0u8..3, 0u8..3), 1..10)) {
        let machine = StateMachine::new(vec![
            Dimension::new("left", 0u8),
            Dimension::new("right", 0u16),
        ])
        .unwrap();
        let event_loop = Arc::new(EventLoop::new());
        let watched = machine
            .specify(Partial::of(1u8).and(1u16))
            .unwrap()
            .trigger_on(Arc::clone(&event_loop));
        let left_only = machine
            .specify(Partial::of(2u8))
            .unwrap()
            .trigger_on(Arc::clone(&event_loop));

        for (left, right) in targets {
            machine
                .transition_to(Partial::of(left).and(right as u16))
                .unwrap()
                .execute()
                .unwrap();
            prop_assert_eq!(watched.get(), left == 1 && right == 1);
            prop_assert_eq!(left_only.get(), left == 2);
        }
    }
}
