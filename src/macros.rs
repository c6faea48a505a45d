//! Macros for ergonomic partial states and transition rules.

/// Build a [`Partial`](crate::Partial) from values, optionally naming their
/// dimensions.
///
/// Unnamed values are matched to a dimension by type; `name = value` targets
/// the dimension called `name`.
///
/// # Example
///
/// ```
/// use foxflow::partial;
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// enum Arm { Stowed }
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// enum Wrist { Flat }
///
/// let by_type = partial![Arm::Stowed, Wrist::Flat];
/// let mixed = partial![Arm::Stowed, left_wrist = Wrist::Flat];
///
/// assert_eq!(by_type.len(), 2);
/// assert_eq!(mixed.len(), 2);
/// ```
#[macro_export]
macro_rules! partial {
    (@collect $partial:expr ;) => {
        $partial
    };
    (@collect $partial:expr ; $name:ident = $value:expr $(, $($rest:tt)*)?) => {
        $crate::partial!(@collect $partial.and_named(stringify!($name), $value) ; $($($rest)*)?)
    };
    (@collect $partial:expr ; $value:expr $(, $($rest:tt)*)?) => {
        $crate::partial!(@collect $partial.and($value) ; $($($rest)*)?)
    };
    ($($entries:tt)*) => {
        $crate::partial!(@collect $crate::Partial::new() ; $($entries)*)
    };
}

/// Implement [`LimitsStateTransitions`](crate::core::LimitsStateTransitions)
/// for an enum from an adjacency list.
///
/// Every variant not listed on the left may not transition anywhere.
///
/// # Example
///
/// ```
/// use foxflow::core::LimitsStateTransitions;
/// use foxflow::limits_transitions;
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// enum Intake {
///     Idle,
///     Running,
///     Jammed,
///     Ejecting,
/// }
///
/// limits_transitions! {
///     Intake {
///         Idle => [Running],
///         Running | Jammed => [Ejecting, Idle],
///         Ejecting => [Idle],
///     }
/// }
///
/// assert!(Intake::Idle.can_transition_state(&Intake::Running));
/// assert!(!Intake::Idle.can_transition_state(&Intake::Jammed));
/// assert!(Intake::Jammed.can_transition_state(&Intake::Ejecting));
/// ```
#[macro_export]
macro_rules! limits_transitions {
    (
        $ty:ty {
            $(
                $($from:ident)|+ => [$($to:ident),* $(,)?]
            ),* $(,)?
        }
    ) => {
        impl $crate::core::LimitsStateTransitions for $ty {
            #[allow(unreachable_patterns)]
            fn can_transition_state(&self, next: &Self) -> bool {
                match self {
                    $(
                        $(Self::$from)|+ => {
                            let allowed: &[Self] = &[$(Self::$to),*];
                            allowed.contains(next)
                        }
                    )*
                    _ => false,
                }
            }
        }
    };
}
