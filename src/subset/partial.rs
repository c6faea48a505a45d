//! Partial and composite state values.

use super::{SubsetId, SubsetIndex};
use crate::core::{Dimension, DimensionValue, Value};
use crate::machine::MisuseError;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Concrete values for exactly the dimensions of one subset.
///
/// Equality and hashing are structural over the subset identity and the held
/// values.
#[derive(Clone)]
pub struct PartialState {
    subset: SubsetId,
    mask: u32,
    values: Arc<[Value]>,
}

impl PartialState {
    pub(crate) fn from_parts(subset: SubsetId, mask: u32, values: Arc<[Value]>) -> Self {
        debug_assert_eq!(mask.count_ones() as usize, values.len());
        Self {
            subset,
            mask,
            values,
        }
    }

    pub fn subset(&self) -> SubsetId {
        self.subset
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of `dimension`, or `None` when the subset does not include it.
    pub fn get(&self, dimension: usize) -> Option<&Value> {
        if dimension >= super::MAX_DIMENSIONS || self.mask & (1 << dimension) == 0 {
            return None;
        }
        let position = (self.mask & ((1 << dimension) - 1)).count_ones() as usize;
        self.values.get(position)
    }

    pub fn contains(&self, dimension: usize) -> bool {
        self.get(dimension).is_some()
    }

    /// `(dimension, value)` pairs in dimension order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Value)> + '_ {
        (0..super::MAX_DIMENSIONS)
            .filter(move |&dimension| self.mask & (1u32 << dimension) != 0)
            .zip(self.values.iter())
    }

    /// Whether every dimension of `other` is present here with an equal value.
    pub fn covers(&self, other: &PartialState) -> bool {
        other.mask & !self.mask == 0
            && other
                .iter()
                .all(|(dimension, value)| self.get(dimension) == Some(value))
    }

    /// Whether both partials hold a dimension in common.
    pub fn overlaps(&self, other: &PartialState) -> bool {
        self.mask & other.mask != 0
    }
}

impl PartialEq for PartialState {
    fn eq(&self, other: &Self) -> bool {
        self.subset == other.subset && self.values == other.values
    }
}

impl Eq for PartialState {}

impl Hash for PartialState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subset.hash(state);
        self.values.hash(state);
    }
}

impl fmt::Debug for PartialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Snapshot of every dimension's current value.
#[derive(Clone)]
pub struct CompositeState {
    state: PartialState,
    names: Arc<[String]>,
}

impl CompositeState {
    pub(crate) fn new(state: PartialState, names: Arc<[String]>) -> Self {
        Self { state, names }
    }

    /// First dimension value of type `T`.
    ///
    /// ```rust
    /// use foxflow::core::Dimension;
    /// use foxflow::StateMachine;
    ///
    /// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    /// enum Drive { Idle, Moving }
    ///
    /// let machine = StateMachine::single(Dimension::new("drive", Drive::Idle)).unwrap();
    /// assert_eq!(machine.current_state().get::<Drive>(), Some(&Drive::Idle));
    /// ```
    pub fn get<T: DimensionValue>(&self) -> Option<&T> {
        self.state.values.iter().find_map(|value| value.downcast_ref::<T>())
    }

    /// Value of dimension `index`.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.state.get(index)
    }

    /// Value of the dimension called `name`.
    pub fn by_name(&self, name: &str) -> Option<&Value> {
        let index = self.names.iter().position(|n| n == name)?;
        self.state.get(index)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// `(name, value)` pairs in dimension order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.state.values.iter())
    }

    /// The canonical full-subset partial state.
    pub fn as_partial(&self) -> &PartialState {
        &self.state
    }
}

impl PartialEq for CompositeState {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl Eq for CompositeState {}

impl fmt::Debug for CompositeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl Serialize for CompositeState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &format!("{value:?}"))?;
        }
        map.end()
    }
}

/// A partial specifier as written by the caller, before it is matched to
/// dimensions.
///
/// Values are matched to dimensions by name when one is given, otherwise by
/// their concrete type.
///
/// ```rust
/// use foxflow::Partial;
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// enum Drive { Idle }
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// enum Arm { Stowed }
///
/// let partial = Partial::of(Drive::Idle).and_named("arm", Arm::Stowed);
/// assert_eq!(partial.len(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Partial {
    entries: Vec<PartialEntry>,
}

#[derive(Clone, Debug)]
struct PartialEntry {
    dimension: Option<String>,
    value: Value,
}

impl Partial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partial holding a single value, matched by type.
    pub fn of<T: DimensionValue>(value: T) -> Self {
        Self::new().and(value)
    }

    /// Partial holding a single value for the dimension called `dimension`.
    pub fn named<T: DimensionValue>(dimension: impl Into<String>, value: T) -> Self {
        Self::new().and_named(dimension, value)
    }

    /// Add a value, matched by type.
    pub fn and<T: DimensionValue>(mut self, value: T) -> Self {
        self.entries.push(PartialEntry {
            dimension: None,
            value: Value::new(value),
        });
        self
    }

    /// Add a value for the dimension called `dimension`.
    pub fn and_named<T: DimensionValue>(mut self, dimension: impl Into<String>, value: T) -> Self {
        self.entries.push(PartialEntry {
            dimension: Some(dimension.into()),
            value: Value::new(value),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&CompositeState> for Partial {
    fn from(state: &CompositeState) -> Self {
        state
            .iter()
            .fold(Partial::new(), |partial, (name, value)| {
                partial.and_named(name, value.clone())
            })
    }
}

/// Match a caller-written partial against the dimensions of a machine.
pub(crate) fn resolve(
    partial: &Partial,
    dimensions: &[Dimension],
    index: &SubsetIndex,
) -> Result<PartialState, MisuseError> {
    if partial.is_empty() {
        return Err(MisuseError::EmptyPartial);
    }

    let mut entries: Vec<(usize, Value)> = Vec::with_capacity(partial.len());
    for entry in &partial.entries {
        let dimension = match &entry.dimension {
            Some(name) => {
                let position = dimensions
                    .iter()
                    .position(|d| d.name() == name)
                    .ok_or_else(|| MisuseError::UnknownDimension { name: name.clone() })?;
                if !dimensions[position].accepts(&entry.value) {
                    return Err(MisuseError::ValueTypeMismatch {
                        dimension: name.clone(),
                        type_name: entry.value.type_name().to_string(),
                    });
                }
                position
            }
            None => {
                let kind = entry.value.kind();
                let candidates: Vec<usize> = dimensions
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| d.accepts_kind(kind))
                    .map(|(position, _)| position)
                    .collect();
                match candidates.as_slice() {
                    [] => {
                        return Err(MisuseError::UnmatchedValue {
                            type_name: entry.value.type_name().to_string(),
                        })
                    }
                    [position] => *position,
                    _ => {
                        return Err(MisuseError::AmbiguousValue {
                            type_name: entry.value.type_name().to_string(),
                            candidates: candidates
                                .iter()
                                .map(|&position| dimensions[position].name().to_string())
                                .collect(),
                        })
                    }
                }
            }
        };

        if entries.iter().any(|(existing, _)| *existing == dimension) {
            return Err(MisuseError::DuplicateDimension {
                dimension: dimensions[dimension].name().to_string(),
            });
        }
        entries.push((dimension, entry.value.clone()));
    }

    index.partial(entries).ok_or(MisuseError::EmptyPartial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    enum TwoState {
        A,
        B,
    }

    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    enum Basic {
        Start,
        StateA,
    }

    fn dimensions() -> Vec<Dimension> {
        vec![
            Dimension::new("two_state", TwoState::A),
            Dimension::new("basic", Basic::Start),
            Dimension::new("other_basic", Basic::Start),
        ]
    }

    #[test]
    fn resolves_by_type_into_dimension_order() {
        let dims = vec![
            Dimension::new("two_state", TwoState::A),
            Dimension::new("basic", Basic::Start),
        ];
        let index = SubsetIndex::new(dims.len()).unwrap();

        let resolved = resolve(&Partial::of(Basic::StateA).and(TwoState::B), &dims, &index).unwrap();

        assert_eq!(resolved.subset(), index.full());
        assert_eq!(resolved.get(0), Some(&Value::new(TwoState::B)));
        assert_eq!(resolved.get(1), Some(&Value::new(Basic::StateA)));
    }

    #[test]
    fn ambiguous_types_need_a_name() {
        let dims = dimensions();
        let index = SubsetIndex::new(dims.len()).unwrap();

        let ambiguous = resolve(&Partial::of(Basic::StateA), &dims, &index);
        assert!(matches!(ambiguous, Err(MisuseError::AmbiguousValue { .. })));

        let named = resolve(&Partial::named("other_basic", Basic::StateA), &dims, &index).unwrap();
        assert_eq!(named.get(2), Some(&Value::new(Basic::StateA)));
        assert!(!named.contains(1));
    }

    #[test]
    fn resolution_errors_are_reported() {
        let dims = dimensions();
        let index = SubsetIndex::new(dims.len()).unwrap();

        assert!(matches!(
            resolve(&Partial::new(), &dims, &index),
            Err(MisuseError::EmptyPartial)
        ));
        assert!(matches!(
            resolve(&Partial::of(7u32), &dims, &index),
            Err(MisuseError::UnmatchedValue { .. })
        ));
        assert!(matches!(
            resolve(&Partial::named("missing", TwoState::A), &dims, &index),
            Err(MisuseError::UnknownDimension { .. })
        ));
        assert!(matches!(
            resolve(&Partial::named("basic", TwoState::A), &dims, &index),
            Err(MisuseError::ValueTypeMismatch { .. })
        ));
        assert!(matches!(
            resolve(
                &Partial::of(TwoState::A).and_named("two_state", TwoState::B),
                &dims,
                &index
            ),
            Err(MisuseError::DuplicateDimension { .. })
        ));
    }

    #[test]
    fn covers_checks_dimensions_and_values() {
        let dims = vec![
            Dimension::new("two_state", TwoState::A),
            Dimension::new("basic", Basic::Start),
        ];
        let index = SubsetIndex::new(dims.len()).unwrap();
        let full = resolve(&Partial::of(TwoState::A).and(Basic::Start), &dims, &index).unwrap();

        assert!(full.covers(&resolve(&Partial::of(Basic::Start), &dims, &index).unwrap()));
        assert!(!full.covers(&resolve(&Partial::of(Basic::StateA), &dims, &index).unwrap()));
        let narrow = resolve(&Partial::of(TwoState::A), &dims, &index).unwrap();
        assert!(!narrow.covers(&full));
        assert!(narrow.overlaps(&full));
    }

    #[test]
    fn composite_state_serializes_as_named_map() {
        let dims = vec![
            Dimension::new("two_state", TwoState::A),
            Dimension::new("basic", Basic::Start),
        ];
        let index = SubsetIndex::new(dims.len()).unwrap();
        let full = resolve(&Partial::of(TwoState::B).and(Basic::Start), &dims, &index).unwrap();
        let names: Arc<[String]> = dims.iter().map(|d| d.name().to_string()).collect();
        let state = CompositeState::new(full, names);

        let json = serde_json::to_value(&state).unwrap();

        assert_eq!(json["two_state"], "B");
        assert_eq!(json["basic"], "Start");
        assert_eq!(state.by_name("basic"), Some(&Value::new(Basic::Start)));
        assert_eq!(state.get::<TwoState>(), Some(&TwoState::B));
    }

    #[test]
    fn partial_from_composite_state_names_every_dimension() {
        let dims = dimensions();
        let index = SubsetIndex::new(dims.len()).unwrap();
        let full = resolve(
            &Partial::of(TwoState::A)
                .and_named("basic", Basic::Start)
                .and_named("other_basic", Basic::StateA),
            &dims,
            &index,
        )
        .unwrap();
        let names: Arc<[String]> = dims.iter().map(|d| d.name().to_string()).collect();
        let state = CompositeState::new(full.clone(), names);

        let round_trip = resolve(&Partial::from(&state), &dims, &index).unwrap();

        assert_eq!(round_trip, full);
    }
}
