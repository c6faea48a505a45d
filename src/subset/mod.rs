//! Subset index over the dimensions of a composite state.
//!
//! For `N` dimensions there are exactly `2^N - 1` non-empty, order-preserving
//! subsets ("partial specifiers"). They are enumerated once when a machine is
//! built, smallest first and lexicographically within one size, and each gets
//! a dense [`SubsetId`]. The last id is always the full subset.

mod partial;

pub use partial::{CompositeState, Partial, PartialState};

pub(crate) use partial::resolve;

use crate::machine::ConstructionError;
use crate::core::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Largest number of dimensions a machine may have.
pub const MAX_DIMENSIONS: usize = 16;

/// Stable identity of one subset of dimensions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct SubsetId(u32);

impl SubsetId {
    /// Dense index of the subset, `0..2^N - 1`.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A non-empty set of dimension indices, kept in ascending order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subset {
    id: SubsetId,
    dimensions: Vec<usize>,
    mask: u32,
}

impl Subset {
    /// Identity of this subset in its index.
    pub fn id(&self) -> SubsetId {
        self.id
    }

    /// Dimension indices in declaration order.
    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    /// Bit `i` is set when dimension `i` is part of the subset.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Number of dimensions in the subset.
    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    /// Always false for subsets built by [`SubsetIndex`].
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Whether dimension `dimension` is part of the subset.
    pub fn contains(&self, dimension: usize) -> bool {
        dimension < MAX_DIMENSIONS && self.mask & (1 << dimension) != 0
    }

    /// Whether every dimension of `self` is also in `other`.
    pub fn is_subset_of(&self, other: &Subset) -> bool {
        self.mask & !other.mask == 0
    }
}

/// Precomputed table of every subset and the mapping between subset ids and
/// dimension sets.
#[derive(Debug)]
pub struct SubsetIndex {
    dimension_count: usize,
    subsets: Vec<Subset>,
    by_mask: HashMap<u32, SubsetId>,
}

impl SubsetIndex {
    /// Enumerate all subsets of `dimension_count` dimensions.
    pub fn new(dimension_count: usize) -> Result<Self, ConstructionError> {
        if dimension_count == 0 {
            return Err(ConstructionError::NoDimensions);
        }
        if dimension_count > MAX_DIMENSIONS {
            return Err(ConstructionError::TooManyDimensions {
                count: dimension_count,
                max: MAX_DIMENSIONS,
            });
        }

        let mut subsets = Vec::with_capacity((1 << dimension_count) - 1);
        let mut by_mask = HashMap::with_capacity((1 << dimension_count) - 1);

        for size in 1..=dimension_count {
            for dimensions in combinations(dimension_count, size) {
                let id = SubsetId(subsets.len() as u32);
                let mask = dimensions.iter().fold(0u32, |mask, &d| mask | (1 << d));
                by_mask.insert(mask, id);
                subsets.push(Subset {
                    id,
                    dimensions,
                    mask,
                });
            }
        }

        Ok(Self {
            dimension_count,
            subsets,
            by_mask,
        })
    }

    pub fn dimension_count(&self) -> usize {
        self.dimension_count
    }

    /// Number of subsets, always `2^N - 1`.
    pub fn len(&self) -> usize {
        self.subsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subsets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subset> {
        self.subsets.iter()
    }

    pub fn subset(&self, id: SubsetId) -> &Subset {
        &self.subsets[id.index()]
    }

    /// The subset holding every dimension.
    pub fn full(&self) -> SubsetId {
        SubsetId(self.subsets.len() as u32 - 1)
    }

    pub fn id_for_mask(&self, mask: u32) -> Option<SubsetId> {
        self.by_mask.get(&mask).copied()
    }

    /// Subset made of exactly `dimensions` (any order, no duplicates).
    pub fn id_for(&self, dimensions: &[usize]) -> Option<SubsetId> {
        let mut mask = 0u32;
        for &dimension in dimensions {
            if dimension >= self.dimension_count || mask & (1 << dimension) != 0 {
                return None;
            }
            mask |= 1 << dimension;
        }
        self.id_for_mask(mask)
    }

    /// Build a partial state from `(dimension, value)` pairs.
    ///
    /// Returns `None` for an empty list, an out-of-range dimension or a
    /// dimension given twice.
    pub fn partial(&self, mut entries: Vec<(usize, Value)>) -> Option<PartialState> {
        entries.sort_by_key(|(dimension, _)| *dimension);
        let dimensions: Vec<usize> = entries.iter().map(|(dimension, _)| *dimension).collect();
        let id = self.id_for(&dimensions)?;
        let values: Arc<[Value]> = entries.into_iter().map(|(_, value)| value).collect();
        Some(PartialState::from_parts(id, self.subset(id).mask, values))
    }

    /// Narrow `source` down to `target`; `None` unless `target` is contained
    /// in the source's subset.
    pub fn project(&self, source: &PartialState, target: SubsetId) -> Option<PartialState> {
        let subset = self.subset(target);
        if subset.mask & !source.mask() != 0 {
            return None;
        }
        if subset.id == source.subset() {
            return Some(source.clone());
        }
        let values: Option<Arc<[Value]>> = subset
            .dimensions
            .iter()
            .map(|&dimension| source.get(dimension).cloned())
            .collect();
        Some(PartialState::from_parts(target, subset.mask, values?))
    }

    /// Overwrite the dimensions of `wide` with those of `narrow`.
    ///
    /// The result covers the union of both subsets; `narrow` wins wherever
    /// both hold a value.
    pub fn inject(&self, wide: &PartialState, narrow: &PartialState) -> PartialState {
        let mask = wide.mask() | narrow.mask();
        let Some(id) = self.id_for_mask(mask) else {
            return wide.clone();
        };
        let values: Option<Arc<[Value]>> = self
            .subset(id)
            .dimensions
            .iter()
            .map(|&dimension| narrow.get(dimension).or_else(|| wide.get(dimension)).cloned())
            .collect();
        match values {
            Some(values) => PartialState::from_parts(id, mask, values),
            None => wide.clone(),
        }
    }

    /// Every enabled subset contained in `source`, projected from it.
    ///
    /// `enabled` is indexed by [`SubsetId::index`].
    pub fn projections(&self, source: &PartialState, enabled: &[bool]) -> Vec<PartialState> {
        self.subsets
            .iter()
            .filter(|subset| enabled.get(subset.id.index()).copied().unwrap_or(false))
            .filter_map(|subset| self.project(source, subset.id))
            .collect()
    }
}

fn combinations(n: usize, size: usize) -> Vec<Vec<usize>> {
    let mut result = Vec::new();
    let mut combination: Vec<usize> = (0..size).collect();
    loop {
        result.push(combination.clone());
        let Some(i) = (0..size).rev().find(|&i| combination[i] < n - size + i) else {
            break;
        };
        combination[i] += 1;
        for j in i + 1..size {
            combination[j] = combination[j - 1] + 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn values(index: &SubsetIndex, entries: &[(usize, u8)]) -> PartialState {
        index
            .partial(
                entries
                    .iter()
                    .map(|&(dimension, value)| (dimension, Value::new(value)))
                    .collect(),
            )
            .unwrap()
    }

    #[test]
    fn zero_dimensions_is_rejected() {
        assert!(matches!(
            SubsetIndex::new(0),
            Err(ConstructionError::NoDimensions)
        ));
    }

    #[test]
    fn too_many_dimensions_is_rejected() {
        assert!(matches!(
            SubsetIndex::new(MAX_DIMENSIONS + 1),
            Err(ConstructionError::TooManyDimensions { .. })
        ));
    }

    #[test]
    fn three_dimensions_enumerate_in_size_then_lexicographic_order() {
        let index = SubsetIndex::new(3).unwrap();
        let order: Vec<Vec<usize>> = index.iter().map(|s| s.dimensions().to_vec()).collect();

        assert_eq!(
            order,
            vec![
                vec![0],
                vec![1],
                vec![2],
                vec![0, 1],
                vec![0, 2],
                vec![1, 2],
                vec![0, 1, 2],
            ]
        );
        assert_eq!(index.subset(index.full()).dimensions(), &[0, 1, 2]);
    }

    #[test]
    fn ids_round_trip_through_dimension_sets() {
        let index = SubsetIndex::new(4).unwrap();
        let masks: HashSet<u32> = index.iter().map(Subset::mask).collect();

        assert_eq!(masks.len(), index.len());
        for subset in index.iter() {
            assert_eq!(index.id_for(subset.dimensions()), Some(subset.id()));
        }
        assert_eq!(index.id_for(&[2, 0]), index.id_for(&[0, 2]));
        assert_eq!(index.id_for(&[0, 0]), None);
        assert_eq!(index.id_for(&[4]), None);
        assert_eq!(index.id_for(&[]), None);
    }

    #[test]
    fn project_narrows_to_contained_subsets_only() {
        let index = SubsetIndex::new(3).unwrap();
        let full = values(&index, &[(0, 10), (1, 11), (2, 12)]);
        let target = index.id_for(&[0, 2]).unwrap();

        let projected = index.project(&full, target).unwrap();
        assert_eq!(projected, values(&index, &[(0, 10), (2, 12)]));

        let narrow = values(&index, &[(1, 11)]);
        assert!(index.project(&narrow, target).is_none());
    }

    #[test]
    fn inject_overwrites_only_narrow_dimensions() {
        let index = SubsetIndex::new(3).unwrap();
        let full = values(&index, &[(0, 10), (1, 11), (2, 12)]);
        let narrow = values(&index, &[(1, 99)]);

        let merged = index.inject(&full, &narrow);

        assert_eq!(merged, values(&index, &[(0, 10), (1, 99), (2, 12)]));
        assert_eq!(merged.subset(), index.full());
    }

    #[test]
    fn extract_reports_absent_dimensions() {
        let index = SubsetIndex::new(3).unwrap();
        let partial = values(&index, &[(0, 1), (2, 3)]);

        assert_eq!(partial.get(0), Some(&Value::new(1u8)));
        assert_eq!(partial.get(1), None);
        assert_eq!(partial.get(2), Some(&Value::new(3u8)));
        assert_eq!(partial.get(40), None);
    }

    #[test]
    fn projections_respect_enabled_flags() {
        let index = SubsetIndex::new(2).unwrap();
        let full = values(&index, &[(0, 1), (1, 2)]);
        let mut enabled = vec![false; index.len()];
        enabled[index.id_for(&[1]).unwrap().index()] = true;
        enabled[index.full().index()] = true;

        let projections = index.projections(&full, &enabled);

        assert_eq!(projections.len(), 2);
        assert!(projections.contains(&values(&index, &[(1, 2)])));
        assert!(projections.contains(&full));
    }
}
