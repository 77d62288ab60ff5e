//! Per-genome, per-chromosome position index.
//!
//! A [`PositionIndex`] accumulates variants into a position-keyed map,
//! then freezes a flat sorted array of positions with
//! [`PositionIndex::build_index`]. The two-phase design keeps loading
//! large VCFs linear: insertion never re-sorts, and ordinal queries are
//! only legal once the index has been built. Adding more variants after
//! a build leaves the array stale until an explicit rebuild.

use indexmap::IndexMap;

use crate::genome::Position;
use crate::multigenome::GenosyncError;
use crate::numeric::{search_sorted, SearchResult};
use crate::variant::Variant;

#[derive(Debug, Clone, Default)]
pub struct PositionIndex {
    variants: IndexMap<Position, Variant>,
    index: Vec<Position>,
    indexed: bool,
}

impl PositionIndex {
    pub fn new() -> Self {
        Self {
            variants: IndexMap::new(),
            index: Vec::new(),
            indexed: false,
        }
    }

    /// Insert a variant, coalescing with any event already recorded at
    /// the same reference position. Does not touch the sorted index.
    pub fn add_variant(&mut self, variant: Variant) {
        match self.variants.get_mut(&variant.position) {
            Some(existing) => existing.coalesce(&variant),
            None => {
                self.variants.insert(variant.position, variant);
            }
        }
    }

    /// Recompute the sorted position array from the current key set.
    /// Must run before any ordinal or first-position query.
    pub fn build_index(&mut self) {
        self.index = self.variants.keys().copied().collect();
        self.index.sort_unstable();
        self.indexed = true;
    }

    pub fn is_built(&self) -> bool {
        self.indexed
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// The variant recorded at `position`, if any. Absence is the normal
    /// case: most reference positions carry no variant.
    pub fn variant_at(&self, position: Position) -> Option<&Variant> {
        self.variants.get(&position)
    }

    pub fn variant_at_mut(&mut self, position: Position) -> Option<&mut Variant> {
        self.variants.get_mut(&position)
    }

    /// The frozen sorted positions. Errors if the index was never built.
    pub fn positions(&self) -> Result<&[Position], GenosyncError> {
        if !self.indexed {
            return Err(GenosyncError::IndexNotBuilt);
        }
        Ok(&self.index)
    }

    /// The variant at the given ordinal of the frozen index.
    pub fn variant_at_ordinal(&self, ordinal: usize) -> Result<Option<&Variant>, GenosyncError> {
        let positions = self.positions()?;
        Ok(positions.get(ordinal).and_then(|p| self.variants.get(p)))
    }

    /// Ordinal of `position` within the frozen index, if present.
    pub fn ordinal_of(&self, position: Position) -> Result<Option<usize>, GenosyncError> {
        let positions = self.positions()?;
        match search_sorted(positions, position) {
            SearchResult::Exact(idx) => Ok(Some(idx)),
            _ => Ok(None),
        }
    }

    /// True iff `position` is the smallest element of the frozen index.
    /// This is the base case for offset-chain walks.
    pub fn is_first_position(&self, position: Position) -> Result<bool, GenosyncError> {
        let positions = self.positions()?;
        Ok(positions.first() == Some(&position))
    }

    /// Propagate a resolved offset chain one step: meta coordinates
    /// advance 1:1 with reference coordinates between breakpoints, so
    /// `current` maps to the previous variant's next-meta position plus
    /// the reference distance walked since its next-reference position.
    pub fn get_genome_position(
        &self,
        current: Position,
        previous: &Variant,
    ) -> Result<Position, GenosyncError> {
        let (next_meta, next_ref) = previous
            .next_meta_position
            .zip(previous.next_reference_position)
            .ok_or(GenosyncError::NotReady)?;
        Ok(next_meta + (current - next_ref))
    }

    /// Drop any memory slack once no further mutation is expected.
    pub fn compact(&mut self) {
        self.variants.shrink_to_fit();
        self.index.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{Allele, VariantKind};

    fn ins(position: Position, length: Position) -> Variant {
        Variant::new(
            VariantKind::Insertion { length },
            position,
            "g1",
            Allele::First,
        )
    }

    #[test]
    fn test_lookup_absent_is_none() {
        let mut idx = PositionIndex::new();
        idx.add_variant(ins(100, 4));
        assert!(idx.variant_at(100).is_some());
        assert!(idx.variant_at(101).is_none());
    }

    #[test]
    fn test_collision_coalesces_through_add() {
        let mut idx = PositionIndex::new();
        idx.add_variant(ins(100, 3));
        idx.add_variant(ins(100, 5));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.variant_at(100).unwrap().extra_offset, 8);
    }

    #[test]
    fn test_index_stale_until_rebuilt() {
        let mut idx = PositionIndex::new();
        idx.add_variant(ins(500, 2));
        idx.build_index();
        assert!(idx.is_first_position(500).unwrap());

        // insertion at a smaller position is not visible until rebuild
        idx.add_variant(ins(100, 4));
        assert!(idx.is_first_position(500).unwrap());
        assert!(!idx.is_first_position(100).unwrap());
        assert_eq!(idx.ordinal_of(100).unwrap(), None);

        idx.build_index();
        assert!(idx.is_first_position(100).unwrap());
        assert!(!idx.is_first_position(500).unwrap());
        assert_eq!(idx.ordinal_of(100).unwrap(), Some(0));
        assert_eq!(idx.ordinal_of(500).unwrap(), Some(1));
    }

    #[test]
    fn test_queries_before_build_are_errors() {
        let mut idx = PositionIndex::new();
        idx.add_variant(ins(10, 1));
        assert!(matches!(
            idx.is_first_position(10),
            Err(GenosyncError::IndexNotBuilt)
        ));
        assert!(matches!(idx.positions(), Err(GenosyncError::IndexNotBuilt)));
    }

    #[test]
    fn test_get_genome_position_propagation() {
        let idx = PositionIndex::new();
        let mut previous = ins(100, 4);
        previous.next_reference_position = Some(101);
        previous.next_meta_position = Some(105);
        // 1:1 advance past the breakpoint
        assert_eq!(idx.get_genome_position(101, &previous).unwrap(), 105);
        assert_eq!(idx.get_genome_position(250, &previous).unwrap(), 254);
    }

    #[test]
    fn test_ordinal_access() {
        let mut idx = PositionIndex::new();
        idx.add_variant(ins(300, 1));
        idx.add_variant(ins(100, 1));
        idx.add_variant(ins(200, 1));
        idx.build_index();
        let first = idx.variant_at_ordinal(0).unwrap().unwrap();
        assert_eq!(first.position, 100);
        assert!(idx.variant_at_ordinal(3).unwrap().is_none());
    }
}
