//! The offset synchronizer: converts a chromosome's sparse variant set
//! into a continuous reference ↔ meta-genome coordinate mapping.
//!
//! Synchronization walks the frozen position index in increasing order,
//! accumulating insertion lengths into a running offset and emitting a
//! breakpoint wherever the offset changes. Between breakpoints, meta
//! coordinates advance 1:1 with reference coordinates, so a lookup is a
//! binary search for the governing breakpoint followed by a linear
//! advance. Dead zones (spans of meta space the genome has no bases
//! for) are recorded alongside but never feed the offset arithmetic of
//! the genome that owns the underlying event.

use ndarray::Array1;

use crate::genome::Position;
use crate::index::PositionIndex;
use crate::multigenome::GenosyncError;
use crate::numeric::rightmost_at_or_before;
use crate::variant::{DeadZone, VariantKind};

/// How a genome's own deletions are counted.
///
/// Under `MaskOnly` (the default) a deletion contributes a dead zone
/// and leaves the running offset untouched, so offsets never decrease.
/// Under `CountAgainstOwner` the deletion length is subtracted from the
/// running offset, clamped at zero so the offset never goes negative
/// relative to the cumulative insertion gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionPolicy {
    #[default]
    MaskOnly,
    CountAgainstOwner,
}

/// Per genome, per chromosome: the breakpoint table mapping reference
/// positions to cumulative meta-genome offsets, plus dead-zone ranges.
///
/// `breakpoints[i]` holds the first reference position *affected* by an
/// event (the event position plus one, since an insertion at `b` shifts
/// positions strictly after `b`); `offsets[i]` is the cumulative offset
/// in force from that position on.
#[derive(Debug, Clone)]
pub struct OffsetMap {
    breakpoints: Vec<Position>,
    offsets: Vec<Position>,
    dead_zones: Vec<DeadZone>,
    /// False once a breakpoint lowered the offset (possible only under
    /// `CountAgainstOwner`); the meta→reference inverse requires a
    /// non-decreasing offset sequence.
    monotonic: bool,
}

impl Default for OffsetMap {
    fn default() -> Self {
        Self {
            breakpoints: Vec::new(),
            offsets: Vec::new(),
            dead_zones: Vec::new(),
            monotonic: true,
        }
    }
}

impl OffsetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the offset map for one chromosome by walking its frozen
    /// position index. Caches the derived meta positions on each
    /// variant as it goes.
    ///
    /// Errors if the index has not been built.
    pub fn synchronize(
        index: &mut PositionIndex,
        policy: DeletionPolicy,
    ) -> Result<Self, GenosyncError> {
        let positions: Vec<Position> = index.positions()?.to_vec();

        let mut map = OffsetMap::new();
        let mut offset: Position = 0;

        for position in positions {
            let variant = index
                .variant_at(position)
                .ok_or(GenosyncError::IndexNotBuilt)?;
            let kind = variant.kind;
            let extra_offset = variant.extra_offset;
            let blank_length = variant.blank_length;

            // meta coordinate of the event site itself, before its effect
            let event_meta = position + offset;

            match kind {
                VariantKind::Insertion { .. } => {
                    offset += extra_offset;
                    map.push_breakpoint(position + 1, offset);
                }
                VariantKind::Reference { .. } => {
                    // a blank: another genome's insertion. The span exists
                    // in meta space but this genome has no bases there.
                    map.dead_zones
                        .push(DeadZone::new(event_meta + 1, event_meta + extra_offset));
                    offset += extra_offset;
                    map.push_breakpoint(position + 1, offset);
                }
                VariantKind::Deletion { length } => match policy {
                    DeletionPolicy::MaskOnly => {
                        map.dead_zones
                            .push(DeadZone::new(event_meta + 1, event_meta + length));
                    }
                    DeletionPolicy::CountAgainstOwner => {
                        offset = offset.saturating_sub(length);
                        map.push_breakpoint(position + 1, offset);
                    }
                },
                VariantKind::Mix => {
                    // a coalesced site: any insertion contribution is in
                    // extra_offset; point events contribute nothing. The
                    // genome's own bases fill the head of the inserted
                    // span; any blank share is the tail it lacks.
                    if extra_offset > 0 {
                        if blank_length > 0 {
                            let own = extra_offset - blank_length;
                            map.dead_zones.push(DeadZone::new(
                                event_meta + own + 1,
                                event_meta + extra_offset,
                            ));
                        }
                        offset += extra_offset;
                        map.push_breakpoint(position + 1, offset);
                    }
                }
                VariantKind::Snp | VariantKind::StructuralVariant { .. } | VariantKind::NoCall => {}
            }

            let variant = index
                .variant_at_mut(position)
                .ok_or(GenosyncError::IndexNotBuilt)?;
            variant.meta_position = Some(event_meta);
            variant.next_reference_position = Some(position + 1);
            variant.next_meta_position = Some(position + 1 + offset);
        }

        Ok(map)
    }

    fn push_breakpoint(&mut self, position: Position, offset: Position) {
        if self.offsets.last().is_some_and(|&last| offset < last) {
            self.monotonic = false;
        }
        self.breakpoints.push(position);
        self.offsets.push(offset);
    }

    /// Number of breakpoints.
    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    /// True when no variants shifted this chromosome: the mapping is
    /// the identity and `meta_position(p) == p` for all `p`.
    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// The cumulative offset in force at `position`.
    pub fn offset_at(&self, position: Position) -> Position {
        match rightmost_at_or_before(&self.breakpoints, position) {
            Some(idx) => self.offsets[idx],
            None => 0,
        }
    }

    /// Map a reference position into meta-genome space.
    pub fn meta_position(&self, position: Position) -> Position {
        position + self.offset_at(position)
    }

    /// Map many reference positions into meta-genome space at once.
    pub fn meta_positions(&self, positions: &[Position]) -> Array1<Position> {
        positions.iter().map(|&p| self.meta_position(p)).collect()
    }

    /// Map a meta-genome position back to the reference coordinate.
    ///
    /// Meta positions inside an inserted span have no reference
    /// counterpart of their own; they map to the insertion site.
    ///
    /// Errors when a `CountAgainstOwner` deletion lowered the offset
    /// sequence: the mapping is then not invertible, since distinct
    /// reference positions can share one meta coordinate.
    pub fn reference_position(&self, meta: Position) -> Result<Position, GenosyncError> {
        if !self.monotonic {
            return Err(GenosyncError::NonMonotonicOffsets);
        }
        // meta coordinates at which each breakpoint's offset takes hold
        let meta_at: Vec<Position> = self
            .breakpoints
            .iter()
            .zip(&self.offsets)
            .map(|(&b, &o)| b + o)
            .collect();
        let (candidate, next_idx) = match rightmost_at_or_before(&meta_at, meta) {
            None => (meta, 0),
            Some(idx) => (meta.saturating_sub(self.offsets[idx]), idx + 1),
        };
        Ok(if next_idx < self.breakpoints.len() {
            // inside an inserted span: clamp to the insertion site
            candidate.min(self.breakpoints[next_idx] - 1)
        } else {
            candidate
        })
    }

    /// All dead zones, in increasing meta order.
    pub fn dead_zones(&self) -> &[DeadZone] {
        &self.dead_zones
    }

    /// Dead zones overlapping the meta-space range `[start, stop]`.
    pub fn dead_zones_in_range(&self, start: Position, stop: Position) -> Vec<DeadZone> {
        self.dead_zones
            .iter()
            .filter(|dz| dz.start <= stop && start <= dz.stop)
            .copied()
            .collect()
    }

    /// Iterate `(reference_position, cumulative_offset)` breakpoints.
    pub fn iter_breakpoints(&self) -> impl Iterator<Item = (Position, Position)> + '_ {
        self.breakpoints
            .iter()
            .copied()
            .zip(self.offsets.iter().copied())
    }

    /// Drop memory slack once offsets are final.
    pub fn compact(&mut self) {
        self.breakpoints.shrink_to_fit();
        self.offsets.shrink_to_fit();
        self.dead_zones.shrink_to_fit();
    }
}
