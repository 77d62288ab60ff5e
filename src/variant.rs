//! Variant records: one genomic event at one reference position for one
//! genome and allele.
//!
//! Variant kinds are a sum type rather than a hierarchy of interfaces:
//! each kind carries only the fields relevant to it, with the shared
//! position/genome-identity header living on [`Variant`] itself.

use serde::{Deserialize, Serialize};

use crate::genome::Position;

/// Which allele of a diploid genotype carries the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Allele {
    First,
    Second,
    Both,
}

/// The kind of genomic event, with the event-specific length where one
/// exists. `Reference` is a blank: a span inserted by *another* genome
/// that this genome must account for in meta-genome space without
/// carrying any bases of its own there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantKind {
    Insertion { length: Position },
    Deletion { length: Position },
    Snp,
    StructuralVariant { length: Position },
    Mix,
    Reference { length: Position },
    NoCall,
}

impl VariantKind {
    /// Event length in base pairs; point events count as 1.
    pub fn length(&self) -> Position {
        match self {
            VariantKind::Insertion { length } => *length,
            VariantKind::Deletion { length } => *length,
            VariantKind::StructuralVariant { length } => *length,
            VariantKind::Reference { length } => *length,
            VariantKind::Snp | VariantKind::Mix | VariantKind::NoCall => 1,
        }
    }

    /// Whether this event shifts the meta-genome coordinate space.
    /// Insertions do, and so do blanks (the inserted span exists in the
    /// meta-genome regardless of which genome contributed it).
    pub fn advances_offset(&self) -> bool {
        matches!(
            self,
            VariantKind::Insertion { .. } | VariantKind::Reference { .. }
        )
    }

    /// Derive the kind and length from VCF REF/ALT allele strings.
    ///
    /// Symbolic ALT alleles (`<DEL>`, `<INS>`, ...) have no literal
    /// length and are classified as structural variants of length 1; a
    /// missing ALT (`.`) is a no-call.
    pub fn from_alleles(ref_allele: &str, alt_allele: &str) -> Self {
        if alt_allele == "." {
            return VariantKind::NoCall;
        }
        if alt_allele.starts_with('<') {
            return VariantKind::StructuralVariant { length: 1 };
        }
        let ref_len = ref_allele.len() as Position;
        let alt_len = alt_allele.len() as Position;
        if ref_len == alt_len {
            if ref_len == 1 {
                VariantKind::Snp
            } else {
                VariantKind::Mix
            }
        } else if alt_len > ref_len {
            VariantKind::Insertion {
                length: alt_len - ref_len,
            }
        } else {
            VariantKind::Deletion {
                length: ref_len - alt_len,
            }
        }
    }
}

/// A dead zone: a meta-genome coordinate range attributable to an event
/// the rendered genome does not share (its own deletion, or another
/// genome's insertion). Start and stop are inclusive meta coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadZone {
    pub start: Position,
    pub stop: Position,
}

impl DeadZone {
    pub fn new(start: Position, stop: Position) -> Self {
        Self { start, stop }
    }

    pub fn len(&self) -> Position {
        self.stop - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.stop < self.start
    }

    pub fn contains(&self, meta_position: Position) -> bool {
        self.start <= meta_position && meta_position <= self.stop
    }
}

/// One variant call at one reference position for one genome.
///
/// The derived positions (`meta_position` and the two `next_*` fields)
/// are computed by the offset synchronizer and cached here, since they
/// are read many times per pass once resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub kind: VariantKind,
    /// 1-based reference position of the event.
    pub position: Position,
    pub genome: String,
    pub allele: Allele,
    /// Total inserted length at this site. Equals the event length for a
    /// lone insertion; colliding insertions accumulate here so the
    /// offset advances once, by the coalesced total.
    pub extra_offset: Position,
    /// The share of `extra_offset` contributed by blanks, i.e. inserted
    /// bases this genome does not carry. Survives kind merges so the
    /// dead-zone record is not lost when a site becomes `Mix`.
    pub blank_length: Position,
    pub meta_position: Option<Position>,
    pub next_reference_position: Option<Position>,
    pub next_meta_position: Option<Position>,
}

impl Variant {
    pub fn new(kind: VariantKind, position: Position, genome: &str, allele: Allele) -> Self {
        let extra_offset = if kind.advances_offset() {
            kind.length()
        } else {
            0
        };
        let blank_length = match kind {
            VariantKind::Reference { length } => length,
            _ => 0,
        };
        Self {
            kind,
            position,
            genome: genome.to_string(),
            allele,
            extra_offset,
            blank_length,
            meta_position: None,
            next_reference_position: None,
            next_meta_position: None,
        }
    }

    /// Merge an event arriving at the same reference position.
    ///
    /// Colliding insertions accumulate the incoming length into
    /// `extra_offset`, in arrival order; mixed kinds at one site become
    /// `Mix` but keep the accumulated insertion total.
    pub fn coalesce(&mut self, incoming: &Variant) {
        if incoming.kind.advances_offset() {
            self.extra_offset += incoming.kind.length();
        }
        self.blank_length += incoming.blank_length;
        if std::mem::discriminant(&self.kind) != std::mem::discriminant(&incoming.kind) {
            self.kind = VariantKind::Mix;
        }
        if self.allele != incoming.allele {
            self.allele = Allele::Both;
        }
        // cached positions are stale after any merge
        self.meta_position = None;
        self.next_reference_position = None;
        self.next_meta_position = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_alleles() {
        assert_eq!(VariantKind::from_alleles("A", "G"), VariantKind::Snp);
        assert_eq!(
            VariantKind::from_alleles("A", "ACGT"),
            VariantKind::Insertion { length: 3 }
        );
        assert_eq!(
            VariantKind::from_alleles("ACGT", "A"),
            VariantKind::Deletion { length: 3 }
        );
        assert_eq!(VariantKind::from_alleles("AT", "GC"), VariantKind::Mix);
        assert_eq!(VariantKind::from_alleles("A", "."), VariantKind::NoCall);
        assert_eq!(
            VariantKind::from_alleles("A", "<DEL>"),
            VariantKind::StructuralVariant { length: 1 }
        );
    }

    #[test]
    fn test_insertion_collision_coalesces_in_either_order() {
        for (first, second) in [(3, 5), (5, 3)] {
            let mut v = Variant::new(
                VariantKind::Insertion { length: first },
                100,
                "g1",
                Allele::First,
            );
            let incoming = Variant::new(
                VariantKind::Insertion { length: second },
                100,
                "g1",
                Allele::Second,
            );
            v.coalesce(&incoming);
            assert_eq!(v.extra_offset, 8);
            assert_eq!(v.allele, Allele::Both);
        }
    }

    #[test]
    fn test_mixed_kind_collision_becomes_mix() {
        let mut v = Variant::new(
            VariantKind::Insertion { length: 2 },
            10,
            "g1",
            Allele::First,
        );
        let snp = Variant::new(VariantKind::Snp, 10, "g1", Allele::First);
        v.coalesce(&snp);
        assert_eq!(v.kind, VariantKind::Mix);
        // the insertion's contribution survives the merge
        assert_eq!(v.extra_offset, 2);
    }

    #[test]
    fn test_blank_share_survives_kind_merge() {
        let mut v = Variant::new(
            VariantKind::Insertion { length: 3 },
            100,
            "g1",
            Allele::First,
        );
        let blank = Variant::new(
            VariantKind::Reference { length: 5 },
            100,
            "g1",
            Allele::Both,
        );
        v.coalesce(&blank);
        assert_eq!(v.kind, VariantKind::Mix);
        assert_eq!(v.extra_offset, 8);
        // 5 of the 8 inserted bases are bases this genome lacks
        assert_eq!(v.blank_length, 5);
    }

    #[test]
    fn test_dead_zone_contains() {
        let dz = DeadZone::new(101, 104);
        assert_eq!(dz.len(), 4);
        assert!(dz.contains(101));
        assert!(dz.contains(104));
        assert!(!dz.contains(105));
    }
}
