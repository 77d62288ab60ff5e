//! Chromosome and assembly reference data.
//!
//! An [`Assembly`] is the stable, ordered registry of chromosomes for a
//! project: names, lengths, and a fixed ordering established once and
//! then used both for map keys and for array indices. The registry is
//! usually loaded from a tab-delimited *genome file* of sequence names
//! and lengths with [`read_seqlens`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::file::InputFile;

/// The integer type for genomic positions, 1-based throughout.
pub type Position = u64;

/// One chromosome: immutable name and length in base pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chromosome {
    pub name: String,
    pub length: Position,
}

impl Chromosome {
    pub fn new(name: impl Into<String>, length: Position) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// The ordered chromosome registry for one assembly.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    chromosomes: IndexMap<String, Position>,
}

impl Assembly {
    pub fn new() -> Self {
        Self {
            chromosomes: IndexMap::new(),
        }
    }

    /// Build an assembly from (name, length) pairs, preserving order.
    pub fn from_seqlens(seqlens: IndexMap<String, Position>) -> Self {
        Self {
            chromosomes: seqlens,
        }
    }

    /// Register a chromosome; insertion order establishes the stable
    /// ordinal used elsewhere. Re-registering a name updates its length.
    pub fn insert(&mut self, name: &str, length: Position) {
        self.chromosomes.insert(name.to_string(), length);
    }

    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    /// Length in base pairs of the named chromosome, if registered.
    pub fn chromosome_length(&self, name: &str) -> Option<Position> {
        self.chromosomes.get(name).copied()
    }

    /// Stable ordinal of the named chromosome.
    pub fn chromosome_index(&self, name: &str) -> Option<usize> {
        self.chromosomes.get_index_of(name)
    }

    /// Chromosome at the given ordinal.
    pub fn chromosome_at(&self, index: usize) -> Option<Chromosome> {
        self.chromosomes
            .get_index(index)
            .map(|(name, length)| Chromosome::new(name.clone(), *length))
    }

    /// Iterate chromosomes in registry order.
    pub fn iter(&self) -> impl Iterator<Item = Chromosome> + '_ {
        self.chromosomes
            .iter()
            .map(|(name, length)| Chromosome::new(name.clone(), *length))
    }

    /// Total assembly length in base pairs, the denominator for
    /// length-weighted progress reporting.
    pub fn total_length(&self) -> Position {
        self.chromosomes.values().sum()
    }
}

/// Read a tab-delimited *genome file* of sequence (i.e. chromosome) names
/// and their lengths. A `chrom`-prefixed header line is optional.
pub fn read_seqlens(filepath: &str) -> Result<Assembly, crate::multigenome::GenosyncError> {
    let input_file = InputFile::new(filepath);
    let has_header = input_file.has_header("chrom")?;
    let buf_reader = input_file.reader()?;

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_header)
        .from_reader(buf_reader);

    let mut seqlens = IndexMap::new();

    #[derive(Debug, Serialize, Deserialize, Default)]
    struct SeqLenEntry {
        chrom: String,
        length: Position,
    }

    for result in rdr.deserialize() {
        let record: SeqLenEntry = result?;
        seqlens.insert(record.chrom, record.length);
    }

    Ok(Assembly::from_seqlens(seqlens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_assembly_ordering_and_lookup() {
        let mut assembly = Assembly::new();
        assembly.insert("chr1", 1000);
        assembly.insert("chr2", 500);
        assembly.insert("chrX", 750);

        assert_eq!(assembly.len(), 3);
        assert_eq!(assembly.chromosome_length("chr2"), Some(500));
        assert_eq!(assembly.chromosome_index("chrX"), Some(2));
        assert_eq!(assembly.chromosome_at(0).unwrap().name, "chr1");
        assert_eq!(assembly.total_length(), 2250);
        assert_eq!(assembly.chromosome_length("chr99"), None);
    }

    #[test]
    fn test_read_seqlens_without_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seqlens.tsv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "chr1\t6980669").unwrap();
        writeln!(f, "chr2\t6004443").unwrap();
        drop(f);

        let assembly = read_seqlens(path.to_str().unwrap()).unwrap();
        assert_eq!(assembly.len(), 2);
        assert_eq!(assembly.chromosome_length("chr1"), Some(6980669));
    }
}
