//! The multi-genome aggregate: per-genome position indexes and offset
//! maps, plus the distinguished reference genome, orchestrated through
//! the full synchronization pipeline.
//!
//! Pipeline stages per project load:
//!
//! 1. variants stream in ([`MultiGenome::add_variant`], usually via
//!    [`MultiGenome::load_vcf`]);
//! 2. position indexes are frozen, one pool task per chromosome;
//! 3. the reference genome's variant list is built as the deduplicated
//!    union of every genome's insertions, and blanks are distributed to
//!    genomes missing part of an inserted span;
//! 4. offset maps are computed, one pool task per chromosome;
//! 5. internal arrays are compacted and queries become valid.
//!
//! Adding a variant after synchronization drops the aggregate back to
//! the loading stage; queries stay invalid until the next full pass.

use std::collections::HashSet;
use std::io::Write;

use genomap::{GenomeMap, GenomeMapError};
use indexmap::IndexMap;
use ndarray::Array1;
use thiserror::Error;

use crate::file::{FileError, OutputFile};
use crate::genome::{Assembly, Position};
use crate::index::PositionIndex;
use crate::offset::{DeletionPolicy, OffsetMap};
use crate::pool::{ChromosomeTask, Outcome, WorkPool};
use crate::variant::{Allele, DeadZone, Variant, VariantKind};
use crate::vcf::VcfReader;

/// Name reserved for the distinguished reference genome, whose offsets
/// define the meta-genome coordinate space.
pub const REFERENCE_GENOME: &str = "reference";

#[derive(Error, Debug)]
pub enum GenosyncError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("File reading error: {0}")]
    FileError(#[from] FileError),
    #[error("seqlens parsing error: {0}")]
    SeqlensParsingError(#[from] csv::Error),
    #[error("VCF parsing error at {path}:{line}: {message}")]
    VcfParse {
        path: String,
        line: u64,
        message: String,
    },
    #[error("Chromosome key '{0}' does not exist")]
    NoChromosome(String),
    #[error("Genome '{0}' is not registered")]
    NoGenome(String),
    #[error("Sample for genome '{0}' not present in VCF")]
    NoSample(String),
    #[error("Invalid genome binding '{0}', expected NAME=FILE.vcf")]
    InvalidGenomeBinding(String),
    #[error("Lookup out of bounds ({0}:{1})")]
    LookupOutOfBounds(String, Position),
    #[error("Position index queried before build_index")]
    IndexNotBuilt,
    #[error("meta to reference lookup requires non-decreasing offsets")]
    NonMonotonicOffsets,
    #[error("Synchronization has not completed; queries are invalid")]
    NotReady,
    #[error("Worker pool error: {0}")]
    Pool(String),
    #[error("GenomeMap error: error updating GenomeMap")]
    GenomeMapError(#[from] GenomeMapError),
}

/// Pipeline stage of the aggregate. Queries are valid only in `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Loading,
    Indexed,
    Deduplicated,
    Synchronized,
    Compacted,
    Ready,
}

/// Per-genome stores: one position index and one offset map per
/// chromosome with recorded variants.
pub struct GenomeTracks {
    indexes: GenomeMap<PositionIndex>,
    offsets: GenomeMap<OffsetMap>,
}

impl Default for GenomeTracks {
    fn default() -> Self {
        Self {
            indexes: GenomeMap::new(),
            offsets: GenomeMap::new(),
        }
    }
}

/// Variant and offset details at one reference position.
#[derive(Debug, Clone)]
pub struct MetaPosition {
    pub reference_position: Position,
    pub meta_position: Position,
    pub offset: Position,
    pub variant: Variant,
}

pub struct MultiGenome {
    assembly: Assembly,
    genomes: IndexMap<String, GenomeTracks>,
    reference: GenomeTracks,
    /// Raw insertion events per chromosome, kept for reference-genome
    /// deduplication: (position, length) in arrival order.
    insertion_events: GenomeMap<Vec<(Position, Position)>>,
    policy: DeletionPolicy,
    stage: SyncStage,
}

impl MultiGenome {
    pub fn new(assembly: Assembly) -> Self {
        Self {
            assembly,
            genomes: IndexMap::new(),
            reference: GenomeTracks::default(),
            insertion_events: GenomeMap::new(),
            policy: DeletionPolicy::default(),
            stage: SyncStage::Loading,
        }
    }

    pub fn with_policy(mut self, policy: DeletionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn assembly(&self) -> &Assembly {
        &self.assembly
    }

    pub fn stage(&self) -> SyncStage {
        self.stage
    }

    pub fn register_genome(&mut self, name: &str) {
        self.genomes
            .entry(name.to_string())
            .or_insert_with(GenomeTracks::default);
    }

    pub fn genome_names(&self) -> impl Iterator<Item = &String> {
        self.genomes.keys()
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }

    fn validate_position(&self, chromosome: &str, position: Position) -> Result<(), GenosyncError> {
        let length = self
            .assembly
            .chromosome_length(chromosome)
            .ok_or_else(|| GenosyncError::NoChromosome(chromosome.to_string()))?;
        if position == 0 || position > length {
            return Err(GenosyncError::LookupOutOfBounds(
                chromosome.to_string(),
                position,
            ));
        }
        Ok(())
    }

    /// Record one variant for a genome. Any mutation drops the
    /// aggregate back to the loading stage.
    pub fn add_variant(
        &mut self,
        genome: &str,
        chromosome: &str,
        variant: Variant,
    ) -> Result<(), GenosyncError> {
        self.validate_position(chromosome, variant.position)?;
        let tracks = self
            .genomes
            .get_mut(genome)
            .ok_or_else(|| GenosyncError::NoGenome(genome.to_string()))?;

        if let VariantKind::Insertion { length } = variant.kind {
            self.insertion_events
                .entry_or_default(chromosome)
                .push((variant.position, length));
        }
        tracks.indexes.entry_or_default(chromosome).add_variant(variant);
        self.stage = SyncStage::Loading;
        Ok(())
    }

    /// Record a blank: a span another genome inserted, which this
    /// genome must carry as a dead zone in meta space.
    pub fn add_blank(
        &mut self,
        genome: &str,
        chromosome: &str,
        position: Position,
        length: Position,
    ) -> Result<(), GenosyncError> {
        self.add_variant(
            genome,
            chromosome,
            Variant::new(
                VariantKind::Reference { length },
                position,
                genome,
                Allele::Both,
            ),
        )
    }

    /// Load one genome's calls from a VCF file. Returns the number of
    /// variant records added.
    ///
    /// Sample resolution: a sample named after the genome wins; a
    /// single-sample file is used as-is; a sites-only file counts every
    /// ALT line against both alleles. A multi-sample file without a
    /// matching sample is an error. Chromosomes absent from the
    /// assembly are skipped.
    pub fn load_vcf(&mut self, genome: &str, filepath: &str) -> Result<usize, GenosyncError> {
        if !self.genomes.contains_key(genome) {
            return Err(GenosyncError::NoGenome(genome.to_string()));
        }
        let mut reader = VcfReader::open(filepath)?;
        let sample_index = {
            let samples = reader.samples();
            if samples.is_empty() {
                None
            } else if let Some(idx) = samples.iter().position(|s| s == genome) {
                Some(idx)
            } else if samples.len() == 1 {
                Some(0)
            } else {
                return Err(GenosyncError::NoSample(genome.to_string()));
            }
        };

        let mut added = 0;
        while let Some(record) = reader.next_record()? {
            if self.assembly.chromosome_length(&record.chromosome).is_none() {
                continue;
            }
            let variants = match sample_index {
                Some(idx) => match record.calls.get(idx) {
                    Some(call) => record.variants_for_call(call, genome),
                    None => Vec::new(),
                },
                None => record
                    .alt_alleles
                    .first()
                    .map(|alt| {
                        vec![Variant::new(
                            VariantKind::from_alleles(&record.ref_allele, alt),
                            record.position,
                            genome,
                            Allele::Both,
                        )]
                    })
                    .unwrap_or_default(),
            };
            let chromosome = record.chromosome.clone();
            for variant in variants {
                self.add_variant(genome, &chromosome, variant)?;
                added += 1;
            }
        }
        Ok(added)
    }

    /// Run the full synchronization pipeline. On cancellation the
    /// aggregate is left unsafe to query (partial per-chromosome work
    /// is discarded wholesale) and variants must be reloaded.
    pub fn synchronize(&mut self, pool: &WorkPool) -> Result<Outcome<()>, GenosyncError> {
        // a fresh pass never accumulates onto a previous one
        self.reference = GenomeTracks::default();
        for tracks in self.genomes.values_mut() {
            tracks.offsets = GenomeMap::new();
        }
        self.stage = SyncStage::Loading;

        if self.build_indexes(pool)?.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        self.stage = SyncStage::Indexed;

        self.dedupe_reference()?;
        self.stage = SyncStage::Deduplicated;

        if self.compute_offsets(pool)?.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        self.stage = SyncStage::Synchronized;

        self.compact();
        self.stage = SyncStage::Compacted;

        self.stage = SyncStage::Ready;
        Ok(Outcome::Completed(()))
    }

    /// Freeze every genome's position indexes, one task per chromosome.
    fn build_indexes(&mut self, pool: &WorkPool) -> Result<Outcome<()>, GenosyncError> {
        let mut tasks = Vec::new();
        for chromosome in self.assembly.iter() {
            let mut batch: Vec<(String, PositionIndex)> = Vec::new();
            for (name, tracks) in self.genomes.iter_mut() {
                if let Some(entry) = tracks.indexes.get_mut(&chromosome.name) {
                    batch.push((name.clone(), std::mem::take(entry)));
                }
            }
            if batch.is_empty() {
                continue;
            }
            tasks.push(ChromosomeTask::new(
                chromosome.name.clone(),
                chromosome.length,
                move || {
                    let mut batch = batch;
                    for (_, index) in batch.iter_mut() {
                        index.build_index();
                    }
                    Ok(batch)
                },
            ));
        }

        match pool.run(tasks)? {
            Outcome::Cancelled => Ok(Outcome::Cancelled),
            Outcome::Completed(results) => {
                for (chromosome, batch) in results {
                    for (genome, index) in batch {
                        self.put_index(&genome, &chromosome, index);
                    }
                }
                Ok(Outcome::Completed(()))
            }
        }
    }

    fn put_index(&mut self, genome: &str, chromosome: &str, index: PositionIndex) {
        let tracks = if genome == REFERENCE_GENOME {
            &mut self.reference
        } else {
            self.genomes
                .entry(genome.to_string())
                .or_insert_with(GenomeTracks::default)
        };
        *tracks.indexes.entry_or_default(chromosome) = index;
    }

    fn put_offsets(&mut self, genome: &str, chromosome: &str, offsets: OffsetMap) {
        let tracks = if genome == REFERENCE_GENOME {
            &mut self.reference
        } else {
            self.genomes
                .entry(genome.to_string())
                .or_insert_with(GenomeTracks::default)
        };
        *tracks.offsets.entry_or_default(chromosome) = offsets;
    }

    /// Build the reference genome's variant list as the deduplicated
    /// union of every genome's insertions, and give each genome a blank
    /// for whatever share of an inserted span it does not carry itself.
    fn dedupe_reference(&mut self) -> Result<(), GenosyncError> {
        for chromosome in self.assembly.iter() {
            let Some(events) = self.insertion_events.get(&chromosome.name) else {
                continue;
            };
            // exact (position, length) duplicates collapse to one event;
            // distinct lengths at one position remain distinct events
            let mut seen: HashSet<(Position, Position)> = HashSet::new();
            let mut distinct: IndexMap<Position, Vec<Position>> = IndexMap::new();
            for &(position, length) in events {
                if seen.insert((position, length)) {
                    distinct.entry(position).or_default().push(length);
                }
            }
            if distinct.is_empty() {
                continue;
            }

            let ref_index = self.reference.indexes.entry_or_default(&chromosome.name);
            for (&position, lengths) in &distinct {
                for &length in lengths {
                    ref_index.add_variant(Variant::new(
                        VariantKind::Insertion { length },
                        position,
                        REFERENCE_GENOME,
                        Allele::Both,
                    ));
                }
            }
            ref_index.build_index();

            for (name, tracks) in self.genomes.iter_mut() {
                let index = tracks.indexes.entry_or_default(&chromosome.name);
                let mut touched = false;
                for (&position, lengths) in &distinct {
                    let union_total: Position = lengths.iter().sum();
                    let own = index
                        .variant_at(position)
                        .map(|v| v.extra_offset)
                        .unwrap_or(0);
                    if own < union_total {
                        index.add_variant(Variant::new(
                            VariantKind::Reference {
                                length: union_total - own,
                            },
                            position,
                            name,
                            Allele::Both,
                        ));
                        touched = true;
                    }
                }
                if touched || !index.is_built() {
                    index.build_index();
                }
            }
        }
        Ok(())
    }

    /// Compute every genome's offset maps, one task per chromosome.
    fn compute_offsets(&mut self, pool: &WorkPool) -> Result<Outcome<()>, GenosyncError> {
        let policy = self.policy;
        let mut tasks = Vec::new();
        for chromosome in self.assembly.iter() {
            let mut batch: Vec<(String, PositionIndex)> = Vec::new();
            if let Some(entry) = self.reference.indexes.get_mut(&chromosome.name) {
                batch.push((REFERENCE_GENOME.to_string(), std::mem::take(entry)));
            }
            for (name, tracks) in self.genomes.iter_mut() {
                if let Some(entry) = tracks.indexes.get_mut(&chromosome.name) {
                    batch.push((name.clone(), std::mem::take(entry)));
                }
            }
            if batch.is_empty() {
                continue;
            }
            tasks.push(ChromosomeTask::new(
                chromosome.name.clone(),
                chromosome.length,
                move || {
                    let mut out = Vec::with_capacity(batch.len());
                    for (name, mut index) in batch {
                        let offsets = OffsetMap::synchronize(&mut index, policy)?;
                        out.push((name, index, offsets));
                    }
                    Ok(out)
                },
            ));
        }

        match pool.run(tasks)? {
            Outcome::Cancelled => Ok(Outcome::Cancelled),
            Outcome::Completed(results) => {
                for (chromosome, batch) in results {
                    for (genome, index, offsets) in batch {
                        self.put_index(&genome, &chromosome, index);
                        self.put_offsets(&genome, &chromosome, offsets);
                    }
                }
                Ok(Outcome::Completed(()))
            }
        }
    }

    fn compact(&mut self) {
        for tracks in self
            .genomes
            .values_mut()
            .chain(std::iter::once(&mut self.reference))
        {
            for index in tracks.indexes.values_mut() {
                index.compact();
            }
            for offsets in tracks.offsets.values_mut() {
                offsets.compact();
            }
        }
    }

    /// Re-run offset computation for one chromosome only, leaving the
    /// rest of the aggregate untouched. Used when the active chromosome
    /// changes; results are identical to the full pipeline's.
    pub fn resynchronize_chromosome(&mut self, chromosome: &str) -> Result<(), GenosyncError> {
        if self.stage != SyncStage::Ready {
            return Err(GenosyncError::NotReady);
        }
        if self.assembly.chromosome_length(chromosome).is_none() {
            return Err(GenosyncError::NoChromosome(chromosome.to_string()));
        }
        let policy = self.policy;
        let mut batch: Vec<(String, PositionIndex)> = Vec::new();
        if let Some(entry) = self.reference.indexes.get_mut(chromosome) {
            batch.push((REFERENCE_GENOME.to_string(), std::mem::take(entry)));
        }
        for (name, tracks) in self.genomes.iter_mut() {
            if let Some(entry) = tracks.indexes.get_mut(chromosome) {
                batch.push((name.clone(), std::mem::take(entry)));
            }
        }
        for (name, mut index) in batch {
            let mut offsets = OffsetMap::synchronize(&mut index, policy)?;
            index.compact();
            offsets.compact();
            self.put_index(&name, chromosome, index);
            self.put_offsets(&name, chromosome, offsets);
        }
        Ok(())
    }

    fn tracks_for(&self, genome: &str) -> Result<&GenomeTracks, GenosyncError> {
        if genome == REFERENCE_GENOME {
            return Ok(&self.reference);
        }
        self.genomes
            .get(genome)
            .ok_or_else(|| GenosyncError::NoGenome(genome.to_string()))
    }

    fn require_ready(&self) -> Result<(), GenosyncError> {
        if self.stage != SyncStage::Ready {
            return Err(GenosyncError::NotReady);
        }
        Ok(())
    }

    /// Meta-genome coordinate for a reference position. A chromosome
    /// with no recorded variants maps identically.
    pub fn get_genome_position(
        &self,
        genome: &str,
        chromosome: &str,
        position: Position,
    ) -> Result<Position, GenosyncError> {
        self.require_ready()?;
        self.validate_position(chromosome, position)?;
        let tracks = self.tracks_for(genome)?;
        Ok(match tracks.offsets.get(chromosome) {
            Some(offsets) => offsets.meta_position(position),
            None => position,
        })
    }

    /// Meta-genome coordinates for many reference positions at once.
    pub fn get_genome_positions(
        &self,
        genome: &str,
        chromosome: &str,
        positions: &[Position],
    ) -> Result<Array1<Position>, GenosyncError> {
        positions
            .iter()
            .map(|&p| self.get_genome_position(genome, chromosome, p))
            .collect::<Result<Vec<_>, _>>()
            .map(Array1::from_vec)
    }

    /// Reference coordinate for a meta-genome position (the inverse of
    /// [`MultiGenome::get_genome_position`]).
    pub fn get_reference_position(
        &self,
        genome: &str,
        chromosome: &str,
        meta_position: Position,
    ) -> Result<Position, GenosyncError> {
        self.require_ready()?;
        if self.assembly.chromosome_length(chromosome).is_none() {
            return Err(GenosyncError::NoChromosome(chromosome.to_string()));
        }
        let tracks = self.tracks_for(genome)?;
        Ok(match tracks.offsets.get(chromosome) {
            Some(offsets) => offsets.reference_position(meta_position)?,
            None => meta_position,
        })
    }

    /// Variant and offset details at a reference position, or `None`
    /// when no variant is recorded there (the normal case).
    pub fn get_mg_position(
        &self,
        genome: &str,
        chromosome: &str,
        position: Position,
    ) -> Result<Option<MetaPosition>, GenosyncError> {
        self.require_ready()?;
        self.validate_position(chromosome, position)?;
        let tracks = self.tracks_for(genome)?;
        let Some(index) = tracks.indexes.get(chromosome) else {
            return Ok(None);
        };
        let Some(variant) = index.variant_at(position) else {
            return Ok(None);
        };
        let offset = tracks
            .offsets
            .get(chromosome)
            .map(|o| o.offset_at(position))
            .unwrap_or(0);
        Ok(Some(MetaPosition {
            reference_position: position,
            meta_position: variant.meta_position.unwrap_or(position + offset),
            offset,
            variant: variant.clone(),
        }))
    }

    /// Dead zones for a genome's chromosome, in increasing meta order.
    pub fn dead_zones(
        &self,
        genome: &str,
        chromosome: &str,
    ) -> Result<&[DeadZone], GenosyncError> {
        self.require_ready()?;
        let tracks = self.tracks_for(genome)?;
        Ok(tracks
            .offsets
            .get(chromosome)
            .map(|o| o.dead_zones())
            .unwrap_or(&[]))
    }

    /// Dead zones overlapping a meta-space range.
    pub fn dead_zones_in_range(
        &self,
        genome: &str,
        chromosome: &str,
        start: Position,
        stop: Position,
    ) -> Result<Vec<DeadZone>, GenosyncError> {
        self.require_ready()?;
        let tracks = self.tracks_for(genome)?;
        Ok(tracks
            .offsets
            .get(chromosome)
            .map(|o| o.dead_zones_in_range(start, stop))
            .unwrap_or_default())
    }

    /// Write every genome's breakpoint table to a TSV file, or standard
    /// out when `filepath` is `None`.
    pub fn write_breakpoints_tsv(&self, filepath: Option<&str>) -> Result<(), GenosyncError> {
        self.require_ready()?;
        let mut writer = self.open_writer(filepath)?;
        writeln!(writer, "genome\tchrom\tposition\toffset")?;
        for (genome, tracks) in std::iter::once((REFERENCE_GENOME, &self.reference))
            .chain(self.genomes.iter().map(|(n, t)| (n.as_str(), t)))
        {
            for (chromosome, offsets) in tracks.offsets.iter() {
                for (position, offset) in offsets.iter_breakpoints() {
                    writeln!(writer, "{}\t{}\t{}\t{}", genome, chromosome, position, offset)?;
                }
            }
        }
        Ok(())
    }

    /// Write every genome's dead zones to a TSV file, or standard out
    /// when `filepath` is `None`.
    pub fn write_dead_zones_tsv(&self, filepath: Option<&str>) -> Result<(), GenosyncError> {
        self.require_ready()?;
        let mut writer = self.open_writer(filepath)?;
        writeln!(writer, "genome\tchrom\tmeta_start\tmeta_stop")?;
        for (genome, tracks) in self.genomes.iter() {
            for (chromosome, offsets) in tracks.offsets.iter() {
                for dz in offsets.dead_zones() {
                    writeln!(writer, "{}\t{}\t{}\t{}", genome, chromosome, dz.start, dz.stop)?;
                }
            }
        }
        Ok(())
    }

    fn open_writer(&self, filepath: Option<&str>) -> Result<Box<dyn Write>, GenosyncError> {
        Ok(match filepath {
            Some(path) => OutputFile::new(path, None).writer()?,
            None => Box::new(std::io::stdout()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_pool() -> WorkPool {
        WorkPool::with_threads(2)
            .unwrap()
            .quiet()
            .with_poll_interval(Duration::from_millis(10))
    }

    fn test_assembly() -> Assembly {
        let mut assembly = Assembly::new();
        assembly.insert("chr1", 1000);
        assembly.insert("chr2", 500);
        assembly
    }

    fn ins(position: Position, length: Position, genome: &str) -> Variant {
        Variant::new(
            VariantKind::Insertion { length },
            position,
            genome,
            Allele::First,
        )
    }

    #[test]
    fn test_queries_invalid_before_ready() {
        let mut mg = MultiGenome::new(test_assembly());
        mg.register_genome("g1");
        assert!(matches!(
            mg.get_genome_position("g1", "chr1", 10),
            Err(GenosyncError::NotReady)
        ));
    }

    #[test]
    fn test_identity_for_variantless_genome() {
        let mut mg = MultiGenome::new(test_assembly());
        mg.register_genome("g1");
        mg.synchronize(&test_pool()).unwrap();
        for p in [1, 250, 1000] {
            assert_eq!(mg.get_genome_position("g1", "chr1", p).unwrap(), p);
        }
    }

    #[test]
    fn test_blank_distribution_aligns_genomes() {
        let mut mg = MultiGenome::new(test_assembly());
        mg.register_genome("g1");
        mg.register_genome("g2");
        mg.add_variant("g1", "chr1", ins(100, 4, "g1")).unwrap();
        mg.synchronize(&test_pool()).unwrap();

        // both genomes and the reference share the meta coordinate space
        for genome in ["g1", "g2", REFERENCE_GENOME] {
            assert_eq!(mg.get_genome_position(genome, "chr1", 100).unwrap(), 100);
            assert_eq!(mg.get_genome_position(genome, "chr1", 101).unwrap(), 105);
        }
        // but only g2 (which lacks the insertion) has a dead zone
        assert!(mg.dead_zones("g1", "chr1").unwrap().is_empty());
        assert_eq!(
            mg.dead_zones("g2", "chr1").unwrap(),
            &[DeadZone::new(101, 104)]
        );
    }

    #[test]
    fn test_shared_insertion_deduplicated() {
        let mut mg = MultiGenome::new(test_assembly());
        mg.register_genome("g1");
        mg.register_genome("g2");
        // same (position, length) insertion carried by both genomes
        mg.add_variant("g1", "chr1", ins(100, 4, "g1")).unwrap();
        mg.add_variant("g2", "chr1", ins(100, 4, "g2")).unwrap();
        mg.synchronize(&test_pool()).unwrap();

        // counted once, not twice
        assert_eq!(
            mg.get_genome_position(REFERENCE_GENOME, "chr1", 101).unwrap(),
            105
        );
        assert_eq!(mg.get_genome_position("g1", "chr1", 101).unwrap(), 105);
        assert!(mg.dead_zones("g1", "chr1").unwrap().is_empty());
        assert!(mg.dead_zones("g2", "chr1").unwrap().is_empty());
    }

    #[test]
    fn test_distinct_collision_lengths_coalesce() {
        let mut mg = MultiGenome::new(test_assembly());
        mg.register_genome("g1");
        mg.register_genome("g2");
        mg.add_variant("g1", "chr1", ins(100, 3, "g1")).unwrap();
        mg.add_variant("g2", "chr1", ins(100, 5, "g2")).unwrap();
        mg.synchronize(&test_pool()).unwrap();

        // the meta space holds both distinct insertions: 3 + 5 = 8
        assert_eq!(
            mg.get_genome_position(REFERENCE_GENOME, "chr1", 101).unwrap(),
            109
        );
        // g1 carries 3 of the 8, g2 carries 5; both still land at 109
        assert_eq!(mg.get_genome_position("g1", "chr1", 101).unwrap(), 109);
        assert_eq!(mg.get_genome_position("g2", "chr1", 101).unwrap(), 109);
        // each genome lacks the other's share of the inserted span: its
        // own bases fill the head, the missing tail is a dead zone
        assert_eq!(
            mg.dead_zones("g1", "chr1").unwrap(),
            &[DeadZone::new(104, 108)]
        );
        assert_eq!(
            mg.dead_zones("g2", "chr1").unwrap(),
            &[DeadZone::new(106, 108)]
        );
        assert!(mg.dead_zones(REFERENCE_GENOME, "chr1").unwrap().is_empty());
    }

    #[test]
    fn test_get_mg_position_details() {
        let mut mg = MultiGenome::new(test_assembly());
        mg.register_genome("g1");
        mg.add_variant("g1", "chr1", ins(100, 4, "g1")).unwrap();
        mg.synchronize(&test_pool()).unwrap();

        let info = mg.get_mg_position("g1", "chr1", 100).unwrap().unwrap();
        assert_eq!(info.reference_position, 100);
        assert_eq!(info.meta_position, 100);
        assert_eq!(info.variant.kind, VariantKind::Insertion { length: 4 });
        // most positions carry no variant
        assert!(mg.get_mg_position("g1", "chr1", 99).unwrap().is_none());
    }

    #[test]
    fn test_mutation_drops_back_to_loading() {
        let mut mg = MultiGenome::new(test_assembly());
        mg.register_genome("g1");
        mg.synchronize(&test_pool()).unwrap();
        assert_eq!(mg.stage(), SyncStage::Ready);

        mg.add_variant("g1", "chr1", ins(100, 4, "g1")).unwrap();
        assert_eq!(mg.stage(), SyncStage::Loading);
        assert!(matches!(
            mg.get_genome_position("g1", "chr1", 101),
            Err(GenosyncError::NotReady)
        ));

        mg.synchronize(&test_pool()).unwrap();
        assert_eq!(mg.get_genome_position("g1", "chr1", 101).unwrap(), 105);
    }

    #[test]
    fn test_resynchronize_chromosome_matches_full_pipeline() {
        let mut mg = MultiGenome::new(test_assembly());
        mg.register_genome("g1");
        mg.add_variant("g1", "chr1", ins(100, 4, "g1")).unwrap();
        mg.add_variant("g1", "chr2", ins(50, 2, "g1")).unwrap();
        mg.synchronize(&test_pool()).unwrap();

        let before: Vec<Position> = (1..=200)
            .map(|p| mg.get_genome_position("g1", "chr1", p).unwrap())
            .collect();
        mg.resynchronize_chromosome("chr1").unwrap();
        let after: Vec<Position> = (1..=200)
            .map(|p| mg.get_genome_position("g1", "chr1", p).unwrap())
            .collect();
        assert_eq!(before, after);
        // chr2 untouched
        assert_eq!(mg.get_genome_position("g1", "chr2", 51).unwrap(), 53);
    }

    #[test]
    fn test_bounds_and_unknown_keys() {
        let mut mg = MultiGenome::new(test_assembly());
        mg.register_genome("g1");
        mg.synchronize(&test_pool()).unwrap();
        assert!(matches!(
            mg.get_genome_position("g1", "chr9", 10),
            Err(GenosyncError::NoChromosome(_))
        ));
        assert!(matches!(
            mg.get_genome_position("gX", "chr1", 10),
            Err(GenosyncError::NoGenome(_))
        ));
        assert!(matches!(
            mg.get_genome_position("g1", "chr1", 1001),
            Err(GenosyncError::LookupOutOfBounds(_, _))
        ));
    }

    #[test]
    fn test_cancelled_pass_leaves_aggregate_unready() {
        let mut mg = MultiGenome::new(test_assembly());
        mg.register_genome("g1");
        mg.add_variant("g1", "chr1", ins(100, 4, "g1")).unwrap();
        let pool = test_pool();
        pool.stop();
        let outcome = mg.synchronize(&pool).unwrap();
        assert!(outcome.is_cancelled());
        assert!(matches!(
            mg.get_genome_position("g1", "chr1", 101),
            Err(GenosyncError::NotReady)
        ));
    }

    #[test]
    fn test_breakpoint_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("breakpoints.tsv");
        let mut mg = MultiGenome::new(test_assembly());
        mg.register_genome("g1");
        mg.add_variant("g1", "chr1", ins(100, 4, "g1")).unwrap();
        mg.synchronize(&test_pool()).unwrap();
        mg.write_breakpoints_tsv(Some(path.to_str().unwrap()))
            .unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("genome\tchrom\tposition\toffset"));
        assert!(contents.contains("g1\tchr1\t101\t4"));
        assert!(contents.contains("reference\tchr1\t101\t4"));
    }
}
