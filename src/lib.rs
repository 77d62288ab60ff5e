//! Functionality for synchronizing multi-genome variant coordinates.
//!
//! Genomes with different insertion/deletion histories cannot be drawn
//! against a common reference without first agreeing on a shared
//! coordinate space. [`MultiGenome`] builds that space — the
//! *meta-genome* — from per-genome VCF variant calls: variants are
//! accumulated into per-chromosome position indexes, the reference
//! genome receives the deduplicated union of all insertions, and an
//! offset map per genome and chromosome translates reference positions
//! into meta-genome positions (and back). Per-chromosome work fans out
//! over a [`WorkPool`] with length-weighted progress and cooperative
//! cancellation.
//!
//! Since VCF files do not carry chromosome lengths, these are read
//! separately from a TSV-formatted "genome" file with
//! [`read_seqlens`].
//!
//! ```no_run
//! use genosync::prelude::*;
//!
//! let assembly = read_seqlens("hg38_seqlens.tsv")
//!     .expect("could not read seqlens");
//! let mut mg = MultiGenome::new(assembly);
//! mg.register_genome("NA12878");
//! mg.register_genome("NA12891");
//! mg.load_vcf("NA12878", "na12878_calls.vcf.gz")
//!     .expect("cannot read VCF");
//! mg.load_vcf("NA12891", "na12891_calls.vcf.gz")
//!     .expect("cannot read VCF");
//!
//! let pool = WorkPool::new().expect("cannot build pool");
//! match mg.synchronize(&pool).expect("synchronization failed") {
//!     Outcome::Completed(()) => {
//!         let meta = mg.get_genome_position("NA12878", "chr1", 1_500_000);
//!         println!("{:?}", meta);
//!     }
//!     Outcome::Cancelled => eprintln!("synchronization cancelled"),
//! }
//! ```

pub mod file;
pub mod genome;
pub mod index;
pub mod multigenome;
mod numeric;
pub mod offset;
pub mod pool;
pub mod variant;
pub mod vcf;

pub use genome::{read_seqlens, Assembly, Chromosome, Position};
pub use multigenome::{GenosyncError, MetaPosition, MultiGenome, SyncStage, REFERENCE_GENOME};
pub use offset::{DeletionPolicy, OffsetMap};
pub use pool::{ChromosomeTask, Outcome, WorkPool};
pub use variant::{Allele, DeadZone, Variant, VariantKind};

pub mod prelude {
    pub use crate::genome::{read_seqlens, Assembly, Chromosome, Position};
    pub use crate::multigenome::{
        GenosyncError, MetaPosition, MultiGenome, SyncStage, REFERENCE_GENOME,
    };
    pub use crate::offset::{DeletionPolicy, OffsetMap};
    pub use crate::pool::{ChromosomeTask, Outcome, WorkPool};
    pub use crate::variant::{Allele, DeadZone, Variant, VariantKind};
}

#[cfg(test)]
mod tests {}
