//! Line-level VCF reading.
//!
//! Reads plain or gzip-compressed VCF files through [`InputFile`],
//! skipping `##` meta lines, capturing sample names from the `#CHROM`
//! header, and yielding one [`VcfRecord`] per body line. Only the
//! fields the synchronizer needs are retained: chromosome, 1-based
//! position, REF/ALT alleles, and per-sample genotype calls.

use std::io::{BufRead, BufReader, Read};

use crate::file::InputFile;
use crate::genome::Position;
use crate::multigenome::GenosyncError;
use crate::variant::{Allele, Variant, VariantKind};

/// A diploid genotype call: allele indices into `[REF, ALT...]`, with
/// 0 meaning REF and `None` a missing (`.`) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenotypeCall {
    pub first: Option<usize>,
    pub second: Option<usize>,
}

impl GenotypeCall {
    /// Parse the GT subfield of a VCF sample column (`0|1`, `1/1`,
    /// `./.`, or haploid `1`). Anything after the first `:` is ignored.
    pub fn parse(field: &str) -> Self {
        let gt = field.split(':').next().unwrap_or(field);
        let mut alleles = gt.split(['|', '/']);
        let first = alleles.next().and_then(|a| a.parse().ok());
        let second = alleles.next().and_then(|a| a.parse().ok());
        Self { first, second }
    }

    pub fn is_missing(&self) -> bool {
        self.first.is_none() && self.second.is_none()
    }
}

/// One VCF body line.
#[derive(Debug, Clone)]
pub struct VcfRecord {
    pub chromosome: String,
    /// 1-based reference position.
    pub position: Position,
    pub ref_allele: String,
    pub alt_alleles: Vec<String>,
    /// One call per sample, in header order. Empty for sites-only VCFs.
    pub calls: Vec<GenotypeCall>,
}

impl VcfRecord {
    /// Expand one sample's genotype into variant records for `genome`.
    ///
    /// Each non-reference allele index yields one variant; a call
    /// carried on both alleles yields a single `Allele::Both` record
    /// rather than two. Missing calls yield a `NoCall`.
    pub fn variants_for_call(&self, call: &GenotypeCall, genome: &str) -> Vec<Variant> {
        if call.is_missing() {
            return vec![Variant::new(
                VariantKind::NoCall,
                self.position,
                genome,
                Allele::Both,
            )];
        }

        let mut variants = Vec::new();
        let first_alt = call.first.filter(|&idx| idx > 0);
        let second_alt = call.second.filter(|&idx| idx > 0);

        match (first_alt, second_alt) {
            (Some(a), Some(b)) if a == b => {
                if let Some(kind) = self.kind_for_alt(a) {
                    variants.push(Variant::new(kind, self.position, genome, Allele::Both));
                }
            }
            (first, second) => {
                if let Some(idx) = first {
                    if let Some(kind) = self.kind_for_alt(idx) {
                        variants.push(Variant::new(kind, self.position, genome, Allele::First));
                    }
                }
                if let Some(idx) = second {
                    if let Some(kind) = self.kind_for_alt(idx) {
                        variants.push(Variant::new(kind, self.position, genome, Allele::Second));
                    }
                }
            }
        }
        variants
    }

    fn kind_for_alt(&self, alt_index: usize) -> Option<VariantKind> {
        self.alt_alleles
            .get(alt_index - 1)
            .map(|alt| VariantKind::from_alleles(&self.ref_allele, alt))
    }
}

/// A reader over one VCF file.
pub struct VcfReader {
    reader: BufReader<Box<dyn Read>>,
    filepath: String,
    samples: Vec<String>,
    line_number: u64,
}

impl VcfReader {
    /// Open a VCF, consuming its header. The `#CHROM` line, when
    /// present, supplies the sample names.
    pub fn open(filepath: &str) -> Result<Self, GenosyncError> {
        let input_file = InputFile::new(filepath);
        let mut reader = input_file.reader()?;

        let mut samples = Vec::new();
        let mut line_number = 0;
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                break;
            }
            line_number += 1;
            if line.starts_with("##") {
                continue;
            }
            if line.starts_with('#') {
                // #CHROM POS ID REF ALT QUAL FILTER INFO [FORMAT S1 S2 ...]
                samples = line
                    .trim_end()
                    .split('\t')
                    .skip(9)
                    .map(|s| s.to_string())
                    .collect();
                break;
            }
            // headerless VCF: the first body line was consumed, which we
            // cannot push back; treat this as a malformed file.
            return Err(GenosyncError::VcfParse {
                path: filepath.to_string(),
                line: line_number,
                message: "expected '##' meta lines or a '#CHROM' header".to_string(),
            });
        }

        Ok(Self {
            reader,
            filepath: filepath.to_string(),
            samples,
            line_number,
        })
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    fn parse_error(&self, message: impl Into<String>) -> GenosyncError {
        GenosyncError::VcfParse {
            path: self.filepath.clone(),
            line: self.line_number,
            message: message.into(),
        }
    }

    fn parse_line(&self, line: &str) -> Result<VcfRecord, GenosyncError> {
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() < 5 {
            return Err(self.parse_error(format!(
                "expected at least 5 tab-delimited fields, found {}",
                fields.len()
            )));
        }
        let chromosome = fields[0].to_string();
        let position: Position = fields[1]
            .parse()
            .map_err(|_| self.parse_error(format!("invalid POS field '{}'", fields[1])))?;
        if position == 0 {
            return Err(self.parse_error("POS must be 1-based"));
        }
        let ref_allele = fields[3].to_string();
        let alt_alleles: Vec<String> = fields[4].split(',').map(|s| s.to_string()).collect();
        let calls: Vec<GenotypeCall> = fields
            .iter()
            .skip(9)
            .map(|f| GenotypeCall::parse(f))
            .collect();
        Ok(VcfRecord {
            chromosome,
            position,
            ref_allele,
            alt_alleles,
            calls,
        })
    }

    /// Read the next body record, or `None` at end of file.
    pub fn next_record(&mut self) -> Result<Option<VcfRecord>, GenosyncError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self.reader.read_line(&mut line)?;
            if n == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let trimmed = line.trim_end();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return self.parse_line(trimmed).map(Some);
        }
    }
}

impl Iterator for VcfReader {
    type Item = Result<VcfRecord, GenosyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
