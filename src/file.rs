//! Plaintext and gzip-compressed file input and output.
//!
//! [`InputFile`] and [`OutputFile`] give the rest of the crate a single
//! interface over plain and gzip-compressed genome files (seqlens TSVs,
//! VCFs, exported breakpoint tables). Compression on input is detected
//! from the gzip magic bytes rather than the file extension, since VCFs
//! in the wild are frequently misnamed.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;
use std::io::{self, BufWriter};
use std::io::{BufRead, BufReader, Read};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error: {0}")]
    IOError(#[from] io::Error),
}

/// Check if a file is gzipped by looking for the magic numbers.
fn is_gzipped_file(file_path: &str) -> io::Result<bool> {
    let mut file = File::open(file_path)?;
    let mut buffer = [0; 2];
    let n = file.read(&mut buffer)?;
    Ok(n == 2 && buffer == [0x1f, 0x8b])
}

/// An input file, possibly gzip-compressed.
pub struct InputFile {
    pub filepath: String,
}

impl InputFile {
    pub fn new(filepath: &str) -> Self {
        Self {
            filepath: filepath.to_string(),
        }
    }

    /// Open the file and return a buffered reader, decompressing
    /// transparently if the gzip magic bytes are present.
    pub fn reader(&self) -> Result<BufReader<Box<dyn Read>>, FileError> {
        let file = File::open(&self.filepath)?;
        let is_gzipped = is_gzipped_file(&self.filepath)?;
        let reader: Box<dyn Read> = if is_gzipped {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(BufReader::new(reader))
    }

    /// Check whether the first line of the file starts with `expect`.
    ///
    /// Used to sniff optional headers: a seqlens file may or may not
    /// carry a `chrom` header line, and a VCF always opens with `##`.
    pub fn has_header(&self, expect: &str) -> Result<bool, FileError> {
        let mut buf_reader = self.reader()?;
        let mut first_line = String::new();
        buf_reader.read_line(&mut first_line)?;
        Ok(first_line.starts_with(expect))
    }
}

/// An output file, gzip-compressed when the path ends in `.gz`.
pub struct OutputFile {
    pub filepath: String,
    pub header: Option<Vec<String>>,
}

impl OutputFile {
    /// Construct a new `OutputFile`; `header` lines, if any, are written
    /// first, each prefixed with `#`.
    pub fn new(filepath: &str, header: Option<Vec<String>>) -> Self {
        Self {
            filepath: filepath.to_string(),
            header,
        }
    }

    /// Open the file and return a writer, compressing if the filepath
    /// carries a `.gz` extension.
    pub fn writer(&self) -> Result<Box<dyn Write>, io::Error> {
        let outfile = &self.filepath;
        let is_gzip = outfile.ends_with(".gz");
        let mut writer: Box<dyn Write> = if is_gzip {
            Box::new(BufWriter::new(GzEncoder::new(
                File::create(outfile)?,
                Compression::default(),
            )))
        } else {
            Box::new(BufWriter::new(File::create(outfile)?))
        };
        if let Some(entries) = &self.header {
            for entry in entries {
                writeln!(writer, "#{}", entry)?;
            }
        }
        Ok(writer)
    }
}
