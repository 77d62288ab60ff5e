use clap::{Parser, Subcommand};
use genosync::prelude::*;

const INFO: &str = "\
genosync: synchronize multi-genome variant coordinates
usage: genosync [--help] <subcommand>

Subcommands:

  sync: build the meta-genome coordinate space from per-genome VCFs.

";

#[derive(Parser)]
#[clap(name = "genosync")]
#[clap(about = INFO)]
struct Cli {
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the meta-genome coordinate space from per-genome VCF files
    /// and export the breakpoint table.
    ///
    /// Output is a TSV with the following columns:
    ///
    ///  - genome name ("reference" for the meta-genome itself)
    ///  - chromosome name
    ///  - first reference position affected by the breakpoint (1-based)
    ///  - cumulative offset in force from that position on
    ///
    /// Example:
    ///
    ///  $ genosync sync --seqlens hg38_seqlens.tsv \
    ///      --genome NA12878=na12878.vcf.gz --genome NA12891=na12891.vcf.gz \
    ///      --output breakpoints.tsv --dead-zones dead_zones.tsv
    Sync {
        /// a TSV file of chromosome names and their lengths
        #[arg(long, required = true)]
        seqlens: String,
        /// a NAME=FILE.vcf[.gz] binding; repeat once per genome
        #[arg(long = "genome", required = true)]
        genomes: Vec<String>,
        /// the breakpoint output path (if not set, uses standard out)
        #[arg(long)]
        output: Option<String>,
        /// also write dead zones to this TSV file
        #[arg(long = "dead-zones")]
        dead_zones: Option<String>,
        /// worker thread count (0 = available cores)
        #[arg(long, default_value_t = 0)]
        threads: usize,
        /// charge deletions against the owning genome's offset instead
        /// of masking them as dead zones
        #[arg(long, default_value_t = false)]
        count_deletions: bool,
    },
}

fn parse_genome_binding(binding: &str) -> Result<(&str, &str), GenosyncError> {
    binding
        .split_once('=')
        .ok_or_else(|| GenosyncError::InvalidGenomeBinding(binding.to_string()))
}

fn sync(
    seqlens: &str,
    genomes: &[String],
    output: Option<&str>,
    dead_zones: Option<&str>,
    threads: usize,
    count_deletions: bool,
) -> Result<(), GenosyncError> {
    let assembly = read_seqlens(seqlens)?;
    let policy = if count_deletions {
        DeletionPolicy::CountAgainstOwner
    } else {
        DeletionPolicy::MaskOnly
    };
    let mut mg = MultiGenome::new(assembly).with_policy(policy);

    for binding in genomes {
        let (name, filepath) = parse_genome_binding(binding)?;
        mg.register_genome(name);
        let added = mg.load_vcf(name, filepath)?;
        eprintln!("{}: {} variant records from {}", name, added, filepath);
    }

    let pool = WorkPool::with_threads(threads)?;
    match mg.synchronize(&pool)? {
        Outcome::Completed(()) => {
            mg.write_breakpoints_tsv(output)?;
            if let Some(path) = dead_zones {
                mg.write_dead_zones_tsv(Some(path))?;
            }
            Ok(())
        }
        Outcome::Cancelled => {
            eprintln!("synchronization cancelled");
            std::process::exit(2);
        }
    }
}

fn run() -> Result<(), GenosyncError> {
    let cli = Cli::parse();
    match &cli.command {
        Some(Commands::Sync {
            seqlens,
            genomes,
            output,
            dead_zones,
            threads,
            count_deletions,
        }) => sync(
            seqlens,
            genomes,
            output.as_deref(),
            dead_zones.as_deref(),
            *threads,
            *count_deletions,
        ),
        None => {
            println!("{}\n", INFO);
            std::process::exit(1);
        }
    }
}

fn main() {
    match run() {
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
