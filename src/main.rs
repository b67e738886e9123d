//! FastHal CLI entry point
//!
//! Lifts value tracks between genomes and packs or reads genome DNA.

use clap::{Parser, Subcommand, ValueEnum};
use fast_hal::core::{parse_chain_file, Alignment, ChainSegmentMapper, Genome, LiftoverOptions};
use fast_hal::core::tiles::DEFAULT_TILE_SIZE;
use fast_hal::formats::fasta::{self, DEFAULT_LINE_WIDTH};
use fast_hal::formats::wig::{self, OutputFormat};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormatArg {
    /// chrom, start, end, value (0-based, half-open)
    #[default]
    #[value(name = "bedgraph")]
    BedGraph,
    /// One fixedStep block per tile
    #[value(name = "wig")]
    Wig,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::BedGraph => OutputFormat::BedGraph,
            OutputFormatArg::Wig => OutputFormat::Wiggle,
        }
    }
}

#[derive(Parser)]
#[command(name = "fast-hal")]
#[command(about = "Packed genome storage and alignment-based track liftover")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lift a Wiggle/bedGraph/BigWig track through a chain alignment
    Wig {
        /// Chain file relating the two genomes
        chain: PathBuf,
        /// Input Wiggle, bedGraph or BigWig file
        input: PathBuf,
        /// Output file (optional, stdout if not specified)
        output: Option<PathBuf>,
        /// Name of the genome the input is on
        #[arg(long, default_value = "source")]
        source_genome: String,
        /// Name of the genome to lift onto
        #[arg(long, default_value = "target")]
        target_genome: String,
        /// Only follow the primary alignment path
        #[arg(long)]
        no_dupes: bool,
        /// Drop records whose bases map more than once
        #[arg(long)]
        unique: bool,
        /// Report every target base, using --default-value where unmapped
        #[arg(long)]
        preload: bool,
        /// Value of unmapped bases with --preload
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        default_value: f64,
        /// Bases per allocated tile
        #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
        tile_size: u64,
        /// Output layout
        #[arg(long, default_value = "bedgraph")]
        format: OutputFormatArg,
    },
    /// Pack a FASTA file into <prefix>.dna and <prefix>.seqs
    Pack {
        /// Input FASTA (plain, gzip or bzip2)
        fasta: PathBuf,
        /// Output prefix
        prefix: PathBuf,
        /// Genome name
        #[arg(long, default_value = "genome")]
        name: String,
    },
    /// Print a region of a packed genome as FASTA
    Extract {
        /// Prefix given to `pack`
        prefix: PathBuf,
        /// chrom or chrom:start-end (1-based, inclusive)
        region: String,
        /// Reverse-complement the output
        #[arg(short = 'r', long)]
        reverse: bool,
        /// Residues per line (0 for one line)
        #[arg(long, default_value_t = DEFAULT_LINE_WIDTH)]
        line_width: usize,
    },
}

fn load_chain(
    chain_path: &Path,
    source: &str,
    target: &str,
) -> anyhow::Result<(Alignment, ChainSegmentMapper)> {
    let start = Instant::now();
    eprintln!("Loading chain file: {:?}", chain_path);

    let chain = parse_chain_file(chain_path)
        .map_err(|e| anyhow::anyhow!("Failed to load chain file: {}", e))?;
    let alignment = Alignment::from_chain(&chain, source, target);
    let mut mapper = ChainSegmentMapper::new();
    mapper.add_chain(source, target, chain);

    eprintln!("Chain file loaded in {:.2}s", start.elapsed().as_secs_f64());
    Ok((alignment, mapper))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let start = Instant::now();

    match cli.command {
        Commands::Wig {
            chain,
            input,
            output,
            source_genome,
            target_genome,
            no_dupes,
            unique,
            preload,
            default_value,
            tile_size,
            format,
        } => {
            let (alignment, mapper) = load_chain(&chain, &source_genome, &target_genome)?;
            let options = LiftoverOptions {
                traverse_dupes: !no_dupes,
                unique,
                preload_output: preload,
                default_value,
                tile_size,
            };

            eprintln!("Converting Wiggle file: {:?} -> {:?}", input, output);
            let stats = wig::convert_wig(
                &input,
                output.as_deref(),
                &alignment,
                &mapper,
                &source_genome,
                &target_genome,
                options,
                format.into(),
            )?;

            eprintln!("\n=== Conversion Statistics ===");
            eprintln!("Total records:   {}", stats.total);
            eprintln!("Mapped:          {}", stats.mapped);
            eprintln!("Unmapped:        {}", stats.unmapped);
            eprintln!("Ambiguous:       {}", stats.ambiguous);
            eprintln!("Fragments:       {}", stats.fragments);
            eprintln!("Tiles written:   {}", stats.tiles);
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Pack { fasta, prefix, name } => {
            eprintln!("Packing FASTA file: {:?} -> {:?}", fasta, prefix);
            let (genome, stats) = fasta::pack_fasta(&fasta, &prefix, &name)?;

            eprintln!("\n=== Pack Statistics ===");
            eprintln!("Sequences:       {}", stats.sequences);
            eprintln!("Bases:           {}", stats.bases);
            eprintln!("Replaced by N:   {}", stats.replaced);
            eprintln!("Packed bytes:    {}", genome.total_length().div_ceil(2));
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Extract {
            prefix,
            region,
            reverse,
            line_width,
        } => {
            let genome = Genome::open_packed(&prefix, "genome")?;
            let (chrom, range) = fasta::parse_region(&region)?;
            let seq_len = genome
                .sequence(&chrom)
                .map(|s| s.length())
                .ok_or_else(|| anyhow::anyhow!("Unknown sequence: {}", chrom))?;
            let (begin, end) = range.unwrap_or((0, seq_len));

            let bases = fasta::extract_region(&genome, &chrom, begin, end, reverse)?;
            let header = if reverse {
                format!("{}:{}-{}(-)", chrom, begin + 1, end)
            } else {
                format!("{}:{}-{}", chrom, begin + 1, end)
            };

            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            fasta::write_record(&mut writer, &header, bases.as_bytes(), line_width)?;
            writer.flush()?;
        }
    }

    Ok(())
}
