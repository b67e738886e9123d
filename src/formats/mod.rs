//! File format adapters
//!
//! Value tracks (wiggle, bedGraph, BigWig) for liftover, and FASTA for
//! building and reading packed genomes.

pub mod fasta;
pub mod wig;

pub use fasta::{extract_region, pack_fasta, parse_region, FastaReader, FastaRecord, PackStats};
pub use wig::{convert_wig, OutputFormat, WigDeclaration, WigFormat, WigParseError, WigReader};
