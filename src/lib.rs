//! FastHal - packed genome storage and alignment-based track liftover
//!
//! Stores genomes as nibble-packed DNA behind a windowed storage layer,
//! walks them with strand-aware iterators, and lifts value tracks
//! (wiggle, bedGraph, BigWig) between genomes through pairwise alignments.
//!
//! # Example
//!
//! ```ignore
//! use fast_hal::{Alignment, ChainSegmentMapper, LiftoverOptions, WiggleLiftover, parse_chain_file};
//!
//! let chain = parse_chain_file("hg19ToHg38.chain".as_ref())?;
//! let alignment = Alignment::from_chain(&chain, "hg19", "hg38");
//! let mut mapper = ChainSegmentMapper::new();
//! mapper.add_chain("hg19", "hg38", chain);
//!
//! let engine = WiggleLiftover::new(&alignment, &mapper, LiftoverOptions::default());
//! let (tracks, stats) = engine.convert("hg19", &["hg38"], records)?;
//! ```

pub mod core;
pub mod formats;

// Re-export commonly used types
pub use core::{
    parse_chain_bytes, parse_chain_file, Alignment, ChainFile, ChainSegmentMapper, DnaError,
    DnaIterator, FastHalError, Genome, LiftoverError, LiftoverOptions, MappedSegment,
    MappingError, SegmentMapper, Sequence, Strand, Tile, WiggleLiftover,
};
pub use formats::{fasta, wig};
