//! Core genome and liftover functionality
//!
//! This module contains the nucleotide codec, DNA storage and iterators,
//! the genome catalog, the chain-backed segment mapper, and the liftover
//! engine with its tile store.

pub mod chain;
pub mod dna;
pub mod error;
pub mod genome;
pub mod index;
pub mod io;
pub mod iterator;
pub mod liftover;
pub mod mapper;
pub mod storage;
pub mod tiles;

pub use chain::{
    parse_chain_bytes, parse_chain_file, parse_chain_reader, ChainBlock, ChainFile, ChainHeader,
    ChainParseError, ChainParseErrorKind,
};
pub use error::{
    DnaError, DnaResult, FastHalError, LiftoverError, LiftoverResult, MappingError, MappingResult,
    Result,
};
pub use genome::{Alignment, DnaHandle, Genome, Sequence};
pub use index::{BlockIndex, BlockInterval, BlockValue};
pub use io::{AtomicWriter, ByteLineIterator, InputReader, LineIterator, DEFAULT_BUFFER_SIZE};
pub use iterator::DnaIterator;
pub use liftover::{ConversionStats, IntervalRecord, LiftedTrack, LiftoverOptions, WiggleLiftover};
pub use mapper::{ChainSegmentMapper, MappedSegment, SegmentMapper, Strand};
pub use storage::{BufferedStorage, DnaPages, DnaStorage, MappedPages, MemoryPages, PageSource};
pub use tiles::{Tile, TileTrack};
