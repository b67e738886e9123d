//! Error types for FastHal
//!
//! Defines all error types used throughout the library.

use crate::core::chain::ChainParseError;
use thiserror::Error;

/// Main error type for FastHal operations
#[derive(Debug, Error)]
pub enum FastHalError {
    /// Chain file parsing errors
    #[error("Chain parse error: {0}")]
    ChainParse(#[from] ChainParseError),

    /// DNA storage and iterator errors
    #[error("DNA error: {0}")]
    Dna(#[from] DnaError),

    /// Segment mapping errors
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Track liftover errors
    #[error("Liftover error: {0}")]
    Liftover(#[from] LiftoverError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the nucleotide codec, the storage backend and DNA iterators
#[derive(Debug, Error)]
pub enum DnaError {
    /// Position outside the genome or outside the addressable byte range
    #[error("Index {index} out of range for genome of length {length}")]
    OutOfRange { index: i64, length: u64 },

    /// Non-nucleotide symbol passed to a mutating base operation
    #[error("Invalid nucleotide character: {0:?}")]
    InvalidCharacter(char),

    /// Argument violates a precondition (e.g. unequal lengths)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Backing store could not be read or written
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while projecting an interval through the alignment
#[derive(Debug, Error)]
pub enum MappingError {
    /// No alignment data connects the two genomes
    #[error("No alignment path from genome {source_genome} to genome {target_genome}")]
    NoAlignmentPath {
        source_genome: String,
        target_genome: String,
    },

    /// Alignment block refers to a sequence the target genome does not have
    #[error("Target genome {genome} has no sequence {sequence}")]
    UnknownTargetSequence { genome: String, sequence: String },

    /// Invalid coordinate range
    #[error("Invalid coordinate range: start ({start}) >= end ({end})")]
    InvalidRange { start: u64, end: u64 },
}

/// Errors that abort a track liftover
#[derive(Debug, Error)]
pub enum LiftoverError {
    /// Input record failed structural validation
    #[error("Malformed input at line {line}: {message}")]
    MalformedInput { line: usize, message: String },

    /// Record refers to a sequence absent from the source genome
    #[error("Genome {genome} has no sequence {sequence}")]
    UnknownSequence { genome: String, sequence: String },

    /// Genome named in the conversion is absent from the alignment
    #[error("Alignment has no genome {0}")]
    UnknownGenome(String),

    /// The segment mapper could not resolve a projection
    #[error("Mapping failure: {0}")]
    MappingFailure(#[from] MappingError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for FastHal operations
pub type Result<T> = std::result::Result<T, FastHalError>;

/// Result type alias for DNA storage operations
pub type DnaResult<T> = std::result::Result<T, DnaError>;

/// Result type alias for mapping operations
pub type MappingResult<T> = std::result::Result<T, MappingError>;

/// Result type alias for liftover operations
pub type LiftoverResult<T> = std::result::Result<T, LiftoverError>;
