//! Chain file parsing
//!
//! Chain files describe pairwise alignments as runs of ungapped blocks and
//! are the alignment source behind [`crate::core::mapper::ChainSegmentMapper`].
//!
//! # Chain File Format
//!
//! ```text
//! chain score tName tSize tStrand tStart tEnd qName qSize qStrand qStart qEnd id
//! size dt dq
//! size dt dq
//! size
//! ```
//!
//! UCSC "target" (t) is the genome records are lifted *from*, so it becomes
//! our source; UCSC "query" (q) becomes our target.

use crate::core::io::{InputReader, LineIterator};
use crate::core::mapper::Strand;
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Error raised while reading a chain file
#[derive(Debug, Clone)]
pub struct ChainParseError {
    pub message: String,
    /// 1-based line number, when known
    pub line_number: Option<usize>,
    pub kind: ChainParseErrorKind,
    /// Offending line, truncated
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainParseErrorKind {
    InvalidHeader,
    InvalidDataLine,
    InvalidStrand,
    InvalidNumber,
    InvalidCoordinates,
    IoError,
}

impl std::fmt::Display for ChainParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line_number {
            Some(line) => write!(f, "Line {}: {}", line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ChainParseError {}

impl ChainParseError {
    fn at(
        message: impl Into<String>,
        line_number: usize,
        kind: ChainParseErrorKind,
        content: Option<&str>,
    ) -> Self {
        Self {
            message: message.into(),
            line_number: Some(line_number),
            kind,
            content: content.map(|c| c.chars().take(100).collect()),
        }
    }

    fn invalid_number(field: &str, value: &str, line_number: usize) -> Self {
        Self::at(
            format!("Invalid {} value '{}': expected a non-negative integer", field, value),
            line_number,
            ChainParseErrorKind::InvalidNumber,
            None,
        )
    }

    pub fn is_kind(&self, kind: ChainParseErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<std::io::Error> for ChainParseError {
    fn from(e: std::io::Error) -> Self {
        Self {
            message: format!("IO error: {}", e),
            line_number: None,
            kind: ChainParseErrorKind::IoError,
            content: None,
        }
    }
}

/// One side of a chain header: `name size strand start end`
#[derive(Debug, Clone)]
pub struct ChainSide {
    pub name: String,
    pub size: u64,
    pub strand: Strand,
    pub start: u64,
    pub end: u64,
}

impl ChainSide {
    fn parse(fields: &[&str], label: &str, line_number: usize) -> Result<Self, ChainParseError> {
        let number = |i: usize, what: &str| {
            fields[i].parse::<u64>().map_err(|_| {
                ChainParseError::invalid_number(&format!("{} {}", label, what), fields[i], line_number)
            })
        };
        let size = number(1, "size")?;
        let strand_char = fields[2].chars().next().unwrap_or('?');
        let strand = Strand::from_char(strand_char).ok_or_else(|| {
            ChainParseError::at(
                format!("Invalid strand character '{}', expected '+' or '-'", strand_char),
                line_number,
                ChainParseErrorKind::InvalidStrand,
                None,
            )
        })?;
        let start = number(3, "start")?;
        let end = number(4, "end")?;

        if start > end {
            return Err(ChainParseError::at(
                format!("{} start ({}) > {} end ({})", label, start, label, end),
                line_number,
                ChainParseErrorKind::InvalidCoordinates,
                None,
            ));
        }
        if end > size {
            return Err(ChainParseError::at(
                format!("{} end ({}) > {} size ({})", label, end, label, size),
                line_number,
                ChainParseErrorKind::InvalidCoordinates,
                None,
            ));
        }
        Ok(Self {
            name: fields[0].to_string(),
            size,
            strand,
            start,
            end,
        })
    }

    /// Forward-strand interval of `len` bases at strand offset `pos`
    fn forward_interval(&self, pos: u64, len: u64) -> (u64, u64) {
        match self.strand {
            Strand::Plus => (pos, pos + len),
            Strand::Minus => (self.size - (pos + len), self.size - pos),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChainHeader {
    pub score: u64,
    pub source: ChainSide,
    pub target: ChainSide,
    pub chain_id: String,
}

impl ChainHeader {
    pub fn parse(line: &str, line_number: usize) -> Result<Self, ChainParseError> {
        let fields: Vec<&str> = line.split_whitespace().collect();

        if fields.len() < 12 {
            return Err(ChainParseError::at(
                format!("Expected 12+ fields, got {}", fields.len()),
                line_number,
                ChainParseErrorKind::InvalidHeader,
                Some(line),
            ));
        }
        if fields[0] != "chain" {
            return Err(ChainParseError::at(
                format!("Expected 'chain' keyword, got '{}'", fields[0]),
                line_number,
                ChainParseErrorKind::InvalidHeader,
                Some(line),
            ));
        }

        let score = fields[1]
            .parse::<u64>()
            .map_err(|_| ChainParseError::invalid_number("score", fields[1], line_number))?;

        Ok(Self {
            score,
            source: ChainSide::parse(&fields[2..7], "source", line_number)?,
            target: ChainSide::parse(&fields[7..12], "target", line_number)?,
            chain_id: fields.get(12).map(|s| s.to_string()).unwrap_or_default(),
        })
    }
}

/// Ungapped aligned block, both sides in forward-strand coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBlock {
    pub source_chrom: String,
    pub source_start: u64,
    pub source_end: u64,
    pub target_chrom: String,
    pub target_start: u64,
    pub target_end: u64,
    /// Relative orientation of the two sides
    pub target_strand: Strand,
    /// Score of the owning chain
    pub score: u64,
    /// Position of the owning chain in the file
    pub chain_index: usize,
}

impl ChainBlock {
    pub fn len(&self) -> u64 {
        self.source_end - self.source_start
    }

    pub fn is_empty(&self) -> bool {
        self.source_end == self.source_start
    }
}

/// `size [dt dq]`; dt is the gap on our source side, dq on our target side
#[derive(Debug, Clone, Copy)]
struct DataLine {
    size: u64,
    source_gap: u64,
    target_gap: u64,
}

impl DataLine {
    fn parse(line: &str, line_number: usize) -> Result<Self, ChainParseError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 1 && fields.len() != 3 {
            return Err(ChainParseError::at(
                format!("Expected 1 or 3 fields, got {}", fields.len()),
                line_number,
                ChainParseErrorKind::InvalidDataLine,
                Some(line),
            ));
        }

        let size = fields[0]
            .parse::<u64>()
            .map_err(|_| ChainParseError::invalid_number("block size", fields[0], line_number))?;
        if size == 0 {
            return Err(ChainParseError::at(
                "Block size must be greater than 0",
                line_number,
                ChainParseErrorKind::InvalidDataLine,
                Some(line),
            ));
        }

        let gap = |i: usize, what: &str| -> Result<u64, ChainParseError> {
            match fields.get(i) {
                Some(v) => v
                    .parse::<u64>()
                    .map_err(|_| ChainParseError::invalid_number(what, v, line_number)),
                None => Ok(0),
            }
        };
        Ok(Self {
            size,
            source_gap: gap(1, "source gap (dt)")?,
            target_gap: gap(2, "target gap (dq)")?,
        })
    }
}

/// Parsed chain file
#[derive(Debug, Clone, Default)]
pub struct ChainFile {
    pub blocks: Vec<ChainBlock>,
    pub source_chrom_sizes: HashMap<String, u64>,
    pub target_chrom_sizes: HashMap<String, u64>,
    /// Number of chain headers read
    pub chain_count: usize,
}

impl ChainFile {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Parse chain records from any buffered reader
pub fn parse_chain_reader<R: BufRead>(reader: R) -> Result<ChainFile, ChainParseError> {
    let mut result = ChainFile::new();
    let mut current: Option<ChainHeader> = None;
    let mut source_pos = 0u64;
    let mut target_pos = 0u64;
    let mut line_number = 0usize;
    let mut lines = LineIterator::new(reader);

    while let Some(line) = lines.next_line() {
        line_number += 1;
        let trimmed = line?.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            current = None;
            continue;
        }

        if trimmed.starts_with("chain") {
            let header = ChainHeader::parse(trimmed, line_number)?;
            result
                .source_chrom_sizes
                .insert(header.source.name.clone(), header.source.size);
            result
                .target_chrom_sizes
                .insert(header.target.name.clone(), header.target.size);
            source_pos = header.source.start;
            target_pos = header.target.start;
            result.chain_count += 1;
            current = Some(header);
        } else if let Some(ref header) = current {
            let data = DataLine::parse(trimmed, line_number)?;
            if source_pos + data.size > header.source.end || target_pos + data.size > header.target.end {
                return Err(ChainParseError::at(
                    "Block extends past the chain header range",
                    line_number,
                    ChainParseErrorKind::InvalidCoordinates,
                    Some(trimmed),
                ));
            }

            let (source_start, source_end) = header.source.forward_interval(source_pos, data.size);
            let (target_start, target_end) = header.target.forward_interval(target_pos, data.size);
            let target_strand = if header.source.strand == header.target.strand {
                Strand::Plus
            } else {
                Strand::Minus
            };

            result.blocks.push(ChainBlock {
                source_chrom: header.source.name.clone(),
                source_start,
                source_end,
                target_chrom: header.target.name.clone(),
                target_start,
                target_end,
                target_strand,
                score: header.score,
                chain_index: result.chain_count - 1,
            });

            source_pos += data.size + data.source_gap;
            target_pos += data.size + data.target_gap;
        }
    }

    Ok(result)
}

/// Parse a chain file, transparently decompressing gzip or bzip2
pub fn parse_chain_file(path: &Path) -> Result<ChainFile, ChainParseError> {
    parse_chain_reader(InputReader::open(path)?)
}

pub fn parse_chain_bytes(data: &[u8]) -> Result<ChainFile, ChainParseError> {
    parse_chain_reader(BufReader::new(data))
}
