//! Segment mapping
//!
//! A [`SegmentMapper`] projects a source interval onto target genomes and
//! returns one [`MappedSegment`] per aligned piece. The chain-backed
//! implementation works like a classic liftover:
//! 1. Query the block index for blocks overlapping the interval
//! 2. Intersect each block with the interval
//! 3. Offset into the target side, counting from the block end on the
//!    minus strand
//!
//! All segment coordinates are global genome coordinates.

use crate::core::chain::ChainFile;
use crate::core::error::{MappingError, MappingResult};
use crate::core::genome::{Genome, Sequence};
use crate::core::index::{normalize_chrom_key, BlockIndex, BlockValue};
use std::collections::HashMap;

/// Strand orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Strand {
    #[default]
    Plus,
    Minus,
}

impl Strand {
    /// # Examples
    /// ```
    /// use fast_hal::core::mapper::Strand;
    /// assert_eq!(Strand::Plus.complement(), Strand::Minus);
    /// assert_eq!(Strand::Minus.complement(), Strand::Plus);
    /// ```
    pub fn complement(&self) -> Self {
        match self {
            Strand::Plus => Strand::Minus,
            Strand::Minus => Strand::Plus,
        }
    }

    /// # Examples
    /// ```
    /// use fast_hal::core::mapper::Strand;
    /// assert_eq!(Strand::from_char('+'), Some(Strand::Plus));
    /// assert_eq!(Strand::from_char('.'), None);
    /// ```
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Strand::Plus),
            '-' => Some(Strand::Minus),
            _ => None,
        }
    }

    pub fn to_char(&self) -> char {
        match self {
            Strand::Plus => '+',
            Strand::Minus => '-',
        }
    }

    /// Plus + Minus = Minus, Minus + Minus = Plus
    pub fn combine(&self, other: Strand) -> Strand {
        if *self == other {
            Strand::Plus
        } else {
            Strand::Minus
        }
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Projection of part of a source interval onto one target genome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedSegment {
    pub target_genome: String,
    pub target_start: u64,
    pub target_end: u64,
    pub source_start: u64,
    pub source_end: u64,
    pub strand: Strand,
    /// Came from a duplicated (non-primary) alignment path
    pub duplicate: bool,
}

impl MappedSegment {
    pub fn len(&self) -> u64 {
        self.target_end - self.target_start
    }

    pub fn is_empty(&self) -> bool {
        self.target_end == self.target_start
    }
}

/// Source of mapped segments for the liftover engine
pub trait SegmentMapper {
    /// Project `[start, end)` of `source` onto each genome in `targets`
    ///
    /// Segments are returned in source order per target genome. Duplicate
    /// paths are only followed when `traverse_dupes` is set.
    fn map_segments(
        &self,
        source: &Genome,
        start: u64,
        end: u64,
        targets: &[&Genome],
        traverse_dupes: bool,
    ) -> MappingResult<Vec<MappedSegment>>;
}

/// Overlap of two half-open intervals
#[inline]
pub fn intersect_intervals(start1: u64, end1: u64, start2: u64, end2: u64) -> Option<(u64, u64)> {
    if start1 >= end2 || end1 <= start2 {
        return None;
    }
    Some((start1.max(start2), end1.min(end2)))
}

/// Target interval for `size` bases at `left_offset` into a block
///
/// Minus-strand blocks hold forward coordinates, so the offset counts back
/// from the block end.
#[inline]
pub fn calculate_target_coords(block: &BlockValue, left_offset: u64, size: u64) -> (u64, u64) {
    let target_start = match block.target_strand {
        Strand::Plus => block.target_start + left_offset,
        Strand::Minus => block.target_end - left_offset - size,
    };
    (target_start, target_start + size)
}

/// Sequence of `genome` named `name`, tolerating chr-prefix and case differences
pub fn resolve_sequence<'g>(genome: &'g Genome, name: &str) -> Option<&'g Sequence> {
    if let Some(seq) = genome.sequence(name) {
        return Some(seq);
    }
    let key = normalize_chrom_key(name);
    genome
        .sequences()
        .iter()
        .find(|seq| normalize_chrom_key(seq.name()) == key)
}

/// Segment mapper over pairwise chain alignments
#[derive(Default)]
pub struct ChainSegmentMapper {
    /// (source genome, target genome) -> blocks
    indexes: HashMap<(String, String), BlockIndex>,
}

impl ChainSegmentMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chain(&mut self, source: &str, target: &str, chain: ChainFile) {
        self.add_index(source, target, BlockIndex::from_chain_data(chain));
    }

    pub fn add_index(&mut self, source: &str, target: &str, index: BlockIndex) {
        self.indexes
            .insert((source.to_string(), target.to_string()), index);
    }

    pub fn index(&self, source: &str, target: &str) -> Option<&BlockIndex> {
        self.indexes.get(&(source.to_string(), target.to_string()))
    }

    fn map_onto(
        &self,
        source: &Genome,
        start: u64,
        end: u64,
        target: &Genome,
        traverse_dupes: bool,
        out: &mut Vec<MappedSegment>,
    ) -> MappingResult<()> {
        if source.name() == target.name() {
            out.push(MappedSegment {
                target_genome: target.name().to_string(),
                target_start: start,
                target_end: end,
                source_start: start,
                source_end: end,
                strand: Strand::Plus,
                duplicate: false,
            });
            return Ok(());
        }

        let index = self
            .index(source.name(), target.name())
            .ok_or_else(|| MappingError::NoAlignmentPath {
                source_genome: source.name().to_string(),
                target_genome: target.name().to_string(),
            })?;

        let first = source.sequences().partition_point(|s| s.end() <= start);
        for seq in source.sequences()[first..].iter().take_while(|s| s.start() < end) {
            let local_start = start.max(seq.start()) - seq.start();
            let local_end = end.min(seq.end()) - seq.start();
            if local_start >= local_end {
                continue;
            }

            for interval in index.query(seq.name(), local_start, local_end) {
                let block = &interval.val;
                if block.duplicate && !traverse_dupes {
                    continue;
                }
                let Some((real_start, real_end)) =
                    intersect_intervals(local_start, local_end, interval.start, interval.stop)
                else {
                    continue;
                };

                let size = real_end - real_start;
                let (target_start, target_end) =
                    calculate_target_coords(block, real_start - interval.start, size);
                let target_seq = resolve_sequence(target, &block.target_chrom).ok_or_else(|| {
                    MappingError::UnknownTargetSequence {
                        genome: target.name().to_string(),
                        sequence: block.target_chrom.clone(),
                    }
                })?;

                out.push(MappedSegment {
                    target_genome: target.name().to_string(),
                    target_start: target_seq.start() + target_start,
                    target_end: target_seq.start() + target_end,
                    source_start: seq.start() + real_start,
                    source_end: seq.start() + real_end,
                    strand: block.target_strand,
                    duplicate: block.duplicate,
                });
            }
        }
        Ok(())
    }
}

impl SegmentMapper for ChainSegmentMapper {
    fn map_segments(
        &self,
        source: &Genome,
        start: u64,
        end: u64,
        targets: &[&Genome],
        traverse_dupes: bool,
    ) -> MappingResult<Vec<MappedSegment>> {
        if start >= end {
            return Err(MappingError::InvalidRange { start, end });
        }
        let mut segments = Vec::new();
        for target in targets {
            self.map_onto(source, start, end, target, traverse_dupes, &mut segments)?;
        }
        Ok(segments)
    }
}
