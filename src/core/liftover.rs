//! Value-track liftover
//!
//! Reads `(start, end, value)` records on a source genome, projects each one
//! through a [`SegmentMapper`], and aggregates the mapped fragments into a
//! [`TileTrack`] per target genome. Tracks are only handed back when the
//! whole input converted cleanly, so a failed run never yields partial
//! output.

use crate::core::error::{LiftoverError, LiftoverResult};
use crate::core::genome::{Alignment, Genome};
use crate::core::mapper::{resolve_sequence, MappedSegment, SegmentMapper};
use crate::core::tiles::{Tile, TileTrack, DEFAULT_TILE_SIZE};
use log::{debug, info, trace};

/// Value reported for uncovered bases of a preloaded track
pub const DEFAULT_VALUE: f64 = 0.0;

/// Liftover policy switches
#[derive(Debug, Clone, PartialEq)]
pub struct LiftoverOptions {
    /// Follow duplicated alignment paths beyond the primary one
    pub traverse_dupes: bool,
    /// Drop records whose bases map more than once
    pub unique: bool,
    /// Emit uncovered target bases with `default_value`
    pub preload_output: bool,
    pub default_value: f64,
    pub tile_size: u64,
}

impl Default for LiftoverOptions {
    fn default() -> Self {
        Self {
            traverse_dupes: true,
            unique: false,
            preload_output: false,
            default_value: DEFAULT_VALUE,
            tile_size: DEFAULT_TILE_SIZE,
        }
    }
}

/// Source record, sequence-local and 0-based half-open
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalRecord {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub value: f64,
    /// 1-based input line, for error reports
    pub line: usize,
}

/// Conversion statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionStats {
    pub total: usize,
    pub mapped: usize,
    pub unmapped: usize,
    /// Dropped under `unique`
    pub ambiguous: usize,
    pub fragments: usize,
    pub tiles: usize,
}

/// Converted track on one target genome
#[derive(Debug, Clone)]
pub struct LiftedTrack {
    pub genome: String,
    pub tiles: Vec<Tile>,
}

/// Piece of a mapped segment inside one target sequence
#[derive(Debug, Clone, Copy)]
struct Fragment {
    target: usize,
    sequence: usize,
    start: u64,
    end: u64,
}

/// Liftover engine over an alignment and a segment mapper
pub struct WiggleLiftover<'a, M: SegmentMapper> {
    alignment: &'a Alignment,
    mapper: &'a M,
    options: LiftoverOptions,
}

impl<'a, M: SegmentMapper> WiggleLiftover<'a, M> {
    pub fn new(alignment: &'a Alignment, mapper: &'a M, options: LiftoverOptions) -> Self {
        Self {
            alignment,
            mapper,
            options,
        }
    }

    pub fn options(&self) -> &LiftoverOptions {
        &self.options
    }

    fn genome(&self, name: &str) -> LiftoverResult<&'a Genome> {
        self.alignment
            .genome(name)
            .ok_or_else(|| LiftoverError::UnknownGenome(name.to_string()))
    }

    /// Lift every record from `source` onto each genome in `targets`
    pub fn convert<I>(
        &self,
        source: &str,
        targets: &[&str],
        records: I,
    ) -> LiftoverResult<(Vec<LiftedTrack>, ConversionStats)>
    where
        I: IntoIterator<Item = LiftoverResult<IntervalRecord>>,
    {
        let source = self.genome(source)?;
        let targets = targets
            .iter()
            .map(|name| self.genome(name))
            .collect::<LiftoverResult<Vec<_>>>()?;

        info!(
            "Lifting {} onto {} genome(s), traverse_dupes={} unique={}",
            source.name(),
            targets.len(),
            self.options.traverse_dupes,
            self.options.unique
        );

        let mut tracks: Vec<TileTrack<'a>> = targets
            .iter()
            .map(|&genome| {
                let mut track = TileTrack::new(genome, self.options.tile_size, self.options.default_value);
                if self.options.preload_output {
                    track.preload();
                }
                track
            })
            .collect();

        let mut stats = ConversionStats::default();
        let mut previous: Option<(String, u64)> = None;
        let mut fragments = Vec::new();

        for record in records {
            let record = record?;
            let (start, end) = self.validate(source, &record, &mut previous)?;
            stats.total += 1;

            let segments = self
                .mapper
                .map_segments(source, start, end, &targets, self.options.traverse_dupes)?;

            if segments.is_empty() {
                stats.unmapped += 1;
                trace!("{}:{}-{} does not map", record.chrom, record.start, record.end);
                continue;
            }
            if self.options.unique && is_ambiguous(&segments) {
                stats.ambiguous += 1;
                trace!("{}:{}-{} maps more than once", record.chrom, record.start, record.end);
                continue;
            }
            stats.mapped += 1;

            fragments.clear();
            for segment in &segments {
                let Some(target) = targets.iter().position(|g| g.name() == segment.target_genome) else {
                    continue;
                };
                split_fragments(targets[target], target, segment, &mut fragments);
            }
            fragments.sort_by_key(|f| (f.target, f.sequence, f.start));
            stats.fragments += fragments.len();

            for fragment in &fragments {
                tracks[fragment.target].set_range(fragment.start, fragment.end, record.value);
            }
        }

        let lifted: Vec<LiftedTrack> = tracks
            .iter()
            .map(|track| {
                let tiles = track.tiles();
                debug!(
                    "{}: {} tiles from {} allocated blocks of {} bases",
                    track.genome().name(),
                    tiles.len(),
                    track.allocated_tiles(),
                    track.tile_size()
                );
                LiftedTrack {
                    genome: track.genome().name().to_string(),
                    tiles,
                }
            })
            .collect();
        stats.tiles = lifted.iter().map(|t| t.tiles.len()).sum();

        info!(
            "Lifted {} of {} records ({} unmapped, {} ambiguous)",
            stats.mapped, stats.total, stats.unmapped, stats.ambiguous
        );
        Ok((lifted, stats))
    }

    /// Check a record and return its global source range
    fn validate(
        &self,
        source: &Genome,
        record: &IntervalRecord,
        previous: &mut Option<(String, u64)>,
    ) -> LiftoverResult<(u64, u64)> {
        let malformed = |message: String| LiftoverError::MalformedInput {
            line: record.line,
            message,
        };

        if !record.value.is_finite() {
            return Err(malformed(format!("value {} is not finite", record.value)));
        }
        if record.start >= record.end {
            return Err(malformed(format!(
                "start ({}) >= end ({})",
                record.start, record.end
            )));
        }

        let seq = resolve_sequence(source, &record.chrom).ok_or_else(|| {
            LiftoverError::UnknownSequence {
                genome: source.name().to_string(),
                sequence: record.chrom.clone(),
            }
        })?;
        if record.end > seq.length() {
            return Err(malformed(format!(
                "end ({}) beyond {} length {}",
                record.end,
                seq.name(),
                seq.length()
            )));
        }

        if let Some((chrom, last_start)) = previous.as_ref() {
            if *chrom == record.chrom && record.start < *last_start {
                return Err(malformed(format!(
                    "start ({}) precedes previous start ({}) on {}",
                    record.start, last_start, record.chrom
                )));
            }
        }
        *previous = Some((record.chrom.clone(), record.start));

        Ok((seq.start() + record.start, seq.start() + record.end))
    }
}

/// Some source base maps more than once onto the same target genome
fn is_ambiguous(segments: &[MappedSegment]) -> bool {
    let mut spans: Vec<(&str, u64, u64)> = segments
        .iter()
        .map(|s| (s.target_genome.as_str(), s.source_start, s.source_end))
        .collect();
    spans.sort_unstable();
    spans
        .windows(2)
        .any(|w| w[0].0 == w[1].0 && w[1].1 < w[0].2)
}

/// Cut a segment at target sequence boundaries
fn split_fragments(genome: &Genome, target: usize, segment: &MappedSegment, out: &mut Vec<Fragment>) {
    let end = segment.target_end.min(genome.total_length());
    let mut pos = segment.target_start;
    while pos < end {
        let Some(sequence) = genome.sequence_index_at(pos) else {
            break;
        };
        let stop = end.min(genome.sequences()[sequence].end());
        out.push(Fragment {
            target,
            sequence,
            start: pos,
            end: stop,
        });
        pos = stop;
    }
}
