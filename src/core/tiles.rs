//! Tile aggregation
//!
//! A [`TileTrack`] holds one value per base of a target genome, allocated
//! lazily in fixed-size tiles. Writes are last-writer-wins. Reading the
//! track back yields maximal runs of equal values ([`Tile`]s), per sequence
//! in genome order and by increasing start within a sequence.

use crate::core::genome::{Genome, Sequence};
use std::collections::BTreeMap;

/// Default number of bases per allocated tile
pub const DEFAULT_TILE_SIZE: u64 = 10_000;

/// Values closer than this merge into one run
const VALUE_EPSILON: f64 = 1e-10;

/// Unwritten position marker; stored values are always finite
const UNSET: f64 = f64::NAN;

/// Maximal run of one value on a target sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub sequence: String,
    /// Sequence-local, 0-based
    pub start: u64,
    pub end: u64,
    pub value: f64,
}

impl Tile {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Per-base value store over one genome
pub struct TileTrack<'g> {
    genome: &'g Genome,
    tile_size: u64,
    default_value: f64,
    preloaded: bool,
    /// Global tile number -> values
    tiles: BTreeMap<u64, Box<[f64]>>,
}

impl<'g> TileTrack<'g> {
    /// `tile_size` is capped at the genome length
    pub fn new(genome: &'g Genome, tile_size: u64, default_value: f64) -> Self {
        Self {
            genome,
            tile_size: tile_size.min(genome.total_length()).max(1),
            default_value,
            preloaded: false,
            tiles: BTreeMap::new(),
        }
    }

    /// Report every unwritten base with the default value
    pub fn preload(&mut self) {
        self.preloaded = true;
    }

    pub fn genome(&self) -> &'g Genome {
        self.genome
    }

    pub fn tile_size(&self) -> u64 {
        self.tile_size
    }

    pub fn is_preloaded(&self) -> bool {
        self.preloaded
    }

    pub fn allocated_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Assign `value` to global positions `[start, end)`, clipped to the genome
    pub fn set_range(&mut self, start: u64, end: u64, value: f64) {
        let end = end.min(self.genome.total_length());
        let mut pos = start;
        while pos < end {
            let tile = pos / self.tile_size;
            let tile_start = tile * self.tile_size;
            let stop = end.min(tile_start + self.tile_size);
            let size = self.tile_size as usize;
            let values = self
                .tiles
                .entry(tile)
                .or_insert_with(|| vec![UNSET; size].into_boxed_slice());
            values[(pos - tile_start) as usize..(stop - tile_start) as usize].fill(value);
            pos = stop;
        }
    }

    /// Value at a global position, if written (or preloaded)
    pub fn value_at(&self, global: u64) -> Option<f64> {
        if global >= self.genome.total_length() {
            return None;
        }
        let stored = self
            .tiles
            .get(&(global / self.tile_size))
            .map(|values| values[(global % self.tile_size) as usize])
            .filter(|v| !v.is_nan());
        match stored {
            Some(v) => Some(v),
            None if self.preloaded => Some(self.default_value),
            None => None,
        }
    }

    /// Merged runs, per sequence in genome order
    pub fn tiles(&self) -> Vec<Tile> {
        let mut out = Vec::new();
        for seq in self.genome.sequences() {
            if seq.length() == 0 {
                continue;
            }
            let mut runs = RunBuilder::new(seq, &mut out);
            let first_tile = seq.start() / self.tile_size;
            let last_tile = (seq.end() - 1) / self.tile_size;

            if self.preloaded {
                for tile in first_tile..=last_tile {
                    let (lo, hi) = self.tile_span(tile, seq);
                    match self.tiles.get(&tile) {
                        Some(values) => self.emit_values(&mut runs, tile, values, lo, hi),
                        None => runs.push(lo, hi, self.default_value),
                    }
                }
            } else {
                for (&tile, values) in self.tiles.range(first_tile..=last_tile) {
                    let (lo, hi) = self.tile_span(tile, seq);
                    self.emit_values(&mut runs, tile, values, lo, hi);
                }
            }
        }
        out
    }

    /// Part of `tile` inside `seq`, in global coordinates
    fn tile_span(&self, tile: u64, seq: &Sequence) -> (u64, u64) {
        let tile_start = tile * self.tile_size;
        (
            tile_start.max(seq.start()),
            (tile_start + self.tile_size).min(seq.end()),
        )
    }

    fn emit_values(&self, runs: &mut RunBuilder<'_>, tile: u64, values: &[f64], lo: u64, hi: u64) {
        let tile_start = tile * self.tile_size;
        for pos in lo..hi {
            let v = values[(pos - tile_start) as usize];
            if !v.is_nan() {
                runs.push(pos, pos + 1, v);
            } else if self.preloaded {
                runs.push(pos, pos + 1, self.default_value);
            }
        }
    }
}

/// Appends global ranges of one sequence as merged local tiles
struct RunBuilder<'a> {
    seq: &'a Sequence,
    out: &'a mut Vec<Tile>,
    first: usize,
}

impl<'a> RunBuilder<'a> {
    fn new(seq: &'a Sequence, out: &'a mut Vec<Tile>) -> Self {
        let first = out.len();
        Self { seq, out, first }
    }

    fn push(&mut self, start: u64, end: u64, value: f64) {
        let start = start - self.seq.start();
        let end = end - self.seq.start();
        if self.out.len() > self.first {
            if let Some(last) = self.out.last_mut() {
                if last.end == start && (last.value - value).abs() < VALUE_EPSILON {
                    last.end = end;
                    return;
                }
            }
        }
        self.out.push(Tile {
            sequence: self.seq.name().to_string(),
            start,
            end,
            value,
        });
    }
}
