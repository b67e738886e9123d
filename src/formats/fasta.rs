//! FASTA input and output
//!
//! Used to build packed genomes (`pack`) and to print sequence ranges read
//! back through a DNA iterator (`extract`).

use crate::core::dna::is_nucleotide;
use crate::core::error::{DnaError, DnaResult};
use crate::core::genome::Genome;
use crate::core::io::{ByteLineIterator, InputReader};
use log::{debug, info, warn};
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Default residues per output line
pub const DEFAULT_LINE_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// Header text up to the first whitespace
    pub name: String,
    pub sequence: Vec<u8>,
}

/// Streaming FASTA reader
pub struct FastaReader<R: BufRead> {
    lines: ByteLineIterator<R>,
    line_number: usize,
    pending: Option<String>,
    done: bool,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: ByteLineIterator::new(reader),
            line_number: 0,
            pending: None,
            done: false,
        }
    }
}

fn header_name(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(&line[1..]);
    text.split_whitespace().next().unwrap_or("").to_string()
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = io::Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut sequence = Vec::new();
        loop {
            let line = match self.lines.next_line() {
                None => {
                    self.done = true;
                    return self.pending.take().map(|name| Ok(FastaRecord { name, sequence }));
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(line)) => line,
            };
            self.line_number += 1;

            if line.first() == Some(&b'>') {
                let name = header_name(line);
                match self.pending.replace(name) {
                    Some(previous) => {
                        return Some(Ok(FastaRecord {
                            name: previous,
                            sequence,
                        }))
                    }
                    None => continue,
                }
            }
            if line.first() == Some(&b';') || line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            if self.pending.is_none() {
                self.done = true;
                return Some(Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("line {}: sequence data before first header", self.line_number),
                )));
            }
            sequence.extend(line.iter().copied().filter(|b| !b.is_ascii_whitespace()));
        }
    }
}

/// Summary of a `pack` run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackStats {
    pub sequences: usize,
    pub bases: u64,
    /// Non-nucleotide symbols stored as `N`
    pub replaced: u64,
}

/// Sequence names and lengths, in file order
pub fn scan_lengths<R: BufRead>(reader: R) -> io::Result<Vec<(String, u64)>> {
    FastaReader::new(reader)
        .map(|record| record.map(|r| (r.name, r.sequence.len() as u64)))
        .collect()
}

/// Build a packed genome at `prefix` from a FASTA file
///
/// The file is read twice: once for the catalog, once to write bases.
pub fn pack_fasta(fasta: &Path, prefix: &Path, name: &str) -> DnaResult<(Genome, PackStats)> {
    let lengths = scan_lengths(InputReader::open(fasta)?)?;
    let genome = Genome::create_packed(prefix, name, lengths)?;
    info!(
        "Packing {} sequences ({} bases) into {}",
        genome.sequences().len(),
        genome.total_length(),
        prefix.display()
    );

    let mut stats = PackStats::default();
    let mut iter = genome.dna_iterator(0)?;
    for (record, seq) in FastaReader::new(InputReader::open(fasta)?).zip(genome.sequences()) {
        let record = record?;
        iter.jump_to(seq.start() as i64);
        let mut replaced = 0u64;
        for &base in &record.sequence {
            let base = if is_nucleotide(base) {
                base
            } else {
                replaced += 1;
                b'N'
            };
            iter.set_char(base)?;
            iter.to_right();
        }
        if replaced > 0 {
            warn!("{}: {} non-nucleotide symbols stored as N", record.name, replaced);
        }
        debug!("{}: {} bases", record.name, record.sequence.len());
        stats.sequences += 1;
        stats.bases += record.sequence.len() as u64;
        stats.replaced += replaced;
    }
    iter.into_storage().close()?;
    Ok((genome, stats))
}

/// Parse `chrom:start-end` (1-based, inclusive) into a 0-based half-open range
///
/// A bare `chrom` selects the whole sequence and returns `None` bounds.
pub fn parse_region(region: &str) -> DnaResult<(String, Option<(u64, u64)>)> {
    let invalid = || DnaError::InvalidArgument(format!("invalid region {:?}", region));
    let Some((chrom, range)) = region.rsplit_once(':') else {
        return Ok((region.to_string(), None));
    };
    let (start, end) = range.split_once('-').ok_or_else(invalid)?;
    let start: u64 = start.replace(',', "").parse().map_err(|_| invalid())?;
    let end: u64 = end.replace(',', "").parse().map_err(|_| invalid())?;
    if start == 0 || end < start {
        return Err(invalid());
    }
    Ok((chrom.to_string(), Some((start - 1, end))))
}

/// Bases of `[start, end)` on `chrom`, reverse-complemented if `reverse`
pub fn extract_region(genome: &Genome, chrom: &str, start: u64, end: u64, reverse: bool) -> DnaResult<String> {
    let seq = genome
        .sequence(chrom)
        .ok_or_else(|| DnaError::InvalidArgument(format!("genome {} has no sequence {}", genome.name(), chrom)))?;
    if start >= end || end > seq.length() {
        return Err(DnaError::OutOfRange {
            index: end as i64,
            length: seq.length(),
        });
    }

    if reverse {
        let mut iter = genome.dna_iterator((seq.start() + end - 1) as i64)?;
        iter.set_reversed(true);
        iter.read_string(end - start)
    } else {
        let mut iter = genome.dna_iterator((seq.start() + start) as i64)?;
        iter.read_string(end - start)
    }
}

/// Write one record, wrapping residues at `line_width` (0 disables wrapping)
pub fn write_record<W: Write>(writer: &mut W, header: &str, sequence: &[u8], line_width: usize) -> io::Result<()> {
    writeln!(writer, ">{}", header)?;
    if line_width == 0 {
        writer.write_all(sequence)?;
        return writeln!(writer);
    }
    for chunk in sequence.chunks(line_width) {
        writer.write_all(chunk)?;
        writeln!(writer)?;
    }
    Ok(())
}
