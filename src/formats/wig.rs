//! Wiggle / bedGraph / BigWig adapter
//!
//! Reads variableStep, fixedStep and bedGraph lines (mixed freely, as in
//! the wild) into [`IntervalRecord`]s, and writes lifted tiles as bedGraph
//! or fixedStep wiggle.

use crate::core::error::{FastHalError, LiftoverError};
use crate::core::genome::Alignment;
use crate::core::io::{AtomicWriter, InputReader, LineIterator, DEFAULT_BUFFER_SIZE};
use crate::core::liftover::{ConversionStats, IntervalRecord, LiftoverOptions, WiggleLiftover};
use crate::core::mapper::SegmentMapper;
use crate::core::tiles::Tile;
use memchr::memchr2;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WigParseError {
    #[error("line {line}: {message}")]
    InvalidFormat { line: usize, message: String },

    #[error("line {line}: invalid {field} {value:?}")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: data line before any declaration")]
    MissingDeclaration { line: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WigParseError {
    pub fn line(&self) -> Option<usize> {
        match self {
            WigParseError::InvalidFormat { line, .. }
            | WigParseError::InvalidNumber { line, .. }
            | WigParseError::MissingDeclaration { line } => Some(*line),
            WigParseError::Io(_) => None,
        }
    }
}

impl From<WigParseError> for LiftoverError {
    fn from(e: WigParseError) -> Self {
        match e.line() {
            Some(line) => LiftoverError::MalformedInput {
                line,
                message: e.to_string(),
            },
            None => match e {
                WigParseError::Io(io) => LiftoverError::Io(io),
                other => LiftoverError::MalformedInput {
                    line: 0,
                    message: other.to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WigFormat {
    VariableStep,
    FixedStep,
}

/// Output layout for lifted tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    BedGraph,
    Wiggle,
}

/// `variableStep` / `fixedStep` parameters, converted to 0-based
#[derive(Debug, Clone)]
pub struct WigDeclaration {
    pub format: WigFormat,
    pub chrom: String,
    pub span: u64,
    /// fixedStep only
    pub start: Option<u64>,
    pub step: Option<u64>,
}

impl WigDeclaration {
    pub fn parse(line: &str, line_number: usize) -> Result<Self, WigParseError> {
        let line = line.trim();
        let (format, rest) = if let Some(rest) = line.strip_prefix("variableStep") {
            (WigFormat::VariableStep, rest)
        } else if let Some(rest) = line.strip_prefix("fixedStep") {
            (WigFormat::FixedStep, rest)
        } else {
            return Err(WigParseError::InvalidFormat {
                line: line_number,
                message: "expected variableStep or fixedStep".to_string(),
            });
        };

        let number = |field: &'static str, value: &str| -> Result<u64, WigParseError> {
            match value.parse::<u64>() {
                Ok(v) if v > 0 => Ok(v),
                _ => Err(WigParseError::InvalidNumber {
                    line: line_number,
                    field,
                    value: value.to_string(),
                }),
            }
        };

        let mut chrom = None;
        let mut span = 1u64;
        let mut start = None;
        let mut step = None;
        for part in rest.split_whitespace() {
            if let Some((key, value)) = part.split_once('=') {
                match key {
                    "chrom" => chrom = Some(value.to_string()),
                    "span" => span = number("span", value)?,
                    // 1-based on the wire
                    "start" => start = Some(number("start", value)? - 1),
                    "step" => step = Some(number("step", value)?),
                    _ => {}
                }
            }
        }

        let chrom = chrom.ok_or_else(|| WigParseError::InvalidFormat {
            line: line_number,
            message: "missing chrom".to_string(),
        })?;
        if format == WigFormat::FixedStep && start.is_none() {
            return Err(WigParseError::InvalidFormat {
                line: line_number,
                message: "fixedStep without start".to_string(),
            });
        }

        Ok(Self {
            format,
            chrom,
            span,
            start,
            step,
        })
    }
}

/// Split on tabs or spaces, dropping empty fields
fn split_fields(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut fields = Vec::with_capacity(4);
    let mut pos = 0;
    while pos < bytes.len() {
        match memchr2(b'\t', b' ', &bytes[pos..]) {
            Some(0) => pos += 1,
            Some(offset) => {
                fields.push(&line[pos..pos + offset]);
                pos += offset + 1;
            }
            None => {
                fields.push(&line[pos..]);
                break;
            }
        }
    }
    fields
}

fn parse_number<T: std::str::FromStr>(
    value: &str,
    field: &'static str,
    line: usize,
) -> Result<T, WigParseError> {
    value.parse().map_err(|_| WigParseError::InvalidNumber {
        line,
        field,
        value: value.to_string(),
    })
}

fn record_end(start: u64, span: u64, line: usize) -> Result<u64, WigParseError> {
    start.checked_add(span).ok_or_else(|| WigParseError::InvalidFormat {
        line,
        message: format!("record at {} with span {} overflows", start, span),
    })
}

/// Streaming reader of wiggle and bedGraph records
pub struct WigReader<R: BufRead> {
    lines: LineIterator<R>,
    line_number: usize,
    current_decl: Option<WigDeclaration>,
    /// Next fixedStep position, 0-based
    current_pos: u64,
}

impl<R: BufRead> WigReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineIterator::new(reader),
            line_number: 0,
            current_decl: None,
            current_pos: 0,
        }
    }

    fn parse_line(&mut self, line: &str) -> Result<Option<IntervalRecord>, WigParseError> {
        let n = self.line_number;
        if line.is_empty() || line.starts_with('#') || line.starts_with("track") || line.starts_with("browser") {
            return Ok(None);
        }

        if line.starts_with("variableStep") || line.starts_with("fixedStep") {
            let decl = WigDeclaration::parse(line, n)?;
            if let Some(start) = decl.start {
                self.current_pos = start;
            }
            self.current_decl = Some(decl);
            return Ok(None);
        }

        let fields = split_fields(line);
        if fields.len() >= 4 {
            return Ok(Some(IntervalRecord {
                chrom: fields[0].to_string(),
                start: parse_number(fields[1], "start", n)?,
                end: parse_number(fields[2], "end", n)?,
                value: parse_number(fields[3], "value", n)?,
                line: n,
            }));
        }

        let decl = self
            .current_decl
            .as_ref()
            .ok_or(WigParseError::MissingDeclaration { line: n })?;

        match decl.format {
            WigFormat::VariableStep => {
                if fields.len() < 2 {
                    return Err(WigParseError::InvalidFormat {
                        line: n,
                        message: format!("expected position and value, got {:?}", line),
                    });
                }
                let pos: u64 = parse_number(fields[0], "position", n)?;
                if pos == 0 {
                    return Err(WigParseError::InvalidNumber {
                        line: n,
                        field: "position",
                        value: fields[0].to_string(),
                    });
                }
                Ok(Some(IntervalRecord {
                    chrom: decl.chrom.clone(),
                    start: pos - 1,
                    end: record_end(pos - 1, decl.span, n)?,
                    value: parse_number(fields[1], "value", n)?,
                    line: n,
                }))
            }
            WigFormat::FixedStep => {
                let value = parse_number(fields.first().copied().unwrap_or(""), "value", n)?;
                let start = self.current_pos;
                let end = record_end(start, decl.span, n)?;
                // A saturated position fails on the next record
                self.current_pos = start.saturating_add(decl.step.unwrap_or(decl.span));
                Ok(Some(IntervalRecord {
                    chrom: decl.chrom.clone(),
                    start,
                    end,
                    value,
                    line: n,
                }))
            }
        }
    }
}

impl<R: BufRead> Iterator for WigReader<R> {
    type Item = Result<IntervalRecord, WigParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next_line()? {
                Ok(line) => line.trim().to_string(),
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;
            match self.parse_line(&line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// `chrom<TAB>start<TAB>end<TAB>value`, 0-based half-open
pub fn write_bedgraph<W: Write>(writer: &mut W, tiles: &[Tile]) -> io::Result<()> {
    for tile in tiles {
        writeln!(writer, "{}\t{}\t{}\t{}", tile.sequence, tile.start, tile.end, tile.value)?;
    }
    Ok(())
}

/// One fixedStep block per tile
pub fn write_wiggle<W: Write>(writer: &mut W, tiles: &[Tile]) -> io::Result<()> {
    for tile in tiles {
        let len = tile.len();
        writeln!(
            writer,
            "fixedStep chrom={} start={} step={} span={}",
            tile.sequence,
            tile.start + 1,
            len,
            len
        )?;
        writeln!(writer, "{}", tile.value)?;
    }
    Ok(())
}

pub fn write_tiles<W: Write>(writer: &mut W, tiles: &[Tile], format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::BedGraph => write_bedgraph(writer, tiles),
        OutputFormat::Wiggle => write_wiggle(writer, tiles),
    }
}

fn is_bigwig(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()),
        Some(ref e) if e == "bw" || e == "bigwig"
    )
}

/// Lift a wiggle, bedGraph or BigWig file from `source` onto `target`
///
/// Output goes to `output` through a two-phase write, or to stdout.
#[allow(clippy::too_many_arguments)]
pub fn convert_wig<M: SegmentMapper>(
    input: &Path,
    output: Option<&Path>,
    alignment: &Alignment,
    mapper: &M,
    source: &str,
    target: &str,
    options: LiftoverOptions,
    format: OutputFormat,
) -> Result<ConversionStats, FastHalError> {
    let engine = WiggleLiftover::new(alignment, mapper, options);

    let (tracks, stats) = if is_bigwig(input) {
        let records = bigwig::read_bigwig_records(input)?;
        engine.convert(source, &[target], records.into_iter().map(Ok))?
    } else {
        let reader = WigReader::new(InputReader::open(input)?);
        engine.convert(source, &[target], reader.map(|r| r.map_err(LiftoverError::from)))?
    };

    let tiles: &[Tile] = tracks.first().map(|t| t.tiles.as_slice()).unwrap_or(&[]);
    match output {
        Some(path) => {
            let mut writer = AtomicWriter::create(path)?;
            write_tiles(&mut writer, tiles, format)?;
            writer.commit()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, stdout.lock());
            write_tiles(&mut writer, tiles, format)?;
            writer.flush()?;
        }
    }
    Ok(stats)
}

/// BigWig input
pub mod bigwig {
    use super::*;
    use bigtools::BigWigRead;

    fn io_error(e: impl std::fmt::Display) -> WigParseError {
        WigParseError::Io(io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }

    /// All intervals of a BigWig file; `line` holds the 1-based record ordinal
    pub fn read_bigwig_records<P: AsRef<Path>>(path: P) -> Result<Vec<IntervalRecord>, LiftoverError> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| io_error(format!("non-UTF-8 path {}", path.display())))?;
        let mut reader = BigWigRead::open_file(path_str).map_err(io_error)?;

        let mut chroms = reader.chroms().to_vec();
        chroms.sort_by(|a, b| a.name.cmp(&b.name));
        let mut records = Vec::new();

        for chrom in chroms {
            let intervals = reader
                .get_interval(&chrom.name, 0, chrom.length)
                .map_err(io_error)?;
            for interval in intervals {
                let interval = interval.map_err(io_error)?;
                records.push(IntervalRecord {
                    chrom: chrom.name.clone(),
                    start: interval.start as u64,
                    end: interval.end as u64,
                    value: interval.value as f64,
                    line: records.len() + 1,
                });
            }
        }
        Ok(records)
    }
}
