//! Genome catalog
//!
//! A [`Genome`] is an ordered list of named [`Sequence`]s laid end to end on
//! one global coordinate line. An [`Alignment`] is the set of genomes a
//! segment mapper can project between.
//!
//! Packed genomes on disk are a pair of files sharing a prefix:
//! `<prefix>.dna` holds the nibble-packed bases and `<prefix>.seqs` lists
//! `name<TAB>length` per sequence, in order.

use crate::core::chain::ChainFile;
use crate::core::error::{DnaError, DnaResult};
use crate::core::io::LineIterator;
use crate::core::iterator::DnaIterator;
use crate::core::storage::{
    packed_len, BufferedStorage, DnaPages, MappedPages, MemoryPages, SharedBytes,
    DEFAULT_PAGE_BYTES,
};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// A named contiguous range `[start, start + length)` of a genome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    name: String,
    start: u64,
    length: u64,
}

impl Sequence {
    pub fn new(name: impl Into<String>, start: u64, length: u64) -> Self {
        Self {
            name: name.into(),
            start,
            length,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global index of the first base
    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// Global index one past the last base
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    pub fn contains(&self, global: u64) -> bool {
        global >= self.start && global < self.end()
    }
}

/// Where a genome keeps its packed bases
#[derive(Debug, Clone)]
pub enum DnaHandle {
    Memory(SharedBytes),
    File(PathBuf),
}

/// One assembly's sequence catalog and DNA
#[derive(Debug, Clone)]
pub struct Genome {
    name: String,
    sequences: Vec<Sequence>,
    by_name: HashMap<String, usize>,
    total_length: u64,
    dna: Option<DnaHandle>,
}

impl Genome {
    /// Build a catalog from `(name, length)` pairs in genome order
    pub fn new<I, S>(name: impl Into<String>, sequences: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut catalog = Vec::new();
        let mut by_name = HashMap::new();
        let mut offset = 0u64;
        for (seq_name, length) in sequences {
            let seq = Sequence::new(seq_name, offset, length);
            by_name.insert(seq.name.clone(), catalog.len());
            offset += length;
            catalog.push(seq);
        }
        Self {
            name: name.into(),
            sequences: catalog,
            by_name,
            total_length: offset,
            dna: None,
        }
    }

    pub fn with_dna(mut self, dna: DnaHandle) -> Self {
        self.dna = Some(dna);
        self
    }

    /// Attach a zero-filled in-memory DNA buffer (all bases `N`)
    pub fn with_memory_dna(self) -> Self {
        let bytes = vec![0u8; packed_len(self.total_length) as usize];
        self.with_dna(DnaHandle::Memory(Arc::new(RwLock::new(bytes))))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn dna_handle(&self) -> Option<&DnaHandle> {
        self.dna.as_ref()
    }

    pub fn sequence(&self, name: &str) -> Option<&Sequence> {
        self.sequence_index(name).map(|i| &self.sequences[i])
    }

    pub fn sequence_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Sequence containing a global base index
    pub fn sequence_at(&self, global: u64) -> Option<&Sequence> {
        self.sequence_index_at(global).map(|i| &self.sequences[i])
    }

    pub fn sequence_index_at(&self, global: u64) -> Option<usize> {
        if global >= self.total_length {
            return None;
        }
        // Zero-length sequences share a start with their successor; skip them
        let idx = self.sequences.partition_point(|s| s.end() <= global);
        self.sequences.get(idx).filter(|s| s.contains(global)).map(|_| idx)
    }

    /// Open an independent storage over this genome's DNA
    pub fn storage(&self, page_bytes: usize) -> DnaResult<BufferedStorage<DnaPages>> {
        let pages = match &self.dna {
            Some(DnaHandle::Memory(bytes)) => DnaPages::Memory(MemoryPages::new(Arc::clone(bytes))),
            Some(DnaHandle::File(path)) => DnaPages::Mapped(MappedPages::open(path)?),
            None => {
                return Err(DnaError::InvalidArgument(format!(
                    "genome {} has no DNA attached",
                    self.name
                )))
            }
        };
        BufferedStorage::with_page_bytes(pages, self.total_length, page_bytes)
    }

    /// DNA iterator positioned at a global index, over a fresh storage
    pub fn dna_iterator(&self, index: i64) -> DnaResult<DnaIterator<'_, BufferedStorage<DnaPages>>> {
        Ok(DnaIterator::new(self, self.storage(DEFAULT_PAGE_BYTES)?, index))
    }

    /// Read `length` forward-strand bases starting at a global index
    pub fn read_string(&self, start: u64, length: u64) -> DnaResult<String> {
        let mut iter = self.dna_iterator(start as i64)?;
        iter.read_string(length)
    }

    /// Create a zero-filled packed genome on disk
    pub fn create_packed<I, S>(prefix: &Path, name: impl Into<String>, sequences: I) -> DnaResult<Self>
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let (dna_path, seqs_path) = packed_paths(prefix);
        let genome = Self::new(name, sequences);

        let mut writer = BufWriter::new(File::create(&seqs_path)?);
        for seq in &genome.sequences {
            writeln!(writer, "{}\t{}", seq.name, seq.length)?;
        }
        writer.flush()?;

        MappedPages::create(&dna_path, packed_len(genome.total_length))?;
        Ok(genome.with_dna(DnaHandle::File(dna_path)))
    }

    /// Re-open a packed genome written by [`Genome::create_packed`]
    pub fn open_packed(prefix: &Path, name: impl Into<String>) -> DnaResult<Self> {
        let (dna_path, seqs_path) = packed_paths(prefix);
        let mut lines = LineIterator::new(BufReader::new(File::open(&seqs_path)?));
        let mut sequences = Vec::new();
        let mut line_number = 0usize;

        while let Some(line) = lines.next_line() {
            let line = line?;
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let (seq_name, length) = line
                .split_once('\t')
                .and_then(|(n, l)| l.trim().parse::<u64>().ok().map(|l| (n.to_string(), l)))
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{}:{}: expected name<TAB>length", seqs_path.display(), line_number),
                    )
                })?;
            sequences.push((seq_name, length));
        }

        let genome = Self::new(name, sequences);
        let byte_len = std::fs::metadata(&dna_path)?.len();
        if byte_len < packed_len(genome.total_length) {
            return Err(DnaError::InvalidArgument(format!(
                "{} holds {} bytes, catalog needs {}",
                dna_path.display(),
                byte_len,
                packed_len(genome.total_length)
            )));
        }
        Ok(genome.with_dna(DnaHandle::File(dna_path)))
    }
}

fn packed_paths(prefix: &Path) -> (PathBuf, PathBuf) {
    let base = prefix.display().to_string();
    (
        PathBuf::from(format!("{}.dna", base)),
        PathBuf::from(format!("{}.seqs", base)),
    )
}

/// Genomes connected by an alignment
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    genomes: Vec<Genome>,
    by_name: HashMap<String, usize>,
}

impl Alignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a genome, replacing any genome with the same name
    pub fn add_genome(&mut self, genome: Genome) {
        match self.by_name.get(genome.name()) {
            Some(&idx) => self.genomes[idx] = genome,
            None => {
                self.by_name.insert(genome.name().to_string(), self.genomes.len());
                self.genomes.push(genome);
            }
        }
    }

    pub fn genome(&self, name: &str) -> Option<&Genome> {
        self.by_name.get(name).map(|&i| &self.genomes[i])
    }

    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    /// Source and target genome catalogs described by a chain file
    ///
    /// Sequences are ordered by name.
    pub fn from_chain(chain: &ChainFile, source_name: &str, target_name: &str) -> Self {
        let mut alignment = Self::new();
        alignment.add_genome(Genome::new(source_name, sorted_sizes(&chain.source_chrom_sizes)));
        alignment.add_genome(Genome::new(target_name, sorted_sizes(&chain.target_chrom_sizes)));
        alignment
    }
}

fn sorted_sizes(sizes: &HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut sorted: Vec<(String, u64)> = sizes.iter().map(|(k, v)| (k.clone(), *v)).collect();
    sorted.sort();
    sorted
}
