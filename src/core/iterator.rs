//! Reversible DNA cursor
//!
//! One cursor type covers both strands: `reversed` flips the meaning of
//! left and right and complements bases on the way in and out, so the
//! stored bytes always hold the forward strand.

use crate::core::dna::{is_nucleotide, reverse_complement};
use crate::core::error::{DnaError, DnaResult};
use crate::core::genome::{Genome, Sequence};
use crate::core::storage::DnaStorage;

/// Cursor over a genome's bases
pub struct DnaIterator<'g, S: DnaStorage> {
    genome: &'g Genome,
    storage: S,
    index: i64,
    reversed: bool,
}

impl<'g, S: DnaStorage> DnaIterator<'g, S> {
    /// Forward-strand cursor at `index`; the index is not validated until use
    pub fn new(genome: &'g Genome, storage: S, index: i64) -> Self {
        Self {
            genome,
            storage,
            index,
            reversed: false,
        }
    }

    pub fn genome(&self) -> &'g Genome {
        self.genome
    }

    /// Global index of the current position
    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn reversed(&self) -> bool {
        self.reversed
    }

    pub fn set_reversed(&mut self, reversed: bool) {
        self.reversed = reversed;
    }

    /// Sequence holding the current position, if any
    pub fn sequence(&self) -> Option<&'g Sequence> {
        u64::try_from(self.index)
            .ok()
            .and_then(|i| self.genome.sequence_at(i))
    }

    /// Step towards the start of the current strand
    pub fn to_left(&mut self) {
        if self.reversed {
            self.index += 1;
        } else {
            self.index -= 1;
        }
    }

    /// Step towards the end of the current strand
    pub fn to_right(&mut self) {
        if self.reversed {
            self.index -= 1;
        } else {
            self.index += 1;
        }
    }

    /// Switch strands in place
    pub fn to_reverse(&mut self) {
        self.reversed = !self.reversed;
    }

    pub fn jump_to(&mut self, index: i64) {
        self.index = index;
    }

    pub fn in_range(&self) -> bool {
        self.index >= 0
            && (self.index as u64) < self.storage.total_length()
            && ((self.index / 2) as u64) < self.storage.byte_len()
    }

    fn checked_index(&self) -> DnaResult<u64> {
        if self.in_range() {
            Ok(self.index as u64)
        } else {
            Err(DnaError::OutOfRange {
                index: self.index,
                length: self.storage.total_length(),
            })
        }
    }

    /// Base at the current position, as seen from the current strand
    pub fn get_char(&mut self) -> DnaResult<u8> {
        let index = self.checked_index()?;
        let base = self.storage.get_base(index)?;
        Ok(if self.reversed {
            reverse_complement(base)
        } else {
            base
        })
    }

    /// Store a base at the current position, as seen from the current strand
    pub fn set_char(&mut self, base: u8) -> DnaResult<()> {
        let index = self.checked_index()?;
        if !is_nucleotide(base) {
            return Err(DnaError::InvalidCharacter(base as char));
        }
        let base = if self.reversed {
            reverse_complement(base)
        } else {
            base
        };
        self.storage.set_base(index, base)
    }

    /// Read `length` bases moving right; the cursor ends past the last one read
    pub fn read_string(&mut self, length: u64) -> DnaResult<String> {
        let mut out = String::with_capacity(length as usize);
        for _ in 0..length {
            out.push(self.get_char()? as char);
            self.to_right();
        }
        Ok(out)
    }

    /// Write the first `length` bases of `text` moving right
    pub fn write_string(&mut self, text: &str, length: u64) -> DnaResult<()> {
        if length == 0 {
            return Ok(());
        }
        let bytes = text.as_bytes();
        if (bytes.len() as u64) < length {
            return Err(DnaError::InvalidArgument(format!(
                "write of {} bases from a string of {}",
                length,
                bytes.len()
            )));
        }
        for &base in &bytes[..length as usize] {
            self.set_char(base)?;
            self.to_right();
        }
        Ok(())
    }

    /// Same position on the same genome
    ///
    /// # Panics
    /// If the iterators are bound to different genomes.
    pub fn equals<T: DnaStorage>(&self, other: &DnaIterator<'_, T>) -> bool {
        assert!(
            std::ptr::eq(self.genome, other.genome),
            "comparing DNA iterators of different genomes"
        );
        self.index == other.index
    }

    /// Strictly left of `other` in forward coordinates
    ///
    /// # Panics
    /// If the iterators are bound to different genomes.
    pub fn left_of<T: DnaStorage>(&self, other: &DnaIterator<'_, T>) -> bool {
        assert!(
            std::ptr::eq(self.genome, other.genome),
            "comparing DNA iterators of different genomes"
        );
        self.index < other.index
    }

    pub fn flush(&mut self) -> DnaResult<()> {
        self.storage.flush()
    }

    /// Give back the storage, e.g. to close it explicitly
    pub fn into_storage(self) -> S {
        self.storage
    }
}
