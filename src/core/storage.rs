//! Buffered DNA storage
//!
//! A genome's bases are stored nibble-packed in an addressable byte range
//! (a [`PageSource`]). [`BufferedStorage`] keeps one page of that range
//! resident, refreshes it when an access falls outside the window, and
//! writes it back when it is dirty. Several storages may be opened over the
//! same genome; each keeps its own window and they do not coordinate, so
//! writers to overlapping pages must be serialized by the caller.

use crate::core::dna;
use crate::core::error::{DnaError, DnaResult};
use log::{error, trace};
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Default window size in bytes (two bases per byte)
pub const DEFAULT_PAGE_BYTES: usize = 8 * 1024;

/// Packed bytes shared between several in-memory storages
pub type SharedBytes = Arc<RwLock<Vec<u8>>>;

/// Number of bytes needed to pack `total_length` bases
#[inline]
pub fn packed_len(total_length: u64) -> u64 {
    total_length.div_ceil(2)
}

/// Base-level access to a genome's DNA
pub trait DnaStorage {
    /// Number of bases in the genome
    fn total_length(&self) -> u64;

    /// Size of the addressable packed byte range
    fn byte_len(&self) -> u64;

    /// Read the base at a global index
    fn get_base(&mut self, index: u64) -> DnaResult<u8>;

    /// Write the base at a global index
    fn set_base(&mut self, index: u64, base: u8) -> DnaResult<()>;

    /// Write back any pending changes
    fn flush(&mut self) -> DnaResult<()>;
}

impl<S: DnaStorage + ?Sized> DnaStorage for &mut S {
    fn total_length(&self) -> u64 {
        (**self).total_length()
    }

    fn byte_len(&self) -> u64 {
        (**self).byte_len()
    }

    fn get_base(&mut self, index: u64) -> DnaResult<u8> {
        (**self).get_base(index)
    }

    fn set_base(&mut self, index: u64, base: u8) -> DnaResult<()> {
        (**self).set_base(index, base)
    }

    fn flush(&mut self) -> DnaResult<()> {
        (**self).flush()
    }
}

impl<S: DnaStorage + ?Sized> DnaStorage for Box<S> {
    fn total_length(&self) -> u64 {
        (**self).total_length()
    }

    fn byte_len(&self) -> u64 {
        (**self).byte_len()
    }

    fn get_base(&mut self, index: u64) -> DnaResult<u8> {
        (**self).get_base(index)
    }

    fn set_base(&mut self, index: u64, base: u8) -> DnaResult<()> {
        (**self).set_base(index, base)
    }

    fn flush(&mut self) -> DnaResult<()> {
        (**self).flush()
    }
}

/// Addressable packed byte range backing a genome
pub trait PageSource {
    /// Total number of bytes
    fn byte_len(&self) -> u64;

    /// Fill `buf` with the bytes starting at `offset`
    fn read_page(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Store `buf` at `offset`
    fn write_page(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;
}

fn page_bounds(offset: u64, len: usize, byte_len: usize) -> io::Result<std::ops::Range<usize>> {
    let start = offset as usize;
    match start.checked_add(len) {
        Some(end) if end <= byte_len => Ok(start..end),
        _ => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("page [{}, +{}) past end of {} bytes", offset, len, byte_len),
        )),
    }
}

fn poisoned<T>(_: PoisonError<T>) -> io::Error {
    io::Error::new(io::ErrorKind::Other, "DNA buffer lock poisoned")
}

/// Packed bytes held in memory
#[derive(Debug, Clone)]
pub struct MemoryPages {
    bytes: SharedBytes,
}

impl MemoryPages {
    pub fn new(bytes: SharedBytes) -> Self {
        Self { bytes }
    }

    /// Zero-filled buffer (every base reads as `N`)
    pub fn with_len(byte_len: usize) -> Self {
        Self::new(Arc::new(RwLock::new(vec![0u8; byte_len])))
    }

    /// Handle to the shared bytes, for opening further storages
    pub fn shared(&self) -> SharedBytes {
        Arc::clone(&self.bytes)
    }
}

impl PageSource for MemoryPages {
    fn byte_len(&self) -> u64 {
        self.bytes.read().unwrap_or_else(PoisonError::into_inner).len() as u64
    }

    fn read_page(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let bytes = self.bytes.read().map_err(poisoned)?;
        let range = page_bounds(offset, buf.len(), bytes.len())?;
        buf.copy_from_slice(&bytes[range]);
        Ok(())
    }

    fn write_page(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        let mut bytes = self.bytes.write().map_err(poisoned)?;
        let range = page_bounds(offset, buf.len(), bytes.len())?;
        bytes[range].copy_from_slice(buf);
        Ok(())
    }
}

/// Packed bytes in a memory-mapped file
pub struct MappedPages {
    mmap: MmapMut,
}

impl MappedPages {
    /// Map an existing packed file for reading and writing
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        // SAFETY: the packed file is owned by this process for the lifetime of the map
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { mmap })
    }

    /// Create (or truncate) a zero-filled packed file of `byte_len` bytes and map it
    pub fn create<P: AsRef<Path>>(path: P, byte_len: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        file.set_len(byte_len)?;
        // SAFETY: the file was just created by us and is not shared
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { mmap })
    }
}

impl PageSource for MappedPages {
    fn byte_len(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_page(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let range = page_bounds(offset, buf.len(), self.mmap.len())?;
        buf.copy_from_slice(&self.mmap[range]);
        Ok(())
    }

    fn write_page(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        let range = page_bounds(offset, buf.len(), self.mmap.len())?;
        self.mmap[range.clone()].copy_from_slice(buf);
        self.mmap.flush_range(range.start, buf.len())
    }
}

/// Page source selected by where a genome keeps its DNA
pub enum DnaPages {
    Memory(MemoryPages),
    Mapped(MappedPages),
}

impl PageSource for DnaPages {
    fn byte_len(&self) -> u64 {
        match self {
            DnaPages::Memory(pages) => pages.byte_len(),
            DnaPages::Mapped(pages) => pages.byte_len(),
        }
    }

    fn read_page(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        match self {
            DnaPages::Memory(pages) => pages.read_page(offset, buf),
            DnaPages::Mapped(pages) => pages.read_page(offset, buf),
        }
    }

    fn write_page(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        match self {
            DnaPages::Memory(pages) => pages.write_page(offset, buf),
            DnaPages::Mapped(pages) => pages.write_page(offset, buf),
        }
    }
}

/// Windowed cache over a [`PageSource`]
///
/// Invariants: the resident window `[start_index, end_index)` is in base
/// units, `start_index` is even, and `dirty` is set iff a base was written
/// since the window was last stored. A dirty window is stored exactly once
/// before it is replaced, on [`flush`](DnaStorage::flush), on
/// [`close`](BufferedStorage::close), or when the storage is dropped.
pub struct BufferedStorage<P: PageSource> {
    pages: P,
    total_length: u64,
    page_bytes: usize,
    start_index: u64,
    end_index: u64,
    buffer: Vec<u8>,
    dirty: bool,
}

impl<P: PageSource> BufferedStorage<P> {
    pub fn new(pages: P, total_length: u64) -> DnaResult<Self> {
        Self::with_page_bytes(pages, total_length, DEFAULT_PAGE_BYTES)
    }

    pub fn with_page_bytes(pages: P, total_length: u64, page_bytes: usize) -> DnaResult<Self> {
        if page_bytes == 0 {
            return Err(DnaError::InvalidArgument("page size must be positive".to_string()));
        }
        let needed = packed_len(total_length);
        if pages.byte_len() < needed {
            return Err(DnaError::InvalidArgument(format!(
                "backing store holds {} bytes, {} bases need {}",
                pages.byte_len(),
                total_length,
                needed
            )));
        }
        Ok(Self {
            pages,
            total_length,
            page_bytes,
            start_index: 0,
            end_index: 0,
            buffer: Vec::with_capacity(page_bytes),
            dirty: false,
        })
    }

    /// Resident window in base units
    pub fn window(&self) -> (u64, u64) {
        (self.start_index, self.end_index)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn page_bytes(&self) -> usize {
        self.page_bytes
    }

    /// Flush and release, reporting a failed write-back
    pub fn close(mut self) -> DnaResult<()> {
        self.flush()
    }

    /// Refresh the window if needed and return the window-relative index
    #[inline]
    fn access(&mut self, index: u64) -> DnaResult<usize> {
        if index >= self.total_length {
            return Err(DnaError::OutOfRange {
                index: index as i64,
                length: self.total_length,
            });
        }
        if index < self.start_index || index >= self.end_index {
            self.fetch(index)?;
        }
        Ok((index - self.start_index) as usize)
    }

    fn fetch(&mut self, index: u64) -> DnaResult<()> {
        self.flush()?;

        let page_bytes = self.page_bytes as u64;
        let page_start = (index / 2) / page_bytes * page_bytes;
        let len = page_bytes.min(self.pages.byte_len() - page_start) as usize;

        self.start_index = 0;
        self.end_index = 0;
        self.buffer.resize(len, 0);
        self.pages.read_page(page_start, &mut self.buffer)?;

        self.start_index = page_start * 2;
        self.end_index = (self.start_index + len as u64 * 2).min(self.total_length);
        trace!(
            "DNA window refreshed to [{}, {}) for index {}",
            self.start_index,
            self.end_index,
            index
        );
        Ok(())
    }
}

impl<P: PageSource> DnaStorage for BufferedStorage<P> {
    fn total_length(&self) -> u64 {
        self.total_length
    }

    fn byte_len(&self) -> u64 {
        self.pages.byte_len()
    }

    #[inline]
    fn get_base(&mut self, index: u64) -> DnaResult<u8> {
        let rel = self.access(index)?;
        Ok(dna::unpack(rel as u64, self.buffer[rel / 2]))
    }

    #[inline]
    fn set_base(&mut self, index: u64, base: u8) -> DnaResult<()> {
        if !dna::is_nucleotide(base) {
            return Err(DnaError::InvalidCharacter(base as char));
        }
        let rel = self.access(index)?;
        self.buffer[rel / 2] = dna::pack(base, rel as u64, self.buffer[rel / 2]);
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> DnaResult<()> {
        if self.dirty {
            self.pages.write_page(self.start_index / 2, &self.buffer)?;
            self.dirty = false;
            trace!("DNA window [{}, {}) written back", self.start_index, self.end_index);
        }
        Ok(())
    }
}

impl<P: PageSource> Drop for BufferedStorage<P> {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.flush() {
                error!(
                    "Failed to write back DNA window [{}, {}): {}",
                    self.start_index, self.end_index, e
                );
            }
        }
    }
}
