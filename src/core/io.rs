//! I/O helpers
//!
//! Compression-aware buffered input, allocation-reusing line iterators,
//! and a two-phase writer that only exposes output once it is complete.

use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use log::warn;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Default buffer size for readers and writers (128KB)
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Suffix of an output file while it is being written
pub const PARTIAL_SUFFIX: &str = "partial";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Plain,
    Gzip,
    Bzip2,
}

/// Detect compression by extension, then by magic bytes
pub fn detect_compression(path: &Path) -> io::Result<CompressionFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("gz") | Some("bgz") => return Ok(CompressionFormat::Gzip),
        Some("bz2") => return Ok(CompressionFormat::Bzip2),
        _ => {}
    }

    let mut magic = [0u8; 3];
    let mut file = File::open(path)?;
    let mut read = 0;
    while read < magic.len() {
        match file.read(&mut magic[read..])? {
            0 => break,
            n => read += n,
        }
    }

    Ok(match &magic[..read] {
        [0x1f, 0x8b, ..] => CompressionFormat::Gzip,
        [b'B', b'Z', b'h'] => CompressionFormat::Bzip2,
        _ => CompressionFormat::Plain,
    })
}

/// Buffered reader over a plain, gzip or bzip2 file
pub enum InputReader {
    Plain(BufReader<File>),
    Gzip(BufReader<MultiGzDecoder<File>>),
    Bzip2(BufReader<BzDecoder<File>>),
}

impl InputReader {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::open_with_capacity(path, DEFAULT_BUFFER_SIZE)
    }

    pub fn open_with_capacity<P: AsRef<Path>>(path: P, capacity: usize) -> io::Result<Self> {
        let path = path.as_ref();
        let format = detect_compression(path)?;
        let file = File::open(path)?;
        Ok(match format {
            CompressionFormat::Plain => InputReader::Plain(BufReader::with_capacity(capacity, file)),
            CompressionFormat::Gzip => {
                InputReader::Gzip(BufReader::with_capacity(capacity, MultiGzDecoder::new(file)))
            }
            CompressionFormat::Bzip2 => {
                InputReader::Bzip2(BufReader::with_capacity(capacity, BzDecoder::new(file)))
            }
        })
    }

    pub fn format(&self) -> CompressionFormat {
        match self {
            InputReader::Plain(_) => CompressionFormat::Plain,
            InputReader::Gzip(_) => CompressionFormat::Gzip,
            InputReader::Bzip2(_) => CompressionFormat::Bzip2,
        }
    }
}

impl Read for InputReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            InputReader::Plain(r) => r.read(buf),
            InputReader::Gzip(r) => r.read(buf),
            InputReader::Bzip2(r) => r.read(buf),
        }
    }
}

impl BufRead for InputReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            InputReader::Plain(r) => r.fill_buf(),
            InputReader::Gzip(r) => r.fill_buf(),
            InputReader::Bzip2(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            InputReader::Plain(r) => r.consume(amt),
            InputReader::Gzip(r) => r.consume(amt),
            InputReader::Bzip2(r) => r.consume(amt),
        }
    }
}

/// Line iterator that reuses a buffer to avoid allocations
pub struct LineIterator<R: BufRead> {
    reader: R,
    buffer: String,
}

impl<R: BufRead> LineIterator<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: String::with_capacity(1024),
        }
    }

    /// Next line without its terminator; `None` at EOF
    pub fn next_line(&mut self) -> Option<io::Result<&str>> {
        self.buffer.clear();
        match self.reader.read_line(&mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                if self.buffer.ends_with('\n') {
                    self.buffer.pop();
                    if self.buffer.ends_with('\r') {
                        self.buffer.pop();
                    }
                }
                Some(Ok(&self.buffer))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Byte line iterator for input that need not be UTF-8
pub struct ByteLineIterator<R: BufRead> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: BufRead> ByteLineIterator<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(4096),
        }
    }

    pub fn next_line(&mut self) -> Option<io::Result<&[u8]>> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                if self.buffer.last() == Some(&b'\n') {
                    self.buffer.pop();
                    if self.buffer.last() == Some(&b'\r') {
                        self.buffer.pop();
                    }
                }
                Some(Ok(&self.buffer))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Writes to `<path>.partial` and renames onto `path` on [`commit`](Self::commit)
///
/// Dropping an uncommitted writer removes the partial file, so readers of
/// `path` never observe incomplete output.
pub struct AtomicWriter {
    path: PathBuf,
    partial: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl AtomicWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut partial = path.clone().into_os_string();
        partial.push(".");
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);
        let file = File::create(&partial)?;
        Ok(Self {
            path,
            partial,
            writer: Some(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commit(mut self) -> io::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        std::fs::rename(&self.partial, &self.path)
    }

    fn inner(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "writer already committed"))
    }
}

impl Write for AtomicWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner()?.flush()
    }
}

impl Drop for AtomicWriter {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            if let Err(e) = std::fs::remove_file(&self.partial) {
                warn!("Failed to remove {}: {}", self.partial.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_line_iterator() -> io::Result<()> {
        let mut iter = LineIterator::new(BufReader::new(&b"line1\r\nline2\nline3"[..]));
        assert_eq!(iter.next_line().unwrap()?, "line1");
        assert_eq!(iter.next_line().unwrap()?, "line2");
        assert_eq!(iter.next_line().unwrap()?, "line3");
        assert!(iter.next_line().is_none());
        Ok(())
    }

    #[test]
    fn test_byte_line_iterator() -> io::Result<()> {
        let mut temp = NamedTempFile::new()?;
        temp.write_all(b">seq\nACGT\n")?;
        temp.flush()?;

        let mut iter = ByteLineIterator::new(BufReader::new(File::open(temp.path())?));
        assert_eq!(iter.next_line().unwrap()?, b">seq");
        assert_eq!(iter.next_line().unwrap()?, b"ACGT");
        assert!(iter.next_line().is_none());
        Ok(())
    }

    #[test]
    fn test_detect_compression_by_magic() -> io::Result<()> {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = TempDir::new()?;
        let gz_path = dir.path().join("data");
        let mut encoder = GzEncoder::new(File::create(&gz_path)?, Compression::default());
        encoder.write_all(b"hello\n")?;
        encoder.finish()?;
        assert_eq!(detect_compression(&gz_path)?, CompressionFormat::Gzip);

        let plain = dir.path().join("plain.txt");
        std::fs::write(&plain, b"hi")?;
        assert_eq!(detect_compression(&plain)?, CompressionFormat::Plain);

        let mut reader = InputReader::open(&gz_path)?;
        assert_eq!(reader.format(), CompressionFormat::Gzip);
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        assert_eq!(text, "hello\n");
        Ok(())
    }

    #[test]
    fn test_atomic_writer_commit() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("out.bedGraph");
        let mut writer = AtomicWriter::create(&path)?;
        writeln!(writer, "chr1\t0\t10\t1")?;
        assert!(!path.exists());
        writer.commit()?;
        assert_eq!(std::fs::read_to_string(&path)?, "chr1\t0\t10\t1\n");
        assert!(!dir.path().join("out.bedGraph.partial").exists());
        Ok(())
    }

    #[test]
    fn test_atomic_writer_abandoned() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("out.wig");
        {
            let mut writer = AtomicWriter::create(&path)?;
            writeln!(writer, "partial")?;
            assert!(dir.path().join("out.wig.partial").exists());
        }
        assert!(!path.exists());
        assert!(!dir.path().join("out.wig.partial").exists());
        Ok(())
    }
}
