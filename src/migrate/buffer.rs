use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Take, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Default in-memory capacity of a [`StreamBuffer`].
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Single-slot staging area for one file's bytes between fetch and send.
///
/// Content up to `capacity` bytes stays in memory. Larger content is spilled
/// to a temp file that is created once per buffer and truncated before every
/// spill, so one buffer can be reused for any number of files by its worker.
pub struct StreamBuffer {
    chunk: Vec<u8>,
    len: u64,
    spill: NamedTempFile,
}

impl StreamBuffer {
    /// Create a buffer whose spill file lives in the system temp directory.
    pub fn new(prefix: &str, capacity: usize) -> io::Result<Self> {
        Self::with_spill_dir(prefix, capacity, None)
    }

    pub fn with_spill_dir(prefix: &str, capacity: usize, dir: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix).suffix(".tmp");
        let spill = match dir {
            Some(d) => builder.tempfile_in(d)?,
            None => builder.tempfile()?,
        };
        Ok(Self { chunk: vec![0u8; capacity.max(1)], len: 0, spill })
    }

    pub fn capacity(&self) -> usize {
        self.chunk.len()
    }

    /// Number of valid bytes currently staged.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when the staged content lives in the spill file.
    pub fn is_spilled(&self) -> bool {
        self.len > self.chunk.len() as u64
    }

    pub fn spill_path(&self) -> &Path {
        self.spill.path()
    }

    /// Drain `source` into the buffer, replacing whatever was staged before.
    /// Returns the number of bytes staged. On error the staged length is
    /// reset to zero and the previous content must not be used.
    pub fn write<R: Read + ?Sized>(&mut self, source: &mut R) -> io::Result<u64> {
        self.len = 0;
        let filled = read_full(source, &mut self.chunk)?;
        if filled < self.chunk.len() {
            self.len = filled as u64;
            return Ok(self.len);
        }

        // chunk is full; only spill when the source really has more
        let mut probe = [0u8; 1];
        if read_full(source, &mut probe)? == 0 {
            self.len = filled as u64;
            return Ok(self.len);
        }

        let file = self.spill.as_file_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&self.chunk)?;
        file.write_all(&probe)?;
        let rest = io::copy(source, file)?;
        file.flush()?;
        self.len = filled as u64 + 1 + rest;
        tracing::trace!(
            "[buffer] spilled {} bytes to {}",
            self.len,
            self.spill.path().display()
        );
        Ok(self.len)
    }

    /// Open an independent reader over exactly the staged bytes.
    ///
    /// The reader owns its data (a copy of the chunk, or a fresh handle to the
    /// spill file), so a provider can hand out a new one per upload attempt.
    /// It must be consumed before the next `write`.
    pub fn reader(&self) -> io::Result<StagedReader> {
        if self.is_spilled() {
            let file = self.spill.reopen()?;
            Ok(StagedReader::Spilled(file.take(self.len)))
        } else {
            let staged = self.chunk[..self.len as usize].to_vec();
            Ok(StagedReader::Memory(Cursor::new(staged)))
        }
    }
}

/// Reader handed out by [`StreamBuffer::reader`].
pub enum StagedReader {
    Memory(Cursor<Vec<u8>>),
    Spilled(Take<File>),
}

impl Read for StagedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            StagedReader::Memory(c) => c.read(buf),
            StagedReader::Spilled(f) => f.read(buf),
        }
    }
}

// Fill `buf` until it is full or the source reports end of data.
fn read_full<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
