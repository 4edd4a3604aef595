//! Chunk sources.
//!
//! A [`ChunkSource`] yields ordered, non-overlapping chunks from a scan
//! target. Sources never write to the target. A failed read is reported as
//! [`ScanError::Read`] for that region and the source moves on to the next
//! chunk, so one bad sector does not end a scan.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::detection::Chunk;
use crate::error::ScanError;

/// Pull-based producer of chunks.
pub trait ChunkSource {
    /// Next chunk in offset order; `None` once the target is exhausted.
    fn next_chunk(&mut self) -> Option<Result<Chunk, ScanError>>;

    /// Total bytes the source will cover, when known up front.
    fn total_bytes(&self) -> Option<u64> {
        None
    }
}

impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    fn next_chunk(&mut self) -> Option<Result<Chunk, ScanError>> {
        (**self).next_chunk()
    }

    fn total_bytes(&self) -> Option<u64> {
        (**self).total_bytes()
    }
}

fn check_chunk_size(chunk_size: usize) -> Result<(), ScanError> {
    if chunk_size == 0 {
        return Err(ScanError::invalid_config("chunk size must be non-zero"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Files, images and block devices
// ---------------------------------------------------------------------------

/// Sequential reader over a file, disk image or block device.
pub struct FileSource<R = File> {
    reader: R,
    path: Option<PathBuf>,
    chunk_size: usize,
    offset: u64,
    len: Option<u64>,
    done: bool,
}

impl FileSource<File> {
    /// Open `path` read-only. The size is found by seeking to the end, which
    /// also works for block devices whose metadata length is 0.
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self, ScanError> {
        check_chunk_size(chunk_size)?;
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut source = Self::from_reader(file, chunk_size)?;
        source.path = Some(path.to_path_buf());
        Ok(source)
    }
}

impl<R: Read + Seek> FileSource<R> {
    /// Wrap any seekable reader.
    pub fn from_reader(mut reader: R, chunk_size: usize) -> Result<Self, ScanError> {
        check_chunk_size(chunk_size)?;
        let len = match reader.seek(SeekFrom::End(0)) {
            Ok(len) => Some(len),
            Err(e) => {
                log::debug!("target size unknown: {e}");
                None
            }
        };
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader,
            path: None,
            chunk_size,
            offset: 0,
            len,
            done: false,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fill `buf` until it is full or the reader reports EOF.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Skip past an unreadable region so the next read starts after it.
    fn skip_region(&mut self, length: u64) {
        self.offset += length;
        if let Err(e) = self.reader.seek(SeekFrom::Start(self.offset)) {
            log::debug!("cannot seek past unreadable region at {}: {e}", self.offset);
            self.done = true;
        }
        if self.len.is_some_and(|len| self.offset >= len) {
            self.done = true;
        }
    }
}

impl<R: Read + Seek> ChunkSource for FileSource<R> {
    fn next_chunk(&mut self) -> Option<Result<Chunk, ScanError>> {
        if self.done {
            return None;
        }
        let want = match self.len {
            Some(len) => (len.saturating_sub(self.offset)).min(self.chunk_size as u64) as usize,
            None => self.chunk_size,
        };
        if want == 0 {
            self.done = true;
            return None;
        }

        let mut buf = vec![0u8; want];
        match self.fill(&mut buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(n) => {
                buf.truncate(n);
                let chunk = Chunk::new(self.offset, buf);
                self.offset += n as u64;
                if n < want {
                    self.done = true;
                }
                Some(Ok(chunk))
            }
            Err(source) => {
                let offset = self.offset;
                let length = want as u64;
                self.skip_region(length);
                Some(Err(ScanError::Read {
                    offset,
                    length,
                    source,
                }))
            }
        }
    }

    fn total_bytes(&self) -> Option<u64> {
        self.len
    }
}

// ---------------------------------------------------------------------------
// In-memory buffers
// ---------------------------------------------------------------------------

/// Chunks of an in-memory buffer.
#[derive(Debug, Clone)]
pub struct SliceSource {
    data: Vec<u8>,
    chunk_size: usize,
    offset: usize,
}

impl SliceSource {
    pub fn new(data: impl Into<Vec<u8>>, chunk_size: usize) -> Result<Self, ScanError> {
        check_chunk_size(chunk_size)?;
        Ok(Self {
            data: data.into(),
            chunk_size,
            offset: 0,
        })
    }
}

impl ChunkSource for SliceSource {
    fn next_chunk(&mut self) -> Option<Result<Chunk, ScanError>> {
        if self.offset >= self.data.len() {
            return None;
        }
        let end = (self.offset + self.chunk_size).min(self.data.len());
        let chunk = Chunk::new(self.offset as u64, self.data[self.offset..end].to_vec());
        self.offset = end;
        Some(Ok(chunk))
    }

    fn total_bytes(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Allocated-cluster filter
// ---------------------------------------------------------------------------

/// Leading bytes of common file formats.
pub const ALLOCATED_MAGIC: &[(&str, &[u8])] = &[
    ("zip", b"PK"),
    ("png", b"\x89PNG"),
    ("jpeg", b"\xff\xd8"),
    ("pe", b"MZ"),
    ("elf", b"\x7fELF"),
    ("mp3", b"ID3"),
    ("gzip", b"\x1f\x8b"),
    ("pdf", b"%PDF"),
];

/// Name of the file format `data` starts with, if any.
pub fn allocated_signature(data: &[u8]) -> Option<&'static str> {
    ALLOCATED_MAGIC
        .iter()
        .find(|(_, magic)| data.starts_with(magic))
        .map(|(name, _)| *name)
}

/// Drops chunks that start with a known file signature.
///
/// Without a filesystem parser this is a heuristic: a cluster that begins
/// with a file header is most likely still allocated and not wipe residue.
pub struct SkipAllocated<S> {
    inner: S,
    skipped: u64,
}

impl<S: ChunkSource> SkipAllocated<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, skipped: 0 }
    }

    /// Chunks dropped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<S: ChunkSource> ChunkSource for SkipAllocated<S> {
    fn next_chunk(&mut self) -> Option<Result<Chunk, ScanError>> {
        loop {
            match self.inner.next_chunk()? {
                Ok(chunk) => {
                    if let Some(kind) = allocated_signature(&chunk.data) {
                        log::debug!("skipping allocated {kind} cluster at {}", chunk.offset);
                        self.skipped += 1;
                        continue;
                    }
                    return Some(Ok(chunk));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }

    fn total_bytes(&self) -> Option<u64> {
        self.inner.total_bytes()
    }
}
