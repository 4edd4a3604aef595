//! File slack-space source.
//!
//! Walks a directory tree and yields, for every file whose size is not a
//! multiple of the filesystem block size, the tail of its last block. Only
//! what userspace can read is returned; true RAM slack past EOF is not
//! reachable through the filesystem API.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::detection::Chunk;
use crate::error::ScanError;
use crate::source::ChunkSource;

/// Filesystem block size of the volume holding `path`.
///
/// Falls back to [`DEFAULT_CHUNK_SIZE`] when the platform cannot tell.
pub fn block_size(path: &Path) -> u64 {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
            return DEFAULT_CHUNK_SIZE as u64;
        };
        // SAFETY: statvfs writes into a zeroed struct we own; c_path is NUL-terminated.
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc == 0 && stat.f_bsize > 0 {
            return stat.f_bsize as u64;
        }
        log::debug!("statvfs failed for {}; using default block size", path.display());
        DEFAULT_CHUNK_SIZE as u64
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        DEFAULT_CHUNK_SIZE as u64
    }
}

/// Recursively list regular files under `root`, sorted for a stable order.
fn walk_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("skipping unreadable directory {}: {e}", dir.display());
                continue;
            }
        };
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    files
}

/// Slack-space chunks of every file under a directory.
pub struct SlackSource {
    files: std::vec::IntoIter<PathBuf>,
    block_size: u64,
}

impl SlackSource {
    /// Walk `dir` using the block size reported for its volume.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, ScanError> {
        let dir = dir.as_ref();
        let bs = block_size(dir);
        Self::with_block_size(dir, bs)
    }

    pub fn with_block_size(dir: impl AsRef<Path>, block_size: u64) -> Result<Self, ScanError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ScanError::NotADirectory(dir.to_path_buf()));
        }
        if block_size == 0 {
            return Err(ScanError::invalid_config("block size must be non-zero"));
        }
        let files = walk_files(dir);
        log::info!(
            "slack scan of {}: {} files, block size {block_size}",
            dir.display(),
            files.len()
        );
        Ok(Self {
            files: files.into_iter(),
            block_size,
        })
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }
}

/// Slack chunk of one file, or `None` when it has no partial block.
fn slack_of(path: &Path, block_size: u64) -> std::io::Result<Option<Chunk>> {
    let size = std::fs::metadata(path)?.len();
    let partial = size % block_size;
    if size == 0 || partial == 0 {
        return Ok(None);
    }
    let slack = block_size - partial;

    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(size.saturating_sub(block_size)))?;
    let mut last_block = Vec::new();
    file.read_to_end(&mut last_block)?;

    let keep = (slack as usize).min(last_block.len());
    let tail = last_block.split_off(last_block.len() - keep);
    if tail.is_empty() {
        return Ok(None);
    }
    Ok(Some(Chunk::new(size, tail).with_source(path)))
}

impl ChunkSource for SlackSource {
    /// Unreadable files surface as [`ScanError::FileRead`]; the next call
    /// moves on to the following file.
    fn next_chunk(&mut self) -> Option<Result<Chunk, ScanError>> {
        for path in self.files.by_ref() {
            match slack_of(&path, self.block_size) {
                Ok(Some(chunk)) => return Some(Ok(chunk)),
                Ok(None) => continue,
                Err(source) => {
                    return Some(Err(ScanError::FileRead {
                        path,
                        length: self.block_size,
                        source,
                    }));
                }
            }
        }
        None
    }
}
