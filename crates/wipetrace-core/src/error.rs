//! Error types for wipetrace.
//!
//! Only the I/O boundary (chunk sources, report files, config files) can
//! fail. Statistics, pattern matching, classification and aggregation are
//! total functions and never produce a [`ScanError`].

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur while scanning a target or writing its report.
#[derive(Debug)]
pub enum ScanError {
    /// An I/O error opening a target or writing a report.
    Io(std::io::Error),

    /// A chunk could not be read. The region is skipped and the scan continues.
    Read {
        /// Offset of the unreadable region.
        offset: u64,
        /// Number of bytes skipped.
        length: u64,
        source: std::io::Error,
    },

    /// One file of a multi-file scan could not be read. The file is
    /// skipped and the scan continues.
    FileRead {
        path: PathBuf,
        /// Bytes the file would have contributed, at most one block.
        length: u64,
        source: std::io::Error,
    },

    /// Invalid configuration parameter.
    InvalidConfig {
        /// Description of what was invalid.
        message: String,
    },

    /// A threshold file could not be parsed.
    ConfigParse(serde_json::Error),

    /// Slack and batch scans need a directory target.
    NotADirectory(PathBuf),
}

impl ScanError {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        ScanError::InvalidConfig {
            message: message.into(),
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Io(e) => write!(f, "io error: {e}"),
            ScanError::Read {
                offset,
                length,
                source,
            } => write!(
                f,
                "read error at offset 0x{offset:08X} ({length} bytes skipped): {source}"
            ),
            ScanError::FileRead { path, source, .. } => {
                write!(f, "cannot read {}: {source}", path.display())
            }
            ScanError::InvalidConfig { message } => write!(f, "invalid config: {message}"),
            ScanError::ConfigParse(e) => write!(f, "failed to parse threshold JSON: {e}"),
            ScanError::NotADirectory(path) => {
                write!(f, "not a directory: {}", path.display())
            }
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::Io(e) => Some(e),
            ScanError::Read { source, .. } => Some(source),
            ScanError::FileRead { source, .. } => Some(source),
            ScanError::ConfigParse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ScanError {
    fn from(e: std::io::Error) -> Self {
        ScanError::Io(e)
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(e: serde_json::Error) -> Self {
        ScanError::ConfigParse(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: ScanError = io_err.into();
        assert!(matches!(err, ScanError::Io(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_read_error_display() {
        let err = ScanError::Read {
            offset: 0x1000,
            length: 4096,
            source: std::io::Error::other("bad sector"),
        };
        let msg = err.to_string();
        assert!(msg.contains("0x00001000"));
        assert!(msg.contains("4096 bytes skipped"));
        assert!(msg.contains("bad sector"));
    }

    #[test]
    fn test_file_read_display() {
        let err = ScanError::FileRead {
            path: PathBuf::from("/evidence/notes.txt"),
            length: 4096,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.to_string(), "cannot read /evidence/notes.txt: gone");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_invalid_config_display() {
        let err = ScanError::invalid_config("chunk size must be non-zero");
        assert!(err.to_string().contains("invalid config"));
        assert!(err.source().is_none());
    }
}
