//! # wipetrace-core
//!
//! **Find out how a disk was wiped.**
//!
//! `wipetrace-core` reads a storage target in fixed-size chunks, classifies
//! every chunk as a wipe artifact (zero fill, one fill, random data, a short
//! repeating sequence, or multi-pass remnants) and infers which standard wipe
//! algorithm most likely produced the whole target.
//!
//! ## Quick Start
//!
//! ```no_run
//! use wipetrace_core::{DetectorConfig, FileSource, Scanner};
//!
//! let mut source = FileSource::open("disk.img", 4096)?;
//! let outcome = Scanner::new(DetectorConfig::default()).scan(&mut source, |_| {});
//! println!(
//!     "{} ({} passes, {:.1}%)",
//!     outcome.verdict.algorithm_label,
//!     outcome.verdict.pass_count_estimate,
//!     outcome.verdict.confidence
//! );
//! # Ok::<(), wipetrace_core::ScanError>(())
//! ```
//!
//! ## Architecture
//!
//! ChunkSource → ChunkClassifier → Detections → SequenceAggregator → Verdict → Report
//!
//! Classification is a pure function of the chunk bytes and the
//! [`DetectorConfig`], so the [`Scanner`] may classify batches on worker
//! threads; detections are always re-sorted by offset before aggregation.
//! Scanning never writes to the target.

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod detection;
pub mod error;
pub mod patterns;
pub mod report;
pub mod samples;
pub mod scan;
pub mod slack;
pub mod source;

pub use aggregator::{
    AlgorithmVerdict, SequenceAggregator, WipeAlgorithm, Zone, ZoneSummary, aggregate,
};
pub use classifier::{ChunkClassifier, select_pattern};
pub use config::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MIN_CONFIDENCE, DetectorConfig, load_config_from_path,
};
pub use detection::{Chunk, Detection, PatternType};
pub use error::ScanError;
pub use patterns::{
    RepeatMatch, chi_factor, mixed_confidence, one_confidence, random_confidence,
    repeat_confidence, repeat_match, zero_confidence,
};
pub use report::{BatchReport, ScanMode, ScanReport, default_report_name};
pub use samples::{SampleKind, generate_all};
pub use scan::{ReadGap, ScanOutcome, ScanProgress, Scanner};
pub use slack::SlackSource;
pub use source::{ChunkSource, FileSource, SkipAllocated, SliceSource};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
