//! Chunk and per-chunk detection types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One contiguous region read from a scan target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub offset: u64,
    pub data: Vec<u8>,
    /// Originating file, for sources that span many files (slack scans).
    pub source: Option<PathBuf>,
}

impl Chunk {
    pub fn new(offset: u64, data: Vec<u8>) -> Self {
        Self {
            offset,
            data,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Content class of a single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    ZeroFill,
    OneFill,
    Random,
    Repeating,
    Mixed,
    Unknown,
}

impl PatternType {
    /// All pattern types in tie-break precedence order.
    pub const PRECEDENCE: [PatternType; 6] = [
        PatternType::ZeroFill,
        PatternType::OneFill,
        PatternType::Repeating,
        PatternType::Random,
        PatternType::Mixed,
        PatternType::Unknown,
    ];

    /// Position in [`PatternType::PRECEDENCE`]; lower wins ties.
    pub fn precedence(self) -> usize {
        match self {
            Self::ZeroFill => 0,
            Self::OneFill => 1,
            Self::Repeating => 2,
            Self::Random => 3,
            Self::Mixed => 4,
            Self::Unknown => 5,
        }
    }

    /// Fixed chunk-local algorithm label.
    pub fn algorithm(self) -> &'static str {
        match self {
            Self::ZeroFill => "simple_zero",
            Self::OneFill => "simple_one",
            Self::Random => "random_fill",
            Self::Repeating => "repeating_pattern",
            Self::Mixed => "multi_pass",
            Self::Unknown => "none",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ZeroFill => "zero_fill",
            Self::OneFill => "one_fill",
            Self::Random => "random",
            Self::Repeating => "repeating",
            Self::Mixed => "mixed",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification result for one chunk.
///
/// Created once per chunk and never mutated; carries its own offset so
/// results classified out of order can be re-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub offset: u64,
    pub size: u32,
    pub pattern_type: PatternType,
    /// Shannon entropy in bits per byte.
    pub entropy: f64,
    pub chi_square: f64,
    pub chi_p_value: f64,
    pub chi_is_random: bool,
    /// Descriptive p-value bucket, e.g. `non_uniform`.
    #[serde(default)]
    pub chi_band: String,
    pub zero_confidence: f64,
    pub one_confidence: f64,
    pub repeat_confidence: f64,
    pub random_confidence: f64,
    /// Intra-chunk multi-pass evidence (sub-block entropy variance).
    pub mixed_confidence: f64,
    pub repeat_period: Option<u32>,
    /// Hex of one period of the repeating pattern.
    pub repeat_pattern: Option<String>,
    /// Confidence of the selected pattern type, in `[0, 100]`.
    pub confidence: f64,
    /// Chunk-local best guess; the target-level verdict is authoritative.
    pub algorithm: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Detection {
    /// True when the chunk was classified as something other than `Unknown`.
    pub fn is_classified(&self) -> bool {
        self.pattern_type != PatternType::Unknown
    }

    /// End offset (exclusive) of the chunk.
    pub fn end_offset(&self) -> u64 {
        self.offset + self.size as u64
    }
}
