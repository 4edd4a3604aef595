//! Per-chunk classification.
//!
//! [`ChunkClassifier`] turns one chunk into exactly one [`Detection`]. It is
//! a pure function of the chunk bytes and the [`DetectorConfig`]; chunks can
//! be classified in any order or in parallel.

use wipetrace_tests::{chi_square, shannon_entropy};

use crate::config::DetectorConfig;
use crate::detection::{Chunk, Detection, PatternType};
use crate::patterns::{
    mixed_confidence, one_confidence, random_confidence, repeat_match, zero_confidence,
};

/// Classifies chunks against a fixed set of thresholds.
#[derive(Debug, Clone, Default)]
pub struct ChunkClassifier {
    config: DetectorConfig,
}

impl ChunkClassifier {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Classify a chunk, carrying over its offset and originating file.
    pub fn classify(&self, chunk: &Chunk) -> Detection {
        let mut detection = self.classify_bytes(chunk.offset, &chunk.data);
        detection.source = chunk
            .source
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        detection
    }

    /// Classify a raw byte region starting at `offset`.
    pub fn classify_bytes(&self, offset: u64, data: &[u8]) -> Detection {
        let cfg = &self.config;

        let entropy = shannon_entropy(data);
        let chi = chi_square(data, cfg.chi_alpha);
        let chi_is_random = chi.is_random && data.len() >= cfg.chi_min_len;

        let zero = zero_confidence(data);
        let one = one_confidence(data);
        let repeat = repeat_match(data, cfg);
        let repeat_conf = repeat.as_ref().map_or(0.0, |m| m.confidence);
        let repeat_eligible = repeat
            .as_ref()
            .filter(|m| m.eligible)
            .map_or(0.0, |m| m.confidence);
        let random = random_confidence(data, entropy, chi_is_random, chi.p_value, cfg);
        let mixed = mixed_confidence(data, cfg);

        let (pattern_type, confidence) = select_pattern(&[
            (PatternType::ZeroFill, zero),
            (PatternType::OneFill, one),
            (PatternType::Repeating, repeat_eligible),
            (PatternType::Random, random),
            (PatternType::Mixed, mixed),
        ]);

        let label = match (pattern_type, &repeat) {
            (PatternType::Repeating, Some(m)) => {
                let hex = m.pattern_hex();
                let shown = &hex[..hex.len().min(16)];
                format!("Repeating pattern (period={}, hex={shown})", m.period)
            }
            _ => pattern_label(pattern_type).to_string(),
        };

        Detection {
            offset,
            size: u32::try_from(data.len()).unwrap_or(u32::MAX),
            pattern_type,
            entropy,
            chi_square: chi.statistic,
            chi_p_value: chi.p_value,
            chi_is_random,
            chi_band: chi.band().as_str().to_string(),
            zero_confidence: zero,
            one_confidence: one,
            repeat_confidence: repeat_conf,
            random_confidence: random,
            mixed_confidence: mixed,
            repeat_period: repeat.as_ref().map(|m| m.period as u32),
            repeat_pattern: repeat.as_ref().map(|m| m.pattern_hex()),
            confidence,
            algorithm: pattern_type.algorithm().to_string(),
            label,
            source: None,
        }
    }
}

/// Pick the highest-confidence candidate.
///
/// Candidates must be listed in precedence order: a later candidate only
/// wins with a strictly higher confidence. A zero winner means `Unknown`.
pub fn select_pattern(candidates: &[(PatternType, f64)]) -> (PatternType, f64) {
    let mut best = (PatternType::Unknown, 0.0);
    for &(pattern, confidence) in candidates {
        if confidence > best.1 {
            best = (pattern, confidence);
        }
    }
    if best.1 <= 0.0 {
        return (PatternType::Unknown, 0.0);
    }
    best
}

fn pattern_label(pattern: PatternType) -> &'static str {
    match pattern {
        PatternType::ZeroFill => "Zero-fill (0x00)",
        PatternType::OneFill => "One-fill (0xFF)",
        PatternType::Random => "Random-fill (single pass)",
        PatternType::Repeating => "Repeating pattern",
        PatternType::Mixed => "Multi-pass remnants",
        PatternType::Unknown => "Unknown / unrecognized pattern",
    }
}
