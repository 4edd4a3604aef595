//! Pattern matchers for wipe signatures.
//!
//! Each matcher scores one hypothesis about a buffer on a `[0, 100]` scale.
//! Scores are ratio based, so a truncated final chunk is judged by the same
//! rules as a full one.

use wipetrace_tests::{population_variance, shannon_entropy};

use crate::config::DetectorConfig;

// ---------------------------------------------------------------------------
// Fill patterns
// ---------------------------------------------------------------------------

/// Percentage of bytes equal to 0x00.
pub fn zero_confidence(data: &[u8]) -> f64 {
    byte_share(data, 0x00)
}

/// Percentage of bytes equal to 0xFF.
pub fn one_confidence(data: &[u8]) -> f64 {
    byte_share(data, 0xFF)
}

fn byte_share(data: &[u8], value: u8) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let hits = data.iter().filter(|&&b| b == value).count();
    hits as f64 / data.len() as f64 * 100.0
}

// ---------------------------------------------------------------------------
// Repeating sequences
// ---------------------------------------------------------------------------

/// Best short period found in a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatMatch {
    pub period: usize,
    /// The first `period` bytes, which tile the buffer.
    pub pattern: Vec<u8>,
    /// `100 * (1 - mismatch_rate)`.
    pub confidence: f64,
    /// False when the pattern is nothing but 0x00 or nothing but 0xFF; those
    /// buffers belong to the fill matchers.
    pub eligible: bool,
}

impl RepeatMatch {
    pub fn pattern_hex(&self) -> String {
        hex_encode(&self.pattern)
    }
}

/// Find the shortest period whose tiling reproduces `data`.
///
/// Periods `1..=min(repeat_max_period, len / 2)` are tried in ascending
/// order. The first period with a mismatch rate within `repeat_tolerance`
/// wins; failing that, the period with the lowest mismatch rate wins if it
/// still matches at least `repeat_min_match` of the compared bytes.
pub fn repeat_match(data: &[u8], config: &DetectorConfig) -> Option<RepeatMatch> {
    let n = data.len();
    let max_period = config.repeat_max_period.min(n / 2);
    let mut best: Option<(usize, f64)> = None;

    for period in 1..=max_period {
        let compared = n - period;
        let budget = ((1.0 - config.repeat_min_match) * compared as f64).floor() as usize;

        let mut mismatches = 0usize;
        let mut over_budget = false;
        for i in period..n {
            if data[i] != data[i % period] {
                mismatches += 1;
                if mismatches > budget {
                    over_budget = true;
                    break;
                }
            }
        }
        if over_budget {
            continue;
        }

        let rate = mismatches as f64 / compared as f64;
        if rate <= config.repeat_tolerance {
            best = Some((period, rate));
            break;
        }
        if best.is_none_or(|(_, r)| rate < r) {
            best = Some((period, rate));
        }
    }

    best.map(|(period, rate)| {
        let pattern = data[..period].to_vec();
        let trivial_fill =
            pattern.iter().all(|&b| b == 0x00) || pattern.iter().all(|&b| b == 0xFF);
        RepeatMatch {
            period,
            pattern,
            confidence: (1.0 - rate) * 100.0,
            eligible: !trivial_fill,
        }
    })
}

/// Confidence that `data` is a short repeating sequence; 0 without a match.
pub fn repeat_confidence(data: &[u8], config: &DetectorConfig) -> f64 {
    repeat_match(data, config).map_or(0.0, |m| m.confidence)
}

// ---------------------------------------------------------------------------
// Randomness
// ---------------------------------------------------------------------------

/// Confidence that `data` is a random overwrite.
///
/// Rises linearly from 0 at `random_entropy_floor` to 90 at
/// `random_entropy_high`, then to 100 at 8 bits/byte. When chi-square
/// rejects uniformity the result is scaled by [`chi_factor`].
pub fn random_confidence(
    data: &[u8],
    entropy: f64,
    chi_is_random: bool,
    chi_p_value: f64,
    config: &DetectorConfig,
) -> f64 {
    if data.is_empty() || entropy < config.random_entropy_floor {
        return 0.0;
    }
    let floor = config.random_entropy_floor;
    let high = config.random_entropy_high;

    let score = if entropy >= high {
        if high >= 8.0 {
            100.0
        } else {
            90.0 + 10.0 * ((entropy - high) / (8.0 - high)).clamp(0.0, 1.0)
        }
    } else {
        // floor <= entropy < high, so the span is positive.
        90.0 * (entropy - floor) / (high - floor)
    };
    let score = score * chi_factor(chi_is_random, chi_p_value, config);
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

/// Multiplier applied to the random score for the chi-square outcome.
///
/// 1.0 when chi-square accepts uniformity. Otherwise it falls linearly from
/// 1.0 at `p == chi_alpha` to `random_chi_penalty` at `p == 0`. A p-value
/// above `chi_alpha` without acceptance means the buffer was too short to
/// test and takes the full penalty.
pub fn chi_factor(chi_is_random: bool, chi_p_value: f64, config: &DetectorConfig) -> f64 {
    if chi_is_random {
        return 1.0;
    }
    let penalty = config.random_chi_penalty;
    let ratio = if config.chi_alpha > 0.0 && chi_p_value <= config.chi_alpha {
        (chi_p_value / config.chi_alpha).clamp(0.0, 1.0)
    } else {
        0.0
    };
    penalty + (1.0 - penalty) * ratio
}

// ---------------------------------------------------------------------------
// Intra-chunk multi-pass evidence
// ---------------------------------------------------------------------------

/// Confidence that a single chunk straddles several overwrite passes.
///
/// The chunk is cut into `mixed_block_size` sub-blocks; a large variance of
/// their entropies means the chunk holds regions of very different content.
pub fn mixed_confidence(data: &[u8], config: &DetectorConfig) -> f64 {
    if config.mixed_block_size == 0 {
        return 0.0;
    }
    let entropies: Vec<f64> = data
        .chunks_exact(config.mixed_block_size)
        .map(shannon_entropy)
        .collect();
    if entropies.len() < config.mixed_min_blocks {
        return 0.0;
    }

    let variance = population_variance(&entropies);
    if variance > config.mixed_variance_high {
        90.0
    } else if variance > config.mixed_variance_mid {
        75.0
    } else if variance > config.mixed_variance_low {
        50.0
    } else {
        0.0
    }
}

/// Hex-encode bytes without any separator.
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}
