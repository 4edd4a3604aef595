//! Byte-level statistical tests used by the wipe-pattern classifier.
//!
//! Every function here is total: empty and degenerate buffers return
//! defined neutral values instead of failing. Thresholds are passed in by
//! the caller so the classifier's configuration stays the single source of
//! truth.

use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Degrees of freedom for a 256-bucket byte histogram.
pub const BYTE_DEGREES_OF_FREEDOM: f64 = 255.0;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a chi-square goodness-of-fit test against uniform bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquareResult {
    pub statistic: f64,
    pub p_value: f64,
    /// `p_value > alpha`: the histogram is consistent with uniform random bytes.
    pub is_random: bool,
}

impl ChiSquareResult {
    fn empty() -> Self {
        Self {
            statistic: 0.0,
            p_value: 0.0,
            is_random: false,
        }
    }

    /// Descriptive p-value bucket for reports.
    pub fn band(&self) -> PValueBand {
        PValueBand::from_p(self.p_value)
    }
}

/// Coarse p-value buckets for a byte-histogram chi-square test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PValueBand {
    /// p > 0.20
    StronglyUniform,
    /// p > 0.10
    LikelyUniform,
    /// p > 0.05
    PossiblyUniform,
    /// p > 0.01
    NonUniform,
    StronglyNonUniform,
}

impl PValueBand {
    pub fn from_p(p: f64) -> Self {
        if p > 0.20 {
            Self::StronglyUniform
        } else if p > 0.10 {
            Self::LikelyUniform
        } else if p > 0.05 {
            Self::PossiblyUniform
        } else if p > 0.01 {
            Self::NonUniform
        } else {
            Self::StronglyNonUniform
        }
    }

    /// Stable snake_case name used in exports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StronglyUniform => "strongly_uniform",
            Self::LikelyUniform => "likely_uniform",
            Self::PossiblyUniform => "possibly_uniform",
            Self::NonUniform => "non_uniform",
            Self::StronglyNonUniform => "strongly_non_uniform",
        }
    }
}

impl std::fmt::Display for PValueBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StronglyUniform => write!(f, ">0.20 (strongly uniform)"),
            Self::LikelyUniform => write!(f, ">0.10 (likely uniform)"),
            Self::PossiblyUniform => write!(f, ">0.05 (possibly uniform)"),
            Self::NonUniform => write!(f, "<0.05 (non-uniform)"),
            Self::StronglyNonUniform => write!(f, "<0.01 (strongly non-uniform)"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Statistics
// ═══════════════════════════════════════════════════════════════════════════════

/// Count occurrences of each byte value.
pub fn byte_histogram(data: &[u8]) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for &b in data {
        hist[b as usize] += 1;
    }
    hist
}

/// Shannon entropy in bits per byte, in `[0, 8]`.
///
/// 0.0 for a buffer of one repeated value (and for an empty buffer), 8.0 when
/// all 256 values occur equally often.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let n = data.len() as f64;
    let mut h = 0.0;
    for &c in &byte_histogram(data) {
        if c > 0 {
            let p = c as f64 / n;
            h -= p * p.log2();
        }
    }
    // A single-valued histogram gives -0.0.
    h.max(0.0)
}

/// Chi-square goodness of fit of the byte histogram against `len / 256`
/// per bucket, with 255 degrees of freedom.
pub fn chi_square(data: &[u8], alpha: f64) -> ChiSquareResult {
    let n = data.len();
    if n == 0 {
        return ChiSquareResult::empty();
    }
    let expected = n as f64 / 256.0;
    let statistic: f64 = byte_histogram(data)
        .iter()
        .map(|&c| {
            let diff = c as f64 - expected;
            diff * diff / expected
        })
        .sum();
    let p_value = chi_square_p_value(statistic, BYTE_DEGREES_OF_FREEDOM);
    ChiSquareResult {
        statistic,
        p_value,
        is_random: p_value > alpha,
    }
}

/// Upper-tail probability of a chi-square statistic.
///
/// Returns 0.0 for invalid degrees of freedom or a non-finite statistic.
pub fn chi_square_p_value(statistic: f64, df: f64) -> f64 {
    if !statistic.is_finite() {
        return 0.0;
    }
    match ChiSquared::new(df) {
        Ok(dist) => dist.sf(statistic).clamp(0.0, 1.0),
        Err(_) => 0.0,
    }
}

/// Population variance; 0.0 for an empty slice.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n
}
