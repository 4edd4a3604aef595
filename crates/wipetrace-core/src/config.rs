//! Detection thresholds.
//!
//! Every cutoff used by the pattern matchers, the chunk classifier and the
//! sequence aggregator lives in [`DetectorConfig`]. The value is passed
//! explicitly into each stage, so tests can override single thresholds
//! without touching process-wide state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Default bytes per analysis chunk (one cluster).
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Default minimum confidence a detection needs to be shown by a report sink.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 40.0;

/// Tunable thresholds for classification and aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Chi-square p-value above which a chunk counts as uniformly distributed.
    pub chi_alpha: f64,
    /// Chunks shorter than this never count as chi-square random.
    pub chi_min_len: usize,
    /// Random confidence is 0 below this entropy (bits/byte).
    pub random_entropy_floor: f64,
    /// Entropy above which random confidence reaches 90.
    pub random_entropy_high: f64,
    /// Multiplier on random confidence when chi-square rejects uniformity.
    pub random_chi_penalty: f64,
    /// Longest period searched by the repeating-pattern matcher.
    pub repeat_max_period: usize,
    /// Mismatch rate accepted for the shortest matching period.
    pub repeat_tolerance: f64,
    /// Best period must reproduce at least this fraction of the buffer.
    pub repeat_min_match: f64,
    /// Sub-block size for intra-chunk entropy variance.
    pub mixed_block_size: usize,
    /// Minimum sub-blocks needed for intra-chunk entropy variance.
    pub mixed_min_blocks: usize,
    /// Sub-block entropy variance above which mixed confidence is 90.
    pub mixed_variance_high: f64,
    /// Sub-block entropy variance above which mixed confidence is 75.
    pub mixed_variance_mid: f64,
    /// Sub-block entropy variance above which mixed confidence is 50.
    pub mixed_variance_low: f64,
    /// Detections at or below this confidence are too ambiguous to form a zone.
    pub zone_confidence_floor: f64,
    /// Share of chunks required for a zero-fill or one-fill verdict.
    pub fill_fraction: f64,
    /// Share of chunks required for a random-fill verdict.
    pub random_fraction: f64,
    /// Entropy variance at or below which a random-fill target is "uniform".
    pub random_variance_max: f64,
    /// Entropy variance above which multi-pass signatures are considered.
    pub multi_pass_variance: f64,
    /// Relative margin around `multi_pass_variance` treated as uncertain.
    pub boundary_margin: f64,
    /// Verdict confidence multiplier inside the uncertain margin.
    pub boundary_penalty: f64,
    /// Minimum share of chunks for a zone type to count as non-trivial.
    pub min_zone_share: f64,
    /// Distinct non-trivial zone types needed for a Gutmann verdict.
    pub gutmann_min_zones: usize,
    /// Confidence scale for a "Mixed/Unknown" verdict.
    pub mixed_verdict_scale: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            chi_alpha: 0.05,
            chi_min_len: 256,
            random_entropy_floor: 7.5,
            random_entropy_high: 7.8,
            random_chi_penalty: 0.5,
            repeat_max_period: 64,
            repeat_tolerance: 0.05,
            repeat_min_match: 0.90,
            mixed_block_size: 512,
            mixed_min_blocks: 4,
            mixed_variance_high: 4.0,
            mixed_variance_mid: 2.0,
            mixed_variance_low: 0.5,
            zone_confidence_floor: 10.0,
            fill_fraction: 0.99,
            random_fraction: 0.95,
            random_variance_max: 0.5,
            multi_pass_variance: 2.0,
            boundary_margin: 0.10,
            boundary_penalty: 0.8,
            min_zone_share: 0.01,
            gutmann_min_zones: 4,
            mixed_verdict_scale: 0.5,
        }
    }
}

impl DetectorConfig {
    /// Check that every threshold is inside its meaningful range.
    pub fn validate(&self) -> Result<(), ScanError> {
        let unit = [
            ("chi_alpha", self.chi_alpha),
            ("random_chi_penalty", self.random_chi_penalty),
            ("repeat_tolerance", self.repeat_tolerance),
            ("repeat_min_match", self.repeat_min_match),
            ("fill_fraction", self.fill_fraction),
            ("random_fraction", self.random_fraction),
            ("boundary_margin", self.boundary_margin),
            ("boundary_penalty", self.boundary_penalty),
            ("min_zone_share", self.min_zone_share),
            ("mixed_verdict_scale", self.mixed_verdict_scale),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScanError::invalid_config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if !(0.0..=8.0).contains(&self.random_entropy_floor)
            || !(0.0..=8.0).contains(&self.random_entropy_high)
        {
            return Err(ScanError::invalid_config(
                "random entropy thresholds must be within [0, 8]",
            ));
        }
        if self.random_entropy_floor >= self.random_entropy_high {
            return Err(ScanError::invalid_config(
                "random_entropy_floor must be below random_entropy_high",
            ));
        }
        if self.random_entropy_high >= 8.0 {
            return Err(ScanError::invalid_config(
                "random_entropy_high must be below 8.0",
            ));
        }
        if self.repeat_max_period == 0 {
            return Err(ScanError::invalid_config(
                "repeat_max_period must be non-zero",
            ));
        }
        if self.mixed_block_size == 0 {
            return Err(ScanError::invalid_config("mixed_block_size must be non-zero"));
        }
        if !(0.0 <= self.mixed_variance_low
            && self.mixed_variance_low <= self.mixed_variance_mid
            && self.mixed_variance_mid <= self.mixed_variance_high)
        {
            return Err(ScanError::invalid_config(
                "mixed variance cutoffs must satisfy 0 <= low <= mid <= high",
            ));
        }
        if !(0.0..=100.0).contains(&self.zone_confidence_floor) {
            return Err(ScanError::invalid_config(
                "zone_confidence_floor must be within [0, 100]",
            ));
        }
        if self.random_variance_max < 0.0 || self.multi_pass_variance < 0.0 {
            return Err(ScanError::invalid_config(
                "variance thresholds must be non-negative",
            ));
        }
        Ok(())
    }

    /// True when `variance` lies within `boundary_margin` of the multi-pass
    /// variance threshold.
    pub fn near_variance_boundary(&self, variance: f64) -> bool {
        (variance - self.multi_pass_variance).abs()
            <= self.boundary_margin * self.multi_pass_variance
    }
}

/// Load and validate a threshold file. Missing fields take their defaults.
pub fn load_config_from_path(path: &Path) -> Result<DetectorConfig, ScanError> {
    let raw = std::fs::read_to_string(path)?;
    let config: DetectorConfig = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_fraction() {
        let cfg = DetectorConfig {
            fill_fraction: 1.5,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("fill_fraction"));
    }

    #[test]
    fn test_rejects_inverted_entropy_thresholds() {
        let cfg = DetectorConfig {
            random_entropy_floor: 7.9,
            random_entropy_high: 7.8,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_period() {
        let cfg = DetectorConfig {
            repeat_max_period: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_unordered_mixed_cutoffs() {
        let cfg = DetectorConfig {
            mixed_variance_mid: 5.0,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("mixed variance"));

        let cfg = DetectorConfig {
            mixed_block_size: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_near_variance_boundary() {
        let cfg = DetectorConfig::default();
        assert!(cfg.near_variance_boundary(2.0));
        assert!(cfg.near_variance_boundary(1.81));
        assert!(cfg.near_variance_boundary(2.19));
        assert!(!cfg.near_variance_boundary(1.7));
        assert!(!cfg.near_variance_boundary(14.0));
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("thresholds.json");
        std::fs::write(&path, r#"{ "chi_alpha": 0.01, "repeat_max_period": 16 }"#).unwrap();

        let cfg = load_config_from_path(&path).unwrap();
        assert_eq!(cfg.chi_alpha, 0.01);
        assert_eq!(cfg.repeat_max_period, 16);
        assert_eq!(cfg.fill_fraction, DetectorConfig::default().fill_fraction);
    }

    #[test]
    fn test_load_invalid_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_config_from_path(&path),
            Err(ScanError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, r#"{ "chi_alpha": 2.0 }"#).unwrap();
        assert!(matches!(
            load_config_from_path(&path),
            Err(ScanError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let cfg = DetectorConfig::default();
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let parsed: DetectorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cfg);
    }
}
