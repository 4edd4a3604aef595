//! Target-level wipe algorithm inference.
//!
//! The [`SequenceAggregator`] looks at every [`Detection`] of one target and
//! infers which wipe algorithm produced the observed mix of zones. It never
//! fails: empty or ambiguous inputs degrade to [`WipeAlgorithm::Unclassified`].
//!
//! # Decision table (first match wins)
//!
//! | rule | verdict |
//! |------|---------|
//! | nothing classified above the confidence floor | unclassified |
//! | zero-fill share ≥ `fill_fraction` | Zero-fill (0x00) |
//! | one-fill share ≥ `fill_fraction` | One-fill (0xFF) |
//! | random share ≥ `random_fraction`, low variance | Random-fill |
//! | ≥ `gutmann_min_zones` zone types, high variance | Gutmann 35-pass |
//! | zero, one and random zones, high variance | DoD 7-pass / RCMP TSSIT |
//! | two of zero, one, random zones | DoD 3-pass |
//! | repeating zone dominates | Alternating/Novelty |
//! | anything else | Mixed/Unknown |

use serde::{Deserialize, Serialize};
use wipetrace_tests::population_variance;

use crate::config::DetectorConfig;
use crate::detection::{Detection, PatternType};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Wipe algorithms the aggregator can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WipeAlgorithm {
    Unclassified,
    ZeroFill,
    OneFill,
    RandomFill,
    Gutmann35,
    /// DoD 5220.22-M 7-pass and RCMP TSSIT OPS-II leave the same signature.
    Dod7PassOrRcmpTssit,
    Dod3Pass,
    AlternatingPattern,
    MixedUnknown,
}

impl WipeAlgorithm {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unclassified => "unclassified",
            Self::ZeroFill => "Zero-fill (0x00)",
            Self::OneFill => "One-fill (0xFF)",
            Self::RandomFill => "Random-fill",
            Self::Gutmann35 => "Gutmann 35-pass (simulated)",
            Self::Dod7PassOrRcmpTssit => "DoD 5220.22-M 7-pass / RCMP TSSIT",
            Self::Dod3Pass => "DoD 5220.22-M 3-pass",
            Self::AlternatingPattern => "Alternating/Novelty pattern",
            Self::MixedUnknown => "Mixed/Unknown",
        }
    }

    /// Machine-readable ids of every algorithm consistent with this verdict.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Self::Unclassified => &[],
            Self::ZeroFill => &["simple_zero"],
            Self::OneFill => &["simple_one"],
            Self::RandomFill => &["random_only"],
            Self::Gutmann35 => &["gutmann_35pass"],
            Self::Dod7PassOrRcmpTssit => &["dod_5220_7pass", "rcmp_tssit_7pass"],
            Self::Dod3Pass => &["dod_5220_3pass"],
            Self::AlternatingPattern => &["alternating_pattern"],
            Self::MixedUnknown => &["unknown"],
        }
    }

    /// Nominal overwrite passes; `MixedUnknown` is estimated from zones instead.
    fn nominal_passes(self) -> u32 {
        match self {
            Self::Unclassified => 0,
            Self::ZeroFill | Self::OneFill | Self::RandomFill | Self::AlternatingPattern => 1,
            Self::Gutmann35 => 35,
            Self::Dod7PassOrRcmpTssit => 7,
            Self::Dod3Pass => 3,
            Self::MixedUnknown => 1,
        }
    }
}

impl std::fmt::Display for WipeAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Number of chunks per pattern type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSummary {
    pub zero_fill: u64,
    pub one_fill: u64,
    pub random: u64,
    pub repeating: u64,
    pub mixed: u64,
    pub unknown: u64,
}

impl ZoneSummary {
    pub fn from_detections<'a>(detections: impl IntoIterator<Item = &'a Detection>) -> Self {
        let mut summary = Self::default();
        for d in detections {
            summary.add(d.pattern_type);
        }
        summary
    }

    pub fn add(&mut self, pattern: PatternType) {
        *self.slot_mut(pattern) += 1;
    }

    pub fn get(&self, pattern: PatternType) -> u64 {
        match pattern {
            PatternType::ZeroFill => self.zero_fill,
            PatternType::OneFill => self.one_fill,
            PatternType::Random => self.random,
            PatternType::Repeating => self.repeating,
            PatternType::Mixed => self.mixed,
            PatternType::Unknown => self.unknown,
        }
    }

    pub fn total(&self) -> u64 {
        self.zero_fill + self.one_fill + self.random + self.repeating + self.mixed + self.unknown
    }

    /// Share of all chunks with `pattern`; 0.0 for an empty summary.
    pub fn share(&self, pattern: PatternType) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.get(pattern) as f64 / total as f64,
        }
    }

    /// Most frequent classified pattern type, ties broken by precedence.
    pub fn dominant(&self) -> Option<PatternType> {
        let mut best: Option<(PatternType, u64)> = None;
        for p in PatternType::PRECEDENCE {
            if p == PatternType::Unknown {
                continue;
            }
            let count = self.get(p);
            if count > 0 && best.is_none_or(|(_, c)| count > c) {
                best = Some((p, count));
            }
        }
        best.map(|(p, _)| p)
    }

    fn slot_mut(&mut self, pattern: PatternType) -> &mut u64 {
        match pattern {
            PatternType::ZeroFill => &mut self.zero_fill,
            PatternType::OneFill => &mut self.one_fill,
            PatternType::Random => &mut self.random,
            PatternType::Repeating => &mut self.repeating,
            PatternType::Mixed => &mut self.mixed,
            PatternType::Unknown => &mut self.unknown,
        }
    }
}

/// A contiguous run of chunks sharing one pattern type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub pattern_type: PatternType,
    pub start_offset: u64,
    /// Exclusive end offset.
    pub end_offset: u64,
    pub chunks: u64,
}

/// Whole-target verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmVerdict {
    pub algorithm: WipeAlgorithm,
    pub algorithm_label: String,
    /// Every algorithm id consistent with the observed signature.
    pub candidates: Vec<String>,
    pub pass_count_estimate: u32,
    pub confidence: f64,
    pub zone_summary: ZoneSummary,
    pub zones: Vec<Zone>,
    /// Population variance of entropies of detections above the confidence floor.
    pub entropy_variance: f64,
    pub chunks_analyzed: u64,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Read-only view over one target's detections.
#[derive(Debug, Clone)]
pub struct SequenceAggregator<'a> {
    detections: Vec<&'a Detection>,
    config: DetectorConfig,
}

impl<'a> SequenceAggregator<'a> {
    /// Detections may arrive in any order; zones are built in offset order.
    pub fn new(detections: &'a [Detection], config: DetectorConfig) -> Self {
        let mut detections: Vec<&'a Detection> = detections.iter().collect();
        detections.sort_by_key(|d| d.offset);
        Self { detections, config }
    }

    pub fn verdict(&self) -> AlgorithmVerdict {
        let cfg = &self.config;
        let summary = ZoneSummary::from_detections(self.detections.iter().copied());
        let zones = self.zones();
        let confident: Vec<&Detection> = self
            .detections
            .iter()
            .copied()
            .filter(|d| d.confidence > cfg.zone_confidence_floor)
            .collect();
        let entropies: Vec<f64> = confident.iter().map(|d| d.entropy).collect();
        let variance = population_variance(&entropies);

        let non_trivial = |p: PatternType| {
            p != PatternType::Unknown
                && summary.get(p) > 0
                && summary.share(p) >= cfg.min_zone_share
        };
        let zone_types: Vec<PatternType> = PatternType::PRECEDENCE
            .into_iter()
            .filter(|&p| non_trivial(p))
            .collect();
        let passes: Vec<PatternType> = [
            PatternType::ZeroFill,
            PatternType::OneFill,
            PatternType::Random,
        ]
        .into_iter()
        .filter(|&p| non_trivial(p))
        .collect();
        let high_variance = variance > cfg.multi_pass_variance;

        let decision = if confident.iter().all(|d| !d.is_classified()) {
            None
        } else if summary.share(PatternType::ZeroFill) >= cfg.fill_fraction {
            Some((WipeAlgorithm::ZeroFill, vec![PatternType::ZeroFill]))
        } else if summary.share(PatternType::OneFill) >= cfg.fill_fraction {
            Some((WipeAlgorithm::OneFill, vec![PatternType::OneFill]))
        } else if summary.share(PatternType::Random) >= cfg.random_fraction
            && variance <= cfg.random_variance_max
        {
            Some((WipeAlgorithm::RandomFill, vec![PatternType::Random]))
        } else if zone_types.len() >= cfg.gutmann_min_zones && high_variance {
            Some((WipeAlgorithm::Gutmann35, zone_types.clone()))
        } else if passes.len() == 3 && high_variance {
            Some((WipeAlgorithm::Dod7PassOrRcmpTssit, passes))
        } else if passes.len() >= 2 {
            Some((WipeAlgorithm::Dod3Pass, passes))
        } else if summary.dominant() == Some(PatternType::Repeating) {
            Some((WipeAlgorithm::AlternatingPattern, vec![PatternType::Repeating]))
        } else {
            Some((WipeAlgorithm::MixedUnknown, Vec::new()))
        };

        let Some((algorithm, contributors)) = decision else {
            log::debug!(
                "no confident detections among {} chunks; unclassified",
                self.detections.len()
            );
            return AlgorithmVerdict {
                algorithm: WipeAlgorithm::Unclassified,
                algorithm_label: WipeAlgorithm::Unclassified.label().to_string(),
                candidates: Vec::new(),
                pass_count_estimate: 0,
                confidence: 0.0,
                zone_summary: summary,
                zones,
                entropy_variance: variance,
                chunks_analyzed: self.detections.len() as u64,
            };
        };

        let mut confidence = if algorithm == WipeAlgorithm::MixedUnknown {
            mean_confidence(confident.iter().copied()) * cfg.mixed_verdict_scale
        } else {
            mean_confidence(
                self.detections
                    .iter()
                    .copied()
                    .filter(|d| contributors.contains(&d.pattern_type)),
            )
        };
        if cfg.near_variance_boundary(variance) {
            confidence *= cfg.boundary_penalty;
        }

        let pass_count_estimate = if algorithm == WipeAlgorithm::MixedUnknown {
            (zone_types.len() as u32).max(1)
        } else {
            algorithm.nominal_passes()
        };

        log::debug!(
            "verdict {:?}: variance={variance:.4}, zone types={}, confidence={confidence:.1}",
            algorithm,
            zone_types.len()
        );

        AlgorithmVerdict {
            algorithm,
            algorithm_label: algorithm.label().to_string(),
            candidates: algorithm
                .candidates()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            pass_count_estimate,
            confidence: confidence.clamp(0.0, 100.0),
            zone_summary: summary,
            zones,
            entropy_variance: variance,
            chunks_analyzed: self.detections.len() as u64,
        }
    }

    /// Contiguous runs of equal pattern type, in offset order.
    pub fn zones(&self) -> Vec<Zone> {
        let mut zones: Vec<Zone> = Vec::new();
        for d in &self.detections {
            match zones.last_mut() {
                Some(zone) if zone.pattern_type == d.pattern_type => {
                    zone.end_offset = zone.end_offset.max(d.end_offset());
                    zone.chunks += 1;
                }
                _ => zones.push(Zone {
                    pattern_type: d.pattern_type,
                    start_offset: d.offset,
                    end_offset: d.end_offset(),
                    chunks: 1,
                }),
            }
        }
        zones
    }
}

/// Aggregate one target's detections into a verdict.
pub fn aggregate(detections: &[Detection], config: &DetectorConfig) -> AlgorithmVerdict {
    SequenceAggregator::new(detections, *config).verdict()
}

fn mean_confidence<'a>(detections: impl Iterator<Item = &'a Detection>) -> f64 {
    let (sum, n) = detections.fold((0.0, 0usize), |(s, n), d| (s + d.confidence, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
