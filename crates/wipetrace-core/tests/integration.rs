//! Integration tests for wipetrace-core.
//!
//! These tests run generated sample images through the full pipeline:
//! sample file → FileSource → Scanner → verdict → report export.

use wipetrace_core::samples::generate;
use wipetrace_core::{
    BatchReport, DetectorConfig, FileSource, PatternType, SampleKind, ScanMode, ScanReport,
    Scanner, SkipAllocated, SliceSource, SlackSource, WipeAlgorithm, generate_all,
    load_config_from_path,
};

const IMAGE_SIZE: usize = 256 * 1024;
const SEED: u64 = 0x5eed;

fn scan_sample(kind: SampleKind) -> wipetrace_core::ScanOutcome {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join(kind.file_name());
    std::fs::write(&path, generate(kind, IMAGE_SIZE, SEED)).unwrap();
    let mut source = FileSource::open(&path, 4096).unwrap();
    Scanner::default().scan(&mut source, |_| {})
}

#[test]
fn sample_verdicts_match_their_wipe_method() {
    let expected = [
        (SampleKind::Clean, WipeAlgorithm::Unclassified),
        (SampleKind::ZeroFill, WipeAlgorithm::ZeroFill),
        (SampleKind::OneFill, WipeAlgorithm::OneFill),
        (SampleKind::RandomFill, WipeAlgorithm::RandomFill),
        (SampleKind::Dod3Pass, WipeAlgorithm::Dod3Pass),
        (SampleKind::Dod7Pass, WipeAlgorithm::Dod7PassOrRcmpTssit),
        (SampleKind::Alternating, WipeAlgorithm::AlternatingPattern),
        (SampleKind::NoveltyHaha, WipeAlgorithm::AlternatingPattern),
        (SampleKind::GutmannSim, WipeAlgorithm::Gutmann35),
    ];
    for (kind, algorithm) in expected {
        let outcome = scan_sample(kind);
        assert_eq!(
            outcome.verdict.algorithm, algorithm,
            "{}: got {:?} ({:?})",
            kind.name(),
            outcome.verdict.algorithm,
            outcome.verdict.zone_summary
        );
        assert_eq!(outcome.chunks_scanned, (IMAGE_SIZE / 4096) as u64);
    }
}

#[test]
fn zero_fill_image_is_fully_confident() {
    let outcome = scan_sample(SampleKind::ZeroFill);
    assert_eq!(outcome.verdict.algorithm_label, "Zero-fill (0x00)");
    assert_eq!(outcome.verdict.pass_count_estimate, 1);
    assert_eq!(outcome.verdict.confidence, 100.0);
    assert_eq!(outcome.verdict.zones.len(), 1);
}

#[test]
fn dod7_image_reports_both_candidates() {
    let outcome = scan_sample(SampleKind::Dod7Pass);
    let v = &outcome.verdict;
    assert_eq!(v.pass_count_estimate, 7);
    assert_eq!(v.candidates, vec!["dod_5220_7pass", "rcmp_tssit_7pass"]);
    assert!(v.entropy_variance > 2.0);
    // 00 FF RR 00 FF RR 00 plus the random remainder.
    let kinds: Vec<PatternType> = v.zones.iter().map(|z| z.pattern_type).collect();
    assert_eq!(
        kinds,
        vec![
            PatternType::ZeroFill,
            PatternType::OneFill,
            PatternType::Random,
            PatternType::ZeroFill,
            PatternType::OneFill,
            PatternType::Random,
            PatternType::ZeroFill,
            PatternType::Random,
        ]
    );
}

#[test]
fn novelty_pattern_period_is_reported() {
    let outcome = scan_sample(SampleKind::NoveltyHaha);
    let first = &outcome.detections[0];
    assert_eq!(first.pattern_type, PatternType::Repeating);
    assert_eq!(first.repeat_period, Some(5));
    assert_eq!(first.repeat_pattern.as_deref(), Some("686168612d"));
}

#[test]
fn clean_image_has_no_visible_detections() {
    let outcome = scan_sample(SampleKind::Clean);
    let report = ScanReport::new("clean.bin", ScanMode::Raw, 4096, outcome);
    assert_eq!(report.detections_found, 0);
    assert_eq!(report.visible(40.0).count(), 0);
    assert_eq!(report.verdict.confidence, 0.0);
}

#[test]
fn parallel_scan_of_image_matches_sequential() {
    let data = generate(SampleKind::GutmannSim, IMAGE_SIZE, SEED);
    let mut seq_source = SliceSource::new(data.clone(), 4096).unwrap();
    let seq = Scanner::default().scan(&mut seq_source, |_| {});
    let mut par_source = SliceSource::new(data, 4096).unwrap();
    let par = Scanner::default()
        .with_threads(3)
        .scan(&mut par_source, |_| {});
    assert_eq!(seq.detections, par.detections);
    assert_eq!(seq.verdict.algorithm, par.verdict.algorithm);
    assert_eq!(seq.sha256, par.sha256);
}

#[test]
fn skip_allocated_drops_file_headers() {
    let mut data = generate(SampleKind::ZeroFill, 16 * 4096, SEED);
    data[4096..4100].copy_from_slice(b"%PDF");
    data[8192..8194].copy_from_slice(b"PK");
    let mut source = SkipAllocated::new(SliceSource::new(data, 4096).unwrap());
    let outcome = Scanner::default().scan(&mut source, |_| {});
    assert_eq!(outcome.chunks_scanned, 14);
    assert_eq!(source.skipped(), 2);
    assert_eq!(outcome.verdict.algorithm, WipeAlgorithm::ZeroFill);
}

#[test]
fn slack_scan_classifies_file_tails() {
    let tmp = tempfile::tempdir().unwrap();
    // Each file is one partial block of zeros; its readable tail is all zeros.
    for i in 0..5 {
        std::fs::write(tmp.path().join(format!("doc{i}.txt")), vec![0u8; 300]).unwrap();
    }
    let mut source = SlackSource::with_block_size(tmp.path(), 512).unwrap();
    let outcome = Scanner::default().scan(&mut source, |_| {});
    assert_eq!(outcome.chunks_scanned, 5);
    assert!(outcome.detections.iter().all(|d| d.source.is_some()));
    assert!(
        outcome
            .detections
            .iter()
            .all(|d| d.pattern_type == PatternType::ZeroFill)
    );
}

#[test]
fn slack_scan_marks_report_partial_when_a_file_vanishes() {
    let tmp = tempfile::tempdir().unwrap();
    for i in 0..3 {
        std::fs::write(tmp.path().join(format!("doc{i}.txt")), vec![0u8; 300]).unwrap();
    }
    let mut source = SlackSource::with_block_size(tmp.path(), 512).unwrap();
    std::fs::remove_file(tmp.path().join("doc1.txt")).unwrap();

    let outcome = Scanner::default().scan(&mut source, |_| {});
    assert_eq!(outcome.chunks_scanned, 2);
    assert_eq!(outcome.gaps.len(), 1);
    assert!(outcome.gaps[0].source.as_deref().unwrap().ends_with("doc1.txt"));

    let report = ScanReport::new("slack", ScanMode::Slack, 512, outcome);
    assert!(report.partial);
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("doc1.txt"));
}

#[test]
fn batch_report_over_generated_directory() {
    let tmp = tempfile::tempdir().unwrap();
    for (name, bytes) in generate_all(64 * 1024, SEED) {
        std::fs::write(tmp.path().join(name), bytes).unwrap();
    }

    let mut paths: Vec<_> = std::fs::read_dir(tmp.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "bin"))
        .collect();
    paths.sort();
    assert_eq!(paths.len(), 10);

    let scanner = Scanner::default();
    let reports: Vec<ScanReport> = paths
        .iter()
        .map(|p| {
            let mut source = FileSource::open(p, 4096).unwrap();
            let outcome = scanner.scan(&mut source, |_| {});
            ScanReport::new(p.display().to_string(), ScanMode::Raw, 4096, outcome)
        })
        .collect();
    let batch = BatchReport::new(reports);

    let json = tmp.path().join("batch.json");
    let csv = tmp.path().join("batch.csv");
    batch.write_json(&json, 40.0).unwrap();
    batch.write_csv(&csv, 40.0).unwrap();

    let parsed: BatchReport =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(parsed.targets.len(), 10);
    let csv_text = std::fs::read_to_string(&csv).unwrap();
    assert!(csv_text.starts_with("offset,size,pattern_type,confidence"));
}

#[test]
fn threshold_file_overrides_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("thresholds.json");
    // A pure random image still meets a 100% random share.
    std::fs::write(&path, r#"{ "random_fraction": 1.0 }"#).unwrap();
    let config = load_config_from_path(&path).unwrap();
    assert_eq!(config.random_fraction, 1.0);
    assert_eq!(config.fill_fraction, DetectorConfig::default().fill_fraction);

    let data = generate(SampleKind::RandomFill, IMAGE_SIZE, SEED);
    let mut source = SliceSource::new(data, 4096).unwrap();
    let outcome = Scanner::new(config).scan(&mut source, |_| {});
    assert_eq!(outcome.verdict.algorithm, WipeAlgorithm::RandomFill);
}
