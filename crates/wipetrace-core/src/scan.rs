//! Scan driver.
//!
//! [`Scanner`] pulls chunks from a [`ChunkSource`], classifies them
//! (sequentially or in batches on scoped worker threads), records unreadable
//! regions as gaps, hashes every byte read and finally runs the
//! [`SequenceAggregator`](crate::aggregator::SequenceAggregator) over the
//! detections in offset order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::aggregator::{AlgorithmVerdict, aggregate};
use crate::classifier::ChunkClassifier;
use crate::config::DetectorConfig;
use crate::detection::{Chunk, Detection};
use crate::error::ScanError;
use crate::patterns::hex_encode;
use crate::source::ChunkSource;

/// Chunks handed to each worker per batch.
const CHUNKS_PER_THREAD: usize = 64;

/// A region the source could not read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadGap {
    pub offset: u64,
    pub length: u64,
    pub message: String,
    /// Unreadable file, for multi-file scans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Progress snapshot passed to the scan callback after every batch.
#[derive(Debug, Clone, Copy)]
pub struct ScanProgress<'a> {
    pub bytes_scanned: u64,
    pub total_bytes: Option<u64>,
    pub chunks_scanned: u64,
    /// Detections produced since the previous callback, in offset order.
    pub new_detections: &'a [Detection],
}

impl ScanProgress<'_> {
    /// Completion in `[0, 1]`, when the source size is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(1.0),
            Some(total) => Some((self.bytes_scanned as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// Everything a scan produced.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Sorted by offset.
    pub detections: Vec<Detection>,
    pub gaps: Vec<ReadGap>,
    pub bytes_scanned: u64,
    pub chunks_scanned: u64,
    /// Hex SHA-256 of every byte read, in read order.
    pub sha256: String,
    pub cancelled: bool,
    pub verdict: AlgorithmVerdict,
    pub elapsed_secs: f64,
}

impl ScanOutcome {
    /// True when part of the target could not be read.
    pub fn partial(&self) -> bool {
        !self.gaps.is_empty()
    }
}

/// Drives a chunk source through the classifier and aggregator.
#[derive(Debug, Clone)]
pub struct Scanner {
    classifier: ChunkClassifier,
    threads: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl Scanner {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            classifier: ChunkClassifier::new(config),
            threads: 1,
            cancel: None,
        }
    }

    /// Classify on `threads` scoped workers; 0 and 1 both mean sequential.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Stop between batches once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        self.classifier.config()
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Scan `source` to exhaustion (or cancellation).
    pub fn scan<S, F>(&self, source: &mut S, mut progress: F) -> ScanOutcome
    where
        S: ChunkSource + ?Sized,
        F: FnMut(ScanProgress<'_>),
    {
        let start = Instant::now();
        let total_bytes = source.total_bytes();
        let batch_size = if self.threads > 1 {
            self.threads * CHUNKS_PER_THREAD
        } else {
            1
        };
        log::info!(
            "scan started: {} bytes, {} thread(s)",
            total_bytes.map_or_else(|| "unknown".to_string(), |n| n.to_string()),
            self.threads
        );

        let mut hasher = Sha256::new();
        let mut detections: Vec<Detection> = Vec::new();
        let mut gaps: Vec<ReadGap> = Vec::new();
        let mut bytes_scanned = 0u64;
        let mut chunks_scanned = 0u64;
        let mut next_offset = 0u64;
        let mut cancelled = false;
        let mut exhausted = false;

        while !exhausted {
            if self.is_cancelled() {
                cancelled = true;
                log::info!("scan cancelled after {chunks_scanned} chunks");
                break;
            }

            let mut batch: Vec<Chunk> = Vec::with_capacity(batch_size);
            while batch.len() < batch_size {
                match source.next_chunk() {
                    None => {
                        exhausted = true;
                        break;
                    }
                    Some(Ok(chunk)) => {
                        hasher.update(&chunk.data);
                        bytes_scanned += chunk.len() as u64;
                        next_offset = chunk.offset + chunk.len() as u64;
                        batch.push(chunk);
                    }
                    Some(Err(e)) => {
                        let gap = match &e {
                            ScanError::Read {
                                offset,
                                length,
                                source: err,
                            } => ReadGap {
                                offset: *offset,
                                length: *length,
                                message: err.to_string(),
                                source: None,
                            },
                            ScanError::FileRead {
                                path,
                                length,
                                source: err,
                            } => ReadGap {
                                offset: 0,
                                length: *length,
                                message: err.to_string(),
                                source: Some(path.display().to_string()),
                            },
                            other => ReadGap {
                                offset: next_offset,
                                length: 0,
                                message: other.to_string(),
                                source: None,
                            },
                        };
                        log::warn!("{e}");
                        if gap.source.is_none() {
                            next_offset = gap.offset + gap.length;
                        }
                        gaps.push(gap);
                    }
                }
            }
            if batch.is_empty() {
                continue;
            }

            let mut classified = self.classify_batch(&batch);
            classified.sort_by_key(|d| d.offset);
            chunks_scanned += classified.len() as u64;
            progress(ScanProgress {
                bytes_scanned,
                total_bytes,
                chunks_scanned,
                new_detections: &classified,
            });
            detections.extend(classified);
        }

        detections.sort_by_key(|d| d.offset);
        let verdict = aggregate(&detections, self.config());
        let elapsed_secs = start.elapsed().as_secs_f64();
        log::info!(
            "scan finished: {chunks_scanned} chunks, {} gaps, verdict {:?} in {elapsed_secs:.2}s",
            gaps.len(),
            verdict.algorithm
        );

        ScanOutcome {
            detections,
            gaps,
            bytes_scanned,
            chunks_scanned,
            sha256: hex_encode(&hasher.finalize()),
            cancelled,
            verdict,
            elapsed_secs,
        }
    }

    fn classify_batch(&self, batch: &[Chunk]) -> Vec<Detection> {
        if self.threads <= 1 || batch.len() <= 1 {
            return batch.iter().map(|c| self.classifier.classify(c)).collect();
        }

        let per_worker = batch.len().div_ceil(self.threads);
        let classifier = &self.classifier;
        std::thread::scope(|s| {
            let handles: Vec<_> = batch
                .chunks(per_worker)
                .map(|slice| {
                    s.spawn(move || {
                        slice
                            .iter()
                            .map(|c| classifier.classify(c))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            let mut out = Vec::with_capacity(batch.len());
            for handle in handles {
                match handle.join() {
                    Ok(part) => out.extend(part),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            out
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;

    use super::*;
    use crate::aggregator::WipeAlgorithm;
    use crate::detection::PatternType;
    use crate::source::SliceSource;

    fn random_data(n: usize, seed: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(n);
        let mut state: u64 = seed;
        for _ in 0..n {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            data.push((state >> 33) as u8);
        }
        data
    }

    /// Scripted source for gap handling.
    struct Scripted(VecDeque<Result<Chunk, ScanError>>);

    impl ChunkSource for Scripted {
        fn next_chunk(&mut self) -> Option<Result<Chunk, ScanError>> {
            self.0.pop_front()
        }
    }

    #[test]
    fn test_scan_zero_image() {
        let mut src = SliceSource::new(vec![0u8; 64 * 1024], 4096).unwrap();
        let outcome = Scanner::default().scan(&mut src, |_| {});
        assert_eq!(outcome.chunks_scanned, 16);
        assert_eq!(outcome.bytes_scanned, 64 * 1024);
        assert_eq!(outcome.detections.len(), 16);
        assert!(
            outcome
                .detections
                .iter()
                .all(|d| d.pattern_type == PatternType::ZeroFill)
        );
        assert_eq!(outcome.verdict.algorithm, WipeAlgorithm::ZeroFill);
        assert!(!outcome.partial());
        assert!(!outcome.cancelled);
    }

    #[test]
    fn test_sha256_of_bytes_read() {
        let mut src = SliceSource::new(b"abc".to_vec(), 2).unwrap();
        let outcome = Scanner::default().scan(&mut src, |_| {});
        assert_eq!(
            outcome.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_empty_source() {
        let mut src = SliceSource::new(Vec::new(), 4096).unwrap();
        let outcome = Scanner::default().scan(&mut src, |_| {});
        assert_eq!(outcome.chunks_scanned, 0);
        assert!(outcome.detections.is_empty());
        assert_eq!(outcome.verdict.algorithm, WipeAlgorithm::Unclassified);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut data = vec![0u8; 40 * 4096];
        data.extend(random_data(40 * 4096, 3));
        data.extend(vec![0xFFu8; 40 * 4096]);
        data.extend(random_data(1000, 4));

        let mut seq_src = SliceSource::new(data.clone(), 4096).unwrap();
        let seq = Scanner::default().scan(&mut seq_src, |_| {});

        let mut par_src = SliceSource::new(data, 4096).unwrap();
        let par = Scanner::default()
            .with_threads(4)
            .scan(&mut par_src, |_| {});

        assert_eq!(seq.detections, par.detections);
        assert_eq!(seq.sha256, par.sha256);
        assert_eq!(seq.verdict.algorithm, par.verdict.algorithm);
        assert!(
            par.detections
                .windows(2)
                .all(|w| w[0].offset < w[1].offset)
        );
    }

    #[test]
    fn test_progress_reports_every_detection() {
        let mut src = SliceSource::new(vec![0xAAu8; 10 * 4096], 4096).unwrap();
        let mut seen = 0usize;
        let mut last_fraction = 0.0;
        let outcome = Scanner::default().scan(&mut src, |p| {
            seen += p.new_detections.len();
            last_fraction = p.fraction().unwrap();
        });
        assert_eq!(seen, outcome.detections.len());
        assert!((last_fraction - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_read_gap_recorded_and_scan_continues() {
        let items = VecDeque::from(vec![
            Ok(Chunk::new(0, vec![0u8; 4096])),
            Err(ScanError::Read {
                offset: 4096,
                length: 4096,
                source: io::Error::other("bad sector"),
            }),
            Ok(Chunk::new(8192, vec![0u8; 4096])),
        ]);
        let outcome = Scanner::default().scan(&mut Scripted(items), |_| {});
        assert_eq!(outcome.chunks_scanned, 2);
        assert!(outcome.partial());
        assert_eq!(outcome.gaps.len(), 1);
        assert_eq!(outcome.gaps[0].offset, 4096);
        assert_eq!(outcome.gaps[0].length, 4096);
        assert!(outcome.gaps[0].message.contains("bad sector"));
        assert_eq!(outcome.verdict.algorithm, WipeAlgorithm::ZeroFill);
    }

    #[test]
    fn test_file_read_gap_carries_path() {
        let items = VecDeque::from(vec![
            Err(ScanError::FileRead {
                path: "/evidence/locked.doc".into(),
                length: 4096,
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            }),
            Ok(Chunk::new(300, vec![0u8; 212]).with_source("/evidence/notes.txt")),
        ]);
        let outcome = Scanner::default().scan(&mut Scripted(items), |_| {});
        assert_eq!(outcome.chunks_scanned, 1);
        assert!(outcome.partial());
        assert_eq!(outcome.gaps[0].source.as_deref(), Some("/evidence/locked.doc"));
        assert_eq!(outcome.gaps[0].length, 4096);
        assert!(outcome.gaps[0].message.contains("denied"));
    }

    #[test]
    fn test_unvalidated_config_scans_without_panicking() {
        let cfg = DetectorConfig {
            mixed_block_size: 0,
            random_entropy_high: 8.0,
            ..Default::default()
        };
        let mut data = vec![0u8; 8 * 4096];
        data.extend(random_data(8 * 4096, 3));
        let mut src = SliceSource::new(data, 4096).unwrap();
        let outcome = Scanner::new(cfg).with_threads(2).scan(&mut src, |_| {});
        assert_eq!(outcome.chunks_scanned, 16);
        assert!(outcome.detections.iter().all(|d| d.mixed_confidence == 0.0));
        assert!(outcome.verdict.confidence.is_finite());
    }

    #[test]
    fn test_preset_cancel_flag_yields_empty_outcome() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut src = SliceSource::new(vec![0u8; 8 * 4096], 4096).unwrap();
        let outcome = Scanner::default()
            .with_cancel_flag(flag)
            .scan(&mut src, |_| {});
        assert!(outcome.cancelled);
        assert_eq!(outcome.chunks_scanned, 0);
        assert!(outcome.detections.is_empty());
        assert_eq!(outcome.verdict.algorithm, WipeAlgorithm::Unclassified);
    }

    #[test]
    fn test_cancel_mid_scan_keeps_partial_results() {
        let flag = Arc::new(AtomicBool::new(false));
        let trigger = Arc::clone(&flag);
        let mut src = SliceSource::new(vec![0u8; 8 * 4096], 4096).unwrap();
        let outcome = Scanner::default()
            .with_cancel_flag(flag)
            .scan(&mut src, |p| {
                if p.chunks_scanned == 3 {
                    trigger.store(true, Ordering::SeqCst);
                }
            });
        assert!(outcome.cancelled);
        assert_eq!(outcome.chunks_scanned, 3);
        assert_eq!(outcome.detections.len(), 3);
    }

    #[test]
    fn test_threads_floor() {
        assert_eq!(Scanner::default().with_threads(0).threads(), 1);
    }
}
