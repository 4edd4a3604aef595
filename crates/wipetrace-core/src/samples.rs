//! Synthetic wipe images for demos and tests.
//!
//! Every generator is deterministic for a given seed. Multi-section images
//! align their sections to [`DEFAULT_CHUNK_SIZE`] so that a scan with the
//! default chunk size sees clean zone boundaries.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::config::DEFAULT_CHUNK_SIZE;

/// Default image size written by `generate_all`.
pub const DEFAULT_SAMPLE_SIZE: usize = 1024 * 1024;

/// Gutmann passes 5-31 use fixed byte patterns; a few representative ones.
const GUTMANN_PATTERNS: [&[u8]; 6] = [
    &[0x55],
    &[0xAA],
    &[0x92, 0x49, 0x24],
    &[0x6D, 0xB6, 0xDB],
    &[0x11],
    &[0xB6, 0xDB, 0x6D],
];

const WORDS: [&str; 24] = [
    "invoice", "report", "the", "customer", "and", "quarterly", "meeting", "of",
    "budget", "draft", "to", "please", "review", "attached", "for", "notes",
    "project", "a", "schedule", "with", "final", "data", "in", "summary",
];

/// Kinds of sample image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    /// Plain document text; no wipe signature.
    Clean,
    ZeroFill,
    OneFill,
    RandomFill,
    /// A DoD 3-pass wipe (00, FF, random) whose final random pass stopped
    /// after two thirds, so the tail still holds the 0xFF pass.
    ///
    /// Not three clean thirds of 00, FF and random: that layout has three
    /// pass types with high entropy variance, which reads as a 7-pass wipe.
    Dod3Pass,
    /// Seven sections `00, FF, random, 00, FF, random, 00`.
    Dod7Pass,
    /// Tiled `AA 55`.
    Alternating,
    /// Tiled `haha-`.
    NoveltyHaha,
    /// Quarters of clean text, zeros, random and `AA 55`.
    Mixed,
    /// Ten sections cycling random data and Gutmann fixed patterns.
    GutmannSim,
}

impl SampleKind {
    pub const ALL: [SampleKind; 10] = [
        SampleKind::Clean,
        SampleKind::ZeroFill,
        SampleKind::OneFill,
        SampleKind::RandomFill,
        SampleKind::Dod3Pass,
        SampleKind::Dod7Pass,
        SampleKind::Alternating,
        SampleKind::NoveltyHaha,
        SampleKind::Mixed,
        SampleKind::GutmannSim,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SampleKind::Clean => "clean",
            SampleKind::ZeroFill => "zero_fill",
            SampleKind::OneFill => "one_fill",
            SampleKind::RandomFill => "random_fill",
            SampleKind::Dod3Pass => "dod_3pass",
            SampleKind::Dod7Pass => "dod_7pass",
            SampleKind::Alternating => "alternating",
            SampleKind::NoveltyHaha => "novelty_haha",
            SampleKind::Mixed => "mixed",
            SampleKind::GutmannSim => "gutmann_sim",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.bin", self.name())
    }
}

/// Generate one sample image of exactly `size` bytes.
pub fn generate(kind: SampleKind, size: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(size);
    match kind {
        SampleKind::Clean => push_text(&mut out, &mut rng, size),
        SampleKind::ZeroFill => out.resize(size, 0x00),
        SampleKind::OneFill => out.resize(size, 0xFF),
        SampleKind::RandomFill => push_random(&mut out, &mut rng, size),
        SampleKind::Dod3Pass => {
            let tail = section_len(size, 3);
            push_random(&mut out, &mut rng, size - tail);
            push_fill(&mut out, 0xFF, tail);
        }
        SampleKind::Dod7Pass => {
            let sec = section_len(size, 7);
            for pass in 0..7 {
                match pass % 3 {
                    0 => push_fill(&mut out, 0x00, sec),
                    1 => push_fill(&mut out, 0xFF, sec),
                    _ => push_random(&mut out, &mut rng, sec),
                }
            }
            let rest = size - out.len();
            push_random(&mut out, &mut rng, rest);
        }
        SampleKind::Alternating => push_tiled(&mut out, &[0xAA, 0x55], size),
        SampleKind::NoveltyHaha => push_tiled(&mut out, b"haha-", size),
        SampleKind::Mixed => {
            let sec = section_len(size, 4);
            push_text(&mut out, &mut rng, sec);
            push_fill(&mut out, 0x00, sec);
            push_random(&mut out, &mut rng, sec);
            let rest = size - out.len();
            push_tiled(&mut out, &[0xAA, 0x55], rest);
        }
        SampleKind::GutmannSim => {
            let sec = section_len(size, 10);
            let mut patterns = GUTMANN_PATTERNS.iter().cycle();
            for i in 0..10 {
                match i % 4 {
                    0 => push_random(&mut out, &mut rng, sec),
                    1 => push_fill(&mut out, 0x00, sec),
                    2 => push_fill(&mut out, 0xFF, sec),
                    _ => {
                        let pattern = patterns.next().copied().unwrap_or(&[0x55]);
                        push_tiled(&mut out, pattern, sec);
                    }
                }
            }
            let rest = size - out.len();
            push_random(&mut out, &mut rng, rest);
        }
    }
    out
}

/// Every sample kind as `(file_name, bytes)`.
pub fn generate_all(size: usize, seed: u64) -> Vec<(String, Vec<u8>)> {
    SampleKind::ALL
        .iter()
        .map(|&kind| (kind.file_name(), generate(kind, size, seed)))
        .collect()
}

/// `size / parts`, rounded down to a chunk boundary when that leaves
/// something.
fn section_len(size: usize, parts: usize) -> usize {
    let raw = size / parts;
    let aligned = raw / DEFAULT_CHUNK_SIZE * DEFAULT_CHUNK_SIZE;
    if aligned == 0 { raw } else { aligned }
}

fn push_fill(out: &mut Vec<u8>, byte: u8, n: usize) {
    out.resize(out.len() + n, byte);
}

fn push_random(out: &mut Vec<u8>, rng: &mut StdRng, n: usize) {
    let start = out.len();
    out.resize(start + n, 0);
    rng.fill_bytes(&mut out[start..]);
}

fn push_tiled(out: &mut Vec<u8>, pattern: &[u8], n: usize) {
    out.extend(pattern.iter().copied().cycle().take(n));
}

/// Space separated words with occasional line breaks.
fn push_text(out: &mut Vec<u8>, rng: &mut StdRng, n: usize) {
    let end = out.len() + n;
    while out.len() < end {
        let word = WORDS[rng.random_range(0..WORDS.len())].as_bytes();
        out.extend_from_slice(word);
        out.push(if rng.random_range(0..12) == 0 { b'\n' } else { b' ' });
    }
    out.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_sizes() {
        for kind in SampleKind::ALL {
            for size in [0, 1, 1000, 64 * 1024 + 3] {
                assert_eq!(generate(kind, size, 1).len(), size, "{kind:?} {size}");
            }
        }
    }

    #[test]
    fn test_deterministic_per_seed() {
        for kind in SampleKind::ALL {
            assert_eq!(generate(kind, 8192, 42), generate(kind, 8192, 42));
        }
        assert_ne!(
            generate(SampleKind::RandomFill, 4096, 1),
            generate(SampleKind::RandomFill, 4096, 2)
        );
    }

    #[test]
    fn test_dod7_sections_are_chunk_aligned() {
        let data = generate(SampleKind::Dod7Pass, 1024 * 1024, 7);
        let sec = section_len(1024 * 1024, 7);
        assert_eq!(sec % DEFAULT_CHUNK_SIZE, 0);
        assert!(data[..sec].iter().all(|&b| b == 0x00));
        assert!(data[sec..2 * sec].iter().all(|&b| b == 0xFF));
        assert!(data[6 * sec..7 * sec].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_dod3_keeps_one_fill_tail() {
        let size = 96 * 1024;
        let data = generate(SampleKind::Dod3Pass, size, 7);
        let tail = section_len(size, 3);
        assert!(data[size - tail..].iter().all(|&b| b == 0xFF));
        assert!(data[..size - tail].iter().any(|&b| b != 0xFF && b != 0x00));
    }

    #[test]
    fn test_clean_is_text() {
        let data = generate(SampleKind::Clean, 4096, 3);
        assert!(data.iter().all(|b| b.is_ascii_lowercase() || *b == b' ' || *b == b'\n'));
    }

    #[test]
    fn test_generate_all_names() {
        let all = generate_all(4096, 0);
        assert_eq!(all.len(), 10);
        assert_eq!(all[0].0, "clean.bin");
        assert!(all.iter().any(|(name, _)| name == "gutmann_sim.bin"));
        assert!(all.iter().all(|(_, bytes)| bytes.len() == 4096));
    }
}
