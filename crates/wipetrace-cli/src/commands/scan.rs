use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use wipetrace_core::{
    AlgorithmVerdict, BatchReport, ChunkSource, Detection, FileSource, ScanMode, ScanProgress,
    ScanReport, Scanner, SkipAllocated, SlackSource,
};

use super::{export_path, fail, format_size, load_config};

pub struct ScanCommandConfig<'a> {
    pub target: &'a str,
    pub chunk_size: usize,
    pub slack: bool,
    pub all: bool,
    pub skip_allocated: bool,
    /// `Some(None)` means "export with a default file name".
    pub json_path: Option<Option<&'a str>>,
    pub csv_path: Option<Option<&'a str>>,
    pub min_confidence: f64,
    pub threads: usize,
    pub config_path: Option<&'a str>,
    pub verbose: bool,
    pub quiet: bool,
}

pub fn run(cfg: ScanCommandConfig<'_>) {
    let target = Path::new(cfg.target);
    if !target.exists() {
        fail(format!("target not found: {}", cfg.target));
    }
    if cfg.chunk_size == 0 {
        fail("--chunk must be greater than 0");
    }
    if !(0.0..=100.0).contains(&cfg.min_confidence) {
        fail("--min-confidence must be within 0-100");
    }
    if (cfg.slack || cfg.all) && !target.is_dir() {
        fail(format!(
            "{} requires a directory target: {}",
            if cfg.slack { "--slack" } else { "--all" },
            cfg.target
        ));
    }
    if !cfg.slack && !cfg.all && target.is_dir() {
        fail(format!("{} is a directory; use --slack or --all", cfg.target));
    }

    let config = load_config(cfg.config_path);

    // Ctrl+C stops the scan between chunks; results so far are still reported.
    let cancel = Arc::new(AtomicBool::new(false));
    let c = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        c.store(true, Ordering::SeqCst);
    }) {
        log::warn!("cannot install Ctrl+C handler: {e}");
    }

    let scanner = Scanner::new(config)
        .with_threads(cfg.threads)
        .with_cancel_flag(cancel.clone());

    if !cfg.quiet {
        println!("wipetrace {}", wipetrace_core::VERSION);
    }

    if cfg.all {
        let files = list_bin_files(target);
        if files.is_empty() {
            fail(format!("no .bin files in {}", cfg.target));
        }
        let mut reports = Vec::with_capacity(files.len());
        for path in &files {
            if cancel.load(Ordering::SeqCst) {
                break;
            }
            let report = scan_file(&scanner, path, &cfg);
            print_report(&report, &cfg);
            reports.push(report);
        }
        if !cfg.quiet {
            print_batch_summary(&reports);
        }
        let batch = BatchReport::new(reports);
        export(
            &cfg,
            |p| batch.write_json(p, cfg.min_confidence),
            |p| batch.write_csv(p, cfg.min_confidence),
        );
        return;
    }

    let report = if cfg.slack {
        let mut source = match SlackSource::new(target) {
            Ok(s) => s,
            Err(e) => fail(e),
        };
        if !cfg.quiet {
            print_header(cfg.target, "slack space", source.block_size() as usize, None);
        }
        let outcome = run_scan(&scanner, &mut source, &cfg);
        ScanReport::new(cfg.target, ScanMode::Slack, source.block_size() as usize, outcome)
    } else {
        scan_file(&scanner, target, &cfg)
    };

    print_report(&report, &cfg);
    export(
        &cfg,
        |p| report.write_json(p, cfg.min_confidence),
        |p| report.write_csv(p, cfg.min_confidence),
    );
}

fn scan_file(scanner: &Scanner, path: &Path, cfg: &ScanCommandConfig<'_>) -> ScanReport {
    let file = match FileSource::open(path, cfg.chunk_size) {
        Ok(f) => f,
        Err(e) => fail(format!("cannot open {}: {e}", path.display())),
    };
    let total = file.total_bytes();
    let (mode, mut source): (ScanMode, Box<dyn ChunkSource>) = if cfg.skip_allocated {
        (ScanMode::SkipAllocated, Box::new(SkipAllocated::new(file)))
    } else {
        (ScanMode::Raw, Box::new(file))
    };

    if !cfg.quiet {
        let label = if cfg.skip_allocated {
            "raw, skipping allocated clusters"
        } else {
            "raw"
        };
        print_header(&path.display().to_string(), label, cfg.chunk_size, total);
    }
    let outcome = run_scan(scanner, &mut source, cfg);
    ScanReport::new(path.display().to_string(), mode, cfg.chunk_size, outcome)
}

fn run_scan<S: ChunkSource + ?Sized>(
    scanner: &Scanner,
    source: &mut S,
    cfg: &ScanCommandConfig<'_>,
) -> wipetrace_core::ScanOutcome {
    let mut bar = ProgressBar::new(!cfg.quiet && !cfg.verbose);
    let outcome = scanner.scan(source, |p: ScanProgress<'_>| {
        if cfg.verbose {
            for d in p.new_detections {
                if is_visible(d, cfg.min_confidence) {
                    println!("  {}", detection_row(d));
                }
            }
        }
        bar.update(&p);
    });
    bar.finish();
    outcome
}

fn is_visible(d: &Detection, min_confidence: f64) -> bool {
    d.is_classified() && d.confidence >= min_confidence
}

// ---------------------------------------------------------------------------
// Console output
// ---------------------------------------------------------------------------

fn print_header(target: &str, mode: &str, chunk_size: usize, total: Option<u64>) {
    println!();
    println!("  Target : {target}");
    println!("  Mode   : {mode}");
    println!("  Chunk  : {chunk_size} bytes");
    if let Some(total) = total {
        println!("  Size   : {}", format_size(total));
    }
    println!();
}

fn print_report(report: &ScanReport, cfg: &ScanCommandConfig<'_>) {
    let rule = "─".repeat(78);
    if !cfg.quiet {
        println!("{rule}");
        println!("  {}", if report.cancelled { "SCAN CANCELLED" } else { "SCAN COMPLETE" });
        println!("{rule}");
        println!("  Target      : {}", report.target);
        println!("  Regions     : {}", report.regions_analyzed);
        println!("  Wiped found : {}", report.detections_found);
        println!("  Scanned     : {}", format_size(report.bytes_scanned));
        println!("  SHA-256     : {}", report.sha256);
        println!("  Elapsed     : {:.2}s", report.elapsed_secs);
        if report.partial {
            println!("  Unreadable  : {} region(s), report is partial", report.gaps.len());
        }
        println!("{rule}");

        let visible: Vec<&Detection> = report.visible(cfg.min_confidence).collect();
        if visible.is_empty() {
            println!("  No detections at or above {:.0}% confidence.", cfg.min_confidence);
        } else if !cfg.verbose {
            println!(
                "  {:<12} {:>8}  {:<10} {:>6}  {:>7}  Label",
                "Offset", "Size", "Pattern", "Conf", "Entropy"
            );
            for d in visible {
                println!("  {}", detection_row(d));
            }
        }
        println!();
    }
    print_verdict(&report.target, &report.verdict);
}

fn detection_row(d: &Detection) -> String {
    let mut label = d.label.clone();
    if let Some(src) = &d.source {
        label = format!("{label}  [{src}]");
    }
    format!(
        "0x{:010X} {:>8}  {:<10} {:>5.1}%  {:>7.3}  {}",
        d.offset,
        d.size,
        d.pattern_type.as_str().to_uppercase(),
        d.confidence,
        d.entropy,
        label
    )
}

fn print_verdict(target: &str, v: &AlgorithmVerdict) {
    println!("  Verdict for {target}");
    println!("    Algorithm  : {}", v.algorithm_label);
    if v.candidates.len() > 1 {
        println!("    Candidates : {}", v.candidates.join(", "));
    }
    println!("    Passes     : {}", v.pass_count_estimate);
    println!("    Confidence : {:.1}%", v.confidence);
    println!("    Variance   : {:.4}", v.entropy_variance);
    let s = &v.zone_summary;
    println!(
        "    Zones      : zero={} one={} random={} repeating={} mixed={} unknown={}",
        s.zero_fill, s.one_fill, s.random, s.repeating, s.mixed, s.unknown
    );
    println!();
}

fn print_batch_summary(reports: &[ScanReport]) {
    println!("  {:<40} {:<36} {:>6}", "Target", "Algorithm", "Conf");
    for r in reports {
        let name = Path::new(&r.target)
            .file_name()
            .map_or_else(|| r.target.clone(), |n| n.to_string_lossy().into_owned());
        println!(
            "  {:<40} {:<36} {:>5.1}%",
            name, r.verdict.algorithm_label, r.verdict.confidence
        );
    }
    println!();
}

fn export<J, C>(cfg: &ScanCommandConfig<'_>, write_json: J, write_csv: C)
where
    J: FnOnce(&Path) -> Result<(), wipetrace_core::ScanError>,
    C: FnOnce(&Path) -> Result<(), wipetrace_core::ScanError>,
{
    if let Some(requested) = cfg.json_path {
        let path = export_path(requested, "json");
        match write_json(&path) {
            Ok(()) => println!("  JSON report saved to {}", path.display()),
            Err(e) => fail(format!("cannot write {}: {e}", path.display())),
        }
    }
    if let Some(requested) = cfg.csv_path {
        let path = export_path(requested, "csv");
        match write_csv(&path) {
            Ok(()) => println!("  CSV export saved to {}", path.display()),
            Err(e) => fail(format!("cannot write {}: {e}", path.display())),
        }
    }
}

/// `.bin` files directly inside `dir`, sorted by name.
fn list_bin_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => fail(format!("cannot read {}: {e}", dir.display())),
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "bin"))
        .collect();
    files.sort();
    files
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

const BAR_WIDTH: usize = 40;

/// In-place progress bar on stderr.
struct ProgressBar {
    enabled: bool,
    last_permille: Option<u64>,
    drawn: bool,
}

impl ProgressBar {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last_permille: None,
            drawn: false,
        }
    }

    fn update(&mut self, p: &ScanProgress<'_>) {
        if !self.enabled {
            return;
        }
        let Some(fraction) = p.fraction() else {
            return;
        };
        let permille = (fraction * 1000.0) as u64;
        if self.last_permille == Some(permille) {
            return;
        }
        self.last_permille = Some(permille);
        let mut stderr = std::io::stderr().lock();
        let _ = write!(
            stderr,
            "\r  Scanning: {}  ({} chunks)",
            render_bar(fraction, BAR_WIDTH),
            p.chunks_scanned
        );
        let _ = stderr.flush();
        self.drawn = true;
    }

    fn finish(&mut self) {
        if self.drawn {
            eprintln!();
        }
    }
}

fn render_bar(fraction: f64, width: usize) -> String {
    let fraction = fraction.clamp(0.0, 1.0);
    let filled = (fraction * width as f64) as usize;
    format!(
        "[{}{}] {:5.1}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
        fraction * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wipetrace_core::ChunkClassifier;

    #[test]
    fn test_render_bar() {
        assert_eq!(render_bar(0.0, 4), "[░░░░]   0.0%");
        assert_eq!(render_bar(0.5, 4), "[██░░]  50.0%");
        assert_eq!(render_bar(1.0, 4), "[████] 100.0%");
        assert_eq!(render_bar(2.0, 4), "[████] 100.0%");
    }

    #[test]
    fn test_detection_row() {
        let d = ChunkClassifier::default().classify_bytes(4096, &[0u8; 4096]);
        let row = detection_row(&d);
        assert!(row.starts_with("0x0000001000"));
        assert!(row.contains("ZERO_FILL"));
        assert!(row.contains("100.0%"));
        assert!(row.ends_with("Zero-fill (0x00)"));
    }

    #[test]
    fn test_is_visible() {
        let classifier = ChunkClassifier::default();
        let zero = classifier.classify_bytes(0, &[0u8; 512]);
        assert!(is_visible(&zero, 40.0));
        assert!(!is_visible(&zero, 100.5));
        let empty = classifier.classify_bytes(0, &[]);
        assert!(!is_visible(&empty, 0.0));
    }

    #[test]
    fn test_list_bin_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.bin"), b"x").unwrap();
        std::fs::write(tmp.path().join("a.bin"), b"x").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(tmp.path().join("dir.bin")).unwrap();
        let files = list_bin_files(tmp.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.bin", "b.bin"]);
    }
}
