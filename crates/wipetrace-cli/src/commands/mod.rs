pub mod generate;
pub mod scan;
pub mod thresholds;

use std::path::{Path, PathBuf};

use wipetrace_core::DetectorConfig;

/// Print an error and exit with status 1.
pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

/// Load threshold overrides, or the defaults when no file is given.
pub fn load_config(path: Option<&str>) -> DetectorConfig {
    match path {
        None => DetectorConfig::default(),
        Some(p) => match wipetrace_core::load_config_from_path(Path::new(p)) {
            Ok(config) => config,
            Err(e) => fail(format!("cannot load thresholds from {p}: {e}")),
        },
    }
}

/// Human-readable byte size, e.g. `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    let mut n = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if n < 1024.0 {
            return format!("{n:.1} {unit}");
        }
        n /= 1024.0;
    }
    format!("{n:.1} PB")
}

/// Export path for `--json` / `--csv`: the given file or a timestamped default.
pub fn export_path(requested: Option<&str>, ext: &str) -> PathBuf {
    match requested {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from(wipetrace_core::default_report_name(ext)),
    }
}
