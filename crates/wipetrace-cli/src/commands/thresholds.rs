use wipetrace_core::DetectorConfig;

use super::fail;

/// Print the default thresholds; the output is a valid `--config` file.
pub fn run() {
    match serde_json::to_string_pretty(&DetectorConfig::default()) {
        Ok(json) => println!("{json}"),
        Err(e) => fail(e),
    }
}
