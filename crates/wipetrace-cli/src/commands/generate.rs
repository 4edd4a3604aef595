use std::path::Path;

use wipetrace_core::samples::generate_all;

use super::{fail, format_size};

pub fn run(dir: &str, size: usize, seed: u64) {
    let out = Path::new(dir);
    if let Err(e) = std::fs::create_dir_all(out) {
        fail(format!("cannot create {dir}: {e}"));
    }

    println!(
        "Generating sample images in {dir} ({} each, seed {seed})",
        format_size(size as u64)
    );
    for (name, bytes) in generate_all(size, seed) {
        let path = out.join(&name);
        if let Err(e) = std::fs::write(&path, &bytes) {
            fail(format!("cannot write {}: {e}", path.display()));
        }
        println!("  {name:<20} {}", format_size(bytes.len() as u64));
    }
    println!();
    println!("Scan them all with: wipetrace scan {dir} --all");
}
