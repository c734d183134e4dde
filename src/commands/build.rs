//! Build command - assembles the image tree and archive.

use anyhow::Result;
use std::time::Instant;

use crate::config::Config;
use crate::pipeline;
use crate::preflight;
use crate::timing::format_duration;

/// Execute the build command.
pub fn cmd_build(config: &Config, skip_preflight: bool) -> Result<()> {
    println!("=== sourcery build ===\n");
    let build_start = Instant::now();

    if skip_preflight {
        println!("[SKIP] preflight checks\n");
    } else {
        preflight::run_preflight_or_fail(config, false)?;
    }

    let report = pipeline::run(config)?;

    println!("\n=== Build Complete ({}) ===", format_duration(build_start.elapsed()));
    println!("  Tree: {}", report.root.display());
    println!("  References: {}", report.acquisition.acquired.len());
    if !report.acquisition.errors.is_empty() {
        println!("  [WARN] {} reference(s) failed", report.acquisition.errors.len());
    }
    println!("  Dispatch stubs: {}", report.stubs.len());
    println!(
        "  Tools: {} built, {} already present",
        report.matrix.built.len(),
        report.matrix.skipped.len()
    );
    match &report.archive {
        Some(summary) => println!(
            "  Archive: {} ({} records, {} bytes)",
            summary.output.display(),
            summary.records,
            summary.bytes
        ),
        None => println!("  Archive: [SKIP] no --cpio given"),
    }

    println!("\nTry it:");
    for line in pipeline::suggestions(config) {
        println!("  {}", line);
    }
    Ok(())
}
