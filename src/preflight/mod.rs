//! Preflight checks for image assembly.
//!
//! Validates host tools and the assembly environment before a run.
//! Run with `sourcery preflight` to check everything is ready.

mod environment;
mod host_tools;
mod types;
mod validators;

use anyhow::{bail, Result};

use crate::config::Config;

pub use types::{CheckResult, CheckStatus, PreflightReport};

/// Run all preflight checks.
pub fn run_preflight(config: &Config) -> PreflightReport {
    let mut checks = Vec::new();

    println!("Running preflight checks...\n");

    println!("Checking host tools...");
    checks.extend(host_tools::check_host_tools(config));

    println!("Checking assembly environment...");
    checks.extend(environment::check_build_environment(config));

    println!();

    PreflightReport { checks }
}

/// Run preflight and bail if any checks fail (or warn, when `strict`).
pub fn run_preflight_or_fail(config: &Config, strict: bool) -> Result<()> {
    let report = run_preflight(config);
    report.print();

    if !report.passed(strict) {
        bail!(
            "Preflight failed: {} check(s) failed, {} warning(s){}. Fix the issues above before building.",
            report.fail_count(),
            report.warn_count(),
            if strict { " (strict)" } else { "" }
        );
    }

    println!("All preflight checks passed!\n");
    Ok(())
}
