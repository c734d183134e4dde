//! Assembly environment checks (directories, disk space, toolchain state).

use std::path::Path;

use crate::config::Config;
use crate::process::Cmd;

use super::types::CheckResult;
use super::validators::{nearest_existing, read_version_stamp, validate_writable};

/// A toolchain checkout plus its build cache runs to a few GB.
const MIN_FREE_GB: u64 = 4;

/// Check the root and archive locations, and any existing toolchain checkout.
pub fn check_build_environment(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();
    let layout = config.layout();

    match validate_writable(layout.root()) {
        Ok(existing) if existing == layout.root() => results.push(CheckResult::pass_with(
            "root writable",
            &layout.root().display().to_string(),
        )),
        Ok(existing) => results.push(CheckResult::pass_with(
            "root writable",
            &format!(
                "{} (will be created under {})",
                layout.root().display(),
                existing.display()
            ),
        )),
        Err(e) => results.push(CheckResult::fail(
            "root writable",
            &format!("{}: {}", layout.root().display(), e),
        )),
    }

    if let Some(output) = &config.output {
        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        match validate_writable(dir) {
            Ok(_) => results.push(CheckResult::pass("archive directory writable")),
            Err(e) => results.push(CheckResult::fail(
                "archive directory writable",
                &format!("{}: {}", dir.display(), e),
            )),
        }
    }

    // An existing checkout at the wrong version fails the run later anyway
    let stamp = layout.version_file();
    if stamp.exists() {
        match read_version_stamp(&stamp) {
            Ok(v) if v == config.toolchain_version => {
                results.push(CheckResult::pass_with("toolchain checkout", &v))
            }
            Ok(v) => results.push(CheckResult::fail(
                "toolchain checkout",
                &format!(
                    "{} has {}, want {}. Remove it or pass --toolchain-version {}",
                    layout.goroot().display(),
                    v,
                    config.toolchain_version,
                    v
                ),
            )),
            Err(e) => results.push(CheckResult::fail("toolchain checkout", &e)),
        }
    } else {
        results.push(CheckResult::skip(
            "toolchain checkout",
            &format!("none yet, will clone {}", config.toolchain_version),
        ));
    }

    if config.development {
        let base = config.tool_source_base();
        let missing: Vec<&str> = config
            .tools
            .iter()
            .map(String::as_str)
            .filter(|t| !base.join(t).is_dir())
            .collect();
        if missing.is_empty() {
            results.push(CheckResult::pass_with("tool sources", &base.display().to_string()));
        } else {
            results.push(CheckResult::warn(
                "tool sources",
                &format!(
                    "{} missing under {} (development mode builds from the working directory)",
                    missing.join(", "),
                    base.display()
                ),
            ));
        }
    }

    // Use df command to avoid a statvfs dependency
    if let Ok(result) = Cmd::new("df")
        .args(["--output=avail", "-B1"])
        .arg_path(nearest_existing(layout.root()))
        .allow_fail()
        .run()
    {
        if result.success() {
            if let Some(avail_bytes) = result
                .stdout
                .lines()
                .nth(1)
                .and_then(|l| l.trim().parse::<u64>().ok())
            {
                let free_gb = avail_bytes / (1024 * 1024 * 1024);
                if free_gb < MIN_FREE_GB {
                    results.push(CheckResult::warn(
                        "disk space",
                        &format!("{}GB free - a full tree needs ~{}GB", free_gb, MIN_FREE_GB),
                    ));
                } else {
                    results.push(CheckResult::pass_with(
                        "disk space",
                        &format!("{}GB free", free_gb),
                    ));
                }
            }
        }
    }

    results
}
