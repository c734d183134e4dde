//! Host tool availability checks.

use std::path::Path;

use crate::config::Config;
use crate::process;

use super::types::CheckResult;
use super::validators::validate_executable;

/// Check the programs the pipeline runs, and the ones it suggests at the end.
pub fn check_host_tools(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();

    results.push(check_git(&config.git));

    let required_tools = [("bash", "bash", "Runs the toolchain bootstrap script (make.bash)")];
    for (tool, package, purpose) in required_tools {
        results.push(check_tool_exists(tool, package, purpose, true));
    }

    // Only printed as suggestions after a run
    let optional_tools = [
        ("unshare", "util-linux", "Suggested for trying the tree in a private mount namespace"),
        ("chroot", "coreutils", "Suggested for booting the tree in place"),
        ("strace", "strace", "Suggested for tracing the first boot"),
        ("rsync", "rsync", "Suggested for copying the tree elsewhere"),
    ];
    for (tool, package, purpose) in optional_tools {
        results.push(check_tool_exists(tool, package, purpose, false));
    }

    // SCP-style references go over ssh
    if config.references.iter().chain([&config.self_reference]).any(|r| r.contains('@')) {
        results.push(check_tool_exists(
            "ssh",
            "openssh-clients",
            "Needed by git for user@host:path references",
            false,
        ));
    }

    results
}

/// `git` may be overridden with a path, so resolve it and make sure it runs.
fn check_git(git: &Path) -> CheckResult {
    let name = "git";
    let resolved = if git.components().count() > 1 {
        Some(git.to_path_buf())
    } else {
        process::which(&git.to_string_lossy()).map(Into::into)
    };
    match resolved {
        Some(path) => match validate_executable(&path) {
            Ok(version) => {
                CheckResult::pass_with(name, &format!("{} ({})", path.display(), version))
            }
            Err(e) => CheckResult::fail(name, &format!("{}: {}", path.display(), e)),
        },
        None => CheckResult::fail(
            name,
            &format!(
                "{} not found. Install the 'git' package or set SOURCERY_GIT.",
                git.display()
            ),
        ),
    }
}

/// Check if a tool exists in PATH.
fn check_tool_exists(tool: &str, package: &str, purpose: &str, required: bool) -> CheckResult {
    match process::which(tool) {
        Some(path) => CheckResult::pass_with(tool, &path),
        None => {
            let msg = format!("Not found. Install '{}' package. {}", package, purpose);
            if required {
                CheckResult::fail(tool, &msg)
            } else {
                CheckResult::warn(tool, &msg)
            }
        }
    }
}
