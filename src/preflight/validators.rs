//! Validators for things that must do more than exist.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::process::Cmd;

/// Validate a binary is executable and responds to `--version`.
///
/// Returns the first line of its version output.
pub fn validate_executable(path: &Path) -> Result<String, String> {
    let metadata = fs::metadata(path).map_err(|e| format!("Cannot stat: {}", e))?;

    if metadata.permissions().mode() & 0o111 == 0 {
        return Err("Not executable (missing +x permission)".to_string());
    }

    match Cmd::new(path).arg("--version").allow_fail().run() {
        Ok(r) if r.success() => {
            let first_line = r.stdout.lines().next().unwrap_or("unknown");
            let version = if first_line.len() > 50 {
                format!("{}...", first_line.chars().take(47).collect::<String>())
            } else {
                first_line.to_string()
            };
            Ok(version)
        }
        Ok(r) => Err(format!(
            "Runs but --version failed: {}",
            r.stderr.lines().next().unwrap_or("unknown error")
        )),
        Err(e) => Err(format!("Cannot execute: {}", e)),
    }
}

/// The closest ancestor of `path` that exists, `path` itself included.
/// Relative paths bottom out at `.`.
pub fn nearest_existing(path: &Path) -> &Path {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .unwrap_or(Path::new("."))
}

/// Check `dir` could be created and written to. Nothing is created: the
/// write test runs in the nearest existing ancestor, which is returned.
pub fn validate_writable(dir: &Path) -> Result<PathBuf, String> {
    let existing = nearest_existing(dir);
    if !existing.is_dir() {
        return Err(format!("{} is not a directory", existing.display()));
    }
    let scratch = existing.join(format!(".preflight-test-{}", std::process::id()));
    fs::write(&scratch, "test")
        .map_err(|e| format!("Cannot write in {}: {}", existing.display(), e))?;
    let _ = fs::remove_file(&scratch);
    Ok(existing.to_path_buf())
}

/// Read the first line of a toolchain version stamp.
pub fn read_version_stamp(path: &Path) -> Result<String, String> {
    let data = fs::read_to_string(path).map_err(|e| format!("Cannot read: {}", e))?;
    match data.lines().next() {
        Some(line) if !line.trim().is_empty() => Ok(line.trim().to_string()),
        _ => Err("Empty version stamp".to_string()),
    }
}
