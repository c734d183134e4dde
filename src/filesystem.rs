//! Filesystem tree construction.
//!
//! Creates the top-level directories of the image and writes one dispatch
//! stub per discovered command directory.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::dispatch::stub::DispatchStub;
use crate::error::{BatchErrors, SourceryError};

/// Top-level directories created in every root.
pub const SKELETON_DIRS: &[&str] = &[
    "bin", "dev", "etc", "proc", "sys", "tmp", "ubin", "usr", "var/log",
];

fn assembly_err(path: &Path, e: impl std::fmt::Display) -> SourceryError {
    SourceryError::Assembly {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// `mkdir -p` every skeleton directory under `root`. Existing directories
/// are fine; every failure is collected.
pub fn skeleton(root: &Path) -> BatchErrors {
    let mut errors = BatchErrors::new();
    for dir in SKELETON_DIRS {
        let path = root.join(dir);
        if let Err(e) = fs::create_dir_all(&path) {
            warn!("mkdir {}: {}", path.display(), e);
            errors.push(assembly_err(&path, e));
        }
    }
    errors
}

fn has_meta(segment: &str) -> bool {
    segment.contains(['*', '?', '['])
}

/// Translate one glob segment to an anchored regex. `*` and `?` never match
/// `/`; `[...]` and `[!...]` are character classes.
fn segment_regex(segment: &str) -> Result<Regex, String> {
    let mut re = String::from("^");
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '[' => {
                re.push('[');
                if matches!(chars.peek(), Some('!') | Some('^')) {
                    chars.next();
                    re.push('^');
                }
                let mut closed = false;
                let mut first = true;
                while let Some(c) = chars.next() {
                    if c == ']' && !first {
                        closed = true;
                        break;
                    }
                    first = false;
                    match c {
                        '\\' => {
                            let escaped = chars
                                .next()
                                .ok_or_else(|| format!("trailing escape in {:?}", segment))?;
                            re.push_str(&regex::escape(&escaped.to_string()));
                        }
                        '[' | ']' | '^' | '&' | '~' => {
                            re.push('\\');
                            re.push(c);
                        }
                        _ => re.push(c),
                    }
                }
                if !closed {
                    return Err(format!("unclosed character class in {:?}", segment));
                }
                re.push(']');
            }
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| format!("trailing escape in {:?}", segment))?;
                re.push_str(&regex::escape(&escaped.to_string()));
            }
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| e.to_string())
}

/// Expand `pattern` relative to `root`, one path segment at a time.
///
/// Only existing paths are returned, sorted. Matching never descends deeper
/// than the pattern has segments.
pub fn glob(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, String> {
    let segments: Vec<&str> = pattern
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    // Validate everything up front so a bad pattern fails even when an
    // earlier segment matches nothing.
    let compiled: Vec<Option<Regex>> = segments
        .iter()
        .map(|s| if has_meta(s) { segment_regex(s).map(Some) } else { Ok(None) })
        .collect::<Result<_, _>>()?;

    let mut current = vec![root.to_path_buf()];
    for (segment, regex) in segments.iter().zip(compiled.iter()) {
        let mut next = Vec::new();
        for dir in &current {
            match regex {
                None => {
                    let candidate = dir.join(segment);
                    if fs::symlink_metadata(&candidate).is_ok() {
                        next.push(candidate);
                    }
                }
                Some(re) => {
                    let Ok(entries) = fs::read_dir(dir) else {
                        continue;
                    };
                    for entry in entries.flatten() {
                        let name = entry.file_name();
                        if name.to_str().map_or(false, |n| re.is_match(n)) {
                            next.push(entry.path());
                        }
                    }
                }
            }
        }
        next.sort();
        current = next;
        if current.is_empty() {
            break;
        }
    }
    if segments.is_empty() {
        return Ok(Vec::new());
    }
    Ok(current)
}

/// Write a dispatch stub into `dest_dir` for every directory matched by
/// `patterns` under `root`.
///
/// `bin_path` is the platform bin directory relative to the root; stubs name
/// the installer there. Also creates `go/pkg/include`. Bad or unmatched
/// patterns are only logged. A built binary already in `dest_dir` is never
/// replaced by a stub. Returns the stubs written and every write failure.
pub fn populate_dispatch_stubs<S: AsRef<str>>(
    root: &Path,
    bin_path: &Path,
    dest_dir: &Path,
    patterns: &[S],
) -> (Vec<PathBuf>, BatchErrors) {
    let mut written = Vec::new();
    let mut errors = BatchErrors::new();

    for dir in [dest_dir.to_path_buf(), root.join("go/pkg/include")] {
        if let Err(e) = fs::create_dir_all(&dir) {
            errors.push(assembly_err(&dir, e));
        }
    }

    let mut matches = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        match glob(root, pattern) {
            Ok(found) if found.is_empty() => debug!("{:?}: no matches", pattern),
            Ok(found) => matches.extend(found),
            Err(e) => warn!("{:?}: {}", pattern, e),
        }
    }

    for dir in matches {
        let rel = match dir.strip_prefix(root) {
            Ok(rel) => rel.to_path_buf(),
            Err(e) => {
                errors.push(assembly_err(&dir, e));
                continue;
            }
        };
        let Some(name) = dir.file_name() else {
            continue;
        };
        let path = dest_dir.join(name);
        if path.exists() && !DispatchStub::is_stub(&path) {
            debug!("keep built {}", path.display());
            continue;
        }
        let stub = DispatchStub::new(bin_path, &rel);
        debug!("write {} with {:?}", path.display(), stub.render());
        match stub.write(&path) {
            Ok(()) => written.push(path),
            Err(e) => errors.push(assembly_err(&path, e)),
        }
    }

    info!("wrote {} dispatch stubs to {}", written.len(), dest_dir.display());
    (written, errors)
}
