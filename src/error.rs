//! Error taxonomy for image assembly and dispatch.
//!
//! Library components return [`SourceryError`]. Batch stages (source
//! acquisition, the build matrix, stub population) never stop at the first
//! failure; they collect every per-item error into a [`BatchErrors`] and hand
//! it back to the caller, which decides whether a non-empty batch is fatal.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Every failure the pipeline or the dispatcher can report.
#[derive(Debug, Error)]
pub enum SourceryError {
    /// A dependency reference could not be parsed.
    #[error("reference {reference:?}: {reason}")]
    Parse { reference: String, reason: String },

    /// `git clone` (or another fetch step) exited non-zero.
    #[error("fetching {what}: {reason}")]
    Fetch { what: String, reason: String },

    /// The toolchain checkout carries a different version stamp than requested.
    #[error("{}: version file has {found:?}, but want version {wanted:?}", .path.display())]
    VersionMismatch {
        path: PathBuf,
        found: String,
        wanted: String,
    },

    /// `go mod init` or `go mod tidy` failed.
    #[error("module {module} ({platform}): {reason}")]
    Manifest {
        module: String,
        platform: String,
        reason: String,
    },

    /// A compiler invocation failed. Carries the captured output.
    #[error("building {tool} for {platform} -> {}: exit code {code}{}", .output.display(), render_output(.stdout, .stderr))]
    Build {
        tool: String,
        platform: String,
        output: PathBuf,
        code: i32,
        stdout: String,
        stderr: String,
    },

    /// Creating the filesystem tree failed.
    #[error("assembling {}: {reason}", .path.display())]
    Assembly { path: PathBuf, reason: String },

    /// Writing the archive failed. Always fatal.
    #[error("packaging {}: {reason}", .path.display())]
    Packaging { path: PathBuf, reason: String },

    /// The dispatcher could not build the requested command.
    #[error("building {command} from {}: {reason}", .source_dir.display())]
    DispatchBuild {
        command: String,
        source_dir: PathBuf,
        reason: String,
    },

    /// The dispatcher could not hand off to the built command.
    #[error("running {}: {reason}", .artifact.display())]
    DispatchExec { artifact: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn render_output(stdout: &str, stderr: &str) -> String {
    let mut out = String::new();
    for (label, text) in [("stdout", stdout.trim()), ("stderr", stderr.trim())] {
        if !text.is_empty() {
            out.push_str(&format!("\n  {}:\n{}", label, text));
        }
    }
    out
}

/// Errors accumulated across independent items of a batch.
#[derive(Debug, Default)]
pub struct BatchErrors {
    errors: Vec<SourceryError>,
}

impl BatchErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one item's failure and keep going.
    pub fn push(&mut self, error: SourceryError) {
        self.errors.push(error);
    }

    /// Merge another batch into this one.
    pub fn extend(&mut self, other: BatchErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceryError> {
        self.errors.iter()
    }

    /// `Ok(())` when nothing failed, otherwise the whole batch as the error.
    pub fn into_result(self) -> Result<(), BatchErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl IntoIterator for BatchErrors {
    type Item = SourceryError;
    type IntoIter = std::vec::IntoIter<SourceryError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for BatchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "no errors"),
            1 => write!(f, "1 error occurred:\n\t* {}", self.errors[0]),
            n => {
                write!(f, "{} errors occurred:", n)?;
                for e in &self.errors {
                    write!(f, "\n\t* {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for BatchErrors {}
