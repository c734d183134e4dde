//! Dispatch stubs.
//!
//! A stub is a two-token interpreter file:
//!
//! ```text
//! #!/linux_amd64/bin/installcommand #!/src/github.com/u-root/u-root/cmds/core/date
//! ```
//!
//! When the kernel runs it, the dispatcher receives the second token as
//! `argv[1]` and the stub's own path as `argv[2]`.

use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Prefix of both tokens.
pub const MARKER: &str = "#!";

/// Stub file mode.
pub const STUB_MODE: u32 = 0o755;

/// Stubs are one short line; anything longer is not one.
const MAX_STUB_LEN: u64 = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchStub {
    /// Dispatcher path inside the image, e.g. `/linux_amd64/bin/installcommand`.
    pub dispatcher: PathBuf,
    /// Command source directory inside the image, e.g. `/src/.../date`.
    pub source: PathBuf,
}

impl DispatchStub {
    /// Stub for the command at `rel_source` (relative to the image root),
    /// dispatched by the installer in `bin_dir` (also relative).
    pub fn new(bin_dir: &Path, rel_source: &Path) -> Self {
        Self {
            dispatcher: Path::new("/")
                .join(bin_dir)
                .join(crate::layout::DISPATCHER_NAME),
            source: Path::new("/").join(rel_source),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{}{} {}{}\n",
            MARKER,
            self.dispatcher.display(),
            MARKER,
            self.source.display()
        )
    }

    /// Parse stub text. Both tokens must carry the marker.
    pub fn parse(text: &str) -> Option<Self> {
        let mut tokens = text.split_whitespace();
        let dispatcher = tokens.next()?.strip_prefix(MARKER)?;
        let source = tokens.next()?.strip_prefix(MARKER)?;
        if dispatcher.is_empty() || source.is_empty() || tokens.next().is_some() {
            return None;
        }
        Some(Self {
            dispatcher: PathBuf::from(dispatcher),
            source: PathBuf::from(source),
        })
    }

    pub fn read(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is not a dispatch stub", path.display()),
            )
        })
    }

    /// Whether `path` holds a stub rather than a built binary. Only the
    /// first few kilobytes are read.
    pub fn is_stub(path: &Path) -> bool {
        let Ok(file) = File::open(path) else {
            return false;
        };
        let mut head = Vec::new();
        if file.take(MAX_STUB_LEN + 1).read_to_end(&mut head).is_err() {
            return false;
        }
        head.len() as u64 <= MAX_STUB_LEN
            && std::str::from_utf8(&head).map_or(false, |t| Self::parse(t).is_some())
    }

    /// Write the stub to `path` with mode 0755.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.render())?;
        fs::set_permissions(path, fs::Permissions::from_mode(STUB_MODE))
    }
}
