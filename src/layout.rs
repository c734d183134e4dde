//! Well-known paths inside the assembly root.
//!
//! ```text
//! <root>/
//!   go/                 toolchain checkout (GOROOT at build time, /go at boot)
//!   go/bin/go           host toolchain driver built by make.bash
//!   go/pkg/include      headers directory the toolchain expects
//!   src/<host>/<dir>/   acquired sources (GOPATH at build time, /src at boot)
//!   <os>_<arch>/bin/    per-platform driver, dispatcher, init and stubs
//!   ubin/               commands built on demand by the dispatcher
//!   .cache/             GOCACHE
//! ```

use std::path::{Path, PathBuf};

use crate::platform::TargetPlatform;

/// Name of the dispatcher binary inside each platform bin directory.
pub const DISPATCHER_NAME: &str = "installcommand";

#[derive(Debug, Clone)]
pub struct ImageLayout {
    root: PathBuf,
}

impl ImageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn goroot(&self) -> PathBuf {
        self.root.join("go")
    }

    pub fn go_src(&self) -> PathBuf {
        self.goroot().join("src")
    }

    /// The host driver produced by the bootstrap script.
    pub fn go_tool(&self) -> PathBuf {
        self.goroot().join("bin/go")
    }

    pub fn version_file(&self) -> PathBuf {
        self.goroot().join("VERSION")
    }

    pub fn include_dir(&self) -> PathBuf {
        self.goroot().join("pkg/include")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(".cache")
    }

    pub fn ubin(&self) -> PathBuf {
        self.root.join("ubin")
    }

    pub fn platform_bin(&self, platform: &TargetPlatform) -> PathBuf {
        self.root.join(platform.bin_dir())
    }

    /// Where `tool` lands for `platform`.
    pub fn artifact(&self, platform: &TargetPlatform, tool: &str) -> PathBuf {
        self.platform_bin(platform).join(tool)
    }
}
