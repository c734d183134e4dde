//! Target platforms: (operating system, architecture) pairs in Go naming.

use std::fmt;

use serde::Serialize;

/// One build target. Drives the `<os>_<arch>/bin` directory name and the
/// `GOOS`/`GOARCH` pair passed to every toolchain invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetPlatform {
    pub os: String,
    pub arch: String,
}

impl TargetPlatform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this binary was compiled for, in Go naming.
    pub fn host() -> Self {
        Self::new(
            go_os(std::env::consts::OS),
            go_arch(std::env::consts::ARCH),
        )
    }

    /// `linux_amd64`
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }

    /// `linux_amd64/bin`, relative to the image root.
    pub fn bin_dir(&self) -> String {
        format!("{}/bin", self.dir_name())
    }

    /// `GOOS`/`GOARCH` for this platform.
    pub fn env(&self) -> [(&'static str, String); 2] {
        [("GOOS", self.os.clone()), ("GOARCH", self.arch.clone())]
    }

    /// Every (os, arch) combination, in the order given.
    pub fn product<S: AsRef<str>>(oses: &[S], arches: &[S]) -> Vec<TargetPlatform> {
        let mut out = Vec::with_capacity(oses.len() * arches.len());
        for os in oses {
            for arch in arches {
                let p = TargetPlatform::new(os.as_ref(), arch.as_ref());
                if !out.contains(&p) {
                    out.push(p);
                }
            }
        }
        out
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.os, self.arch)
    }
}

/// Map a Rust `std::env::consts::OS` value to `GOOS`.
pub fn go_os(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

/// Map a Rust `std::env::consts::ARCH` value to `GOARCH`.
pub fn go_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        "mips64" => "mips64",
        other => other,
    }
}
