//! Configuration for a sourcery run.
//!
//! Everything the pipeline needs from the outside world (target platforms,
//! tool locations, the environment forwarded to child processes) is read once
//! at startup into a [`Config`] and threaded through every stage. Nothing
//! below this module reads the process environment.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::layout::ImageLayout;
use crate::platform::TargetPlatform;

/// Pinned toolchain release.
pub const DEFAULT_TOOLCHAIN_VERSION: &str = "go1.17.7";

/// Where the toolchain is cloned from.
pub const DEFAULT_TOOLCHAIN_REPO: &str = "git@github.com:golang/go";

/// The repository that carries this tool's own sources. Always acquired so
/// the image can rebuild itself.
pub const DEFAULT_SELF_REFERENCE: &str = "git@github.com:u-root/sourcery";

/// Tools built into every platform bin directory.
pub const DEFAULT_TOOLS: &[&str] = &["installcommand", "init"];

/// Archive exclusions applied to every pack.
pub const DEFAULT_EXCLUDES: &[&str] = &["\\.git", "testdata", "go/pkg/[^/][^/]*_[^/][^/]*/"];

/// Layouts known to hold one command per directory, relative to the root.
pub const DEFAULT_DISCOVERY_PATTERNS: &[&str] = &[
    "src/github.com/u-root/u-root/cmds/*/*",
    "src/github.com/u-root/NiChrome/cmds/*",
    "src/github.com/u-root/cpu/cmds/*",
    "src/github.com/nsf/godit",
];

/// Host variables forwarded to toolchain invocations that otherwise run with
/// a cleared environment.
const FORWARDED_VARS: &[&str] = &["PATH", "HOME", "GOROOT_BOOTSTRAP", "GOPROXY", "SSH_AUTH_SOCK"];

/// Immutable run configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Assembly root.
    pub root: PathBuf,
    /// Archive to write, if any.
    pub output: Option<PathBuf>,
    /// Every platform to build for.
    pub platforms: Vec<TargetPlatform>,
    /// Extra archive exclusions (regular expressions), on top of the defaults.
    pub excludes: Vec<String>,
    /// Build the tools from `work_dir` instead of the acquired self-reference.
    pub development: bool,
    /// Extra references to acquire.
    pub references: Vec<String>,
    /// Rebuild artifacts that already exist.
    pub force: bool,
    /// Continue past a failed acquisition batch.
    pub keep_going: bool,
    pub toolchain_version: String,
    pub toolchain_repo: String,
    pub self_reference: String,
    pub tools: Vec<String>,
    pub discovery_patterns: Vec<String>,
    /// `git` program.
    pub git: PathBuf,
    /// `GOARM`, forwarded when set.
    pub goarm: Option<String>,
    /// Working directory at startup.
    pub work_dir: PathBuf,
    /// Environment snapshot taken at startup.
    #[serde(skip)]
    pub host_env: BTreeMap<String, String>,
}

impl Config {
    /// Build a configuration from the current process environment.
    pub fn from_env(root: PathBuf) -> Self {
        let work_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_vars(root, work_dir, std::env::vars())
    }

    /// Build a configuration from an explicit set of variables.
    pub fn from_vars<I>(root: PathBuf, work_dir: PathBuf, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let host_env: BTreeMap<String, String> = vars.into_iter().collect();
        let get = |k: &str| host_env.get(k).filter(|v| !v.is_empty()).cloned();

        let host = TargetPlatform::host();
        let platform = TargetPlatform::new(
            get("GOOS").unwrap_or(host.os),
            get("GOARCH").unwrap_or(host.arch),
        );

        Self {
            root,
            output: None,
            platforms: vec![platform],
            excludes: Vec::new(),
            development: true,
            references: Vec::new(),
            force: false,
            keep_going: false,
            toolchain_version: get("SOURCERY_TOOLCHAIN_VERSION")
                .unwrap_or_else(|| DEFAULT_TOOLCHAIN_VERSION.to_string()),
            toolchain_repo: get("SOURCERY_TOOLCHAIN_REPO")
                .unwrap_or_else(|| DEFAULT_TOOLCHAIN_REPO.to_string()),
            self_reference: get("SOURCERY_SELF_REFERENCE")
                .unwrap_or_else(|| DEFAULT_SELF_REFERENCE.to_string()),
            tools: DEFAULT_TOOLS.iter().map(|s| s.to_string()).collect(),
            discovery_patterns: DEFAULT_DISCOVERY_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            git: get("SOURCERY_GIT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("git")),
            goarm: get("GOARM"),
            work_dir,
            host_env,
        }
    }

    pub fn layout(&self) -> ImageLayout {
        ImageLayout::new(&self.root)
    }

    /// Default exclusions followed by the user's.
    pub fn all_excludes(&self) -> Vec<String> {
        DEFAULT_EXCLUDES
            .iter()
            .map(|s| s.to_string())
            .chain(self.excludes.iter().cloned())
            .collect()
    }

    /// The small set of host variables passed to otherwise clean child
    /// environments.
    pub fn forwarded_env(&self) -> Vec<(String, String)> {
        FORWARDED_VARS
            .iter()
            .filter_map(|k| self.host_env.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect()
    }

    /// The full startup environment, for steps that inherit it.
    pub fn inherited_env(&self) -> Vec<(String, String)> {
        self.host_env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Platform variables, plus `GOARM` when configured.
    pub fn platform_env(&self, platform: &TargetPlatform) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = platform
            .env()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        if let Some(arm) = &self.goarm {
            env.push(("GOARM".to_string(), arm.clone()));
        }
        env
    }

    /// Directory holding the tool sources for the build matrix.
    pub fn tool_source_base(&self) -> PathBuf {
        if self.development {
            return self.work_dir.clone();
        }
        match crate::reference::resolve(&self.self_reference) {
            Ok(r) => self.layout().src().join(r.identity()),
            Err(_) => self.work_dir.clone(),
        }
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  Root: {}", self.root.display());
        match &self.output {
            Some(p) => println!("  Archive: {}", p.display()),
            None => println!("  Archive: (none)"),
        }
        let platforms: Vec<String> = self.platforms.iter().map(|p| p.to_string()).collect();
        println!("  Platforms: {}", platforms.join(", "));
        println!("  Toolchain: {} from {}", self.toolchain_version, self.toolchain_repo);
        println!("  Self reference: {}", self.self_reference);
        println!("  Tools: {}", self.tools.join(", "));
        println!("  Development mode: {}", self.development);
        println!("  Tool sources: {}", self.tool_source_base().display());
        println!("  git: {}", self.git.display());
        if let Some(arm) = &self.goarm {
            println!("  GOARM: {}", arm);
        }
        println!("  Excludes:");
        for e in self.all_excludes() {
            println!("    {}", e);
        }
        println!("  Discovery patterns:");
        for p in &self.discovery_patterns {
            println!("    {}", p);
        }
    }
}

/// Default assembly root: a fresh directory under the system temp dir.
pub fn default_root(tmp: &Path) -> PathBuf {
    tmp.join(format!("sourcery{}", std::process::id()))
}
