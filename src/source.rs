//! Source acquisition: clone, module init, dependency resolution.
//!
//! Each reference is handled independently:
//!
//! 1. resolve the reference into `host/dir/leaf`
//! 2. shallow-clone it into `<root>/src/<host>/<dir>/<leaf>`
//! 3. create a `go.mod` named after that identity if the repository has none
//! 4. run `go mod tidy` once per target platform, since build tags can change
//!    the module graph
//!
//! A failure at any step is recorded and the batch moves on to the next
//! reference. [`acquire_all`] reports every failure at the end.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{BatchErrors, SourceryError};
use crate::platform::TargetPlatform;
use crate::process::Cmd;
use crate::reference::{self, Reference};

/// Name of the module manifest.
pub const MANIFEST: &str = "go.mod";

/// A reference that made it through every step.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub reference: Reference,
    pub dest: PathBuf,
}

/// Outcome of a batch acquisition.
#[derive(Debug, Default)]
pub struct Acquisition {
    pub acquired: Vec<Acquired>,
    pub errors: BatchErrors,
}

/// Whether [`ensure_manifest`] had anything to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestState {
    AlreadyPresent,
    Created,
}

/// Where a reference is cloned to.
pub fn destination(config: &Config, reference: &Reference) -> PathBuf {
    config.layout().src().join(reference.identity())
}

/// Shallow-clone `reference` into `dest`.
///
/// An existing checkout (a `.git` directory at `dest`) is left alone.
pub fn clone(config: &Config, reference: &Reference, dest: &Path) -> Result<(), SourceryError> {
    let fetch_err = |reason: String| SourceryError::Fetch {
        what: reference.raw.clone(),
        reason,
    };

    if dest.join(".git").exists() {
        info!("[SKIP] {} already cloned at {}", reference.raw, dest.display());
        return Ok(());
    }

    let parent = dest
        .parent()
        .ok_or_else(|| fetch_err(format!("{} has no parent directory", dest.display())))?;
    fs::create_dir_all(parent)
        .map_err(|e| fetch_err(format!("creating {}: {}", parent.display(), e)))?;

    let leaf = dest
        .file_name()
        .ok_or_else(|| fetch_err(format!("{} has no final component", dest.display())))?;

    let mut cmd = Cmd::new(&config.git).args(["clone", "--depth", "1"]);
    if let Some(r) = &reference.git_ref {
        cmd = cmd.args(["-b", r.as_str()]);
    }
    let cmd = cmd
        .arg(reference.url())
        .arg(leaf)
        .dir(parent)
        .clear_env()
        .envs(config.inherited_env())
        .allow_fail();

    info!("clone {} into {}", reference.raw, dest.display());
    let result = cmd.run().map_err(|e| fetch_err(format!("{:#}", e)))?;
    if !result.success() {
        return Err(fetch_err(format!(
            "git clone exited with {}: {}",
            result.code(),
            result.diagnostic()
        )));
    }
    Ok(())
}

/// Environment for `go mod` steps: clean, with the toolchain pinned to the
/// bootstrap location.
fn module_env(config: &Config) -> Vec<(String, String)> {
    let layout = config.layout();
    let mut env = config.forwarded_env();
    env.extend([
        ("GOPATH".to_string(), layout.src().to_string_lossy().into_owned()),
        ("GOROOT".to_string(), layout.goroot().to_string_lossy().into_owned()),
        ("GOROOT_FINAL".to_string(), "/go".to_string()),
        ("GOCACHE".to_string(), layout.cache_dir().to_string_lossy().into_owned()),
        ("CGO_ENABLED".to_string(), "0".to_string()),
    ]);
    env
}

/// Create `go.mod` at `dest` declaring `module`, unless one exists.
pub fn ensure_manifest(
    config: &Config,
    module: &str,
    dest: &Path,
) -> Result<ManifestState, SourceryError> {
    if dest.join(MANIFEST).exists() {
        info!("[SKIP] {} already has {}", dest.display(), MANIFEST);
        return Ok(ManifestState::AlreadyPresent);
    }

    let manifest_err = |reason: String| SourceryError::Manifest {
        module: module.to_string(),
        platform: "any".to_string(),
        reason,
    };

    info!("init module {} in {}", module, dest.display());
    let result = Cmd::new(config.layout().go_tool())
        .args(["mod", "init", module])
        .dir(dest)
        .clear_env()
        .envs(module_env(config))
        .allow_fail()
        .run()
        .map_err(|e| manifest_err(format!("{:#}", e)))?;
    if !result.success() {
        return Err(manifest_err(format!(
            "go mod init exited with {}: {}",
            result.code(),
            result.diagnostic()
        )));
    }
    Ok(ManifestState::Created)
}

/// Run `go mod tidy` at `dest` for one platform.
pub fn resolve_dependencies(
    config: &Config,
    module: &str,
    dest: &Path,
    platform: &TargetPlatform,
) -> Result<(), SourceryError> {
    let manifest_err = |reason: String| SourceryError::Manifest {
        module: module.to_string(),
        platform: platform.to_string(),
        reason,
    };

    info!("tidy {} for {}", module, platform);
    let result = Cmd::new(config.layout().go_tool())
        .args(["mod", "tidy"])
        .dir(dest)
        .clear_env()
        .envs(module_env(config))
        .envs(config.platform_env(platform))
        .allow_fail()
        .run()
        .map_err(|e| manifest_err(format!("{:#}", e)))?;
    if !result.success() {
        return Err(manifest_err(format!(
            "go mod tidy exited with {}: {}",
            result.code(),
            result.diagnostic()
        )));
    }
    Ok(())
}

fn acquire_one(config: &Config, raw: &str) -> Result<Acquired, SourceryError> {
    let reference = reference::resolve(raw)?;
    let dest = destination(config, &reference);
    let module = reference.module_name();

    clone(config, &reference, &dest)?;
    ensure_manifest(config, &module, &dest)?;
    for platform in &config.platforms {
        resolve_dependencies(config, &module, &dest, platform)?;
    }
    Ok(Acquired { reference, dest })
}

/// Acquire `references` plus the configured self-reference.
///
/// Every reference is attempted; failures are collected, never raised.
pub fn acquire_all<S: AsRef<str>>(config: &Config, references: &[S]) -> Acquisition {
    let mut all: Vec<&str> = references.iter().map(|r| r.as_ref()).collect();
    if !all.contains(&config.self_reference.as_str()) {
        all.push(config.self_reference.as_str());
    }

    let mut out = Acquisition::default();
    for raw in all {
        info!("Get {:?}", raw);
        match acquire_one(config, raw) {
            Ok(acquired) => out.acquired.push(acquired),
            Err(e) => {
                warn!("{}", e);
                out.errors.push(e);
            }
        }
    }
    out
}
