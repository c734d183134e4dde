//! Tool builds across the platform matrix.
//!
//! Every (tool, platform) cell is built with the bootstrapped driver into
//! `<root>/<os>_<arch>/bin/<tool>`. Cells are independent: one failing cell
//! is recorded and the rest still run.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatch::stub::DispatchStub;
use crate::error::{BatchErrors, SourceryError};
use crate::platform::TargetPlatform;
use crate::process::Cmd;

/// One built (or already present) tool binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub tool: String,
    pub platform: TargetPlatform,
    pub path: PathBuf,
}

/// Outcome of [`build_all`].
#[derive(Debug, Default)]
pub struct MatrixReport {
    pub built: Vec<BuildArtifact>,
    /// Cells whose artifact already existed.
    pub skipped: Vec<BuildArtifact>,
    pub errors: BatchErrors,
}

/// Build `source/tool` into `output` for `platform`.
pub fn build(
    config: &Config,
    source: &Path,
    tool: &str,
    output: &Path,
    platform: &TargetPlatform,
    extra: &[&str],
) -> Result<(), SourceryError> {
    let layout = config.layout();
    let build_err = |code: i32, stdout: String, stderr: String| SourceryError::Build {
        tool: tool.to_string(),
        platform: platform.to_string(),
        output: output.to_path_buf(),
        code,
        stdout,
        stderr,
    };

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| build_err(-1, String::new(), format!("creating {}: {}", parent.display(), e)))?;
    }

    let result = Cmd::new(layout.go_tool())
        .args(["build", "-o"])
        .arg_path(output)
        .args(extra)
        .dir(&source.join(tool))
        .clear_env()
        .envs(config.inherited_env())
        .env("GOROOT", layout.goroot())
        .env("GOPATH", layout.src())
        .env("GOCACHE", layout.cache_dir())
        .env("GOROOT_FINAL", "/go")
        .env("CGO_ENABLED", "0")
        .envs(config.platform_env(platform))
        .allow_fail()
        .run()
        .map_err(|e| build_err(-1, String::new(), format!("{:#}", e)))?;

    if !result.success() {
        return Err(build_err(result.code(), result.stdout, result.stderr));
    }
    Ok(())
}

/// Build every tool for every platform from `source/<tool>`.
///
/// A dispatch stub at an artifact path does not count as built: the stubs
/// stage writes one for every discovered command, tools included.
pub fn build_all<S: AsRef<str>>(
    config: &Config,
    source: &Path,
    tools: &[S],
    platforms: &[TargetPlatform],
) -> MatrixReport {
    let layout = config.layout();
    let mut report = MatrixReport::default();

    for platform in platforms {
        for tool in tools {
            let tool = tool.as_ref();
            let artifact = BuildArtifact {
                tool: tool.to_string(),
                platform: platform.clone(),
                path: layout.artifact(platform, tool),
            };

            if artifact.path.exists() && !config.force {
                if !DispatchStub::is_stub(&artifact.path) {
                    info!("[SKIP] {} already built", artifact.path.display());
                    report.skipped.push(artifact);
                    continue;
                }
                debug!("replace dispatch stub {}", artifact.path.display());
            }

            info!(
                "Build {:?} in {:?}, install to {:?}",
                tool,
                source.display(),
                artifact.path.display()
            );
            match build(config, source, tool, &artifact.path, platform, &[]) {
                Ok(()) => report.built.push(artifact),
                Err(e) => {
                    warn!("{}", e);
                    report.errors.push(e);
                }
            }
        }
    }
    report
}
