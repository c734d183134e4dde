//! Toolchain bootstrap.
//!
//! The image carries its own Go toolchain at `/go`. It is cloned at a pinned
//! release tag, bootstrapped once with `make.bash` on the host, and then the
//! `go` driver is cross-built into every platform's bin directory.

use std::fs;

use tracing::info;

use crate::config::Config;
use crate::error::SourceryError;
use crate::matrix;
use crate::platform::TargetPlatform;
use crate::process::Cmd;

/// Whether [`fetch`] had to clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Reused,
    Cloned,
}

/// Clone the toolchain at `config.toolchain_version` into `<root>/go` and
/// check its version stamp.
pub fn fetch(config: &Config) -> Result<FetchState, SourceryError> {
    let layout = config.layout();
    let version = &config.toolchain_version;

    if layout.version_file().exists() {
        verify_version(config)?;
        info!("[SKIP] toolchain {} already at {}", version, layout.goroot().display());
        return Ok(FetchState::Reused);
    }

    let fetch_err = |reason: String| SourceryError::Fetch {
        what: format!("{} at {}", config.toolchain_repo, version),
        reason,
    };

    fs::create_dir_all(layout.root())
        .map_err(|e| fetch_err(format!("creating {}: {}", layout.root().display(), e)))?;

    info!("clone toolchain {} from {}", version, config.toolchain_repo);
    let result = Cmd::new(&config.git)
        .args(["clone", "-b", version.as_str(), "--depth", "1"])
        .arg(&config.toolchain_repo)
        .arg("go")
        .dir(layout.root())
        .clear_env()
        .envs(config.inherited_env())
        .allow_fail()
        .run()
        .map_err(|e| fetch_err(format!("{:#}", e)))?;
    if !result.success() {
        return Err(fetch_err(format!(
            "git clone exited with {}: {}",
            result.code(),
            result.diagnostic()
        )));
    }

    verify_version(config)?;
    Ok(FetchState::Cloned)
}

/// The first line of `go/VERSION` must be exactly the pinned version.
/// Newer releases append a `time ...` line, which is ignored.
pub fn verify_version(config: &Config) -> Result<(), SourceryError> {
    let path = config.layout().version_file();
    let data = fs::read_to_string(&path).map_err(|e| SourceryError::Fetch {
        what: path.display().to_string(),
        reason: format!("reading version stamp: {}", e),
    })?;
    let found = data.lines().next().unwrap_or("");
    if found != config.toolchain_version {
        return Err(SourceryError::VersionMismatch {
            path,
            found: found.to_string(),
            wanted: config.toolchain_version.clone(),
        });
    }
    Ok(())
}

/// Run `make.bash` to produce the host compiler, linker, assembler and
/// driver under `go/bin`. Skipped when the driver exists, unless forced.
pub fn bootstrap(config: &Config) -> Result<(), SourceryError> {
    let layout = config.layout();
    let driver = layout.go_tool();
    if driver.exists() && !config.force {
        info!("[SKIP] toolchain already bootstrapped ({})", driver.display());
        return Ok(());
    }

    info!("bootstrap toolchain in {}", layout.go_src().display());
    let status = Cmd::new("bash")
        .arg("make.bash")
        .dir(&layout.go_src())
        .clear_env()
        .envs(config.inherited_env())
        .env("GOROOT_FINAL", "/go")
        .env("CGO_ENABLED", "0")
        .allow_fail()
        .run_interactive()
        .map_err(|e| SourceryError::Build {
            tool: "make.bash".to_string(),
            platform: TargetPlatform::host().to_string(),
            output: driver.clone(),
            code: -1,
            stdout: String::new(),
            stderr: format!("{:#}", e),
        })?;
    if !status.success() {
        return Err(SourceryError::Build {
            tool: "make.bash".to_string(),
            platform: TargetPlatform::host().to_string(),
            output: driver,
            code: status.code().unwrap_or(-1),
            stdout: String::new(),
            stderr: "see make.bash output above".to_string(),
        });
    }
    Ok(())
}

/// Build the `go` driver for `platform` into its bin directory.
pub fn build_driver(config: &Config, platform: &TargetPlatform) -> Result<(), SourceryError> {
    let layout = config.layout();
    let output = layout.artifact(platform, "go");
    if output.exists() && !config.force {
        info!("[SKIP] {} exists", output.display());
        return Ok(());
    }
    info!("build go driver for {}", platform);
    matrix::build(
        config,
        &layout.go_src().join("cmd"),
        "go",
        &output,
        platform,
        &[],
    )
}

/// Bootstrap (once) and build the driver for one platform.
pub fn build(config: &Config, platform: &TargetPlatform) -> Result<(), SourceryError> {
    bootstrap(config)?;
    build_driver(config, platform)
}
