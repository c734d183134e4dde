//! Lazy build-and-exec dispatcher.
//!
//! Every command in the image starts out as a [`stub::DispatchStub`] naming
//! this dispatcher as its interpreter. On first use the dispatcher compiles
//! the command into `/ubin/<name>` with the image's own toolchain and runs
//! it; later calls find the binary and run it directly.
//!
//! Two invocation forms are accepted:
//!
//! ```text
//! installcommand '#!/src/.../date' /linux_amd64/bin/date [ARGS...]   (A: via stub)
//! installcommand [--lowpri] [--exec=BOOL] [--force] [-v] [--source DIR] COMMAND [ARGS...]  (B)
//! ```
//!
//! Two dispatchers may race to build the same command. Nothing is locked;
//! the last build to finish wins, which is harmless because both compile
//! the same source.

pub mod stub;

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use tracing::{debug, info, warn};

use crate::error::SourceryError;
use crate::layout::ImageLayout;
use crate::platform::TargetPlatform;
use crate::process::{Cmd, Outcome};

use stub::{DispatchStub, MARKER};

/// What one dispatcher call is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Command name, e.g. `date`.
    pub command: String,
    pub args: Vec<OsString>,
    /// Source directory inside the image. `None` means: read it from the
    /// command's stub.
    pub source: Option<PathBuf>,
    /// Directory the dispatcher was started from, where stubs live.
    pub dispatcher_dir: Option<PathBuf>,
    pub lowpri: bool,
    pub exec: bool,
    pub force: bool,
    pub verbose: bool,
}

/// Direct invocation flags.
#[derive(Parser, Debug)]
#[command(
    name = "installcommand",
    about = "Build a command from source on first use, then run it"
)]
struct DirectArgs {
    /// Lower the scheduling priority before building
    #[arg(long)]
    lowpri: bool,

    /// Run the command after building it
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    exec: bool,

    /// Rebuild even if the binary already exists
    #[arg(long)]
    force: bool,

    /// Print every build step
    #[arg(short = 'v')]
    verbose: bool,

    /// Source directory of the command
    #[arg(long)]
    source: Option<PathBuf>,

    /// Command to build and run
    command: String,

    /// Arguments passed to the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<OsString>,
}

fn base_name(path: &str) -> Option<String> {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

/// Interpret the dispatcher's argument vector.
pub fn parse(argv: &[OsString]) -> Result<Invocation, clap::Error> {
    let dispatcher_dir = argv
        .first()
        .and_then(|a| Path::new(a).parent())
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf);

    if let Some(src) = argv
        .get(1)
        .and_then(|a| a.to_str())
        .and_then(|a| a.strip_prefix(MARKER))
    {
        let command = argv
            .get(2)
            .and_then(|a| base_name(&a.to_string_lossy()))
            .or_else(|| base_name(src))
            .unwrap_or_default();
        return Ok(Invocation {
            command,
            args: argv.iter().skip(3).cloned().collect(),
            source: Some(PathBuf::from(src)),
            dispatcher_dir,
            lowpri: false,
            exec: true,
            force: false,
            verbose: false,
        });
    }

    let direct = DirectArgs::try_parse_from(argv)?;
    Ok(Invocation {
        command: direct.command,
        args: direct.args,
        source: direct.source,
        dispatcher_dir,
        lowpri: direct.lowpri,
        exec: direct.exec,
        force: direct.force,
        verbose: direct.verbose,
    })
}

/// Where the dispatcher finds the image.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Image root, `/` when running inside the image.
    pub root: PathBuf,
    /// Platform whose toolchain driver builds the command.
    pub platform: TargetPlatform,
}

impl DispatchSettings {
    /// `SOURCERY_ROOT` (default `/`), `GOOS`/`GOARCH` (default: host).
    pub fn from_env() -> Self {
        let get = |k: &str| std::env::var(k).ok().filter(|v| !v.is_empty());
        let host = TargetPlatform::host();
        Self {
            root: get("SOURCERY_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/")),
            platform: TargetPlatform::new(
                get("GOOS").unwrap_or(host.os),
                get("GOARCH").unwrap_or(host.arch),
            ),
        }
    }

    pub fn layout(&self) -> ImageLayout {
        ImageLayout::new(&self.root)
    }

    /// Map an image path onto the host. Relative paths are left alone.
    pub fn image_path(&self, path: &Path) -> PathBuf {
        match path.strip_prefix("/") {
            Ok(rel) => self.root.join(rel),
            Err(_) => path.to_path_buf(),
        }
    }
}

/// Lower this process's scheduling priority as far as it goes.
pub fn lower_priority() -> io::Result<()> {
    // SAFETY: setpriority has no memory-safety preconditions.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, 20) };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Source directory for `inv`, on the host.
fn source_dir(inv: &Invocation, settings: &DispatchSettings) -> Result<PathBuf, SourceryError> {
    if let Some(src) = &inv.source {
        return Ok(settings.image_path(src));
    }

    let stub_dir = inv
        .dispatcher_dir
        .clone()
        .unwrap_or_else(|| settings.layout().platform_bin(&settings.platform));
    let stub_path = stub_dir.join(&inv.command);
    let stub = DispatchStub::read(&stub_path).map_err(|e| SourceryError::DispatchBuild {
        command: inv.command.clone(),
        source_dir: stub_path.clone(),
        reason: format!("no --source given and no usable stub: {}", e),
    })?;
    debug!("{} names source {}", stub_path.display(), stub.source.display());
    Ok(settings.image_path(&stub.source))
}

/// Compile `inv.command` into `artifact` with the image toolchain.
fn build(
    inv: &Invocation,
    settings: &DispatchSettings,
    artifact: &Path,
) -> Result<(), SourceryError> {
    let layout = settings.layout();
    let source = source_dir(inv, settings)?;
    let build_err = |reason: String| SourceryError::DispatchBuild {
        command: inv.command.clone(),
        source_dir: source.clone(),
        reason,
    };

    info!("build {} from {}", inv.command, source.display());
    let mut cmd = Cmd::new(layout.artifact(&settings.platform, "go")).arg("build");
    if inv.verbose {
        cmd = cmd.args(["-v", "-x"]);
    }
    let outcome = cmd
        .arg("-o")
        .arg_path(artifact)
        .dir(&source)
        .clear_env()
        .env("GOCACHE", layout.cache_dir())
        .env("CGO_ENABLED", "0")
        .env("GOROOT", layout.goroot())
        .env("GOPATH", layout.src())
        .outcome();

    match outcome {
        Outcome::ExitCode(0) => Ok(()),
        Outcome::ExitCode(code) => Err(build_err(format!("go build exited with {}", code))),
        Outcome::Signaled(sig) => Err(build_err(format!("go build killed by signal {}", sig))),
        Outcome::LaunchFailed(e) => Err(build_err(e)),
    }
}

/// Run the built command and map how it ended to our exit status.
fn run(inv: &Invocation, artifact: &Path) -> Result<i32, SourceryError> {
    debug!("run {} {:?}", artifact.display(), inv.args);
    match Cmd::new(artifact).args(&inv.args).outcome() {
        Outcome::LaunchFailed(reason) => Err(SourceryError::DispatchExec {
            artifact: artifact.to_path_buf(),
            reason,
        }),
        Outcome::Signaled(sig) => {
            warn!("{} killed by signal {}", inv.command, sig);
            Ok(Outcome::Signaled(sig).exit_status())
        }
        outcome => Ok(outcome.exit_status()),
    }
}

/// Build the command if needed, then run it when asked. Returns the status
/// the dispatcher should exit with.
pub fn dispatch(inv: &Invocation, settings: &DispatchSettings) -> Result<i32, SourceryError> {
    debug!("dispatch {:?}", inv);

    if inv.lowpri {
        if let Err(e) = lower_priority() {
            warn!("cannot lower priority: {}", e);
        }
    }

    let artifact = settings.layout().ubin().join(&inv.command);

    // Someone else may have built it already.
    if artifact.exists() && !inv.force {
        if !inv.exec {
            return Ok(0);
        }
        return run(inv, &artifact);
    }

    build(inv, settings, &artifact)?;

    if inv.exec {
        return run(inv, &artifact);
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<OsString> {
        items.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_stub_form() {
        let inv = parse(&argv(&[
            "/linux_amd64/bin/installcommand",
            "#!/src/github.com/u-root/u-root/cmds/core/date",
            "/linux_amd64/bin/date",
            "-u",
        ]))
        .unwrap();
        assert_eq!(inv.command, "date");
        assert_eq!(
            inv.source,
            Some(PathBuf::from("/src/github.com/u-root/u-root/cmds/core/date"))
        );
        assert_eq!(inv.args, argv(&["-u"]));
        assert_eq!(inv.dispatcher_dir, Some(PathBuf::from("/linux_amd64/bin")));
        assert!(inv.exec);
        assert!(!inv.force);
        assert!(!inv.lowpri);
    }

    #[test]
    fn test_stub_form_without_stub_path() {
        let inv = parse(&argv(&["installcommand", "#!/src/x/ls"])).unwrap();
        assert_eq!(inv.command, "ls");
        assert!(inv.args.is_empty());
        assert_eq!(inv.dispatcher_dir, None);
    }

    #[test]
    fn test_direct_form() {
        let inv = parse(&argv(&[
            "installcommand",
            "--lowpri",
            "--exec=false",
            "--force",
            "-v",
            "--source",
            "/src/x/ls",
            "ls",
            "-l",
            "/tmp",
        ]))
        .unwrap();
        assert_eq!(inv.command, "ls");
        assert_eq!(inv.args, argv(&["-l", "/tmp"]));
        assert_eq!(inv.source, Some(PathBuf::from("/src/x/ls")));
        assert!(inv.lowpri && inv.force && inv.verbose);
        assert!(!inv.exec);
    }

    #[test]
    fn test_direct_form_defaults() {
        let inv = parse(&argv(&["installcommand", "date"])).unwrap();
        assert!(inv.exec);
        assert!(!inv.force && !inv.lowpri && !inv.verbose);
        assert_eq!(inv.source, None);
    }

    #[test]
    fn test_direct_form_requires_command() {
        assert!(parse(&argv(&["installcommand"])).is_err());
        assert!(parse(&argv(&["installcommand", "--force"])).is_err());
    }

    #[test]
    fn test_image_path() {
        let s = DispatchSettings {
            root: PathBuf::from("/tmp/img"),
            platform: TargetPlatform::new("linux", "amd64"),
        };
        assert_eq!(s.image_path(Path::new("/src/a")), PathBuf::from("/tmp/img/src/a"));
        assert_eq!(s.image_path(Path::new("rel")), PathBuf::from("rel"));
    }
}
