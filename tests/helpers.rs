//! Shared test utilities for sourcery tests.
//!
//! The pipeline shells out to `git` and the Go driver. Tests replace both with
//! small shell scripts that log every call and act out the happy path, with a
//! few marker files to force failures:
//!
//! - a clone URL containing `fail` exits 128
//! - `fail_<os>_<arch>` in a build directory fails that platform's build,
//!   `fail_build` fails every build there
//! - `tidy_fail` in a module directory fails `go mod tidy`
//! - `main.sh` in a build directory becomes the built binary

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use sourcery::config::Config;
use sourcery::platform::TargetPlatform;

/// Test environment: an assembly root, a working directory and fake tools.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Assembly root
    pub root: PathBuf,
    /// Working directory (development-mode tool sources)
    pub work: PathBuf,
    /// Directory holding the fake tools
    pub tools: PathBuf,
    /// Every fake tool call, one line each
    pub log: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let root = base.join("root");
        let work = base.join("work");
        let tools = base.join("tools");
        let log = base.join("calls.log");

        for dir in [&root, &work, &tools] {
            fs::create_dir_all(dir).expect("Failed to create test dir");
        }
        fs::write(&log, "").expect("Failed to create log");

        let env = Self {
            _temp_dir: temp_dir,
            root,
            work,
            tools,
            log,
        };
        write_script(&env.fake_go(), &fake_go_script(&env.log));
        write_script(&env.fake_git(), &fake_git_script(&env.log, &env.fake_go()));
        env
    }

    pub fn fake_go(&self) -> PathBuf {
        self.tools.join("go")
    }

    pub fn fake_git(&self) -> PathBuf {
        self.tools.join("git")
    }

    /// Config for this environment: fake git, one linux/amd64 platform.
    pub fn config(&self) -> Config {
        let vars = vec![(
            "PATH".to_string(),
            std::env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".to_string()),
        )];
        let mut config = Config::from_vars(self.root.clone(), self.work.clone(), vars);
        config.git = self.fake_git();
        config.platforms = vec![TargetPlatform::new("linux", "amd64")];
        config
    }

    /// Put the fake driver where the bootstrap would have left it.
    pub fn install_bootstrapped_go(&self) {
        install(&self.fake_go(), &self.root.join("go/bin/go"));
    }

    /// Every logged call, in order.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .expect("Failed to read log")
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Logged calls starting with `prefix`.
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }
}

/// Write an executable script.
pub fn write_script(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir for script");
    }
    fs::write(path, body).expect("Failed to write script");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .expect("Failed to set permissions");
}

/// Copy an executable into place.
pub fn install(from: &Path, to: &Path) {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::copy(from, to).expect("Failed to copy executable");
    fs::set_permissions(to, fs::Permissions::from_mode(0o755))
        .expect("Failed to set permissions");
}

fn fake_go_script(log: &Path) -> String {
    format!(
        r#"#!/bin/sh
PATH=/usr/bin:/bin
export PATH
echo "go $* [dir=$PWD goos=$GOOS goarch=$GOARCH]" >> '{log}'
case "$1" in
build)
    out=""
    while [ $# -gt 0 ]; do
        if [ "$1" = "-o" ]; then out="$2"; shift; fi
        shift
    done
    if [ -e fail_build ] || [ -e "fail_${{GOOS}}_${{GOARCH}}" ]; then
        echo "compile error for $GOOS/$GOARCH" >&2
        exit 2
    fi
    if [ -e main.sh ]; then
        cp main.sh "$out"
    else
        printf '#!/bin/sh\necho built for %s/%s\n' "$GOOS" "$GOARCH" > "$out"
    fi
    chmod 755 "$out"
    ;;
mod)
    case "$2" in
    init)
        echo "module $3" > go.mod
        ;;
    tidy)
        if [ -e tidy_fail ]; then
            echo "tidy failed" >&2
            exit 1
        fi
        ;;
    esac
    ;;
esac
exit 0
"#,
        log = log.display()
    )
}

fn fake_git_script(log: &Path, go: &Path) -> String {
    format!(
        r#"#!/bin/sh
PATH=/usr/bin:/bin
export PATH
echo "git $*" >> '{log}'
[ "$1" = clone ] || exit 1
branch=""
[ "$2" = "-b" ] && branch="$3"
url=""
dest=""
for a in "$@"; do
    url="$dest"
    dest="$a"
done
case "$url" in
*fail*)
    echo "fatal: repository '$url' not found" >&2
    exit 128
    ;;
esac
mkdir -p "$dest/.git"
if [ "$dest" = go ]; then
    echo "$branch" > go/VERSION
    mkdir -p go/bin go/src/cmd/go
    cp '{go}' go/bin/go
    chmod 755 go/bin/go
fi
exit 0
"#,
        log = log.display(),
        go = go.display()
    )
}
