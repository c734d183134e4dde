//! Dispatcher tests.
//!
//! Each test lays out a miniature image under a temp root: a fake platform
//! driver at `/linux_amd64/bin/go`, command sources under `/src`, and an
//! empty `/ubin`.

mod helpers;

use helpers::{install, write_script, TestEnv};
use serial_test::serial;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use sourcery::dispatch::stub::DispatchStub;
use sourcery::dispatch::{self, DispatchSettings};
use sourcery::error::SourceryError;
use sourcery::platform::TargetPlatform;

struct Image {
    env: TestEnv,
    settings: DispatchSettings,
}

impl Image {
    fn new() -> Self {
        let env = TestEnv::new();
        let platform = TargetPlatform::new("linux", "amd64");
        install(&env.fake_go(), &env.root.join("linux_amd64/bin/go"));
        fs::create_dir_all(env.root.join("ubin")).unwrap();
        let settings = DispatchSettings {
            root: env.root.clone(),
            platform,
        };
        Self { env, settings }
    }

    /// A command whose built binary runs `body`.
    fn command(&self, name: &str, body: &str) -> PathBuf {
        let src = self.env.root.join("src/example.org/cmds").join(name);
        write_script(&src.join("main.sh"), &format!("#!/bin/sh\n{}\n", body));
        src
    }

    fn artifact(&self, name: &str) -> PathBuf {
        self.env.root.join("ubin").join(name)
    }

    fn builds(&self) -> usize {
        self.env.calls_matching("go build").len()
    }
}

/// The `installcommand` binary, pointed at `image`.
fn installcommand(image: &Image) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_installcommand"));
    cmd.env("SOURCERY_ROOT", &image.env.root)
        .env("GOOS", "linux")
        .env("GOARCH", "amd64")
        .env("RUST_LOG", "warn");
    cmd
}

fn argv(items: &[&str]) -> Vec<OsString> {
    items.iter().map(OsString::from).collect()
}

fn stub_argv<'a>(name: &'a str, stub_path: &'a str, extra: &[&'a str]) -> Vec<OsString> {
    let src = format!("#!/src/example.org/cmds/{}", name);
    let mut v = vec![
        OsString::from("/linux_amd64/bin/installcommand"),
        OsString::from(src),
        OsString::from(stub_path),
    ];
    v.extend(extra.iter().map(OsString::from));
    v
}

#[test]
#[serial]
fn test_stub_form_builds_before_exec() {
    let image = Image::new();
    image.command("hello", "exit 0");

    let inv = dispatch::parse(&stub_argv("hello", "/linux_amd64/bin/hello", &[])).unwrap();
    let status = dispatch::dispatch(&inv, &image.settings).unwrap();

    assert_eq!(status, 0);
    assert!(image.artifact("hello").exists());
    assert_eq!(image.builds(), 1);

    let build = &image.env.calls_matching("go build")[0];
    assert!(build.contains(&format!("-o {}", image.artifact("hello").display())));
    assert!(build.contains("src/example.org/cmds/hello"));
    // not verbose
    assert!(!build.contains(" -x "));
}

#[test]
#[serial]
fn test_no_build_when_binary_present() {
    let image = Image::new();
    image.command("hello", "exit 0");
    let inv = dispatch::parse(&stub_argv("hello", "/linux_amd64/bin/hello", &[])).unwrap();

    dispatch::dispatch(&inv, &image.settings).unwrap();
    // The driver can vanish once the binary exists.
    fs::remove_file(image.env.root.join("linux_amd64/bin/go")).unwrap();
    let status = dispatch::dispatch(&inv, &image.settings).unwrap();

    assert_eq!(status, 0);
    assert_eq!(image.builds(), 1);
}

#[test]
#[serial]
fn test_exit_status_is_forwarded() {
    let image = Image::new();
    image.command("three", "exit 3");

    let inv = dispatch::parse(&stub_argv("three", "/linux_amd64/bin/three", &[])).unwrap();
    assert_eq!(dispatch::dispatch(&inv, &image.settings).unwrap(), 3);
    // and again from the already-built binary
    assert_eq!(dispatch::dispatch(&inv, &image.settings).unwrap(), 3);
}

#[test]
#[serial]
fn test_arguments_reach_the_command() {
    let image = Image::new();
    let out = image.env.work.join("args.txt");
    image.command("echoargs", &format!("echo \"$@\" > '{}'", out.display()));

    let inv = dispatch::parse(&stub_argv(
        "echoargs",
        "/linux_amd64/bin/echoargs",
        &["-l", "two words"],
    ))
    .unwrap();
    assert_eq!(dispatch::dispatch(&inv, &image.settings).unwrap(), 0);
    assert_eq!(fs::read_to_string(&out).unwrap(), "-l two words\n");
}

#[test]
#[serial]
fn test_signal_maps_to_fixed_status() {
    let image = Image::new();
    image.command("crash", "kill -9 $$");

    let inv = dispatch::parse(&stub_argv("crash", "/linux_amd64/bin/crash", &[])).unwrap();
    assert_eq!(dispatch::dispatch(&inv, &image.settings).unwrap(), 1);
}

#[test]
#[serial]
fn test_build_failure_is_dispatch_build_error() {
    let image = Image::new();
    let src = image.command("broken", "exit 0");
    fs::write(src.join("fail_build"), "").unwrap();

    let inv = dispatch::parse(&stub_argv("broken", "/linux_amd64/bin/broken", &[])).unwrap();
    let err = dispatch::dispatch(&inv, &image.settings).unwrap_err();

    assert!(matches!(err, SourceryError::DispatchBuild { .. }));
    assert!(!image.artifact("broken").exists());
}

#[test]
#[serial]
fn test_direct_form_without_exec_only_builds() {
    let image = Image::new();
    let marker = image.env.work.join("ran");
    image.command("quiet", &format!("touch '{}'", marker.display()));

    let inv = dispatch::parse(&argv(&[
        "installcommand",
        "--exec=false",
        "-v",
        "--source",
        "/src/example.org/cmds/quiet",
        "quiet",
    ]))
    .unwrap();
    assert_eq!(dispatch::dispatch(&inv, &image.settings).unwrap(), 0);

    assert!(image.artifact("quiet").exists());
    assert!(!marker.exists());
    assert_eq!(image.env.calls_matching("go build -v -x -o").len(), 1);
}

#[test]
#[serial]
fn test_direct_form_force_rebuilds() {
    let image = Image::new();
    image.command("again", "exit 0");
    let stub_arg = stub_argv("again", "/linux_amd64/bin/again", &[]);
    dispatch::dispatch(&dispatch::parse(&stub_arg).unwrap(), &image.settings).unwrap();

    let inv = dispatch::parse(&argv(&[
        "installcommand",
        "--force",
        "--exec=false",
        "--source",
        "/src/example.org/cmds/again",
        "again",
    ]))
    .unwrap();
    dispatch::dispatch(&inv, &image.settings).unwrap();
    assert_eq!(image.builds(), 2);
}

#[test]
#[serial]
fn test_direct_form_finds_source_through_stub() {
    let image = Image::new();
    image.command("viastub", "exit 4");
    let bin = image.env.root.join("linux_amd64/bin");
    DispatchStub::new(
        Path::new("linux_amd64/bin"),
        Path::new("src/example.org/cmds/viastub"),
    )
    .write(&bin.join("viastub"))
    .unwrap();

    let dispatcher = bin.join("installcommand");
    let inv = dispatch::parse(&argv(&[&dispatcher.to_string_lossy(), "viastub"])).unwrap();
    assert_eq!(inv.dispatcher_dir.as_deref(), Some(bin.as_path()));
    assert_eq!(dispatch::dispatch(&inv, &image.settings).unwrap(), 4);
}

#[test]
#[serial]
fn test_direct_form_without_stub_or_source_fails() {
    let image = Image::new();
    let inv = dispatch::parse(&argv(&["installcommand", "nosuch"])).unwrap();
    let err = dispatch::dispatch(&inv, &image.settings).unwrap_err();
    assert!(matches!(err, SourceryError::DispatchBuild { .. }));
}

// =============================================================================
// The installcommand binary
// =============================================================================

#[test]
#[serial]
fn test_binary_exits_with_command_status() {
    let image = Image::new();
    image.command("three", "exit 3");

    let status = installcommand(&image)
        .args(["#!/src/example.org/cmds/three", "/linux_amd64/bin/three"])
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(3));
    assert!(image.artifact("three").exists());
    assert_eq!(image.builds(), 1);
}

#[test]
#[serial]
fn test_binary_reports_build_failure() {
    let image = Image::new();
    let src = image.command("broken", "exit 0");
    fs::write(src.join("fail_build"), "").unwrap();

    let status = installcommand(&image)
        .args(["#!/src/example.org/cmds/broken", "/linux_amd64/bin/broken"])
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(1));
    assert!(!image.artifact("broken").exists());
}

#[test]
#[serial]
fn test_binary_lowpri_lowers_niceness() {
    let image = Image::new();
    let out = image.env.work.join("nice.txt");
    // Field 19 of /proc/<pid>/stat is the nice value.
    image.command(
        "nicecheck",
        &format!(
            "read -r stat < /proc/$$/stat\nset -- $stat\necho \"${{19}}\" > '{}'",
            out.display()
        ),
    );

    let status = installcommand(&image)
        .args([
            "--lowpri",
            "--source",
            "/src/example.org/cmds/nicecheck",
            "nicecheck",
        ])
        .status()
        .unwrap();

    assert_eq!(status.code(), Some(0));
    assert_eq!(fs::read_to_string(&out).unwrap().trim(), "19");
}
