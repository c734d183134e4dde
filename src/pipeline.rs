//! The assembly pipeline.
//!
//! Stages run in order, each consuming only what earlier stages produced:
//!
//! 1. skeleton directories and per-platform bin directories
//! 2. toolchain fetch (a failure here is logged; an existing checkout may do)
//! 3. toolchain bootstrap and per-platform driver build
//! 4. source acquisition, fatal unless `keep_going`
//! 5. dispatch stubs for every discovered command
//! 6. tool matrix (installer and init for every platform)
//! 7. archive packaging, when an output is configured
//!
//! The run ends with suggestions for trying the tree by hand.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::archive::pack::{self, PackSummary};
use crate::config::Config;
use crate::filesystem;
use crate::matrix::{self, MatrixReport};
use crate::source::{self, Acquisition};
use crate::timing::Timer;
use crate::toolchain;

/// What a completed run produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub root: PathBuf,
    pub acquisition: Acquisition,
    pub stubs: Vec<PathBuf>,
    pub matrix: MatrixReport,
    pub archive: Option<PackSummary>,
}

/// Run every stage against `config`.
pub fn run(config: &Config) -> Result<PipelineReport> {
    let layout = config.layout();
    info!("assembling in {}", layout.root().display());

    let t = Timer::start("skeleton");
    filesystem::skeleton(layout.root())
        .into_result()
        .context("Creating root skeleton")?;
    for platform in &config.platforms {
        let bin = layout.platform_bin(platform);
        fs::create_dir_all(&bin).with_context(|| format!("Creating {}", bin.display()))?;
    }
    t.finish();

    let t = Timer::start("toolchain");
    if let Err(e) = toolchain::fetch(config) {
        warn!("toolchain fetch: {}, keep going", e);
    }
    for platform in &config.platforms {
        toolchain::build(config, platform)
            .with_context(|| format!("Building toolchain for {}", platform))?;
    }
    t.finish();

    let t = Timer::start("sources");
    fs::create_dir_all(layout.src())
        .with_context(|| format!("Creating {}", layout.src().display()))?;
    let acquisition = source::acquire_all(config, &config.references);
    if !acquisition.errors.is_empty() {
        if config.keep_going {
            warn!(
                "{} reference(s) failed, continuing:\n{}",
                acquisition.errors.len(),
                acquisition.errors
            );
        } else {
            bail!("Getting packages: {}", acquisition.errors);
        }
    }
    t.finish();

    let t = Timer::start("dispatch stubs");
    let mut stubs = Vec::new();
    for platform in &config.platforms {
        let bin_path = PathBuf::from(platform.bin_dir());
        let (written, errors) = filesystem::populate_dispatch_stubs(
            layout.root(),
            &bin_path,
            &layout.platform_bin(platform),
            &config.discovery_patterns,
        );
        if !errors.is_empty() {
            warn!("dispatch stubs for {}: {}", platform, errors);
        }
        stubs.extend(written);
    }
    t.finish();

    let t = Timer::start("tools");
    let base = config.tool_source_base();
    info!("build tools from {}", base.display());
    let matrix = matrix::build_all(config, &base, &config.tools, &config.platforms);
    if !matrix.errors.is_empty() {
        bail!("Building tools: {}", matrix.errors);
    }
    t.finish();

    let archive = match &config.output {
        Some(output) => {
            let t = Timer::start("archive");
            let summary = pack::pack(layout.root(), output, &config.all_excludes())
                .context("Writing archive")?;
            t.finish();
            Some(summary)
        }
        None => None,
    };

    Ok(PipelineReport {
        root: layout.root().to_path_buf(),
        acquisition,
        stubs,
        matrix,
        archive,
    })
}

/// Commands for trying the assembled tree, one per platform.
pub fn suggestions(config: &Config) -> Vec<String> {
    let root = config.root.display();
    let mut out = Vec::new();
    for platform in &config.platforms {
        let init = format!("/{}/init", platform.bin_dir());
        out.push(format!(
            "sudo strace -o syscalltrace -f unshare -m chroot {} {}",
            root, init
        ));
        out.push(format!("unshare -m chroot {} {}", root, init));
    }
    out.push(format!("rsync -avz --no-owner --no-group -I {} somewhere", root));
    out
}
