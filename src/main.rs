//! sourcery - source-mode initramfs builder.
//!
//! Assembles a root tree with an embedded Go toolchain, command sources and
//! dispatch stubs, and optionally packs it into a newc cpio archive.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use sourcery::commands;
use sourcery::config::{self, Config};
use sourcery::platform::{go_arch, go_os, TargetPlatform};

#[derive(Parser)]
#[command(name = "sourcery")]
#[command(about = "Source-mode initramfs builder")]
#[command(
    after_help = "QUICK START:\n  sourcery preflight                      Check host tools\n  sourcery build --cpio /tmp/initramfs.cpio   Assemble and pack\n  sourcery inspect /tmp/initramfs.cpio    List archive records"
)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the tree (and the archive, with --cpio)
    Build {
        /// Assembly root (default: a fresh sourcery<pid> directory under the temp dir)
        #[arg(short = 'd', long)]
        dest: Option<PathBuf>,

        /// Write a newc cpio archive of the tree here
        #[arg(long)]
        cpio: Option<PathBuf>,

        /// Target operating systems (repeatable or comma separated)
        #[arg(long = "os", value_delimiter = ',')]
        oses: Vec<String>,

        /// Target architectures (repeatable or comma separated)
        #[arg(long = "arch", value_delimiter = ',')]
        arches: Vec<String>,

        /// Extra archive exclusion regex (repeatable)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Build installcommand and init from the working directory instead of the acquired copy
        #[arg(short = 'D', long, default_value_t = true, action = ArgAction::Set)]
        development: bool,

        /// Rebuild artifacts that already exist
        #[arg(long)]
        force: bool,

        /// Continue when some references fail to fetch
        #[arg(long)]
        keep_going: bool,

        /// Toolchain release tag to clone
        #[arg(long)]
        toolchain_version: Option<String>,

        /// Don't run preflight checks first
        #[arg(long)]
        skip_preflight: bool,

        /// Extra references to acquire ([user@]host:path[#ref])
        references: Vec<String>,
    },

    /// List the records of a newc archive
    Inspect {
        archive: PathBuf,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run preflight checks
    Preflight {
        /// Assembly root to check
        #[arg(short = 'd', long)]
        dest: Option<PathBuf>,

        /// Fail on warnings too (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show the effective configuration
    Config {
        /// Assembly root
        #[arg(short = 'd', long)]
        dest: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_config(dest: Option<PathBuf>) -> Config {
    let root = dest.unwrap_or_else(|| config::default_root(&std::env::temp_dir()));
    Config::from_env(root)
}

/// Cross product of the requested names, falling back to the configured
/// platform for whichever list is empty.
fn platforms(config: &Config, oses: &[String], arches: &[String]) -> Vec<TargetPlatform> {
    let fallback = &config.platforms[0];
    let oses: Vec<String> = if oses.is_empty() {
        vec![fallback.os.clone()]
    } else {
        oses.iter().map(|o| go_os(o).to_string()).collect()
    };
    let arches: Vec<String> = if arches.is_empty() {
        vec![fallback.arch.clone()]
    } else {
        arches.iter().map(|a| go_arch(a).to_string()).collect()
    };
    TargetPlatform::product(&oses, &arches)
}

fn main() -> Result<()> {
    // Load .env if present; the process environment wins.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    sourcery::init_tracing(cli.verbose);

    match cli.command {
        Commands::Build {
            dest,
            cpio,
            oses,
            arches,
            filters,
            development,
            force,
            keep_going,
            toolchain_version,
            skip_preflight,
            references,
        } => {
            let mut config = load_config(dest);
            config.platforms = platforms(&config, &oses, &arches);
            config.output = cpio;
            config.excludes = filters;
            config.development = development;
            config.force = force;
            config.keep_going = keep_going;
            config.references = references;
            if let Some(version) = toolchain_version {
                config.toolchain_version = version;
            }
            commands::cmd_build(&config, skip_preflight)?;
        }

        Commands::Inspect { archive, json } => {
            commands::cmd_inspect(&archive, json)?;
        }

        Commands::Preflight { dest, strict } => {
            let config = load_config(dest);
            commands::cmd_preflight(&config, strict)?;
        }

        Commands::Show { what } => match what {
            ShowTarget::Config { dest, json } => {
                let config = load_config(dest);
                commands::cmd_show(commands::show::ShowTarget::Config { json }, &config)?;
            }
        },
    }

    Ok(())
}
