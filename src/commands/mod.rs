//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `build` - Assemble the tree and optionally the archive
//! - `inspect` - List the records of an archive
//! - `show` - Display information
//! - `preflight` - Run preflight checks

pub mod build;
pub mod inspect;
mod preflight;
pub mod show;

pub use build::cmd_build;
pub use inspect::cmd_inspect;
pub use preflight::cmd_preflight;
pub use show::cmd_show;
