//! sourcery: source-mode initramfs assembly.
//!
//! The `sourcery` binary assembles a root tree carrying a Go toolchain, the
//! sources of every command, and one dispatch stub per command. The
//! `installcommand` binary runs inside that tree and compiles each command
//! the first time it is used.

pub mod archive;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filesystem;
pub mod layout;
pub mod matrix;
pub mod pipeline;
pub mod platform;
pub mod preflight;
pub mod process;
pub mod reference;
pub mod source;
pub mod timing;
pub mod toolchain;

pub use config::Config;
pub use error::{BatchErrors, SourceryError};

/// Install the stderr log subscriber. `RUST_LOG` wins; otherwise `info`, or
/// `debug` when `verbose`.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
