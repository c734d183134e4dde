//! installcommand - builds a command from source on first use, then runs it.
//!
//! ```text
//! STUB [ARGS...]                                     (via a dispatch stub)
//! installcommand [OPTIONS] COMMAND [ARGS...]
//! ```
//!
//! `SOURCERY_ROOT` relocates the image root (default `/`).

use std::ffi::OsString;
use std::process;

use tracing::error;

use sourcery::dispatch::{self, DispatchSettings};
use sourcery::process::ABNORMAL_EXIT_STATUS;

fn main() {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let invocation = match dispatch::parse(&argv) {
        Ok(inv) => inv,
        Err(e) => e.exit(),
    };
    sourcery::init_tracing(invocation.verbose);

    let settings = DispatchSettings::from_env();
    match dispatch::dispatch(&invocation, &settings) {
        Ok(status) => process::exit(status),
        Err(e) => {
            error!("{}", e);
            process::exit(ABNORMAL_EXIT_STATUS);
        }
    }
}
