//! Launcher reference service.
//!
//! Runs the echo HTTP listener under the launcher:
//!
//! ```text
//! launcher --config launcher.toml
//! launcher --config /etc/launcher.toml --service install
//! ```

mod echo;

use std::process::ExitCode;

use launcher_daemon::{app_info, bootstrap, CountingAllocator};

#[global_allocator]
static ALLOC: CountingAllocator = CountingAllocator;

fn main() -> ExitCode {
    bootstrap::run(echo::EchoApp, app_info!())
}
