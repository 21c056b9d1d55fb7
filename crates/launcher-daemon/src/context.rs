//! State built once by the bootstrap and handed to every later stage.

use std::path::PathBuf;

use tracing::level_filters::LevelFilter;

use crate::cli::CliArgs;
use crate::logging::LogLevels;
use crate::runtime::SchedulerProbe;
use crate::signal::ShutdownSignal;
use crate::state::StateCell;
use crate::trap::TrapOptions;

/// Everything later stages need from the bootstrap, passed explicitly.
#[derive(Debug, Clone)]
pub struct BootstrapContext {
    pub args: CliArgs,
    /// Absolute path of the configuration file.
    pub config_path: PathBuf,
    /// Absolute path of the environment file, when one was given.
    pub env_path: Option<PathBuf>,
    pub trap: TrapOptions,
    pub levels: LogLevels,
    pub state: StateCell,
    pub shutdown: ShutdownSignal,
    pub probe: Option<SchedulerProbe>,
}

impl BootstrapContext {
    pub fn new(args: CliArgs, config_path: PathBuf, levels: LogLevels) -> Self {
        let trap = TrapOptions {
            force_backtrace: args.debug,
            dump_stacks: args.dump_panic_ids,
        };
        Self {
            args,
            config_path,
            env_path: None,
            trap,
            levels,
            state: StateCell::new(),
            shutdown: ShutdownSignal::new(),
            probe: None,
        }
    }

    /// Active threshold for the diagnostics reporter's lines.
    pub fn diagnostics_threshold(&self) -> LevelFilter {
        self.levels.threshold_for(crate::diagnostics::TARGET)
    }
}
