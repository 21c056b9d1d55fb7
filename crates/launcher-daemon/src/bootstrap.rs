//! Bootstrap sequencer: arguments, configuration, logging, validation,
//! tunables, then the lifecycle host.
//!
//! Every stage short-circuits to its own exit status. Failures before the
//! logger exists go to stderr; later ones go to the log.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, warn};

use launcher_config::{
    ConfigLoader, ConfigValidator, EnvFile, LoadedConfig, SecretMasker, ValidationWarning,
};

use crate::app::{AppInfo, Application};
use crate::cli::CliArgs;
use crate::context::BootstrapContext;
use crate::error::{ExitStatus, LauncherError};
use crate::host;
use crate::logging;
use crate::runtime::{self, Tunables};
use crate::state::LifecycleState;
use crate::trap::{run_trapped, TrapOptions};

const CONFIG_EXTENSION: &str = "toml";
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `app` with the process arguments and return the exit code for `main`.
pub fn run<A: Application>(app: A, info: AppInfo) -> ExitCode {
    run_with_args(&app, &info, std::env::args_os())
}

/// Run `app` with explicit arguments (the first one is the program name).
pub fn run_with_args<A, I, T>(app: &A, info: &AppInfo, args: I) -> ExitCode
where
    A: Application,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match CliArgs::try_parse_from(args) {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(2));
        }
    };

    if args.version {
        eprintln!("{}", info.version_text());
        return ExitStatus::Version.into();
    }

    let options = TrapOptions {
        force_backtrace: args.debug,
        dump_stacks: args.dump_panic_ids,
    };
    let outcome = run_trapped("bootstrap", options, || bootstrap(app, args))
        .unwrap_or_else(|rec| Err(LauncherError::from(rec).exit_status()));

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(status) => status.into(),
    }
}

/// Stages 3 to 9. Returns the failure status; the cause is already reported.
fn bootstrap<A: Application>(app: &A, args: CliArgs) -> Result<(), ExitStatus> {
    let (config, env_path, warnings) = prepare::<A>(&args).map_err(|e| {
        eprintln!("{}", e);
        e.exit_status()
    })?;

    let guard = logging::init(&config.common, !args.disable_console_log).map_err(|e| {
        eprintln!("{}", e);
        e.exit_status()
    })?;

    debug!("{}", config_dump(&config));
    for w in warnings {
        warn!("Config {}: {}", w.path, w.message);
    }

    let mut ctx = BootstrapContext::new(args, config.path.clone(), guard.levels().clone());
    ctx.env_path = env_path;

    let result = launch(app, &config, &mut ctx);
    match result {
        Ok(()) => {
            info!("{} finished", config.common.name);
            Ok(())
        }
        Err(e) => {
            let status = e.exit_status();
            ctx.state.fail(status);
            info!("{} exited with status {}", config.common.name, status);
            Err(status)
        }
    }
}

type Prepared<C> = (LoadedConfig<C>, Option<PathBuf>, Vec<ValidationWarning>);

/// Resolve paths, load the environment file and the configuration, and check
/// the configuration's structure.
fn prepare<A: Application>(args: &CliArgs) -> Result<Prepared<A::Config>, LauncherError> {
    let config_path = resolve_config_path(args.config.as_deref())?;

    let env_path = match &args.env_file {
        Some(path) => Some(load_env_file(path)?),
        None => None,
    };

    let config = ConfigLoader::load::<A::Config>(&config_path).map_err(|source| {
        if source.is_structural() {
            LauncherError::ConfigStructure(source.to_string())
        } else {
            LauncherError::ConfigFile {
                path: config_path.clone(),
                source,
            }
        }
    })?;

    let validation = ConfigValidator::validate(&config.common);
    if !validation.is_valid() {
        return Err(LauncherError::ConfigStructure(validation.error_summary()));
    }

    Ok((config, env_path, validation.warnings))
}

/// Stages that run with the logger in place.
fn launch<A: Application>(
    app: &A,
    config: &LoadedConfig<A::Config>,
    ctx: &mut BootstrapContext,
) -> Result<(), LauncherError> {
    ctx.state.transition(LifecycleState::ConfigLoaded)?;

    app.check_config(config).map_err(|e| {
        error!(severity = "alert", "Config errors: {:#}", e);
        LauncherError::ConfigErrors(format!("{:#}", e))
    })?;
    ctx.state.transition(LifecycleState::Validated)?;

    let common = &config.common;
    let (rt, probe) = runtime::build(&common.name, Tunables::from_common(common)).map_err(|e| {
        error!(severity = "crit", "{}", e);
        e
    })?;
    ctx.probe = probe;

    {
        let _enter = rt.enter();
        ctx.shutdown.install_os_handlers().map_err(|e| {
            error!(severity = "crit", "{}", e);
            e
        })?;
    }

    let host = host::select::<A>(host::is_interactive(), ctx.args.service);
    debug!("Lifecycle host: {}", host.name());
    let result = host.run(app, config, ctx, &rt);

    rt.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

/// The configuration text as logged at debug level, secrets masked.
fn config_dump<C>(config: &LoadedConfig<C>) -> String {
    let masker = SecretMasker::new(&config.common.masked_keys());
    format!(
        "Config file {}:\n>>>\n{}\n<<<",
        config.path.display(),
        masker.mask(&config.text)
    )
}

/// Absolute configuration path: the explicit one, else `<exe dir>/<exe stem>.toml`.
/// The file must exist.
fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, LauncherError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => default_config_path().ok_or_else(|| {
            LauncherError::MissingConfig("cannot derive a default from the executable".to_string())
        })?,
    };

    let path = std::path::absolute(&path)
        .map_err(|e| LauncherError::MissingConfig(format!("{}: {}", path.display(), e)))?;
    if !path.is_file() {
        return Err(LauncherError::MissingConfig(format!(
            "{} does not exist (use --config)",
            path.display()
        )));
    }
    Ok(path)
}

fn default_config_path() -> Option<PathBuf> {
    config_path_for(&std::env::current_exe().ok()?)
}

/// `<dir>/<name>.toml`, where `name` is the executable's file name without a
/// platform executable suffix. Dots in the name are kept.
fn config_path_for(exe: &Path) -> Option<PathBuf> {
    let mut name = exe.file_name()?.to_os_string();
    let exe_suffix = std::env::consts::EXE_SUFFIX;
    if !exe_suffix.is_empty() {
        if let Some(stripped) = name.to_str().and_then(|n| n.strip_suffix(exe_suffix)) {
            name = stripped.into();
        }
    }
    name.push(".");
    name.push(CONFIG_EXTENSION);
    Some(exe.parent()?.join(name))
}

fn load_env_file(path: &Path) -> Result<PathBuf, LauncherError> {
    let env_error = |source: launcher_config::ConfigError| LauncherError::EnvFile {
        path: path.to_path_buf(),
        source,
    };

    let path = std::path::absolute(path).map_err(|e| env_error(e.into()))?;
    let env = EnvFile::load(&path).map_err(env_error)?;
    env.apply();
    Ok(path)
}

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;
