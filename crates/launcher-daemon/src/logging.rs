//! Logging setup: console and rolling file sinks, per-target levels, line cap.

use std::collections::BTreeMap;
use std::io::{self, Write};

use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::time::{ChronoLocal, ChronoUtc};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use launcher_config::{level_filter, CommonConfig, LogRotation};

use crate::error::LauncherError;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Active levels: a global threshold plus per-target overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLevels {
    pub global: LevelFilter,
    pub targets: BTreeMap<String, LevelFilter>,
}

impl LogLevels {
    pub fn from_common(common: &CommonConfig) -> Result<Self, LauncherError> {
        let global = level_filter(&common.log_level).ok_or_else(|| {
            LauncherError::Logging(format!("unknown log level '{}'", common.log_level))
        })?;

        let mut targets = BTreeMap::new();
        for (target, name) in &common.log_levels {
            let level = level_filter(name).ok_or_else(|| {
                LauncherError::Logging(format!("unknown log level '{}' for '{}'", name, target))
            })?;
            targets.insert(target.clone(), level);
        }

        Ok(Self { global, targets })
    }

    /// Threshold in effect for `target`: the longest matching override, else global.
    pub fn threshold_for(&self, target: &str) -> LevelFilter {
        self.targets
            .iter()
            .filter(|(prefix, _)| {
                target == prefix.as_str()
                    || target
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with("::"))
            })
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, level)| *level)
            .unwrap_or(self.global)
    }

    pub fn to_filter(&self) -> Result<EnvFilter, LauncherError> {
        let mut filter = EnvFilter::builder()
            .with_default_directive(self.global.into())
            .parse("")
            .map_err(|e| LauncherError::Logging(e.to_string()))?;

        for (target, level) in &self.targets {
            let directive: Directive = format!("{}={}", target, level)
                .parse()
                .map_err(|e| LauncherError::Logging(format!("'{}': {}", target, e)))?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }
}

/// Keeps the file writer alive; dropping it flushes buffered lines.
pub struct LogGuard {
    file: Option<WorkerGuard>,
    installed: bool,
    levels: LogLevels,
}

impl LogGuard {
    /// Whether this call installed the global subscriber.
    pub fn installed(&self) -> bool {
        self.installed
    }

    pub fn levels(&self) -> &LogLevels {
        &self.levels
    }
}

impl std::fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogGuard")
            .field("file", &self.file.is_some())
            .field("installed", &self.installed)
            .field("levels", &self.levels)
            .finish()
    }
}

/// Configure the global subscriber from the common section.
pub fn init(common: &CommonConfig, console: bool) -> Result<LogGuard, LauncherError> {
    let levels = LogLevels::from_common(common)?;
    let filter = levels.to_filter()?;
    let max_len = common.log_max_string_len;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if console {
        layers.push(fmt_layer(
            Truncating::new(io::stdout, max_len),
            true,
            common.log_json,
            common.log_local_time,
        ));
    }

    let mut file_guard = None;
    if let Some(dir) = common.log_dir() {
        std::fs::create_dir_all(&dir)
            .map_err(|e| LauncherError::Logging(format!("{}: {}", dir.display(), e)))?;

        let rotation = match common.log_rotation() {
            Some(LogRotation::Minutely) => Rotation::MINUTELY,
            Some(LogRotation::Hourly) => Rotation::HOURLY,
            Some(LogRotation::Daily) => Rotation::DAILY,
            Some(LogRotation::Never) => Rotation::NEVER,
            None => {
                return Err(LauncherError::Logging(format!(
                    "unknown log rotation '{}'",
                    common.log_rotation
                )));
            }
        };

        let mut builder = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(&common.name)
            .filename_suffix("log");
        if common.log_max_files > 0 {
            builder = builder.max_log_files(common.log_max_files);
        }
        let appender = builder
            .build(&dir)
            .map_err(|e| LauncherError::Logging(e.to_string()))?;

        let mut nb = NonBlockingBuilder::default().lossy(false);
        if common.log_buffer_size > 0 {
            nb = nb.buffered_lines_limit(common.log_buffer_size);
        }
        let (writer, guard) = nb.finish(appender);
        file_guard = Some(guard);

        layers.push(fmt_layer(
            Truncating::new(writer, max_len),
            false,
            common.log_json,
            common.log_local_time,
        ));
    }

    let installed = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .is_ok();
    if !installed {
        warn!("A global log subscriber is already installed, keeping it");
    }

    Ok(LogGuard {
        file: file_guard,
        installed,
        levels,
    })
}

fn fmt_layer<W>(writer: W, ansi: bool, json: bool, local_time: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true);

    match (json, local_time) {
        (true, true) => base.json().with_timer(ChronoLocal::rfc_3339()).boxed(),
        (true, false) => base.json().with_timer(ChronoUtc::rfc_3339()).boxed(),
        (false, true) => base.with_timer(ChronoLocal::rfc_3339()).boxed(),
        (false, false) => base.with_timer(ChronoUtc::rfc_3339()).boxed(),
    }
}

/// `MakeWriter` that caps every formatted line at `max` bytes (0 = no cap).
pub struct Truncating<M> {
    inner: M,
    max: usize,
}

impl<M> Truncating<M> {
    pub fn new(inner: M, max: usize) -> Self {
        Self { inner, max }
    }
}

impl<'a, M: MakeWriter<'a>> MakeWriter<'a> for Truncating<M> {
    type Writer = TruncatingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        TruncatingWriter {
            inner: self.inner.make_writer(),
            max: self.max,
        }
    }
}

pub struct TruncatingWriter<W> {
    inner: W,
    max: usize,
}

impl<W: Write> Write for TruncatingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let body = buf.strip_suffix(b"\n").unwrap_or(buf);
        if self.max == 0 || body.len() <= self.max {
            self.inner.write_all(buf)?;
            return Ok(buf.len());
        }

        let mut cut = self.max;
        // Back up to a UTF-8 char boundary.
        while cut > 0 && (body[cut] & 0xC0) == 0x80 {
            cut -= 1;
        }

        let mut line = Vec::with_capacity(cut + 4);
        line.extend_from_slice(&body[..cut]);
        line.extend_from_slice(b"...\n");
        self.inner.write_all(&line)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
