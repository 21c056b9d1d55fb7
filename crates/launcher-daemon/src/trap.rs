//! Failure traps for independently scheduled tasks.
//!
//! A panic inside a trapped task is converted into a [`FailureRecord`] tagged
//! with the task's correlation id, logged, and returned as the task's outcome.
//! It never escapes to the runtime or takes down sibling tasks.

use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, Instrument};

use crate::error::LauncherError;

/// Result of a trapped task.
pub type TaskOutcome<T> = Result<T, FailureRecord>;

/// Flags controlling what a trap keeps and where it writes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapOptions {
    /// Always keep the stack trace (`--debug`).
    pub force_backtrace: bool,
    /// Write stack traces to the log at alert severity (`--dump-panic-ids`).
    pub dump_stacks: bool,
}

/// A captured task failure.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub task: String,
    pub correlation_id: String,
    pub message: String,
    pub location: Option<String>,
    pub backtrace: Option<String>,
}

impl std::fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task {} [{}] panicked: {}", self.task, self.correlation_id, self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

impl From<FailureRecord> for LauncherError {
    fn from(rec: FailureRecord) -> Self {
        LauncherError::Panicked {
            task: rec.task,
            correlation_id: rec.correlation_id,
            message: rec.message,
        }
    }
}

struct PanicCapture {
    message: String,
    location: Option<String>,
    backtrace: String,
}

thread_local! {
    static TRAP_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<PanicCapture>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Install the process-wide panic hook. Idempotent.
///
/// Inside a trap the hook records the panic for the trap to report; elsewhere
/// it defers to the previously installed hook.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if TRAP_DEPTH.with(|d| d.get()) == 0 {
                previous(info);
                return;
            }
            let capture = PanicCapture {
                message: payload_message(info.payload()),
                location: info.location().map(|l| l.to_string()),
                backtrace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(capture));
        }));
    });
}

/// Short identifier attached to every failure record of one task.
pub fn new_correlation_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

/// Spawn `fut` on the current runtime inside a failure trap.
pub fn spawn_trapped<F, T>(name: &str, options: TrapOptions, fut: F) -> JoinHandle<TaskOutcome<T>>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(trapped(name.to_string(), options, fut))
}

/// Run `fut` inside a failure trap on the current task.
pub async fn trapped<F, T>(name: impl Into<String>, options: TrapOptions, fut: F) -> TaskOutcome<T>
where
    F: Future<Output = T>,
{
    install_panic_hook();
    let name = name.into();
    let correlation_id = new_correlation_id();
    let span = info_span!("task", name = %name, id = %correlation_id);

    let mut guarded = Box::pin(AssertUnwindSafe(fut).catch_unwind());
    let result = std::future::poll_fn(|cx| {
        let _scope = TrapScope::enter();
        guarded.as_mut().poll(cx)
    })
    .instrument(span)
    .await;

    result.map_err(|payload| {
        let rec = build_record(&name, correlation_id, payload.as_ref(), options);
        report(&rec, options);
        rec
    })
}

/// Run a synchronous closure inside a failure trap.
pub fn run_trapped<T>(name: &str, options: TrapOptions, f: impl FnOnce() -> T) -> TaskOutcome<T> {
    install_panic_hook();
    let correlation_id = new_correlation_id();
    let _span = info_span!("task", name = %name, id = %correlation_id).entered();

    let result = {
        let _scope = TrapScope::enter();
        panic::catch_unwind(AssertUnwindSafe(f))
    };

    result.map_err(|payload| {
        let rec = build_record(name, correlation_id, payload.as_ref(), options);
        report(&rec, options);
        rec
    })
}

struct TrapScope;

impl TrapScope {
    fn enter() -> Self {
        TRAP_DEPTH.with(|d| d.set(d.get() + 1));
        TrapScope
    }
}

impl Drop for TrapScope {
    fn drop(&mut self) {
        TRAP_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

fn payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn backtrace_enabled() -> bool {
    std::env::var_os("RUST_BACKTRACE").is_some_and(|v| v != "0")
}

fn build_record(
    task: &str,
    correlation_id: String,
    payload: &(dyn std::any::Any + Send),
    options: TrapOptions,
) -> FailureRecord {
    let capture = LAST_PANIC.with(|slot| slot.borrow_mut().take());
    let keep_backtrace = options.force_backtrace || backtrace_enabled();

    let (message, location, backtrace) = match capture {
        Some(c) => (c.message, c.location, Some(c.backtrace)),
        None => (payload_message(payload), None, None),
    };

    FailureRecord {
        task: task.to_string(),
        correlation_id,
        message,
        location,
        backtrace: backtrace.filter(|_| keep_backtrace),
    }
}

fn report(rec: &FailureRecord, options: TrapOptions) {
    error!(
        severity = "alert",
        task = %rec.task,
        correlation_id = %rec.correlation_id,
        "Task {} panicked [{}]: {}{}",
        rec.task,
        rec.correlation_id,
        rec.message,
        rec.location.as_deref().map(|l| format!(" at {}", l)).unwrap_or_default()
    );

    if let Some(stack) = &rec.backtrace {
        if options.dump_stacks {
            error!(severity = "alert", correlation_id = %rec.correlation_id, "Stack [{}]:\n{}", rec.correlation_id, stack);
        } else {
            debug!(correlation_id = %rec.correlation_id, "Stack [{}]:\n{}", rec.correlation_id, stack);
        }
    }
}
