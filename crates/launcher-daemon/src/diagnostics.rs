//! Periodic memory and scheduler diagnostics.
//!
//! The reporter samples process memory (from the OS and from the optional
//! [`CountingAllocator`]) together with runtime scheduler counters, and writes
//! one log line per sample at the configured severity until cancelled.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, trace, warn, Level};

use launcher_config::CommonConfig;

use crate::runtime::SchedulerProbe;
use crate::signal::sleep_or_cancel;

/// Log target of the reporter's lines.
pub const TARGET: &str = module_path!();

/// Tokio's default worker thread stack size.
const WORKER_STACK_SIZE: u64 = 2 * 1024 * 1024;
/// Typical main thread stack limit.
const MAIN_STACK_SIZE: u64 = 8 * 1024 * 1024;

static LIVE_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_BYTES: AtomicUsize = AtomicUsize::new(0);
static LIVE_OBJECTS: AtomicUsize = AtomicUsize::new(0);

/// Allocator wrapper that counts live heap bytes and objects.
///
/// Install in a binary with `#[global_allocator]`; without it the heap
/// figures in [`MemSample`] stay at zero.
pub struct CountingAllocator;

impl CountingAllocator {
    fn grow(size: usize) {
        let live = LIVE_BYTES.fetch_add(size, Ordering::Relaxed) + size;
        PEAK_BYTES.fetch_max(live, Ordering::Relaxed);
    }

    fn shrink(size: usize) {
        LIVE_BYTES.fetch_sub(size, Ordering::Relaxed);
    }
}

// SAFETY: every call is forwarded unchanged to the system allocator; the
// wrapper only updates counters.
unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            Self::grow(layout.size());
            LIVE_OBJECTS.fetch_add(1, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            Self::grow(layout.size());
            LIVE_OBJECTS.fetch_add(1, Ordering::Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        Self::shrink(layout.size());
        LIVE_OBJECTS.fetch_sub(1, Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            if new_size >= layout.size() {
                Self::grow(new_size - layout.size());
            } else {
                Self::shrink(layout.size() - new_size);
            }
        }
        new_ptr
    }
}

/// Heap counters maintained by [`CountingAllocator`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub live_bytes: usize,
    pub peak_bytes: usize,
    pub live_objects: usize,
}

pub fn heap_stats() -> HeapStats {
    HeapStats {
        live_bytes: LIVE_BYTES.load(Ordering::Relaxed),
        peak_bytes: PEAK_BYTES.load(Ordering::Relaxed),
        live_objects: LIVE_OBJECTS.load(Ordering::Relaxed),
    }
}

/// One diagnostics sample. Sizes are in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemSample {
    pub sys_reserved: u64,
    pub resident: u64,
    pub heap_reserved: u64,
    pub heap_in_use: u64,
    pub heap_objects: u64,
    pub stack_reserved: u64,
    pub stack_in_use: u64,
    pub cpus: usize,
    pub concurrency: usize,
    pub workers: usize,
    pub tasks: usize,
    pub parks: Option<(u64, u64)>,
}

impl std::fmt::Display for MemSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MemStats: Sys={}K, Resident={}K, HeapReserved={}K, HeapInUse={}K, HeapObjects={}, \
             StackReserved={}K, StackInUse={}K, CPU={}, Concurrency={}, Workers={}, Tasks={}",
            self.sys_reserved / 1024,
            self.resident / 1024,
            self.heap_reserved / 1024,
            self.heap_in_use / 1024,
            self.heap_objects,
            self.stack_reserved / 1024,
            self.stack_in_use / 1024,
            self.cpus,
            self.concurrency,
            self.workers,
            self.tasks,
        )?;
        if let Some((parks, unparks)) = self.parks {
            write!(f, ", Parks={}, Unparks={}", parks, unparks)?;
        }
        Ok(())
    }
}

/// Collects [`MemSample`]s for the current process.
pub struct Sampler {
    system: sysinfo::System,
    pid: Option<sysinfo::Pid>,
    concurrency: usize,
    probe: Option<SchedulerProbe>,
}

impl Sampler {
    pub fn new(concurrency: usize, probe: Option<SchedulerProbe>) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("Cannot determine own PID, process memory will not be sampled: {}", e);
                None
            }
        };
        Self {
            system: sysinfo::System::new(),
            pid,
            concurrency,
            probe,
        }
    }

    pub fn sample(&mut self) -> MemSample {
        let mut sample = MemSample {
            cpus: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            concurrency: self.concurrency,
            parks: self.probe.as_ref().map(|p| p.snapshot()),
            ..Default::default()
        };

        if let Some(pid) = self.pid {
            self.system
                .refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);
            if let Some(process) = self.system.process(pid) {
                sample.sys_reserved = process.virtual_memory();
                sample.resident = process.memory();
            }
        }

        let heap = heap_stats();
        sample.heap_reserved = heap.peak_bytes as u64;
        sample.heap_in_use = heap.live_bytes as u64;
        sample.heap_objects = heap.live_objects as u64;

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let metrics = handle.metrics();
            sample.workers = metrics.num_workers();
            sample.tasks = metrics.num_alive_tasks();
        }

        sample.stack_reserved = sample.workers as u64 * WORKER_STACK_SIZE + MAIN_STACK_SIZE;
        sample.stack_in_use = stack_in_use();
        sample
    }
}

#[cfg(target_os = "linux")]
fn stack_in_use() -> u64 {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| parse_vm_stk(&status))
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn stack_in_use() -> u64 {
    0
}

/// Parse `VmStk:    132 kB` from `/proc/<pid>/status` into bytes.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_stk(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmStk:"))?;
    let kb: u64 = line["VmStk:".len()..]
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse()
        .ok()?;
    Some(kb * 1024)
}

/// Whether a line at `level` passes the active threshold.
pub fn should_report(level: Level, active: LevelFilter) -> bool {
    level <= active
}

macro_rules! emit_at {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            Level::ERROR => error!($($arg)+),
            Level::WARN => warn!($($arg)+),
            Level::INFO => info!($($arg)+),
            Level::DEBUG => debug!($($arg)+),
            _ => trace!($($arg)+),
        }
    };
}

/// Periodic diagnostics loop.
pub struct DiagnosticsReporter {
    period: Option<Duration>,
    level: Level,
    threshold: LevelFilter,
    sampler: Sampler,
}

impl DiagnosticsReporter {
    /// `threshold` is the active log level for this module.
    pub fn new(common: &CommonConfig, threshold: LevelFilter, probe: Option<SchedulerProbe>) -> Self {
        Self {
            period: common.mem_stats_period(),
            level: common.mem_stats_level(),
            threshold,
            sampler: Sampler::new(common.concurrency, probe),
        }
    }

    /// Whether [`DiagnosticsReporter::run`] will emit anything at all.
    pub fn is_enabled(&self) -> bool {
        self.period.is_some() && should_report(self.level, self.threshold)
    }

    /// Sample until `token` is cancelled. Returns the number of lines written.
    pub async fn run(mut self, token: CancellationToken) -> u64 {
        let period = match self.period {
            Some(period) if should_report(self.level, self.threshold) => period,
            _ => return 0,
        };
        debug!("Diagnostics every {:?} at {}", period, self.level);

        let mut lines = 0;
        while sleep_or_cancel(&token, period).await {
            let sample = self.sampler.sample();
            emit_at!(self.level, "{}", sample);
            lines += 1;
        }

        debug!("Diagnostics reporter stopped after {} samples", lines);
        lines
    }
}

#[cfg(test)]
#[path = "diagnostics_tests.rs"]
mod tests;
