//! Async runtime construction and the process-wide tunables.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tracing::info;

use launcher_config::CommonConfig;

use crate::error::LauncherError;

/// Scheduler park/unpark counters, fed by runtime hooks under deep profiling.
#[derive(Debug, Clone, Default)]
pub struct SchedulerProbe {
    inner: Arc<ProbeCounters>,
}

#[derive(Debug, Default)]
struct ProbeCounters {
    parks: AtomicU64,
    unparks: AtomicU64,
}

impl SchedulerProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_park(&self) {
        self.inner.parks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unpark(&self) {
        self.inner.unparks.fetch_add(1, Ordering::Relaxed);
    }

    /// `(parks, unparks)` since the runtime started.
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.inner.parks.load(Ordering::Relaxed),
            self.inner.unparks.load(Ordering::Relaxed),
        )
    }
}

/// Tunables applied when the runtime is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tunables {
    /// Worker threads; 0 keeps one per CPU.
    pub concurrency: usize,
    pub deep_profiling: bool,
}

impl Tunables {
    pub fn from_common(common: &CommonConfig) -> Self {
        Self {
            concurrency: common.concurrency,
            deep_profiling: common.deep_profiling,
        }
    }
}

/// Build the multi-threaded runtime. The probe is present only under deep profiling.
pub fn build(
    name: &str,
    tunables: Tunables,
) -> Result<(Runtime, Option<SchedulerProbe>), LauncherError> {
    let mut builder = Builder::new_multi_thread();
    builder.enable_all().thread_name(format!("{}-worker", name));

    if tunables.concurrency > 0 {
        builder.worker_threads(tunables.concurrency);
        info!("Concurrency set to {}", tunables.concurrency);
    }

    let probe = if tunables.deep_profiling {
        let probe = SchedulerProbe::new();
        let on_park = probe.clone();
        let on_unpark = probe.clone();
        builder
            .on_thread_park(move || on_park.record_park())
            .on_thread_unpark(move || on_unpark.record_unpark());
        info!("Deep profiling enabled");
        Some(probe)
    } else {
        None
    };

    let runtime = builder
        .build()
        .map_err(|e| LauncherError::Runtime(e.to_string()))?;
    Ok((runtime, probe))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_with_fixed_concurrency() {
        let tunables = Tunables {
            concurrency: 2,
            deep_profiling: false,
        };
        let (rt, probe) = build("unit", tunables).unwrap();
        assert!(probe.is_none());
        assert_eq!(rt.metrics().num_workers(), 2);
    }

    #[test]
    fn test_deep_profiling_counts_parks() {
        let tunables = Tunables {
            concurrency: 1,
            deep_profiling: true,
        };
        let (rt, probe) = build("unit", tunables).unwrap();
        let probe = probe.unwrap();

        rt.block_on(async {
            for _ in 0..3 {
                tokio::spawn(async {}).await.unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        });

        let (parks, unparks) = probe.snapshot();
        assert!(parks > 0);
        assert!(unparks > 0);
    }

    #[test]
    fn test_tunables_from_common() {
        let common = CommonConfig {
            concurrency: 8,
            deep_profiling: true,
            ..Default::default()
        };
        let t = Tunables::from_common(&common);
        assert_eq!(t.concurrency, 8);
        assert!(t.deep_profiling);
    }
}
