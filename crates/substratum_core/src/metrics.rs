//! Step counters and structured logging setup.

use crate::error::StepReport;
use atomic_float::AtomicF64;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// How often (in steps) a summary line is logged at info level.
pub const SUMMARY_EVERY: u64 = 1000;

/// Counters for one space's substrate steps.
pub struct StepMetrics {
    step_count: AtomicU64,
    simulated_time: AtomicF64,
    busy_nanos: AtomicU64,
    pub warnings: Mutex<HashMap<String, AtomicU64>>,
}

impl Default for StepMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StepMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepMetrics")
            .field("step_count", &self.step_count())
            .field("simulated_time", &self.simulated_time())
            .finish()
    }
}

impl StepMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            step_count: AtomicU64::new(0),
            simulated_time: AtomicF64::new(0.0),
            busy_nanos: AtomicU64::new(0),
            warnings: Mutex::new(HashMap::new()),
        }
    }

    /// Records a completed step of every substrate in a space.
    pub fn record_step(&self, dt: f64, duration: Duration, report: &StepReport) {
        let step = self.step_count.fetch_add(1, Ordering::Relaxed) + 1;
        let simulated = self.simulated_time.fetch_add(dt, Ordering::Relaxed) + dt;
        self.busy_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);

        for warning in &report.warnings {
            self.increment_warning(warning.kind());
        }

        if step % SUMMARY_EVERY == 0 {
            tracing::info!(
                step,
                simulated_s = simulated,
                busy_ms = self.busy_nanos.load(Ordering::Relaxed) / 1_000_000,
                warnings = self.warning_total(),
                "Substrate steps"
            );
        }
    }

    pub fn increment_warning(&self, kind: &str) {
        let mut warnings = self.warnings.lock().unwrap_or_else(|e| e.into_inner());
        warnings
            .entry(kind.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn warning_count(&self, kind: &str) -> u64 {
        let warnings = self.warnings.lock().unwrap_or_else(|e| e.into_inner());
        warnings
            .get(kind)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn warning_total(&self) -> u64 {
        let warnings = self.warnings.lock().unwrap_or_else(|e| e.into_inner());
        warnings.values().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn simulated_time(&self) -> f64 {
        self.simulated_time.load(Ordering::Relaxed)
    }
}

/// Initialize tracing subscriber for logging. `RUST_LOG` overrides `default_level`.
pub fn init_logging(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .ok();
}
