//! Per-node cost tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Snapshot of a node's invocation statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExprStats {
    pub invocations: u64,
    pub elapsed_nanos: u64,
}

/// Counts invocations and wall time of an expression node when enabled.
#[derive(Debug, Default)]
pub struct CostTracker {
    enabled: bool,
    invocations: AtomicU64,
    elapsed_nanos: AtomicU64,
}

impl CostTracker {
    /// Creates a tracker; a disabled tracker records nothing.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        CostTracker {
            enabled,
            ..Default::default()
        }
    }

    /// Returns whether tracking is on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Runs `f`, recording one invocation and its duration when enabled.
    pub fn track<T>(&self, f: impl FnOnce() -> T) -> T {
        if !self.enabled {
            return f();
        }
        let start = Instant::now();
        let out = f();
        let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.elapsed_nanos.fetch_add(nanos, Ordering::Relaxed);
        out
    }

    /// Returns the statistics, or None when disabled.
    #[must_use]
    pub fn stats(&self) -> Option<ExprStats> {
        self.enabled.then(|| ExprStats {
            invocations: self.invocations.load(Ordering::Relaxed),
            elapsed_nanos: self.elapsed_nanos.load(Ordering::Relaxed),
        })
    }
}
