use std::sync::atomic::{AtomicU64, Ordering};

/// Receives one record per model call.
///
/// Counts are advisory and never drive control flow.
pub trait MetricsSink: Send + Sync {
    /// Record the final outcome of a call, after any retries.
    fn record_call(&self, success: bool);
}

/// Lock-free call and success counters.
#[derive(Debug, Default)]
pub struct CallCounters {
    calls: AtomicU64,
    successes: AtomicU64,
}

/// Point-in-time view of [`CallCounters`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallStats {
    /// Calls recorded, abandoned ones included.
    pub calls: u64,
    /// Calls that returned text.
    pub successes: u64,
    /// Calls that failed or were dropped.
    pub failures: u64,
    /// 0.0 when no calls were made.
    pub success_rate: f64,
}

impl CallCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Total calls recorded.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Successful calls recorded.
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    /// Read both counters.
    ///
    /// The two loads are not atomic together; under concurrent writes the
    /// snapshot can be off by the calls in flight.
    pub fn snapshot(&self) -> CallStats {
        let calls = self.calls();
        let successes = self.successes().min(calls);
        CallStats {
            calls,
            successes,
            failures: calls - successes,
            success_rate: if calls == 0 {
                0.0
            } else {
                successes as f64 / calls as f64
            },
        }
    }
}

impl MetricsSink for CallCounters {
    fn record_call(&self, success: bool) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Sink that discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_call(&self, _success: bool) {}
}
