//! Dual-path execution of the fixed entry rule.
//!
//! The CPU path is the scalar reference (`rule::compute_cpu`). An optional
//! accelerated backend computes the same batch in parallel. When the backend
//! is unavailable the CPU path runs; when it emits zero signals the result is
//! treated as degenerate and recomputed on the CPU into the same buffers.

#[cfg(feature = "accel")]
pub mod kernel;
pub mod pool;

#[cfg(feature = "accel")]
pub use kernel::LaneKernel;
pub use pool::{BufferPool, PoolStats};

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::components::signal::rule::{compute_cpu, RuleParams, SeriesInput, SignalBatch};
use crate::domain::Bar;

/// A backend that evaluates the rule over every index of a series.
///
/// Implementations must use the same window semantics, sentinels and epsilon
/// as the CPU path.
pub trait AcceleratedBackend: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Fill `out` with one lane per index of `input`.
    fn compute(&self, input: &SeriesInput<'_>, params: &RuleParams, out: &mut SignalBatch);
}

/// Which path produced a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathUsed {
    Cpu,
    Accelerated,
    /// Accelerated output was degenerate; CPU result returned instead.
    CpuFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeReport {
    pub path_used: PathUsed,
    pub signal_count: usize,
}

pub struct DualPathExecutor {
    backend: Option<Box<dyn AcceleratedBackend>>,
    pool: Mutex<BufferPool>,
}

impl std::fmt::Debug for DualPathExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualPathExecutor")
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("pool", &self.pool_stats())
            .finish()
    }
}

impl Default for DualPathExecutor {
    fn default() -> Self {
        Self::auto()
    }
}

impl DualPathExecutor {
    pub fn cpu_only() -> Self {
        Self {
            backend: None,
            pool: Mutex::new(BufferPool::new()),
        }
    }

    pub fn with_backend(backend: Box<dyn AcceleratedBackend>) -> Self {
        Self {
            backend: Some(backend),
            pool: Mutex::new(BufferPool::new()),
        }
    }

    /// The lane kernel when compiled in, otherwise CPU only.
    pub fn auto() -> Self {
        #[cfg(feature = "accel")]
        {
            Self::with_backend(Box::new(LaneKernel::new()))
        }
        #[cfg(not(feature = "accel"))]
        {
            Self::cpu_only()
        }
    }

    /// `auto()` when `enabled`, else `cpu_only()`.
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            Self::auto()
        } else {
            Self::cpu_only()
        }
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_deref().map(|b| b.name())
    }

    /// Evaluate the rule at every index of `bars`.
    pub fn compute(&self, bars: &[Bar], params: &RuleParams) -> (SignalBatch, ComputeReport) {
        let n = bars.len();
        let (mut close, mut high, mut low) = {
            let mut pool = self.lock_pool();
            (pool.acquire(n), pool.acquire(n), pool.acquire(n))
        };
        for (i, bar) in bars.iter().enumerate() {
            close[i] = bar.close;
            high[i] = bar.high;
            low[i] = bar.low;
        }

        let input = SeriesInput {
            close: &close,
            high: &high,
            low: &low,
        };
        let mut batch = self.fresh_batch(n);
        let path_used = self.dispatch(&input, params, &mut batch);

        {
            let mut pool = self.lock_pool();
            pool.release(close);
            pool.release(high);
            pool.release(low);
        }

        let report = ComputeReport {
            path_used,
            signal_count: batch.signal_count(),
        };
        debug!(
            bars = n,
            path = ?report.path_used,
            signals = report.signal_count,
            "rule batch computed"
        );
        (batch, report)
    }

    fn dispatch(
        &self,
        input: &SeriesInput<'_>,
        params: &RuleParams,
        batch: &mut SignalBatch,
    ) -> PathUsed {
        let backend = match self.backend.as_deref() {
            Some(b) if b.is_available() => b,
            _ => {
                compute_cpu(input, params, batch);
                return PathUsed::Cpu;
            }
        };

        backend.compute(input, params, batch);
        if batch.signal_count() > 0 {
            return PathUsed::Accelerated;
        }

        warn!(
            backend = backend.name(),
            bars = input.len(),
            "accelerated path emitted no signals; recomputing on CPU"
        );
        compute_cpu(input, params, batch);
        PathUsed::CpuFallback
    }

    /// Return a batch's numeric buffers to the pool.
    pub fn recycle(&self, batch: SignalBatch) {
        let mut pool = self.lock_pool();
        pool.release(batch.ma);
        pool.release(batch.osc);
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.lock_pool().stats()
    }

    fn fresh_batch(&self, n: usize) -> SignalBatch {
        let mut pool = self.lock_pool();
        SignalBatch {
            ma: pool.acquire(n),
            osc: pool.acquire(n),
            gap: Vec::with_capacity(n),
            entry: Vec::with_capacity(n),
        }
    }

    fn lock_pool(&self) -> MutexGuard<'_, BufferPool> {
        self.pool.lock().unwrap_or_else(|e| e.into_inner())
    }
}
