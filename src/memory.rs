//! Memory accounting handle shared by vector builders.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::QueryConfig;
use crate::error::{ExecError, Result};

/// Accounting handle passed into every vector construction call.
///
/// Reserving never fails; the limit is enforced by [`MemoryPool::check_limit`],
/// which the driver calls between operator calls. Clones share one set of
/// counters.
#[derive(Debug, Clone)]
pub struct MemoryPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    name: String,
    /// Limit in bytes (0 = unlimited).
    limit: usize,
    used: AtomicUsize,
    peak: AtomicUsize,
    allocations: AtomicUsize,
}

impl MemoryPool {
    /// Creates an unlimited pool.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_limit(name, 0)
    }

    /// Creates a pool that reports an error once live usage exceeds `limit` bytes.
    #[must_use]
    pub fn with_limit(name: impl Into<String>, limit: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                limit,
                used: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                allocations: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates a pool bounded by the session's `memory_limit`.
    #[must_use]
    pub fn for_query(name: impl Into<String>, config: &QueryConfig) -> Self {
        Self::with_limit(name, config.memory_limit)
    }

    /// Returns the pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Charges `bytes` to the pool until the returned reservation is dropped.
    #[must_use = "dropping the reservation releases the bytes immediately"]
    pub fn reserve(&self, bytes: usize) -> Reservation {
        let used = self.inner.used.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.inner.peak.fetch_max(used, Ordering::Relaxed);
        self.inner.allocations.fetch_add(1, Ordering::Relaxed);
        Reservation {
            pool: Arc::clone(&self.inner),
            bytes,
        }
    }

    /// Bytes held by live reservations.
    #[must_use]
    pub fn used(&self) -> usize {
        self.inner.used.load(Ordering::Relaxed)
    }

    /// Highest live usage seen so far.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::Relaxed)
    }

    /// Number of reservations made so far, live or released.
    #[must_use]
    pub fn allocations(&self) -> usize {
        self.inner.allocations.load(Ordering::Relaxed)
    }

    /// Checks live usage against the configured limit.
    ///
    /// # Errors
    ///
    /// Returns `MemoryLimitExceeded` if live usage exceeds the limit.
    pub fn check_limit(&self) -> Result<()> {
        let used = self.used();
        let limit = self.inner.limit;
        if limit > 0 && used > limit {
            return Err(ExecError::MemoryLimitExceeded { used, limit });
        }
        Ok(())
    }
}

/// Bytes charged to a [`MemoryPool`]; released on drop.
#[derive(Debug)]
pub struct Reservation {
    pool: Arc<PoolInner>,
    bytes: usize,
}

impl Reservation {
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.pool.used.fetch_sub(self.bytes, Ordering::Relaxed);
    }
}
