//! Shared parallelism configuration.
//!
//! Provides a single [`Parallelism`] enum used by the weak learner. The
//! only parallel stage in training is split-statistics accumulation; the
//! hint decides whether that stage shards candidates across worker threads
//! or runs on the driver thread.

/// Parallelism strategy for split-statistics accumulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
    /// Strictly sequential execution (no thread spawning).
    Sequential,
    /// Parallel execution with up to `n` worker shards.
    ///
    /// If `n <= 1`, this is equivalent to `Sequential`.
    Parallel(usize),
}

impl Default for Parallelism {
    fn default() -> Self {
        Self::Sequential
    }
}

impl Parallelism {
    /// Create a parallelism hint from a configured thread count.
    ///
    /// - `n <= 0` → uses rayon's current thread count (hardware hint)
    /// - `n == 1` → sequential
    /// - `n > 1` → parallel with n shards
    #[inline]
    pub fn from_threads(n_threads: i32) -> Self {
        match n_threads {
            n if n <= 0 => Self::Parallel(rayon::current_num_threads()),
            1 => Self::Sequential,
            n => Self::Parallel(n as usize),
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn allows_parallel(self) -> bool {
        matches!(self, Self::Parallel(n) if n > 1)
    }

    /// Returns the shard count (1 for sequential).
    #[inline]
    pub fn n_threads(self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Parallel(n) => n.max(1),
        }
    }
}
