//! Query configuration.

use crate::error::{MosaicError, Result};

/// Relative resolution drift accepted by alignment repair (10%).
pub const DEFAULT_REPAIR_TOLERANCE: f64 = 0.1;

/// Options shared by the raster and vector extent queries.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Relative tolerance handed to [`crate::AlignmentRepair`]
    pub repair_tolerance: f64,
    /// Worker threads for tile decoding; `None` uses the rayon global pool
    pub threads: Option<usize>,
    /// Tiles decoded per batch; `None` uses the pool width
    pub batch_size: Option<usize>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            repair_tolerance: DEFAULT_REPAIR_TOLERANCE,
            threads: None,
            batch_size: None,
        }
    }
}

impl QueryOptions {
    #[must_use]
    pub fn with_repair_tolerance(mut self, tolerance: f64) -> Self {
        self.repair_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size.max(1));
        self
    }

    /// Run `op` on the configured pool. Without a thread count, `op` runs
    /// on the caller and parallel iterators inside use the global pool.
    ///
    /// # Errors
    /// Returns [`MosaicError::ThreadPool`] if a dedicated pool cannot be built,
    /// otherwise whatever `op` returns.
    pub fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send,
        F: FnOnce() -> Result<T> + Send,
    {
        match self.threads {
            None => op(),
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| MosaicError::ThreadPool(e.to_string()))?
                .install(op),
        }
    }

    /// Number of tiles to decode before merging.
    #[must_use]
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size
            .or(self.threads)
            .unwrap_or_else(rayon::current_num_threads)
            .max(1)
    }
}
