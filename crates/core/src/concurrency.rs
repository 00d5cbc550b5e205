//! Concurrency planning module for polysplit
//!
//! Derives how many input files are processed at once from the CPU core count
//! and configuration.

/// Upper bound of the auto-derived worker count.
pub const MAX_AUTO_WORKERS: usize = 8;

/// Concurrency plan derived from configuration and system resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyPlan {
    /// Total logical CPU cores available
    pub total_cores: usize,
    /// Maximum number of files processed concurrently
    pub max_concurrent_files: usize,
}

impl ConcurrencyPlan {
    /// Derive a concurrency plan
    ///
    /// Uses the following rules:
    /// - Detects CPU cores via num_cpus
    /// - An explicit non-zero worker count is used as given
    /// - Otherwise half the cores, clamped to [1, 8]
    pub fn derive(explicit_workers: Option<usize>) -> Self {
        Self::derive_with_cores(num_cpus::get(), explicit_workers)
    }

    /// Derive a concurrency plan for a known core count
    pub fn derive_with_cores(total_cores: usize, explicit_workers: Option<usize>) -> Self {
        let max_concurrent_files = match explicit_workers {
            Some(workers) if workers > 0 => workers,
            _ => derive_workers(total_cores),
        };

        Self {
            total_cores,
            max_concurrent_files,
        }
    }
}

/// Half the cores, never less than 1 nor more than [`MAX_AUTO_WORKERS`]
fn derive_workers(cores: usize) -> usize {
    (cores / 2).clamp(1, MAX_AUTO_WORKERS)
}
