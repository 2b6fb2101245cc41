//! Common utilities used across the crate.
//!
//! Parallelism configuration for ensemble training and the quantile helper
//! shared by the robust scaler.

use rayon::prelude::*;

// =============================================================================
// Statistical Utilities
// =============================================================================

/// Linearly interpolated quantile of an already sorted slice.
///
/// Matches the default ("linear") method of common numerical libraries:
/// the position is `q * (n - 1)` and values between ranks are interpolated.
///
/// Returns `f64::NAN` if `sorted` is empty.
#[inline]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }

    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Sort a copy of `values`, NaN last.
pub fn sorted_copy(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut out: Vec<f64> = values.into_iter().collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

// =============================================================================
// Parallelism Configuration
// =============================================================================

/// Whether parallel execution is allowed.
///
/// The actual thread pool is set up by [`run_with_threads`]; components only
/// respect this flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if rayon pool has multiple threads, sequential otherwise)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    /// Map `0..n` to a vector, in parallel when allowed.
    ///
    /// Output order always follows the index order.
    pub fn maybe_par_map<T, F>(self, n: usize, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        if self.is_parallel() {
            (0..n).into_par_iter().map(f).collect()
        } else {
            (0..n).map(f).collect()
        }
    }
}

/// Run `f` inside a rayon pool sized by `n_threads`.
///
/// `0` uses the global pool, `1` runs sequentially. If a dedicated pool cannot
/// be built the closure falls back to the global pool.
pub fn run_with_threads<T: Send>(n_threads: usize, f: impl FnOnce(Parallelism) -> T + Send) -> T {
    let parallelism = Parallelism::from_threads(n_threads);

    match parallelism {
        Parallelism::Sequential => f(Parallelism::Sequential),
        Parallelism::Parallel if n_threads == 0 => f(Parallelism::Parallel),
        Parallelism::Parallel => {
            match rayon::ThreadPoolBuilder::new().num_threads(n_threads).build() {
                Ok(pool) => pool.install(|| f(Parallelism::Parallel)),
                Err(err) => {
                    log::warn!("failed to build a {n_threads}-thread pool ({err}); using global pool");
                    f(Parallelism::Parallel)
                }
            }
        }
    }
}
