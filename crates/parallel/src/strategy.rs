//! Worker-pool strategies

use rayon::prelude::*;
use tracing::warn;

/// Processing mode for tile and window fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Build from an optional thread count: `Some(1)` is sequential,
    /// `Some(n)` a dedicated pool, `None` the global pool.
    pub fn from_threads(threads: Option<usize>) -> Self {
        match threads {
            Some(0) | None => ProcessingMode::Parallel,
            Some(1) => ProcessingMode::Sequential,
            Some(n) => ProcessingMode::ParallelWith(n),
        }
    }
}

/// Strategy for parallel execution
pub trait ParallelStrategy {
    /// Map a function over items and collect results in input order
    fn par_map<I, T, F>(&self, items: Vec<I>, f: F) -> Vec<T>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> T + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    fn par_map<I, T, F>(&self, items: Vec<I>, f: F) -> Vec<T>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => items.into_iter().map(f).collect(),
            ProcessingMode::Parallel => items.into_par_iter().map(f).collect(),
            ProcessingMode::ParallelWith(threads) => {
                match rayon::ThreadPoolBuilder::new().num_threads(*threads).build() {
                    Ok(pool) => pool.install(|| items.into_par_iter().map(f).collect()),
                    Err(e) => {
                        warn!("cannot build {}-thread pool ({}), using global pool", threads, e);
                        items.into_par_iter().map(f).collect()
                    }
                }
            }
        }
    }
}

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes_preserve_order() {
        let items: Vec<usize> = (0..50).collect();
        for mode in [
            ProcessingMode::Sequential,
            ProcessingMode::Parallel,
            ProcessingMode::ParallelWith(3),
        ] {
            let out = mode.par_map(items.clone(), |i| i * 2);
            assert_eq!(out, (0..50).map(|i| i * 2).collect::<Vec<_>>(), "{:?}", mode);
        }
    }

    #[test]
    fn test_from_threads() {
        assert_eq!(ProcessingMode::from_threads(None), ProcessingMode::Parallel);
        assert_eq!(ProcessingMode::from_threads(Some(1)), ProcessingMode::Sequential);
        assert_eq!(ProcessingMode::from_threads(Some(4)), ProcessingMode::ParallelWith(4));
    }
}
