use std::{path::Path, time::Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use crate::{
    OptionOverrides, PerformanceMetrics, Resolver,
    domain::metrics::{bytes_as_f64, count_as_f64, millis, resident_memory_bytes},
};

/// The result of [`Resolver::benchmark`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkReport {
    /// When the benchmark started.
    pub started_at: DateTime<Utc>,
    /// One entry per iteration, in order.
    pub iterations: Vec<BenchmarkIteration>,
    /// The mean over all iterations.
    pub average: AverageMetrics,
    /// Process memory around the whole run.
    pub memory: MemoryUsage,
}

/// A single cold-cache validation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkIteration {
    /// Zero-based iteration number.
    pub iteration: usize,
    /// Wall time of the whole validation, in milliseconds.
    pub elapsed_ms: f64,
    /// Whether the document validated.
    pub is_valid: bool,
    /// Load statistics of the run.
    pub metrics: PerformanceMetrics,
}

/// Mean values over a benchmark's iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageMetrics {
    /// Mean wall time per validation.
    pub elapsed_ms: f64,
    /// Mean number of files loaded.
    pub total_files: f64,
    /// Mean bytes loaded.
    pub total_size_bytes: f64,
    /// Mean summed load time.
    pub total_load_time_ms: f64,
    /// Mean of the slowest single load.
    pub max_file_load_time_ms: f64,
}

impl AverageMetrics {
    fn of(iterations: &[BenchmarkIteration]) -> Self {
        if iterations.is_empty() {
            return Self::default();
        }
        let n = count_as_f64(iterations.len());
        let sum = iterations.iter().fold(Self::default(), |mut acc, it| {
            acc.elapsed_ms += it.elapsed_ms;
            acc.total_files += count_as_f64(it.metrics.total_files);
            acc.total_size_bytes += bytes_as_f64(it.metrics.total_size_bytes);
            acc.total_load_time_ms += it.metrics.total_load_time_ms;
            acc.max_file_load_time_ms += it.metrics.max_file_load_time_ms;
            acc
        });
        Self {
            elapsed_ms: sum.elapsed_ms / n,
            total_files: sum.total_files / n,
            total_size_bytes: sum.total_size_bytes / n,
            total_load_time_ms: sum.total_load_time_ms / n,
            max_file_load_time_ms: sum.max_file_load_time_ms / n,
        }
    }
}

/// Resident memory before and after a benchmark.
///
/// Every field is `None` on platforms where it cannot be measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    /// Resident bytes before the first iteration.
    pub before_bytes: Option<u64>,
    /// Resident bytes after the last iteration.
    pub after_bytes: Option<u64>,
    /// `after - before`; positive values mean growth.
    pub delta_bytes: Option<i64>,
}

impl MemoryUsage {
    fn between(before: Option<u64>, after: Option<u64>) -> Self {
        let delta_bytes = before.zip(after).and_then(|(before, after)| {
            let before = i64::try_from(before).ok()?;
            let after = i64::try_from(after).ok()?;
            Some(after - before)
        });
        Self {
            before_bytes: before,
            after_bytes: after,
            delta_bytes,
        }
    }
}

/// Errors that can occur when benchmarking.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BenchmarkError {
    /// Zero iterations were requested.
    #[error("a benchmark needs at least one iteration")]
    NoIterations,
}

impl Resolver {
    /// Validates `root_path` repeatedly from a cold cache.
    ///
    /// # Errors
    ///
    /// Returns an error if `iterations` is zero.
    pub fn benchmark(
        &mut self,
        root_path: &Path,
        iterations: usize,
    ) -> Result<BenchmarkReport, BenchmarkError> {
        self.benchmark_with(root_path, iterations, &OptionOverrides::default(), |_| {})
    }

    /// Validates `root_path` repeatedly from a cold cache, with per-call
    /// overrides, calling `on_iteration` after each run.
    ///
    /// The cache is cleared before every iteration. Resident memory is
    /// sampled once before the first iteration and once after the last.
    ///
    /// # Errors
    ///
    /// Returns an error if `iterations` is zero.
    #[instrument(skip(self, overrides, on_iteration), fields(root = %root_path.display()))]
    pub fn benchmark_with<F>(
        &mut self,
        root_path: &Path,
        iterations: usize,
        overrides: &OptionOverrides,
        mut on_iteration: F,
    ) -> Result<BenchmarkReport, BenchmarkError>
    where
        F: FnMut(&BenchmarkIteration),
    {
        if iterations == 0 {
            return Err(BenchmarkError::NoIterations);
        }

        let started_at = Utc::now();
        let memory_before = resident_memory_bytes();

        let runs: Vec<BenchmarkIteration> = (0..iterations)
            .map(|iteration| {
                self.clear_cache();
                let start = Instant::now();
                let result = self.validate_with(root_path, overrides);
                let run = BenchmarkIteration {
                    iteration,
                    elapsed_ms: millis(start.elapsed()),
                    is_valid: result.is_valid,
                    metrics: result
                        .file_resolution
                        .map(|resolution| resolution.performance_metrics)
                        .unwrap_or_default(),
                };
                on_iteration(&run);
                run
            })
            .collect();

        let memory = MemoryUsage::between(memory_before, resident_memory_bytes());
        let average = AverageMetrics::of(&runs);
        tracing::info!(
            "Benchmarked {iterations} iterations: {:.3} ms average",
            average.elapsed_ms
        );

        Ok(BenchmarkReport {
            started_at,
            iterations: runs,
            average,
            memory,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn fixture() -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.json"), json!({"x": 1}).to_string()).unwrap();
        fs::write(dir.path().join("b.json"), json!([1, 2, 3]).to_string()).unwrap();
        let root = dir.path().join("root.json");
        fs::write(
            &root,
            json!({"a": {"$ref": "./a.json"}, "b": {"$ref": "./b.json"}}).to_string(),
        )
        .unwrap();
        (dir, root)
    }

    #[test]
    fn every_iteration_starts_cold() {
        let (_dir, root) = fixture();
        let mut resolver = Resolver::default();

        let report = resolver.benchmark(&root, 3).unwrap();

        assert_eq!(report.iterations.len(), 3);
        for run in &report.iterations {
            assert!(run.is_valid);
            assert_eq!(run.metrics.total_files, 2);
        }
        assert!((report.average.total_files - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_iterations_is_an_error() {
        let (_dir, root) = fixture();
        assert_eq!(
            Resolver::default().benchmark(&root, 0),
            Err(BenchmarkError::NoIterations)
        );
    }

    #[test]
    fn reports_progress() {
        let (_dir, root) = fixture();
        let mut seen = Vec::new();

        Resolver::default()
            .benchmark_with(&root, 2, &OptionOverrides::default(), |run| {
                seen.push(run.iteration);
            })
            .unwrap();

        assert_eq!(seen, [0, 1]);
    }

    #[test]
    fn memory_delta() {
        let usage = MemoryUsage::between(Some(1000), Some(1500));
        assert_eq!(usage.delta_bytes, Some(500));
        assert_eq!(MemoryUsage::between(None, Some(1)).delta_bytes, None);
    }
}
