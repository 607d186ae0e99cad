use std::time::Duration;

use serde::Serialize;

/// Aggregate load statistics for one resolution run.
///
/// Only files actually read from disk are counted. A cache hit contributes
/// nothing, since the file was counted when it was first loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Number of distinct files read.
    pub total_files: usize,
    /// Sum of the sizes of the files read.
    pub total_size_bytes: u64,
    /// Sum of the per-file load times, in milliseconds.
    pub total_load_time_ms: f64,
    /// The slowest single file load, in milliseconds.
    pub max_file_load_time_ms: f64,
}

impl PerformanceMetrics {
    /// Mean load time per file, in milliseconds.
    #[must_use]
    pub fn average_load_time_ms(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.total_load_time_ms / count_as_f64(self.total_files)
        }
    }
}

/// Accumulates [`PerformanceMetrics`] over a run.
#[derive(Debug, Default)]
pub(crate) struct MetricsAggregator {
    metrics: PerformanceMetrics,
}

impl MetricsAggregator {
    pub fn record_load(&mut self, size_bytes: u64, load_time: Duration) {
        let ms = millis(load_time);
        self.metrics.total_files += 1;
        self.metrics.total_size_bytes += size_bytes;
        self.metrics.total_load_time_ms += ms;
        self.metrics.max_file_load_time_ms = self.metrics.max_file_load_time_ms.max(ms);
    }

    pub fn finish(self) -> PerformanceMetrics {
        self.metrics
    }
}

pub(crate) fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn count_as_f64(count: usize) -> f64 {
    count as f64
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn bytes_as_f64(bytes: u64) -> f64 {
    bytes as f64
}

/// Resident memory of the current process, in bytes.
///
/// Read from `/proc/self/status`; `None` where that is unavailable.
pub(crate) fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let kib: u64 = line
        .trim_start_matches("VmRSS:")
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse()
        .ok()?;
    Some(kib * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_loads() {
        let mut aggregator = MetricsAggregator::default();
        aggregator.record_load(100, Duration::from_millis(4));
        aggregator.record_load(50, Duration::from_millis(10));
        aggregator.record_load(1, Duration::from_millis(1));

        let metrics = aggregator.finish();

        assert_eq!(metrics.total_files, 3);
        assert_eq!(metrics.total_size_bytes, 151);
        assert!((metrics.total_load_time_ms - 15.0).abs() < 1e-9);
        assert!((metrics.max_file_load_time_ms - 10.0).abs() < 1e-9);
        assert!((metrics.average_load_time_ms() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn empty_run_has_zero_average() {
        let metrics = MetricsAggregator::default().finish();
        assert_eq!(metrics, PerformanceMetrics::default());
        assert!(metrics.average_load_time_ms().abs() < f64::EPSILON);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn reads_resident_memory() {
        assert!(resident_memory_bytes().is_some_and(|bytes| bytes > 0));
    }
}
