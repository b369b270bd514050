use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Counters shared by every worker of a job
#[derive(Debug, Clone, Default)]
pub struct SweepMetrics {
    files_processed: Arc<AtomicU64>,
    files_failed: Arc<AtomicU64>,
    bytes_assigned: Arc<AtomicU64>,
    matches: Arc<AtomicU64>,
    idle_workers: Arc<AtomicU64>,
}

impl SweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one file a worker finished, successfully or not
    pub fn record_file(&self, byte_size: u64, matches: usize, failed: bool) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.bytes_assigned.fetch_add(byte_size, Ordering::Relaxed);
        self.matches.fetch_add(matches as u64, Ordering::Relaxed);
        if failed {
            self.files_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a worker whose range owned no file
    pub fn record_idle_worker(&self) {
        self.idle_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> SweepStats {
        SweepStats {
            files_processed: self.files_processed.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            bytes_assigned: self.bytes_assigned.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
            idle_workers: self.idle_workers.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Sweep stats: files processed: {}, failed: {}, bytes: {}, matches: {}, idle workers: {}",
            stats.files_processed,
            stats.files_failed,
            stats.bytes_assigned,
            stats.matches,
            stats.idle_workers
        );
    }
}

/// A snapshot of [`SweepMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub files_processed: u64,
    pub files_failed: u64,
    pub bytes_assigned: u64,
    pub matches: u64,
    pub idle_workers: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_file_tracking() {
        let metrics = SweepMetrics::new();
        metrics.record_file(100, 3, false);
        metrics.record_file(50, 0, true);
        metrics.record_idle_worker();

        let stats = metrics.get_stats();
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.bytes_assigned, 150);
        assert_eq!(stats.matches, 3);
        assert_eq!(stats.idle_workers, 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = SweepMetrics::new();
        thread::scope(|s| {
            for _ in 0..4 {
                let metrics = metrics.clone();
                s.spawn(move || {
                    for _ in 0..25 {
                        metrics.record_file(1, 1, false);
                    }
                });
            }
        });
        assert_eq!(metrics.get_stats().files_processed, 100);
        assert_eq!(metrics.get_stats().matches, 100);
    }
}
