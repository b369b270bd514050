//! Byte-range partitioning of a manifest across workers.
//!
//! The files of a manifest are laid end to end as one logical corpus of
//! `total` bytes. Worker `r` of `n` gets the slice
//! `[r * (total / n), (r + 1) * (total / n))`, the last worker also taking the
//! division remainder, and owns every file whose first byte falls in its
//! slice. Files are never split, so a few large files can leave workers with
//! very different amounts of real work; this is a known limitation of
//! start-offset ownership.
use serde::Serialize;
use std::num::NonZeroUsize;
use tracing::debug;

use crate::manifest::{FileRecord, Manifest};

/// A half-open byte interval over the concatenated corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkRange {
    pub start: u64,
    pub end: u64,
}

impl WorkRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Computes worker `rank`'s slice of a `total`-byte corpus
pub fn work_range(total: u64, workers: NonZeroUsize, rank: usize) -> WorkRange {
    let n = workers.get() as u64;
    let rank = rank as u64;
    debug_assert!(rank < n, "rank {rank} out of {n} workers");

    let share = total / n;
    let start = rank * share;
    let end = if rank == n - 1 { total } else { start + share };
    WorkRange::new(start, end)
}

/// Whether a file starting at `offset` belongs to worker `rank`.
///
/// Zero-byte files sitting at the very end of a non-empty corpus start at
/// `total`, outside every half-open range; they go to the last worker.
pub fn owns(offset: u64, total: u64, workers: NonZeroUsize, rank: usize) -> bool {
    if work_range(total, workers, rank).contains(offset) {
        return true;
    }
    total > 0 && offset == total && rank == workers.get() - 1
}

/// The files worker `rank` owns, in manifest order
pub fn owned_files(manifest: &Manifest, workers: NonZeroUsize, rank: usize) -> Vec<&FileRecord> {
    let total = manifest.total_size();
    let owned: Vec<&FileRecord> = manifest
        .with_offsets()
        .filter(|&(offset, _)| owns(offset, total, workers, rank))
        .map(|(_, record)| record)
        .collect();

    debug!(
        "Worker {}/{} owns {} files in {:?}",
        rank,
        workers,
        owned.len(),
        work_range(total, workers, rank)
    );
    owned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn n(workers: usize) -> NonZeroUsize {
        NonZeroUsize::new(workers).unwrap()
    }

    fn manifest(sizes: &[u64]) -> Manifest {
        Manifest::new(
            sizes
                .iter()
                .enumerate()
                .map(|(i, &byte_size)| FileRecord {
                    path: PathBuf::from(format!("f{i}.txt")),
                    byte_size,
                })
                .collect(),
        )
    }

    #[test]
    fn test_last_worker_absorbs_remainder() {
        assert_eq!(work_range(10, n(3), 0), WorkRange::new(0, 3));
        assert_eq!(work_range(10, n(3), 1), WorkRange::new(3, 6));
        assert_eq!(work_range(10, n(3), 2), WorkRange::new(6, 10));
    }

    #[test]
    fn test_ranges_partition_the_corpus() {
        for total in [0u64, 1, 2, 7, 100, 1023, 4096] {
            for workers in 1..=9 {
                let mut expected_start = 0;
                for rank in 0..workers {
                    let range = work_range(total, n(workers), rank);
                    assert_eq!(range.start, expected_start, "gap at {total}/{workers}/{rank}");
                    assert!(range.start <= range.end);
                    expected_start = range.end;
                }
                assert_eq!(expected_start, total);
            }
        }
    }

    #[test]
    fn test_every_file_owned_exactly_once() {
        let sizes = [0, 40, 3, 0, 900, 12, 12, 0];
        let manifest = manifest(&sizes);
        for workers in 1..=10 {
            let mut owners = vec![0; sizes.len()];
            for rank in 0..workers {
                for record in owned_files(&manifest, n(workers), rank) {
                    let index = manifest
                        .records()
                        .iter()
                        .position(|r| r.path == record.path)
                        .unwrap();
                    owners[index] += 1;
                }
            }
            assert!(owners.iter().all(|&o| o == 1), "{workers}: {owners:?}");
        }
    }

    #[test]
    fn test_empty_corpus_is_owned_by_nobody() {
        let manifest = manifest(&[0, 0, 0]);
        for workers in 1..=4 {
            for rank in 0..workers {
                assert!(work_range(0, n(workers), rank).is_empty());
                assert!(owned_files(&manifest, n(workers), rank).is_empty());
            }
        }
    }

    #[test]
    fn test_large_file_imbalance_is_preserved() {
        // one huge file first: worker 0 owns it, the rest share the crumbs
        let manifest = manifest(&[1000, 10, 10, 10]);
        let first = owned_files(&manifest, n(2), 0);
        let second = owned_files(&manifest, n(2), 1);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 3);
    }

    #[test]
    fn test_more_workers_than_bytes() {
        let manifest = manifest(&[1, 1]);
        let owned: Vec<usize> = (0..5)
            .map(|rank| owned_files(&manifest, n(5), rank).len())
            .collect();
        assert_eq!(owned, vec![0, 0, 0, 0, 2]);
    }
}
