use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::job::{JobSpec, OperationKind};
use crate::partition::WorkRange;

/// A single reported match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchOccurrence {
    /// The file the match was found in
    pub file: PathBuf,
    /// 1-based line (chunk) number
    pub line_number: usize,
    /// 1-based byte column of the match start
    pub column: usize,
    /// The text that matched
    pub matched_text: String,
}

impl fmt::Display for MatchOccurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Found in File: {}, Text: '{}' at line {}, position {}",
            self.file.display(),
            self.matched_text,
            self.line_number,
            self.column
        )
    }
}

/// The result of processing one owned file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    /// Matches (or replacements) in this file; zero when it failed
    pub count: usize,
    pub occurrences: Vec<MatchOccurrence>,
    /// Diagnostic for a file that could not be processed
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn succeeded(path: PathBuf, count: usize, occurrences: Vec<MatchOccurrence>) -> Self {
        Self {
            path,
            count,
            occurrences,
            error: None,
        }
    }

    pub fn failed(path: PathBuf, error: impl fmt::Display) -> Self {
        Self {
            path,
            count: 0,
            occurrences: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// What one worker reports at the fan-in barrier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerResult {
    pub worker: usize,
    pub range: WorkRange,
    pub local_count: usize,
    pub files: Vec<FileOutcome>,
}

impl WorkerResult {
    pub fn new(worker: usize, range: WorkRange) -> Self {
        Self {
            worker,
            range,
            local_count: 0,
            files: Vec::new(),
        }
    }

    pub fn add_file_outcome(&mut self, outcome: FileOutcome) {
        self.local_count += outcome.count;
        self.files.push(outcome);
    }
}

/// The reduced result of a whole job
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub spec: JobSpec,
    pub global_count: usize,
    pub elapsed: Duration,
    /// Per-worker results, ordered by worker index
    pub workers: Vec<WorkerResult>,
}

impl JobReport {
    /// Reduces worker results; the sum does not depend on arrival order
    pub fn reduce(spec: JobSpec, mut workers: Vec<WorkerResult>, elapsed: Duration) -> Self {
        workers.sort_by_key(|w| w.worker);
        let global_count = workers.iter().map(|w| w.local_count).sum();
        Self {
            spec,
            global_count,
            elapsed,
            workers,
        }
    }

    /// All file outcomes in manifest order
    pub fn files(&self) -> impl Iterator<Item = &FileOutcome> {
        self.workers.iter().flat_map(|w| w.files.iter())
    }

    pub fn files_processed(&self) -> usize {
        self.files().count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files().filter(|f| f.is_failure())
    }

    /// The closing line shown to the controlling process
    pub fn summary(&self) -> String {
        let op = self.spec.operation;
        let secs = self.elapsed.as_secs_f64();
        match op {
            OperationKind::Replace => format!(
                "{} completed in {:.6} seconds. Total replacements of '{}' with '{}': {}",
                op,
                secs,
                self.spec.pattern,
                self.spec.replacement_text(),
                self.global_count
            ),
            _ => format!(
                "{} completed in {:.6} seconds. Total occurrences of '{}': {}",
                op, secs, self.spec.pattern, self.global_count
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, count: usize) -> FileOutcome {
        FileOutcome::succeeded(PathBuf::from(name), count, vec![])
    }

    #[test]
    fn test_occurrence_report_line() {
        let occurrence = MatchOccurrence {
            file: PathBuf::from("notes.txt"),
            line_number: 3,
            column: 5,
            matched_text: "hello".to_string(),
        };
        assert_eq!(
            occurrence.to_string(),
            "Found in File: notes.txt, Text: 'hello' at line 3, position 5"
        );
    }

    #[test]
    fn test_worker_accumulates_local_count() {
        let mut worker = WorkerResult::new(0, WorkRange::new(0, 10));
        worker.add_file_outcome(outcome("a.txt", 2));
        worker.add_file_outcome(FileOutcome::failed(PathBuf::from("b.txt"), "boom"));
        worker.add_file_outcome(outcome("c.txt", 5));

        assert_eq!(worker.local_count, 7);
        assert_eq!(worker.files.len(), 3);
        assert!(worker.files[1].is_failure());
        assert_eq!(worker.files[1].count, 0);
    }

    #[test]
    fn test_reduce_is_order_independent() {
        let spec = JobSpec::count("x", false).unwrap();
        let mut first = WorkerResult::new(0, WorkRange::new(0, 5));
        first.add_file_outcome(outcome("a.txt", 3));
        let mut second = WorkerResult::new(1, WorkRange::new(5, 10));
        second.add_file_outcome(outcome("b.txt", 4));

        let forward = JobReport::reduce(
            spec.clone(),
            vec![first.clone(), second.clone()],
            Duration::ZERO,
        );
        let backward = JobReport::reduce(spec, vec![second, first], Duration::ZERO);

        assert_eq!(forward.global_count, 7);
        assert_eq!(backward.global_count, 7);
        assert_eq!(backward.workers[0].worker, 0);
        assert_eq!(
            backward.files().map(|f| f.path.clone()).collect::<Vec<_>>(),
            vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]
        );
    }

    #[test]
    fn test_summary_wording() {
        let count = JobReport::reduce(
            JobSpec::count("cat", false).unwrap(),
            vec![],
            Duration::from_millis(1500),
        );
        assert_eq!(
            count.summary(),
            "Count completed in 1.500000 seconds. Total occurrences of 'cat': 0"
        );

        let replace = JobReport::reduce(
            JobSpec::replace("cat", "dog", false).unwrap(),
            vec![],
            Duration::ZERO,
        );
        assert!(replace
            .summary()
            .ends_with("Total replacements of 'cat' with 'dog': 0"));
    }
}
