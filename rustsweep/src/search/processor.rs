use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

use super::chunks::{decode_chunk, split_terminator, LineChunks, DEFAULT_LINE_BUFFER};
use super::matcher::PatternMatcher;
use crate::config::EncodingMode;
use crate::errors::{SearchError, SearchResult};
use crate::results::MatchOccurrence;

const BUFFER_CAPACITY: usize = 65536;

/// What a scan of one file produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileScan {
    pub count: usize,
    pub occurrences: Vec<MatchOccurrence>,
}

/// Scans files chunk by chunk with one job's matcher
#[derive(Debug, Clone)]
pub struct FileProcessor {
    matcher: Arc<PatternMatcher>,
    line_buffer_capacity: usize,
    encoding_mode: EncodingMode,
    report_occurrences: bool,
}

impl FileProcessor {
    /// Creates a new FileProcessor with the given pattern matcher
    pub fn new(matcher: Arc<PatternMatcher>, encoding_mode: EncodingMode) -> Self {
        Self {
            matcher,
            line_buffer_capacity: DEFAULT_LINE_BUFFER,
            encoding_mode,
            report_occurrences: true,
        }
    }

    pub fn with_line_buffer(mut self, capacity: usize) -> Self {
        self.line_buffer_capacity = capacity;
        self
    }

    /// Counting jobs only need totals, searches need every occurrence
    pub fn reporting(mut self, report_occurrences: bool) -> Self {
        self.report_occurrences = report_occurrences;
        self
    }

    /// Processes a file and returns its match count and occurrences
    pub fn process_file(&self, path: &Path) -> SearchResult<FileScan> {
        trace!("Processing file: {}", path.display());

        let file = File::open(path).map_err(|e| SearchError::from_open(path, e))?;
        let reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let mut chunks = LineChunks::new(reader, self.line_buffer_capacity);

        let mut scan = FileScan::default();
        let mut line_number = 0;
        while let Some(bytes) = chunks.next_chunk()? {
            line_number += 1;
            let chunk = decode_chunk(bytes, path, self.encoding_mode)?;
            let (content, _) = split_terminator(&chunk);

            for (start, end) in self.matcher.find_matches(content) {
                scan.count += 1;
                if self.report_occurrences {
                    scan.occurrences.push(MatchOccurrence {
                        file: path.to_path_buf(),
                        line_number,
                        column: start + 1,
                        matched_text: content[start..end].to_string(),
                    });
                }
            }
        }

        trace!("{} matches in {}", scan.count, path.display());
        Ok(scan)
    }
}
