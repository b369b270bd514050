//! The matching engine: pattern strategies, the whole-word predicate and the
//! bounded line-chunk scanner that feeds them.
//!
//! Every operation scans a file one chunk at a time. A chunk is a line, or a
//! bounded slice of an overlong line, so memory stays flat no matter how large
//! a file is. The price is that a match spanning two chunks of the same long
//! line is not seen, and each chunk advances the reported line number.
pub mod chunks;
pub mod matcher;
pub mod processor;

pub use chunks::{LineChunks, DEFAULT_LINE_BUFFER};
pub use matcher::{is_regex_pattern, MatchStrategy, PatternMatcher, WordBoundary};
pub use processor::{FileProcessor, FileScan};
