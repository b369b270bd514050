use regex::{Regex, RegexBuilder};
use std::sync::Arc;

use crate::errors::{SearchError, SearchResult};
use crate::job::{JobSpec, OperationKind, WordChars};

/// Characters that switch replace into regex mode
const REGEX_METACHARACTERS: &[char] = &[
    '.', '*', '+', '?', '^', '$', '{', '}', '(', ')', '|', '[', ']', '\\',
];

/// Decides whether a match is bounded by non-word characters on both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordBoundary {
    chars: WordChars,
}

impl WordBoundary {
    pub fn new(chars: WordChars) -> Self {
        Self { chars }
    }

    pub fn chars(&self) -> WordChars {
        self.chars
    }

    fn is_word_byte(&self, b: u8) -> bool {
        match self.chars {
            WordChars::Alphanumeric => b.is_ascii_alphanumeric(),
            WordChars::AlphanumericUnderscore => b.is_ascii_alphanumeric() || b == b'_',
        }
    }

    /// Checks the bytes just outside `text[start..end]`
    pub fn is_whole_word(&self, text: &str, start: usize, end: usize) -> bool {
        let bytes = text.as_bytes();
        let before = start == 0 || !self.is_word_byte(bytes[start - 1]);
        let after = end >= bytes.len() || !self.is_word_byte(bytes[end]);
        before && after
    }
}

/// Strategy for pattern matching
#[derive(Debug, Clone)]
pub enum MatchStrategy {
    /// Plain substring search, optionally folding ASCII case
    Literal { needle: String, fold_case: bool },
    Regex(Arc<Regex>),
}

/// Finds the non-overlapping matches of one job's pattern in a line
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    strategy: MatchStrategy,
    boundary: Option<WordBoundary>,
}

impl PatternMatcher {
    /// Creates a literal matcher
    pub fn literal(needle: impl Into<String>, fold_case: bool) -> Self {
        let needle = needle.into();
        let needle = if fold_case {
            needle.to_ascii_lowercase()
        } else {
            needle
        };
        Self {
            strategy: MatchStrategy::Literal { needle, fold_case },
            boundary: None,
        }
    }

    /// Compiles a regex matcher
    pub fn regex(pattern: &str, case_sensitive: bool) -> SearchResult<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| SearchError::invalid_pattern(e.to_string()))?;
        Ok(Self {
            strategy: MatchStrategy::Regex(Arc::new(regex)),
            boundary: None,
        })
    }

    /// Adds a post-hoc whole-word filter to the matcher
    pub fn with_boundary(mut self, boundary: WordBoundary) -> Self {
        self.boundary = Some(boundary);
        self
    }

    /// Builds the matcher a job's operation calls for
    pub fn for_job(spec: &JobSpec) -> SearchResult<Self> {
        let boundary = spec.whole_word.then(|| WordBoundary::new(spec.word_chars()));
        let matcher = match spec.operation {
            OperationKind::Count | OperationKind::SearchCaseSensitive => {
                Self::literal(spec.pattern.as_str(), false)
            }
            OperationKind::SearchCaseInsensitive => Self::literal(spec.pattern.as_str(), true),
            OperationKind::SearchRegex => {
                let pattern = if spec.whole_word {
                    format!(r"(?-u:\b)(?:{})(?-u:\b)", spec.pattern)
                } else {
                    spec.pattern.clone()
                };
                // ASCII \b, like the byte-level boundary of the other operations
                return Self::regex(&pattern, spec.regex_case_sensitive());
            }
            OperationKind::Replace => {
                let case_sensitive = has_uppercase(&spec.pattern);
                if is_regex_pattern(&spec.pattern) {
                    Self::regex(&spec.pattern, case_sensitive)?
                } else {
                    Self::literal(spec.pattern.as_str(), !case_sensitive)
                }
            }
        };
        Ok(match boundary {
            Some(boundary) => matcher.with_boundary(boundary),
            None => matcher,
        })
    }

    pub fn strategy(&self) -> &MatchStrategy {
        &self.strategy
    }

    pub fn is_regex(&self) -> bool {
        matches!(self.strategy, MatchStrategy::Regex(_))
    }

    /// Finds all matches in the given text as byte ranges, in order
    pub fn find_matches(&self, text: &str) -> Vec<(usize, usize)> {
        let candidates: Vec<(usize, usize)> = match &self.strategy {
            MatchStrategy::Literal { needle, fold_case } => {
                if *fold_case {
                    // ASCII folding keeps byte offsets stable
                    text.to_ascii_lowercase()
                        .match_indices(needle.as_str())
                        .map(|(start, m)| (start, start + m.len()))
                        .collect()
                } else {
                    text.match_indices(needle.as_str())
                        .map(|(start, m)| (start, start + m.len()))
                        .collect()
                }
            }
            MatchStrategy::Regex(regex) => {
                regex.find_iter(text).map(|m| (m.start(), m.end())).collect()
            }
        };

        match &self.boundary {
            Some(boundary) => candidates
                .into_iter()
                .filter(|&(start, end)| boundary.is_whole_word(text, start, end))
                .collect(),
            None => candidates,
        }
    }
}

/// Checks if the pattern contains any regex metacharacter
pub fn is_regex_pattern(pattern: &str) -> bool {
    pattern.contains(REGEX_METACHARACTERS)
}

fn has_uppercase(pattern: &str) -> bool {
    pattern.chars().any(|c| c.is_ascii_uppercase())
}
