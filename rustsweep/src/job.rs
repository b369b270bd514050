use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{SearchError, SearchResult};

/// Longest pattern or replacement accepted, in bytes
pub const MAX_PATTERN_LEN: usize = 99;

/// The operation a job performs on every owned file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Count,
    SearchCaseSensitive,
    SearchCaseInsensitive,
    SearchRegex,
    Replace,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Count,
        OperationKind::SearchCaseSensitive,
        OperationKind::SearchCaseInsensitive,
        OperationKind::SearchRegex,
        OperationKind::Replace,
    ];

    /// Maps the numbered menu selector (1-5) onto an operation
    pub fn from_selector(selector: u8) -> Option<Self> {
        match selector {
            1 => Some(Self::Count),
            2 => Some(Self::SearchCaseSensitive),
            3 => Some(Self::SearchCaseInsensitive),
            4 => Some(Self::SearchRegex),
            5 => Some(Self::Replace),
            _ => None,
        }
    }

    pub fn selector(self) -> u8 {
        match self {
            Self::Count => 1,
            Self::SearchCaseSensitive => 2,
            Self::SearchCaseInsensitive => 3,
            Self::SearchRegex => 4,
            Self::Replace => 5,
        }
    }

    /// Display name used in audit entries and summaries
    pub fn name(self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::SearchCaseSensitive => "Search (Case Sensitive)",
            Self::SearchCaseInsensitive => "Search (Case Insensitive)",
            Self::SearchRegex => "Search (Regular Expression)",
            Self::Replace => "Replace",
        }
    }

    /// Whether the operation reports individual occurrences
    pub fn reports_occurrences(self) -> bool {
        matches!(
            self,
            Self::SearchCaseSensitive | Self::SearchCaseInsensitive | Self::SearchRegex
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Characters that count as part of a word when checking whole-word matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WordChars {
    /// ASCII letters and digits
    Alphanumeric,
    /// ASCII letters, digits and `_`
    AlphanumericUnderscore,
}

/// How the regex search decides case sensitivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegexCase {
    /// Case-sensitive exactly when whole-word matching is requested
    #[default]
    FollowWholeWord,
    Sensitive,
    Insensitive,
}

/// Knobs that refine how a job matches, resolved from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Overrides the word-character set of every operation when set
    pub word_chars: Option<WordChars>,
    pub regex_case: RegexCase,
}

impl MatchOptions {
    /// Keeps every option set here, taking the rest from `fallback`
    pub fn or(self, fallback: MatchOptions) -> MatchOptions {
        MatchOptions {
            word_chars: self.word_chars.or(fallback.word_chars),
            regex_case: if self.regex_case == RegexCase::default() {
                fallback.regex_case
            } else {
                self.regex_case
            },
        }
    }
}

/// An immutable description of one job, shared by every worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub operation: OperationKind,
    pub pattern: String,
    pub replacement: Option<String>,
    pub whole_word: bool,
    #[serde(default)]
    pub options: MatchOptions,
}

impl JobSpec {
    /// Builds and validates a job description
    pub fn new(
        operation: OperationKind,
        pattern: impl Into<String>,
        replacement: Option<String>,
        whole_word: bool,
    ) -> SearchResult<Self> {
        let spec = Self {
            operation,
            pattern: pattern.into(),
            replacement,
            whole_word,
            options: MatchOptions::default(),
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn count(pattern: impl Into<String>, whole_word: bool) -> SearchResult<Self> {
        Self::new(OperationKind::Count, pattern, None, whole_word)
    }

    pub fn search(
        pattern: impl Into<String>,
        case_sensitive: bool,
        whole_word: bool,
    ) -> SearchResult<Self> {
        let operation = if case_sensitive {
            OperationKind::SearchCaseSensitive
        } else {
            OperationKind::SearchCaseInsensitive
        };
        Self::new(operation, pattern, None, whole_word)
    }

    pub fn regex(pattern: impl Into<String>, whole_word: bool) -> SearchResult<Self> {
        Self::new(OperationKind::SearchRegex, pattern, None, whole_word)
    }

    pub fn replace(
        pattern: impl Into<String>,
        replacement: impl Into<String>,
        whole_word: bool,
    ) -> SearchResult<Self> {
        Self::new(
            OperationKind::Replace,
            pattern,
            Some(replacement.into()),
            whole_word,
        )
    }

    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Checks pattern and replacement lengths against the operation
    pub fn validate(&self) -> SearchResult<()> {
        if self.pattern.is_empty() {
            return Err(SearchError::invalid_pattern("Pattern cannot be empty"));
        }
        if self.pattern.len() > MAX_PATTERN_LEN {
            return Err(SearchError::invalid_pattern(format!(
                "Pattern is {} bytes, the limit is {}",
                self.pattern.len(),
                MAX_PATTERN_LEN
            )));
        }
        match (&self.replacement, self.operation) {
            (None, OperationKind::Replace) => Err(SearchError::config_error(
                "Replace requires a replacement text",
            )),
            (Some(_), op) if op != OperationKind::Replace => Err(SearchError::config_error(
                format!("{} does not take a replacement text", op),
            )),
            (Some(r), _) if r.len() > MAX_PATTERN_LEN => Err(SearchError::invalid_pattern(
                format!(
                    "Replacement is {} bytes, the limit is {}",
                    r.len(),
                    MAX_PATTERN_LEN
                ),
            )),
            _ => Ok(()),
        }
    }

    pub fn replacement_text(&self) -> &str {
        self.replacement.as_deref().unwrap_or_default()
    }

    /// Word characters used by this job's whole-word check
    pub fn word_chars(&self) -> WordChars {
        if let Some(chars) = self.options.word_chars {
            return chars;
        }
        match self.operation {
            OperationKind::Count | OperationKind::Replace => WordChars::Alphanumeric,
            _ => WordChars::AlphanumericUnderscore,
        }
    }

    /// Case sensitivity applied by the regex search
    pub fn regex_case_sensitive(&self) -> bool {
        match self.options.regex_case {
            RegexCase::FollowWholeWord => self.whole_word,
            RegexCase::Sensitive => true,
            RegexCase::Insensitive => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_keep_their_own_settings() {
        let config = MatchOptions {
            word_chars: Some(WordChars::AlphanumericUnderscore),
            regex_case: RegexCase::Insensitive,
        };
        assert_eq!(MatchOptions::default().or(config), config);

        let own = MatchOptions {
            word_chars: Some(WordChars::Alphanumeric),
            regex_case: RegexCase::Sensitive,
        };
        assert_eq!(own.or(config), own);
    }

    #[test]
    fn test_selector_round_trip() {
        for op in OperationKind::ALL {
            assert_eq!(OperationKind::from_selector(op.selector()), Some(op));
        }
        assert_eq!(OperationKind::from_selector(0), None);
        assert_eq!(OperationKind::from_selector(6), None);
    }

    #[test]
    fn test_pattern_validation() {
        assert!(JobSpec::count("", false).is_err());
        assert!(JobSpec::count("a".repeat(MAX_PATTERN_LEN), false).is_ok());
        assert!(JobSpec::count("a".repeat(MAX_PATTERN_LEN + 1), false).is_err());
        assert!(JobSpec::replace("cat", "d".repeat(MAX_PATTERN_LEN + 1), false).is_err());
        assert!(JobSpec::new(OperationKind::Replace, "cat", None, false).is_err());
        assert!(JobSpec::new(OperationKind::Count, "cat", Some("dog".into()), false).is_err());
    }

    #[test]
    fn test_default_word_chars_per_operation() {
        assert_eq!(
            JobSpec::count("x", true).unwrap().word_chars(),
            WordChars::Alphanumeric
        );
        assert_eq!(
            JobSpec::replace("x", "y", true).unwrap().word_chars(),
            WordChars::Alphanumeric
        );
        assert_eq!(
            JobSpec::search("x", true, true).unwrap().word_chars(),
            WordChars::AlphanumericUnderscore
        );
        assert_eq!(
            JobSpec::search("x", false, true).unwrap().word_chars(),
            WordChars::AlphanumericUnderscore
        );
    }

    #[test]
    fn test_word_chars_override() {
        let options = MatchOptions {
            word_chars: Some(WordChars::AlphanumericUnderscore),
            ..MatchOptions::default()
        };
        let spec = JobSpec::count("x", true).unwrap().with_options(options);
        assert_eq!(spec.word_chars(), WordChars::AlphanumericUnderscore);
    }

    #[test]
    fn test_regex_case_follows_whole_word_by_default() {
        assert!(JobSpec::regex("a+b", true).unwrap().regex_case_sensitive());
        assert!(!JobSpec::regex("a+b", false).unwrap().regex_case_sensitive());

        let options = MatchOptions {
            regex_case: RegexCase::Insensitive,
            ..MatchOptions::default()
        };
        let spec = JobSpec::regex("a+b", true).unwrap().with_options(options);
        assert!(!spec.regex_case_sensitive());
    }
}
