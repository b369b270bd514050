use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::job::{MatchOptions, RegexCase, WordChars};
use crate::search::DEFAULT_LINE_BUFFER;

/// Default name of the audit log, kept out of discovered manifests
pub const DEFAULT_AUDIT_LOG: &str = "operation_log.txt";

/// How to handle bytes that are not valid UTF-8 while searching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingMode {
    /// The file fails with an encoding error
    #[default]
    FailFast,
    /// Invalid sequences are replaced and the scan continues
    Lossy,
}

/// Which concurrency backend runs the workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// A single in-thread worker
    Sequential,
    /// `worker_count` workers on a dedicated thread pool
    #[default]
    Pool,
}

/// Settings for a sweep run.
///
/// # Configuration Locations
///
/// Loaded from these locations, later ones overriding earlier ones:
/// 1. Global `$CONFIG_DIR/rustsweep/config.yaml`
/// 2. Local `.rustsweep.yaml` in the current directory
/// 3. A file passed with `--config`
///
/// Command-line arguments are merged on top with [`SweepConfig::merge_with_cli`].
///
/// # Example
///
/// ```yaml
/// root_path: "./corpus"
/// file_extensions: ["txt", "log"]
/// ignore_patterns: ["*.bak.txt"]
/// worker_count: 4
/// backend: pool
/// audit_log: "operation_log.txt"
/// word_chars: alphanumeric-underscore
/// regex_case: follow-whole-word
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Directory whose files make up the manifest
    pub root_path: PathBuf,

    /// Extensions to include; `None` includes every file
    pub file_extensions: Option<Vec<String>>,

    /// Glob patterns of files to skip
    pub ignore_patterns: Vec<String>,

    /// Descend into subdirectories
    pub recursive: bool,

    /// Number of workers the corpus is split across
    pub worker_count: NonZeroUsize,

    pub backend: Backend,

    /// Hold every worker at a barrier until all of them are ready
    pub synchronized_start: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    pub encoding_mode: EncodingMode,

    /// Bytes per line chunk, terminator included
    pub line_buffer_capacity: usize,

    /// Where audit entries are appended; `None` disables the audit log
    pub audit_log: Option<PathBuf>,

    /// Overrides the word characters of every operation's whole-word check
    pub word_chars: Option<WordChars>,

    pub regex_case: RegexCase,

    /// Keep the original permissions on rewritten files
    pub preserve_metadata: bool,

    /// Count replacements without rewriting files
    pub dry_run: bool,
}

fn default_worker_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            file_extensions: Some(vec!["txt".to_string()]),
            ignore_patterns: Vec::new(),
            recursive: false,
            worker_count: default_worker_count(),
            backend: Backend::default(),
            synchronized_start: true,
            log_level: default_log_level(),
            encoding_mode: EncodingMode::default(),
            line_buffer_capacity: DEFAULT_LINE_BUFFER,
            audit_log: Some(PathBuf::from(DEFAULT_AUDIT_LOG)),
            word_chars: None,
            regex_case: RegexCase::default(),
            preserve_metadata: true,
            dry_run: false,
        }
    }
}

impl SweepConfig {
    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("rustsweep/config.yaml")),
            Some(PathBuf::from(".rustsweep.yaml")),
        ];
        for path in defaults.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // an explicit file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments with configuration file values.
    /// A CLI value wins whenever it differs from the built-in default.
    pub fn merge_with_cli(mut self, cli: SweepConfig) -> Self {
        let defaults = SweepConfig::default();

        if cli.root_path != defaults.root_path {
            self.root_path = cli.root_path;
        }
        if cli.file_extensions != defaults.file_extensions {
            self.file_extensions = cli.file_extensions;
        }
        if !cli.ignore_patterns.is_empty() {
            self.ignore_patterns = cli.ignore_patterns;
        }
        self.recursive |= cli.recursive;
        if cli.worker_count != defaults.worker_count {
            self.worker_count = cli.worker_count;
        }
        if cli.backend != defaults.backend {
            self.backend = cli.backend;
        }
        if cli.synchronized_start != defaults.synchronized_start {
            self.synchronized_start = cli.synchronized_start;
        }
        if cli.log_level != defaults.log_level {
            self.log_level = cli.log_level;
        }
        if cli.encoding_mode != defaults.encoding_mode {
            self.encoding_mode = cli.encoding_mode;
        }
        if cli.line_buffer_capacity != defaults.line_buffer_capacity {
            self.line_buffer_capacity = cli.line_buffer_capacity;
        }
        if cli.audit_log != defaults.audit_log {
            self.audit_log = cli.audit_log;
        }
        if cli.word_chars.is_some() {
            self.word_chars = cli.word_chars;
        }
        if cli.regex_case != defaults.regex_case {
            self.regex_case = cli.regex_case;
        }
        if cli.preserve_metadata != defaults.preserve_metadata {
            self.preserve_metadata = cli.preserve_metadata;
        }
        self.dry_run |= cli.dry_run;
        self
    }

    /// The matching refinements this configuration asks for
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            word_chars: self.word_chars,
            regex_case: self.regex_case,
        }
    }
}
