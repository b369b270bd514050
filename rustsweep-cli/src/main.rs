mod interactive;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rustsweep::{
    Backend, Coordinator, EncodingMode, JobReport, JobSpec, Manifest, OperationKind, RegexCase,
    SearchError, SweepConfig, WordChars,
};
use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::interactive::Prompter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: GlobalOptions,
}

#[derive(Args)]
struct GlobalOptions {
    /// Directory whose files are processed
    #[arg(short = 'd', long, global = true)]
    dir: Option<PathBuf>,

    /// File extensions to include (e.g. txt,log); '*' includes every file
    #[arg(short = 'e', long, global = true)]
    ext: Option<String>,

    /// Patterns to ignore (glob format)
    #[arg(long, global = true)]
    ignore: Vec<String>,

    /// Descend into subdirectories
    #[arg(short = 'R', long, global = true)]
    recursive: bool,

    /// Match whole words only
    #[arg(short = 'w', long, global = true)]
    whole_word: bool,

    /// Number of workers to split the files across
    #[arg(short = 'j', long, global = true)]
    threads: Option<NonZeroUsize>,

    /// Run a single worker on the main thread
    #[arg(long, global = true)]
    sequential: bool,

    /// Configuration file layered over the default locations
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Where audit entries are appended (default: operation_log.txt)
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,

    /// Do not write an audit log
    #[arg(long, global = true, conflicts_with = "audit_log")]
    no_audit_log: bool,

    /// How to handle invalid UTF-8 sequences (failfast|lossy)
    #[arg(long, global = true)]
    encoding: Option<String>,

    /// Characters that make up a word (alnum|alnum-underscore)
    #[arg(long, global = true)]
    word_chars: Option<String>,

    /// Case handling of regex searches (follow-whole-word|sensitive|insensitive)
    #[arg(long, global = true)]
    regex_case: Option<String>,

    /// Show only per-file counts and the summary, not individual matches
    #[arg(short, long, global = true)]
    stats: bool,

    /// Print the job report as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Args)]
struct Targets {
    /// Files to process instead of scanning the directory
    files: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Count occurrences of a word
    Count {
        pattern: String,
        #[command(flatten)]
        targets: Targets,
    },

    /// Search for a word and report every occurrence
    Search {
        pattern: String,

        /// Ignore ASCII case
        #[arg(short = 'i', long)]
        ignore_case: bool,

        #[command(flatten)]
        targets: Targets,
    },

    /// Search with a regular expression
    Regex {
        pattern: String,
        #[command(flatten)]
        targets: Targets,
    },

    /// Replace a word in place
    Replace {
        pattern: String,

        /// Text to replace matches with
        #[arg(short = 'r', long)]
        replacement: String,

        /// Count replacements without modifying any file
        #[arg(short = 'n', long)]
        dry_run: bool,

        #[command(flatten)]
        targets: Targets,
    },

    /// Describe the job through prompts on standard input
    Interactive,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let dry_run = matches!(cli.command, Commands::Replace { dry_run: true, .. });
    let config = build_config(&cli.options, dry_run)?;
    init_tracing(&config.log_level);

    let whole_word = cli.options.whole_word;
    let (spec, files) = match cli.command {
        Commands::Count { pattern, targets } => {
            (JobSpec::count(pattern, whole_word)?, targets.files)
        }
        Commands::Search {
            pattern,
            ignore_case,
            targets,
        } => (
            JobSpec::search(pattern, !ignore_case, whole_word)?,
            targets.files,
        ),
        Commands::Regex { pattern, targets } => {
            (JobSpec::regex(pattern, whole_word)?, targets.files)
        }
        Commands::Replace {
            pattern,
            replacement,
            targets,
            ..
        } => (
            JobSpec::replace(pattern, replacement, whole_word)?,
            targets.files,
        ),
        Commands::Interactive => {
            let stdin = io::stdin();
            let spec = Prompter::new(stdin.lock(), io::stdout()).collect_job()?;
            (spec, Vec::new())
        }
    };

    let manifest = if files.is_empty() {
        Manifest::discover(&config)?
    } else {
        Manifest::from_paths(files)?
    };

    let stats_only = cli.options.stats;
    let json = cli.options.json;
    let report = Coordinator::new(config).run(spec, manifest)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    } else {
        print_report(&report, stats_only, dry_run);
    }
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Layers the command line over the configuration files
fn build_config(options: &GlobalOptions, dry_run: bool) -> Result<SweepConfig> {
    let from_files = SweepConfig::load_from(options.config.as_deref())
        .map_err(|e| SearchError::config_error(e.to_string()))?;
    let defaults = SweepConfig::default();

    let cli = SweepConfig {
        root_path: options.dir.clone().unwrap_or(defaults.root_path.clone()),
        file_extensions: match options.ext.as_deref() {
            Some("*") => None,
            Some(ext) => Some(
                ext.split(',')
                    .map(|s| s.trim().trim_start_matches('.').to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            None => defaults.file_extensions.clone(),
        },
        ignore_patterns: options.ignore.clone(),
        recursive: options.recursive,
        worker_count: options.threads.unwrap_or(defaults.worker_count),
        backend: if options.sequential {
            Backend::Sequential
        } else {
            defaults.backend
        },
        audit_log: if options.no_audit_log {
            None
        } else {
            options.audit_log.clone().or(defaults.audit_log.clone())
        },
        encoding_mode: match options.encoding.as_deref() {
            Some(mode) => parse_encoding(mode)?,
            None => defaults.encoding_mode,
        },
        word_chars: options.word_chars.as_deref().map(parse_word_chars).transpose()?,
        regex_case: match options.regex_case.as_deref() {
            Some(case) => parse_regex_case(case)?,
            None => defaults.regex_case,
        },
        dry_run,
        ..defaults
    };
    Ok(from_files.merge_with_cli(cli))
}

fn parse_encoding(value: &str) -> Result<EncodingMode, SearchError> {
    match value.to_lowercase().as_str() {
        "failfast" | "fail-fast" => Ok(EncodingMode::FailFast),
        "lossy" => Ok(EncodingMode::Lossy),
        other => Err(SearchError::config_error(format!(
            "Unknown encoding mode '{}' (expected failfast or lossy)",
            other
        ))),
    }
}

fn parse_word_chars(value: &str) -> Result<WordChars, SearchError> {
    match value.to_lowercase().as_str() {
        "alnum" | "alphanumeric" => Ok(WordChars::Alphanumeric),
        "alnum-underscore" | "alphanumeric-underscore" => Ok(WordChars::AlphanumericUnderscore),
        other => Err(SearchError::config_error(format!(
            "Unknown word characters '{}' (expected alnum or alnum-underscore)",
            other
        ))),
    }
}

fn parse_regex_case(value: &str) -> Result<RegexCase, SearchError> {
    match value.to_lowercase().as_str() {
        "follow-whole-word" => Ok(RegexCase::FollowWholeWord),
        "sensitive" => Ok(RegexCase::Sensitive),
        "insensitive" => Ok(RegexCase::Insensitive),
        other => Err(SearchError::config_error(format!(
            "Unknown regex case '{}' (expected follow-whole-word, sensitive or insensitive)",
            other
        ))),
    }
}

fn print_report(report: &JobReport, stats_only: bool, dry_run: bool) {
    let spec = &report.spec;
    if dry_run {
        println!("{}", "Dry run - no files were modified".yellow());
    }

    for file in report.files() {
        if let Some(error) = &file.error {
            eprintln!(
                "{} {}: {}",
                "skipped".yellow(),
                file.path.display(),
                error
            );
            continue;
        }
        if !stats_only {
            for occurrence in &file.occurrences {
                println!("{}", occurrence);
            }
        }
        let path = file.path.display().to_string().blue();
        match spec.operation {
            OperationKind::Replace => println!(
                "File: {}, Count: {}, Search: {}, Replace: {}",
                path,
                file.count,
                spec.pattern,
                spec.replacement_text()
            ),
            _ => println!("File: {}, Count: {}", path, file.count),
        }
    }

    println!("\n{}", report.summary().green());
}
