//! In-place replacement as a streaming rewrite with an atomic commit.
//!
//! The source is read chunk by chunk and every rewritten chunk goes to a
//! temporary file created next to the source, so the final rename never
//! crosses a filesystem. The rename is the only step that touches the
//! original path: any failure before it drops the temporary file and leaves
//! the source byte-for-byte intact.
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::errors::{SearchError, SearchResult};
use crate::search::chunks::{split_terminator, LineChunks, DEFAULT_LINE_BUFFER};
use crate::search::matcher::PatternMatcher;

const BUFFER_CAPACITY: usize = 65536;

/// Rewrites files, replacing every match of one pattern
#[derive(Debug, Clone)]
pub struct ReplaceTransaction {
    matcher: Arc<PatternMatcher>,
    replacement: String,
    line_buffer_capacity: usize,
    preserve_metadata: bool,
    dry_run: bool,
}

impl ReplaceTransaction {
    pub fn new(matcher: Arc<PatternMatcher>, replacement: impl Into<String>) -> Self {
        Self {
            matcher,
            replacement: replacement.into(),
            line_buffer_capacity: DEFAULT_LINE_BUFFER,
            preserve_metadata: true,
            dry_run: false,
        }
    }

    pub fn with_line_buffer(mut self, capacity: usize) -> Self {
        self.line_buffer_capacity = capacity;
        self
    }

    /// Whether the rewritten file keeps the original's permissions
    pub fn preserve_metadata(mut self, preserve: bool) -> Self {
        self.preserve_metadata = preserve;
        self
    }

    /// Counts replacements without writing anything
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Replaces every match in `path` and returns how many were made
    pub fn apply(&self, path: &Path) -> SearchResult<usize> {
        let source = File::open(path).map_err(|e| SearchError::from_open(path, e))?;
        let permissions = source.metadata()?.permissions();
        let mut chunks = LineChunks::new(
            BufReader::with_capacity(BUFFER_CAPACITY, source),
            self.line_buffer_capacity,
        );

        if self.dry_run {
            return self.rewrite(&mut chunks, &mut io::sink(), path);
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let prefix = format!(
            ".{}.",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        let mut temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|source| SearchError::TempFile {
                path: path.to_path_buf(),
                source,
            })?;
        trace!("Rewriting {} via {}", path.display(), temp.path().display());

        let count = {
            let mut writer = BufWriter::with_capacity(BUFFER_CAPACITY, temp.as_file_mut());
            let count = self.rewrite(&mut chunks, &mut writer, path)?;
            writer.flush()?;
            count
        };

        if count == 0 {
            debug!("No replacements in {}, leaving it untouched", path.display());
            return Ok(0);
        }

        drop(chunks);
        temp.as_file().sync_all()?;
        if self.preserve_metadata {
            fs::set_permissions(temp.path(), permissions)?;
        }
        temp.persist(path).map_err(|e| SearchError::Commit {
            path: path.to_path_buf(),
            source: e.error,
        })?;

        debug!("Committed {} replacements to {}", count, path.display());
        Ok(count)
    }

    fn rewrite<R, W>(
        &self,
        chunks: &mut LineChunks<R>,
        out: &mut W,
        path: &Path,
    ) -> SearchResult<usize>
    where
        R: io::BufRead,
        W: Write,
    {
        let mut count = 0;
        while let Some(bytes) = chunks.next_chunk()? {
            // strict decoding: bytes outside matches must survive unchanged
            let chunk =
                std::str::from_utf8(bytes).map_err(|e| SearchError::encoding_error(path, e))?;
            let (content, terminator) = split_terminator(chunk);

            let mut last = 0;
            for (start, end) in self.matcher.find_matches(content) {
                out.write_all(content[last..start].as_bytes())?;
                out.write_all(self.replacement.as_bytes())?;
                last = end;
                count += 1;
            }
            out.write_all(content[last..].as_bytes())?;
            out.write_all(terminator.as_bytes())?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobSpec;
    use tempfile::TempDir;

    fn transaction(pattern: &str, replacement: &str, whole_word: bool) -> ReplaceTransaction {
        let spec = JobSpec::replace(pattern, replacement, whole_word).unwrap();
        let matcher = PatternMatcher::for_job(&spec).unwrap();
        ReplaceTransaction::new(Arc::new(matcher), replacement)
    }

    fn leftover_temp_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count()
    }

    #[test]
    fn test_multiple_replacements() -> SearchResult<()> {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("test.txt");
        fs::write(&file_path, "test test test\nno match\ntest")?;

        let count = transaction("test", "replaced", false).apply(&file_path)?;

        assert_eq!(count, 4);
        assert_eq!(
            fs::read_to_string(&file_path)?,
            "replaced replaced replaced\nno match\nreplaced"
        );
        assert_eq!(leftover_temp_files(dir.path()), 0);
        Ok(())
    }

    #[test]
    fn test_lowercase_pattern_matches_any_case() -> SearchResult<()> {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("test.txt");
        fs::write(&file_path, "Cat cat CAT\n")?;

        assert_eq!(transaction("cat", "dog", false).apply(&file_path)?, 3);
        assert_eq!(fs::read_to_string(&file_path)?, "dog dog dog\n");
        Ok(())
    }

    #[test]
    fn test_uppercase_pattern_is_case_sensitive() -> SearchResult<()> {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("test.txt");
        fs::write(&file_path, "Cat cat CAT\n")?;

        assert_eq!(transaction("Cat", "Dog", false).apply(&file_path)?, 1);
        assert_eq!(fs::read_to_string(&file_path)?, "Dog cat CAT\n");
        Ok(())
    }

    #[test]
    fn test_whole_word_ignores_underscore() -> SearchResult<()> {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("test.txt");
        fs::write(&file_path, "cat category my_cat cats\n")?;

        assert_eq!(transaction("cat", "dog", true).apply(&file_path)?, 2);
        assert_eq!(
            fs::read_to_string(&file_path)?,
            "dog category my_dog cats\n"
        );
        Ok(())
    }

    #[test]
    fn test_regex_replacement() -> SearchResult<()> {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("test.txt");
        fs::write(&file_path, "id 42 and id 7\n")?;

        assert_eq!(transaction(r"\d+", "N", false).apply(&file_path)?, 2);
        assert_eq!(fs::read_to_string(&file_path)?, "id N and id N\n");
        Ok(())
    }

    #[test]
    fn test_no_match_leaves_file_untouched() -> SearchResult<()> {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("test.txt");
        fs::write(&file_path, "nothing to see\n")?;
        let before = fs::metadata(&file_path)?.modified()?;

        assert_eq!(transaction("absent", "x", false).apply(&file_path)?, 0);
        assert_eq!(fs::read_to_string(&file_path)?, "nothing to see\n");
        assert_eq!(fs::metadata(&file_path)?.modified()?, before);
        assert_eq!(leftover_temp_files(dir.path()), 0);
        Ok(())
    }

    #[test]
    fn test_invalid_utf8_keeps_original() -> SearchResult<()> {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("test.txt");
        let original = b"cat\ncat \xff\n".to_vec();
        fs::write(&file_path, &original)?;

        let result = transaction("cat", "dog", false).apply(&file_path);
        assert!(matches!(result, Err(SearchError::EncodingError { .. })));
        assert_eq!(fs::read(&file_path)?, original);
        assert_eq!(leftover_temp_files(dir.path()), 0);
        Ok(())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_temp_file_failure_keeps_original() -> SearchResult<()> {
        let dir = TempDir::new().unwrap();
        // fits NAME_MAX, but ".<name>.XXXXXX.tmp" does not
        let file_path = dir.path().join(format!("{}.txt", "x".repeat(246)));
        fs::write(&file_path, "cat cat\n")?;

        let result = transaction("cat", "dog", false).apply(&file_path);
        match result {
            Err(SearchError::TempFile { path, .. }) => assert_eq!(path, file_path),
            other => panic!("expected a temp file error, got {:?}", other),
        }
        assert_eq!(fs::read_to_string(&file_path)?, "cat cat\n");
        assert_eq!(leftover_temp_files(dir.path()), 0);
        Ok(())
    }

    #[test]
    fn test_missing_source_is_reported() {
        let dir = TempDir::new().unwrap();
        let result = transaction("cat", "dog", false).apply(&dir.path().join("gone.txt"));
        assert!(matches!(result, Err(SearchError::FileNotFound(_))));
    }

    #[test]
    fn test_dry_run_counts_without_writing() -> SearchResult<()> {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("test.txt");
        fs::write(&file_path, "cat cat\n")?;

        let count = transaction("cat", "dog", false)
            .dry_run(true)
            .apply(&file_path)?;
        assert_eq!(count, 2);
        assert_eq!(fs::read_to_string(&file_path)?, "cat cat\n");
        Ok(())
    }

    #[test]
    fn test_round_trip_restores_content() -> SearchResult<()> {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("test.txt");
        let original = "the fox and the hound\nfox\n";
        fs::write(&file_path, original)?;

        transaction("fox", "owl", false).apply(&file_path)?;
        transaction("owl", "fox", false).apply(&file_path)?;
        assert_eq!(fs::read_to_string(&file_path)?, original);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_preserve_permissions() -> SearchResult<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("script.txt");
        fs::write(&file_path, "cat\n")?;
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o750))?;

        transaction("cat", "dog", false).apply(&file_path)?;
        let mode = fs::metadata(&file_path)?.permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
        Ok(())
    }
}
