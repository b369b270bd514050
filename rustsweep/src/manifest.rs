use ignore::WalkBuilder;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::SweepConfig;
use crate::errors::{SearchError, SearchResult};
use crate::filters::{has_valid_extension, should_ignore};

/// A file and the size it had when the job started
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub byte_size: u64,
}

impl FileRecord {
    /// Stats `path` once; a missing file is a setup failure
    pub fn stat(path: impl Into<PathBuf>) -> SearchResult<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|e| SearchError::from_open(&path, e))?;
        if !metadata.is_file() {
            return Err(SearchError::file_not_found(path));
        }
        Ok(Self {
            path,
            byte_size: metadata.len(),
        })
    }
}

/// The ordered list of files a job works on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    records: Vec<FileRecord>,
}

impl Manifest {
    pub fn new(records: Vec<FileRecord>) -> Self {
        Self { records }
    }

    /// Builds a manifest from explicit paths, failing on the first missing one
    pub fn from_paths<I, P>(paths: I) -> SearchResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let records = paths
            .into_iter()
            .map(FileRecord::stat)
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(Self::new(records))
    }

    /// Enumerates the files under the configured root
    pub fn discover(config: &SweepConfig) -> SearchResult<Self> {
        let mut walker = WalkBuilder::new(&config.root_path);
        walker
            .hidden(true)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .max_depth(if config.recursive { None } else { Some(1) });

        let audit_log = config.audit_log.as_deref().and_then(|p| p.file_name());

        let mut paths: Vec<PathBuf> = walker
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .filter(|path| {
                has_valid_extension(path, &config.file_extensions)
                    && !should_ignore(path, &config.ignore_patterns)
                    && !is_audit_log(path, audit_log)
            })
            .collect();
        paths.sort();

        debug!(
            "Discovered {} files under {}",
            paths.len(),
            config.root_path.display()
        );
        Self::from_paths(paths)
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of all recorded sizes
    pub fn total_size(&self) -> u64 {
        self.records.iter().map(|r| r.byte_size).sum()
    }

    /// Each record with the offset at which it starts in the concatenated corpus
    pub fn with_offsets(&self) -> impl Iterator<Item = (u64, &FileRecord)> {
        self.records.iter().scan(0u64, |offset, record| {
            let start = *offset;
            *offset += record.byte_size;
            Some((start, record))
        })
    }

    /// Re-checks that every listed file still exists
    pub fn verify(&self) -> SearchResult<()> {
        if self.is_empty() {
            return Err(SearchError::EmptyManifest);
        }
        match self.records.iter().find(|r| !r.path.is_file()) {
            Some(missing) => Err(SearchError::file_not_found(&missing.path)),
            None => Ok(()),
        }
    }
}

fn is_audit_log(path: &Path, audit_log: Option<&std::ffi::OsStr>) -> bool {
    match audit_log {
        Some(name) => path.file_name() == Some(name),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(name: &str, size: u64) -> FileRecord {
        FileRecord {
            path: PathBuf::from(name),
            byte_size: size,
        }
    }

    #[test]
    fn test_offsets_are_cumulative() {
        let manifest = Manifest::new(vec![record("a", 5), record("b", 0), record("c", 7)]);
        let offsets: Vec<u64> = manifest.with_offsets().map(|(o, _)| o).collect();
        assert_eq!(offsets, vec![0, 5, 5]);
        assert_eq!(manifest.total_size(), 12);
    }

    #[test]
    fn test_from_paths_reports_missing_file() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("present.txt");
        fs::write(&present, "abc").unwrap();

        let manifest = Manifest::from_paths([present.clone()]).unwrap();
        assert_eq!(manifest.records()[0].byte_size, 3);

        let result = Manifest::from_paths([present, dir.path().join("absent.txt")]);
        assert!(matches!(result, Err(SearchError::FileNotFound(_))));
    }

    #[test]
    fn test_verify_gates() {
        assert!(matches!(
            Manifest::default().verify(),
            Err(SearchError::EmptyManifest)
        ));

        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "x").unwrap();
        let manifest = Manifest::from_paths([path.clone()]).unwrap();
        assert!(manifest.verify().is_ok());

        fs::remove_file(&path).unwrap();
        assert!(matches!(
            manifest.verify(),
            Err(SearchError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "bb").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("skip.md"), "md").unwrap();
        fs::write(dir.path().join("operation_log.txt"), "log").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.txt"), "c").unwrap();

        let config = SweepConfig {
            root_path: dir.path().to_path_buf(),
            ..SweepConfig::default()
        };
        let manifest = Manifest::discover(&config).unwrap();
        let names: Vec<_> = manifest
            .records()
            .iter()
            .map(|r| r.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        let recursive = SweepConfig {
            recursive: true,
            ..config
        };
        assert_eq!(Manifest::discover(&recursive).unwrap().len(), 3);
    }
}
