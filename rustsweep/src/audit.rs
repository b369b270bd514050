//! Append-only audit log of processed files.
//!
//! Workers never touch the log file themselves. Each one holds an
//! [`AuditSender`] and pushes structured entries over a channel to a single
//! writer thread, which owns the file handle and writes one line per entry.
//! Lines from different workers can interleave in any order but are never
//! torn.
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::errors::{SearchError, SearchResult};
use crate::job::{JobSpec, OperationKind};

/// One audit record: what was done to which file, and how often it matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationLogEntry {
    pub timestamp: SystemTime,
    pub operation: OperationKind,
    pub pattern: String,
    pub replacement: Option<String>,
    pub file: PathBuf,
    pub count: usize,
}

impl OperationLogEntry {
    pub fn for_file(spec: &JobSpec, file: &Path, count: usize) -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: spec.operation,
            pattern: spec.pattern.clone(),
            replacement: spec.replacement.clone(),
            file: file.to_path_buf(),
            count,
        }
    }
}

impl fmt::Display for OperationLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timestamp = humantime::format_rfc3339_seconds(self.timestamp);
        match self.operation {
            OperationKind::Replace => write!(
                f,
                "[{}] Operation-1: Replace, Text-1: {}, Operation-2: Search, Text-2: {}, File: {}, Count: {}",
                timestamp,
                self.replacement.as_deref().unwrap_or_default(),
                self.pattern,
                self.file.display(),
                self.count
            ),
            op => write!(
                f,
                "[{}] Operation: {}, Text: {}, File: {}, Count: {}",
                timestamp,
                op,
                self.pattern,
                self.file.display(),
                self.count
            ),
        }
    }
}

/// A cloneable handle workers use to submit entries
#[derive(Debug, Clone, Default)]
pub struct AuditSender {
    tx: Option<Sender<OperationLogEntry>>,
}

impl AuditSender {
    /// Queues an entry; a closed log only produces a warning
    pub fn record(&self, entry: OperationLogEntry) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.send(entry) {
                warn!("Audit log closed, dropping entry for {}", e.0.file.display());
            }
        }
    }
}

/// Owns the writer thread behind an audit log
#[derive(Debug)]
pub struct AuditLog {
    tx: Option<Sender<OperationLogEntry>>,
    handle: Option<JoinHandle<SearchResult<usize>>>,
}

impl AuditLog {
    /// Opens `path` for appending and starts the writer thread
    pub fn open(path: &Path) -> SearchResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                SearchError::audit_log(format!("cannot open {}: {}", path.display(), e))
            })?;
        debug!("Audit log at {}", path.display());
        Self::spawn(BufWriter::new(file))
    }

    /// Starts a writer thread over any sink
    pub fn spawn<W>(writer: W) -> SearchResult<Self>
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("audit-log".to_string())
            .spawn(move || write_entries(rx, writer))?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// A log that accepts and discards every entry
    pub fn disabled() -> Self {
        Self {
            tx: None,
            handle: None,
        }
    }

    pub fn sender(&self) -> AuditSender {
        AuditSender {
            tx: self.tx.clone(),
        }
    }

    /// Closes the channel, waits for the writer and returns the lines written.
    /// Blocks until every outstanding [`AuditSender`] has been dropped.
    pub fn finish(mut self) -> SearchResult<usize> {
        self.close()
    }

    fn close(&mut self) -> SearchResult<usize> {
        self.tx.take();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SearchError::audit_log("writer thread panicked"))?,
            None => Ok(0),
        }
    }
}

impl Drop for AuditLog {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("{}", e);
        }
    }
}

fn write_entries<W: Write>(rx: Receiver<OperationLogEntry>, mut writer: W) -> SearchResult<usize> {
    let mut written = 0;
    while let Ok(entry) = rx.recv() {
        writeln!(writer, "{}", entry)
            .map_err(|e| SearchError::audit_log(format!("write failed: {}", e)))?;
        written += 1;
    }
    writer
        .flush()
        .map_err(|e| SearchError::audit_log(format!("flush failed: {}", e)))?;
    Ok(written)
}
