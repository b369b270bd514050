pub mod audit;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod filters;
pub mod job;
pub mod manifest;
pub mod metrics;
pub mod partition;
pub mod replace;
pub mod results;
pub mod search;

pub use audit::{AuditLog, AuditSender, OperationLogEntry};
pub use config::{Backend, EncodingMode, SweepConfig};
pub use coordinator::{Coordinator, ExecutionBackend, JobPhase};
pub use errors::{SearchError, SearchResult};
pub use job::{JobSpec, MatchOptions, OperationKind, RegexCase, WordChars};
pub use manifest::{FileRecord, Manifest};
pub use partition::WorkRange;
pub use results::{FileOutcome, JobReport, MatchOccurrence, WorkerResult};
