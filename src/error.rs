use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Mission index {requested} is not the current mission (expected {current})")]
    NotCurrentMission { requested: usize, current: usize },

    #[error("Mission {0} already has an outcome")]
    AlreadyTerminal(u32),

    #[error("Invalid mission state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("All missions have been played")]
    SessionExhausted,

    #[error("An evidence submission is already in flight")]
    SubmissionInFlight,

    #[error("Time ran out on mission {0}")]
    TimeExpired(u32),

    #[error("Submission for mission {0} no longer matches the active mission")]
    StaleSubmission(u32),

    #[error("Evidence upload failed: {0}")]
    Upload(#[from] EvidenceError),

    #[error("Ledger write failed: {0}")]
    Persistence(#[from] LedgerError),
}

impl LifecycleError {
    /// Failures the team can recover from by submitting again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upload(_) | Self::Persistence(_))
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Write rejected by store: {0}")]
    WriteRejected(String),

    #[error("No record at position {0}")]
    NoSuchRecord(usize),

    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordParseError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvidenceError {
    #[error("Evidence file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Evidence channel failed: {0}")]
    Channel(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordParseError {
    #[error("Team name is required")]
    MissingTeam,

    #[error("Cannot read a mission id from '{0}'")]
    InvalidMission(String),

    #[error("Unknown action '{0}' (expected Submission, Bonus or ManualAdjustment)")]
    InvalidAction(String),

    #[error("Points must be a finite number, got '{0}'")]
    InvalidPoints(String),

    #[error("Time taken must be a whole number of seconds, got '{0}'")]
    InvalidTime(String),

    #[error("Timestamp must look like YYYY-MM-DD HH:MM:SS, got '{0}'")]
    InvalidTimestamp(String),

    #[error("Row {row}: {source}")]
    InvalidRow {
        row: usize,
        source: Box<RecordParseError>,
    },
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Mission catalog is empty")]
    Empty,

    #[error("Mission ids must be positive")]
    ZeroId,

    #[error("Duplicate mission id {0}")]
    DuplicateId(u32),

    #[error("Mission {0} has no time allotted")]
    ZeroDuration(u32),

    #[error("Failed to read mission catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse mission catalog: {0}")]
    Parse(#[from] serde_json::Error),
}
