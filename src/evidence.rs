use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::error::EvidenceError;
use crate::mission::Mission;
use crate::util::sanitize_for_file_name;

const DEFAULT_EXTENSION: &str = "xlsx";

/// What the evidence channel kept for a submission
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvidence {
    pub file_name: String,
    pub location: PathBuf,
}

/// Opaque upload of a team's evidence file. Only the outcome matters to the
/// caller; file contents are never inspected.
pub trait EvidenceSink {
    fn submit(
        &self,
        team: &str,
        mission: &Mission,
        time_taken_secs: u64,
        file: &Path,
        at: NaiveDateTime,
    ) -> Result<StoredEvidence, EvidenceError>;
}

/// `<Team>_M<id>_<secs>s_<YYYYMMDDHHMMSS>.<ext>`
pub fn evidence_file_name(
    team: &str,
    mission_id: u32,
    time_taken_secs: u64,
    at: NaiveDateTime,
    original: &Path,
) -> String {
    let extension = original
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_EXTENSION);
    format!(
        "{}_M{:02}_{}s_{}.{}",
        sanitize_for_file_name(team),
        mission_id,
        time_taken_secs,
        at.format("%Y%m%d%H%M%S"),
        extension
    )
}

/// Copies evidence into a local folder after a fixed simulated latency.
#[derive(Debug, Clone)]
pub struct LocalEvidenceSink {
    dir: PathBuf,
    latency: Duration,
}

impl LocalEvidenceSink {
    pub fn new<P: AsRef<Path>>(dir: P, latency: Duration) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            latency,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl EvidenceSink for LocalEvidenceSink {
    fn submit(
        &self,
        team: &str,
        mission: &Mission,
        time_taken_secs: u64,
        file: &Path,
        at: NaiveDateTime,
    ) -> Result<StoredEvidence, EvidenceError> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        if !file.is_file() {
            warn!("Evidence file {} does not exist", file.display());
            return Err(EvidenceError::MissingFile(file.to_path_buf()));
        }

        let file_name = evidence_file_name(team, mission.id, time_taken_secs, at, file);
        let location = self.dir.join(&file_name);

        fs::create_dir_all(&self.dir)
            .and_then(|_| fs::copy(file, &location))
            .map_err(|e| EvidenceError::Channel(e.to_string()))?;

        info!(
            "Stored evidence for {team} mission {} at {}",
            mission.id,
            location.display()
        );
        Ok(StoredEvidence {
            file_name,
            location,
        })
    }
}

/// Progress lines shown to the team while an upload is in flight.
pub fn verification_log(team: &str, mission: &Mission) -> Vec<String> {
    vec![
        format!("IDENTITY: Team [{team}] detected."),
        format!("PAYLOAD: Mission {} evidence dossier.", mission.id),
        "FORMATTING: Applying file naming rules...".to_string(),
        "UPLOADING: Establishing secure channel...".to_string(),
    ]
}

pub fn verification_outcome(result: &Result<StoredEvidence, EvidenceError>) -> Vec<String> {
    match result {
        Ok(stored) => vec![
            "UPLOAD COMPLETE.".to_string(),
            format!("LEDGER: Entry confirmed as {}.", stored.file_name),
            "STATUS: Mission Secured.".to_string(),
        ],
        Err(err) => vec![format!("ERROR: {err}. Retry submission.")],
    }
}
