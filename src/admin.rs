//! Administrative input and bulk transfer of ledger records.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::info;

use crate::error::{LedgerError, RecordParseError};
use crate::ledger::{Action, Record};
use crate::util::mission_code;

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Free-text fields of a record as typed by an administrator. Nothing reaches the
/// ledger until `parse` has turned it into a `Record`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDraft {
    pub training_code: String,
    pub team: String,
    pub mission: String,
    pub action: String,
    pub points: String,
    pub time_taken: String,
    pub timestamp: String,
    pub evidence_file_name: String,
}

impl RecordDraft {
    /// Start an edit from an existing record.
    pub fn from_record(record: &Record) -> Self {
        Self {
            training_code: record.training_code.clone(),
            team: record.team.clone(),
            mission: record.mission_id.to_string(),
            action: record.action.to_string(),
            points: record.points.to_string(),
            time_taken: record.time_taken_secs.to_string(),
            timestamp: record.timestamp.format(TIMESTAMP_FORMATS[0]).to_string(),
            evidence_file_name: record.evidence_file_name.clone(),
        }
    }

    /// Validate every field. Blank optional fields fall back to
    /// `default_training_code`, zero time, and `now`.
    pub fn parse(
        &self,
        default_training_code: &str,
        now: NaiveDateTime,
    ) -> Result<Record, RecordParseError> {
        let team = self.team.trim();
        if team.is_empty() {
            return Err(RecordParseError::MissingTeam);
        }
        let mission_id = parse_mission_id(&self.mission)?;

        let training_code = match self.training_code.trim() {
            "" => default_training_code.to_string(),
            code => code.to_string(),
        };

        Ok(Record {
            training_code,
            team: team.to_string(),
            mission_id,
            mission_name: mission_code(mission_id),
            action: self.action.trim().parse()?,
            points: parse_points(&self.points)?,
            time_taken_secs: parse_time_taken(&self.time_taken)?,
            timestamp: parse_timestamp(&self.timestamp, now)?,
            evidence_file_name: self.evidence_file_name.trim().to_string(),
        })
    }
}

/// Check a record that arrived already typed, e.g. from an import file, against
/// the rules `RecordDraft::parse` applies to typed-in fields.
pub fn validate_record(record: &Record) -> Result<(), RecordParseError> {
    if record.team.trim().is_empty() {
        return Err(RecordParseError::MissingTeam);
    }
    if record.mission_id == 0 {
        return Err(RecordParseError::InvalidMission(record.mission_id.to_string()));
    }
    if !record.points.is_finite() {
        return Err(RecordParseError::InvalidPoints(record.points.to_string()));
    }
    Ok(())
}

/// All-or-nothing: the first bad record rejects the batch, naming its row.
pub fn validate_records(records: &[Record]) -> Result<(), RecordParseError> {
    records.iter().enumerate().try_for_each(|(row, record)| {
        validate_record(record).map_err(|err| RecordParseError::InvalidRow {
            row,
            source: Box::new(err),
        })
    })
}

/// Accepts `3`, `03`, `M03`, `m3` and `Mission 3`.
pub fn parse_mission_id(input: &str) -> Result<u32, RecordParseError> {
    let invalid = || RecordParseError::InvalidMission(input.to_string());
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();
    let digits = lower
        .strip_prefix("mission")
        .or_else(|| lower.strip_prefix('m'))
        .unwrap_or(&lower)
        .trim();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    match digits.parse::<u32>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(invalid()),
    }
}

fn parse_points(input: &str) -> Result<f64, RecordParseError> {
    match input.trim().parse::<f64>() {
        Ok(points) if points.is_finite() => Ok(points),
        _ => Err(RecordParseError::InvalidPoints(input.to_string())),
    }
}

/// Seconds, either as a plain count or as `MM:SS`.
fn parse_time_taken(input: &str) -> Result<u64, RecordParseError> {
    let invalid = || RecordParseError::InvalidTime(input.to_string());
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    match trimmed.split_once(':') {
        Some((mins, secs)) => {
            let mins: u64 = mins.trim().parse().map_err(|_| invalid())?;
            let secs: u64 = secs.trim().parse().map_err(|_| invalid())?;
            if secs >= 60 {
                return Err(invalid());
            }
            Ok(mins * 60 + secs)
        }
        None => trimmed.parse().map_err(|_| invalid()),
    }
}

fn parse_timestamp(input: &str, now: NaiveDateTime) -> Result<NaiveDateTime, RecordParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(now);
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| RecordParseError::InvalidTimestamp(input.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TransferFormat {
    Csv,
    Json,
}

impl TransferFormat {
    /// `.csv` files are CSV, anything else JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => TransferFormat::Csv,
            _ => TransferFormat::Json,
        }
    }
}

pub fn write_records<W: Write>(
    records: &[Record],
    format: TransferFormat,
    writer: W,
) -> Result<(), LedgerError> {
    match format {
        TransferFormat::Csv => {
            let mut csv = csv::Writer::from_writer(writer);
            for record in records {
                csv.serialize(record)?;
            }
            csv.flush()?;
        }
        TransferFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, records)?;
            writer.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Deserialize and validate a batch. Nothing is returned unless every record passes.
pub fn read_records<R: Read>(format: TransferFormat, reader: R) -> Result<Vec<Record>, LedgerError> {
    let records: Vec<Record> = match format {
        TransferFormat::Csv => {
            let mut csv = csv::Reader::from_reader(reader);
            csv.deserialize().collect::<Result<_, _>>()?
        }
        TransferFormat::Json => serde_json::from_reader(reader)?,
    };
    validate_records(&records)?;
    Ok(records)
}

pub fn export_to_path(records: &[Record], path: &Path) -> Result<(), LedgerError> {
    let format = TransferFormat::from_path(path);
    let file = File::create(path)?;
    write_records(records, format, BufWriter::new(file))?;
    info!("Exported {} records as {format} to {}", records.len(), path.display());
    Ok(())
}

pub fn import_from_path(path: &Path) -> Result<Vec<Record>, LedgerError> {
    let format = TransferFormat::from_path(path);
    let file = File::open(path)?;
    let records = read_records(format, BufReader::new(file))?;
    info!("Read {} records as {format} from {}", records.len(), path.display());
    Ok(records)
}

/// Write records to stdout, as `admin export -` does.
pub fn export_to_stdout(records: &[Record], format: TransferFormat) -> Result<(), LedgerError> {
    let stdout = io::stdout();
    write_records(records, format, stdout.lock())
}
