use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::ledger::{Action, Record};
use crate::mission::embedded_json;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Durable home of the ledger's record set.
///
/// `save` replaces the whole set in one step: after it returns the store holds
/// either the previous set or the new one.
pub trait LedgerStore {
    fn load(&self) -> Result<Vec<Record>, LedgerError>;
    fn save(&mut self, records: &[Record]) -> Result<(), LedgerError>;
    fn reset_to_baseline(&mut self) -> Result<Vec<Record>, LedgerError> {
        let records = baseline();
        self.save(&records)?;
        Ok(records)
    }
}

/// The snapshot a fresh or reset ledger starts from.
pub fn baseline() -> Vec<Record> {
    embedded_json("baseline.json")
        .and_then(|raw| match serde_json::from_str(raw) {
            Ok(records) => Some(records),
            Err(err) => {
                warn!("Bundled baseline is unreadable: {err}");
                None
            }
        })
        .unwrap_or_default()
}

/// In-memory store, used by tests and as a scratch ledger.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    records: Vec<Record>,
    fail_writes: bool,
}

impl MemoryLedgerStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            fail_writes: false,
        }
    }

    /// Make every following write fail, as a full disk would.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> Result<Vec<Record>, LedgerError> {
        Ok(self.records.clone())
    }

    fn save(&mut self, records: &[Record]) -> Result<(), LedgerError> {
        if self.fail_writes {
            return Err(LedgerError::WriteRejected("storage quota exceeded".into()));
        }
        self.records = records.to_vec();
        Ok(())
    }
}

/// Ledger persisted in a SQLite database
#[derive(Debug)]
pub struct SqliteLedgerStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteLedgerStore {
    /// Open (creating if needed) the database at `path`. A database that has never
    /// held a ledger is seeded with the baseline snapshot.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let mut store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.init()?;
        info!("Ledger database at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let mut store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init(&mut self) -> Result<(), LedgerError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_records (
                position INTEGER PRIMARY KEY,
                training_code TEXT NOT NULL,
                team TEXT NOT NULL,
                mission_id INTEGER NOT NULL,
                mission_name TEXT NOT NULL,
                action TEXT NOT NULL,
                points REAL NOT NULL,
                time_taken_secs INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                evidence_file_name TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_ledger_records_team ON ledger_records(team);
            CREATE TABLE IF NOT EXISTS ledger_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        let seeded: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM ledger_meta WHERE key = 'seeded'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        if seeded.is_none() {
            debug!("Seeding empty ledger with baseline");
            self.save(&baseline())?;
        }
        Ok(())
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn load(&self) -> Result<Vec<Record>, LedgerError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT training_code, team, mission_id, mission_name, action, points,
                   time_taken_secs, timestamp, evidence_file_name
            FROM ledger_records
            ORDER BY position
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let action_str: String = row.get(4)?;
            let action = action_str.parse::<Action>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
            })?;
            let timestamp_str: String = row.get(7)?;
            let timestamp = NaiveDateTime::parse_from_str(&timestamp_str, TIMESTAMP_FORMAT)
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        7,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;

            Ok(Record {
                training_code: row.get(0)?,
                team: row.get(1)?,
                mission_id: row.get(2)?,
                mission_name: row.get(3)?,
                action,
                points: row.get(5)?,
                time_taken_secs: row.get(6)?,
                timestamp,
                evidence_file_name: row.get(8)?,
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    fn save(&mut self, records: &[Record]) -> Result<(), LedgerError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM ledger_records", [])?;
        {
            let mut insert = tx.prepare(
                r#"
                INSERT INTO ledger_records
                (position, training_code, team, mission_id, mission_name, action, points,
                 time_taken_secs, timestamp, evidence_file_name)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )?;
            for (position, r) in records.iter().enumerate() {
                insert.execute(params![
                    position as i64,
                    r.training_code,
                    r.team,
                    r.mission_id,
                    r.mission_name,
                    r.action.to_string(),
                    r.points,
                    r.time_taken_secs as i64,
                    r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    r.evidence_file_name,
                ])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO ledger_meta (key, value) VALUES ('seeded', '1')",
            [],
        )?;
        tx.commit()?;
        debug!("Saved {} ledger records", records.len());
        Ok(())
    }
}
