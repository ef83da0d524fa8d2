use std::cmp::Ordering;
use std::str::FromStr;

use chrono::NaiveDateTime;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{LedgerError, RecordParseError};
use crate::store::LedgerStore;
use crate::util::{format_mmss, normalize_team};

/// Kind of scoring event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
pub enum Action {
    Submission,
    Bonus,
    ManualAdjustment,
}

impl Action {
    /// Only evidence submissions count as finishing a mission.
    pub fn counts_as_completion(self) -> bool {
        match self {
            Action::Submission => true,
            Action::Bonus | Action::ManualAdjustment => false,
        }
    }
}

impl FromStr for Action {
    type Err = RecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "submission" | "submit" => Ok(Action::Submission),
            "bonus" => Ok(Action::Bonus),
            "manualadjustment" | "manual" | "adjustment" => Ok(Action::ManualAdjustment),
            _ => Err(RecordParseError::InvalidAction(s.to_string())),
        }
    }
}

/// One scoring event on the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub training_code: String,
    pub team: String,
    pub mission_id: u32,
    pub mission_name: String,
    pub action: Action,
    pub points: f64,
    pub time_taken_secs: u64,
    pub timestamp: NaiveDateTime,
    pub evidence_file_name: String,
}

/// Derived standing of one team
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub team: String,
    pub missions_completed: usize,
    pub total_points: f64,
    pub total_time_secs: u64,
}

impl LeaderboardEntry {
    pub fn total_time_display(&self) -> String {
        format_mmss(self.total_time_secs as i64)
    }
}

#[derive(Default)]
struct TeamTally {
    missions: Vec<u32>,
    points: f64,
    time_secs: u64,
}

/// Rank teams from a set of records.
///
/// Points are summed over every action; completions and time only over
/// submissions, with each mission counted once per team. Sorted by points
/// descending, then team name ascending. When `training_code` is given, records
/// from other cohorts are ignored.
pub fn leaderboard(records: &[Record], training_code: Option<&str>) -> Vec<LeaderboardEntry> {
    let by_team = records
        .iter()
        .filter(|r| training_code.map_or(true, |code| r.training_code == code))
        .into_group_map_by(|r| normalize_team(&r.team));

    by_team
        .into_iter()
        .map(|(team, rows)| {
            let tally = rows.into_iter().fold(TeamTally::default(), |mut t, r| {
                if r.action.counts_as_completion() {
                    t.missions.push(r.mission_id);
                    t.time_secs += r.time_taken_secs;
                }
                t.points += r.points;
                t
            });
            LeaderboardEntry {
                team,
                missions_completed: tally.missions.into_iter().unique().count(),
                total_points: tally.points,
                total_time_secs: tally.time_secs,
            }
        })
        .sorted_by(rank_order)
        .collect()
}

fn rank_order(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.total_points
        .total_cmp(&a.total_points)
        .then_with(|| a.team.cmp(&b.team))
}

/// The score ledger: an in-memory view of the records that the store has
/// accepted. Every mutation reads the stored set, builds the next set and writes
/// it whole; the view only changes once that write succeeds.
#[derive(Debug)]
pub struct Ledger<S: LedgerStore> {
    store: S,
    records: Vec<Record>,
    training_code: Option<String>,
}

impl<S: LedgerStore> Ledger<S> {
    pub fn open(store: S) -> Result<Self, LedgerError> {
        let records = store.load()?;
        info!("Ledger opened with {} records", records.len());
        Ok(Self {
            store,
            records,
            training_code: None,
        })
    }

    /// Restrict the leaderboard to one cohort.
    pub fn with_training_code(mut self, code: impl Into<String>) -> Self {
        self.training_code = Some(code.into());
        self
    }

    pub fn training_code(&self) -> Option<&str> {
        self.training_code.as_deref()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Re-read the store, picking up writes made elsewhere.
    pub fn reload(&mut self) -> Result<(), LedgerError> {
        self.records = self.store.load()?;
        Ok(())
    }

    pub fn append(&mut self, record: Record) -> Result<(), LedgerError> {
        debug!(
            "Appending {} for {} on mission {}",
            record.action, record.team, record.mission_id
        );
        self.commit(|records| {
            records.push(record);
            Ok(())
        })
    }

    pub fn edit(&mut self, index: usize, record: Record) -> Result<(), LedgerError> {
        self.commit(|records| {
            let slot = records
                .get_mut(index)
                .ok_or(LedgerError::NoSuchRecord(index))?;
            *slot = record;
            Ok(())
        })
    }

    pub fn delete(&mut self, index: usize) -> Result<Record, LedgerError> {
        let mut removed = None;
        self.commit(|records| {
            if index >= records.len() {
                return Err(LedgerError::NoSuchRecord(index));
            }
            removed = Some(records.remove(index));
            Ok(())
        })?;
        removed.ok_or(LedgerError::NoSuchRecord(index))
    }

    /// Administrative overwrite of the whole set.
    pub fn replace_all(&mut self, records: Vec<Record>) -> Result<(), LedgerError> {
        info!("Replacing ledger with {} records", records.len());
        self.store.save(&records)?;
        self.records = records;
        Ok(())
    }

    /// Discard everything and restore the baseline snapshot.
    pub fn reset(&mut self) -> Result<(), LedgerError> {
        let records = self.store.reset_to_baseline()?;
        info!("Ledger reset to baseline ({} records)", records.len());
        self.records = records;
        Ok(())
    }

    pub fn compute_leaderboard(&self) -> Vec<LeaderboardEntry> {
        leaderboard(&self.records, self.training_code.as_deref())
    }

    fn commit<F>(&mut self, change: F) -> Result<(), LedgerError>
    where
        F: FnOnce(&mut Vec<Record>) -> Result<(), LedgerError>,
    {
        let mut next = self.store.load()?;
        change(&mut next)?;
        if let Err(err) = self.store.save(&next) {
            warn!("Ledger write failed, keeping previous view: {err}");
            return Err(err);
        }
        self.records = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLedgerStore;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 31)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn record(team: &str, mission_id: u32, action: Action, points: f64, secs: u64) -> Record {
        Record {
            training_code: "T1".to_string(),
            team: team.to_string(),
            mission_id,
            mission_name: format!("M{mission_id:02}"),
            action,
            points,
            time_taken_secs: secs,
            timestamp: at(9, 0),
            evidence_file_name: String::new(),
        }
    }

    #[test]
    fn bonus_adds_points_but_not_completions() {
        let records = vec![
            record("A", 1, Action::Submission, 1.0, 40),
            record("A", 1, Action::Bonus, 2.0, 0),
        ];
        let board = leaderboard(&records, None);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].team, "A");
        assert_eq!(board[0].missions_completed, 1);
        assert_eq!(board[0].total_points, 3.0);
        assert_eq!(board[0].total_time_secs, 40);
    }

    #[test]
    fn repeated_submission_counts_once() {
        let records = vec![
            record("A", 2, Action::Submission, 1.0, 100),
            record("A", 2, Action::Submission, 1.0, 50),
        ];
        let board = leaderboard(&records, None);
        assert_eq!(board[0].missions_completed, 1);
        assert_eq!(board[0].total_points, 2.0);
        assert_eq!(board[0].total_time_secs, 150);
    }

    #[test]
    fn ties_break_on_team_name() {
        let records = vec![
            record("Zulu", 1, Action::Submission, 1.0, 10),
            record("Alpha", 1, Action::Submission, 1.0, 99),
            record("Mike", 1, Action::ManualAdjustment, 5.0, 0),
        ];
        let teams: Vec<String> = leaderboard(&records, None)
            .into_iter()
            .map(|e| e.team)
            .collect();
        assert_eq!(teams, vec!["Mike", "Alpha", "Zulu"]);
    }

    #[test]
    fn team_names_are_trimmed_and_case_sensitive() {
        let records = vec![
            record(" Alpha ", 1, Action::Submission, 1.0, 10),
            record("Alpha", 2, Action::Submission, 1.0, 10),
            record("alpha", 1, Action::Submission, 1.0, 10),
            record("   ", 1, Action::Bonus, 1.0, 0),
        ];
        let board = leaderboard(&records, None);
        let teams: Vec<&str> = board.iter().map(|e| e.team.as_str()).collect();
        assert_eq!(teams, vec!["Alpha", "Unknown", "alpha"]);
        assert_eq!(board[0].missions_completed, 2);
    }

    #[test]
    fn negative_adjustments_lower_the_score() {
        let records = vec![
            record("A", 1, Action::Submission, 1.0, 10),
            record("A", 1, Action::ManualAdjustment, -1.5, 0),
        ];
        let board = leaderboard(&records, None);
        assert_eq!(board[0].total_points, -0.5);
        assert_eq!(board[0].missions_completed, 1);
    }

    #[test]
    fn other_cohorts_are_ignored() {
        let mut other = record("B", 1, Action::Submission, 1.0, 10);
        other.training_code = "T2".to_string();
        let records = vec![record("A", 1, Action::Submission, 1.0, 10), other];

        assert_eq!(leaderboard(&records, Some("T1")).len(), 1);
        assert_eq!(leaderboard(&records, None).len(), 2);
    }

    #[test]
    fn leaderboard_is_idempotent() {
        let ledger = Ledger::open(MemoryLedgerStore::new(vec![
            record("A", 1, Action::Submission, 1.0, 10),
            record("B", 1, Action::Bonus, 0.5, 0),
        ]))
        .unwrap();
        assert_eq!(ledger.compute_leaderboard(), ledger.compute_leaderboard());
    }

    #[test]
    fn replace_all_empty_clears_leaderboard() {
        let mut ledger =
            Ledger::open(MemoryLedgerStore::new(vec![record("A", 1, Action::Submission, 1.0, 10)]))
                .unwrap();
        ledger.replace_all(vec![]).unwrap();
        assert!(ledger.compute_leaderboard().is_empty());
    }

    #[test]
    fn failed_write_keeps_previous_view() {
        let mut ledger =
            Ledger::open(MemoryLedgerStore::new(vec![record("A", 1, Action::Submission, 1.0, 10)]))
                .unwrap();
        ledger.store_mut().fail_writes(true);

        let result = ledger.append(record("B", 1, Action::Submission, 1.0, 10));
        assert_matches!(result, Err(LedgerError::WriteRejected(_)));
        assert_eq!(ledger.records().len(), 1);
        assert_eq!(ledger.compute_leaderboard().len(), 1);

        ledger.store_mut().fail_writes(false);
        ledger
            .append(record("B", 1, Action::Submission, 1.0, 10))
            .unwrap();
        assert_eq!(ledger.records().len(), 2);
    }

    #[test]
    fn append_reads_current_store_contents() {
        let mut ledger = Ledger::open(MemoryLedgerStore::new(vec![])).unwrap();
        // another writer lands a record behind the ledger's back
        ledger
            .store_mut()
            .save(&[record("X", 1, Action::Bonus, 1.0, 0)])
            .unwrap();

        ledger
            .append(record("Y", 1, Action::Submission, 1.0, 10))
            .unwrap();
        let teams: Vec<&str> = ledger.records().iter().map(|r| r.team.as_str()).collect();
        assert_eq!(teams, vec!["X", "Y"]);
    }

    #[test]
    fn edit_and_delete_by_position() {
        let mut ledger = Ledger::open(MemoryLedgerStore::new(vec![
            record("A", 1, Action::Submission, 1.0, 10),
            record("B", 1, Action::Submission, 1.0, 10),
        ]))
        .unwrap();

        ledger
            .edit(1, record("B", 1, Action::Submission, 0.5, 10))
            .unwrap();
        assert_eq!(ledger.records()[1].points, 0.5);

        let removed = ledger.delete(0).unwrap();
        assert_eq!(removed.team, "A");
        assert_eq!(ledger.records().len(), 1);

        assert_matches!(ledger.delete(5), Err(LedgerError::NoSuchRecord(5)));
        assert_matches!(
            ledger.edit(3, record("C", 1, Action::Bonus, 1.0, 0)),
            Err(LedgerError::NoSuchRecord(3))
        );
    }

    #[test]
    fn reset_restores_baseline() {
        let mut ledger = Ledger::open(MemoryLedgerStore::new(vec![])).unwrap();
        ledger.reset().unwrap();
        assert!(!ledger.records().is_empty());
        assert!(ledger.records().iter().any(|r| r.team == "Team Alpha"));
    }

    #[test]
    fn action_parsing() {
        assert_eq!("Submission".parse::<Action>().unwrap(), Action::Submission);
        assert_eq!("bonus".parse::<Action>().unwrap(), Action::Bonus);
        assert_eq!(
            "Manual Adjustment".parse::<Action>().unwrap(),
            Action::ManualAdjustment
        );
        assert_eq!(
            "manual-adjustment".parse::<Action>().unwrap(),
            Action::ManualAdjustment
        );
        assert_matches!(
            "Correct Answer".parse::<Action>(),
            Err(RecordParseError::InvalidAction(_))
        );
        for action in [Action::Submission, Action::Bonus, Action::ManualAdjustment] {
            assert_eq!(action.to_string().parse::<Action>().unwrap(), action);
        }
        assert_eq!(Action::ManualAdjustment.to_string(), "ManualAdjustment");
    }

    #[test]
    fn total_time_display() {
        let entry = LeaderboardEntry {
            team: "A".into(),
            missions_completed: 2,
            total_points: 2.0,
            total_time_secs: 165,
        };
        assert_eq!(entry.total_time_display(), "02:45");
    }
}
