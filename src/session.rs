use std::collections::{BTreeMap, BTreeSet};

use crate::config::Config;

/// Static rules applied to every mission of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub overtime_grace_secs: u64,
    pub briefing_secs: u64,
    pub points_per_submission: f64,
    pub training_code: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            overtime_grace_secs: cfg.overtime_grace_secs,
            briefing_secs: cfg.briefing_secs,
            points_per_submission: cfg.points_per_submission,
            training_code: cfg.training_code.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum MissionOutcome {
    Completed,
    Failed,
}

/// How a mission card is shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum MissionStatus {
    Locked,
    Available,
    Completed,
    Failed,
}

/// Per-team progression through the catalog.
///
/// Every mission before `current_mission_index` has exactly one outcome and the
/// cursor only moves forward. Fields are private so the only way to change them is
/// `record_outcome`, which the lifecycle controller calls once per mission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Progress {
    current_mission_index: usize,
    completed: BTreeSet<u32>,
    failed: BTreeSet<u32>,
    elapsed_secs: BTreeMap<u32, u64>,
}

impl Progress {
    pub fn current_mission_index(&self) -> usize {
        self.current_mission_index
    }

    pub fn completed_ids(&self) -> &BTreeSet<u32> {
        &self.completed
    }

    pub fn failed_ids(&self) -> &BTreeSet<u32> {
        &self.failed
    }

    pub fn elapsed_secs(&self, mission_id: u32) -> Option<u64> {
        self.elapsed_secs.get(&mission_id).copied()
    }

    pub fn outcome(&self, mission_id: u32) -> Option<MissionOutcome> {
        if self.completed.contains(&mission_id) {
            Some(MissionOutcome::Completed)
        } else if self.failed.contains(&mission_id) {
            Some(MissionOutcome::Failed)
        } else {
            None
        }
    }

    pub fn is_terminal(&self, mission_id: u32) -> bool {
        self.outcome(mission_id).is_some()
    }

    pub fn status(&self, index: usize, mission_id: u32) -> MissionStatus {
        match self.outcome(mission_id) {
            Some(MissionOutcome::Completed) => MissionStatus::Completed,
            Some(MissionOutcome::Failed) => MissionStatus::Failed,
            None if index == self.current_mission_index => MissionStatus::Available,
            None => MissionStatus::Locked,
        }
    }

    /// Seal a mission and move the cursor. Returns false, changing nothing, if the
    /// mission already has an outcome.
    pub(crate) fn record_outcome(
        &mut self,
        mission_id: u32,
        outcome: MissionOutcome,
        elapsed_secs: u64,
    ) -> bool {
        if self.is_terminal(mission_id) {
            return false;
        }
        match outcome {
            MissionOutcome::Completed => self.completed.insert(mission_id),
            MissionOutcome::Failed => self.failed.insert(mission_id),
        };
        self.elapsed_secs.insert(mission_id, elapsed_secs);
        self.current_mission_index += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_from_default_config() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.overtime_grace_secs, 120);
        assert_eq!(cfg.briefing_secs, 300);
        assert_eq!(cfg.points_per_submission, 1.0);
    }

    #[test]
    fn record_outcome_advances_cursor() {
        let mut progress = Progress::default();
        assert!(progress.record_outcome(1, MissionOutcome::Completed, 45));
        assert!(progress.record_outcome(2, MissionOutcome::Failed, 1920));

        assert_eq!(progress.current_mission_index(), 2);
        assert_eq!(progress.outcome(1), Some(MissionOutcome::Completed));
        assert_eq!(progress.outcome(2), Some(MissionOutcome::Failed));
        assert_eq!(progress.elapsed_secs(2), Some(1920));
        assert_eq!(
            progress.completed_ids().len() + progress.failed_ids().len(),
            progress.current_mission_index()
        );
    }

    #[test]
    fn terminal_missions_are_sealed() {
        let mut progress = Progress::default();
        progress.record_outcome(1, MissionOutcome::Failed, 1920);

        assert!(!progress.record_outcome(1, MissionOutcome::Completed, 10));
        assert_eq!(progress.outcome(1), Some(MissionOutcome::Failed));
        assert_eq!(progress.elapsed_secs(1), Some(1920));
        assert_eq!(progress.current_mission_index(), 1);
    }

    #[test]
    fn status_per_position() {
        let mut progress = Progress::default();
        progress.record_outcome(1, MissionOutcome::Completed, 30);

        assert_eq!(progress.status(0, 1), MissionStatus::Completed);
        assert_eq!(progress.status(1, 2), MissionStatus::Available);
        assert_eq!(progress.status(2, 3), MissionStatus::Locked);
    }
}
