use std::path::Path;

use chrono::{DateTime, Local, SubsecRound};
use tracing::{debug, info, warn};

use crate::error::{EvidenceError, LifecycleError};
use crate::evidence::{EvidenceSink, StoredEvidence};
use crate::ledger::{Action, Ledger, Record};
use crate::mission::{Mission, MissionCatalog};
use crate::session::{MissionOutcome, MissionStatus, Progress, SessionConfig};
use crate::store::LedgerStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Running,
    Overtime,
    Expired,
}

/// Snapshot of a mission clock at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    pub phase: Phase,
    pub elapsed_secs: u64,
    pub remaining_secs: u64,
}

/// Countdown for an active mission. Only the start instant is stored; phase and
/// remaining time are recomputed from the wall clock on every read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissionClock {
    started_at: DateTime<Local>,
    duration_secs: u64,
    grace_secs: u64,
}

impl MissionClock {
    pub fn start(now: DateTime<Local>, duration_secs: u64, grace_secs: u64) -> Self {
        Self {
            started_at: now,
            duration_secs,
            grace_secs,
        }
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Full time charged for a mission that runs out or is aborted.
    pub fn allotment_secs(&self) -> u64 {
        self.duration_secs.saturating_add(self.grace_secs)
    }

    pub fn elapsed_secs(&self, now: DateTime<Local>) -> u64 {
        (now - self.started_at).num_seconds().max(0) as u64
    }

    pub fn read(&self, now: DateTime<Local>) -> ClockReading {
        let elapsed = self.elapsed_secs(now);
        let (phase, remaining_secs) = if elapsed < self.duration_secs {
            (Phase::Running, self.duration_secs - elapsed)
        } else if elapsed < self.allotment_secs() {
            (Phase::Overtime, self.allotment_secs() - elapsed)
        } else {
            (Phase::Expired, 0)
        };
        ClockReading {
            phase,
            elapsed_secs: elapsed,
            remaining_secs,
        }
    }
}

/// Countdown shown on the briefing screen. Running out never starts the mission
/// by itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BriefingClock {
    opened_at: DateTime<Local>,
    duration_secs: u64,
}

impl BriefingClock {
    pub fn open(now: DateTime<Local>, duration_secs: u64) -> Self {
        Self {
            opened_at: now,
            duration_secs,
        }
    }

    pub fn remaining_secs(&self, now: DateTime<Local>) -> u64 {
        let elapsed = (now - self.opened_at).num_seconds().max(0) as u64;
        self.duration_secs.saturating_sub(elapsed)
    }

    pub fn is_expired(&self, now: DateTime<Local>) -> bool {
        self.remaining_secs(now) == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Idle,
    Briefing {
        index: usize,
        clock: BriefingClock,
    },
    Active {
        index: usize,
        clock: MissionClock,
        in_flight: bool,
    },
}

impl Slot {
    fn name(&self) -> &'static str {
        match self {
            Slot::Idle => "Idle",
            Slot::Briefing { .. } => "Briefing",
            Slot::Active { .. } => "Active",
        }
    }
}

/// Terminal outcome of one mission
#[derive(Debug, Clone, PartialEq)]
pub struct MissionResult {
    pub mission_id: u32,
    pub outcome: MissionOutcome,
    pub time_taken_secs: u64,
    pub session_finished: bool,
}

/// What the presentation layer should show after a tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Idle,
    Briefing { remaining_secs: u64, expired: bool },
    Active(ClockReading),
    Failed(MissionResult),
    Finished,
}

/// Handle for an evidence upload that has been started but not resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSubmission {
    mission_index: usize,
    mission: Mission,
    time_taken_secs: u64,
}

impl PendingSubmission {
    pub fn mission(&self) -> &Mission {
        &self.mission
    }

    pub fn time_taken_secs(&self) -> u64 {
        self.time_taken_secs
    }
}

/// Drives one team through the catalog, one mission at a time.
#[derive(Debug)]
pub struct MissionController {
    team: String,
    catalog: MissionCatalog,
    config: SessionConfig,
    progress: Progress,
    slot: Slot,
}

impl MissionController {
    pub fn new(team: impl Into<String>, catalog: MissionCatalog, config: SessionConfig) -> Self {
        let team = team.into();
        info!("Session started for team {team}");
        Self {
            team,
            catalog,
            config,
            progress: Progress::default(),
            slot: Slot::Idle,
        }
    }

    pub fn team(&self) -> &str {
        &self.team
    }

    pub fn catalog(&self) -> &MissionCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn current_mission(&self) -> Option<&Mission> {
        self.catalog.get(self.progress.current_mission_index())
    }

    pub fn is_finished(&self) -> bool {
        self.progress.current_mission_index() >= self.catalog.len()
    }

    pub fn is_briefing(&self) -> bool {
        matches!(self.slot, Slot::Briefing { .. })
    }

    pub fn is_active(&self) -> bool {
        matches!(self.slot, Slot::Active { .. })
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.slot, Slot::Active { in_flight: true, .. })
    }

    pub fn mission_status(&self, index: usize) -> Option<MissionStatus> {
        self.catalog
            .get(index)
            .map(|m| self.progress.status(index, m.id))
    }

    /// Clock reading for the active mission, if any.
    pub fn reading(&self, now: DateTime<Local>) -> Option<ClockReading> {
        match &self.slot {
            Slot::Active { clock, .. } => Some(clock.read(now)),
            _ => None,
        }
    }

    /// Open the briefing for the current mission, restarting its countdown.
    pub fn start_briefing(&mut self, index: usize, now: DateTime<Local>) -> Result<(), LifecycleError> {
        if self.is_finished() {
            return Err(LifecycleError::SessionExhausted);
        }
        if let Some(mission) = self.catalog.get(index) {
            if self.progress.is_terminal(mission.id) {
                return Err(LifecycleError::AlreadyTerminal(mission.id));
            }
        }
        let current = self.progress.current_mission_index();
        if index != current {
            return Err(LifecycleError::NotCurrentMission {
                requested: index,
                current,
            });
        }
        if let Slot::Active { .. } = self.slot {
            return Err(self.invalid("Idle"));
        }

        self.slot = Slot::Briefing {
            index,
            clock: BriefingClock::open(now, self.config.briefing_secs),
        };
        debug!("Briefing opened for mission index {index}");
        Ok(())
    }

    /// Back out of the briefing without starting the mission.
    pub fn leave_briefing(&mut self) -> Result<(), LifecycleError> {
        match self.slot {
            Slot::Briefing { .. } => {
                self.slot = Slot::Idle;
                Ok(())
            }
            Slot::Idle => Ok(()),
            Slot::Active { .. } => Err(self.invalid("Briefing")),
        }
    }

    /// Start the countdown. Repeating the call on an active mission is a no-op.
    pub fn start_mission(&mut self, now: DateTime<Local>) -> Result<(), LifecycleError> {
        match self.slot {
            Slot::Active { .. } => Ok(()),
            Slot::Briefing { index, .. } => {
                let Some(mission) = self.catalog.get(index) else {
                    return Err(LifecycleError::SessionExhausted);
                };
                info!("Team {} started mission {}", self.team, mission.id);
                self.slot = Slot::Active {
                    index,
                    clock: MissionClock::start(
                        now,
                        mission.duration_secs,
                        self.config.overtime_grace_secs,
                    ),
                    in_flight: false,
                };
                Ok(())
            }
            Slot::Idle if self.is_finished() => Err(LifecycleError::SessionExhausted),
            Slot::Idle => Err(self.invalid("Briefing")),
        }
    }

    /// Recompute the countdown from the wall clock. Fails the mission once the
    /// grace period is used up, unless an upload is still in flight.
    pub fn tick(&mut self, now: DateTime<Local>) -> TickOutcome {
        match self.slot {
            Slot::Idle if self.is_finished() => TickOutcome::Finished,
            Slot::Idle => TickOutcome::Idle,
            Slot::Briefing { clock, .. } => TickOutcome::Briefing {
                remaining_secs: clock.remaining_secs(now),
                expired: clock.is_expired(now),
            },
            Slot::Active {
                index,
                clock,
                in_flight,
            } => {
                let reading = clock.read(now);
                if reading.phase == Phase::Expired && !in_flight {
                    warn!("Mission index {index} ran out of time for team {}", self.team);
                    TickOutcome::Failed(self.fail(index, clock))
                } else {
                    TickOutcome::Active(reading)
                }
            }
        }
    }

    /// Give up on the active mission. The full allotment is charged.
    pub fn abort(&mut self) -> Result<MissionResult, LifecycleError> {
        match self.slot {
            Slot::Active {
                in_flight: true, ..
            } => Err(LifecycleError::SubmissionInFlight),
            Slot::Active { index, clock, .. } => {
                info!("Team {} aborted mission index {index}", self.team);
                Ok(self.fail(index, clock))
            }
            Slot::Idle if self.is_finished() => Err(LifecycleError::SessionExhausted),
            _ => Err(self.invalid("Active")),
        }
    }

    /// Mark an upload as in flight. At most one is allowed per mission.
    pub fn begin_submission(
        &mut self,
        now: DateTime<Local>,
    ) -> Result<PendingSubmission, LifecycleError> {
        if self.is_finished() {
            return Err(LifecycleError::SessionExhausted);
        }
        let Slot::Active {
            index,
            clock,
            ref mut in_flight,
        } = self.slot
        else {
            return Err(self.invalid("Active"));
        };
        if *in_flight {
            return Err(LifecycleError::SubmissionInFlight);
        }
        let Some(mission) = self.catalog.get(index) else {
            return Err(LifecycleError::SessionExhausted);
        };

        let reading = clock.read(now);
        if reading.phase == Phase::Expired {
            return Err(LifecycleError::TimeExpired(mission.id));
        }

        *in_flight = true;
        debug!(
            "Submission started for mission {} after {}s",
            mission.id, reading.elapsed_secs
        );
        Ok(PendingSubmission {
            mission_index: index,
            mission: mission.clone(),
            time_taken_secs: reading.elapsed_secs,
        })
    }

    /// Resolve an upload started with `begin_submission`. On success the
    /// submission is written to the ledger and the mission is completed; on any
    /// failure the mission stays active and the team may submit again.
    pub fn finish_submission<S: LedgerStore>(
        &mut self,
        pending: PendingSubmission,
        upload: Result<StoredEvidence, EvidenceError>,
        ledger: &mut Ledger<S>,
        now: DateTime<Local>,
    ) -> Result<MissionResult, LifecycleError> {
        let matches_slot = matches!(
            self.slot,
            Slot::Active { index, in_flight: true, .. } if index == pending.mission_index
        );
        if !matches_slot {
            return Err(LifecycleError::StaleSubmission(pending.mission.id));
        }

        let stored = match upload {
            Ok(stored) => stored,
            Err(err) => {
                warn!("Upload for mission {} failed: {err}", pending.mission.id);
                self.clear_in_flight();
                return Err(err.into());
            }
        };

        let record = Record {
            training_code: self.config.training_code.clone(),
            team: self.team.clone(),
            mission_id: pending.mission.id,
            mission_name: pending.mission.ledger_name(),
            action: Action::Submission,
            points: self.config.points_per_submission,
            time_taken_secs: pending.time_taken_secs,
            timestamp: now.naive_local().trunc_subsecs(0),
            evidence_file_name: stored.file_name,
        };
        if let Err(err) = ledger.append(record) {
            self.clear_in_flight();
            return Err(err.into());
        }

        info!(
            "Team {} completed mission {} in {}s",
            self.team, pending.mission.id, pending.time_taken_secs
        );
        Ok(self.seal(
            pending.mission.id,
            MissionOutcome::Completed,
            pending.time_taken_secs,
        ))
    }

    /// Upload and record evidence in one call.
    pub fn submit_evidence<E: EvidenceSink, S: LedgerStore>(
        &mut self,
        file: &Path,
        sink: &E,
        ledger: &mut Ledger<S>,
        now: DateTime<Local>,
    ) -> Result<MissionResult, LifecycleError> {
        let pending = self.begin_submission(now)?;
        let upload = sink.submit(
            &self.team,
            pending.mission(),
            pending.time_taken_secs(),
            file,
            now.naive_local().trunc_subsecs(0),
        );
        self.finish_submission(pending, upload, ledger, now)
    }

    fn fail(&mut self, index: usize, clock: MissionClock) -> MissionResult {
        let mission_id = self.catalog.get(index).map(|m| m.id).unwrap_or_default();
        self.seal(mission_id, MissionOutcome::Failed, clock.allotment_secs())
    }

    fn seal(&mut self, mission_id: u32, outcome: MissionOutcome, secs: u64) -> MissionResult {
        self.progress.record_outcome(mission_id, outcome, secs);
        self.slot = Slot::Idle;
        let session_finished = self.is_finished();
        if session_finished {
            info!("Team {} has finished every mission", self.team);
        }
        MissionResult {
            mission_id,
            outcome,
            time_taken_secs: self.progress.elapsed_secs(mission_id).unwrap_or(secs),
            session_finished,
        }
    }

    fn clear_in_flight(&mut self) {
        if let Slot::Active { in_flight, .. } = &mut self.slot {
            *in_flight = false;
        }
    }

    fn invalid(&self, expected: &'static str) -> LifecycleError {
        LifecycleError::InvalidState {
            expected,
            actual: self.slot.name(),
        }
    }
}
