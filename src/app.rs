use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, SubsecRound};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{info, warn};
use webbrowser::Browser;

use escaperoom::{
    config::Config,
    error::{EvidenceError, LifecycleError},
    evidence::{verification_log, verification_outcome, EvidenceSink, LocalEvidenceSink, StoredEvidence},
    ledger::{Ledger, LeaderboardEntry},
    lifecycle::{ClockReading, MissionController, MissionResult, PendingSubmission, TickOutcome},
    mission::{Mission, MissionCatalog},
    runtime::{AppEvent, Interval},
    session::{MissionOutcome, SessionConfig},
    store::SqliteLedgerStore,
    util::normalize_team,
};

const TIMER_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Login,
    Dashboard,
    Briefing,
    Active,
    Completed,
    Leaderboard,
}

impl View {
    /// Views that show standings recompute them on entry.
    fn shows_standings(self) -> bool {
        matches!(
            self,
            View::Login | View::Dashboard | View::Completed | View::Leaderboard
        )
    }
}

/// What the event loop should do after a key press
#[derive(Debug)]
pub enum Control {
    Continue,
    Quit,
    Upload(UploadJob),
}

/// Everything a worker thread needs to push one evidence file through the sink.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pending: PendingSubmission,
    team: String,
    file: PathBuf,
    at: NaiveDateTime,
}

impl UploadJob {
    pub fn run<E: EvidenceSink>(self, sink: &E) -> AppEvent {
        let result = sink.submit(
            &self.team,
            self.pending.mission(),
            self.pending.time_taken_secs(),
            &self.file,
            self.at,
        );
        AppEvent::Upload {
            pending: self.pending,
            result,
        }
    }
}

#[derive(Debug)]
pub struct App {
    pub config: Config,
    catalog: MissionCatalog,
    ledger: Ledger<SqliteLedgerStore>,
    sink: LocalEvidenceSink,
    controller: Option<MissionController>,
    pub view: View,
    pub team_input: String,
    pub evidence_input: String,
    pub standings: Vec<LeaderboardEntry>,
    pub verification: Vec<String>,
    pub last_result: Option<MissionResult>,
    pub reading: Option<ClockReading>,
    pub briefing_remaining: Option<u64>,
    pub briefing_expired: bool,
    pub status: Option<String>,
    mission_timer: Interval,
    briefing_timer: Interval,
}

impl App {
    pub fn new(
        config: Config,
        catalog: MissionCatalog,
        ledger: Ledger<SqliteLedgerStore>,
        sink: LocalEvidenceSink,
    ) -> Self {
        let mut app = Self {
            config,
            catalog,
            ledger,
            sink,
            controller: None,
            view: View::Login,
            team_input: String::new(),
            evidence_input: String::new(),
            standings: Vec::new(),
            verification: Vec::new(),
            last_result: None,
            reading: None,
            briefing_remaining: None,
            briefing_expired: false,
            status: None,
            mission_timer: Interval::new(TIMER_PERIOD),
            briefing_timer: Interval::new(TIMER_PERIOD),
        };
        app.refresh_standings();
        app
    }

    pub fn sink(&self) -> &LocalEvidenceSink {
        &self.sink
    }

    pub fn controller(&self) -> Option<&MissionController> {
        self.controller.as_ref()
    }

    pub fn ledger(&self) -> &Ledger<SqliteLedgerStore> {
        &self.ledger
    }

    pub fn current_mission(&self) -> Option<&Mission> {
        self.controller.as_ref().and_then(|c| c.current_mission())
    }

    pub fn timers_running(&self) -> bool {
        self.mission_timer.is_running() || self.briefing_timer.is_running()
    }

    pub fn set_view(&mut self, view: View) {
        if view.shows_standings() {
            self.refresh_standings();
        }
        self.view = view;
    }

    /// Reload the store so writes from other processes show up, then re-rank.
    pub fn refresh_standings(&mut self) {
        if let Err(err) = self.ledger.reload() {
            warn!("Could not reload ledger: {err}");
        }
        self.standings = self.ledger.compute_leaderboard();
    }

    pub fn login(&mut self) {
        let team = self.team_input.trim();
        if team.is_empty() {
            self.status = Some("Enter a team name to begin.".to_string());
            return;
        }
        let team = normalize_team(team);
        info!("Team {team} logged in");
        self.controller = Some(MissionController::new(
            team,
            self.catalog.clone(),
            SessionConfig::from(&self.config),
        ));
        self.status = None;
        self.last_result = None;
        self.set_view(View::Dashboard);
    }

    /// Drop the session and return to the login screen.
    pub fn logout(&mut self) {
        self.stop_timers();
        self.controller = None;
        self.team_input.clear();
        self.evidence_input.clear();
        self.verification.clear();
        self.reading = None;
        self.status = None;
        self.set_view(View::Login);
    }

    pub fn open_briefing(&mut self, now: DateTime<Local>) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        let index = controller.progress().current_mission_index();
        match controller.start_briefing(index, now) {
            Ok(()) => {
                self.briefing_remaining = Some(controller.config().briefing_secs);
                self.briefing_expired = false;
                self.briefing_timer.start(now);
                self.status = None;
                self.set_view(View::Briefing);
            }
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    pub fn leave_briefing(&mut self) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        if controller.leave_briefing().is_ok() {
            self.briefing_timer.cancel();
            self.briefing_remaining = None;
            self.briefing_expired = false;
            self.set_view(View::Dashboard);
        }
    }

    pub fn start_mission(&mut self, now: DateTime<Local>) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        match controller.start_mission(now) {
            Ok(()) => {
                self.briefing_timer.cancel();
                self.briefing_remaining = None;
                self.briefing_expired = false;
                self.reading = controller.reading(now);
                self.mission_timer.start(now);
                self.evidence_input.clear();
                self.verification.clear();
                self.set_view(View::Active);
            }
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    /// Advance whichever countdown is running. Returns true when the screen
    /// needs redrawing.
    pub fn on_tick(&mut self, now: DateTime<Local>) -> bool {
        let due = self.mission_timer.fire(now) | self.briefing_timer.fire(now);
        if !due {
            return false;
        }
        let Some(controller) = self.controller.as_mut() else {
            self.stop_timers();
            return false;
        };
        match controller.tick(now) {
            TickOutcome::Briefing {
                remaining_secs,
                expired,
            } => {
                self.briefing_remaining = Some(remaining_secs);
                self.briefing_expired = expired;
            }
            TickOutcome::Active(reading) => self.reading = Some(reading),
            TickOutcome::Failed(result) => {
                self.status = Some("Time is up. The mission has been closed.".to_string());
                self.conclude(result);
            }
            TickOutcome::Idle | TickOutcome::Finished => self.stop_timers(),
        }
        true
    }

    /// Claim the submission slot and hand back the work for an upload thread.
    pub fn begin_upload(&mut self, now: DateTime<Local>) -> Option<UploadJob> {
        let controller = self.controller.as_mut()?;
        let path = self.evidence_input.trim();
        if path.is_empty() {
            self.status = Some("Type the path of your evidence file first.".to_string());
            return None;
        }
        let file = PathBuf::from(path);
        match controller.begin_submission(now) {
            Ok(pending) => {
                self.verification = verification_log(controller.team(), pending.mission());
                self.status = None;
                Some(UploadJob {
                    team: controller.team().to_string(),
                    pending,
                    file,
                    at: now.naive_local().trunc_subsecs(0),
                })
            }
            Err(err) => {
                self.status = Some(err.to_string());
                None
            }
        }
    }

    pub fn on_upload(
        &mut self,
        pending: PendingSubmission,
        result: Result<StoredEvidence, EvidenceError>,
        now: DateTime<Local>,
    ) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        self.verification.extend(verification_outcome(&result));
        match controller.finish_submission(pending, result, &mut self.ledger, now) {
            Ok(result) => self.conclude(result),
            Err(LifecycleError::Persistence(err)) => {
                self.verification
                    .push(format!("ERROR: Ledger write failed ({err}). Retry submission."));
                self.status = Some("Score could not be saved. Submit again.".to_string());
            }
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    pub fn abort_mission(&mut self) {
        let Some(controller) = self.controller.as_mut() else {
            return;
        };
        match controller.abort() {
            Ok(result) => self.conclude(result),
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    pub fn open_dataset(&mut self) {
        let Some(url) = self.current_mission().and_then(|m| m.dataset_url.clone()) else {
            self.status = Some("No dataset link for this mission.".to_string());
            return;
        };
        if Browser::is_available() {
            if let Err(err) = webbrowser::open(&url) {
                self.status = Some(format!("Could not open browser: {err}"));
            }
        } else {
            self.status = Some(format!("Dataset: {url}"));
        }
    }

    /// Cancel every countdown. Called on logout and when the loop exits.
    pub fn stop_timers(&mut self) {
        self.mission_timer.cancel();
        self.briefing_timer.cancel();
    }

    fn conclude(&mut self, result: MissionResult) {
        self.stop_timers();
        self.reading = None;
        if result.outcome == MissionOutcome::Failed && self.status.is_none() {
            self.status = Some(format!("Mission {} closed as failed.", result.mission_id));
        }
        self.last_result = Some(result);
        self.set_view(View::Completed);
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: DateTime<Local>) -> Control {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Control::Quit;
        }

        match self.view {
            View::Login => match key.code {
                KeyCode::Esc => return Control::Quit,
                KeyCode::Enter => self.login(),
                KeyCode::Tab => self.set_view(View::Leaderboard),
                KeyCode::Backspace => {
                    self.team_input.pop();
                }
                KeyCode::Char(c) => self.team_input.push(c),
                _ => {}
            },
            View::Dashboard => match key.code {
                KeyCode::Enter | KeyCode::Char('b') => {
                    if self.controller.as_ref().is_some_and(|c| c.is_finished()) {
                        self.set_view(View::Leaderboard);
                    } else {
                        self.open_briefing(now);
                    }
                }
                KeyCode::Char('l') => self.set_view(View::Leaderboard),
                KeyCode::Char('q') | KeyCode::Esc => self.logout(),
                _ => {}
            },
            View::Briefing => match key.code {
                KeyCode::Enter | KeyCode::Char('s') => self.start_mission(now),
                KeyCode::Char('d') => self.open_dataset(),
                KeyCode::Esc | KeyCode::Char('b') if !self.briefing_expired => {
                    self.leave_briefing()
                }
                _ => {}
            },
            View::Active => {
                let submitting = self.controller.as_ref().is_some_and(|c| c.is_submitting());
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    match key.code {
                        KeyCode::Char('x') => self.abort_mission(),
                        KeyCode::Char('o') => self.open_dataset(),
                        _ => {}
                    }
                    return Control::Continue;
                }
                match key.code {
                    KeyCode::Enter if !submitting => {
                        if let Some(job) = self.begin_upload(now) {
                            return Control::Upload(job);
                        }
                    }
                    KeyCode::Backspace if !submitting => {
                        self.evidence_input.pop();
                    }
                    KeyCode::Char(c) if !submitting => self.evidence_input.push(c),
                    _ => {}
                }
            }
            View::Completed => match key.code {
                KeyCode::Enter | KeyCode::Esc => {
                    self.status = None;
                    self.set_view(View::Dashboard);
                }
                KeyCode::Char('l') => self.set_view(View::Leaderboard),
                _ => {}
            },
            View::Leaderboard => match key.code {
                KeyCode::Char('r') => self.refresh_standings(),
                KeyCode::Esc | KeyCode::Char('b') | KeyCode::Tab => {
                    if self.controller.is_some() {
                        self.set_view(View::Dashboard);
                    } else {
                        self.set_view(View::Login);
                    }
                }
                KeyCode::Char('q') => return Control::Quit,
                _ => {}
            },
        }
        Control::Continue
    }
}
