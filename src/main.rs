mod app;
mod ui;

use std::{
    error::Error,
    io::{self, stdin},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use chrono::SubsecRound;
use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::info;

use escaperoom::{
    admin::{self, RecordDraft, TransferFormat},
    app_dirs::AppDirs,
    config::{Config, FileConfigStore},
    evidence::LocalEvidenceSink,
    ledger::{leaderboard, Ledger, LeaderboardEntry, Record},
    logging,
    mission::MissionCatalog,
    runtime::{AppEvent, Clock, CrosstermEventSource, FixedTicker, Runner, SystemClock},
    store::SqliteLedgerStore,
    util::format_mmss,
};

use crate::app::{App, Control};

const TICK_RATE_MS: u64 = 100;

/// timed escape-room missions with evidence upload and a live leaderboard
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Teams log in, read a briefing, race a countdown with an overtime grace period, submit evidence files and climb a shared leaderboard. Administrators can correct the score ledger from the command line."
)]
pub struct Cli {
    /// path to the config file
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// path to the ledger database
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// play the missions in the terminal (default)
    Play {
        /// team name to log in with
        #[clap(short, long)]
        team: Option<String>,
    },
    /// print the current standings
    Leaderboard {
        /// print as JSON
        #[clap(long)]
        json: bool,

        /// rank every training code, not only the configured one
        #[clap(long)]
        all: bool,
    },
    /// list the mission catalog
    Missions,
    /// inspect and correct the score ledger
    #[clap(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum AdminCommand {
    /// list every record with its index
    List,
    /// append a record
    Add(AddArgs),
    /// replace fields of the record at INDEX
    Edit {
        index: usize,
        #[clap(flatten)]
        fields: EditArgs,
    },
    /// remove the record at INDEX
    Delete { index: usize },
    /// discard every record and restore the baseline
    Reset {
        /// confirm the reset
        #[clap(long)]
        yes: bool,
    },
    /// write the ledger to a .csv or .json file ("-" for stdout)
    Export {
        path: PathBuf,
        #[clap(long, value_enum)]
        format: Option<FormatArg>,
    },
    /// replace the ledger with the contents of a .csv or .json file
    Import { path: PathBuf },
}

#[derive(Args, Debug, Clone, PartialEq)]
struct AddArgs {
    #[clap(long)]
    team: String,
    /// mission id, e.g. 3, M03 or "Mission 3"
    #[clap(long)]
    mission: String,
    /// Submission, Bonus or ManualAdjustment
    #[clap(long, default_value = "Bonus")]
    action: String,
    #[clap(long)]
    points: String,
    /// seconds or MM:SS
    #[clap(long, default_value = "0")]
    time: String,
    /// YYYY-MM-DD HH:MM:SS, defaults to now
    #[clap(long)]
    timestamp: Option<String>,
    #[clap(long)]
    evidence: Option<String>,
    #[clap(long)]
    training_code: Option<String>,
}

impl AddArgs {
    fn into_draft(self) -> RecordDraft {
        RecordDraft {
            training_code: self.training_code.unwrap_or_default(),
            team: self.team,
            mission: self.mission,
            action: self.action,
            points: self.points,
            time_taken: self.time,
            timestamp: self.timestamp.unwrap_or_default(),
            evidence_file_name: self.evidence.unwrap_or_default(),
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
struct EditArgs {
    #[clap(long)]
    team: Option<String>,
    #[clap(long)]
    mission: Option<String>,
    #[clap(long)]
    action: Option<String>,
    #[clap(long)]
    points: Option<String>,
    #[clap(long)]
    time: Option<String>,
    #[clap(long)]
    timestamp: Option<String>,
    #[clap(long)]
    evidence: Option<String>,
    #[clap(long)]
    training_code: Option<String>,
}

impl EditArgs {
    fn apply(self, draft: &mut RecordDraft) {
        let fields = [
            (self.team, &mut draft.team),
            (self.mission, &mut draft.mission),
            (self.action, &mut draft.action),
            (self.points, &mut draft.points),
            (self.time, &mut draft.time_taken),
            (self.timestamp, &mut draft.timestamp),
            (self.evidence, &mut draft.evidence_file_name),
            (self.training_code, &mut draft.training_code),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for TransferFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => TransferFormat::Csv,
            FormatArg::Json => TransferFormat::Json,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Command::Play { team: None });
    let interactive = matches!(command, Command::Play { .. });

    // The TUI owns the terminal, so it only logs to file.
    let _log_guard = logging::init(&AppDirs::log_dir(), !interactive);

    let config_store = cli
        .config
        .as_ref()
        .map(FileConfigStore::with_path)
        .unwrap_or_default();
    let mut config = config_store.load_or_init();
    if let Some(db) = &cli.db {
        config.db_path = Some(db.clone());
    }

    match command {
        Command::Play { team } => play(config, team, &SystemClock),
        Command::Leaderboard { json, all } => print_leaderboard(&config, json, all),
        Command::Missions => print_missions(&config),
        Command::Admin(cmd) => run_admin(&config, cmd, &SystemClock),
    }
}

fn open_ledger(config: &Config) -> Result<Ledger<SqliteLedgerStore>, Box<dyn Error>> {
    let store = SqliteLedgerStore::open(AppDirs::db_path(config))?;
    Ok(Ledger::open(store)?.with_training_code(config.training_code.clone()))
}

fn print_missions(config: &Config) -> Result<(), Box<dyn Error>> {
    let catalog = MissionCatalog::load(config.missions_path.as_deref())?;
    for mission in catalog.iter() {
        println!(
            "{:<4} {:<32} {}",
            mission.ledger_name(),
            mission.name,
            format_mmss(mission.duration_secs as i64)
        );
    }
    Ok(())
}

fn leaderboard_table(entries: &[LeaderboardEntry]) -> String {
    let mut out = format!(
        "{:>4}  {:<24} {:>8} {:>7} {:>8}\n",
        "Rank", "Team", "Missions", "Points", "Time"
    );
    for (i, e) in entries.iter().enumerate() {
        out.push_str(&format!(
            "{:>4}  {:<24} {:>8} {:>7} {:>8}\n",
            i + 1,
            e.team,
            e.missions_completed,
            ui::leaderboard::format_points(e.total_points),
            e.total_time_display()
        ));
    }
    out
}

fn print_leaderboard(config: &Config, json: bool, all: bool) -> Result<(), Box<dyn Error>> {
    let ledger = open_ledger(config)?;
    let entries = if all {
        leaderboard(ledger.records(), None)
    } else {
        ledger.compute_leaderboard()
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print!("{}", leaderboard_table(&entries));
    }
    Ok(())
}

fn describe(index: usize, r: &Record) -> String {
    format!(
        "{index:>3}  {}  {:<20} {:<4} {:<16} {:>5} {:>6}  {}  {}",
        r.training_code,
        r.team,
        r.mission_name,
        r.action,
        ui::leaderboard::format_points(r.points),
        format_mmss(r.time_taken_secs as i64),
        r.timestamp.format("%Y-%m-%d %H:%M:%S"),
        r.evidence_file_name
    )
}

fn run_admin(config: &Config, cmd: AdminCommand, clock: &dyn Clock) -> Result<(), Box<dyn Error>> {
    let mut ledger = open_ledger(config)?;
    let now = clock.now().naive_local().trunc_subsecs(0);

    match cmd {
        AdminCommand::List => {
            for (i, r) in ledger.records().iter().enumerate() {
                println!("{}", describe(i, r));
            }
        }
        AdminCommand::Add(args) => {
            let record = args.into_draft().parse(&config.training_code, now)?;
            ledger.append(record)?;
            let index = ledger.records().len() - 1;
            println!("added {}", describe(index, &ledger.records()[index]));
        }
        AdminCommand::Edit { index, fields } => {
            let current = ledger
                .records()
                .get(index)
                .ok_or(escaperoom::error::LedgerError::NoSuchRecord(index))?;
            let mut draft = RecordDraft::from_record(current);
            fields.apply(&mut draft);
            let record = draft.parse(&config.training_code, now)?;
            ledger.edit(index, record)?;
            println!("updated {}", describe(index, &ledger.records()[index]));
        }
        AdminCommand::Delete { index } => {
            let removed = ledger.delete(index)?;
            println!("deleted {}", describe(index, &removed));
        }
        AdminCommand::Reset { yes } => {
            if !yes {
                return Err("refusing to reset the ledger without --yes".into());
            }
            ledger.reset()?;
            println!("ledger reset to {} baseline records", ledger.records().len());
        }
        AdminCommand::Export { path, format } => {
            if path == Path::new("-") {
                let format = format.map(Into::into).unwrap_or(TransferFormat::Json);
                admin::export_to_stdout(ledger.records(), format)?;
            } else {
                admin::export_to_path(ledger.records(), &path)?;
                println!("exported {} records to {}", ledger.records().len(), path.display());
            }
        }
        AdminCommand::Import { path } => {
            let records = admin::import_from_path(&path)?;
            let count = records.len();
            ledger.replace_all(records)?;
            println!("imported {count} records");
        }
    }
    Ok(())
}

fn play(config: Config, team: Option<String>, clock: &dyn Clock) -> Result<(), Box<dyn Error>> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let catalog = MissionCatalog::load(config.missions_path.as_deref())?;
    let ledger = open_ledger(&config)?;
    let sink = LocalEvidenceSink::new(
        AppDirs::evidence_dir(&config),
        Duration::from_millis(config.upload_latency_ms),
    );
    let mut app = App::new(config, catalog, ledger, sink);
    if let Some(team) = team {
        app.team_input = team;
        app.login();
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, clock);
    app.stop_timers();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    clock: &dyn Clock,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| ui::draw(app, f))?;

    loop {
        match runner.step() {
            AppEvent::Tick => {
                if app.on_tick(clock.now()) {
                    terminal.draw(|f| ui::draw(app, f))?;
                }
            }
            AppEvent::Resize => {
                terminal.draw(|f| ui::draw(app, f))?;
            }
            AppEvent::Upload { pending, result } => {
                app.on_upload(pending, result, clock.now());
                terminal.draw(|f| ui::draw(app, f))?;
            }
            AppEvent::Key(key) => {
                match app.handle_key(key, clock.now()) {
                    Control::Quit => break,
                    Control::Upload(job) => {
                        let tx = runner.event_source().sender();
                        let sink = app.sink().clone();
                        thread::spawn(move || {
                            // the loop may already be gone; nothing to report to then
                            let _ = tx.send(job.run(&sink));
                        });
                    }
                    Control::Continue => {}
                }
                terminal.draw(|f| ui::draw(app, f))?;
            }
        }
    }

    info!("Leaving the terminal session");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_admin_add_stamps_with_given_clock() {
        use chrono::{Local, TimeZone};
        use escaperoom::runtime::ManualClock;

        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            db_path: Some(dir.path().join("ledger.db")),
            ..Config::default()
        };
        let clock = ManualClock::new(Local.with_ymd_and_hms(2026, 1, 4, 9, 0, 0).unwrap());
        clock.advance(Duration::from_millis(1500));

        let cli = Cli::parse_from([
            "escaperoom", "admin", "add", "--team", "Alpha", "--mission", "2", "--points", "1",
        ]);
        let Some(Command::Admin(cmd)) = cli.command else {
            panic!("expected admin command");
        };
        run_admin(&config, cmd, &clock).unwrap();

        let ledger = open_ledger(&config).unwrap();
        let added = ledger.records().last().unwrap();
        assert_eq!(added.team, "Alpha");
        assert_eq!(added.timestamp.to_string(), "2026-01-04 09:00:01");
    }

    #[test]
    fn test_cli_defaults_to_play() {
        let cli = Cli::parse_from(["escaperoom"]);
        assert_eq!(cli.command, None);
        assert_eq!(cli.db, None);
    }

    #[test]
    fn test_cli_global_db_after_subcommand() {
        let cli = Cli::parse_from(["escaperoom", "leaderboard", "--json", "--db", "/tmp/l.db"]);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/l.db")));
        assert_eq!(
            cli.command,
            Some(Command::Leaderboard {
                json: true,
                all: false
            })
        );
    }

    #[test]
    fn test_cli_admin_add_defaults() {
        let cli = Cli::parse_from([
            "escaperoom", "admin", "add", "--team", "Alpha", "--mission", "M02", "--points", "2",
        ]);
        let Some(Command::Admin(AdminCommand::Add(args))) = cli.command else {
            panic!("expected admin add");
        };
        let draft = args.into_draft();
        assert_eq!(draft.action, "Bonus");
        assert_eq!(draft.time_taken, "0");
        assert!(draft.timestamp.is_empty());
    }

    #[test]
    fn test_edit_args_only_touch_given_fields() {
        let mut draft = RecordDraft {
            team: "Alpha".into(),
            mission: "1".into(),
            points: "1".into(),
            ..Default::default()
        };
        let fields = EditArgs {
            team: None,
            mission: None,
            action: None,
            points: Some("3.5".into()),
            time: None,
            timestamp: None,
            evidence: None,
            training_code: None,
        };
        fields.apply(&mut draft);
        assert_eq!(draft.team, "Alpha");
        assert_eq!(draft.points, "3.5");
    }

    #[test]
    fn test_leaderboard_table_layout() {
        let entries = vec![LeaderboardEntry {
            team: "Alpha".into(),
            missions_completed: 2,
            total_points: 2.5,
            total_time_secs: 250,
        }];
        let table = leaderboard_table(&entries);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("Alpha"));
        assert!(lines[1].contains("2.5"));
        assert!(lines[1].ends_with("04:10"));
    }
}
