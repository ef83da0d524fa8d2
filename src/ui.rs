pub mod leaderboard;
pub mod screen;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use escaperoom::{
    lifecycle::Phase,
    session::{MissionOutcome, MissionStatus},
    util::{format_mmss, mission_code},
};

use crate::app::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

fn hint(text: &str) -> Paragraph<'_> {
    Paragraph::new(text)
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC))
        .alignment(Alignment::Center)
}

fn status_line(app: &App) -> Paragraph<'static> {
    let text = app.status.clone().unwrap_or_default();
    Paragraph::new(Span::styled(text, Style::default().fg(Color::Yellow)))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
}

/// Page layout shared by every screen: title, body, status line, key hints.
fn frame_chunks(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area)
}

fn title(text: String) -> Paragraph<'static> {
    Paragraph::new(Span::styled(text, bold().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::BOTTOM))
}

pub fn render_login(app: &App, f: &mut Frame) {
    let chunks = frame_chunks(f.area());
    f.render_widget(title("ESCAPE ROOM // OPERATIVE LOGIN".to_string()), chunks[0]);

    let body = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(chunks[1]);

    let input = Paragraph::new(Line::from(vec![
        Span::styled(app.team_input.clone(), bold()),
        Span::styled("_", dim()),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Team name"));
    f.render_widget(input, body[0]);

    leaderboard::render_table(app, f, body[1], 5);

    f.render_widget(status_line(app), chunks[2]);
    f.render_widget(hint("(enter) log in  (tab) leaderboard  (esc) quit"), chunks[3]);
}

fn status_style(status: MissionStatus) -> Style {
    match status {
        MissionStatus::Completed => Style::default().fg(Color::Green),
        MissionStatus::Failed => Style::default().fg(Color::Red),
        MissionStatus::Available => bold().fg(Color::Yellow),
        MissionStatus::Locked => dim(),
    }
}

pub fn render_dashboard(app: &App, f: &mut Frame) {
    let chunks = frame_chunks(f.area());
    let Some(controller) = app.controller() else {
        return;
    };
    f.render_widget(
        title(format!("MISSION CONTROL // {}", controller.team())),
        chunks[0],
    );

    let items: Vec<ListItem> = controller
        .catalog()
        .iter()
        .enumerate()
        .map(|(index, mission)| {
            let status = controller
                .mission_status(index)
                .unwrap_or(MissionStatus::Locked);
            let elapsed = controller
                .progress()
                .elapsed_secs(mission.id)
                .map(|s| format!("  {}", format_mmss(s as i64)))
                .unwrap_or_default();
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<4}", mission_code(mission.id)), bold()),
                Span::raw(format!("{:<32}", mission.name)),
                Span::styled(format!("{status}{elapsed}"), status_style(status)),
            ]))
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Missions"));
    f.render_widget(list, chunks[1]);

    f.render_widget(status_line(app), chunks[2]);
    let keys = if controller.is_finished() {
        "All missions played.  (enter/l) leaderboard  (q) log out"
    } else {
        "(enter) open briefing  (l) leaderboard  (q) log out"
    };
    f.render_widget(hint(keys), chunks[3]);
}

pub fn render_briefing(app: &App, f: &mut Frame) {
    let chunks = frame_chunks(f.area());
    let Some(mission) = app.current_mission() else {
        return;
    };
    f.render_widget(
        title(format!("BRIEFING // {} {}", mission_code(mission.id), mission.name)),
        chunks[0],
    );

    let remaining = app.briefing_remaining.unwrap_or_default();
    let mut lines = vec![
        Line::from(Span::styled(
            format!("Briefing closes in {}", format_mmss(remaining as i64)),
            dim(),
        )),
        Line::default(),
        Line::from(Span::styled("OBJECTIVE", bold())),
        Line::from(mission.objective.clone()),
        Line::default(),
        Line::from(format!(
            "Time allotted: {}  (+{} overtime)",
            format_mmss(mission.duration_secs as i64),
            format_mmss(app.config.overtime_grace_secs as i64)
        )),
    ];
    if let Some(url) = &mission.dataset_url {
        lines.push(Line::from(Span::styled(
            format!("Dataset: {url}"),
            Style::default().fg(Color::Blue),
        )));
    }
    let body = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(body, chunks[1]);

    f.render_widget(status_line(app), chunks[2]);
    f.render_widget(
        hint("(enter) start mission  (d) open dataset  (esc) back"),
        chunks[3],
    );

    if app.briefing_expired {
        render_briefing_expired(f, chunks[1]);
    }
}

fn render_briefing_expired(f: &mut Frame, area: Rect) {
    let width = 44.min(area.width);
    let top = area.height / 3;
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + top,
        width,
        height: 4.min(area.height - top),
    };
    let message = Paragraph::new(vec![
        Line::from(Span::styled("BRIEFING TIME IS OVER", bold().fg(Color::Red))),
        Line::from("Press (enter) to start the mission."),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(Clear, popup);
    f.render_widget(message, popup);
}

pub fn render_active(app: &App, f: &mut Frame) {
    let chunks = frame_chunks(f.area());
    let Some(mission) = app.current_mission() else {
        return;
    };
    f.render_widget(
        title(format!("ACTIVE // {} {}", mission_code(mission.id), mission.name)),
        chunks[0],
    );

    let body = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
        ])
        .split(chunks[1]);

    if let Some(reading) = app.reading {
        let (label, color) = match reading.phase {
            Phase::Running => ("TIME REMAINING", Color::Green),
            Phase::Overtime => ("OVERTIME", Color::Red),
            Phase::Expired => ("TIME UP", Color::Red),
        };
        let total = match reading.phase {
            Phase::Running => mission.duration_secs,
            _ => app.config.overtime_grace_secs,
        }
        .max(1);
        let ratio = (reading.remaining_secs as f64 / total as f64).clamp(0.0, 1.0);
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(label))
            .gauge_style(Style::default().fg(color))
            .ratio(ratio)
            .label(format_mmss(reading.remaining_secs as i64));
        f.render_widget(gauge, body[0]);
    }

    let objective = Paragraph::new(mission.objective.clone())
        .wrap(Wrap { trim: true })
        .style(dim());
    f.render_widget(objective, body[1]);

    let submitting = app.controller().is_some_and(|c| c.is_submitting());
    let path = &app.evidence_input;
    let max = body[2].width.saturating_sub(3) as usize;
    let shown = if path.width() > max {
        let skip = path.chars().count().saturating_sub(max);
        path.chars().skip(skip).collect::<String>()
    } else {
        path.clone()
    };
    let input = Paragraph::new(Line::from(vec![
        Span::styled(shown, bold()),
        Span::styled(if submitting { "" } else { "_" }, dim()),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Evidence file"));
    f.render_widget(input, body[2]);

    render_verification(app, f, body[3]);

    f.render_widget(status_line(app), chunks[2]);
    f.render_widget(
        hint("(enter) submit evidence  (ctrl+o) dataset  (ctrl+x) abort mission"),
        chunks[3],
    );
}

fn render_verification(app: &App, f: &mut Frame, area: Rect) {
    let items: Vec<ListItem> = app
        .verification
        .iter()
        .map(|line| {
            let style = if line.starts_with("ERROR") {
                Style::default().fg(Color::Red)
            } else if line.starts_with("STATUS") {
                bold().fg(Color::Green)
            } else {
                Style::default().fg(Color::Cyan)
            };
            ListItem::new(Span::styled(format!("> {line}"), style))
        })
        .collect();
    f.render_widget(
        List::new(items).block(Block::default().borders(Borders::ALL).title("Verification")),
        area,
    );
}

pub fn render_completed(app: &App, f: &mut Frame) {
    let chunks = frame_chunks(f.area());
    let Some(result) = &app.last_result else {
        return;
    };
    let (heading, color) = match result.outcome {
        MissionOutcome::Completed => ("MISSION SECURED", Color::Green),
        MissionOutcome::Failed => ("MISSION FAILED", Color::Red),
    };
    f.render_widget(title(format!("{heading} // {}", mission_code(result.mission_id))), chunks[0]);

    let body = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(1)])
        .split(chunks[1]);

    let mut lines = vec![
        Line::from(Span::styled(heading, bold().fg(color))),
        Line::from(format!("Time: {}", format_mmss(result.time_taken_secs as i64))),
    ];
    if result.session_finished {
        lines.push(Line::from(Span::styled("All missions played.", bold())));
    }
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), body[0]);

    leaderboard::render_table(app, f, body[1], 10);

    f.render_widget(status_line(app), chunks[2]);
    f.render_widget(hint("(enter) dashboard  (l) leaderboard"), chunks[3]);
}

pub fn draw(app: &App, f: &mut Frame) {
    screen::current_screen(app.view).render(app, f);
}
