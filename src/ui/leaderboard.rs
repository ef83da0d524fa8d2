use ratatui::{
    layout::{Alignment, Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use escaperoom::ledger::LeaderboardEntry;

use crate::app::App;

/// Whole scores without decimals, fractional ones to one place.
pub fn format_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{points:.0}")
    } else {
        format!("{points:.1}")
    }
}

/// Pure presenter for one standings row. `rank` is 1-based.
pub fn present_row(rank: usize, entry: &LeaderboardEntry, highlight: bool) -> Row<'static> {
    let rank_color = match rank {
        1 => Color::Yellow,
        2 => Color::White,
        3 => Color::Rgb(205, 127, 50),
        _ => Color::Gray,
    };
    let points = format_points(entry.total_points);

    let row = Row::new(vec![
        Cell::from(format!("#{rank}")).style(Style::default().fg(rank_color)),
        Cell::from(entry.team.clone()).style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(entry.missions_completed.to_string()),
        Cell::from(points),
        Cell::from(entry.total_time_display()),
    ]);
    if highlight {
        row.style(Style::default().fg(Color::Cyan))
    } else {
        row
    }
}

/// Standings table, capped at `limit` rows. The logged-in team is highlighted.
pub fn render_table(app: &App, f: &mut Frame, area: Rect, limit: usize) {
    let team = app.controller().map(|c| c.team());
    let rows: Vec<Row> = app
        .standings
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, entry)| present_row(i + 1, entry, team == Some(entry.team.as_str())))
        .collect();

    if rows.is_empty() {
        let empty = Paragraph::new("No scores recorded yet.")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Leaderboard"));
        f.render_widget(empty, area);
        return;
    }

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(16),
            Constraint::Length(9),
            Constraint::Length(8),
            Constraint::Length(8),
        ],
    )
    .header(
        Row::new(vec!["Rank", "Team", "Missions", "Points", "Time"])
            .style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED)),
    )
    .block(Block::default().borders(Borders::ALL).title("Leaderboard"));
    f.render_widget(table, area);
}

pub fn render_leaderboard(app: &App, f: &mut Frame) {
    let chunks = super::frame_chunks(f.area());
    let scope = app
        .ledger()
        .training_code()
        .map(|code| format!("LEADERBOARD // {code}"))
        .unwrap_or_else(|| "LEADERBOARD".to_string());
    f.render_widget(super::title(scope), chunks[0]);

    render_table(app, f, chunks[1], usize::MAX);

    f.render_widget(super::status_line(app), chunks[2]);
    f.render_widget(super::hint("(r) refresh  (esc) back  (q) quit"), chunks[3]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_formatting() {
        assert_eq!(format_points(3.0), "3");
        assert_eq!(format_points(2.5), "2.5");
        assert_eq!(format_points(-0.5), "-0.5");
        assert_eq!(format_points(0.0), "0");
    }
}
