use ratatui::Frame;

use crate::{
    app::{App, View},
    ui::{leaderboard::render_leaderboard, render_active, render_briefing, render_completed, render_dashboard, render_login},
};

/// A UI Screen boundary: responsible for rendering one view
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

pub struct LoginScreen;

impl Screen for LoginScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_login(app, f);
    }
}

pub struct DashboardScreen;

impl Screen for DashboardScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_dashboard(app, f);
    }
}

pub struct BriefingScreen;

impl Screen for BriefingScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_briefing(app, f);
    }
}

pub struct ActiveScreen;

impl Screen for ActiveScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_active(app, f);
    }
}

pub struct CompletedScreen;

impl Screen for CompletedScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_completed(app, f);
    }
}

/// Full standings table
pub struct LeaderboardScreen;

impl Screen for LeaderboardScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_leaderboard(app, f);
    }
}

/// Helper to construct the appropriate screen for the current view
pub fn current_screen(view: View) -> Box<dyn Screen> {
    match view {
        View::Login => Box::new(LoginScreen),
        View::Dashboard => Box::new(DashboardScreen),
        View::Briefing => Box::new(BriefingScreen),
        View::Active => Box::new(ActiveScreen),
        View::Completed => Box::new(CompletedScreen),
        View::Leaderboard => Box::new(LeaderboardScreen),
    }
}
