//! TUI module - Terminal dashboard with ratatui

use anyhow::Result;
use chrono::Local;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Gauge, List, ListItem, Paragraph, Row, Table},
};
use std::io::{Stdout, stdout};

use crate::achievements::AchievementSummary;
use crate::db::{StateStore, WorkoutLog};
use crate::level::{LevelData, Multiplier, XpGrant};
use crate::tracker::Tracker;

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// What the dashboard shows, captured on start and on refresh
struct Snapshot {
    level: LevelData,
    streak: u32,
    multipliers: Vec<Multiplier>,
    history: Vec<XpGrant>,
    achievements: AchievementSummary,
}

impl Snapshot {
    fn capture<S: StateStore + WorkoutLog>(tracker: &mut Tracker<S>) -> Self {
        let now = Local::now().fixed_offset();
        Self {
            level: tracker.level_data(),
            streak: tracker.engine().daily_streak(),
            multipliers: tracker.active_multipliers(now).to_vec(),
            history: tracker.xp_history().into_iter().rev().cloned().collect(),
            achievements: tracker.achievements().summary(),
        }
    }
}

/// App state for TUI
pub struct App<S: StateStore + WorkoutLog> {
    tracker: Tracker<S>,
    snapshot: Snapshot,
    should_quit: bool,
}

impl<S: StateStore + WorkoutLog> App<S> {
    pub fn new(mut tracker: Tracker<S>) -> Result<Self> {
        let snapshot = Snapshot::capture(&mut tracker);
        Ok(Self {
            tracker,
            snapshot,
            should_quit: false,
        })
    }

    /// Run the TUI application
    pub fn run(&mut self) -> Result<()> {
        let mut terminal = init_terminal()?;

        while !self.should_quit {
            terminal.draw(|frame| self.render(frame))?;
            self.handle_events()?;
        }

        restore_terminal()?;
        Ok(())
    }

    fn refresh(&mut self) {
        self.snapshot = Snapshot::capture(&mut self.tracker);
    }

    fn render(&self, frame: &mut Frame) {
        let snap = &self.snapshot;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(3),
            ])
            .split(frame.area());

        // Header
        let header = Paragraph::new(format!(
            "升级 shengji | {} {} | Уровень {} | Серия {} дн.",
            snap.level.rank_icon, snap.level.rank, snap.level.level, snap.streak
        ))
        .style(Style::default().fg(Color::Cyan).bold())
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        let ratio = (snap.level.progress_percentage / 100.0).clamp(0.0, 1.0);
        let gauge = Gauge::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("XP (следующий ранг: {})", snap.level.next_rank)),
            )
            .gauge_style(Style::default().fg(Color::Yellow))
            .ratio(ratio)
            .label(format!(
                "{}/{} ({:.0}%)",
                snap.level.current_xp, snap.level.required_xp, snap.level.progress_percentage
            ));
        frame.render_widget(gauge, chunks[1]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(chunks[2]);

        // XP history table
        let rows: Vec<Row> = snap
            .history
            .iter()
            .map(|g| {
                Row::new(vec![
                    Cell::from(g.timestamp.format("%m-%d %H:%M").to_string()),
                    Cell::from(format!("{} {}", g.icon, g.name)),
                    Cell::from(format!("+{}", g.amount)),
                    Cell::from(format!("x{:.2}", g.multiplier)),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(12),
                Constraint::Min(20),
                Constraint::Length(7),
                Constraint::Length(6),
            ],
        )
        .header(Row::new(vec!["Когда", "Источник", "XP", "Множ."]).style(Style::default().bold()))
        .block(Block::default().borders(Borders::ALL).title("Recent XP"));
        frame.render_widget(table, body[0]);

        let mut side: Vec<ListItem> = vec![
            ListItem::new(format!(
                "🏅 {}/{} ({}%)",
                snap.achievements.unlocked, snap.achievements.total, snap.achievements.percentage
            )),
            ListItem::new(format!("Очки: {}", snap.achievements.points)),
            ListItem::new(""),
        ];
        if snap.multipliers.is_empty() {
            side.push(ListItem::new("Нет активных бонусов").style(Style::default().fg(Color::DarkGray)));
        }
        for m in &snap.multipliers {
            let until = m
                .expires_at
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "∞".to_string());
            side.push(
                ListItem::new(format!("x{} {} (до {})", m.factor, m.description, until))
                    .style(Style::default().fg(Color::Green)),
            );
        }
        let list = List::new(side).block(Block::default().borders(Borders::ALL).title("Бонусы"));
        frame.render_widget(list, body[1]);

        // Footer
        let footer = Paragraph::new("q: quit | r: refresh")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[3]);
    }

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(std::time::Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match key.code {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('r') => self.refresh(),
                _ => {}
            }
        }
        Ok(())
    }
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}
