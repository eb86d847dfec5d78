//! shengji - Personal fitness progression tracker
//!
//! 升级 (shēngjí) - "level up"

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local};
use clap::{Args, Parser, Subcommand};

use shengji::achievements::{ACHIEVEMENTS, SocialProgress};
use shengji::level::{GrantEvent, LoginReport, MultiplierKind, SocialAction};
use shengji::tracker::Tracker;
use shengji::tui::App;
use shengji::workouts::{ChartPeriod, WorkoutSession};
use shengji::{Database, EngineConfig};

#[derive(Parser)]
#[command(name = "shengji")]
#[command(author, version, about = "升级 - Personal fitness progression tracker")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct Settings {
    /// SQLite database file
    #[arg(long, global = true, env = "SHENGJI_DB", default_value = "shengji.db")]
    db: String,

    /// XP needed to clear level 1
    #[arg(long, global = true, env = "SHENGJI_BASE_XP", default_value_t = 100)]
    base_xp: u64,

    /// Level difficulty growth
    #[arg(long, global = true, env = "SHENGJI_GROWTH_RATE", default_value_t = 1.5)]
    growth_rate: f64,

    /// XP grants kept in history
    #[arg(long, global = true, env = "SHENGJI_HISTORY_CAP", default_value_t = 100)]
    history_cap: usize,
}

impl Settings {
    fn engine_config(&self) -> Result<EngineConfig> {
        EngineConfig::new(self.base_xp, self.growth_rate, self.history_cap)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Open TUI dashboard
    Tui,

    /// Show level, rank and streak
    Status,

    /// Claim the daily login bonus
    Login,

    /// Grant XP from a named source (e.g. WORKOUT_COMPLETE)
    Grant {
        source: String,

        #[arg(short, long, default_value_t = 1.0)]
        multiplier: f64,
    },

    /// Log a finished workout
    Workout {
        /// Workout name
        #[arg(short, long, default_value = "Тренировка")]
        name: String,

        /// Duration in minutes
        #[arg(short, long)]
        minutes: u32,

        /// Calories burned
        #[arg(short, long, default_value_t = 0)]
        calories: u32,
    },

    /// Record a social interaction: like, comment, share, friend
    Social { action: String },

    /// Set the friend count (from the backend)
    Friends { count: u32 },

    /// Record a finished challenge
    Challenge {
        /// Final position (1 = win)
        position: u32,

        /// Total challenges won so far
        #[arg(long)]
        wins: Option<u32>,
    },

    /// Add a temporary XP multiplier
    Boost {
        /// streak, weekend, time-of-day, challenge, friend, event
        kind: String,

        factor: f64,

        /// Lifetime in minutes (omit for no expiry)
        #[arg(short, long)]
        minutes: Option<u32>,

        #[arg(short, long, default_value = "Бонус")]
        description: String,
    },

    /// Show recent XP grants
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// List achievements
    Achievements,

    /// Workout counts for week, month or year
    Chart {
        #[arg(default_value = "week")]
        period: String,
    },

    /// Dump workout history and stats as JSON
    Export,

    /// Load workout history and stats from a JSON dump
    Import { file: String },

    /// Start Telegram bot
    Bot {
        /// Telegram bot token (or set TELOXIDE_TOKEN env var)
        #[arg(short, long, env = "TELOXIDE_TOKEN")]
        token: String,
    },
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

fn print_grant(event: &GrantEvent) {
    println!("{} +{} XP  {} (x{:.2})", event.icon, event.amount, event.name, event.multiplier);
    if event.leveled_up() {
        println!("   ⬆ Уровень {}!", event.level_after);
    }
    if let Some(rank) = event.new_rank {
        println!("   {} Новый ранг: {}", rank.icon, rank.name);
    }
    if let Some(err) = &event.persist_error {
        eprintln!("   warning: {}", err);
    }
}

fn print_login(report: &Option<LoginReport>) {
    match report {
        Some(report) => {
            if report.streak_reset {
                println!("Серия прервана, начинаем заново.");
            }
            println!("📅 День {} подряд", report.streak);
            report.grants.iter().for_each(print_grant);
        }
        None => println!("Ежедневный бонус уже получен сегодня."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = cli.settings.engine_config()?;

    if let Some(Commands::Bot { token }) = &cli.command {
        println!("Starting Telegram bot...");
        println!("База данных: {}", cli.settings.db);
        return shengji::bot::run_bot(token.clone(), &cli.settings.db, config).await;
    }

    let db = Database::open(&cli.settings.db)?;
    let mut tracker = Tracker::open(db, config)?;

    match cli.command {
        Some(Commands::Status) => {
            let data = tracker.level_data();
            let stats = tracker.stats();
            println!("{} {} - уровень {}", data.rank_icon, data.rank, data.level);
            println!("{:-<40}", "");
            println!("XP: {}/{} ({:.1}%)", data.current_xp, data.required_xp, data.progress_percentage);
            println!("Всего XP: {}", data.total_xp);
            println!("Следующий ранг: {}", data.next_rank);
            println!("Серия входов: {}", tracker.engine().daily_streak());
            println!(
                "Тренировок: {} (серия {}, лучшая {}), за неделю {}/{}",
                stats.total_workouts, stats.current_streak, stats.longest_streak, stats.weekly_completed, stats.weekly_goal
            );
            for m in tracker.active_multipliers(now()) {
                let until = m
                    .expires_at
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_else(|| "∞".to_string());
                println!("x{} {} (до {})", m.factor, m.description, until);
            }
        }

        Some(Commands::Login) => {
            let day = tracker.start_day(now())?;
            print_login(&day.login);
            for a in &day.achievements.unlocked {
                println!("🎉 {} {}", a.icon, a.title);
            }
            day.grants.iter().for_each(print_grant);
        }

        Some(Commands::Grant { source, multiplier }) => {
            let event = tracker.grant(&source.to_uppercase(), multiplier, now())?;
            print_grant(&event);
        }

        Some(Commands::Workout { name, minutes, calories }) => {
            let ended_at = now();
            let session = WorkoutSession::completed(name, minutes, calories, ended_at);
            let report = tracker.complete_workout(session, ended_at)?;

            println!("Записано! (id: {})", report.session_id);
            report.grants.iter().for_each(print_grant);
            for a in &report.achievements.unlocked {
                println!("🎉 {} {} ({}, {} очков)", a.icon, a.title, a.rarity.label(), a.points);
            }
            for a in &report.achievements.lost {
                println!("😔 {} {} - {}", a.icon, a.title, a.lose_condition.unwrap_or_default());
            }
            println!("Итого: +{} XP", report.total_xp());
        }

        Some(Commands::Social { action }) => {
            let action = SocialAction::parse(&action)
                .with_context(|| format!("unknown social action {} (like, comment, share, friend)", action))?;
            let event = tracker.social_interaction(action, now())?;
            print_grant(&event);
        }

        Some(Commands::Friends { count }) => {
            let (report, grants) = tracker.update_social_progress(SocialProgress::Friends, count, now())?;
            for a in &report.unlocked {
                println!("🎉 {} {}", a.icon, a.title);
            }
            grants.iter().for_each(print_grant);
        }

        Some(Commands::Challenge { position, wins }) => {
            let ts = now();
            print_grant(&tracker.challenge_complete(position, ts)?);
            if let Some(wins) = wins {
                let (report, grants) = tracker.update_social_progress(SocialProgress::Challenges, wins, ts)?;
                for a in &report.unlocked {
                    println!("🎉 {} {}", a.icon, a.title);
                }
                grants.iter().for_each(print_grant);
            }
        }

        Some(Commands::Boost { kind, factor, minutes, description }) => {
            let kind = MultiplierKind::parse(&kind).with_context(|| format!("unknown multiplier kind {}", kind))?;
            tracker.add_multiplier(kind, factor, minutes, &description, now())?;
            println!("x{} {} активирован", factor, description);
        }

        Some(Commands::History { limit }) => {
            println!("Recent XP:");
            println!("{:-<60}", "");
            for g in tracker.engine().ledger().recent(limit).into_iter().rev() {
                println!(
                    "{} | {} {:28} | +{:>5} | x{:.2}",
                    g.timestamp.format("%Y-%m-%d %H:%M"),
                    g.icon,
                    g.name,
                    g.amount,
                    g.multiplier
                );
            }
        }

        Some(Commands::Achievements) => {
            let book = tracker.achievements();
            let summary = book.summary();
            println!(
                "Достижения: {}/{} ({}%), очков: {}",
                summary.unlocked, summary.total, summary.percentage, summary.points
            );
            println!("{:-<60}", "");
            for a in ACHIEVEMENTS {
                let p = book.progress(a.id);
                let mark = if p.unlocked { "✔" } else { " " };
                println!(
                    "[{}] {} {:24} {:>5}/{:<5} {}",
                    mark, a.icon, a.title, p.current_progress.min(a.requirement), a.requirement, a.category.name()
                );
            }
        }

        Some(Commands::Chart { period }) => {
            let period: ChartPeriod = period.parse()?;
            let data = tracker.chart(period, now())?;
            let max = data.iter().copied().max().unwrap_or(0).max(1);
            for (i, count) in data.iter().enumerate() {
                let bar = "█".repeat((*count as usize * 20) / max as usize);
                println!("{:>2} | {:20} {}", i + 1, bar, count);
            }
        }

        Some(Commands::Export) => {
            println!("{}", tracker.export_json()?);
        }

        Some(Commands::Import { file }) => {
            let json = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file))?;
            let count = tracker.import_json(&json)?;
            println!("Импортировано тренировок: {}", count);
        }

        Some(Commands::Tui) | None => {
            // Default: show TUI
            let mut app = App::new(tracker)?;
            app.run()?;
        }

        Some(Commands::Bot { .. }) => unreachable!("handled before opening the database"),
    }

    Ok(())
}
