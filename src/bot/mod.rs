//! Telegram bot module - Remote workout logging, level summaries and daily reminders

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, Timelike};
use teloxide::{
    dispatching::dialogue::{Dialogue, InMemStorage},
    prelude::*,
    types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup},
    utils::command::BotCommands,
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::achievements::{ACHIEVEMENTS, AchievementBook, AchievementReport};
use crate::config::EngineConfig;
use crate::db::Database;
use crate::level::{GrantEvent, LevelData, LoginReport, Multiplier};
use crate::tracker::{Tracker, WorkoutReport};
use crate::workouts::{WorkoutSession, worked_out_on};

type MyDialogue = Dialogue<State, InMemStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type Subscribers = Arc<Mutex<HashSet<ChatId>>>;
type SharedTracker = Arc<Mutex<Tracker<Database>>>;

/// How often the reminder loop wakes up
const REMINDER_INTERVAL_SECS: u64 = 3600;
/// Local hour at which the daily reminder goes out
const REMINDER_HOUR: u32 = 18;

const MAX_MINUTES: u32 = 600;
const MAX_CALORIES: u32 = 5000;
const DEFAULT_WORKOUT_NAME: &str = "Тренировка";
const HISTORY_LINES: usize = 10;

#[derive(Clone, Default)]
pub enum State {
    #[default]
    Start,
    /// Waiting for workout duration
    WaitingForMinutes { name: String },
    /// Waiting for burned calories
    WaitingForCalories { name: String, minutes: u32 },
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Команды бота:")]
pub enum Command {
    #[command(description = "Ежедневный бонус и сводка")]
    Start,
    #[command(description = "Показать помощь")]
    Help,
    #[command(description = "Уровень и ранг")]
    Level,
    #[command(description = "Последние начисления XP")]
    History,
    #[command(description = "Записать тренировку")]
    Workout(String),
    #[command(description = "Достижения")]
    Achievements,
    #[command(description = "Активные бонусы")]
    Boosts,
    #[command(description = "Включить ежедневное напоминание")]
    Remind,
    #[command(description = "Выключить напоминания")]
    Stop,
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

fn parse_minutes(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok().filter(|m| (1..=MAX_MINUTES).contains(m))
}

fn parse_calories(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok().filter(|c| *c <= MAX_CALORIES)
}

/// Quick picks for the workout duration
fn make_minutes_keyboard() -> InlineKeyboardMarkup {
    let buttons: Vec<Vec<InlineKeyboardButton>> = [15, 30, 45, 60, 90, 120]
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .map(|m| InlineKeyboardButton::callback(format!("{} мин", m), format!("min:{}", m)))
                .collect()
        })
        .collect();

    InlineKeyboardMarkup::new(buttons)
}

fn format_grants(grants: &[GrantEvent]) -> String {
    let mut text = String::new();
    for g in grants {
        text.push_str(&format!("{} +{} XP {}", g.icon, g.amount, g.name));
        if g.multiplier != 1.0 {
            text.push_str(&format!(" (x{:.2})", g.multiplier));
        }
        text.push('\n');
        if g.leveled_up() {
            text.push_str(&format!("⬆️ Уровень {}!\n", g.level_after));
        }
        if let Some(rank) = g.new_rank {
            text.push_str(&format!("{} Новый ранг: {}\n", rank.icon, rank.name));
        }
    }
    text
}

fn format_level(data: &LevelData, streak: u32) -> String {
    format!(
        "{} {}\n\
        Уровень {}\n\
        XP: {}/{} ({:.0}%)\n\
        Всего XP: {}\n\
        Следующий ранг: {}\n\
        Серия входов: {} дн.",
        data.rank_icon,
        data.rank,
        data.level,
        data.current_xp,
        data.required_xp,
        data.progress_percentage,
        data.total_xp,
        data.next_rank,
        streak
    )
}

fn format_achievement_changes(report: &AchievementReport) -> String {
    let mut text = String::new();
    for a in &report.unlocked {
        text.push_str(&format!("🎉 {} {} ({})\n", a.icon, a.title, a.rarity.label()));
    }
    for a in &report.lost {
        text.push_str(&format!("😔 Потеряно: {} {}\n", a.icon, a.title));
    }
    text
}

fn format_login(login: &Option<LoginReport>) -> String {
    match login {
        Some(report) => {
            let mut text = String::new();
            if report.streak_reset {
                text.push_str("Серия входов прервана, начинаем заново.\n");
            }
            text.push_str(&format!("📅 День {} подряд\n", report.streak));
            text.push_str(&format_grants(&report.grants));
            text
        }
        None => "Ежедневный бонус уже получен.\n".to_string(),
    }
}

fn format_boosts(multipliers: &[Multiplier]) -> String {
    if multipliers.is_empty() {
        return "Нет активных бонусов.".to_string();
    }
    let mut text = String::from("⚡ Активные бонусы:\n\n");
    for m in multipliers {
        let until = m
            .expires_at
            .map(|t| format!("до {}", t.format("%H:%M")))
            .unwrap_or_else(|| "без срока".to_string());
        text.push_str(&format!("• x{} {} ({})\n", m.factor, m.description, until));
    }
    text
}

fn format_achievements(book: &AchievementBook) -> String {
    let summary = book.summary();
    let mut text = format!(
        "🏅 Достижения: {}/{} ({}%)\nОчки: {}\n\n",
        summary.unlocked, summary.total, summary.percentage, summary.points
    );
    for a in ACHIEVEMENTS {
        let progress = book.progress(a.id);
        let mark = if progress.unlocked { "✅" } else { "▫️" };
        text.push_str(&format!(
            "{} {} {} {}/{}\n",
            mark,
            a.icon,
            a.title,
            progress.current_progress.min(a.requirement),
            a.requirement
        ));
    }
    text
}

fn format_workout(report: &WorkoutReport) -> String {
    let mut text = String::from("Записано!\n\n");
    text.push_str(&format_grants(&report.grants));
    text.push_str(&format_achievement_changes(&report.achievements));
    text.push_str(&format!(
        "\nИтого: +{} XP\nСерия тренировок: {} дн.\nЗа неделю: {}/{}\n\n/workout - ещё",
        report.total_xp(),
        report.stats.current_streak,
        report.stats.weekly_completed,
        report.stats.weekly_goal
    ));
    text
}

/// Background task that reminds subscribers once a day if they have not trained yet
async fn reminder_task(bot: Bot, subscribers: Subscribers, tracker: SharedTracker) {
    info!(
        "Reminder task started (check every {} seconds, send at {}:00)",
        REMINDER_INTERVAL_SECS, REMINDER_HOUR
    );

    loop {
        tokio::time::sleep(Duration::from_secs(REMINDER_INTERVAL_SECS)).await;

        let now = now();
        if now.hour() != REMINDER_HOUR {
            continue;
        }

        let trained = {
            let tracker = tracker.lock().await;
            match tracker.workouts() {
                Ok(history) => worked_out_on(&history, now.date_naive()),
                Err(e) => {
                    warn!("Reminder check failed: {:#}", e);
                    false
                }
            }
        };
        if trained {
            continue;
        }

        let subs = subscribers.lock().await;
        if subs.is_empty() {
            continue;
        }

        info!("Sending reminders to {} subscribers", subs.len());
        for chat_id in subs.iter() {
            let result = bot
                .send_message(*chat_id, "⏰ Сегодня ещё не было тренировки!\n\nНе теряй серию: /workout")
                .reply_markup(make_minutes_keyboard())
                .await;

            if let Err(e) = result {
                error!("Failed to send reminder to {}: {}", chat_id, e);
            }
        }
    }
}

/// Start the Telegram bot with reminders
pub async fn run_bot(token: String, db_path: &str, config: EngineConfig) -> anyhow::Result<()> {
    let bot = Bot::new(token);
    let tracker: SharedTracker = Arc::new(Mutex::new(Tracker::open(Database::open(db_path)?, config)?));
    let subscribers: Subscribers = Arc::new(Mutex::new(HashSet::new()));

    // Start reminder background task
    let reminder_bot = bot.clone();
    let reminder_subs = subscribers.clone();
    let reminder_tracker = tracker.clone();
    tokio::spawn(async move {
        reminder_task(reminder_bot, reminder_subs, reminder_tracker).await;
    });

    let handler = dptree::entry()
        .enter_dialogue::<Update, InMemStorage<State>, State>()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![InMemStorage::<State>::new(), tracker, subscribers])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: MyDialogue,
    tracker: SharedTracker,
    subscribers: Subscribers,
) -> HandlerResult {
    match cmd {
        Command::Start => {
            let text = {
                let mut tracker = tracker.lock().await;
                let day = tracker.start_day(now())?;
                let mut text = String::from("升级 shengji\n\n");
                text.push_str(&format_login(&day.login));
                text.push_str(&format_achievement_changes(&day.achievements));
                text.push_str(&format_grants(&day.grants));
                text.push('\n');
                text.push_str(&format_level(&tracker.level_data(), tracker.engine().daily_streak()));
                text.push_str("\n\n/workout - записать тренировку\n/help - все команды");
                text
            };
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }

        Command::Level => {
            let text = {
                let tracker = tracker.lock().await;
                format_level(&tracker.level_data(), tracker.engine().daily_streak())
            };
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::History => {
            let text = {
                let tracker = tracker.lock().await;
                let recent = tracker.engine().ledger().recent(HISTORY_LINES);
                if recent.is_empty() {
                    "Начислений пока нет. Жми /workout!".to_string()
                } else {
                    let mut text = String::from("📊 Последние начисления:\n\n");
                    for g in recent.into_iter().rev() {
                        text.push_str(&format!(
                            "{} {} +{} XP {}\n",
                            g.timestamp.format("%d.%m %H:%M"),
                            g.icon,
                            g.amount,
                            g.name
                        ));
                    }
                    text
                }
            };
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Workout(name) => {
            let name = match name.trim() {
                "" => DEFAULT_WORKOUT_NAME.to_string(),
                other => other.to_string(),
            };
            bot.send_message(msg.chat.id, format!("🏋️ {}\n\nСколько минут длилась тренировка?", name))
                .reply_markup(make_minutes_keyboard())
                .await?;
            dialogue.update(State::WaitingForMinutes { name }).await?;
        }

        Command::Achievements => {
            let text = {
                let tracker = tracker.lock().await;
                format_achievements(tracker.achievements())
            };
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Boosts => {
            let text = {
                let mut tracker = tracker.lock().await;
                format_boosts(tracker.active_multipliers(now()))
            };
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Remind => {
            let count = {
                let mut subs = subscribers.lock().await;
                subs.insert(msg.chat.id);
                subs.len()
            };

            bot.send_message(
                msg.chat.id,
                format!(
                    "✅ Напоминания включены!\n\n\
                    Напомню в {}:00, если тренировки ещё не было.\n\
                    /stop - выключить\n\n\
                    Активных подписчиков: {}",
                    REMINDER_HOUR, count
                ),
            )
            .await?;

            info!("User {} subscribed to reminders", msg.chat.id);
        }

        Command::Stop => {
            let was_subscribed = subscribers.lock().await.remove(&msg.chat.id);

            if was_subscribed {
                bot.send_message(msg.chat.id, "🔕 Напоминания выключены.\n\n/remind - включить снова")
                    .await?;
                info!("User {} unsubscribed from reminders", msg.chat.id);
            } else {
                bot.send_message(msg.chat.id, "Напоминания и так выключены.\n\n/remind - включить")
                    .await?;
            }
        }
    }

    Ok(())
}

async fn handle_callback(bot: Bot, q: CallbackQuery, dialogue: MyDialogue) -> HandlerResult {
    let state = dialogue.get().await?.unwrap_or_default();

    if let Some(minutes) = q.data.as_deref().and_then(|d| d.strip_prefix("min:")).and_then(parse_minutes) {
        // Reminder buttons arrive without a running dialogue
        let name = match state {
            State::WaitingForMinutes { name } => name,
            _ => DEFAULT_WORKOUT_NAME.to_string(),
        };
        dialogue.update(State::WaitingForCalories { name: name.clone(), minutes }).await?;

        if let Some(msg) = q.message {
            bot.edit_message_text(
                msg.chat().id,
                msg.id(),
                format!("🏋️ {} - {} мин\n\nСколько калорий сожжено? (0 если не знаешь)", name, minutes),
            )
            .await?;
        }
    }

    bot.answer_callback_query(q.id).await?;
    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, dialogue: MyDialogue, tracker: SharedTracker) -> HandlerResult {
    let state = dialogue.get().await?.unwrap_or_default();
    let Some(text) = msg.text() else {
        return Ok(());
    };

    match state {
        State::WaitingForMinutes { name } => match parse_minutes(text) {
            Some(minutes) => {
                dialogue.update(State::WaitingForCalories { name, minutes }).await?;
                bot.send_message(msg.chat.id, "Сколько калорий сожжено? (0 если не знаешь)")
                    .await?;
            }
            None => {
                bot.send_message(msg.chat.id, format!("Введи минуты (1-{})", MAX_MINUTES))
                    .await?;
            }
        },

        State::WaitingForCalories { name, minutes } => match parse_calories(text) {
            Some(calories) => {
                let ended_at = now();
                let session = WorkoutSession::completed(name, minutes, calories, ended_at);
                let report = tracker.lock().await.complete_workout(session, ended_at)?;

                bot.send_message(msg.chat.id, format_workout(&report)).await?;
                dialogue.reset().await?;
            }
            None => {
                bot.send_message(msg.chat.id, format!("Введи калории (0-{})", MAX_CALORIES))
                    .await?;
            }
        },

        State::Start => {
            // Unknown message, suggest /workout
            bot.send_message(msg.chat.id, "Жми /workout чтобы записать тренировку")
                .await?;
        }
    }

    Ok(())
}
