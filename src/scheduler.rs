//! Reminder scan loops.
//!
//! Each loop periodically walks a snapshot of tasks or notes taken when it
//! was scheduled and decides, tick by tick, which notifications to deliver.
//! Scheduling a loop again cancels the previous instance and starts over
//! with the new snapshot; loops run until stopped.
//!
//! The evaluation of a single tick is a pure function of the snapshot and
//! the current time (`upcoming_task_alerts`, `backlog_alert`,
//! `note_reminder_alerts`) so it can be exercised without a runtime.
use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::{at_clock, preview, Lifetime, Note, Notification, NotificationConfig, Notifier, Task};

/// Tag of the aggregate backlog notification
pub const BACKLOG_TAG: &str = "hourly-reminder";

/// The fields of a task the scan loops look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<String>,
}

impl From<&Task> for TaskSnapshot {
    fn from(task: &Task) -> Self {
        TaskSnapshot {
            id: task.id.clone(),
            title: task.title.clone(),
            completed: task.completed,
            created_at: task.created_at,
            scheduled_date: task.scheduled_date,
            scheduled_time: task.scheduled_time.clone(),
        }
    }
}

/// The fields of a note the reminder loop looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSnapshot {
    pub id: String,
    pub title: String,
    pub content: String,
    pub reminder_date: Option<NaiveDate>,
    pub reminder_time: Option<String>,
}

impl From<&Note> for NoteSnapshot {
    fn from(note: &Note) -> Self {
        NoteSnapshot {
            id: note.id.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
            reminder_date: note.reminder_date,
            reminder_time: note.reminder_time.clone(),
        }
    }
}

/// Resolves an optional date + "HH:MM" pair in `now`'s time zone.
///
/// `None` when either part is missing or the clock is malformed; the latter
/// is logged and the item is skipped for this tick.
fn resolve_moment<Tz: TimeZone>(
    now: &DateTime<Tz>,
    date: Option<NaiveDate>,
    clock: Option<&str>,
    item: &str,
) -> Option<DateTime<Tz>> {
    let (date, clock) = (date?, clock?);
    match at_clock(&now.timezone(), date, clock) {
        Ok(at) => Some(at),
        Err(e) => {
            warn!("Skipping {} this tick: {}", item, e);
            None
        }
    }
}

fn minutes_between<Tz: TimeZone>(from: &DateTime<Tz>, to: &DateTime<Tz>) -> i64 {
    let seconds = to.clone().signed_duration_since(from.clone()).num_seconds();
    (seconds as f64 / 60.0).round() as i64
}

/// Upcoming-task tick: one notification per incomplete task due within
/// `(now, now + window]`.
pub fn upcoming_task_alerts<Tz: TimeZone>(
    tasks: &[TaskSnapshot],
    now: &DateTime<Tz>,
    window: chrono::Duration,
) -> Vec<Notification> {
    let Some(horizon) = now.clone().checked_add_signed(window) else {
        warn!("Look-ahead window {} is out of range", window);
        return Vec::new();
    };

    tasks
        .iter()
        .filter(|task| !task.completed)
        .filter_map(|task| {
            let due = resolve_moment(
                now,
                task.scheduled_date,
                task.scheduled_time.as_deref(),
                &format!("task {}", task.id),
            )?;
            if due > *now && due <= horizon {
                let minutes = minutes_between(now, &due);
                Some(
                    Notification::new(
                        "Upcoming Task",
                        format!("\"{}\" is due in {} minutes", task.title, minutes),
                    )
                    .with_tag(format!("upcoming-{}", task.id)),
                )
            } else {
                None
            }
        })
        .collect()
}

/// Backlog tick: a single notification listing every incomplete task whose
/// effective date (scheduled date, else local creation date) is today.
pub fn backlog_alert<Tz: TimeZone>(tasks: &[TaskSnapshot], now: &DateTime<Tz>) -> Option<Notification> {
    let tz = now.timezone();
    let today = now.date_naive();

    let pending: Vec<&TaskSnapshot> = tasks
        .iter()
        .filter(|task| !task.completed)
        .filter(|task| {
            let date = task
                .scheduled_date
                .unwrap_or_else(|| task.created_at.with_timezone(&tz).date_naive());
            date == today
        })
        .collect();

    if pending.is_empty() {
        return None;
    }

    let list = pending
        .iter()
        .map(|task| format!("• {}", task.title))
        .collect::<Vec<_>>()
        .join("\n");

    Some(
        Notification::new(
            "Task Reminder",
            format!(
                "You have {} incomplete task(s) for today:\n{}",
                pending.len(),
                list
            ),
        )
        .with_tag(BACKLOG_TAG),
    )
}

/// Note reminder tick: one notification per note whose reminder falls in
/// `(now, now + window]`.
pub fn note_reminder_alerts<Tz: TimeZone>(
    notes: &[NoteSnapshot],
    now: &DateTime<Tz>,
    window: chrono::Duration,
) -> Vec<Notification> {
    let Some(horizon) = now.clone().checked_add_signed(window) else {
        warn!("Look-ahead window {} is out of range", window);
        return Vec::new();
    };

    notes
        .iter()
        .filter_map(|note| {
            let at = resolve_moment(
                now,
                note.reminder_date,
                note.reminder_time.as_deref(),
                &format!("note {}", note.id),
            )?;
            if at > *now && at <= horizon {
                Some(
                    Notification::new(
                        "Note Reminder",
                        format!("\"{}\" - {}", note.title, preview(&note.content, 50)),
                    )
                    .with_tag(format!("note-reminder-{}", note.id)),
                )
            } else {
                None
            }
        })
        .collect()
}

/// Alert raised when an overdue task is observed.
pub fn overdue_alert<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> Option<Notification> {
    task.is_overdue(now).then(|| {
        Notification::new("Task Overdue", format!("Task \"{}\" is overdue", task.title))
    })
}

/// Feedback shown right after a task is checked off.
pub fn completion_alert(task: &Task) -> Notification {
    Notification::new(
        "Task Completed! 🎉",
        format!("Great job completing \"{}\"", task.title),
    )
}

/// The independent scan loops owned by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    UpcomingTasks,
    HourlyBacklog,
    NoteReminders,
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopKind::UpcomingTasks => "upcoming-task",
            LoopKind::HourlyBacklog => "hourly-backlog",
            LoopKind::NoteReminders => "note-reminder",
        };
        f.write_str(name)
    }
}

/// Lifecycle of one loop: `Idle -> Scheduled -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    /// Never scheduled
    Idle,
    Scheduled,
    Cancelled,
}

#[derive(Debug, Clone)]
enum LoopCommand {
    /// Run a scan immediately, outside the period
    ScanNow,
    Stop,
}

struct ScanLoop {
    command_tx: mpsc::Sender<LoopCommand>,
    task: JoinHandle<()>,
}

/// Owns the reminder loops and their lifecycle.
pub struct NotificationScheduler {
    notifier: Notifier,
    config: NotificationConfig,
    loops: HashMap<LoopKind, ScanLoop>,
    status: HashMap<LoopKind, LoopStatus>,
}

impl NotificationScheduler {
    pub fn new(notifier: Notifier, config: NotificationConfig) -> Self {
        info!(
            "Initializing notification scheduler (fire_once: {})",
            config.fire_once
        );
        Self {
            notifier,
            config,
            loops: HashMap::new(),
            status: HashMap::new(),
        }
    }

    /// Restarts the upcoming-task loop over `tasks`.
    pub async fn schedule_upcoming_tasks(&mut self, tasks: Vec<TaskSnapshot>) {
        let window = self.config.upcoming_window();
        let tasks: Arc<[TaskSnapshot]> = tasks.into();
        self.schedule(
            LoopKind::UpcomingTasks,
            self.config.upcoming_interval(),
            move |now| upcoming_task_alerts(&tasks, &now, window),
        )
        .await;
    }

    /// Restarts the hourly backlog loop over `tasks`.
    pub async fn schedule_hourly_backlog(&mut self, tasks: Vec<TaskSnapshot>) {
        let tasks: Arc<[TaskSnapshot]> = tasks.into();
        self.schedule(
            LoopKind::HourlyBacklog,
            self.config.backlog_interval(),
            move |now| backlog_alert(&tasks, &now).into_iter().collect(),
        )
        .await;
    }

    /// Restarts the note reminder loop over `notes`.
    pub async fn schedule_note_reminders(&mut self, notes: Vec<NoteSnapshot>) {
        debug!("Scheduling note reminders for {} notes", notes.len());
        let window = self.config.reminder_window();
        let notes: Arc<[NoteSnapshot]> = notes.into();
        self.schedule(
            LoopKind::NoteReminders,
            self.config.reminder_interval(),
            move |now| note_reminder_alerts(&notes, &now, window),
        )
        .await;
    }

    async fn schedule<F>(&mut self, kind: LoopKind, period: Duration, mut evaluate: F)
    where
        F: FnMut(DateTime<Local>) -> Vec<Notification> + Send + 'static,
    {
        self.stop(kind).await;

        let (command_tx, mut command_rx) = mpsc::channel(4);
        let notifier = self.notifier.clone();
        let fire_once = self.config.fire_once;

        let task = tokio::spawn(async move {
            let mut fired: HashSet<String> = HashSet::new();
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await; // Initial tick

            let mut scan = |reason: &str| {
                let alerts = evaluate(Local::now());
                debug!("{} scan ({}) produced {} alerts", kind, reason, alerts.len());
                for alert in alerts {
                    if fire_once {
                        if let Some(tag) = &alert.tag {
                            if !fired.insert(tag.clone()) {
                                debug!("Suppressing repeat of {}", tag);
                                continue;
                            }
                        }
                    }
                    notifier.deliver(alert, Lifetime::Scheduled);
                }
            };

            loop {
                tokio::select! {
                    biased;
                    cmd = command_rx.recv() => match cmd {
                        Some(LoopCommand::ScanNow) => scan("manual"),
                        Some(LoopCommand::Stop) | None => {
                            debug!("{} loop stopping...", kind);
                            break;
                        }
                    },
                    _ = interval.tick() => scan("tick"),
                }
            }
        });

        self.loops.insert(kind, ScanLoop { command_tx, task });
        self.status.insert(kind, LoopStatus::Scheduled);
        info!("Scheduled {} loop every {:?}", kind, period);
    }

    /// Cancels one loop. No tick of that loop fires after this returns.
    pub async fn stop(&mut self, kind: LoopKind) {
        let Some(scan_loop) = self.loops.remove(&kind) else {
            debug!("{} loop is not running", kind);
            return;
        };

        if let Err(e) = scan_loop.command_tx.send(LoopCommand::Stop).await {
            debug!("{} loop already gone: {}", kind, e);
        }
        if let Err(e) = scan_loop.task.await {
            error!("Failed to stop {} loop: {}", kind, e);
        }

        self.status.insert(kind, LoopStatus::Cancelled);
        info!("{} loop cancelled", kind);
    }

    pub async fn stop_all(&mut self) {
        for kind in [
            LoopKind::HourlyBacklog,
            LoopKind::UpcomingTasks,
            LoopKind::NoteReminders,
        ] {
            self.stop(kind).await;
        }
    }

    /// Runs a scan of a scheduled loop right away. Returns false when the
    /// loop is not scheduled.
    pub async fn scan_now(&self, kind: LoopKind) -> bool {
        match self.loops.get(&kind) {
            Some(scan_loop) => scan_loop.command_tx.send(LoopCommand::ScanNow).await.is_ok(),
            None => false,
        }
    }

    pub fn status(&self, kind: LoopKind) -> LoopStatus {
        self.status.get(&kind).copied().unwrap_or(LoopStatus::Idle)
    }

    /// Number of loops currently alive.
    pub fn active_loops(&self) -> usize {
        self.loops.len()
    }
}

impl Drop for NotificationScheduler {
    fn drop(&mut self) {
        for (_, scan_loop) in self.loops.drain() {
            scan_loop.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, FixedOffset};

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        tz().with_ymd_and_hms(2026, 6, 10, 9, 0, 0).unwrap()
    }

    fn task(id: &str, title: &str) -> TaskSnapshot {
        TaskSnapshot {
            id: id.to_string(),
            title: title.to_string(),
            completed: false,
            created_at: Utc::now(),
            scheduled_date: None,
            scheduled_time: None,
        }
    }

    fn scheduled(id: &str, date: NaiveDate, time: &str) -> TaskSnapshot {
        TaskSnapshot {
            scheduled_date: Some(date),
            scheduled_time: Some(time.to_string()),
            ..task(id, id)
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 10).unwrap()
    }

    #[test]
    fn upcoming_fires_inside_window_only() {
        let tasks = vec![
            scheduled("soon", today(), "09:30"),
            scheduled("now", today(), "09:00"),
            scheduled("edge", today(), "10:00"),
            scheduled("late", today(), "10:01"),
            scheduled("past", today(), "08:00"),
            TaskSnapshot {
                scheduled_time: None,
                ..scheduled("dateonly", today(), "09:10")
            },
        ];

        let alerts = upcoming_task_alerts(&tasks, &now(), ChronoDuration::minutes(60));
        let tags: Vec<_> = alerts.iter().filter_map(|a| a.tag.as_deref()).collect();
        assert_eq!(tags, vec!["upcoming-soon", "upcoming-edge"]);
        assert_eq!(alerts[0].body, "\"soon\" is due in 30 minutes");
    }

    #[test]
    fn upcoming_skips_completed_and_malformed() {
        let mut done = scheduled("done", today(), "09:15");
        done.completed = true;
        let broken = scheduled("broken", today(), "nine");
        let ok = scheduled("ok", today(), "09:20");

        let alerts = upcoming_task_alerts(&[done, broken, ok], &now(), ChronoDuration::minutes(60));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].tag.as_deref(), Some("upcoming-ok"));
    }

    #[test]
    fn out_of_range_window_yields_nothing() {
        let window = ChronoDuration::days(365 * 1_000_000);
        let tasks = [scheduled("ok", today(), "09:20")];
        assert!(upcoming_task_alerts(&tasks, &now(), window).is_empty());

        let note = NoteSnapshot {
            id: "n".to_string(),
            title: "n".to_string(),
            content: String::new(),
            reminder_date: Some(today()),
            reminder_time: Some("09:05".to_string()),
        };
        assert!(note_reminder_alerts(&[note], &now(), window).is_empty());
    }

    #[test]
    fn backlog_lists_only_incomplete_tasks_for_today() {
        let a = scheduled("a", today(), "12:00");
        let b = TaskSnapshot {
            scheduled_date: today().succ_opt(),
            ..task("b", "b")
        };
        let mut c = scheduled("c", today(), "13:00");
        c.completed = true;
        // Unscheduled, created this morning local time
        let d = TaskSnapshot {
            created_at: now().with_timezone(&Utc) - ChronoDuration::hours(2),
            ..task("d", "d")
        };

        let alert = backlog_alert(&[a, b, c, d], &now()).unwrap();
        assert_eq!(alert.tag.as_deref(), Some(BACKLOG_TAG));
        assert_eq!(
            alert.body,
            "You have 2 incomplete task(s) for today:\n• a\n• d"
        );
    }

    #[test]
    fn backlog_uses_local_creation_date() {
        // 23:30 UTC the previous day is 00:30 local
        let created = Utc.with_ymd_and_hms(2026, 6, 9, 23, 30, 0).unwrap();
        let t = TaskSnapshot {
            created_at: created,
            ..task("x", "x")
        };
        assert!(backlog_alert(&[t], &now()).is_some());
        assert!(backlog_alert(&[], &now()).is_none());
    }

    #[test]
    fn note_reminder_window_and_preview() {
        let long = "x".repeat(60);
        let notes = vec![
            NoteSnapshot {
                id: "n1".to_string(),
                title: "Call mom".to_string(),
                content: long,
                reminder_date: Some(today()),
                reminder_time: Some("09:10".to_string()),
            },
            NoteSnapshot {
                id: "n2".to_string(),
                title: "Later".to_string(),
                content: String::new(),
                reminder_date: Some(today()),
                reminder_time: Some("09:11".to_string()),
            },
            NoteSnapshot {
                id: "n3".to_string(),
                title: "No time".to_string(),
                content: String::new(),
                reminder_date: Some(today()),
                reminder_time: None,
            },
        ];

        let alerts = note_reminder_alerts(&notes, &now(), ChronoDuration::minutes(10));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].tag.as_deref(), Some("note-reminder-n1"));
        assert_eq!(alerts[0].body, format!("\"Call mom\" - {}...", "x".repeat(50)));
    }

    #[test]
    fn completion_and_overdue_messages() {
        let mut t = Task::new(crate::TaskDraft::titled("Ship it"));
        assert_eq!(completion_alert(&t).body, "Great job completing \"Ship it\"");

        t.scheduled_date = Some(today());
        t.scheduled_time = Some("08:00".to_string());
        let alert = overdue_alert(&t, &now()).unwrap();
        assert_eq!(alert.title, "Task Overdue");
        assert!(alert.tag.is_none());

        t.scheduled_time = Some("10:00".to_string());
        assert!(overdue_alert(&t, &now()).is_none());
    }

    #[tokio::test]
    async fn status_follows_lifecycle() {
        let surface = crate::MemorySurface::granted();
        let notifier = Notifier::new(Arc::new(surface), &NotificationConfig::default());
        let mut scheduler = NotificationScheduler::new(notifier, NotificationConfig::default());

        assert_eq!(scheduler.status(LoopKind::UpcomingTasks), LoopStatus::Idle);
        scheduler.schedule_upcoming_tasks(vec![]).await;
        assert_eq!(scheduler.status(LoopKind::UpcomingTasks), LoopStatus::Scheduled);
        assert!(scheduler.scan_now(LoopKind::UpcomingTasks).await);
        assert!(!scheduler.scan_now(LoopKind::NoteReminders).await);

        scheduler.stop_all().await;
        assert_eq!(scheduler.status(LoopKind::UpcomingTasks), LoopStatus::Cancelled);
        assert_eq!(scheduler.status(LoopKind::NoteReminders), LoopStatus::Idle);
        assert_eq!(scheduler.active_loops(), 0);
    }
}
