use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use focusdesk::{
    LoopKind, LoopStatus, MemorySurface, NoteSnapshot, NotificationConfig, NotificationScheduler,
    Notifier, PermissionState, TaskSnapshot,
};
use tokio::time::sleep;

fn scheduler_with(
    surface: &MemorySurface,
    config: NotificationConfig,
) -> NotificationScheduler {
    let notifier = Notifier::new(Arc::new(surface.clone()), &config);
    NotificationScheduler::new(notifier, config)
}

/// Local date and "HH:MM" a little less than `minutes` from now.
fn due_in(minutes: i64) -> (NaiveDate, String) {
    let at = Local::now() + chrono::Duration::minutes(minutes);
    (at.date_naive(), at.format("%H:%M").to_string())
}

fn task_due_in(id: &str, minutes: i64) -> TaskSnapshot {
    let (date, time) = due_in(minutes);
    TaskSnapshot {
        id: id.to_string(),
        title: format!("Task {}", id),
        completed: false,
        created_at: chrono::Utc::now(),
        scheduled_date: Some(date),
        scheduled_time: Some(time),
    }
}

fn tags(surface: &MemorySurface) -> Vec<String> {
    surface
        .shown()
        .into_iter()
        .filter_map(|n| n.tag)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn upcoming_task_fires_one_period_after_scheduling() {
    let surface = MemorySurface::granted();
    let mut scheduler = scheduler_with(&surface, NotificationConfig::default());

    scheduler
        .schedule_upcoming_tasks(vec![task_due_in("a", 30), task_due_in("far", 180)])
        .await;

    sleep(Duration::from_secs(299)).await;
    assert!(surface.shown().is_empty());

    sleep(Duration::from_secs(2)).await;
    assert_eq!(tags(&surface), vec!["upcoming-a"]);
    assert_eq!(surface.shown()[0].title, "Upcoming Task");

    scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn repeated_ticks_fire_again_by_default() {
    let surface = MemorySurface::granted();
    let mut scheduler = scheduler_with(&surface, NotificationConfig::default());
    scheduler
        .schedule_upcoming_tasks(vec![task_due_in("a", 40)])
        .await;

    sleep(Duration::from_secs(601)).await;
    assert_eq!(tags(&surface), vec!["upcoming-a", "upcoming-a"]);
    scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn fire_once_suppresses_repeats_until_rescheduled() {
    let surface = MemorySurface::granted();
    let config = NotificationConfig {
        fire_once: true,
        ..Default::default()
    };
    let mut scheduler = scheduler_with(&surface, config);
    let tasks = vec![task_due_in("a", 40)];

    scheduler.schedule_upcoming_tasks(tasks.clone()).await;
    sleep(Duration::from_secs(601)).await;
    assert_eq!(surface.shown().len(), 1);

    // A fresh loop starts with an empty ledger
    scheduler.schedule_upcoming_tasks(tasks).await;
    sleep(Duration::from_secs(301)).await;
    assert_eq!(surface.shown().len(), 2);
    scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn rescheduling_keeps_a_single_loop() {
    let surface = MemorySurface::granted();
    let mut scheduler = scheduler_with(&surface, NotificationConfig::default());

    for _ in 0..3 {
        scheduler
            .schedule_upcoming_tasks(vec![task_due_in("a", 30)])
            .await;
    }
    assert_eq!(scheduler.active_loops(), 1);

    sleep(Duration::from_secs(301)).await;
    assert_eq!(surface.shown().len(), 1);
    scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn nothing_fires_after_stop() {
    let surface = MemorySurface::granted();
    let mut scheduler = scheduler_with(&surface, NotificationConfig::default());
    scheduler
        .schedule_upcoming_tasks(vec![task_due_in("a", 30)])
        .await;

    scheduler.stop(LoopKind::UpcomingTasks).await;
    assert_eq!(scheduler.status(LoopKind::UpcomingTasks), LoopStatus::Cancelled);

    sleep(Duration::from_secs(900)).await;
    assert!(surface.shown().is_empty());
}

#[tokio::test(start_paused = true)]
async fn denied_permission_delivers_nothing() {
    let surface = MemorySurface::new(PermissionState::Denied, PermissionState::Denied);
    let mut scheduler = scheduler_with(&surface, NotificationConfig::default());
    scheduler
        .schedule_upcoming_tasks(vec![task_due_in("a", 30)])
        .await;

    sleep(Duration::from_secs(301)).await;
    assert!(surface.shown().is_empty());
    scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn hourly_backlog_lists_todays_open_tasks() {
    let surface = MemorySurface::granted();
    let mut scheduler = scheduler_with(&surface, NotificationConfig::default());

    let mut done = task_due_in("done", 10);
    done.completed = true;
    let open = TaskSnapshot {
        id: "open".to_string(),
        title: "Water plants".to_string(),
        completed: false,
        created_at: chrono::Utc::now(),
        scheduled_date: None,
        scheduled_time: None,
    };
    scheduler.schedule_hourly_backlog(vec![done, open]).await;

    sleep(Duration::from_secs(3601)).await;
    let shown = surface.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].tag.as_deref(), Some("hourly-reminder"));
    assert_eq!(
        shown[0].body,
        "You have 1 incomplete task(s) for today:\n• Water plants"
    );
    scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn note_reminder_fires_inside_its_window() {
    let surface = MemorySurface::granted();
    let mut scheduler = scheduler_with(&surface, NotificationConfig::default());

    let (date, time) = due_in(5);
    let note = NoteSnapshot {
        id: "n1".to_string(),
        title: "Stand-up".to_string(),
        content: "Share the release notes".to_string(),
        reminder_date: Some(date),
        reminder_time: Some(time),
    };
    let undated = NoteSnapshot {
        id: "n2".to_string(),
        reminder_date: None,
        ..note.clone()
    };
    scheduler.schedule_note_reminders(vec![note, undated]).await;

    sleep(Duration::from_secs(61)).await;
    let shown = surface.shown();
    assert_eq!(tags(&surface), vec!["note-reminder-n1"]);
    assert_eq!(shown[0].body, "\"Stand-up\" - Share the release notes");
    scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn scan_now_runs_without_waiting_for_the_period() {
    let surface = MemorySurface::granted();
    let mut scheduler = scheduler_with(&surface, NotificationConfig::default());
    scheduler
        .schedule_upcoming_tasks(vec![task_due_in("a", 30)])
        .await;

    assert!(scheduler.scan_now(LoopKind::UpcomingTasks).await);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(tags(&surface), vec!["upcoming-a"]);
    scheduler.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn loops_run_independently() {
    let surface = MemorySurface::granted();
    let mut scheduler = scheduler_with(&surface, NotificationConfig::default());

    let (date, time) = due_in(5);
    scheduler
        .schedule_upcoming_tasks(vec![task_due_in("a", 30)])
        .await;
    scheduler
        .schedule_note_reminders(vec![NoteSnapshot {
            id: "n".to_string(),
            title: "Ping".to_string(),
            content: String::new(),
            reminder_date: Some(date),
            reminder_time: Some(time),
        }])
        .await;
    assert_eq!(scheduler.active_loops(), 2);

    scheduler.stop(LoopKind::UpcomingTasks).await;
    sleep(Duration::from_secs(301)).await;
    assert!(tags(&surface).iter().all(|t| t == "note-reminder-n"));
    assert!(!surface.shown().is_empty());
    scheduler.stop_all().await;
}
