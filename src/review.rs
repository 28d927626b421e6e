//! Weekly review and note views.
//!
//! Weeks run from Sunday 00:00 local time to the next Sunday, exclusive.
use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::{Note, NoteViewArg, Task};

/// Tag prefix that marks a note as belonging to a project
pub const PROJECT_TAG_PREFIX: &str = "project-";

/// This week's activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeeklyStats {
    /// Tasks created this week
    pub total_tasks: usize,
    /// Of those, how many are done
    pub completed_tasks: usize,
    /// Notes created this week
    pub total_notes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteView {
    All,
    Daily,
    Weekly,
    Projects,
}

impl From<NoteViewArg> for NoteView {
    fn from(arg: NoteViewArg) -> Self {
        match arg {
            NoteViewArg::All => NoteView::All,
            NoteViewArg::Daily => NoteView::Daily,
            NoteViewArg::Weekly => NoteView::Weekly,
            NoteViewArg::Projects => NoteView::Projects,
        }
    }
}

/// First and one-past-last local date of the week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date - Days::new(u64::from(date.weekday().num_days_from_sunday()));
    (start, start + Days::new(7))
}

fn local_date<Tz: TimeZone>(at: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}

fn in_week<Tz: TimeZone>(at: &DateTime<Utc>, tz: &Tz, week: (NaiveDate, NaiveDate)) -> bool {
    let date = local_date(at, tz);
    date >= week.0 && date < week.1
}

pub fn weekly_stats<Tz: TimeZone>(tasks: &[Task], notes: &[Note], now: &DateTime<Tz>) -> WeeklyStats {
    let tz = now.timezone();
    let week = week_bounds(now.date_naive());

    let week_tasks: Vec<&Task> = tasks
        .iter()
        .filter(|t| in_week(&t.created_at, &tz, week))
        .collect();

    WeeklyStats {
        total_tasks: week_tasks.len(),
        completed_tasks: week_tasks.iter().filter(|t| t.completed).count(),
        total_notes: notes
            .iter()
            .filter(|n| in_week(&n.created_at, &tz, week))
            .count(),
    }
}

/// Titles of the last `limit` completed tasks, in collection order.
pub fn weekly_highlights(tasks: &[Task], limit: usize) -> Vec<String> {
    let completed: Vec<&Task> = tasks.iter().filter(|t| t.completed).collect();
    let skip = completed.len().saturating_sub(limit);
    completed
        .into_iter()
        .skip(skip)
        .map(|t| t.title.clone())
        .collect()
}

/// Notes grouped by `project-*` tag, groups in first-seen order.
///
/// A note carrying several project tags shows up once per tag.
pub fn project_groups(notes: &[Note]) -> Vec<(String, Vec<&Note>)> {
    let mut groups: Vec<(String, Vec<&Note>)> = Vec::new();
    for note in notes {
        for tag in note.tags.iter().filter(|t| t.starts_with(PROJECT_TAG_PREFIX)) {
            match groups.iter_mut().find(|(name, _)| name == tag) {
                Some((_, members)) => members.push(note),
                None => groups.push((tag.clone(), vec![note])),
            }
        }
    }
    groups
}

pub fn filter_notes<'a, Tz: TimeZone>(
    notes: &'a [Note],
    view: NoteView,
    now: &DateTime<Tz>,
) -> Vec<&'a Note> {
    let tz = now.timezone();
    match view {
        NoteView::All => notes.iter().collect(),
        NoteView::Daily => {
            let today = now.date_naive();
            notes
                .iter()
                .filter(|n| local_date(&n.created_at, &tz) == today)
                .collect()
        }
        NoteView::Weekly => week_notes(notes, now.date_naive(), &tz),
        NoteView::Projects => project_groups(notes)
            .into_iter()
            .flat_map(|(_, members)| members)
            .collect(),
    }
}

/// Notes created in the week containing `date`.
pub fn week_notes<'a, Tz: TimeZone>(notes: &'a [Note], date: NaiveDate, tz: &Tz) -> Vec<&'a Note> {
    let week = week_bounds(date);
    notes
        .iter()
        .filter(|n| in_week(&n.created_at, tz, week))
        .collect()
}
