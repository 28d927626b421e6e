//! Task data structures.
use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{at_clock, start_of_day, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }
}

/// A to-do item, optionally scheduled for a date and time of day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    /// Set iff `completed` is true
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
    /// "HH:MM"
    #[serde(default)]
    pub scheduled_time: Option<String>,
    /// Absent is treated as medium when sorting
    #[serde(default)]
    pub priority: Option<Priority>,
}

/// Fields accepted when creating a task.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<String>,
    pub priority: Option<Priority>,
}

impl TaskDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        TaskDraft {
            title: title.into(),
            ..Default::default()
        }
    }
}

impl Task {
    pub fn new(draft: TaskDraft) -> Self {
        Task {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            description: draft.description,
            completed: false,
            created_at: Utc::now(),
            completed_at: None,
            scheduled_date: draft.scheduled_date,
            scheduled_time: draft.scheduled_time,
            priority: draft.priority,
        }
    }

    /// Sets the completion flag, stamping or clearing `completed_at`.
    pub fn set_completed(&mut self, completed: bool, at: DateTime<Utc>) {
        if completed && !self.completed {
            self.completed_at = Some(at);
        } else if !completed {
            self.completed_at = None;
        }
        self.completed = completed;
    }

    /// Restores the `completed_at` invariant on a record edited field by field.
    pub fn normalized(mut self, now: DateTime<Utc>) -> Self {
        match (self.completed, self.completed_at) {
            (true, None) => self.completed_at = Some(now),
            (false, Some(_)) => self.completed_at = None,
            _ => {}
        }
        self
    }

    pub fn effective_priority(&self) -> Priority {
        self.priority.unwrap_or(Priority::Medium)
    }

    /// Date the task counts toward: the scheduled date, else the local creation date.
    pub fn effective_date<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDate {
        self.scheduled_date
            .unwrap_or_else(|| self.created_at.with_timezone(tz).date_naive())
    }

    /// Whether the scheduled moment has passed without the task being done.
    ///
    /// A task scheduled without a time of day is due at the start of its date.
    pub fn is_overdue<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        if self.completed {
            return false;
        }
        let Some(date) = self.scheduled_date else {
            return false;
        };
        let tz = now.timezone();
        let due = match &self.scheduled_time {
            Some(clock) => match at_clock(&tz, date, clock) {
                Ok(due) => Some(due),
                Err(e) => {
                    warn!("Skipping overdue check for task {}: {}", self.id, e);
                    None
                }
            },
            None => start_of_day(&tz, date),
        };
        due.is_some_and(|due| due < *now)
    }

    /// Dashboard ordering: incomplete first, then higher priority, then the
    /// earliest scheduled date with dated tasks ahead of undated ones.
    pub fn dashboard_cmp(&self, other: &Task) -> Ordering {
        self.completed
            .cmp(&other.completed)
            .then_with(|| {
                other
                    .effective_priority()
                    .rank()
                    .cmp(&self.effective_priority().rank())
            })
            .then_with(|| match (self.scheduled_date, other.scheduled_date) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }
}

impl Record for Task {
    const COLLECTION: &'static str = "tasks";

    fn id(&self) -> &str {
        &self.id
    }
}
