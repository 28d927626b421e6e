//! Core note data structures.
//!
//! A note carries a plain-text body plus ordered media attachments. The
//! editable, block-based view of the same data lives in `blocks`.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Record;

/// Kind of media attached to a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Audio,
}

/// A binary attachment (image or audio recording)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub data: Vec<u8>,
    pub filename: String,
}

/// Represents a single note in our system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier for the note
    pub id: String,
    /// Note title
    pub title: String,
    /// Plain text body
    pub content: String,
    /// Media attachments in display order
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Tags for organization
    #[serde(default)]
    pub tags: Vec<String>,
    /// When the note was created
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    /// Calendar date of the optional reminder
    #[serde(default)]
    pub reminder_date: Option<NaiveDate>,
    /// "HH:MM" time of the optional reminder
    #[serde(default)]
    pub reminder_time: Option<String>,
}

/// Everything the editor hands over when saving a note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub tags: Vec<String>,
    pub reminder_date: Option<NaiveDate>,
    pub reminder_time: Option<String>,
}

impl NoteDraft {
    /// A draft with no title, no content and no attachments must never be stored.
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty() && self.attachments.is_empty()
    }
}

/// Partial update for a note. `None` leaves a field untouched; the reminder
/// fields use a nested option so they can be cleared.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub attachments: Option<Vec<Attachment>>,
    pub tags: Option<Vec<String>>,
    pub reminder_date: Option<Option<NaiveDate>>,
    pub reminder_time: Option<Option<String>>,
}

impl From<NoteDraft> for NotePatch {
    fn from(draft: NoteDraft) -> Self {
        NotePatch {
            title: Some(draft.title),
            content: Some(draft.content),
            attachments: Some(draft.attachments),
            tags: Some(draft.tags),
            reminder_date: Some(draft.reminder_date),
            reminder_time: Some(draft.reminder_time),
        }
    }
}

impl Note {
    /// Creates a new note from a draft with a fresh id and timestamps
    pub fn new(draft: NoteDraft) -> Self {
        let now = Utc::now();

        Note {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            content: draft.content,
            attachments: draft.attachments,
            tags: draft.tags,
            created_at: now,
            updated_at: now,
            reminder_date: draft.reminder_date,
            reminder_time: draft.reminder_time,
        }
    }

    /// Returns a copy with the patch applied and `updated_at` refreshed.
    pub fn patched(&self, patch: NotePatch) -> Note {
        let mut note = self.clone();
        if let Some(title) = patch.title {
            note.title = title;
        }
        if let Some(content) = patch.content {
            note.content = content;
        }
        if let Some(attachments) = patch.attachments {
            note.attachments = attachments;
        }
        if let Some(tags) = patch.tags {
            note.tags = tags;
        }
        if let Some(date) = patch.reminder_date {
            note.reminder_date = date;
        }
        if let Some(time) = patch.reminder_time {
            note.reminder_time = time;
        }
        note.updated_at = Utc::now().max(self.updated_at);
        note
    }

    /// Case-insensitive tag membership check
    pub fn has_tag(&self, tag: &str) -> bool {
        let wanted = tag.trim().to_lowercase();
        self.tags.iter().any(|t| t.trim().to_lowercase() == wanted)
    }

    pub fn has_reminder(&self) -> bool {
        self.reminder_date.is_some() && self.reminder_time.is_some()
    }
}

impl Record for Note {
    const COLLECTION: &'static str = "notes";

    fn id(&self) -> &str {
        &self.id
    }
}
