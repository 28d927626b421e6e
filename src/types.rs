//! Shared data structures for the focusdesk application.
//!
//! Holds the crate-wide Result alias, timer presets and the CLI command tree.
use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{DeskError, Priority, Record};

/// A specialized Result type for focusdesk operations.
pub type Result<T> = std::result::Result<T, DeskError>;

/// A user-defined pair of work and break durations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerPreset {
    pub id: String,
    pub name: String,
    /// Work duration in minutes
    pub work_time: u32,
    /// Break duration in minutes
    pub break_time: u32,
}

impl TimerPreset {
    pub fn new(name: String, work_time: u32, break_time: u32) -> Self {
        TimerPreset {
            id: Uuid::new_v4().to_string(),
            name,
            work_time,
            break_time,
        }
    }
}

impl Record for TimerPreset {
    const COLLECTION: &'static str = "timer_presets";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NoteViewArg {
    All,
    Daily,
    Weekly,
    Projects,
}

/// Available subcommands for the focusdesk application
#[derive(Subcommand)]
pub enum Commands {
    /// Task operations
    Task {
        #[clap(subcommand)]
        action: TaskCommand,
    },

    /// Note operations
    Note {
        #[clap(subcommand)]
        action: NoteCommand,
    },

    /// Timer preset operations
    Preset {
        #[clap(subcommand)]
        action: PresetCommand,
    },

    /// Run a focus timer in the foreground
    Timer {
        /// Load durations from a saved preset
        #[clap(short, long)]
        preset: Option<String>,

        /// Work duration in minutes
        #[clap(short, long)]
        work: Option<u32>,

        /// Break duration in minutes
        #[clap(short, long = "break")]
        break_minutes: Option<u32>,

        /// Number of completed phases (work or break) before exiting
        #[clap(short, long, default_value_t = 1)]
        cycles: u32,
    },

    /// Run the reminder loops until interrupted
    Watch,

    /// Show this week's summary
    Review,

    /// Configuration management
    Config {
        /// Show current configuration
        #[clap(short = 'S', long)]
        show: bool,

        /// Reset configuration to defaults
        #[clap(short, long)]
        reset: bool,
    },
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Create a new task
    Add {
        /// Title of the task
        title: String,

        /// Longer description
        #[clap(short, long)]
        description: Option<String>,

        /// Scheduled date (YYYY-MM-DD)
        #[clap(long)]
        date: Option<String>,

        /// Scheduled time (HH:MM)
        #[clap(long)]
        time: Option<String>,

        #[clap(short, long, value_enum)]
        priority: Option<PriorityArg>,
    },

    /// List tasks in dashboard order
    List {
        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Show today's tasks and progress
    Today,

    /// Toggle completion of a task
    Toggle {
        /// ID of the task
        id: String,
    },

    /// Edit an existing task
    Edit {
        /// ID of the task
        id: String,

        #[clap(short = 'T', long)]
        title: Option<String>,

        #[clap(short, long)]
        description: Option<String>,

        /// Scheduled date (YYYY-MM-DD), empty to clear
        #[clap(long)]
        date: Option<String>,

        /// Scheduled time (HH:MM), empty to clear
        #[clap(long)]
        time: Option<String>,

        #[clap(short, long, value_enum)]
        priority: Option<PriorityArg>,
    },

    /// Delete a task by ID
    Delete {
        /// ID of the task
        id: String,
    },

    /// Delete every completed task
    ClearCompleted,
}

#[derive(Subcommand)]
pub enum NoteCommand {
    /// Create a new note
    Add {
        /// Title of the note
        #[clap(short = 'T', long, default_value = "")]
        title: String,

        /// Text content of the note
        #[clap(short, long)]
        content: Option<String>,

        /// Tags to associate with the note (comma-separated)
        #[clap(short = 't', long)]
        tags: Option<String>,

        /// Image files to attach
        #[clap(long)]
        image: Vec<PathBuf>,

        /// Audio files to attach
        #[clap(long)]
        audio: Vec<PathBuf>,

        /// Reminder date (YYYY-MM-DD)
        #[clap(long)]
        remind_date: Option<String>,

        /// Reminder time (HH:MM)
        #[clap(long)]
        remind_time: Option<String>,
    },

    /// List notes
    List {
        #[clap(short, long, value_enum, default_value = "all")]
        view: NoteViewArg,

        /// Filter notes by tag
        #[clap(short, long)]
        tag: Option<String>,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Search notes by title, content or tags
    Search {
        /// Search query text
        query: String,

        /// Limit the number of search results
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },

    /// Show one note with its content blocks
    Show {
        /// ID of the note
        id: String,
    },

    /// Edit an existing note; omitted fields keep their value
    Edit {
        /// ID of the note
        id: String,

        /// New title
        #[clap(short = 'T', long)]
        title: Option<String>,

        /// New text content, replacing the existing text
        #[clap(short, long)]
        content: Option<String>,

        /// New tags (comma-separated), replacing the existing tags
        #[clap(short = 't', long)]
        tags: Option<String>,

        /// Image files to attach
        #[clap(long)]
        image: Vec<PathBuf>,

        /// Audio files to attach
        #[clap(long)]
        audio: Vec<PathBuf>,

        /// Remove the existing attachments before attaching new ones
        #[clap(long)]
        clear_attachments: bool,

        /// Reminder date (YYYY-MM-DD)
        #[clap(long)]
        remind_date: Option<String>,

        /// Reminder time (HH:MM)
        #[clap(long)]
        remind_time: Option<String>,

        /// Remove the reminder
        #[clap(long, conflicts_with_all = ["remind_date", "remind_time"])]
        clear_reminder: bool,
    },

    /// Delete a note by ID
    Delete {
        /// ID of the note
        id: String,

        /// Skip the confirmation prompt
        #[clap(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum PresetCommand {
    /// Save a named work/break pair
    Add {
        name: String,

        #[clap(short, long, default_value_t = 25)]
        work: u32,

        #[clap(short, long = "break", default_value_t = 5)]
        break_minutes: u32,
    },

    /// List saved presets
    List,

    /// Delete a preset by ID
    Delete { id: String },
}
