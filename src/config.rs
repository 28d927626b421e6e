use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{DeskError, Result};

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the notes, tasks and timer preset tables
    pub data_dir: PathBuf,

    /// Default focus duration in minutes
    pub work_minutes: u32,

    /// Default break duration in minutes
    pub break_minutes: u32,

    /// Reminder loop settings
    pub notifications: NotificationConfig,
}

/// Longest accepted look-ahead window: one week, in minutes
pub const MAX_WINDOW_MINS: i64 = 7 * 24 * 60;

/// Timing of the reminder loops and of notification display.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    /// How often upcoming tasks are scanned (seconds)
    pub upcoming_interval_secs: u64,

    /// How far ahead a task counts as upcoming (minutes)
    pub upcoming_window_mins: i64,

    /// How often the today backlog reminder runs (seconds)
    pub backlog_interval_secs: u64,

    /// How often note reminders are scanned (seconds)
    pub reminder_interval_secs: u64,

    /// How far ahead a note reminder fires (minutes)
    pub reminder_window_mins: i64,

    /// How often `watch` reloads tasks and notes (seconds)
    pub refresh_interval_secs: u64,

    /// Display lifetime of scheduled notifications (seconds)
    pub scheduled_dismiss_secs: u64,

    /// Display lifetime of the "task completed" notification (seconds)
    pub completion_dismiss_secs: u64,

    /// Suppress a tag once it fired until its loop is rescheduled
    pub fire_once: bool,

    /// Icon used when a notification does not name one
    pub icon: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            upcoming_interval_secs: 5 * 60,
            upcoming_window_mins: 60,
            backlog_interval_secs: 60 * 60,
            reminder_interval_secs: 60,
            reminder_window_mins: 10,
            refresh_interval_secs: 10,
            scheduled_dismiss_secs: 5,
            completion_dismiss_secs: 3,
            fire_once: false,
            icon: Some("icon-192.png".to_string()),
        }
    }
}

impl NotificationConfig {
    pub fn upcoming_interval(&self) -> Duration {
        Duration::from_secs(self.upcoming_interval_secs.max(1))
    }

    pub fn backlog_interval(&self) -> Duration {
        Duration::from_secs(self.backlog_interval_secs.max(1))
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_secs.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn upcoming_window(&self) -> chrono::Duration {
        window(self.upcoming_window_mins)
    }

    pub fn reminder_window(&self) -> chrono::Duration {
        window(self.reminder_window_mins)
    }
}

fn window(minutes: i64) -> chrono::Duration {
    chrono::Duration::minutes(minutes.clamp(1, MAX_WINDOW_MINS))
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".focusdesk"));

        Config {
            data_dir,
            work_minutes: 25,
            break_minutes: 5,
            notifications: NotificationConfig::default(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "focusdesk")
}

impl Config {
    /// Location of the configuration file when none is given
    pub fn default_path() -> Result<PathBuf> {
        project_dirs()
            .map(|dirs| dirs.config_dir().join("config.json"))
            .ok_or_else(|| DeskError::ConfigError {
                message: "Unable to determine a configuration directory".to_string(),
            })
    }

    /// Loads the configuration, falling back to defaults when the file does
    /// not exist yet.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            info!(
                "No configuration at {}, using defaults",
                path.display()
            );
            return Ok(Config::default());
        }

        debug!("Loading configuration from {}", path.display());
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| {
            warn!("Invalid configuration file {}: {}", path.display(), e);
            DeskError::ConfigError {
                message: format!("{}: {}", path.display(), e),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|_| DeskError::ConfigError {
            message: format!("Failed to create directory {}", dir.display()),
        })?;

        let mut temp_file = NamedTempFile::new_in(dir)?;
        temp_file.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
        temp_file.flush()?;
        temp_file.persist(path).map_err(|e| DeskError::Io(e.error))?;

        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let n = &self.notifications;
        if n.upcoming_window_mins <= 0 || n.reminder_window_mins <= 0 {
            return Err(DeskError::ConfigError {
                message: "Notification windows must be positive".to_string(),
            });
        }
        if n.upcoming_window_mins > MAX_WINDOW_MINS || n.reminder_window_mins > MAX_WINDOW_MINS {
            return Err(DeskError::ConfigError {
                message: format!(
                    "Notification windows must be at most {} minutes",
                    MAX_WINDOW_MINS
                ),
            });
        }
        Ok(())
    }
}
