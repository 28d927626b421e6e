//! Notification delivery.
//!
//! The platform surface is process-wide and shared behind an `Arc`. Delivery
//! is fire-and-forget: without a granted permission every attempt is a
//! silent no-op, and a surface error is logged and dropped. Each shown
//! notification is closed again after its display lifetime.
use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{NotificationConfig, Result};

/// What the user allowed the application to do with notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Undetermined,
    Granted,
    Denied,
}

/// A user-facing alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    /// Platform identity of the alert; a newer one with the same tag replaces the older
    pub tag: Option<String>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Notification {
            title: title.into(),
            body: body.into(),
            icon: None,
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Handle to a notification currently on screen.
pub trait NotificationHandle: Send {
    fn close(&self);
}

/// Platform notification surface.
pub trait NotificationSurface: Send + Sync {
    fn permission_state(&self) -> PermissionState;

    /// Asks the user; returns the resulting state.
    fn request_permission(&self) -> PermissionState;

    fn show(&self, notification: &Notification) -> Result<Box<dyn NotificationHandle>>;
}

/// How long a delivered notification stays on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Scan loops, overdue alerts and the focus timer
    Scheduled,
    /// Immediate "task completed" feedback
    Brief,
}

/// Delivery policy shared by the scheduler, the timer and the host.
#[derive(Clone)]
pub struct Notifier {
    surface: Arc<dyn NotificationSurface>,
    default_icon: Option<String>,
    scheduled_lifetime: Duration,
    brief_lifetime: Duration,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("default_icon", &self.default_icon)
            .field("scheduled_lifetime", &self.scheduled_lifetime)
            .field("brief_lifetime", &self.brief_lifetime)
            .finish()
    }
}

impl Notifier {
    pub fn new(surface: Arc<dyn NotificationSurface>, config: &NotificationConfig) -> Self {
        Notifier {
            surface,
            default_icon: config.icon.clone(),
            scheduled_lifetime: Duration::from_secs(config.scheduled_dismiss_secs),
            brief_lifetime: Duration::from_secs(config.completion_dismiss_secs),
        }
    }

    /// Requests permission when it has never been asked for. Called once at
    /// process start; a refusal is never re-requested.
    pub fn ensure_permission(&self) -> PermissionState {
        let state = self.surface.permission_state();
        debug!("Notification permission status: {:?}", state);
        if state != PermissionState::Undetermined {
            return state;
        }

        info!("Requesting notification permission...");
        let result = self.surface.request_permission();
        info!("Notification permission result: {:?}", result);
        result
    }

    /// Shows a notification and schedules its dismissal.
    ///
    /// Must be called from within a Tokio runtime. Returns whether the
    /// surface accepted the notification.
    pub fn deliver(&self, mut notification: Notification, lifetime: Lifetime) -> bool {
        if self.surface.permission_state() != PermissionState::Granted {
            debug!(
                "Notification permission not granted, dropping {:?}",
                notification.title
            );
            return false;
        }

        if notification.icon.is_none() {
            notification.icon = self.default_icon.clone();
        }

        let handle = match self.surface.show(&notification) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Notification surface rejected {:?}: {}", notification.title, e);
                return false;
            }
        };
        debug!("Delivered notification {:?}", notification.title);

        let delay = match lifetime {
            Lifetime::Scheduled => self.scheduled_lifetime,
            Lifetime::Brief => self.brief_lifetime,
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.close();
        });
        true
    }
}

/// Surface for terminal hosts: notifications become log lines and a styled
/// line on stdout.
#[derive(Debug, Default)]
pub struct LogSurface;

struct LogHandle {
    title: String,
}

impl NotificationHandle for LogHandle {
    fn close(&self) {
        debug!("Dismissed notification {:?}", self.title);
    }
}

impl NotificationSurface for LogSurface {
    fn permission_state(&self) -> PermissionState {
        PermissionState::Granted
    }

    fn request_permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    fn show(&self, notification: &Notification) -> Result<Box<dyn NotificationHandle>> {
        info!(
            "Notification [{}]: {}",
            notification.tag.as_deref().unwrap_or("-"),
            notification.title
        );
        println!(
            "{} {}",
            console::style(format!("🔔 {}", notification.title)).bold().yellow(),
            notification.body
        );
        Ok(Box::new(LogHandle {
            title: notification.title.clone(),
        }))
    }
}

#[derive(Debug, Default)]
struct MemorySurfaceState {
    shown: Vec<Notification>,
    closed: usize,
    permission_requests: usize,
}

/// Surface that records everything it is asked to show.
///
/// Used for headless runs and tests; the answer given to permission
/// requests is configurable.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    permission: Arc<Mutex<PermissionState>>,
    answer: PermissionState,
    state: Arc<Mutex<MemorySurfaceState>>,
}

impl MemorySurface {
    pub fn new(permission: PermissionState, answer: PermissionState) -> Self {
        MemorySurface {
            permission: Arc::new(Mutex::new(permission)),
            answer,
            state: Arc::default(),
        }
    }

    /// A surface with permission already granted.
    pub fn granted() -> Self {
        Self::new(PermissionState::Granted, PermissionState::Granted)
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.state.lock().map(|s| s.shown.clone()).unwrap_or_default()
    }

    pub fn closed(&self) -> usize {
        self.state.lock().map(|s| s.closed).unwrap_or_default()
    }

    pub fn permission_requests(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.permission_requests)
            .unwrap_or_default()
    }
}

struct MemoryHandle {
    state: Arc<Mutex<MemorySurfaceState>>,
}

impl NotificationHandle for MemoryHandle {
    fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed += 1;
        }
    }
}

impl NotificationSurface for MemorySurface {
    fn permission_state(&self) -> PermissionState {
        self.permission
            .lock()
            .map(|p| *p)
            .unwrap_or(PermissionState::Denied)
    }

    fn request_permission(&self) -> PermissionState {
        if let Ok(mut state) = self.state.lock() {
            state.permission_requests += 1;
        }
        if let Ok(mut permission) = self.permission.lock() {
            *permission = self.answer;
        }
        self.answer
    }

    fn show(&self, notification: &Notification) -> Result<Box<dyn NotificationHandle>> {
        if let Ok(mut state) = self.state.lock() {
            state.shown.push(notification.clone());
        }
        Ok(Box::new(MemoryHandle {
            state: Arc::clone(&self.state),
        }))
    }
}
