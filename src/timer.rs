//! Focus timer.
//!
//! [`TimerEngine`] is a plain countdown state machine over
//! `{Work, Break} x {Running, Paused}`; it knows nothing about clocks and
//! only moves when `tick()` is called. [`FocusTimer`] drives an engine with
//! a one-second tick task that exists exactly while the timer runs.
//!
//! ```text
//! Work/Paused --start--> Work/Running --0s--> Break/Paused --start--> ...
//! ```
use std::{sync::Arc, time::Duration};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use crate::{Lifetime, Notification, Notifier, TimerPreset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    Work,
    Break,
}

/// Emitted when a countdown reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerCompletion {
    /// The phase that just ended
    pub finished: TimerMode,
}

impl TimerCompletion {
    pub fn notification(&self) -> Notification {
        let body = match self.finished {
            TimerMode::Work => "Work session complete! Take a break.",
            TimerMode::Break => "Break time is over! Back to work.",
        };
        Notification::new("Timer Complete", body)
    }
}

/// Observable timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    /// Seconds left in the current phase
    pub time_left: u32,
    pub is_running: bool,
    pub is_break: bool,
    /// Minutes
    pub work_duration: u32,
    /// Minutes
    pub break_duration: u32,
}

/// Countdown length for a duration in minutes, clamped at `u32::MAX` seconds.
fn minutes_to_seconds(minutes: u32) -> u32 {
    minutes.saturating_mul(60)
}

#[derive(Debug, Clone)]
pub struct TimerEngine {
    state: TimerState,
}

impl TimerEngine {
    /// A paused work phase with the full work duration left.
    pub fn new(work_duration: u32, break_duration: u32) -> Self {
        Self {
            state: TimerState {
                time_left: minutes_to_seconds(work_duration),
                is_running: false,
                is_break: false,
                work_duration,
                break_duration,
            },
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn time_left(&self) -> u32 {
        self.state.time_left
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn mode(&self) -> TimerMode {
        if self.state.is_break {
            TimerMode::Break
        } else {
            TimerMode::Work
        }
    }

    fn mode_seconds(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Work => minutes_to_seconds(self.state.work_duration),
            TimerMode::Break => minutes_to_seconds(self.state.break_duration),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Returns false when already running.
    pub fn start(&mut self) -> bool {
        if self.state.is_running {
            return false;
        }
        self.state.is_running = true;
        true
    }

    /// Returns false when already paused.
    pub fn pause(&mut self) -> bool {
        if !self.state.is_running {
            return false;
        }
        self.state.is_running = false;
        true
    }

    pub fn reset(&mut self) {
        self.state.time_left = self.mode_seconds(self.mode());
        self.state.is_running = false;
    }

    pub fn toggle_mode(&mut self) {
        self.state.is_break = !self.state.is_break;
        self.reset();
    }

    /// The countdown only jumps when the work phase is the current one.
    pub fn set_work_duration(&mut self, minutes: u32) {
        self.state.work_duration = minutes;
        if self.mode() == TimerMode::Work {
            self.state.time_left = minutes_to_seconds(minutes);
        }
    }

    pub fn set_break_duration(&mut self, minutes: u32) {
        self.state.break_duration = minutes;
        if self.mode() == TimerMode::Break {
            self.state.time_left = minutes_to_seconds(minutes);
        }
    }

    pub fn apply_preset(&mut self, preset: &TimerPreset) {
        self.state.work_duration = preset.work_time;
        self.state.break_duration = preset.break_time;
        self.reset();
    }

    /// Advances the countdown by one second.
    ///
    /// When the countdown reaches zero the finished phase is returned and the
    /// engine switches to the other phase, paused. Does nothing while paused.
    pub fn tick(&mut self) -> Option<TimerCompletion> {
        if !self.state.is_running {
            return None;
        }

        self.state.time_left = self.state.time_left.saturating_sub(1);
        if self.state.time_left > 0 {
            return None;
        }

        let completion = TimerCompletion {
            finished: self.mode(),
        };
        self.toggle_mode();
        Some(completion)
    }
}

/// Formats seconds as `MM:SS`; minutes grow past two digits when needed.
pub fn format_time(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Runs a [`TimerEngine`] in real time.
pub struct FocusTimer {
    engine: Arc<Mutex<TimerEngine>>,
    notifier: Notifier,
    completion_tx: mpsc::UnboundedSender<TimerCompletion>,
    ticker: Option<JoinHandle<()>>,
}

impl FocusTimer {
    /// Wraps `engine`. Completions are delivered as notifications and also
    /// sent to the returned receiver.
    pub fn new(
        engine: TimerEngine,
        notifier: Notifier,
    ) -> (Self, mpsc::UnboundedReceiver<TimerCompletion>) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let timer = Self {
            engine: Arc::new(Mutex::new(engine)),
            notifier,
            completion_tx,
            ticker: None,
        };
        (timer, completion_rx)
    }

    pub async fn state(&self) -> TimerState {
        self.engine.lock().await.state()
    }

    /// Whether a tick task is currently alive.
    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub async fn start(&mut self) {
        self.engine.lock().await.start();
        if self.is_ticking() {
            return;
        }

        let engine = Arc::clone(&self.engine);
        let notifier = self.notifier.clone();
        let completion_tx = self.completion_tx.clone();

        self.ticker = Some(tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(1));
            interval.tick().await; // Initial tick

            loop {
                interval.tick().await;
                let completion = {
                    let mut engine = engine.lock().await;
                    if !engine.is_running() {
                        break;
                    }
                    engine.tick()
                };

                if let Some(completion) = completion {
                    info!("{:?} phase complete", completion.finished);
                    notifier.deliver(completion.notification(), Lifetime::Scheduled);
                    if completion_tx.send(completion).is_err() {
                        debug!("No one is listening for timer completions");
                    }
                    break;
                }
            }
        }));
        debug!("Timer started");
    }

    pub async fn pause(&mut self) {
        self.engine.lock().await.pause();
        self.stop_ticker();
    }

    pub async fn reset(&mut self) {
        self.engine.lock().await.reset();
        self.stop_ticker();
    }

    pub async fn toggle_mode(&mut self) {
        self.engine.lock().await.toggle_mode();
        self.stop_ticker();
    }

    pub async fn set_work_duration(&mut self, minutes: u32) {
        self.engine.lock().await.set_work_duration(minutes);
    }

    pub async fn set_break_duration(&mut self, minutes: u32) {
        self.engine.lock().await.set_break_duration(minutes);
    }

    pub async fn apply_preset(&mut self, preset: &TimerPreset) {
        self.engine.lock().await.apply_preset(preset);
        self.stop_ticker();
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            debug!("Timer tick task cancelled");
        }
    }
}

impl Drop for FocusTimer {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySurface, NotificationConfig};

    #[test]
    fn sixty_ticks_finish_a_one_minute_session() {
        let mut engine = TimerEngine::new(1, 5);
        engine.start();

        for _ in 0..59 {
            assert_eq!(engine.tick(), None);
        }
        assert_eq!(engine.time_left(), 1);

        let completion = engine.tick().unwrap();
        assert_eq!(completion.finished, TimerMode::Work);
        assert_eq!(
            completion.notification().body,
            "Work session complete! Take a break."
        );

        let state = engine.state();
        assert!(state.is_break);
        assert!(!state.is_running);
        assert_eq!(state.time_left, 300);
    }

    #[test]
    fn huge_durations_clamp_instead_of_overflowing() {
        let mut engine = TimerEngine::new(u32::MAX, 5);
        assert_eq!(engine.time_left(), u32::MAX);

        engine.apply_preset(&TimerPreset::new("long".to_string(), 80_000_000, 5));
        assert_eq!(engine.time_left(), u32::MAX);
        assert_eq!(engine.state().work_duration, 80_000_000);

        engine.toggle_mode();
        engine.set_break_duration(u32::MAX / 2);
        assert_eq!(engine.time_left(), u32::MAX);
        engine.set_break_duration(2);
        assert_eq!(engine.time_left(), 120);
    }

    #[test]
    fn paused_engine_does_not_count() {
        let mut engine = TimerEngine::new(25, 5);
        assert_eq!(engine.tick(), None);
        assert_eq!(engine.time_left(), 1500);

        engine.start();
        assert!(!engine.start());
        engine.tick();
        engine.pause();
        engine.tick();
        assert_eq!(engine.time_left(), 1499);
    }

    #[test]
    fn durations_only_move_the_current_phase() {
        let mut engine = TimerEngine::new(25, 5);
        engine.set_break_duration(10);
        assert_eq!(engine.time_left(), 1500);
        engine.set_work_duration(50);
        assert_eq!(engine.time_left(), 3000);

        engine.toggle_mode();
        assert_eq!(engine.mode(), TimerMode::Break);
        assert_eq!(engine.time_left(), 600);
        engine.set_work_duration(30);
        assert_eq!(engine.time_left(), 600);
    }

    #[test]
    fn preset_resets_the_current_phase() {
        let mut engine = TimerEngine::new(25, 5);
        engine.start();
        engine.tick();
        engine.apply_preset(&TimerPreset::new("Deep".to_string(), 50, 10));
        let state = engine.state();
        assert_eq!(state.time_left, 3000);
        assert!(!state.is_running);
        assert_eq!(state.break_duration, 10);
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(65), "01:05");
        assert_eq!(format_time(1500), "25:00");
        assert_eq!(format_time(6000), "100:00");
    }

    #[tokio::test(start_paused = true)]
    async fn focus_timer_notifies_and_stops_ticking() {
        let surface = MemorySurface::granted();
        let notifier = Notifier::new(Arc::new(surface.clone()), &NotificationConfig::default());
        let (mut timer, mut completions) = FocusTimer::new(TimerEngine::new(1, 1), notifier);

        timer.start().await;
        assert!(timer.is_ticking());

        let completion = completions.recv().await.unwrap();
        assert_eq!(completion.finished, TimerMode::Work);
        tokio::task::yield_now().await;
        assert!(!timer.is_ticking());

        let state = timer.state().await;
        assert!(state.is_break);
        assert_eq!(state.time_left, 60);
        assert_eq!(surface.shown()[0].title, "Timer Complete");
    }

    #[tokio::test(start_paused = true)]
    async fn pause_cancels_the_tick_task() {
        let notifier = Notifier::new(
            Arc::new(MemorySurface::granted()),
            &NotificationConfig::default(),
        );
        let (mut timer, _completions) = FocusTimer::new(TimerEngine::new(1, 1), notifier);

        timer.start().await;
        time::sleep(Duration::from_millis(10_500)).await;
        timer.pause().await;
        assert!(!timer.is_ticking());
        let left = timer.state().await.time_left;
        assert_eq!(left, 50);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(timer.state().await.time_left, left);
    }
}
