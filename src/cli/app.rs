//! CLI module for the focusdesk application
//!
//! This module handles the command-line interface on top of the
//! repositories, the focus timer and the reminder loops.
use std::{
    collections::HashSet,
    io::{stdin, stdout, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use chrono::Local;
use console::style;
use log::{debug, info, warn};
use tokio::time::{self, MissedTickBehavior};

use crate::{
    attach_image, completion_alert, format_time, normalize_clock, overdue_alert,
    parse_date, preview, project_groups, to_blocks, weekly_highlights, weekly_stats, BlockKind,
    Commands, Config, DeskError, FileMedia, FocusTimer, JsonStore, JsonTable, Lifetime,
    LogSurface, LoopKind, Note, NoteCommand, NoteEditor, NotePatch, NoteRepository, NoteSnapshot,
    NoteView, NoteViewArg, NotificationScheduler, Notifier, PresetCommand, PresetRepository,
    Priority, Record, Result, Task, TaskCommand, TaskDraft, TaskRepository, TaskSnapshot,
    TimerEngine, TimerPreset,
};

/// Number of completed tasks shown as weekly wins
const HIGHLIGHT_LIMIT: usize = 5;

/// Note fields given on the command line; `None` leaves the editor value alone.
struct NoteChanges {
    title: Option<String>,
    content: Option<String>,
    tags: Option<String>,
    images: Vec<PathBuf>,
    audio: Vec<PathBuf>,
    remind_date: Option<String>,
    remind_time: Option<String>,
}

impl NoteChanges {
    fn apply(self, editor: &mut NoteEditor) -> Result<()> {
        if let Some(title) = self.title {
            editor.title = title;
        }
        if let Some(tags) = self.tags {
            editor.tags = tags;
        }
        if let Some(date) = self.remind_date {
            editor.reminder_date = Some(parse_date(&date)?);
        }
        if let Some(time) = self.remind_time {
            editor.reminder_time = Some(normalize_clock(&time)?);
        }
        if let Some(text) = self.content {
            editor.blocks.replace_text(text);
        }

        let image_count = self.images.len();
        let mut media = FileMedia::new(self.images);
        for _ in 0..image_count {
            let last = editor.blocks.len() - 1;
            if let Some(id) = attach_image(&mut media, &mut editor.blocks, last)? {
                debug!("Attached image block {}", id);
            }
        }

        for path in self.audio {
            let clip = FileMedia::read_file(&path)?;
            let last = editor.blocks.len() - 1;
            editor
                .blocks
                .insert_media_after(last, BlockKind::Audio, clip.data, clip.filename);
        }
        Ok(())
    }
}

/// CLI Application handler - processes CLI commands against the data tables
pub struct App {
    tasks: TaskRepository<JsonTable<Task>>,
    notes: NoteRepository<JsonTable<Note>>,
    presets: PresetRepository<JsonTable<TimerPreset>>,

    /// Shared notification delivery
    notifier: Notifier,

    /// Application configuration
    config: Config,

    /// Where `config --reset` writes
    config_path: PathBuf,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    /// Opens the tables in the configured data directory and loads them.
    pub fn new(config: Config, config_path: PathBuf, verbose: bool) -> Result<Self> {
        let store = JsonStore::open(&config.data_dir)?;

        let mut tasks = TaskRepository::new(store.tasks);
        let mut notes = NoteRepository::new(store.notes);
        let mut presets = PresetRepository::new(store.presets);
        tasks.load()?;
        notes.load()?;
        presets.load()?;

        let notifier = Notifier::new(Arc::new(LogSurface), &config.notifications);
        notifier.ensure_permission();

        Ok(Self {
            tasks,
            notes,
            presets,
            notifier,
            config,
            config_path,
            verbose,
        })
    }

    /// Run the CLI application with the given command
    pub async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Task { action } => self.handle_task(action)?,
            Commands::Note { action } => self.handle_note(action)?,
            Commands::Preset { action } => self.handle_preset(action)?,
            Commands::Timer {
                preset,
                work,
                break_minutes,
                cycles,
            } => self.run_timer(preset, work, break_minutes, cycles).await?,
            Commands::Watch => self.watch().await?,
            Commands::Review => self.show_review(),
            Commands::Config { show, reset } => self.handle_config(show, reset)?,
        }

        Ok(())
    }

    // ── Tasks ────────────────────────────────────────────────────────

    fn handle_task(&mut self, action: TaskCommand) -> Result<()> {
        match action {
            TaskCommand::Add {
                title,
                description,
                date,
                time,
                priority,
            } => {
                let draft = TaskDraft {
                    title,
                    description: description.filter(|d| !d.trim().is_empty()),
                    scheduled_date: date.as_deref().map(parse_date).transpose()?,
                    scheduled_time: time.as_deref().map(normalize_clock).transpose()?,
                    priority: priority.map(Into::into),
                };
                let task = self.tasks.add_scheduled(draft)?;
                println!("Task created with ID: {}", task.id);
            }

            TaskCommand::List { json } => {
                let sorted = self.tasks.sorted();
                if json {
                    println!("{}", serde_json::to_string_pretty(&sorted)?);
                    return Ok(());
                }
                if sorted.is_empty() {
                    println!("No tasks yet.");
                    return Ok(());
                }
                self.display_tasks(&sorted);
                println!(
                    "\nFound {} task{}",
                    sorted.len(),
                    if sorted.len() == 1 { "" } else { "s" }
                );
                self.notify_overdue(&sorted);
            }

            TaskCommand::Today => {
                let now = Local::now();
                let mut today = self.tasks.today_tasks(&now);
                today.sort_by(|a, b| a.dashboard_cmp(b));

                println!(
                    "{} {}/{} completed",
                    style("Today:").bold(),
                    self.tasks.completed_today_count(&now),
                    self.tasks.total_today_count(&now)
                );
                if today.is_empty() {
                    println!("Nothing scheduled for today.");
                } else {
                    self.display_tasks(&today);
                }
                self.notify_overdue(&today);
            }

            TaskCommand::Toggle { id } => match self.tasks.toggle(&id)? {
                Some(task) if task.completed => {
                    println!("Task {} completed", task.id);
                    self.notifier.deliver(completion_alert(&task), Lifetime::Brief);
                }
                Some(task) => println!("Task {} reopened", task.id),
                None => return Err(DeskError::not_found(Task::COLLECTION, &id)),
            },

            TaskCommand::Edit {
                id,
                title,
                description,
                date,
                time,
                priority,
            } => {
                let mut task = self
                    .tasks
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| DeskError::not_found(Task::COLLECTION, &id))?;

                if let Some(title) = title {
                    task.title = title;
                }
                if let Some(description) = description {
                    task.description = Some(description).filter(|d| !d.trim().is_empty());
                }
                if let Some(date) = date {
                    task.scheduled_date = cleared_or(&date, parse_date)?;
                }
                if let Some(time) = time {
                    task.scheduled_time = cleared_or(&time, normalize_clock)?;
                }
                if let Some(priority) = priority {
                    task.priority = Some(priority.into());
                }

                let task = self.tasks.update(task)?;
                println!("Task {} updated successfully", task.id);
            }

            TaskCommand::Delete { id } => {
                if self.tasks.get(&id).is_none() {
                    return Err(DeskError::not_found(Task::COLLECTION, &id));
                }
                self.tasks.delete(&id)?;
                println!("Task {} deleted", id);
            }

            TaskCommand::ClearCompleted => {
                let removed = self.tasks.clear_completed()?;
                println!("Removed {} completed task(s)", removed);
            }
        }

        Ok(())
    }

    fn display_tasks(&self, tasks: &[&Task]) {
        let now = Local::now();

        for task in tasks {
            let check = if task.completed { "[x]" } else { "[ ]" };
            let title = if task.completed {
                style(task.title.clone()).dim()
            } else {
                style(task.title.clone()).bold()
            };
            let priority = match task.priority {
                Some(priority) => {
                    let label = format!("{:?}", priority).to_lowercase();
                    match priority {
                        Priority::High => style(label).red(),
                        Priority::Medium => style(label).yellow(),
                        Priority::Low => style(label).green(),
                    }
                }
                None => style(String::new()),
            };

            println!("{} {} {}", check, title, priority);

            let mut details = vec![format!("ID: {}", task.id)];
            if let Some(date) = task.scheduled_date {
                let when = match &task.scheduled_time {
                    Some(time) => format!("{} {}", date, time),
                    None => date.to_string(),
                };
                details.push(format!("Due: {}", when));
            }
            println!("    {}", details.join(" | "));

            if task.is_overdue(&now) {
                println!("    {}", style("Overdue").red().bold());
            }
            if self.verbose {
                if let Some(description) = &task.description {
                    println!("    {}", description);
                }
                if let Some(done) = task.completed_at {
                    println!("    Completed: {}", done.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
                }
            }
        }
    }

    fn notify_overdue(&self, tasks: &[&Task]) {
        let now = Local::now();
        for task in tasks {
            if let Some(alert) = overdue_alert(task, &now) {
                self.notifier.deliver(alert, Lifetime::Scheduled);
            }
        }
    }

    // ── Notes ────────────────────────────────────────────────────────

    fn handle_note(&mut self, action: NoteCommand) -> Result<()> {
        match action {
            NoteCommand::Add {
                title,
                content,
                tags,
                image,
                audio,
                remind_date,
                remind_time,
            } => self.add_note(NoteChanges {
                title: Some(title),
                content,
                tags,
                images: image,
                audio,
                remind_date,
                remind_time,
            })?,

            NoteCommand::Edit {
                id,
                title,
                content,
                tags,
                image,
                audio,
                clear_attachments,
                remind_date,
                remind_time,
                clear_reminder,
            } => {
                let changes = NoteChanges {
                    title,
                    content,
                    tags,
                    images: image,
                    audio,
                    remind_date,
                    remind_time,
                };
                self.edit_note(&id, changes, clear_attachments, clear_reminder)?
            }

            NoteCommand::List { view, tag, json } => {
                let now = Local::now();
                let notes = self.notes.listed(NoteView::from(view), tag.as_deref(), &now);

                if json {
                    self.display_notes_json(&notes)?;
                } else if view == NoteViewArg::Projects && tag.is_none() {
                    self.display_projects();
                } else {
                    self.display_notes(&notes);
                }
            }

            NoteCommand::Search { query, limit } => {
                let mut results = self.notes.search(&query);
                if limit > 0 {
                    results.truncate(limit);
                }

                if results.is_empty() {
                    println!("No notes found matching query: \"{}\"", query);
                } else {
                    self.display_notes(&results);
                }
            }

            NoteCommand::Show { id } => {
                let note = self
                    .notes
                    .get(&id)
                    .ok_or_else(|| DeskError::not_found(Note::COLLECTION, &id))?;
                self.show_note(note);
            }

            NoteCommand::Delete { id, force } => self.delete_note(&id, force)?,
        }

        Ok(())
    }

    fn add_note(&mut self, changes: NoteChanges) -> Result<()> {
        let mut editor = NoteEditor::open(None);
        changes.apply(&mut editor)?;

        let Some(draft) = editor.draft() else {
            println!("Nothing to save: a note needs a title, some content or an attachment.");
            return Ok(());
        };

        match self.notes.add(draft)? {
            Some(note) => println!("Note created with ID: {}", note.id),
            None => println!("Nothing to save."),
        }
        Ok(())
    }

    /// Reopens a note in the block editor, applies the changes and saves it back.
    fn edit_note(
        &mut self,
        id: &str,
        changes: NoteChanges,
        clear_attachments: bool,
        clear_reminder: bool,
    ) -> Result<()> {
        let note = self
            .notes
            .get(id)
            .ok_or_else(|| DeskError::not_found(Note::COLLECTION, id))?;
        let mut editor = NoteEditor::open(Some(note));

        if clear_attachments {
            let removed = editor.blocks.remove_media();
            debug!("Removed {} attachment block(s) from note {}", removed, id);
        }
        if clear_reminder {
            editor.reminder_date = None;
            editor.reminder_time = None;
        }
        changes.apply(&mut editor)?;

        let Some(draft) = editor.draft() else {
            println!("Nothing to save: a note needs a title, some content or an attachment.");
            return Ok(());
        };

        match self.notes.update(id, NotePatch::from(draft))? {
            Some(note) => println!("Note {} updated successfully", note.id),
            None => return Err(DeskError::not_found(Note::COLLECTION, id)),
        }
        Ok(())
    }

    /// Display notes in text format
    fn display_notes(&self, notes: &[&Note]) {
        if notes.is_empty() {
            println!("No notes found matching the criteria.");
            return;
        }

        // Use terminal width for formatting if available
        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);

        for (i, note) in notes.iter().enumerate() {
            if i > 0 {
                println!("{}", "-".repeat(term_width.min(50)));
            }

            let created_at = note.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
            println!("ID: {} | Created: {}", note.id, created_at);
            println!("Title: {}", style(&note.title).bold());

            if !note.tags.is_empty() {
                let tags = note
                    .tags
                    .iter()
                    .map(|tag| format!("#{}", tag))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("Tags: {}", style(tags).cyan());
            }

            if let (Some(date), Some(time)) = (note.reminder_date, &note.reminder_time) {
                println!("Reminder: {} {}", date, time);
            }

            let first_line = note
                .content
                .lines()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("");
            if !first_line.is_empty() {
                println!("\n{}", preview(first_line, 100));
            }
            if !note.attachments.is_empty() {
                println!("({} attachment(s))", note.attachments.len());
            }
        }

        println!(
            "\nFound {} note{}",
            notes.len(),
            if notes.len() == 1 { "" } else { "s" }
        );
    }

    fn display_notes_json(&self, notes: &[&Note]) -> Result<()> {
        let simplified: Vec<serde_json::Value> = notes
            .iter()
            .map(|note| {
                serde_json::json!({
                    "id": note.id,
                    "title": note.title,
                    "created_at": note.created_at,
                    "updated_at": note.updated_at.to_rfc3339(),
                    "tags": note.tags,
                    "attachments": note.attachments.len(),
                    "reminder_date": note.reminder_date,
                    "reminder_time": note.reminder_time,
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&simplified)?);
        Ok(())
    }

    fn display_projects(&self) {
        let groups = project_groups(self.notes.notes());
        if groups.is_empty() {
            println!("No project notes yet. Tag notes with \"project-*\" to organize them here.");
            return;
        }

        for (tag, notes) in groups {
            println!("{} ({})", style(format!("#{}", tag)).cyan().bold(), notes.len());
            for note in notes {
                println!("  {}  {}", note.id, note.title);
            }
        }
    }

    fn show_note(&self, note: &Note) {
        println!("{}", style(&note.title).bold());
        if !note.tags.is_empty() {
            println!("Tags: {}", style(note.tags.join(", ")).cyan());
        }
        println!(
            "Updated: {}",
            note.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
        println!();

        for block in to_blocks(note).iter() {
            match block.kind {
                BlockKind::Text => {
                    if !block.content.is_empty() {
                        println!("{}\n", block.content);
                    }
                }
                BlockKind::Image | BlockKind::Audio => {
                    let kind = if block.kind == BlockKind::Image {
                        "image"
                    } else {
                        "audio"
                    };
                    println!(
                        "[{}] {} ({} bytes)\n",
                        kind,
                        block.filename.as_deref().unwrap_or(""),
                        block.data.as_ref().map_or(0, Vec::len)
                    );
                }
            }
        }
    }

    fn delete_note(&mut self, id: &str, force: bool) -> Result<()> {
        let note = self
            .notes
            .get(id)
            .ok_or_else(|| DeskError::not_found(Note::COLLECTION, id))?;

        if !force {
            println!("You are about to delete the following note:");
            println!("ID:     {}", note.id);
            println!("Title:  {}", note.title);
            println!("Tags:   {}", note.tags.join(", "));

            println!("\nThis action cannot be undone!");
            print!("Are you sure you want to delete this note? [y/N]: ");
            stdout().flush()?;

            let mut input = String::new();
            stdin().read_line(&mut input)?;
            if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        self.notes.delete(id)?;
        println!("Note {} deleted", id);
        Ok(())
    }

    // ── Presets ──────────────────────────────────────────────────────

    fn handle_preset(&mut self, action: PresetCommand) -> Result<()> {
        match action {
            PresetCommand::Add {
                name,
                work,
                break_minutes,
            } => match self.presets.add(&name, work, break_minutes)? {
                Some(preset) => println!("Preset created with ID: {}", preset.id),
                None => println!("A preset needs a name."),
            },

            PresetCommand::List => {
                if self.presets.presets().is_empty() {
                    println!("No presets saved.");
                }
                for preset in self.presets.presets() {
                    println!(
                        "{}  {} ({}m work / {}m break)",
                        preset.id,
                        style(&preset.name).bold(),
                        preset.work_time,
                        preset.break_time
                    );
                }
            }

            PresetCommand::Delete { id } => {
                if self.presets.get(&id).is_none() {
                    return Err(DeskError::not_found(TimerPreset::COLLECTION, &id));
                }
                self.presets.delete(&id)?;
                println!("Preset {} deleted", id);
            }
        }

        Ok(())
    }

    // ── Timer ────────────────────────────────────────────────────────

    async fn run_timer(
        &mut self,
        preset: Option<String>,
        work: Option<u32>,
        break_minutes: Option<u32>,
        cycles: u32,
    ) -> Result<()> {
        let mut engine = TimerEngine::new(self.config.work_minutes, self.config.break_minutes);
        if let Some(id) = preset {
            let preset = self
                .presets
                .get(&id)
                .ok_or_else(|| DeskError::not_found(TimerPreset::COLLECTION, &id))?;
            engine.apply_preset(preset);
            println!("Using preset {}", style(&preset.name).bold());
        }
        if let Some(minutes) = work {
            engine.set_work_duration(minutes);
        }
        if let Some(minutes) = break_minutes {
            engine.set_break_duration(minutes);
        }

        let (mut timer, mut completions) = FocusTimer::new(engine, self.notifier.clone());
        let mut display = time::interval(Duration::from_secs(1));
        display.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let mut finished = 0;
        timer.start().await;
        info!("Timer running for {} phase(s)", cycles);

        loop {
            tokio::select! {
                completion = completions.recv() => {
                    let Some(completion) = completion else {
                        break;
                    };
                    println!();
                    debug!("{:?} phase finished", completion.finished);
                    finished += 1;
                    if finished >= cycles {
                        break;
                    }
                    timer.start().await;
                }
                _ = &mut shutdown => {
                    timer.pause().await;
                    println!("\nTimer stopped");
                    break;
                }
                _ = display.tick() => {
                    let state = timer.state().await;
                    let label = if state.is_break { "Break" } else { "Focus" };
                    print!("\r{} {}", style(label).bold().cyan(), format_time(state.time_left));
                    stdout().flush()?;
                }
            }
        }

        Ok(())
    }

    // ── Reminders ────────────────────────────────────────────────────

    async fn watch(&mut self) -> Result<()> {
        let mut scheduler =
            NotificationScheduler::new(self.notifier.clone(), self.config.notifications.clone());

        let mut task_snapshots = self.tasks.snapshots();
        let mut note_snapshots = self.notes.snapshots();
        schedule_task_loops(&mut scheduler, &task_snapshots).await;
        schedule_note_loop(&mut scheduler, &note_snapshots).await;

        let mut overdue = HashSet::new();
        self.notify_new_overdue(&mut overdue);

        println!(
            "Watching {} tasks and {} notes. Press Ctrl-C to stop.",
            task_snapshots.len(),
            note_snapshots.len()
        );

        let mut refresh = time::interval(self.config.notifications.refresh_interval());
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        refresh.tick().await; // Initial tick

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = refresh.tick() => {
                    // Failures are logged by the repositories; keep the last mirror
                    if self.tasks.refresh().is_err() || self.notes.refresh().is_err() {
                        warn!("Refresh failed, keeping previous snapshots");
                        continue;
                    }

                    let tasks = self.tasks.snapshots();
                    if tasks != task_snapshots {
                        debug!("Tasks changed, rescheduling task loops");
                        schedule_task_loops(&mut scheduler, &tasks).await;
                        task_snapshots = tasks;
                    }

                    let notes = self.notes.snapshots();
                    if notes != note_snapshots {
                        debug!("Notes changed, rescheduling note reminders");
                        schedule_note_loop(&mut scheduler, &notes).await;
                        note_snapshots = notes;
                    }

                    self.notify_new_overdue(&mut overdue);
                }
            }
        }

        scheduler.stop_all().await;
        println!("\nStopped watching");
        Ok(())
    }

    /// Alerts once per task when it is first seen overdue during `watch`.
    fn notify_new_overdue(&self, seen: &mut HashSet<String>) {
        let now = Local::now();
        for task in self.tasks.tasks() {
            match overdue_alert(task, &now) {
                Some(alert) if seen.insert(task.id.clone()) => {
                    self.notifier.deliver(alert, Lifetime::Scheduled);
                }
                Some(_) => {}
                None => {
                    seen.remove(&task.id);
                }
            }
        }
    }

    // ── Review ───────────────────────────────────────────────────────

    fn show_review(&self) {
        let now = Local::now();
        let stats = weekly_stats(self.tasks.tasks(), self.notes.notes(), &now);

        println!("{}", style("Weekly Review").bold().underlined());
        println!();
        println!("{}", style("This Week's Summary").bold());
        println!("  Total tasks:  {}", style(stats.total_tasks).blue());
        println!("  Completed:    {}", style(stats.completed_tasks).green());
        println!("  Notes added:  {}", style(stats.total_notes).magenta());
        println!();

        println!("{}", style("🎉 Wins & Highlights").bold());
        let highlights = weekly_highlights(self.tasks.tasks(), HIGHLIGHT_LIMIT);
        if highlights.is_empty() {
            println!("  Complete some tasks to see your wins here!");
        }
        for title in highlights {
            println!("  {} {}", style("✓").green(), title);
        }
    }

    // ── Configuration ────────────────────────────────────────────────

    fn handle_config(&mut self, show: bool, reset: bool) -> Result<()> {
        if reset {
            self.config = Config::default();
            self.config.save(&self.config_path)?;
            println!("Configuration reset to defaults at {}", self.config_path.display());
        }

        if show || !reset {
            println!("{}", serde_json::to_string_pretty(&self.config)?);
        }
        Ok(())
    }
}

/// Empty input clears the field, anything else must parse.
fn cleared_or<T>(value: &str, parse: impl Fn(&str) -> Result<T>) -> Result<Option<T>> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        parse(value).map(Some)
    }
}

/// (Re)starts both task loops, or stops them when there is nothing to watch.
async fn schedule_task_loops(scheduler: &mut NotificationScheduler, tasks: &[TaskSnapshot]) {
    if tasks.is_empty() {
        scheduler.stop(LoopKind::UpcomingTasks).await;
        scheduler.stop(LoopKind::HourlyBacklog).await;
        return;
    }
    scheduler.schedule_upcoming_tasks(tasks.to_vec()).await;
    scheduler.schedule_hourly_backlog(tasks.to_vec()).await;
}

async fn schedule_note_loop(scheduler: &mut NotificationScheduler, notes: &[NoteSnapshot]) {
    if notes.is_empty() {
        scheduler.stop(LoopKind::NoteReminders).await;
        return;
    }
    scheduler.schedule_note_reminders(notes.to_vec()).await;
}
