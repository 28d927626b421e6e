//! In-memory mirrors of the stored collections.
//!
//! Every repository owns one [`Table`] and a copy of its records. The copy is
//! only changed after the table accepted the write, so a failing store
//! leaves the mirror exactly as it was.
use chrono::{DateTime, TimeZone, Utc};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use log::{debug, error, info, trace};
use std::collections::HashSet;

use crate::{
    filter_notes, Note, NoteDraft, NotePatch, NoteSnapshot, NoteView, Result, Table, Task,
    TaskDraft, TaskSnapshot, TimerPreset,
};

fn log_failure<T>(action: &str, result: Result<T>) -> Result<T> {
    result.map_err(|e| {
        error!("Failed to {}: {}", action, e);
        e
    })
}

pub struct TaskRepository<T: Table<Task>> {
    table: T,
    tasks: Vec<Task>,
    loading: bool,
}

impl<T: Table<Task>> TaskRepository<T> {
    /// Wraps a table. Nothing is read until [`load`](Self::load).
    pub fn new(table: T) -> Self {
        Self {
            table,
            tasks: Vec::new(),
            loading: true,
        }
    }

    /// Reads every task from the table into the mirror.
    pub fn load(&mut self) -> Result<()> {
        let result = log_failure("load tasks", self.table.get_all());
        self.loading = false;
        self.tasks = result?;
        debug!("Loaded {} tasks", self.tasks.len());
        Ok(())
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.load()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn add(&mut self, title: &str) -> Result<Task> {
        self.add_scheduled(TaskDraft::titled(title))
    }

    pub fn add_scheduled(&mut self, draft: TaskDraft) -> Result<Task> {
        let task = Task::new(draft);
        log_failure("add task", self.table.insert(&task))?;
        info!("Added task {}", task.id);
        self.tasks.push(task.clone());
        Ok(task)
    }

    /// Flips completion of a task. `Ok(None)` when the id is unknown.
    pub fn toggle(&mut self, id: &str) -> Result<Option<Task>> {
        let Some(current) = self.get(id) else {
            debug!("Toggle ignored, no task {}", id);
            return Ok(None);
        };

        let mut task = current.clone();
        task.set_completed(!task.completed, Utc::now());
        log_failure("toggle task", self.table.update(id, &task))?;
        self.replace(task.clone());
        Ok(Some(task))
    }

    /// Stores an edited task, restoring the `completed_at` invariant first.
    pub fn update(&mut self, task: Task) -> Result<Task> {
        let task = task.normalized(Utc::now());
        log_failure("update task", self.table.update(&task.id, &task))?;
        self.replace(task.clone());
        Ok(task)
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        log_failure("delete task", self.table.delete(id))?;
        self.tasks.retain(|t| t.id != id);
        Ok(())
    }

    /// Removes every completed task in one store call. Returns how many went.
    pub fn clear_completed(&mut self) -> Result<usize> {
        let ids: HashSet<String> = self
            .tasks
            .iter()
            .filter(|t| t.completed)
            .map(|t| t.id.clone())
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let removed = log_failure("clear completed tasks", self.table.delete_many(&ids))?;
        self.tasks.retain(|t| !ids.contains(&t.id));
        info!("Cleared {} completed tasks", removed);
        Ok(removed)
    }

    /// Tasks whose effective date is `now`'s local date.
    pub fn today_tasks<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<&Task> {
        let tz = now.timezone();
        let today = now.date_naive();
        self.tasks
            .iter()
            .filter(|t| t.effective_date(&tz) == today)
            .collect()
    }

    pub fn completed_today_count<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> usize {
        self.today_tasks(now).iter().filter(|t| t.completed).count()
    }

    pub fn total_today_count<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> usize {
        self.today_tasks(now).len()
    }

    /// Tasks in dashboard order.
    pub fn sorted(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().collect();
        tasks.sort_by(|a, b| a.dashboard_cmp(b));
        tasks
    }

    pub fn snapshots(&self) -> Vec<TaskSnapshot> {
        self.tasks.iter().map(TaskSnapshot::from).collect()
    }

    fn replace(&mut self, task: Task) {
        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *slot = task;
        }
    }
}

pub struct NoteRepository<T: Table<Note>> {
    table: T,
    notes: Vec<Note>,
    loading: bool,
}

impl<T: Table<Note>> NoteRepository<T> {
    pub fn new(table: T) -> Self {
        Self {
            table,
            notes: Vec::new(),
            loading: true,
        }
    }

    pub fn load(&mut self) -> Result<()> {
        let result = log_failure("load notes", self.table.get_all());
        self.loading = false;
        self.notes = result?;
        debug!("Loaded {} notes", self.notes.len());
        Ok(())
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.load()
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Stores a new note. Empty drafts are dropped without touching the store.
    pub fn add(&mut self, draft: NoteDraft) -> Result<Option<Note>> {
        if draft.is_empty() {
            debug!("Ignoring empty note");
            return Ok(None);
        }

        let note = Note::new(draft);
        log_failure("add note", self.table.insert(&note))?;
        info!("Created note {}", note.id);
        self.notes.push(note.clone());
        Ok(Some(note))
    }

    /// Merges `patch` into the stored note. `Ok(None)` when the id is unknown.
    pub fn update(&mut self, id: &str, patch: NotePatch) -> Result<Option<Note>> {
        let Some(current) = self.get(id) else {
            debug!("Update ignored, no note {}", id);
            return Ok(None);
        };

        let note = current.patched(patch);
        log_failure("update note", self.table.update(id, &note))?;
        if let Some(slot) = self.notes.iter_mut().find(|n| n.id == id) {
            *slot = note.clone();
        }
        Ok(Some(note))
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        log_failure("delete note", self.table.delete(id))?;
        self.notes.retain(|n| n.id != id);
        Ok(())
    }

    /// Fuzzy search over title, content and tags, best match first.
    ///
    /// Title matches weigh double. A blank query returns every note in
    /// stored order.
    pub fn search(&self, query: &str) -> Vec<&Note> {
        let query = query.trim();
        if query.is_empty() {
            return self.notes.iter().collect();
        }

        info!("Searching notes with query: '{}'", query);
        let matcher = SkimMatcherV2::default();

        let mut scored: Vec<(i64, &Note)> = self
            .notes
            .iter()
            .filter_map(|note| {
                let title_score = matcher.fuzzy_match(&note.title, query).unwrap_or(0);
                let content_score = matcher.fuzzy_match(&note.content, query).unwrap_or(0);
                let tag_score = note
                    .tags
                    .iter()
                    .filter_map(|tag| matcher.fuzzy_match(tag, query))
                    .max()
                    .unwrap_or(0);

                let score = title_score * 2 + content_score + tag_score;
                trace!("Note {} scored {}", note.id, score);
                (score > 0).then_some((score, note))
            })
            .collect();

        // Stable, so ties keep stored order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, note)| note).collect()
    }

    pub fn by_tag(&self, tag: &str) -> Vec<&Note> {
        self.notes.iter().filter(|n| n.has_tag(tag)).collect()
    }

    /// Notes shown for `view`, narrowed to `tag` when one is given.
    pub fn listed<Tz: TimeZone>(
        &self,
        view: NoteView,
        tag: Option<&str>,
        now: &DateTime<Tz>,
    ) -> Vec<&Note> {
        let mut notes = filter_notes(&self.notes, view, now);
        if let Some(tag) = tag {
            let tagged: HashSet<&str> =
                self.by_tag(tag).into_iter().map(|n| n.id.as_str()).collect();
            notes.retain(|n| tagged.contains(n.id.as_str()));
        }
        notes
    }

    pub fn snapshots(&self) -> Vec<NoteSnapshot> {
        self.notes.iter().map(NoteSnapshot::from).collect()
    }
}

pub struct PresetRepository<T: Table<TimerPreset>> {
    table: T,
    presets: Vec<TimerPreset>,
    loading: bool,
}

impl<T: Table<TimerPreset>> PresetRepository<T> {
    pub fn new(table: T) -> Self {
        Self {
            table,
            presets: Vec::new(),
            loading: true,
        }
    }

    pub fn load(&mut self) -> Result<()> {
        let result = log_failure("load timer presets", self.table.get_all());
        self.loading = false;
        self.presets = result?;
        Ok(())
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.load()
    }

    pub fn presets(&self) -> &[TimerPreset] {
        &self.presets
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// `Ok(None)` for a blank name.
    pub fn add(&mut self, name: &str, work_time: u32, break_time: u32) -> Result<Option<TimerPreset>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let preset = TimerPreset::new(name.to_string(), work_time, break_time);
        log_failure("add timer preset", self.table.insert(&preset))?;
        self.presets.push(preset.clone());
        Ok(Some(preset))
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        log_failure("delete timer preset", self.table.delete(id))?;
        self.presets.retain(|p| p.id != id);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&TimerPreset> {
        self.presets.iter().find(|p| p.id == id)
    }
}
