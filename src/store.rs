//! Table storage for notes, tasks and timer presets.
//!
//! Repositories never talk to a concrete database: they are handed a
//! [`Table`] per collection. [`JsonTable`] keeps a collection as one JSON
//! array on disk, replaced atomically on every write, and [`MemoryTable`]
//! keeps it in process.
use std::{
    collections::HashSet,
    fs,
    io::Write,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use log::{debug, error, info, trace};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use crate::{DeskError, Note, Result, Task, TimerPreset};

/// A persisted entity with a stable string id.
pub trait Record: Clone + Serialize + DeserializeOwned {
    /// Name of the collection the record is stored in
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

/// Capability set of one entity collection.
///
/// There are no transactions and no query language: callers load everything
/// and filter in memory. Insertion order is preserved by `get_all`.
pub trait Table<T: Record> {
    fn get_all(&self) -> Result<Vec<T>>;

    fn insert(&mut self, record: &T) -> Result<()>;

    /// Replaces the stored record with the given id.
    fn update(&mut self, id: &str, record: &T) -> Result<()>;

    /// Deleting an id that is not stored is not an error.
    fn delete(&mut self, id: &str) -> Result<()>;

    /// Returns how many records were removed.
    fn delete_many(&mut self, ids: &HashSet<String>) -> Result<usize>;
}

/// In-process table, mostly useful for tests and ephemeral sessions.
#[derive(Debug, Clone)]
pub struct MemoryTable<T> {
    records: Vec<T>,
}

impl<T> Default for MemoryTable<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T: Record> MemoryTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<T>) -> Self {
        Self { records }
    }
}

impl<T: Record> Table<T> for MemoryTable<T> {
    fn get_all(&self) -> Result<Vec<T>> {
        Ok(self.records.clone())
    }

    fn insert(&mut self, record: &T) -> Result<()> {
        insert_record(&mut self.records, record)
    }

    fn update(&mut self, id: &str, record: &T) -> Result<()> {
        update_record(&mut self.records, id, record)
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        self.records.retain(|r| r.id() != id);
        Ok(())
    }

    fn delete_many(&mut self, ids: &HashSet<String>) -> Result<usize> {
        let before = self.records.len();
        self.records.retain(|r| !ids.contains(r.id()));
        Ok(before - self.records.len())
    }
}

/// A collection stored as a JSON array at `<dir>/<collection>.json`.
#[derive(Debug, Clone)]
pub struct JsonTable<T> {
    path: PathBuf,
    _record: PhantomData<T>,
}

impl<T: Record> JsonTable<T> {
    /// Opens the table inside `dir`, creating the directory if needed.
    /// The file itself is created on first write.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            debug!("Data directory does not exist, creating: {}", dir.display());
            fs::create_dir_all(dir).map_err(|e| {
                error!("Failed to create data directory {}: {}", dir.display(), e);
                DeskError::store(T::COLLECTION, e)
            })?;
        }

        let path = dir.join(format!("{}.json", T::COLLECTION));
        info!("Opened {} table at {}", T::COLLECTION, path.display());
        Ok(Self {
            path,
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            trace!("{} does not exist yet, treating as empty", self.path.display());
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.path).map_err(|e| {
            error!("Failed to read {}: {}", self.path.display(), e);
            DeskError::store(T::COLLECTION, e)
        })?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw).map_err(|e| {
            error!("Failed to parse {}: {}", self.path.display(), e);
            DeskError::store(T::COLLECTION, e)
        })
    }

    /// Writes the whole collection through a temporary file in the same
    /// directory so readers never observe a partial document.
    fn write(&self, records: &[T]) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            DeskError::store(T::COLLECTION, e)
        })?;

        trace!("Serializing {} {} records", records.len(), T::COLLECTION);
        let json = serde_json::to_string_pretty(records).map_err(|e| {
            error!("Failed to serialize {}: {}", T::COLLECTION, e);
            DeskError::store(T::COLLECTION, e)
        })?;

        temp_file
            .write_all(json.as_bytes())
            .and_then(|_| temp_file.flush())
            .map_err(|e| {
                error!("Failed to write temporary file: {}", e);
                DeskError::store(T::COLLECTION, e)
            })?;

        temp_file.persist(&self.path).map_err(|e| {
            error!("Failed to persist {}: {}", self.path.display(), e.error);
            DeskError::store(T::COLLECTION, e.error)
        })?;

        debug!("Wrote {} {} records", records.len(), T::COLLECTION);
        Ok(())
    }
}

impl<T: Record> Table<T> for JsonTable<T> {
    fn get_all(&self) -> Result<Vec<T>> {
        self.read()
    }

    fn insert(&mut self, record: &T) -> Result<()> {
        let mut records = self.read()?;
        insert_record(&mut records, record)?;
        self.write(&records)
    }

    fn update(&mut self, id: &str, record: &T) -> Result<()> {
        let mut records = self.read()?;
        update_record(&mut records, id, record)?;
        self.write(&records)
    }

    fn delete(&mut self, id: &str) -> Result<()> {
        let mut records = self.read()?;
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            debug!("Nothing to delete for {} {}", T::COLLECTION, id);
            return Ok(());
        }
        self.write(&records)
    }

    fn delete_many(&mut self, ids: &HashSet<String>) -> Result<usize> {
        let mut records = self.read()?;
        let before = records.len();
        records.retain(|r| !ids.contains(r.id()));
        let removed = before - records.len();
        if removed > 0 {
            self.write(&records)?;
        }
        Ok(removed)
    }
}

fn insert_record<T: Record>(records: &mut Vec<T>, record: &T) -> Result<()> {
    if records.iter().any(|r| r.id() == record.id()) {
        return Err(DeskError::AlreadyExists {
            collection: T::COLLECTION.to_string(),
            id: record.id().to_string(),
        });
    }
    records.push(record.clone());
    Ok(())
}

fn update_record<T: Record>(records: &mut [T], id: &str, record: &T) -> Result<()> {
    match records.iter_mut().find(|r| r.id() == id) {
        Some(slot) => {
            *slot = record.clone();
            Ok(())
        }
        None => Err(DeskError::not_found(T::COLLECTION, id)),
    }
}

/// The three JSON tables of one data directory.
pub struct JsonStore {
    pub notes: JsonTable<Note>,
    pub tasks: JsonTable<Task>,
    pub presets: JsonTable<TimerPreset>,
}

impl JsonStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        Ok(Self {
            notes: JsonTable::open(data_dir)?,
            tasks: JsonTable::open(data_dir)?,
            presets: JsonTable::open(data_dir)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NoteDraft, TaskDraft};

    #[test]
    fn json_table_keeps_insertion_order_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut table: JsonTable<Task> = JsonTable::open(dir.path()).unwrap();
        let titles = ["first", "second", "third"];
        for title in titles {
            table.insert(&Task::new(TaskDraft::titled(title))).unwrap();
        }

        let reopened: JsonTable<Task> = JsonTable::open(dir.path()).unwrap();
        let loaded: Vec<_> = reopened
            .get_all()
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(loaded, titles);
    }

    #[test]
    fn json_table_update_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut table: JsonTable<Note> = JsonTable::open(dir.path()).unwrap();
        let note = Note::new(NoteDraft {
            title: "Groceries".to_string(),
            ..Default::default()
        });
        table.insert(&note).unwrap();

        let mut edited = note.clone();
        edited.content = "milk".to_string();
        table.update(&note.id, &edited).unwrap();
        assert_eq!(table.get_all().unwrap()[0].content, "milk");

        let missing = table.update("nope", &edited);
        assert!(matches!(missing, Err(DeskError::NotFound { .. })));

        table.delete(&note.id).unwrap();
        table.delete(&note.id).unwrap();
        assert!(table.get_all().unwrap().is_empty());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut table = MemoryTable::new();
        let task = Task::new(TaskDraft::titled("a"));
        table.insert(&task).unwrap();
        let err = table.insert(&task).unwrap_err();
        assert!(err.is_store_failure());
    }

    #[test]
    fn delete_many_counts_removed() {
        let a = Task::new(TaskDraft::titled("a"));
        let b = Task::new(TaskDraft::titled("b"));
        let mut table = MemoryTable::with_records(vec![a.clone(), b.clone()]);
        let ids: HashSet<String> = [a.id.clone(), "ghost".to_string()].into_iter().collect();
        assert_eq!(table.delete_many(&ids).unwrap(), 1);
        assert_eq!(table.get_all().unwrap(), vec![b]);
    }

    #[test]
    fn corrupt_file_is_a_store_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tasks.json"), "{not json").unwrap();
        let table: JsonTable<Task> = JsonTable::open(dir.path()).unwrap();
        assert!(matches!(table.get_all(), Err(DeskError::Store { .. })));
    }
}
