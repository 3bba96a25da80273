//! Persisted, newest-first history of generated images.
//!
//! The whole record list lives in a single JSON file (the history slot).
//! Every mutation rewrites the slot as one unit: the list is written to a
//! sibling temp file which is then renamed over the slot, so an interrupted
//! write never leaves a half-written history behind.

use crate::error::{PixelGenError, Result};
use crate::image::GeneratedImageRecord;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Ordered collection of generated-image records backed by a file.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    records: Vec<GeneratedImageRecord>,
    load_warning: Option<String>,
    unreadable: Option<String>,
}

impl HistoryStore {
    /// Opens the store at `path` and loads whatever it holds.
    ///
    /// A missing slot is an empty history. A corrupt slot is also treated
    /// as empty; the reason is kept in [`load_warning`](Self::load_warning).
    /// A slot that exists but cannot be read is never overwritten: the
    /// store starts empty and every mutation fails with
    /// [`PixelGenError::PersistenceUnavailable`].
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self {
            path: path.into(),
            records: Vec::new(),
            load_warning: None,
            unreadable: None,
        };
        store.load();
        store
    }

    fn load(&mut self) {
        self.records = Vec::new();
        self.load_warning = None;
        self.unreadable = None;

        match read_slot(&self.path) {
            Ok(records) => {
                let (records, dropped) = dedupe(records);
                if dropped > 0 {
                    tracing::warn!(
                        path = %self.path.display(),
                        dropped,
                        "dropped history records with duplicate ids"
                    );
                    self.load_warning =
                        Some(format!("dropped {dropped} record(s) with duplicate ids"));
                }
                tracing::debug!(
                    path = %self.path.display(),
                    records = records.len(),
                    "history loaded"
                );
                self.records = records;
            }
            Err(PixelGenError::PersistenceUnavailable(reason)) => {
                tracing::error!(
                    path = %self.path.display(),
                    "history could not be read, leaving it untouched: {reason}"
                );
                self.load_warning = Some(format!("history could not be read: {reason}"));
                self.unreadable = Some(reason);
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "ignoring corrupt history: {e}"
                );
                self.load_warning = Some(e.to_string());
            }
        }
    }

    /// Returns what the last load had to discard or skip, if anything.
    pub fn load_warning(&self) -> Option<&str> {
        self.load_warning.as_deref()
    }

    /// Current records, newest first.
    pub fn all(&self) -> &[GeneratedImageRecord] {
        &self.records
    }

    /// Looks up a record by id.
    pub fn get(&self, id: &str) -> Option<&GeneratedImageRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the history holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Inserts `record` as the newest entry and persists.
    ///
    /// If persisting fails the insert is undone and the error returned.
    pub fn prepend(&mut self, record: GeneratedImageRecord) -> Result<()> {
        if self.get(&record.id).is_some() {
            return Err(PixelGenError::DuplicateRecord(record.id));
        }

        self.records.insert(0, record);
        if let Err(e) = self.persist() {
            self.records.remove(0);
            return Err(e);
        }
        Ok(())
    }

    /// Removes the record with `id` and persists. Returns whether one was
    /// removed; an unknown id is a no-op.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let Some(index) = self.records.iter().position(|record| record.id == id) else {
            return Ok(false);
        };

        let removed = self.records.remove(index);
        if let Err(e) = self.persist() {
            self.records.insert(index, removed);
            return Err(e);
        }
        Ok(true)
    }

    /// Removes every record and persists the empty history.
    pub fn clear(&mut self) -> Result<()> {
        let previous = std::mem::take(&mut self.records);
        if let Err(e) = self.persist() {
            self.records = previous;
            return Err(e);
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        if let Some(reason) = &self.unreadable {
            return Err(PixelGenError::PersistenceUnavailable(reason.clone()));
        }
        write_slot(&self.path, &self.records)
    }
}

fn read_slot(path: &Path) -> Result<Vec<GeneratedImageRecord>> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PixelGenError::PersistenceUnavailable(e.to_string())),
    };
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&raw).map_err(|e| PixelGenError::PersistenceReadCorrupt(e.to_string()))
}

/// Keeps the first record for each id.
fn dedupe(records: Vec<GeneratedImageRecord>) -> (Vec<GeneratedImageRecord>, usize) {
    let total = records.len();
    let mut seen = HashSet::new();
    let kept: Vec<_> = records
        .into_iter()
        .filter(|record| seen.insert(record.id.clone()))
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}

fn write_slot(path: &Path, records: &[GeneratedImageRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, serde_json::to_vec(records)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
