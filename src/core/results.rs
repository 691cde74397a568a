use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use tracing::{debug, info};

use crate::{
    persist::{PersistError, json},
    result::{ResultDraft, ResultRecord},
    time,
    types::{Discipline, Status},
};

use super::StoreError;

/// Positions in the result list per (name, discipline), oldest first.
type EntryIndex = HashMap<(String, Discipline), Vec<usize>>;

/// Append-only result log indexed by (name, discipline).
#[derive(Debug, Default)]
pub struct ResultStore {
    results: Vec<ResultRecord>,
    by_entry: EntryIndex,
    path: Option<PathBuf>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        store.load(path)?;
        Ok(store)
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let results: Vec<ResultRecord> = json::read_list(path)?;
        info!(path = %path.display(), count = results.len(), "results loaded");

        self.by_entry.clear();
        for (idx, rec) in results.iter().enumerate() {
            self.by_entry
                .entry((rec.name.clone(), rec.discipline))
                .or_default()
                .push(idx);
        }
        self.results = results;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let path = self.path.as_deref().ok_or(PersistError::NoPath)?;
        json::write_list(path, &self.results)?;
        Ok(())
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends a result, deriving its final time from the draft.
    pub fn add(&mut self, draft: ResultDraft) -> Result<ResultRecord, StoreError> {
        if draft.name.trim().is_empty() {
            return Err(StoreError::EmptyName);
        }
        check_times(&draft)?;

        let rec = ResultRecord::from_draft(draft);
        let idx = self.results.len();
        self.by_entry
            .entry((rec.name.clone(), rec.discipline))
            .or_default()
            .push(idx);
        self.results.push(rec.clone());
        debug!(name = %rec.name, discipline = %rec.discipline, status = %rec.status, time = %rec.time, "result added");
        Ok(rec)
    }

    /// Appends a result and writes the file when a path is set. A failed
    /// write leaves the in-memory list as it was.
    pub fn commit(&mut self, draft: ResultDraft) -> Result<ResultRecord, StoreError> {
        let rec = self.add(draft)?;
        if self.path.is_some() {
            if let Err(err) = self.save() {
                self.discard_last();
                return Err(err);
            }
        }
        Ok(rec)
    }

    /// Replaces the most recent entry for the draft's (name, discipline).
    ///
    /// A Disqualified entry is never overwritten.
    pub fn update_last(&mut self, draft: ResultDraft) -> Result<ResultRecord, StoreError> {
        check_times(&draft)?;
        let key = (draft.name.clone(), draft.discipline);
        let idx = self
            .by_entry
            .get(&key)
            .and_then(|positions| positions.last().copied())
            .ok_or_else(|| StoreError::NoResultToUpdate {
                name: draft.name.clone(),
                discipline: draft.discipline,
            })?;

        if self.results[idx].is_frozen() {
            return Err(StoreError::Frozen {
                name: draft.name,
                discipline: draft.discipline,
            });
        }

        let rec = ResultRecord::from_draft(draft);
        self.results[idx] = rec.clone();
        debug!(name = %rec.name, discipline = %rec.discipline, status = %rec.status, "result updated");
        Ok(rec)
    }

    pub fn last_for(&self, name: &str, discipline: Discipline) -> Option<ResultRecord> {
        self.by_entry
            .get(&(name.to_string(), discipline))
            .and_then(|positions| positions.last())
            .map(|idx| self.results[*idx].clone())
    }

    pub fn list_all(&self) -> Vec<ResultRecord> {
        self.results.clone()
    }

    pub fn list_by_discipline(&self, discipline: Discipline) -> Vec<ResultRecord> {
        self.results
            .iter()
            .filter(|r| r.discipline == discipline)
            .cloned()
            .collect()
    }

    pub fn list_by_participant(&self, name: &str) -> Vec<ResultRecord> {
        self.results
            .iter()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }

    /// Ranking for `discipline`: Pass entries first, then by final time
    /// ascending with `NaN` last. Ties keep insertion order.
    pub fn standings(&self, discipline: Discipline) -> Vec<ResultRecord> {
        let mut ranked = self.list_by_discipline(discipline);
        ranked.sort_by_key(|r| {
            let key = time::to_comparable(&r.time);
            (r.status != Status::Pass, key < 0, key)
        });
        ranked
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    fn discard_last(&mut self) {
        let Some(rec) = self.results.pop() else {
            return;
        };
        let key = (rec.name, rec.discipline);
        if let Some(positions) = self.by_entry.get_mut(&key) {
            positions.pop();
            if positions.is_empty() {
                self.by_entry.remove(&key);
            }
        }
    }
}

fn check_times(draft: &ResultDraft) -> Result<(), StoreError> {
    match draft.invalid_time() {
        Some((field, text)) => Err(StoreError::InvalidTime {
            field,
            text: text.to_string(),
        }),
        None => Ok(()),
    }
}
