use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    participant::{Participant, ParticipantPatch},
    persist::{PersistError, json},
    types::{Discipline, MAX_STRING_LENGTH},
};

use super::StoreError;

#[derive(Debug, Default)]
pub struct ParticipantStore {
    participants: Vec<Participant>,
    path: Option<PathBuf>,
}

impl ParticipantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the store backed by `path`; a missing file yields an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        store.load(path)?;
        Ok(store)
    }

    /// Replaces the in-memory list with the contents of `path` and remembers
    /// the path for [`Self::save`].
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let participants: Vec<Participant> = json::read_list(path)?;

        {
            let mut seen = hashbrown::HashSet::new();
            for p in &participants {
                if !seen.insert(p.name.as_str()) {
                    warn!(name = %p.name, path = %path.display(), "duplicate participant in file");
                }
            }
        }

        info!(path = %path.display(), count = participants.len(), "participants loaded");
        self.participants = participants;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let path = self.path.as_deref().ok_or(PersistError::NoPath)?;
        json::write_list(path, &self.participants)?;
        Ok(())
    }

    /// Sets the save target without reading from disk.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn add(&mut self, participant: Participant) -> Result<(), StoreError> {
        validate(&participant)?;
        if self.position(&participant.name).is_some() {
            return Err(StoreError::DuplicateName(participant.name));
        }
        debug!(name = %participant.name, "participant added");
        self.participants.push(participant);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Participant, StoreError> {
        let idx = self
            .position(name)
            .ok_or_else(|| StoreError::MissingParticipant(name.to_string()))?;
        debug!(name, "participant removed");
        Ok(self.participants.remove(idx))
    }

    /// Administrative edit. A rename must not collide with another entry.
    pub fn update(&mut self, name: &str, patch: &ParticipantPatch) -> Result<Participant, StoreError> {
        let idx = self
            .position(name)
            .ok_or_else(|| StoreError::MissingParticipant(name.to_string()))?;

        let mut edited = self.participants[idx].clone();
        patch.apply_to(&mut edited);
        validate(&edited)?;
        if edited.name != name && self.position(&edited.name).is_some() {
            return Err(StoreError::DuplicateName(edited.name));
        }

        self.participants[idx] = edited.clone();
        Ok(edited)
    }

    pub fn get(&self, name: &str) -> Option<Participant> {
        self.position(name).map(|idx| self.participants[idx].clone())
    }

    /// Copy of every participant in registration order.
    pub fn list(&self) -> Vec<Participant> {
        self.participants.clone()
    }

    /// Consumes one try of `discipline` for `name`.
    ///
    /// Returns whether the counter changed; uncounted disciplines and counters
    /// already at zero are not errors.
    pub fn decrement_tries(&mut self, name: &str, discipline: Discipline) -> Result<bool, StoreError> {
        let idx = self
            .position(name)
            .ok_or_else(|| StoreError::MissingParticipant(name.to_string()))?;
        let changed = self.participants[idx].consume_try(discipline);
        if changed {
            debug!(name, %discipline, left = self.participants[idx].tries_count(discipline), "try consumed");
        }
        Ok(changed)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.participants.iter().position(|p| p.name == name)
    }
}

fn validate(p: &Participant) -> Result<(), StoreError> {
    if p.name.trim().is_empty() {
        return Err(StoreError::EmptyName);
    }
    for (field, value) in [("name", &p.name), ("program", &p.program), ("team", &p.team)] {
        if value.len() > MAX_STRING_LENGTH {
            return Err(StoreError::FieldTooLong { field });
        }
    }
    Ok(())
}
