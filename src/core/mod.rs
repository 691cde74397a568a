//! In-memory authoritative stores backed by JSON list files.

/// Participant registry with try counters.
pub mod participants;
/// Append-only result log.
pub mod results;

use crate::{persist::PersistError, types::Discipline};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("participant name cannot be empty")]
    EmptyName,
    #[error("{field} exceeds maximum length")]
    FieldTooLong { field: &'static str },
    #[error("participant with name '{0}' already exists")]
    DuplicateName(String),
    #[error("participant '{0}' not found")]
    MissingParticipant(String),
    #[error("no result found to update for {name} in {discipline}")]
    NoResultToUpdate { name: String, discipline: Discipline },
    #[error("invalid {field} format: {text:?}")]
    InvalidTime { field: &'static str, text: String },
    #[error("{name} is already disqualified in {discipline} and cannot be overwritten")]
    Frozen { name: String, discipline: Discipline },
    #[error(transparent)]
    Persist(#[from] PersistError),
}
