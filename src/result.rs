//! Result record and draft types.

use serde::{Deserialize, Serialize};

use crate::{
    time::{self, NAN_TEXT},
    types::{Discipline, Status},
};

/// Stored outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Participant name.
    pub name: String,
    /// Discipline attempted.
    pub discipline: Discipline,
    /// Final time: `base + additional`, or `NaN` when disqualified.
    #[serde(default)]
    pub time: String,
    /// Measured time.
    #[serde(default)]
    pub base_time: String,
    /// Penalty time.
    #[serde(default)]
    pub additional_time: String,
    /// Outcome.
    pub status: Status,
    /// Free text.
    #[serde(default)]
    pub comment: String,
}

impl ResultRecord {
    /// Materializes a draft. The final time is always derived here and never
    /// taken from the caller; parseable base and additional times are stored
    /// in canonical form.
    pub fn from_draft(draft: ResultDraft) -> Self {
        let time = final_time(&draft);
        Self {
            name: draft.name,
            discipline: draft.discipline,
            time,
            base_time: canonical(draft.base_time),
            additional_time: canonical(draft.additional_time),
            status: draft.status,
            comment: draft.comment,
        }
    }

    /// True when this entry can no longer be overwritten.
    pub fn is_frozen(&self) -> bool {
        self.status == Status::Disqualified
    }
}

/// Insert/update payload used to create a [`ResultRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultDraft {
    /// Participant name.
    pub name: String,
    /// Discipline attempted.
    pub discipline: Discipline,
    /// Measured time text.
    pub base_time: String,
    /// Penalty time text; empty or `"0"` means none.
    pub additional_time: String,
    /// Outcome.
    pub status: Status,
    /// Free text.
    pub comment: String,
}

impl ResultDraft {
    /// Draft with empty times and comment.
    pub fn new(name: impl Into<String>, discipline: Discipline, status: Status) -> Self {
        Self {
            name: name.into(),
            discipline,
            base_time: String::new(),
            additional_time: String::new(),
            status,
            comment: String::new(),
        }
    }

    /// Sets the measured time.
    pub fn base_time(mut self, text: impl Into<String>) -> Self {
        self.base_time = text.into();
        self
    }

    /// Sets the penalty time.
    pub fn additional_time(mut self, text: impl Into<String>) -> Self {
        self.additional_time = text.into();
        self
    }

    /// Sets the comment.
    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.comment = text.into();
        self
    }

    /// First time field that is neither empty nor parseable.
    pub fn invalid_time(&self) -> Option<(&'static str, &str)> {
        [("base time", &self.base_time), ("additional time", &self.additional_time)]
            .into_iter()
            .find(|(_, text)| !text.trim().is_empty() && time::parse(text).is_none())
            .map(|(field, text)| (field, text.as_str()))
    }
}

fn canonical(text: String) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    match time::parse(&text) {
        Some(value) => value.to_string(),
        None => text,
    }
}

fn final_time(draft: &ResultDraft) -> String {
    if draft.status == Status::Disqualified {
        return NAN_TEXT.to_string();
    }
    time::add(&draft.base_time, &draft.additional_time).to_string()
}
