//! Runtime event stream payloads.

use crate::{result::ResultRecord, types::Discipline};

/// Events emitted from the single-writer contest loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContestEvent {
    /// A chugger was loaded.
    Loaded {
        /// Participant name.
        name: String,
    },
    /// The loaded chugger passed the ready check.
    ReadyChecked {
        /// Participant name.
        name: String,
    },
    /// The clock started.
    Started {
        /// Participant name.
        name: String,
    },
    /// The clock stopped and the base time was filled.
    Stopped {
        /// Participant name.
        name: String,
        /// Measured time as stored in the form.
        base_time: String,
    },
    /// A result was recorded.
    Committed {
        /// Stored record.
        record: ResultRecord,
    },
    /// The chugger was skipped.
    Skipped {
        /// Participant name.
        name: String,
    },
    /// Heat state was cleared.
    Reset,
    /// A new discipline was selected.
    DisciplineChanged {
        /// Selected discipline.
        discipline: Discipline,
        /// Size of the refreshed eligible list.
        eligible: usize,
    },
    /// Registered participants changed.
    ParticipantsChanged,
    /// Live timer text.
    Tick {
        /// Display text.
        display: String,
    },
}
