//! Participant record and administrative patch types.

use serde::{Deserialize, Serialize};

use crate::types::Discipline;

/// Registered contestant. Try counters are decimal strings as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Participant {
    /// Unique name.
    #[serde(default)]
    pub name: String,
    /// Study program.
    #[serde(default)]
    pub program: String,
    /// Team.
    #[serde(default)]
    pub team: String,
    /// Remaining Bottle tries.
    #[serde(default)]
    pub bottle: String,
    /// Remaining Half Tankard tries.
    #[serde(default)]
    pub half_tankard: String,
    /// Remaining Full Tankard tries.
    #[serde(default)]
    pub full_tankard: String,
}

impl Participant {
    /// New participant with the default try allotment for every counted
    /// discipline.
    pub fn register(
        name: impl Into<String>,
        program: impl Into<String>,
        team: impl Into<String>,
    ) -> Self {
        let tries = |d: Discipline| d.default_tries().map(|n| n.to_string()).unwrap_or_default();
        Self {
            name: name.into(),
            program: program.into(),
            team: team.into(),
            bottle: tries(Discipline::Bottle),
            half_tankard: tries(Discipline::HalfTankard),
            full_tankard: tries(Discipline::FullTankard),
        }
    }

    /// Raw counter text for `discipline`, or `None` for uncounted disciplines.
    pub fn tries_for(&self, discipline: Discipline) -> Option<&str> {
        match discipline {
            Discipline::Bottle => Some(&self.bottle),
            Discipline::HalfTankard => Some(&self.half_tankard),
            Discipline::FullTankard => Some(&self.full_tankard),
            _ => None,
        }
    }

    /// Numeric counter value; non-numeric text reads as 0.
    pub fn tries_count(&self, discipline: Discipline) -> u32 {
        self.tries_for(discipline)
            .and_then(|t| t.trim().parse().ok())
            .unwrap_or(0)
    }

    /// True when the counter for `discipline` is present and not `"0"`.
    pub fn is_eligible(&self, discipline: Discipline) -> bool {
        self.tries_for(discipline)
            .is_some_and(|t| !t.is_empty() && t != "0")
    }

    /// Consumes one try. Returns `true` when the counter changed.
    ///
    /// Uncounted disciplines, non-numeric counters and zero counters are left
    /// untouched.
    pub fn consume_try(&mut self, discipline: Discipline) -> bool {
        let slot = match discipline {
            Discipline::Bottle => &mut self.bottle,
            Discipline::HalfTankard => &mut self.half_tankard,
            Discipline::FullTankard => &mut self.full_tankard,
            _ => return false,
        };
        match slot.trim().parse::<u32>() {
            Ok(n) if n > 0 => {
                *slot = (n - 1).to_string();
                true
            }
            _ => false,
        }
    }
}

/// Sparse edit where each `Some` field overwrites the participant value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParticipantPatch {
    /// Replacement name.
    pub name: Option<String>,
    /// Replacement program.
    pub program: Option<String>,
    /// Replacement team.
    pub team: Option<String>,
    /// Replacement Bottle counter.
    pub bottle: Option<String>,
    /// Replacement Half Tankard counter.
    pub half_tankard: Option<String>,
    /// Replacement Full Tankard counter.
    pub full_tankard: Option<String>,
}

impl ParticipantPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Applies this patch in place to `p`.
    pub fn apply_to(&self, p: &mut Participant) {
        if let Some(v) = &self.name {
            p.name = v.clone();
        }
        if let Some(v) = &self.program {
            p.program = v.clone();
        }
        if let Some(v) = &self.team {
            p.team = v.clone();
        }
        if let Some(v) = &self.bottle {
            p.bottle = v.clone();
        }
        if let Some(v) = &self.half_tankard {
            p.half_tankard = v.clone();
        }
        if let Some(v) = &self.full_tankard {
            p.full_tankard = v.clone();
        }
    }
}
