//! Shared contest enums and limits.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Maximum byte length of a participant name, program or team.
pub const MAX_STRING_LENGTH: usize = 255;
/// Tries granted for the Bottle discipline on registration.
pub const BOTTLE_TRIES: u32 = 3;
/// Tries granted for the Half Tankard discipline on registration.
pub const HALF_TANKARD_TRIES: u32 = 2;
/// Tries granted for the Full Tankard discipline on registration.
pub const FULL_TANKARD_TRIES: u32 = 1;
/// Comment attached to a bottle result disqualified for spilling.
pub const OVERFLOW_COMMENT: &str = "Overflow";

/// Contest category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Discipline {
    /// Bottle, with a per-participant try counter.
    Bottle,
    /// Half tankard, with a per-participant try counter.
    #[serde(rename = "Half Tankard")]
    HalfTankard,
    /// Full tankard, with a per-participant try counter.
    #[serde(rename = "Full Tankard")]
    FullTankard,
    /// Team relay.
    #[serde(rename = "Bier Staphette")]
    BierStaphette,
    /// Mixed-vessel medley.
    #[serde(rename = "Mega Medley")]
    MegaMedley,
    /// Team against team.
    #[serde(rename = "Team Clash")]
    TeamClash,
}

impl Discipline {
    /// Every discipline in display order.
    pub const ALL: [Discipline; 6] = [
        Discipline::Bottle,
        Discipline::HalfTankard,
        Discipline::FullTankard,
        Discipline::BierStaphette,
        Discipline::MegaMedley,
        Discipline::TeamClash,
    ];

    /// Wire and display name.
    pub fn as_str(self) -> &'static str {
        match self {
            Discipline::Bottle => "Bottle",
            Discipline::HalfTankard => "Half Tankard",
            Discipline::FullTankard => "Full Tankard",
            Discipline::BierStaphette => "Bier Staphette",
            Discipline::MegaMedley => "Mega Medley",
            Discipline::TeamClash => "Team Clash",
        }
    }

    /// True for the three disciplines that carry an attempt counter.
    pub fn has_tries(self) -> bool {
        matches!(
            self,
            Discipline::Bottle | Discipline::HalfTankard | Discipline::FullTankard
        )
    }

    /// Tries granted on registration, if the discipline is counted.
    pub fn default_tries(self) -> Option<u32> {
        match self {
            Discipline::Bottle => Some(BOTTLE_TRIES),
            Discipline::HalfTankard => Some(HALF_TANKARD_TRIES),
            Discipline::FullTankard => Some(FULL_TANKARD_TRIES),
            _ => None,
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when text names no known discipline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown discipline: {0:?}")]
pub struct UnknownDiscipline(pub String);

impl FromStr for Discipline {
    type Err = UnknownDiscipline;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Discipline::ALL
            .into_iter()
            .find(|d| {
                d.as_str().eq_ignore_ascii_case(wanted)
                    || d.as_str().replace(' ', "_").eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| UnknownDiscipline(s.to_string()))
    }
}

/// Outcome of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Finished and valid.
    Pass,
    /// Disqualified; the stored time is always `NaN`.
    Disqualified,
    /// Did not finish.
    Fail,
}

impl Status {
    /// Wire and display name.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pass => "Pass",
            Status::Disqualified => "Disqualified",
            Status::Fail => "Fail",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of the contest directory the reporting tool reads,
/// `<DisplayName>_<YYYY-MM-DD>_<Official|Unofficial>`.
pub fn contest_dir_name(display_name: &str, date: &str, official: bool) -> String {
    let kind = if official { "Official" } else { "Unofficial" };
    format!("{}_{}_{}", display_name.trim(), date.trim(), kind)
}
