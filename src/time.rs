//! Fixed-point contest time codec.
//!
//! Times are counted in ticks of 100 µs. The canonical text form is
//! `HH:MM:SS.ffff`; the literal `NaN` marks an unmeasurable or disqualifying
//! time and is distinct from zero. Parsing never fails loudly: text that
//! matches no accepted shape yields `None` (rendered as [`INVALID_TEXT`]).

use std::{fmt, time::Duration};

use once_cell::sync::Lazy;
use regex::Regex;

/// Ticks in one second.
pub const TICKS_PER_SECOND: u64 = 10_000;
/// Ticks in one minute.
pub const TICKS_PER_MINUTE: u64 = 60 * TICKS_PER_SECOND;
/// Ticks in one hour.
pub const TICKS_PER_HOUR: u64 = 60 * TICKS_PER_MINUTE;
/// Text of the disqualification sentinel.
pub const NAN_TEXT: &str = "NaN";
/// Text returned by [`normalize`] for unparseable input.
pub const INVALID_TEXT: &str = "No";

const FRACTION_DIGITS: usize = 4;

static THREE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2}):(\d{2})(?:\.(\d+))?$").expect("valid regex"));
static TWO_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid regex"));
static SECONDS_FRACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\.(\d+)$").expect("valid regex"));
static SECONDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)$").expect("valid regex"));

/// A measured or entered time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeValue {
    /// Tick count.
    Ticks(u64),
    /// Unmeasurable; forces disqualification.
    NaN,
}

impl TimeValue {
    /// Zero elapsed time.
    pub const ZERO: TimeValue = TimeValue::Ticks(0);

    /// Converts a wall-clock duration, truncating below one tick.
    pub fn from_duration(d: Duration) -> Self {
        let ticks = d.as_micros() / 100;
        TimeValue::Ticks(u64::try_from(ticks).unwrap_or(u64::MAX))
    }

    /// Tick count, or `None` for the sentinel.
    pub fn ticks(self) -> Option<u64> {
        match self {
            TimeValue::Ticks(t) => Some(t),
            TimeValue::NaN => None,
        }
    }

    /// True for the `NaN` sentinel.
    pub fn is_nan(self) -> bool {
        matches!(self, TimeValue::NaN)
    }

    /// True only for an exact zero tick count.
    pub fn is_zero(self) -> bool {
        self == TimeValue::ZERO
    }

    /// `NaN` absorbs; otherwise tick counts add, saturating at `u64::MAX`.
    pub fn saturating_add(self, other: TimeValue) -> TimeValue {
        match (self, other) {
            (TimeValue::Ticks(a), TimeValue::Ticks(b)) => TimeValue::Ticks(a.saturating_add(b)),
            _ => TimeValue::NaN,
        }
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeValue::Ticks(t) => f.write_str(&format(*t)),
            TimeValue::NaN => f.write_str(NAN_TEXT),
        }
    }
}

/// Parses any accepted time shape.
///
/// Accepted, in priority order after trimming:
/// - `NaN` in any letter case
/// - `H:MM:SS` / `HH:MM:SS`, optionally with a fraction of any length
/// - `A:B`, read as `00:A:B` (A lands in the minutes slot)
/// - `SS.f+` with one or two second digits
/// - bare integer seconds
///
/// Fractions are right-padded or truncated to four digits.
pub fn parse(text: &str) -> Option<TimeValue> {
    let text = text.trim();
    if text.eq_ignore_ascii_case(NAN_TEXT) {
        return Some(TimeValue::NaN);
    }

    if let Some(caps) = THREE_FIELD.captures(text) {
        let hours = caps[1].parse::<u64>().ok()?;
        let minutes = caps[2].parse::<u64>().ok()?;
        let seconds = caps[3].parse::<u64>().ok()?;
        let fraction = caps.get(4).map_or(0, |m| fraction_ticks(m.as_str()));
        return Some(TimeValue::Ticks(
            hours * TICKS_PER_HOUR + minutes * TICKS_PER_MINUTE + seconds * TICKS_PER_SECOND + fraction,
        ));
    }

    if let Some(caps) = TWO_FIELD.captures(text) {
        let minutes = caps[1].parse::<u64>().ok()?;
        let seconds = caps[2].parse::<u64>().ok()?;
        return Some(TimeValue::Ticks(
            minutes * TICKS_PER_MINUTE + seconds * TICKS_PER_SECOND,
        ));
    }

    if let Some(caps) = SECONDS_FRACTION.captures(text) {
        let seconds = caps[1].parse::<u64>().ok()?;
        return Some(TimeValue::Ticks(
            seconds * TICKS_PER_SECOND + fraction_ticks(&caps[2]),
        ));
    }

    if SECONDS.is_match(text) {
        let seconds = text.parse::<u64>().ok()?;
        return seconds.checked_mul(TICKS_PER_SECOND).map(TimeValue::Ticks);
    }

    None
}

/// Canonical text for `text`: `HH:MM:SS.ffff`, `NaN`, or [`INVALID_TEXT`].
pub fn normalize(text: &str) -> String {
    match parse(text) {
        Some(value) => value.to_string(),
        None => INVALID_TEXT.to_string(),
    }
}

/// Renders a tick count as `HH:MM:SS.ffff`.
pub fn format(ticks: u64) -> String {
    let hours = ticks / TICKS_PER_HOUR;
    let minutes = (ticks / TICKS_PER_MINUTE) % 60;
    let seconds = (ticks / TICKS_PER_SECOND) % 60;
    let fraction = ticks % TICKS_PER_SECOND;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{fraction:04}")
}

/// Sort key for stored time text.
///
/// `NaN` maps to `-1`; strictly shaped `H:MM:SS[.f+]` text maps to its ticks;
/// everything else maps to `0`, so corrupt text ranks like an exact zero.
pub fn to_comparable(text: &str) -> i64 {
    let text = text.trim();
    if text.eq_ignore_ascii_case(NAN_TEXT) {
        return -1;
    }

    let Some(caps) = THREE_FIELD.captures(text) else {
        return 0;
    };
    let field = |i: usize| caps[i].parse::<i64>().unwrap_or(0);
    let fraction = caps.get(4).map_or(0, |m| fraction_ticks(m.as_str()));
    field(1) * TICKS_PER_HOUR as i64
        + field(2) * TICKS_PER_MINUTE as i64
        + field(3) * TICKS_PER_SECOND as i64
        + fraction as i64
}

/// Adds two time texts.
///
/// Each operand is normalized first, so `"3"` reads as three seconds and an
/// empty or unparseable operand contributes zero. A `NaN` operand makes the
/// sum `NaN`.
pub fn add(a: &str, b: &str) -> TimeValue {
    let a = to_comparable(&normalize(a));
    let b = to_comparable(&normalize(b));
    if a < 0 || b < 0 {
        return TimeValue::NaN;
    }
    TimeValue::Ticks((a as u64).saturating_add(b as u64))
}

fn fraction_ticks(digits: &str) -> u64 {
    let mut padded: String = digits.chars().take(FRACTION_DIGITS).collect();
    while padded.len() < FRACTION_DIGITS {
        padded.push('0');
    }
    padded.parse().unwrap_or(0)
}
