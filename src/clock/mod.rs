//! Interchangeable time-measurement strategies.
//!
//! A [`ClockSource`] measures one attempt with either the software stopwatch
//! or the external timing device, chosen by [`ClockMode`]. Both strategies
//! publish their live reading to the same display mailbox, so consumers keep
//! one subscription across mode switches.

/// Timing-device backed clock.
pub mod external;
/// Software stopwatch.
pub mod internal;

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    feed::ExternalClockFeed,
    mailbox::Mailbox,
    time::{self, TimeValue},
};

use self::{external::ExternalClock, internal::InternalClock};

/// Default period of the internal display refresh.
pub const DEFAULT_REFRESH: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    #[error("clock is not running")]
    NotRunning,
    #[error("clock is already running")]
    AlreadyRunning,
    #[error("external clock selected but no timing device is configured")]
    FeedNotConfigured,
    #[error("external clock is not connected; connect it first")]
    FeedNotConnected,
    #[error("external clock produced no reading before stop")]
    NoReading,
    #[error("external clock reading {0:?} is not a time")]
    InvalidReading(String),
    #[error("{0} is not supported by the external clock")]
    Unsupported(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    #[default]
    Internal,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Idle,
    Running,
    Paused,
    Stopped,
}

#[derive(Debug)]
enum Strategy {
    Internal(InternalClock),
    External(ExternalClock),
}

#[derive(Debug)]
pub struct ClockSource {
    strategy: Strategy,
    state: ClockState,
    last: Option<TimeValue>,
    refresh: Duration,
    display: Arc<Mailbox<String>>,
}

impl ClockSource {
    pub fn internal(refresh: Duration) -> Self {
        Self {
            strategy: Strategy::Internal(InternalClock::new(refresh)),
            state: ClockState::Idle,
            last: None,
            refresh,
            display: Arc::new(Mailbox::new()),
        }
    }

    pub fn external(feed: ExternalClockFeed) -> Self {
        let mut source = Self::internal(DEFAULT_REFRESH);
        source.strategy = Strategy::External(ExternalClock::new(feed));
        source
    }

    /// Builds the strategy named by `mode`. External mode needs a feed handle.
    pub fn from_mode(
        mode: ClockMode,
        refresh: Duration,
        feed: Option<ExternalClockFeed>,
    ) -> Result<Self, ClockError> {
        let mut source = Self::internal(refresh);
        source.set_mode(mode, feed)?;
        Ok(source)
    }

    pub fn mode(&self) -> ClockMode {
        match self.strategy {
            Strategy::Internal(_) => ClockMode::Internal,
            Strategy::External(_) => ClockMode::External,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ClockState::Running | ClockState::Paused)
    }

    /// Switches strategy. Refused while a measurement is in progress.
    pub fn set_mode(
        &mut self,
        mode: ClockMode,
        feed: Option<ExternalClockFeed>,
    ) -> Result<(), ClockError> {
        if self.is_running() {
            return Err(ClockError::AlreadyRunning);
        }
        self.strategy = match mode {
            ClockMode::Internal => Strategy::Internal(InternalClock::new(self.refresh)),
            ClockMode::External => {
                let feed = feed.ok_or(ClockError::FeedNotConfigured)?;
                Strategy::External(ExternalClock::new(feed))
            }
        };
        self.state = ClockState::Idle;
        self.last = None;
        debug!(?mode, "clock mode set");
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), ClockError> {
        if self.is_running() {
            return Err(ClockError::AlreadyRunning);
        }
        match &mut self.strategy {
            Strategy::Internal(clock) => clock.start(&self.display),
            Strategy::External(clock) => clock.start(&self.display)?,
        }
        self.state = ClockState::Running;
        self.last = None;
        Ok(())
    }

    /// Freezes the measurement. Stopping an already stopped clock returns the
    /// frozen value again without side effects.
    pub fn stop(&mut self) -> Result<TimeValue, ClockError> {
        match self.state {
            ClockState::Idle => return Err(ClockError::NotRunning),
            ClockState::Stopped => return self.last.ok_or(ClockError::NoReading),
            ClockState::Running | ClockState::Paused => {}
        }

        self.state = ClockState::Stopped;
        let value = match &mut self.strategy {
            Strategy::Internal(clock) => clock.stop(&self.display),
            Strategy::External(clock) => clock.stop()?,
        };
        self.last = Some(value);
        Ok(value)
    }

    pub fn pause(&mut self) -> Result<(), ClockError> {
        if self.state != ClockState::Running {
            return Err(ClockError::NotRunning);
        }
        match &mut self.strategy {
            Strategy::Internal(clock) => clock.pause(&self.display),
            Strategy::External(_) => return Err(ClockError::Unsupported("pause")),
        }
        self.state = ClockState::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), ClockError> {
        if self.state != ClockState::Paused {
            return Err(ClockError::NotRunning);
        }
        match &mut self.strategy {
            Strategy::Internal(clock) => clock.resume(&self.display),
            Strategy::External(_) => return Err(ClockError::Unsupported("resume")),
        }
        self.state = ClockState::Running;
        Ok(())
    }

    pub fn reset(&mut self) {
        match &mut self.strategy {
            Strategy::Internal(clock) => clock.reset(),
            Strategy::External(clock) => clock.reset(),
        }
        self.state = ClockState::Idle;
        self.last = None;
        self.display.put(time::format(0));
    }

    /// Value frozen by the last successful stop.
    pub fn last_measurement(&self) -> Option<TimeValue> {
        self.last
    }

    /// Text for the live timer display.
    pub fn display(&self) -> String {
        match &self.strategy {
            Strategy::Internal(clock) => clock.reading().to_string(),
            Strategy::External(clock) => clock
                .last_observed()
                .unwrap_or_else(|| time::format(0)),
        }
    }

    /// Mailbox the live reading is published to while running.
    pub fn display_feed(&self) -> Arc<Mailbox<String>> {
        Arc::clone(&self.display)
    }

    /// Feed handle when in external mode.
    pub fn feed(&self) -> Option<&ExternalClockFeed> {
        match &self.strategy {
            Strategy::External(clock) => Some(clock.feed()),
            Strategy::Internal(_) => None,
        }
    }
}
