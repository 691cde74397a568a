use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::debug;

use crate::{
    feed::ExternalClockFeed,
    mailbox::Mailbox,
    time::{self, TimeValue},
};

use super::ClockError;

/// Clock that reports whatever the timing device last sent.
#[derive(Debug)]
pub struct ExternalClock {
    feed: ExternalClockFeed,
    last_observed: Arc<Mutex<Option<String>>>,
    forwarder: Option<JoinHandle<()>>,
}

impl ExternalClock {
    pub fn new(feed: ExternalClockFeed) -> Self {
        Self {
            feed,
            last_observed: Arc::new(Mutex::new(None)),
            forwarder: None,
        }
    }

    pub fn feed(&self) -> &ExternalClockFeed {
        &self.feed
    }

    /// Subscribes to the feed. Values produced before this call are discarded.
    pub(crate) fn start(&mut self, display: &Arc<Mailbox<String>>) -> Result<(), ClockError> {
        if !self.feed.is_connected() {
            return Err(ClockError::FeedNotConnected);
        }

        let readings = self.feed.readings();
        if let Some(stale) = readings.take() {
            debug!(stale = %stale, "discarded reading from before start");
        }
        *self.last_observed.lock() = None;
        self.stop_forwarder();

        // Without a runtime, stop() still collects the latest pending reading.
        if let Ok(rt) = Handle::try_current() {
            let last = Arc::clone(&self.last_observed);
            let display = Arc::clone(display);
            self.forwarder = Some(rt.spawn(async move {
                loop {
                    if let Some(value) = readings.watch().await {
                        *last.lock() = Some(value.clone());
                        display.put(value);
                    }
                }
            }));
        }
        Ok(())
    }

    /// Unsubscribes and returns the last observed reading.
    ///
    /// The forwarder only peeks, so the newest value is still pending in the
    /// mailbox here and wins over the forwarder's copy.
    pub(crate) fn stop(&mut self) -> Result<TimeValue, ClockError> {
        self.stop_forwarder();
        if let Some(latest) = self.feed.readings().take() {
            *self.last_observed.lock() = Some(latest);
        }

        let text = self
            .last_observed
            .lock()
            .clone()
            .ok_or(ClockError::NoReading)?;
        time::parse(&text).ok_or(ClockError::InvalidReading(text))
    }

    pub(crate) fn reset(&mut self) {
        self.stop_forwarder();
        *self.last_observed.lock() = None;
    }

    pub fn last_observed(&self) -> Option<String> {
        self.last_observed.lock().clone()
    }

    fn stop_forwarder(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

impl Drop for ExternalClock {
    fn drop(&mut self) {
        self.stop_forwarder();
    }
}
