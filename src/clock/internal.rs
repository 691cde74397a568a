use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{runtime::Handle, task::JoinHandle, time::MissedTickBehavior};

use crate::{mailbox::Mailbox, time::TimeValue};

/// Software stopwatch. While running, a private refresh task republishes the
/// elapsed time to the display mailbox every `refresh`.
#[derive(Debug)]
pub struct InternalClock {
    refresh: Duration,
    started_at: Option<Instant>,
    accumulated: Duration,
    ticker: Option<JoinHandle<()>>,
}

impl InternalClock {
    pub fn new(refresh: Duration) -> Self {
        Self {
            refresh,
            started_at: None,
            accumulated: Duration::ZERO,
            ticker: None,
        }
    }

    pub(crate) fn start(&mut self, display: &Arc<Mailbox<String>>) {
        self.accumulated = Duration::ZERO;
        self.run_from_now(display);
    }

    pub(crate) fn pause(&mut self, display: &Arc<Mailbox<String>>) {
        if let Some(started_at) = self.started_at.take() {
            self.accumulated += started_at.elapsed();
        }
        self.stop_ticker();
        display.put(self.reading().to_string());
    }

    pub(crate) fn resume(&mut self, display: &Arc<Mailbox<String>>) {
        if self.started_at.is_none() {
            self.run_from_now(display);
        }
    }

    /// Freezes and returns `now - start + accumulated`.
    pub(crate) fn stop(&mut self, display: &Arc<Mailbox<String>>) -> TimeValue {
        self.stop_ticker();
        if let Some(started_at) = self.started_at.take() {
            self.accumulated += started_at.elapsed();
        }
        let value = TimeValue::from_duration(self.accumulated);
        display.put(value.to_string());
        value
    }

    pub(crate) fn reset(&mut self) {
        self.stop_ticker();
        self.started_at = None;
        self.accumulated = Duration::ZERO;
    }

    /// Current elapsed time, live while running.
    pub fn reading(&self) -> TimeValue {
        let running = self.started_at.map_or(Duration::ZERO, |s| s.elapsed());
        TimeValue::from_duration(self.accumulated + running)
    }

    fn run_from_now(&mut self, display: &Arc<Mailbox<String>>) {
        let started_at = Instant::now();
        self.started_at = Some(started_at);
        self.stop_ticker();

        // Outside a runtime there is no live display; stop() still measures.
        let Ok(rt) = Handle::try_current() else {
            return;
        };
        let display = Arc::clone(display);
        let accumulated = self.accumulated;
        let refresh = self.refresh;
        self.ticker = Some(rt.spawn(async move {
            let mut interval = tokio::time::interval(refresh);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let elapsed = accumulated + started_at.elapsed();
                display.put(TimeValue::from_duration(elapsed).to_string());
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for InternalClock {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}
