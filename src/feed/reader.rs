use std::{
    io::{BufRead, BufReader, ErrorKind, Read},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, trace, warn};

use crate::mailbox::Mailbox;

use super::log::DiagnosticLog;

/// Longest device line kept, newline included.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

static TIME_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}:\d{2}:\d{2}(?:\.\d+)?)\b").expect("valid regex"));

/// Returns the first `H:MM:SS[.f+]` token embedded anywhere in `line`.
pub fn extract_time(line: &str) -> Option<&str> {
    TIME_TOKEN
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Idempotent cancellation flag shared with the reader thread.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub(crate) struct ReaderContext {
    pub port: String,
    pub stop: StopSignal,
    pub log: Arc<Mutex<DiagnosticLog>>,
    pub readings: Arc<Mailbox<String>>,
    pub idle_wait: Duration,
}

/// Reads lines until the stop signal is observed. Read errors are logged and
/// never end the loop. Lines longer than [`MAX_LINE_BYTES`] are dropped up to
/// the next newline.
pub(crate) fn run(device: Box<dyn Read + Send>, ctx: ReaderContext) {
    debug!(port = %ctx.port, "reader loop started");
    let mut reader = BufReader::new(device);
    let mut buf = Vec::new();
    let mut discarding = false;

    while !ctx.stop.is_triggered() {
        let room = (MAX_LINE_BYTES - buf.len()) as u64;
        match (&mut reader).take(room).read_until(b'\n', &mut buf) {
            Ok(n) => {
                let complete = buf.last() == Some(&b'\n');
                if !complete && buf.len() >= MAX_LINE_BYTES {
                    if !discarding {
                        warn!(port = %ctx.port, limit = MAX_LINE_BYTES, "oversized device line discarded");
                        ctx.log
                            .lock()
                            .push(format!("line longer than {MAX_LINE_BYTES} bytes discarded"));
                    }
                    discarding = true;
                    buf.clear();
                    continue;
                }

                let line = std::mem::take(&mut buf);
                if discarding {
                    discarding = false;
                } else if !line.is_empty() {
                    handle_line(&ctx, &line);
                }
                if n == 0 {
                    thread::sleep(ctx.idle_wait);
                }
            }
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                // Partial bytes stay in `buf` until the rest of the line arrives.
            }
            Err(err) => {
                warn!(port = %ctx.port, error = %err, "device read failed");
                ctx.log.lock().push(format!("read error: {err}"));
                thread::sleep(ctx.idle_wait);
            }
        }
    }

    debug!(port = %ctx.port, "reader loop stopped");
}

fn handle_line(ctx: &ReaderContext, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim_end_matches(['\r', '\n', ' ']);
    if line.is_empty() {
        return;
    }

    ctx.log.lock().push(line);
    if let Some(token) = extract_time(line) {
        trace!(port = %ctx.port, token, "time token");
        ctx.readings.put(token.to_string());
    }
}
