//! External timing device feed.
//!
//! [`ExternalClockFeed`] owns the serial connection lifecycle
//! (`Disconnected -> Connecting -> Connected -> Disconnected`) and runs exactly
//! one reader thread per connection. The reader appends every non-empty line to
//! a bounded diagnostic log and publishes the first embedded time token to a
//! latest-value [`Mailbox`]. Cloning the feed clones the handle, not the
//! connection.

/// Device opener seam and the `serialport` backend.
pub mod device;
/// Bounded diagnostic line buffer.
pub mod log;
/// Reader loop and line parsing.
pub mod reader;

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::mailbox::Mailbox;

use self::{
    device::{DeviceOpener, SerialPortOpener},
    log::DiagnosticLog,
    reader::{ReaderContext, StopSignal},
};

/// Baud rate used when the caller passes 0.
pub const DEFAULT_BAUD: u32 = 9600;
/// Diagnostic lines kept before the oldest are evicted.
pub const DEFAULT_LOG_CAPACITY: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("already connected to {port}; disconnect first")]
    AlreadyConnected { port: String },
    #[error("port name is required (e.g. COM3 or /dev/ttyUSB0)")]
    EmptyPort,
    #[error("cannot open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: io::Error,
    },
    #[error("connection to {port} was cancelled by a disconnect")]
    Cancelled { port: String },
    #[error("cannot start reader for {port}: {source}")]
    Spawn {
        port: String,
        #[source]
        source: io::Error,
    },
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Upper bound on one blocking read; the reader checks its stop signal at
    /// least this often.
    pub read_timeout: Duration,
    pub log_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(100),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

#[derive(Clone)]
pub struct ExternalClockFeed {
    shared: Arc<Shared>,
}

struct Shared {
    opener: Box<dyn DeviceOpener>,
    config: FeedConfig,
    conn: Mutex<Connection>,
    log: Arc<Mutex<DiagnosticLog>>,
    readings: Arc<Mailbox<String>>,
}

struct Connection {
    status: FeedStatus,
    port: String,
    baud: u32,
    stop: Option<StopSignal>,
    reader: Option<JoinHandle<()>>,
}

impl ExternalClockFeed {
    /// Feed backed by real serial ports.
    pub fn new(config: FeedConfig) -> Self {
        Self::with_opener(SerialPortOpener, config)
    }

    pub fn with_opener(opener: impl DeviceOpener + 'static, config: FeedConfig) -> Self {
        let log = DiagnosticLog::new(config.log_capacity);
        Self {
            shared: Arc::new(Shared {
                opener: Box::new(opener),
                config,
                conn: Mutex::new(Connection {
                    status: FeedStatus::Disconnected,
                    port: String::new(),
                    baud: DEFAULT_BAUD,
                    stop: None,
                    reader: None,
                }),
                log: Arc::new(Mutex::new(log)),
                readings: Arc::new(Mailbox::new()),
            }),
        }
    }

    /// Opens `port` and starts the reader loop. A `baud` of 0 selects
    /// [`DEFAULT_BAUD`].
    ///
    /// The device is opened without holding the connection lock; the
    /// `Connecting` status keeps concurrent connects out meanwhile.
    pub fn connect(&self, port: &str, baud: u32) -> Result<(), FeedError> {
        let port = port.trim();
        let baud = if baud == 0 { DEFAULT_BAUD } else { baud };
        {
            let mut conn = self.shared.conn.lock();
            if conn.status != FeedStatus::Disconnected {
                return Err(FeedError::AlreadyConnected {
                    port: conn.port.clone(),
                });
            }
            if port.is_empty() {
                return Err(FeedError::EmptyPort);
            }
            conn.status = FeedStatus::Connecting;
            conn.port = port.to_string();
            conn.baud = baud;
        }

        let device = match self
            .shared
            .opener
            .open(port, baud, self.shared.config.read_timeout)
        {
            Ok(device) => device,
            Err(source) => {
                self.shared.conn.lock().status = FeedStatus::Disconnected;
                warn!(port, error = %source, "cannot open timing device");
                return Err(FeedError::Open {
                    port: port.to_string(),
                    source,
                });
            }
        };

        let stop = StopSignal::new();
        let ctx = ReaderContext {
            port: port.to_string(),
            stop: stop.clone(),
            log: Arc::clone(&self.shared.log),
            readings: Arc::clone(&self.shared.readings),
            idle_wait: self.shared.config.read_timeout,
        };
        let spawned = thread::Builder::new()
            .name("chugware-feed".to_string())
            .spawn(move || reader::run(device, ctx));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(source) => {
                self.shared.conn.lock().status = FeedStatus::Disconnected;
                return Err(FeedError::Spawn {
                    port: port.to_string(),
                    source,
                });
            }
        };

        let mut conn = self.shared.conn.lock();
        if conn.status != FeedStatus::Connecting {
            drop(conn);
            stop.trigger();
            let _ = handle.join();
            return Err(FeedError::Cancelled {
                port: port.to_string(),
            });
        }
        conn.stop = Some(stop);
        conn.reader = Some(handle);
        conn.status = FeedStatus::Connected;
        info!(port, baud, "timing device connected");
        Ok(())
    }

    /// Stops the reader and releases the device. No-op when disconnected.
    pub fn disconnect(&self) {
        let (stop, reader, port) = {
            let mut conn = self.shared.conn.lock();
            if conn.status == FeedStatus::Disconnected {
                return;
            }
            conn.status = FeedStatus::Disconnected;
            (conn.stop.take(), conn.reader.take(), conn.port.clone())
        };

        if let Some(stop) = stop {
            stop.trigger();
        }
        if let Some(reader) = reader {
            if reader.join().is_err() {
                warn!(port = %port, "reader thread panicked");
            }
        }
        info!(port = %port, "timing device disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.status() == FeedStatus::Connected
    }

    pub fn status(&self) -> FeedStatus {
        self.shared.conn.lock().status
    }

    /// Port and baud of the current or most recently attempted connection.
    pub fn endpoint(&self) -> (String, u32) {
        let conn = self.shared.conn.lock();
        (conn.port.clone(), conn.baud)
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.shared.log.lock().lines()
    }

    pub fn clear_log(&self) {
        self.shared.log.lock().clear();
    }

    /// Mailbox holding the most recent unconsumed time token.
    pub fn readings(&self) -> Arc<Mailbox<String>> {
        Arc::clone(&self.shared.readings)
    }
}

impl std::fmt::Debug for ExternalClockFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let conn = self.shared.conn.lock();
        f.debug_struct("ExternalClockFeed")
            .field("status", &conn.status)
            .field("port", &conn.port)
            .field("baud", &conn.baud)
            .finish()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(stop) = self.conn.get_mut().stop.take() {
            stop.trigger();
        }
    }
}
