//! Live timing and result keeping for a drinking contest.
//!
//! Participants run heats one at a time: load, ready check, start, stop,
//! commit. Times are measured by the software stopwatch or taken from an
//! external timing device on a serial line, and every result is appended to a
//! JSON result list.
//!
//! # Examples
//!
//! In-memory heat with [`contest::ContestRunner`]:
//! ```
//! use chugware::{
//!     clock::{ClockSource, DEFAULT_REFRESH},
//!     contest::ContestRunner,
//!     core::{participants::ParticipantStore, results::ResultStore},
//!     participant::Participant,
//!     types::Status,
//! };
//!
//! let mut participants = ParticipantStore::new();
//! participants.add(Participant::register("Alice", "CS", "Red")).expect("add");
//!
//! let mut runner = ContestRunner::new(
//!     participants,
//!     ResultStore::new(),
//!     ClockSource::internal(DEFAULT_REFRESH),
//! );
//! runner.load_next().expect("load");
//! runner.enter_base_time("00:00:07.5").expect("base");
//! runner.enter_additional_time("2").expect("penalty");
//! let rec = runner.commit(Status::Pass, "").expect("commit");
//! assert_eq!(rec.time, "00:00:09.5000");
//! ```
//!
//! Runtime usage:
//! ```no_run
//! use chugware::{
//!     clock::{ClockSource, DEFAULT_REFRESH},
//!     contest::ContestRunner,
//!     core::{participants::ParticipantStore, results::ResultStore},
//!     runtime::{RuntimeConfig, spawn_contest},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let runner = ContestRunner::new(
//!     ParticipantStore::open("participants.json").expect("participants"),
//!     ResultStore::open("results.json").expect("results"),
//!     ClockSource::internal(DEFAULT_REFRESH),
//! );
//! let handle = spawn_contest(runner, RuntimeConfig::default());
//! let mut events = handle.subscribe();
//! handle.load_next().await.expect("load");
//! handle.ready_check().await.expect("ready");
//! handle.start().await.expect("start");
//! let _tick = events.recv().await;
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Stopwatch and external clock strategies.
pub mod clock;
/// Operator settings file.
pub mod config;
/// Heat controller.
pub mod contest;
/// Participant and result stores.
pub mod core;
/// Serial timing device feed.
pub mod feed;
/// Latest-value handoff slot.
pub mod mailbox;
/// Participant records and patches.
pub mod participant;
/// JSON list persistence.
pub mod persist;
/// Result records and drafts.
pub mod result;
/// Single-writer async runtime handle and events.
pub mod runtime;
/// Time text codec.
pub mod time;
/// Shared enums and limits.
pub mod types;
