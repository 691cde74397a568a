use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

use crate::{
    clock::ClockMode,
    contest::{BottleOutcome, ContestRunner, RunnerError, RunnerSnapshot},
    feed::ExternalClockFeed,
    participant::{Participant, ParticipantPatch},
    result::ResultRecord,
    time::TimeValue,
    types::{Discipline, Status},
};

use super::events::ContestEvent;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("contest runtime is gone")]
    ChannelClosed,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub command_queue_bound: usize,
    pub event_capacity: usize,
    /// Forward live display readings as [`ContestEvent::Tick`].
    pub emit_ticks: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_capacity: 1024,
            emit_ticks: true,
        }
    }
}

/// Form field addressed by [`ContestHandle::enter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Time,
    BaseTime,
    AdditionalTime,
}

#[derive(Clone)]
pub struct ContestHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<ContestEvent>,
}

type Reply<T> = oneshot::Sender<Result<T, RunnerError>>;

enum Command {
    LoadNext { resp: Reply<Participant> },
    LoadSelected { name: String, resp: Reply<Participant> },
    Enqueue { name: String, resp: Reply<()> },
    ReadyCheck { resp: Reply<()> },
    Start { resp: Reply<()> },
    Stop { resp: Reply<TimeValue> },
    Pause { resp: Reply<()> },
    Resume { resp: Reply<()> },
    Enter { field: FormField, text: String, resp: Reply<()> },
    Commit { status: Status, comment: String, resp: Reply<ResultRecord> },
    CommitBottle { outcome: BottleOutcome, status: Status, resp: Reply<ResultRecord> },
    Skip { resp: Reply<()> },
    ClearSkipped { resp: Reply<()> },
    Reset { resp: Reply<()> },
    SelectDiscipline { discipline: Discipline, resp: Reply<()> },
    SetClockMode { mode: ClockMode, feed: Option<ExternalClockFeed>, resp: Reply<()> },
    Register { participant: Participant, resp: Reply<()> },
    EditParticipant { name: String, patch: ParticipantPatch, resp: Reply<Participant> },
    RemoveParticipant { name: String, resp: Reply<Participant> },
    Snapshot { resp: oneshot::Sender<RunnerSnapshot> },
    Results { discipline: Option<Discipline>, resp: oneshot::Sender<Vec<ResultRecord>> },
    Standings { discipline: Discipline, resp: oneshot::Sender<Vec<ResultRecord>> },
    Shutdown { resp: oneshot::Sender<()> },
}

/// Moves `runner` onto a tokio task and returns the handle that drives it.
///
/// All mutation happens on that task, so commands are applied strictly in the
/// order they were sent.
pub fn spawn_contest(runner: ContestRunner, config: RuntimeConfig) -> ContestHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound);
    let (events_tx, _) = broadcast::channel::<ContestEvent>(config.event_capacity);

    let events_tx_loop = events_tx.clone();
    let display = runner.display_feed();

    tokio::spawn(async move {
        let mut runner = runner;
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if handle_command(cmd, &mut runner, &events_tx_loop) {
                        break;
                    }
                }
                text = display.recv(), if config.emit_ticks => {
                    let _ = events_tx_loop.send(ContestEvent::Tick { display: text });
                }
            }
        }
        debug!("contest runtime stopped");
    });

    ContestHandle { cmd_tx, events_tx }
}

impl ContestHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ContestEvent> {
        self.events_tx.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn load_next(&self) -> Result<Participant, RuntimeError> {
        Ok(self.request(|resp| Command::LoadNext { resp }).await??)
    }

    pub async fn load_selected(&self, name: &str) -> Result<Participant, RuntimeError> {
        let name = name.to_string();
        Ok(self.request(|resp| Command::LoadSelected { name, resp }).await??)
    }

    pub async fn enqueue(&self, name: &str) -> Result<(), RuntimeError> {
        let name = name.to_string();
        Ok(self.request(|resp| Command::Enqueue { name, resp }).await??)
    }

    pub async fn ready_check(&self) -> Result<(), RuntimeError> {
        Ok(self.request(|resp| Command::ReadyCheck { resp }).await??)
    }

    pub async fn start(&self) -> Result<(), RuntimeError> {
        Ok(self.request(|resp| Command::Start { resp }).await??)
    }

    pub async fn stop(&self) -> Result<TimeValue, RuntimeError> {
        Ok(self.request(|resp| Command::Stop { resp }).await??)
    }

    pub async fn pause(&self) -> Result<(), RuntimeError> {
        Ok(self.request(|resp| Command::Pause { resp }).await??)
    }

    pub async fn resume(&self) -> Result<(), RuntimeError> {
        Ok(self.request(|resp| Command::Resume { resp }).await??)
    }

    pub async fn enter(&self, field: FormField, text: &str) -> Result<(), RuntimeError> {
        let text = text.to_string();
        Ok(self
            .request(|resp| Command::Enter { field, text, resp })
            .await??)
    }

    pub async fn commit(&self, status: Status, comment: &str) -> Result<ResultRecord, RuntimeError> {
        let comment = comment.to_string();
        Ok(self
            .request(|resp| Command::Commit {
                status,
                comment,
                resp,
            })
            .await??)
    }

    pub async fn commit_bottle(
        &self,
        outcome: BottleOutcome,
        status: Status,
    ) -> Result<ResultRecord, RuntimeError> {
        Ok(self
            .request(|resp| Command::CommitBottle {
                outcome,
                status,
                resp,
            })
            .await??)
    }

    pub async fn skip(&self) -> Result<(), RuntimeError> {
        Ok(self.request(|resp| Command::Skip { resp }).await??)
    }

    pub async fn clear_skipped(&self) -> Result<(), RuntimeError> {
        Ok(self.request(|resp| Command::ClearSkipped { resp }).await??)
    }

    pub async fn reset(&self) -> Result<(), RuntimeError> {
        Ok(self.request(|resp| Command::Reset { resp }).await??)
    }

    pub async fn select_discipline(&self, discipline: Discipline) -> Result<(), RuntimeError> {
        Ok(self
            .request(|resp| Command::SelectDiscipline { discipline, resp })
            .await??)
    }

    pub async fn set_clock_mode(
        &self,
        mode: ClockMode,
        feed: Option<ExternalClockFeed>,
    ) -> Result<(), RuntimeError> {
        Ok(self
            .request(|resp| Command::SetClockMode { mode, feed, resp })
            .await??)
    }

    pub async fn register(&self, participant: Participant) -> Result<(), RuntimeError> {
        Ok(self
            .request(|resp| Command::Register { participant, resp })
            .await??)
    }

    pub async fn edit_participant(
        &self,
        name: &str,
        patch: ParticipantPatch,
    ) -> Result<Participant, RuntimeError> {
        let name = name.to_string();
        Ok(self
            .request(|resp| Command::EditParticipant { name, patch, resp })
            .await??)
    }

    pub async fn remove_participant(&self, name: &str) -> Result<Participant, RuntimeError> {
        let name = name.to_string();
        Ok(self
            .request(|resp| Command::RemoveParticipant { name, resp })
            .await??)
    }

    pub async fn snapshot(&self) -> Result<RunnerSnapshot, RuntimeError> {
        self.request(|resp| Command::Snapshot { resp }).await
    }

    /// Stored results, optionally restricted to one discipline.
    pub async fn results(
        &self,
        discipline: Option<Discipline>,
    ) -> Result<Vec<ResultRecord>, RuntimeError> {
        self.request(|resp| Command::Results { discipline, resp })
            .await
    }

    /// Ranked results for one discipline.
    pub async fn standings(&self, discipline: Discipline) -> Result<Vec<ResultRecord>, RuntimeError> {
        self.request(|resp| Command::Standings { discipline, resp }).await
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await
    }
}

fn handle_command(
    cmd: Command,
    runner: &mut ContestRunner,
    events_tx: &broadcast::Sender<ContestEvent>,
) -> bool {
    let emit = |event: ContestEvent| {
        let _ = events_tx.send(event);
    };

    match cmd {
        Command::LoadNext { resp } => {
            let res = runner.load_next().cloned();
            if let Ok(p) = &res {
                emit(ContestEvent::Loaded { name: p.name.clone() });
            }
            let _ = resp.send(res);
        }
        Command::LoadSelected { name, resp } => {
            let res = runner.load_selected(&name).cloned();
            if let Ok(p) = &res {
                emit(ContestEvent::Loaded { name: p.name.clone() });
            }
            let _ = resp.send(res);
        }
        Command::Enqueue { name, resp } => {
            let _ = resp.send(runner.enqueue(&name));
        }
        Command::ReadyCheck { resp } => {
            let res = runner.ready_check();
            if res.is_ok() {
                emit(ContestEvent::ReadyChecked { name: current_name(runner) });
            }
            let _ = resp.send(res);
        }
        Command::Start { resp } => {
            let res = runner.start();
            if res.is_ok() {
                emit(ContestEvent::Started { name: current_name(runner) });
            }
            let _ = resp.send(res);
        }
        Command::Stop { resp } => {
            let res = runner.stop();
            if res.is_ok() {
                emit(ContestEvent::Stopped {
                    name: current_name(runner),
                    base_time: runner.form().base_time.clone(),
                });
            }
            let _ = resp.send(res);
        }
        Command::Pause { resp } => {
            let _ = resp.send(runner.pause());
        }
        Command::Resume { resp } => {
            let _ = resp.send(runner.resume());
        }
        Command::Enter { field, text, resp } => {
            let res = match field {
                FormField::Time => runner.enter_time(&text),
                FormField::BaseTime => runner.enter_base_time(&text),
                FormField::AdditionalTime => runner.enter_additional_time(&text),
            };
            let _ = resp.send(res);
        }
        Command::Commit {
            status,
            comment,
            resp,
        } => {
            let res = runner.commit(status, &comment);
            if let Ok(record) = &res {
                emit(ContestEvent::Committed { record: record.clone() });
            }
            let _ = resp.send(res);
        }
        Command::CommitBottle {
            outcome,
            status,
            resp,
        } => {
            let res = runner.commit_bottle(outcome, status);
            if let Ok(record) = &res {
                emit(ContestEvent::Committed { record: record.clone() });
            }
            let _ = resp.send(res);
        }
        Command::Skip { resp } => {
            let name = current_name(runner);
            let res = runner.skip();
            if res.is_ok() {
                emit(ContestEvent::Skipped { name });
            }
            let _ = resp.send(res);
        }
        Command::ClearSkipped { resp } => {
            runner.clear_skipped();
            let _ = resp.send(Ok(()));
        }
        Command::Reset { resp } => {
            runner.reset();
            emit(ContestEvent::Reset);
            let _ = resp.send(Ok(()));
        }
        Command::SelectDiscipline { discipline, resp } => {
            let res = runner.select_discipline(discipline);
            if res.is_ok() {
                emit(ContestEvent::DisciplineChanged {
                    discipline,
                    eligible: runner.eligible().len(),
                });
            }
            let _ = resp.send(res);
        }
        Command::SetClockMode { mode, feed, resp } => {
            let _ = resp.send(runner.set_clock_mode(mode, feed));
        }
        Command::Register { participant, resp } => {
            let res = runner.register(participant);
            if res.is_ok() {
                emit(ContestEvent::ParticipantsChanged);
            }
            let _ = resp.send(res);
        }
        Command::EditParticipant { name, patch, resp } => {
            let res = runner.edit_participant(&name, &patch);
            if res.is_ok() {
                emit(ContestEvent::ParticipantsChanged);
            }
            let _ = resp.send(res);
        }
        Command::RemoveParticipant { name, resp } => {
            let res = runner.remove_participant(&name);
            if res.is_ok() {
                emit(ContestEvent::ParticipantsChanged);
            }
            let _ = resp.send(res);
        }
        Command::Snapshot { resp } => {
            let _ = resp.send(runner.snapshot());
        }
        Command::Results { discipline, resp } => {
            let out = match discipline {
                Some(d) => runner.results().list_by_discipline(d),
                None => runner.results().list_all(),
            };
            let _ = resp.send(out);
        }
        Command::Standings { discipline, resp } => {
            let _ = resp.send(runner.results().standings(discipline));
        }
        Command::Shutdown { resp } => {
            runner.reset();
            let _ = resp.send(());
            return true;
        }
    }

    false
}

fn current_name(runner: &ContestRunner) -> String {
    runner.current().map(|p| p.name.clone()).unwrap_or_default()
}
