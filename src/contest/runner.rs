use std::{collections::VecDeque, sync::Arc};

use hashbrown::HashSet;
use tracing::{debug, info, warn};

use crate::{
    clock::{ClockError, ClockMode, ClockSource},
    core::{StoreError, participants::ParticipantStore, results::ResultStore},
    feed::ExternalClockFeed,
    mailbox::Mailbox,
    participant::{Participant, ParticipantPatch},
    result::{ResultDraft, ResultRecord},
    time::{self, TimeValue},
    types::{Discipline, OVERFLOW_COMMENT, Status},
};

/// Heat lifecycle. Every phase returns to `Idle` on reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loaded,
    ReadyChecked,
    Running,
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("no participant loaded")]
    NoChugger,
    #[error("{0} is already loaded; skip, commit or reset first")]
    AlreadyLoaded(String),
    #[error("no participants available")]
    NoCandidates,
    #[error("{name} is not eligible for {discipline}")]
    NotEligible { name: String, discipline: Discipline },
    #[error("participant '{0}' not found")]
    UnknownParticipant(String),
    #[error("cannot {action} while {phase:?}")]
    InvalidTransition { action: &'static str, phase: Phase },
    #[error("invalid {field} format: {text:?}")]
    InvalidTime { field: &'static str, text: String },
    #[error("time is required: fill in time or base time")]
    TimeRequired,
    #[error("bottle outcomes apply to Bottle only, not {0}")]
    NotBottle(Discipline),
    #[error(transparent)]
    Clock(#[from] ClockError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Manually entered result fields for the loaded chugger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultForm {
    /// Explicit final time; wins over base + additional when set.
    pub time: String,
    /// Measured time, filled by stop or typed in.
    pub base_time: String,
    /// Penalty time.
    pub additional_time: String,
}

/// Commit paths offered for a Bottle attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BottleOutcome {
    /// Base plus the entered penalty, keeping the requested status.
    PassWithPenalty,
    /// Base only; the penalty is forced to zero and the status to Pass.
    CleanPass,
    /// Spilled: Disqualified with comment "Overflow".
    DisqualifyOverflow,
}

/// Renderable copy of the heat state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSnapshot {
    pub phase: Phase,
    pub discipline: Discipline,
    pub clock_mode: ClockMode,
    pub current: Option<Participant>,
    pub queue: Vec<String>,
    pub eligible: Vec<Participant>,
    pub skipped: Vec<String>,
    pub form: ResultForm,
    pub display: String,
}

/// Heat-by-heat state machine over the participant and result stores.
#[derive(Debug)]
pub struct ContestRunner {
    participants: ParticipantStore,
    results: ResultStore,
    clock: ClockSource,
    discipline: Discipline,
    phase: Phase,
    current: Option<Participant>,
    queue: VecDeque<String>,
    eligible: Vec<Participant>,
    skipped: HashSet<String>,
    form: ResultForm,
    try_consumed: bool,
}

impl ContestRunner {
    pub fn new(participants: ParticipantStore, results: ResultStore, clock: ClockSource) -> Self {
        let mut runner = Self {
            participants,
            results,
            clock,
            discipline: Discipline::Bottle,
            phase: Phase::Idle,
            current: None,
            queue: VecDeque::new(),
            eligible: Vec::new(),
            skipped: HashSet::new(),
            form: ResultForm::default(),
            try_consumed: false,
        };
        runner.refresh_eligible();
        runner
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    pub fn current(&self) -> Option<&Participant> {
        self.current.as_ref()
    }

    pub fn eligible(&self) -> &[Participant] {
        &self.eligible
    }

    pub fn form(&self) -> &ResultForm {
        &self.form
    }

    pub fn participants(&self) -> &ParticipantStore {
        &self.participants
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn clock(&self) -> &ClockSource {
        &self.clock
    }

    /// Live timer text.
    pub fn display(&self) -> String {
        self.clock.display()
    }

    pub fn display_feed(&self) -> Arc<Mailbox<String>> {
        self.clock.display_feed()
    }

    pub fn snapshot(&self) -> RunnerSnapshot {
        let mut skipped: Vec<String> = self.skipped.iter().cloned().collect();
        skipped.sort();
        RunnerSnapshot {
            phase: self.phase,
            discipline: self.discipline,
            clock_mode: self.clock.mode(),
            current: self.current.clone(),
            queue: self.queue.iter().cloned().collect(),
            eligible: self.eligible.clone(),
            skipped,
            form: self.form.clone(),
            display: self.clock.display(),
        }
    }

    pub fn select_discipline(&mut self, discipline: Discipline) -> Result<(), RunnerError> {
        if matches!(self.phase, Phase::Running | Phase::Stopped) {
            return Err(self.invalid("change discipline"));
        }
        self.discipline = discipline;
        self.refresh_eligible();
        info!(%discipline, eligible = self.eligible.len(), "discipline selected");
        Ok(())
    }

    pub fn set_clock_mode(
        &mut self,
        mode: ClockMode,
        feed: Option<ExternalClockFeed>,
    ) -> Result<(), RunnerError> {
        if matches!(self.phase, Phase::Running | Phase::Stopped) {
            return Err(self.invalid("switch clock"));
        }
        self.clock.set_mode(mode, feed)?;
        Ok(())
    }

    /// Puts `name` at the back of the pre-queue.
    pub fn enqueue(&mut self, name: &str) -> Result<(), RunnerError> {
        if self.participants.get(name).is_none() {
            return Err(RunnerError::UnknownParticipant(name.to_string()));
        }
        self.queue.push_back(name.to_string());
        Ok(())
    }

    pub fn queue(&self) -> Vec<String> {
        self.queue.iter().cloned().collect()
    }

    /// Loads the next pre-queued participant, else the first eligible one.
    pub fn load_next(&mut self) -> Result<&Participant, RunnerError> {
        self.ensure_vacant()?;

        let mut next = None;
        while let Some(name) = self.queue.pop_front() {
            match self.participants.get(&name) {
                Some(p) => {
                    next = Some(p);
                    break;
                }
                None => warn!(name = %name, "queued participant no longer registered"),
            }
        }
        let next = next
            .or_else(|| self.eligible.first().cloned())
            .ok_or(RunnerError::NoCandidates)?;
        Ok(self.load(next))
    }

    /// Loads `name` from the eligible list.
    pub fn load_selected(&mut self, name: &str) -> Result<&Participant, RunnerError> {
        self.ensure_vacant()?;
        let chosen = self
            .eligible
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| RunnerError::NotEligible {
                name: name.to_string(),
                discipline: self.discipline,
            })?;
        Ok(self.load(chosen))
    }

    pub fn ready_check(&mut self) -> Result<(), RunnerError> {
        match self.phase {
            Phase::Idle => Err(RunnerError::NoChugger),
            Phase::Loaded | Phase::ReadyChecked => {
                self.phase = Phase::ReadyChecked;
                debug!(name = %self.current_name(), "ready check passed");
                Ok(())
            }
            _ => Err(self.invalid("ready check")),
        }
    }

    pub fn start(&mut self) -> Result<(), RunnerError> {
        match self.phase {
            Phase::Idle => return Err(RunnerError::NoChugger),
            Phase::ReadyChecked => {}
            _ => return Err(self.invalid("start")),
        }
        self.clock.start()?;
        self.phase = Phase::Running;
        info!(name = %self.current_name(), mode = ?self.clock.mode(), "timer started");
        Ok(())
    }

    /// Stops the clock and records the measurement as the base time.
    ///
    /// A nonzero measurement consumes one try. Stopping again returns the
    /// frozen value without consuming anything.
    pub fn stop(&mut self) -> Result<TimeValue, RunnerError> {
        match self.phase {
            Phase::Stopped => return Ok(self.clock.stop()?),
            Phase::Running => {}
            _ => return Err(RunnerError::Clock(ClockError::NotRunning)),
        }

        self.phase = Phase::Stopped;
        let value = self.clock.stop()?;
        self.form.base_time = value.to_string();
        info!(name = %self.current_name(), time = %value, "timer stopped");

        if !value.is_zero() {
            self.consume_try()?;
        }
        Ok(value)
    }

    pub fn pause(&mut self) -> Result<(), RunnerError> {
        if self.phase != Phase::Running {
            return Err(RunnerError::Clock(ClockError::NotRunning));
        }
        Ok(self.clock.pause()?)
    }

    pub fn resume(&mut self) -> Result<(), RunnerError> {
        if self.phase != Phase::Running {
            return Err(RunnerError::Clock(ClockError::NotRunning));
        }
        Ok(self.clock.resume()?)
    }

    pub fn enter_time(&mut self, text: &str) -> Result<(), RunnerError> {
        self.editable_form()?.time = text.trim().to_string();
        Ok(())
    }

    pub fn enter_base_time(&mut self, text: &str) -> Result<(), RunnerError> {
        self.editable_form()?.base_time = text.trim().to_string();
        Ok(())
    }

    pub fn enter_additional_time(&mut self, text: &str) -> Result<(), RunnerError> {
        self.editable_form()?.additional_time = text.trim().to_string();
        Ok(())
    }

    /// Records the loaded chugger's result and advances.
    ///
    /// The final time is the explicit time field when set, else base plus
    /// additional. A `NaN` operand forces Disqualified. A Pass needs a time.
    pub fn commit(&mut self, status: Status, comment: &str) -> Result<ResultRecord, RunnerError> {
        self.ensure_committable()?;

        let explicit = self.form.time.trim();
        let base = self.form.base_time.trim();
        let additional = self.form.additional_time.trim();
        let mut status = status;

        let (base_text, additional_text) = if !explicit.is_empty() {
            let value = parse_field("time", explicit)?;
            if value.is_nan() {
                status = Status::Disqualified;
            }
            (value.to_string(), String::new())
        } else if !base.is_empty() {
            let base_value = parse_field("base time", base)?;
            let additional_value = if additional.is_empty() {
                TimeValue::ZERO
            } else {
                parse_field("additional time", additional)?
            };
            if base_value.saturating_add(additional_value).is_nan() {
                status = Status::Disqualified;
            }
            let additional_text = if additional.is_empty() {
                String::new()
            } else {
                additional_value.to_string()
            };
            (base_value.to_string(), additional_text)
        } else if status == Status::Pass {
            return Err(RunnerError::TimeRequired);
        } else {
            (String::new(), String::new())
        };

        let draft = ResultDraft::new(self.current_name(), self.discipline, status)
            .base_time(base_text)
            .additional_time(additional_text)
            .comment(comment.trim());
        self.record(draft)
    }

    /// Bottle-only commit driven by a single additional-time entry.
    pub fn commit_bottle(
        &mut self,
        outcome: BottleOutcome,
        requested: Status,
    ) -> Result<ResultRecord, RunnerError> {
        if self.discipline != Discipline::Bottle {
            return Err(RunnerError::NotBottle(self.discipline));
        }
        self.ensure_committable()?;

        let base = self.form.base_time.trim().to_string();
        let additional = match outcome {
            BottleOutcome::CleanPass => "0".to_string(),
            _ => self.form.additional_time.trim().to_string(),
        };
        let mut status = match outcome {
            BottleOutcome::PassWithPenalty => requested,
            BottleOutcome::CleanPass => Status::Pass,
            BottleOutcome::DisqualifyOverflow => Status::Disqualified,
        };

        let base_value = if base.is_empty() {
            if status == Status::Pass {
                return Err(RunnerError::TimeRequired);
            }
            TimeValue::ZERO
        } else {
            parse_field("base time", &base)?
        };
        let additional_value = if additional.is_empty() {
            TimeValue::ZERO
        } else {
            parse_field("additional time", &additional)?
        };
        if base_value.saturating_add(additional_value).is_nan() {
            status = Status::Disqualified;
        }

        let comment = if status == Status::Disqualified {
            OVERFLOW_COMMENT
        } else {
            ""
        };
        let base_text = if base.is_empty() {
            String::new()
        } else {
            base_value.to_string()
        };
        let draft = ResultDraft::new(self.current_name(), self.discipline, status)
            .base_time(base_text)
            .additional_time(additional_value.to_string())
            .comment(comment);
        self.record(draft)
    }

    /// Marks the chugger as skipped (they stay eligible) and returns to idle.
    pub fn skip(&mut self) -> Result<(), RunnerError> {
        let name = self
            .current
            .as_ref()
            .map(|p| p.name.clone())
            .ok_or(RunnerError::NoChugger)?;
        if self.phase == Phase::Running {
            return Err(self.invalid("skip"));
        }
        self.skipped.insert(name.clone());
        info!(name = %name, "participant skipped");
        self.advance();
        Ok(())
    }

    pub fn skipped(&self) -> Vec<String> {
        let mut names: Vec<String> = self.skipped.iter().cloned().collect();
        names.sort();
        names
    }

    pub fn clear_skipped(&mut self) {
        self.skipped.clear();
    }

    /// Clears timer and form state; persisted data is untouched.
    pub fn reset(&mut self) {
        debug!(phase = ?self.phase, "reset");
        self.advance();
    }

    pub fn register(&mut self, participant: Participant) -> Result<(), RunnerError> {
        self.participants.add(participant)?;
        self.save_participants()?;
        self.refresh_eligible();
        Ok(())
    }

    pub fn edit_participant(
        &mut self,
        name: &str,
        patch: &ParticipantPatch,
    ) -> Result<Participant, RunnerError> {
        let edited = self.participants.update(name, patch)?;
        self.save_participants()?;
        if self.current.as_ref().is_some_and(|p| p.name == name) {
            self.current = Some(edited.clone());
        }
        self.refresh_eligible();
        Ok(edited)
    }

    pub fn remove_participant(&mut self, name: &str) -> Result<Participant, RunnerError> {
        if self.current.as_ref().is_some_and(|p| p.name == name) {
            return Err(RunnerError::AlreadyLoaded(name.to_string()));
        }
        let removed = self.participants.remove(name)?;
        self.save_participants()?;
        self.queue.retain(|queued| queued != name);
        self.refresh_eligible();
        Ok(removed)
    }

    fn load(&mut self, participant: Participant) -> &Participant {
        self.clock.reset();
        self.form = ResultForm::default();
        self.try_consumed = false;
        self.phase = Phase::Loaded;
        info!(name = %participant.name, discipline = %self.discipline, "chugger loaded");
        self.current.insert(participant)
    }

    /// Stores the result, then always advances so a retried commit cannot
    /// record the attempt twice.
    fn record(&mut self, draft: ResultDraft) -> Result<ResultRecord, RunnerError> {
        let rec = self.results.commit(draft)?;
        info!(name = %rec.name, discipline = %rec.discipline, status = %rec.status, time = %rec.time, "result committed");

        let consumed = if self.try_consumed {
            Ok(())
        } else {
            self.consume_try()
        };
        self.advance();
        if let Err(err) = consumed {
            warn!(name = %rec.name, error = %err, "result stored but try counter not saved");
            return Err(err);
        }
        Ok(rec)
    }

    /// Decrements the chugger's counter once per attempt, persists, and
    /// refreshes the in-memory chugger.
    fn consume_try(&mut self) -> Result<(), RunnerError> {
        let name = self.current_name();
        self.participants.decrement_tries(&name, self.discipline)?;
        self.try_consumed = true;
        if let Some(fresh) = self.participants.get(&name) {
            self.current = Some(fresh);
        }
        self.save_participants()?;
        Ok(())
    }

    // Stores opened without a path stay in memory.
    fn save_participants(&self) -> Result<(), RunnerError> {
        if self.participants.path().is_some() {
            self.participants.save()?;
        }
        Ok(())
    }

    fn advance(&mut self) {
        self.clock.reset();
        self.current = None;
        self.form = ResultForm::default();
        self.try_consumed = false;
        self.phase = Phase::Idle;
        self.refresh_eligible();
    }

    fn refresh_eligible(&mut self) {
        let discipline = self.discipline;
        let mut eligible: Vec<Participant> = self
            .participants
            .list()
            .into_iter()
            .filter(|p| p.is_eligible(discipline))
            .collect();
        eligible.sort_by(|a, b| {
            b.tries_count(discipline)
                .cmp(&a.tries_count(discipline))
                .then_with(|| a.name.cmp(&b.name))
        });
        self.eligible = eligible;
    }

    fn ensure_vacant(&self) -> Result<(), RunnerError> {
        match &self.current {
            Some(p) => Err(RunnerError::AlreadyLoaded(p.name.clone())),
            None => Ok(()),
        }
    }

    fn ensure_committable(&self) -> Result<(), RunnerError> {
        match self.phase {
            Phase::Idle => Err(RunnerError::NoChugger),
            Phase::Running => Err(self.invalid("commit")),
            _ => Ok(()),
        }
    }

    fn editable_form(&mut self) -> Result<&mut ResultForm, RunnerError> {
        if self.current.is_none() {
            return Err(RunnerError::NoChugger);
        }
        Ok(&mut self.form)
    }

    fn current_name(&self) -> String {
        self.current
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_default()
    }

    fn invalid(&self, action: &'static str) -> RunnerError {
        RunnerError::InvalidTransition {
            action,
            phase: self.phase,
        }
    }
}

fn parse_field(field: &'static str, text: &str) -> Result<TimeValue, RunnerError> {
    time::parse(text).ok_or_else(|| RunnerError::InvalidTime {
        field,
        text: text.to_string(),
    })
}
