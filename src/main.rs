//! chugware - headless heat console
//!
//! Reads one command per line from stdin and drives the contest runtime.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use chugware::{
    clock::{ClockMode, ClockSource},
    config::Settings,
    contest::{BottleOutcome, ContestRunner},
    core::{participants::ParticipantStore, results::ResultStore},
    feed::ExternalClockFeed,
    participant::Participant,
    runtime::{ContestEvent, ContestHandle, FormField, RuntimeConfig, spawn_contest},
    types::{Discipline, Status},
};
use clap::Parser;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::Instant,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// chugware - live heat timing console
#[derive(Parser, Debug)]
#[command(name = "chugware")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to ~/.chugware/chugware_config.json)
    #[arg(short, long, env = "CHUGWARE_CONFIG")]
    config: Option<PathBuf>,

    /// Participant list, overriding the settings file
    #[arg(long)]
    participants: Option<PathBuf>,

    /// Result list, overriding the settings file
    #[arg(long)]
    results: Option<PathBuf>,

    /// Serial port of the timing device
    #[arg(long)]
    port: Option<String>,

    /// Baud rate of the timing device
    #[arg(long)]
    baud: Option<u32>,

    /// Start with the external clock selected
    #[arg(long)]
    external: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Console {
    Help,
    Status,
    Eligible,
    Discipline(Discipline),
    Queue(String),
    Next,
    Load(String),
    Ready,
    Start,
    Stop,
    Pause,
    Resume,
    Enter(FormField, String),
    Commit(Status, String),
    Bottle(BottleOutcome, Status),
    Skip,
    ClearSkipped,
    Reset,
    Register {
        name: String,
        program: String,
        team: String,
    },
    Remove(String),
    Results(Option<Discipline>),
    Standings(Discipline),
    Connect(Option<String>),
    Disconnect,
    Clock(ClockMode),
    Log,
    Quit,
}

const HELP: &str = "\
commands:
  status | eligible | results [discipline] | standings <discipline> | log
  discipline <name>      select the active discipline
  register <name>,<program>,<team> | remove <name>
  queue <name>           pre-queue a participant
  next | load <name>     load a chugger
  ready | start | stop | pause | resume
  time <t> | base <t> | add <t>
  pass [comment] | fail [comment] | dq [comment]
  bottle penalty [pass|fail|dq] | bottle clean | bottle overflow
  skip | clear-skipped | reset
  connect [port] | disconnect | clock internal|external
  quit";

fn parse_console(line: &str) -> Result<Console> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let needs = |what: &str| -> Result<String> {
        if rest.is_empty() {
            bail!("{word} needs {what}");
        }
        Ok(rest.to_string())
    };

    let cmd = match word.to_ascii_lowercase().as_str() {
        "help" | "?" => Console::Help,
        "status" => Console::Status,
        "eligible" => Console::Eligible,
        "discipline" => Console::Discipline(needs("a discipline")?.parse()?),
        "queue" => Console::Queue(needs("a name")?),
        "next" => Console::Next,
        "load" => Console::Load(needs("a name")?),
        "ready" => Console::Ready,
        "start" => Console::Start,
        "stop" => Console::Stop,
        "pause" => Console::Pause,
        "resume" => Console::Resume,
        "time" => Console::Enter(FormField::Time, rest.to_string()),
        "base" => Console::Enter(FormField::BaseTime, rest.to_string()),
        "add" => Console::Enter(FormField::AdditionalTime, rest.to_string()),
        "pass" => Console::Commit(Status::Pass, rest.to_string()),
        "fail" => Console::Commit(Status::Fail, rest.to_string()),
        "dq" => Console::Commit(Status::Disqualified, rest.to_string()),
        "bottle" => {
            let lowered = rest.to_ascii_lowercase();
            let (outcome, status) = lowered.split_once(' ').unwrap_or((lowered.as_str(), ""));
            match (outcome, status.trim()) {
                ("penalty", "" | "pass") => Console::Bottle(BottleOutcome::PassWithPenalty, Status::Pass),
                ("penalty", "fail") => Console::Bottle(BottleOutcome::PassWithPenalty, Status::Fail),
                ("penalty", "dq") => Console::Bottle(BottleOutcome::PassWithPenalty, Status::Disqualified),
                ("clean", "") => Console::Bottle(BottleOutcome::CleanPass, Status::Pass),
                ("overflow", "") => Console::Bottle(BottleOutcome::DisqualifyOverflow, Status::Disqualified),
                _ => bail!("unknown bottle outcome {rest:?}"),
            }
        }
        "skip" => Console::Skip,
        "clear-skipped" => Console::ClearSkipped,
        "reset" => Console::Reset,
        "register" => {
            let raw = needs("name,program,team")?;
            let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
            let field = |i: usize| fields.get(i).copied().unwrap_or_default().to_string();
            Console::Register {
                name: field(0),
                program: field(1),
                team: field(2),
            }
        }
        "remove" => Console::Remove(needs("a name")?),
        "results" => Console::Results(if rest.is_empty() { None } else { Some(rest.parse()?) }),
        "standings" => Console::Standings(needs("a discipline")?.parse()?),
        "connect" => Console::Connect((!rest.is_empty()).then(|| rest.to_string())),
        "disconnect" => Console::Disconnect,
        "clock" => match rest.to_ascii_lowercase().as_str() {
            "internal" => Console::Clock(ClockMode::Internal),
            "external" => Console::Clock(ClockMode::External),
            other => bail!("unknown clock mode {other:?}"),
        },
        "log" => Console::Log,
        "quit" | "exit" => Console::Quit,
        other => bail!("unknown command {other:?}; try help"),
    };
    Ok(cmd)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => Settings::default_path()?,
    };
    let mut settings = Settings::load_or_init(&config_path)
        .with_context(|| format!("loading settings from {}", config_path.display()))?;
    if let Some(path) = cli.participants {
        settings.participant_file = path;
    }
    if let Some(path) = cli.results {
        settings.result_file = path;
    }
    if let Some(port) = cli.port {
        settings.external_clock_port = port;
    }
    if let Some(baud) = cli.baud {
        settings.external_clock_baud = baud;
    }
    if cli.external {
        settings.clock_mode = ClockMode::External;
    }

    let participants = ParticipantStore::open(&settings.participant_file)?;
    let results = ResultStore::open(&settings.result_file)?;
    let feed = ExternalClockFeed::new(settings.clock.feed_config());

    if settings.clock_mode == ClockMode::External && !settings.external_clock_port.is_empty() {
        if let Err(err) = feed.connect(&settings.external_clock_port, settings.external_clock_baud) {
            warn!(error = %err, "external clock not connected");
        }
    }
    let clock = ClockSource::from_mode(settings.clock_mode, settings.clock.refresh(), Some(feed.clone()))?;

    let runner = ContestRunner::new(participants, results, clock);
    let handle = spawn_contest(runner, RuntimeConfig::default());
    tokio::spawn(print_events(handle.clone()));
    info!(participants = %settings.participant_file.display(), results = %settings.result_file.display(), "ready");
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let cmd = match parse_console(&line) {
            Ok(cmd) => cmd,
            Err(err) => {
                println!("error: {err}");
                continue;
            }
        };
        if cmd == Console::Quit {
            break;
        }
        if let Err(err) = execute(cmd, &handle, &feed, &settings).await {
            println!("error: {err:#}");
        }
    }

    handle.shutdown().await?;
    feed.disconnect();
    Ok(())
}

async fn execute(cmd: Console, handle: &ContestHandle, feed: &ExternalClockFeed, settings: &Settings) -> Result<()> {
    match cmd {
        Console::Help => println!("{HELP}"),
        Console::Status => {
            let snap = handle.snapshot().await?;
            println!(
                "{:?} | {} | clock {:?} {} | feed {:?}",
                snap.phase,
                snap.discipline,
                snap.clock_mode,
                snap.display,
                feed.status()
            );
            if let Some(p) = &snap.current {
                println!("chugger: {} ({}, {}) tries left: {}", p.name, p.program, p.team, p.tries_count(snap.discipline));
            }
            println!(
                "form: time={:?} base={:?} add={:?}",
                snap.form.time, snap.form.base_time, snap.form.additional_time
            );
            if !snap.queue.is_empty() {
                println!("queue: {}", snap.queue.join(", "));
            }
            if !snap.skipped.is_empty() {
                println!("skipped: {}", snap.skipped.join(", "));
            }
        }
        Console::Eligible => {
            let snap = handle.snapshot().await?;
            for p in &snap.eligible {
                println!("{:<24} {}", p.name, p.tries_count(snap.discipline));
            }
        }
        Console::Discipline(d) => handle.select_discipline(d).await?,
        Console::Queue(name) => handle.enqueue(&name).await?,
        Console::Next => {
            handle.load_next().await?;
        }
        Console::Load(name) => {
            handle.load_selected(&name).await?;
        }
        Console::Ready => handle.ready_check().await?,
        Console::Start => handle.start().await?,
        Console::Stop => {
            handle.stop().await?;
        }
        Console::Pause => handle.pause().await?,
        Console::Resume => handle.resume().await?,
        Console::Enter(field, text) => handle.enter(field, &text).await?,
        Console::Commit(status, comment) => {
            handle.commit(status, &comment).await?;
        }
        Console::Bottle(outcome, status) => {
            handle.commit_bottle(outcome, status).await?;
        }
        Console::Skip => handle.skip().await?,
        Console::ClearSkipped => handle.clear_skipped().await?,
        Console::Reset => handle.reset().await?,
        Console::Register { name, program, team } => {
            handle.register(Participant::register(name, program, team)).await?
        }
        Console::Remove(name) => {
            handle.remove_participant(&name).await?;
        }
        Console::Results(discipline) => {
            for rec in handle.results(discipline).await? {
                println!(
                    "{:<24} {:<14} {:<14} {:<13} {}",
                    rec.name, rec.discipline, rec.time, rec.status, rec.comment
                );
            }
        }
        Console::Standings(discipline) => {
            for (place, rec) in handle.standings(discipline).await?.iter().enumerate() {
                println!("{:>3}. {:<24} {:<14} {}", place + 1, rec.name, rec.time, rec.status);
            }
        }
        Console::Connect(port) => {
            let port = port.unwrap_or_else(|| settings.external_clock_port.clone());
            feed.connect(&port, settings.external_clock_baud)?;
            println!("connected to {port}");
        }
        Console::Disconnect => feed.disconnect(),
        Console::Clock(mode) => handle.set_clock_mode(mode, Some(feed.clone())).await?,
        Console::Log => {
            for line in feed.log_lines() {
                println!("{line}");
            }
        }
        Console::Quit => {}
    }
    Ok(())
}

async fn print_events(handle: ContestHandle) {
    let mut events = handle.subscribe();
    let mut last_tick = Instant::now();
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(_) => break,
        };
        match event {
            ContestEvent::Tick { display } => {
                if last_tick.elapsed() >= Duration::from_secs(1) {
                    last_tick = Instant::now();
                    println!("  {display}");
                }
            }
            ContestEvent::Loaded { name } => println!("loaded {name}"),
            ContestEvent::ReadyChecked { name } => println!("{name} is ready"),
            ContestEvent::Started { name } => println!("go {name}!"),
            ContestEvent::Stopped { name, base_time } => println!("{name} stopped at {base_time}"),
            ContestEvent::Committed { record } => println!(
                "recorded {} {} {} {}",
                record.name, record.discipline, record.time, record.status
            ),
            ContestEvent::Skipped { name } => println!("skipped {name}"),
            ContestEvent::Reset => println!("reset"),
            ContestEvent::DisciplineChanged { discipline, eligible } => {
                println!("{discipline}: {eligible} eligible")
            }
            ContestEvent::ParticipantsChanged => println!("participants updated"),
        }
    }
}
