use std::{
    io::{self, Read},
    sync::{
        Arc,
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use tokio::sync::broadcast;

use chugware::{
    clock::{ClockError, ClockMode, ClockSource, ClockState},
    contest::{ContestRunner, Phase},
    core::{participants::ParticipantStore, results::ResultStore},
    feed::{
        ExternalClockFeed, FeedConfig, FeedError, FeedStatus, device::DeviceOpener,
        reader::MAX_LINE_BYTES,
    },
    mailbox::Mailbox,
    participant::Participant,
    runtime::{ContestEvent, RuntimeConfig, spawn_contest},
    time,
};

/// Device fed line by line from the test through a channel.
struct ScriptedDevice {
    rx: Receiver<io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    timeout: Duration,
}

impl Read for ScriptedDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.timeout) {
                Ok(Ok(bytes)) => self.pending = bytes,
                Ok(Err(err)) => return Err(err),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

/// Hands out one scripted device per connect; the test keeps the sender.
#[derive(Default)]
struct ScriptedOpener {
    senders: Arc<Mutex<Vec<Sender<io::Result<Vec<u8>>>>>>,
    opened: Arc<Mutex<Vec<(String, u32)>>>,
}

impl DeviceOpener for ScriptedOpener {
    fn open(&self, port: &str, baud: u32, timeout: Duration) -> io::Result<Box<dyn Read + Send>> {
        let (tx, rx) = mpsc::channel();
        self.senders.lock().push(tx);
        self.opened.lock().push((port.to_string(), baud));
        Ok(Box::new(ScriptedDevice {
            rx,
            pending: Vec::new(),
            timeout,
        }))
    }
}

struct MissingPort;

impl DeviceOpener for MissingPort {
    fn open(&self, port: &str, _baud: u32, _timeout: Duration) -> io::Result<Box<dyn Read + Send>> {
        Err(io::Error::new(io::ErrorKind::NotFound, format!("{port} not present")))
    }
}

/// Blocks inside `open` until the test releases it.
struct GatedOpener {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl DeviceOpener for GatedOpener {
    fn open(&self, _port: &str, _baud: u32, timeout: Duration) -> io::Result<Box<dyn Read + Send>> {
        let _ = self.entered.lock().send(());
        let _ = self.release.lock().recv();
        let (_tx, rx) = mpsc::channel();
        Ok(Box::new(ScriptedDevice {
            rx,
            pending: Vec::new(),
            timeout,
        }))
    }
}

fn gated_feed() -> (ExternalClockFeed, Receiver<()>, Sender<()>) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let opener = GatedOpener {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    };
    (ExternalClockFeed::with_opener(opener, config()), entered_rx, release_tx)
}

fn config() -> FeedConfig {
    FeedConfig {
        read_timeout: Duration::from_millis(10),
        log_capacity: 4,
    }
}

fn scripted_feed() -> (
    ExternalClockFeed,
    Arc<Mutex<Vec<Sender<io::Result<Vec<u8>>>>>>,
    Arc<Mutex<Vec<(String, u32)>>>,
) {
    let opener = ScriptedOpener::default();
    let senders = Arc::clone(&opener.senders);
    let opened = Arc::clone(&opener.opened);
    (ExternalClockFeed::with_opener(opener, config()), senders, opened)
}

fn send(senders: &Arc<Mutex<Vec<Sender<io::Result<Vec<u8>>>>>>, bytes: &[u8]) {
    let guard = senders.lock();
    let tx = guard.last().expect("connected device");
    tx.send(Ok(bytes.to_vec())).expect("device alive");
}

fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn mailbox_keeps_only_the_newest_value() {
    let mb = Mailbox::new();
    for i in 0..100 {
        mb.put(i);
    }
    assert_eq!(mb.take(), Some(99));
    assert_eq!(mb.take(), None);
}

#[tokio::test]
async fn mailbox_recv_wakes_on_put() {
    let mb = Arc::new(Mailbox::new());
    let producer = Arc::clone(&mb);
    let task = tokio::spawn(async move { producer.put("00:00:01.0000".to_string()) });
    let got = tokio::time::timeout(Duration::from_secs(2), mb.recv())
        .await
        .expect("value delivered");
    assert_eq!(got, "00:00:01.0000");
    task.await.expect("producer");
}

#[test]
fn feed_publishes_tokens_and_logs_lines() {
    let (feed, senders, opened) = scripted_feed();
    feed.connect(" /dev/ttyUSB0 ", 0).expect("connect");
    assert_eq!(feed.status(), FeedStatus::Connected);
    assert_eq!(opened.lock()[0], ("/dev/ttyUSB0".to_string(), 9600));

    send(&senders, b"LANE 1 0:00:07.123 FIN");
    send(&senders, b"ISH\r\n\r\n");
    wait_for(|| !feed.readings().is_empty());

    assert_eq!(feed.readings().take(), Some("0:00:07.123".to_string()));
    assert_eq!(feed.log_lines(), vec!["LANE 1 0:00:07.123 FINISH".to_string()]);

    feed.disconnect();
    assert_eq!(feed.status(), FeedStatus::Disconnected);
}

#[test]
fn read_errors_are_logged_and_reading_continues() {
    let (feed, senders, _) = scripted_feed();
    feed.connect("COM3", 19200).expect("connect");

    senders
        .lock()
        .last()
        .expect("device")
        .send(Err(io::Error::other("framing error")))
        .expect("send");
    send(&senders, b"0:00:03\n");
    wait_for(|| feed.log_lines().len() == 2);

    let lines = feed.log_lines();
    assert!(lines[0].contains("framing error"));
    assert_eq!(lines[1], "0:00:03");
    assert!(feed.is_connected());
    feed.disconnect();
}

#[test]
fn log_evicts_oldest_lines() {
    let (feed, senders, _) = scripted_feed();
    feed.connect("COM3", 9600).expect("connect");
    for i in 0..6 {
        send(&senders, format!("line {i}\n").as_bytes());
    }
    wait_for(|| feed.log_lines().last().is_some_and(|l| l == "line 5"));

    assert_eq!(feed.log_lines(), vec!["line 2", "line 3", "line 4", "line 5"]);
    feed.clear_log();
    assert!(feed.log_lines().is_empty());
    feed.disconnect();
}

#[test]
fn connect_lifecycle_errors() {
    let (feed, _senders, _) = scripted_feed();
    assert!(matches!(feed.connect("  ", 9600), Err(FeedError::EmptyPort)));

    feed.connect("COM3", 9600).expect("connect");
    assert!(matches!(
        feed.connect("COM4", 9600),
        Err(FeedError::AlreadyConnected { port }) if port == "COM3"
    ));

    feed.disconnect();
    feed.disconnect();
    feed.connect("COM4", 4800).expect("reconnect");
    assert_eq!(feed.endpoint(), ("COM4".to_string(), 4800));
    feed.disconnect();

    let missing = ExternalClockFeed::with_opener(MissingPort, config());
    assert!(matches!(missing.connect("COM9", 9600), Err(FeedError::Open { .. })));
    assert_eq!(missing.status(), FeedStatus::Disconnected);
}

#[test]
fn internal_clock_measures_elapsed_time() {
    let mut clock = ClockSource::internal(Duration::from_millis(5));
    assert_eq!(clock.stop(), Err(ClockError::NotRunning));

    clock.start().expect("start");
    assert_eq!(clock.start(), Err(ClockError::AlreadyRunning));
    thread::sleep(Duration::from_millis(30));
    let value = clock.stop().expect("stop");

    let ticks = value.ticks().expect("finite");
    assert!(ticks >= 300, "measured {value}");
    assert_eq!(clock.state(), ClockState::Stopped);
    assert_eq!(clock.stop(), Ok(value));

    clock.reset();
    assert_eq!(clock.state(), ClockState::Idle);
    assert_eq!(clock.last_measurement(), None);
}

#[test]
fn paused_time_is_not_counted() {
    let mut clock = ClockSource::internal(Duration::from_millis(5));
    clock.start().expect("start");
    thread::sleep(Duration::from_millis(20));
    clock.pause().expect("pause");
    let at_pause = clock.display();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(clock.display(), at_pause);
    clock.resume().expect("resume");
    let value = clock.stop().expect("stop");

    let ticks = value.ticks().expect("finite");
    assert!(ticks >= 200);
    assert!(ticks < 700, "pause leaked into measurement: {value}");
}

#[test]
fn external_clock_needs_a_connected_feed() {
    assert_eq!(
        ClockSource::from_mode(ClockMode::External, Duration::from_millis(10), None).err(),
        Some(ClockError::FeedNotConfigured)
    );

    let (feed, _senders, _) = scripted_feed();
    let mut clock = ClockSource::external(feed);
    assert_eq!(clock.start(), Err(ClockError::FeedNotConnected));
    assert_eq!(clock.state(), ClockState::Idle);
}

#[test]
fn external_clock_reports_last_device_reading() {
    let (feed, senders, _) = scripted_feed();
    feed.connect("COM3", 9600).expect("connect");

    send(&senders, b"0:00:01.0000\n");
    wait_for(|| !feed.readings().is_empty());

    let mut clock = ClockSource::external(feed.clone());
    clock.start().expect("start");
    assert!(feed.readings().is_empty(), "stale reading kept");
    assert_eq!(clock.pause(), Err(ClockError::Unsupported("pause")));

    send(&senders, b"RUN 0:00:04.2\n");
    send(&senders, b"RUN 0:00:09.5\n");
    wait_for(|| feed.readings().peek().as_deref() == Some("0:00:09.5"));

    let value = clock.stop().expect("stop");
    assert_eq!(Some(value), time::parse("0:00:09.5"));
    feed.disconnect();
}

#[test]
fn external_stop_without_reading_is_an_error() {
    let (feed, _senders, _) = scripted_feed();
    feed.connect("COM3", 9600).expect("connect");

    let mut clock = ClockSource::external(feed.clone());
    clock.start().expect("start");
    assert_eq!(clock.stop(), Err(ClockError::NoReading));
    assert_eq!(clock.state(), ClockState::Stopped);
    assert_eq!(clock.last_measurement(), None);
    feed.disconnect();
}

#[test]
fn mode_switch_refused_while_running() {
    let (feed, _senders, _) = scripted_feed();
    let mut clock = ClockSource::internal(Duration::from_millis(5));
    clock.start().expect("start");
    assert_eq!(
        clock.set_mode(ClockMode::External, Some(feed.clone())),
        Err(ClockError::AlreadyRunning)
    );
    clock.stop().expect("stop");
    clock
        .set_mode(ClockMode::External, Some(feed))
        .expect("switch after stop");
    assert_eq!(clock.mode(), ClockMode::External);
    assert!(clock.feed().is_some());
    assert_eq!(clock.display(), "00:00:00.0000");
}

/// Waits for the first event `pick` accepts.
async fn wait_event<T>(
    sub: &mut broadcast::Receiver<ContestEvent>,
    mut pick: impl FnMut(ContestEvent) -> Option<T>,
) -> T {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(event) = sub.recv().await {
                if let Some(found) = pick(event) {
                    return found;
                }
            }
        }
    })
    .await
    .expect("event in time")
}

#[tokio::test]
async fn external_clock_drives_a_heat_through_the_handle() {
    let (feed, senders, _) = scripted_feed();
    feed.connect("COM3", 9600).expect("connect");

    let mut participants = ParticipantStore::new();
    participants
        .add(Participant::register("Alice", "CS", "Red"))
        .expect("add");
    let runner = ContestRunner::new(
        participants,
        ResultStore::new(),
        ClockSource::external(feed.clone()),
    );
    let handle = spawn_contest(runner, RuntimeConfig::default());
    let mut sub = handle.subscribe();

    handle.load_next().await.expect("load");
    handle.ready_check().await.expect("ready");
    handle.start().await.expect("start");

    for (line, shown) in [(&b"RUN 0:00:04.2\n"[..], "0:00:04.2"), (&b"RUN 0:00:09.5\n"[..], "0:00:09.5")] {
        send(&senders, line);
        let tick = wait_event(&mut sub, |event| match event {
            ContestEvent::Tick { display } if display == shown => Some(display),
            _ => None,
        })
        .await;
        assert_eq!(tick, shown);
    }

    let measured = handle.stop().await.expect("stop");
    assert_eq!(measured.to_string(), "00:00:09.5000");
    let base_time = wait_event(&mut sub, |event| match event {
        ContestEvent::Stopped { base_time, .. } => Some(base_time),
        _ => None,
    })
    .await;
    assert_eq!(base_time, "00:00:09.5000");

    let snap = handle.snapshot().await.expect("snapshot");
    assert_eq!(snap.phase, Phase::Stopped);
    assert_eq!(snap.form.base_time, "00:00:09.5000");
    assert_eq!(snap.current.expect("loaded").bottle, "2");

    handle.shutdown().await.expect("shutdown");
    feed.disconnect();
}

#[test]
fn slow_open_leaves_status_readable() {
    let (feed, entered, release) = gated_feed();
    let connecting = {
        let feed = feed.clone();
        thread::spawn(move || feed.connect("COM5", 9600))
    };
    entered.recv_timeout(Duration::from_secs(2)).expect("open started");

    assert_eq!(feed.status(), FeedStatus::Connecting);
    assert!(format!("{feed:?}").contains("Connecting"));
    assert!(matches!(
        feed.connect("COM6", 9600),
        Err(FeedError::AlreadyConnected { port }) if port == "COM5"
    ));

    release.send(()).expect("release");
    connecting.join().expect("connect thread").expect("connect");
    assert_eq!(feed.status(), FeedStatus::Connected);
    feed.disconnect();
}

#[test]
fn disconnect_while_opening_cancels_the_connect() {
    let (feed, entered, release) = gated_feed();
    let connecting = {
        let feed = feed.clone();
        thread::spawn(move || feed.connect("COM5", 9600))
    };
    entered.recv_timeout(Duration::from_secs(2)).expect("open started");

    feed.disconnect();
    release.send(()).expect("release");
    assert!(matches!(
        connecting.join().expect("connect thread"),
        Err(FeedError::Cancelled { .. })
    ));
    assert_eq!(feed.status(), FeedStatus::Disconnected);
}

#[test]
fn oversized_lines_are_dropped_up_to_the_newline() {
    let (feed, senders, _) = scripted_feed();
    feed.connect("COM3", 9600).expect("connect");

    let mut flood = vec![b'x'; MAX_LINE_BYTES + 6_000];
    flood.extend_from_slice(b" 0:00:01\n");
    send(&senders, &flood);
    send(&senders, b"FINISH 0:00:05\n");
    wait_for(|| feed.readings().peek().is_some());

    assert_eq!(feed.readings().take(), Some("0:00:05".to_string()));
    let lines = feed.log_lines();
    assert_eq!(lines.len(), 2, "{:?}", lines.iter().map(String::len).collect::<Vec<_>>());
    assert!(lines[0].contains("discarded"));
    assert_eq!(lines[1], "FINISH 0:00:05");
    feed.disconnect();
}
