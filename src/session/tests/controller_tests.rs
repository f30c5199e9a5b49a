use super::*;
use crate::supervisor::RetryPolicy;
use crate::transport::{ChannelLink, MemoryNetwork, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(3);

#[derive(Default)]
struct RecordingHaptics {
    patterns: Mutex<Vec<VibrationPattern>>,
}

impl RecordingHaptics {
    fn patterns(&self) -> Vec<VibrationPattern> {
        self.patterns.lock().unwrap().clone()
    }
}

impl HapticActuator for RecordingHaptics {
    fn vibrate(&self, pattern: VibrationPattern) {
        self.patterns.lock().unwrap().push(pattern);
    }
}

fn fast_config(max_attempts: u32) -> SupervisorConfig {
    SupervisorConfig {
        quiet_period_ms: 50,
        handshake_timeout_ms: 2000,
        retry: RetryPolicy::fixed(max_attempts, Duration::from_millis(30)),
    }
}

struct RunningWand {
    handle: JoinHandle<(SessionOutcome, ControllerSession)>,
    status: watch::Receiver<SessionStatus>,
    commands: mpsc::UnboundedSender<Command>,
    responses: mpsc::UnboundedReceiver<Response>,
    shutdown: watch::Sender<bool>,
    haptics: Arc<RecordingHaptics>,
    local_id: String,
}

async fn start_wand(network: &MemoryNetwork, room: &RoomCode, config: SupervisorConfig) -> RunningWand {
    let haptics = Arc::new(RecordingHaptics::default());
    let mut wand = ControllerSession::create(
        room.clone(),
        Arc::new(network.clone()),
        DeviceInfo::phone(),
        haptics.clone(),
        config,
    )
    .await
    .unwrap();
    let status = wand.status_watch();
    let local_id = wand.local_id().to_string();
    let (commands, commands_rx) = mpsc::unbounded_channel();
    let (responses_tx, responses) = mpsc::unbounded_channel();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let outcome = wand.run(commands_rx, responses_tx, shutdown_rx).await;
        (outcome, wand)
    });
    RunningWand {
        handle,
        status,
        commands,
        responses,
        shutdown,
        haptics,
        local_id,
    }
}

/// Waits for the next wand to dial the scripted altar.
async fn accept(altar: &mut Box<dyn PeerEndpoint>) -> Box<dyn PeerLink> {
    match tokio::time::timeout(WAIT, altar.next_event()).await.unwrap() {
        Some(EndpointEvent::Incoming(link)) => link,
        other => panic!("expected an incoming link, got {:?}", other.map(|_| ())),
    }
}

/// Next data message, skipping `Open`. `None` on close or timeout.
async fn next_data(link: &mut Box<dyn PeerLink>, wait: Duration) -> Option<String> {
    tokio::time::timeout(wait, async {
        loop {
            match link.receive().await {
                Some(LinkEvent::Data(text)) => return Some(text),
                Some(LinkEvent::Open) | Some(LinkEvent::Error(_)) => continue,
                Some(LinkEvent::Close) | None => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

async fn reply(link: &mut Box<dyn PeerLink>, response: Response) {
    link.send(&response.encode().unwrap()).await.unwrap();
}

async fn wait_status(status: &mut watch::Receiver<SessionStatus>, expected: SessionStatus) {
    tokio::time::timeout(WAIT, status.wait_for(|s| *s == expected))
        .await
        .expect("timed out waiting for status")
        .unwrap();
}

/// Accepts the wand, checks its handshake and confirms it.
async fn pair(altar: &mut Box<dyn PeerEndpoint>, room: &RoomCode) -> Box<dyn PeerLink> {
    let mut link = accept(altar).await;
    let hello = Command::decode(&next_data(&mut link, WAIT).await.unwrap()).unwrap();
    assert!(matches!(hello, Command::Handshake { .. }));
    reply(&mut link, Response::Connected { room_code: room.clone() }).await;
    link
}

#[tokio::test]
async fn test_handshake_is_sent_when_link_opens() {
    let network = MemoryNetwork::new();
    let room = RoomCode::parse("HELLO1").unwrap();
    let mut altar = network.open(&host_peer_id(&room)).await.unwrap();
    let mut wand = start_wand(&network, &room, fast_config(3)).await;

    let mut link = accept(&mut altar).await;
    assert!(link.remote_id().starts_with("wand-"));
    let hello = Command::decode(&next_data(&mut link, WAIT).await.unwrap()).unwrap();
    assert_eq!(
        hello,
        Command::Handshake {
            device_info: DeviceInfo::phone()
        }
    );

    reply(&mut link, Response::Connected { room_code: room.clone() }).await;
    wait_status(&mut wand.status, SessionStatus::Connected).await;
    assert_eq!(
        wand.responses.recv().await,
        Some(Response::Connected { room_code: room.clone() })
    );
    assert_eq!(wand.haptics.patterns(), vec![VibrationPattern::Summon]);
}

#[tokio::test]
async fn test_commands_while_waiting_are_dropped() {
    let network = MemoryNetwork::new();
    let room = RoomCode::parse("DROP01").unwrap();
    let mut altar = network.open(&host_peer_id(&room)).await.unwrap();
    let mut wand = start_wand(&network, &room, fast_config(3)).await;
    let mut link = accept(&mut altar).await;
    next_data(&mut link, WAIT).await.unwrap();

    wand.commands.send(Command::Shake { intensity: 1.2 }).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(wand.haptics.patterns().is_empty());

    reply(&mut link, Response::Connected { room_code: room.clone() }).await;
    wait_status(&mut wand.status, SessionStatus::Connected).await;
    assert_eq!(next_data(&mut link, Duration::from_millis(100)).await, None);
}

#[tokio::test]
async fn test_sent_command_pulses_and_vibrate_response_is_played() {
    let network = MemoryNetwork::new();
    let room = RoomCode::parse("BUZZ01").unwrap();
    let mut altar = network.open(&host_peer_id(&room)).await.unwrap();
    let mut wand = start_wand(&network, &room, fast_config(3)).await;
    let mut link = pair(&mut altar, &room).await;
    wait_status(&mut wand.status, SessionStatus::Connected).await;

    wand.commands.send(Command::Tap { count: 2 }).unwrap();
    let sent = Command::decode(&next_data(&mut link, WAIT).await.unwrap()).unwrap();
    assert_eq!(sent, Command::Tap { count: 2 });

    reply(&mut link, Response::Vibrate { pattern: VibrationPattern::Oracle }).await;
    // Connected, then the vibrate response
    wand.responses.recv().await.unwrap();
    assert_eq!(
        wand.responses.recv().await,
        Some(Response::Vibrate { pattern: VibrationPattern::Oracle })
    );
    assert_eq!(
        wand.haptics.patterns(),
        vec![VibrationPattern::Summon, VibrationPattern::Tap, VibrationPattern::Oracle]
    );
}

#[tokio::test]
async fn test_wrong_room_confirmation_is_refused() {
    let network = MemoryNetwork::new();
    let room = RoomCode::parse("RIGHT1").unwrap();
    let mut altar = network.open(&host_peer_id(&room)).await.unwrap();
    let wand = start_wand(&network, &room, fast_config(3)).await;

    let mut link = accept(&mut altar).await;
    next_data(&mut link, WAIT).await.unwrap();
    let other = RoomCode::parse("WRONG1").unwrap();
    reply(&mut link, Response::Connected { room_code: other }).await;

    assert_eq!(next_data(&mut link, WAIT).await, None);
    assert_eq!(*wand.status.borrow(), SessionStatus::Waiting);
    // The wand tries again
    let _retry = accept(&mut altar).await;
}

#[tokio::test]
async fn test_missing_altar_exhausts_retries() {
    let network = MemoryNetwork::new();
    let room = RoomCode::parse("NOBODY").unwrap();
    let wand = start_wand(&network, &room, fast_config(2)).await;

    let (outcome, session) = tokio::time::timeout(WAIT, wand.handle).await.unwrap().unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Failed(FailureReason::RetriesExhausted { attempts: 2 })
    );
    assert_eq!(session.status(), SessionStatus::Waiting);
    assert!(!network.is_registered(&wand.local_id));
}

#[tokio::test]
async fn test_late_altar_is_reached_by_retry() {
    let network = MemoryNetwork::new();
    let room = RoomCode::parse("LATE01").unwrap();
    let mut wand = start_wand(&network, &room, fast_config(5)).await;

    tokio::time::sleep(Duration::from_millis(10)).await;
    let mut altar = network.open(&host_peer_id(&room)).await.unwrap();
    let _link = pair(&mut altar, &room).await;
    wait_status(&mut wand.status, SessionStatus::Connected).await;
}

#[tokio::test]
async fn test_closed_link_reverts_and_redials() {
    let network = MemoryNetwork::new();
    let room = RoomCode::parse("AGAIN1").unwrap();
    let mut altar = network.open(&host_peer_id(&room)).await.unwrap();
    let mut wand = start_wand(&network, &room, fast_config(3)).await;
    let mut link = pair(&mut altar, &room).await;
    wait_status(&mut wand.status, SessionStatus::Connected).await;

    link.close().await;
    wait_status(&mut wand.status, SessionStatus::Disconnected).await;
    wait_status(&mut wand.status, SessionStatus::Waiting).await;

    let _second = pair(&mut altar, &room).await;
    wait_status(&mut wand.status, SessionStatus::Connected).await;
}

#[tokio::test]
async fn test_endpoint_error_keeps_live_link() {
    let network = MemoryNetwork::new();
    let room = RoomCode::parse("STEADY").unwrap();
    let mut altar = network.open(&host_peer_id(&room)).await.unwrap();
    let mut wand = start_wand(&network, &room, fast_config(3)).await;
    let mut link = pair(&mut altar, &room).await;
    wait_status(&mut wand.status, SessionStatus::Connected).await;

    assert!(network.inject_error(&wand.local_id, TransportErrorKind::Network));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(network.is_registered(&wand.local_id));
    assert_eq!(*wand.status.borrow(), SessionStatus::Connected);
    // No second dial
    assert!(
        tokio::time::timeout(Duration::from_millis(100), altar.next_event())
            .await
            .is_err()
    );

    wand.commands.send(Command::Dim).unwrap();
    let sent = Command::decode(&next_data(&mut link, WAIT).await.unwrap()).unwrap();
    assert_eq!(sent, Command::Dim);
    assert_eq!(
        wand.haptics.patterns(),
        vec![VibrationPattern::Summon, VibrationPattern::Tap]
    );
}

/// Signalling whose re-registration always fails with a network error.
/// Dialled links open but are never confirmed.
#[derive(Default)]
struct UnreachableSignalling {
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
    events: Mutex<Vec<mpsc::UnboundedSender<EndpointEvent>>>,
    remotes: Arc<Mutex<Vec<ChannelLink>>>,
}

struct UnreachableEndpoint {
    local_id: String,
    events: mpsc::UnboundedReceiver<EndpointEvent>,
    closes: Arc<AtomicUsize>,
    remotes: Arc<Mutex<Vec<ChannelLink>>>,
}

#[async_trait]
impl Transport for UnreachableSignalling {
    async fn open(&self, local_id: &str) -> Result<Box<dyn PeerEndpoint>, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let (tx, events) = mpsc::unbounded_channel();
        self.events.lock().unwrap().push(tx);
        Ok(Box::new(UnreachableEndpoint {
            local_id: local_id.to_string(),
            events,
            closes: self.closes.clone(),
            remotes: self.remotes.clone(),
        }))
    }
}

#[async_trait]
impl PeerEndpoint for UnreachableEndpoint {
    fn local_id(&self) -> &str {
        &self.local_id
    }

    async fn next_event(&mut self) -> Option<EndpointEvent> {
        self.events.recv().await
    }

    async fn connect(&mut self, remote_id: &str) -> Result<Box<dyn PeerLink>, TransportError> {
        let (local, remote) = ChannelLink::pair(&self.local_id, remote_id);
        self.remotes.lock().unwrap().push(remote);
        Ok(Box::new(local))
    }

    async fn reconnect(&mut self) -> Result<(), TransportError> {
        Err(TransportError::new(TransportErrorKind::Network, "signalling down"))
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_failed_reregistration_closes_endpoint_before_reopening() {
    let transport = Arc::new(UnreachableSignalling::default());
    let room = RoomCode::parse("FLAKY1").unwrap();
    let mut wand = ControllerSession::create(
        room,
        transport.clone(),
        DeviceInfo::phone(),
        Arc::new(RecordingHaptics::default()),
        fast_config(3),
    )
    .await
    .unwrap();
    let (_commands, commands_rx) = mpsc::unbounded_channel();
    let (responses_tx, _responses) = mpsc::unbounded_channel();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { wand.run(commands_rx, responses_tx, shutdown_rx).await });

    let first = transport.events.lock().unwrap()[0].clone();
    first.send(EndpointEvent::Disconnected).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(transport.closes.load(Ordering::SeqCst), 1);
    assert_eq!(transport.opens.load(Ordering::SeqCst), 2);

    shutdown.send(true).unwrap();
    assert_eq!(handle.await.unwrap(), SessionOutcome::Shutdown);
    assert_eq!(transport.closes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_taken_wand_id_fails_fatally() {
    let network = MemoryNetwork::new();
    let room = RoomCode::parse("CLASH1").unwrap();
    let _altar = network.open(&host_peer_id(&room)).await.unwrap();
    let wand = start_wand(&network, &room, fast_config(3)).await;

    assert!(network.inject_error(&wand.local_id, TransportErrorKind::UnavailableId));
    let (outcome, _session) = tokio::time::timeout(WAIT, wand.handle).await.unwrap().unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Failed(FailureReason::Fatal(TransportErrorKind::UnavailableId))
    );
}

#[tokio::test]
async fn test_shutdown_closes_link() {
    let network = MemoryNetwork::new();
    let room = RoomCode::parse("BYE001").unwrap();
    let mut altar = network.open(&host_peer_id(&room)).await.unwrap();
    let mut wand = start_wand(&network, &room, fast_config(3)).await;
    let mut link = pair(&mut altar, &room).await;
    wait_status(&mut wand.status, SessionStatus::Connected).await;

    wand.shutdown.send(true).unwrap();
    let (outcome, _session) = wand.handle.await.unwrap();
    assert_eq!(outcome, SessionOutcome::Shutdown);
    assert_eq!(next_data(&mut link, WAIT).await, None);
    assert!(!network.is_registered(&wand.local_id));
}
