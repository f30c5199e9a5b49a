//! Runners behind the `host`, `wand` and `demo` subcommands.

use anyhow::{bail, Context, Result};
use conduit::collaborators::{Collaborators, StaticLibrary};
use conduit::config::ConduitConfig;
use conduit::dispatcher::{Dispatcher, HostContext};
use conduit::feedback::{FeedbackChannel, TracingHaptics};
use conduit::gesture::{
    Gesture, MotionSample, Point, Recognizer, Shape, SwipeDirection, TouchPoint, Vec3,
};
use conduit::protocol::{Command, DeviceInfo, Response};
use conduit::protocol_log::ProtocolLog;
use conduit::room::{pairing_url, room_from_url, RoomCode};
use conduit::session::{ControllerSession, HostSession, SessionOutcome, SessionStatus};
use conduit::transport::{MemoryNetwork, TcpTransport, Transport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// How long the demo waits for further responses before stopping.
const DEMO_SETTLE: Duration = Duration::from_millis(300);

pub async fn run_host(
    config: &ConduitConfig,
    room: Option<String>,
    library: Option<PathBuf>,
) -> Result<()> {
    let room = match room {
        Some(code) => RoomCode::parse(&code)?,
        None => RoomCode::generate(),
    };
    let library = match library {
        Some(path) => StaticLibrary::from_yaml_file(&path)?,
        None => StaticLibrary::sample(),
    };
    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::listener(config.link.listen_addr));

    let mut host = build_host(config, room.clone(), transport, library).await?;
    println!("Room code: {}", room);
    println!(
        "Pairing URL: {}",
        pairing_url(&config.pairing.base_url, &config.pairing.conduit_path, &room)
    );

    let shutdown = shutdown_on_ctrl_c();
    finish(host.run(shutdown).await)
}

pub async fn run_wand(config: &ConduitConfig, room: &str) -> Result<()> {
    let room = parse_room_arg(room)?;
    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::dialer(config.link.host_addr));
    let mut wand = ControllerSession::create(
        room,
        transport,
        DeviceInfo::desktop(),
        Arc::new(TracingHaptics),
        config.supervisor.clone(),
    )
    .await?;
    if let Some(log) = protocol_log(config, "wand")? {
        wand = wand.with_protocol_log(log);
    }

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (response_tx, mut response_rx) = mpsc::unbounded_channel::<Response>();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // stdin closing ends the session
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_gesture_line(&line) {
                Ok(Some(command)) => {
                    if command_tx.send(command).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => eprintln!("{}", e),
            }
        }
        let _ = shutdown_tx.send(true);
    });
    tokio::spawn(async move {
        while let Some(response) = response_rx.recv().await {
            match response.encode() {
                Ok(text) => println!("{}", text),
                Err(e) => warn!(error = %e, "Failed to print response"),
            }
        }
    });

    finish(wand.run(command_rx, response_tx, shutdown_rx).await)
}

/// Runs an altar and a wand over an in-process network, feeds scripted
/// sensor samples through the recognizer and returns every response the
/// wand received, in order.
pub async fn run_demo(config: &ConduitConfig) -> Result<Vec<Response>> {
    let network = MemoryNetwork::new();
    let room = RoomCode::generate();
    let transport: Arc<dyn Transport> = Arc::new(network);

    let mut host = build_host(config, room.clone(), transport.clone(), StaticLibrary::sample()).await?;
    let (host_shutdown, host_shutdown_rx) = watch::channel(false);
    let host_task = tokio::spawn(async move { host.run(host_shutdown_rx).await });

    let device = DeviceInfo::phone();
    let mut wand = ControllerSession::create(
        room,
        transport,
        device.clone(),
        Arc::new(TracingHaptics),
        config.supervisor.clone(),
    )
    .await?;
    let mut status = wand.status_watch();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (response_tx, mut response_rx) = mpsc::unbounded_channel();
    let (wand_shutdown, wand_shutdown_rx) = watch::channel(false);
    let wand_task =
        tokio::spawn(async move { wand.run(command_rx, response_tx, wand_shutdown_rx).await });

    tokio::time::timeout(
        config.supervisor.handshake_timeout(),
        status.wait_for(|s| *s == SessionStatus::Connected),
    )
    .await
    .context("Demo wand did not connect in time")??;

    let mut commands: Vec<Command> = scripted_gestures(config, &device)
        .into_iter()
        .map(Command::from)
        .collect();
    commands.push(Command::Voice {
        text: "dim the lights".to_string(),
    });
    for command in commands {
        info!(tag = %command.tag(), "Demo gesture");
        command_tx
            .send(command)
            .context("Demo wand stopped early")?;
    }

    let mut responses = Vec::new();
    while let Ok(Some(response)) = tokio::time::timeout(DEMO_SETTLE, response_rx.recv()).await {
        responses.push(response);
    }

    let _ = wand_shutdown.send(true);
    let _ = host_shutdown.send(true);
    finish(wand_task.await.context("Demo wand task panicked")?)?;
    finish(host_task.await.context("Demo altar task panicked")?)?;
    Ok(responses)
}

async fn build_host(
    config: &ConduitConfig,
    room: RoomCode,
    transport: Arc<dyn Transport>,
    library: StaticLibrary,
) -> Result<HostSession> {
    let context = HostContext::new(
        Collaborators::local(library),
        FeedbackChannel::new(config.feedback.message_ttl()),
    );
    let host = HostSession::create(
        room,
        transport,
        Dispatcher::with_default_handlers(),
        context,
        config.supervisor.clone(),
    )
    .await?;
    Ok(match protocol_log(config, "host")? {
        Some(log) => host.with_protocol_log(log),
        None => host,
    })
}

fn protocol_log(config: &ConduitConfig, role: &str) -> Result<Option<Arc<ProtocolLog>>> {
    match &config.log_dir {
        Some(dir) => {
            let log = ProtocolLog::new(dir, role)
                .with_context(|| format!("Failed to open protocol log in {}", dir.display()))?;
            info!(path = %log.log_path().display(), "Protocol log enabled");
            Ok(Some(Arc::new(log)))
        }
        None => Ok(None),
    }
}

fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(true);
        }
    });
    rx
}

fn finish(outcome: SessionOutcome) -> Result<()> {
    match outcome {
        SessionOutcome::Shutdown => Ok(()),
        SessionOutcome::Failed(reason) => bail!("Session failed: {}", reason),
    }
}

/// Accepts a bare room code or a full pairing URL.
pub fn parse_room_arg(input: &str) -> Result<RoomCode> {
    if input.contains('?') {
        room_from_url(input)
    } else {
        RoomCode::parse(input)
    }
}

/// Parses one line of wand input into a command. Blank lines yield `None`.
///
/// Gesture words (`shake`, `swipe left`, `tap 2`, `hold`, `draw circle`,
/// `tilt 0.2 -0.4`) map to gesture commands; everything else names a
/// command directly, and `say <text>` sends a voice utterance.
pub fn parse_gesture_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map(|(word, rest)| (word, rest.trim()))
        .unwrap_or((line, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();

    let number = |index: usize, default: f64| -> Result<f64> {
        match args.get(index) {
            Some(raw) => raw
                .parse::<f64>()
                .with_context(|| format!("'{}' is not a number", raw)),
            None => Ok(default),
        }
    };

    let command = match word.to_lowercase().as_str() {
        "shake" => Command::Shake {
            intensity: number(0, 1.0)?,
        },
        "swipe" => {
            let direction = match args.first().copied() {
                Some("up") => SwipeDirection::Up,
                Some("down") => SwipeDirection::Down,
                Some("left") => SwipeDirection::Left,
                Some("right") => SwipeDirection::Right,
                _ => bail!("Usage: swipe up|down|left|right [distance]"),
            };
            Command::Swipe {
                direction,
                distance: number(1, 200.0)?,
                duration: 200,
            }
        }
        "tilt" => Command::Tilt {
            x: number(0, 0.0)?.clamp(-1.0, 1.0),
            y: number(1, 0.0)?.clamp(-1.0, 1.0),
        },
        "tap" => Command::Tap {
            count: number(0, 1.0)?.max(1.0) as u32,
        },
        "hold" => Command::Hold,
        "draw" => {
            let shape = match args.first().copied() {
                Some("circle") => Shape::Circle,
                Some("triangle") => Shape::Triangle,
                Some("infinity") => Shape::Infinity,
                _ => bail!("Usage: draw circle|triangle|infinity"),
            };
            Command::Draw { shape }
        }
        "random" => Command::NavigateRandom,
        "open" if !rest.is_empty() => Command::NavigatePath {
            path: rest.to_string(),
        },
        "scroll" => Command::Scroll {
            delta: number(0, 10.0)?,
        },
        "pause" => Command::Pause,
        "divine" => Command::Divine {
            location: (!rest.is_empty()).then(|| rest.to_string()),
        },
        "whisper" if !rest.is_empty() => Command::Whisper {
            message: rest.to_string(),
        },
        "sound" => Command::Sound {
            level: number(0, 0.5)?,
        },
        "dim" => Command::Dim,
        "brighten" => Command::Brighten,
        "say" if !rest.is_empty() => Command::Voice {
            text: rest.to_string(),
        },
        _ => bail!("Unknown gesture: {}", line),
    };
    Ok(Some(command))
}

/// Sensor samples for a shake, a right swipe, a double tap and a drawn
/// circle, run through a recognizer for `device`.
pub fn scripted_gestures(config: &ConduitConfig, device: &DeviceInfo) -> Vec<Gesture> {
    let mut recognizer = Recognizer::new(&config.gesture, device);
    let mut gestures = Vec::new();

    let rest = Vec3::new(0.0, 0.0, 9.8);
    let jolt = Vec3::new(config.gesture.shake_threshold * 2.0, 0.0, 9.8);
    for (acceleration, timestamp_ms) in [(rest, 0), (jolt, 50)] {
        gestures.extend(recognizer.on_motion(MotionSample {
            acceleration,
            timestamp_ms,
        }));
    }

    let swipe = config.gesture.swipe_min_distance * 3.0;
    recognizer.touch_start(TouchPoint::new(20.0, 400.0, 1_000));
    recognizer.touch_move(TouchPoint::new(20.0 + swipe / 2.0, 400.0, 1_060));
    gestures.extend(recognizer.touch_end(TouchPoint::new(20.0 + swipe, 400.0, 1_120)));

    for start in [2_000, 2_150] {
        recognizer.touch_start(TouchPoint::new(200.0, 200.0, start));
        gestures.extend(recognizer.touch_end(TouchPoint::new(200.0, 200.0, start + 50)));
    }

    recognizer.set_drawing(true);
    let center = Point::new(200.0, 400.0);
    let radius = config.gesture.shape_min_size * 2.0;
    let stroke: Vec<TouchPoint> = (0..=48u32)
        .map(|i| {
            let angle = std::f64::consts::TAU * f64::from(i) / 48.0;
            TouchPoint::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
                3_000 + u64::from(i) * 10,
            )
        })
        .collect();
    if let Some((first, rest)) = stroke.split_first() {
        recognizer.touch_start(*first);
        if let Some((last, middle)) = rest.split_last() {
            for point in middle {
                recognizer.touch_move(*point);
            }
            gestures.extend(recognizer.touch_end(*last));
        }
    }
    recognizer.set_drawing(false);

    gestures
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
