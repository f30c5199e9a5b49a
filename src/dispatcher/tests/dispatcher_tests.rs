use super::*;
use crate::collaborators::{ContentItem, ContentLibrary, StaticLibrary};
use crate::feedback::VibrationPattern;
use crate::gesture::{Shape, SwipeDirection};
use std::time::Duration;

fn context() -> HostContext {
    HostContext::new(
        Collaborators::local(StaticLibrary::sample()),
        FeedbackChannel::new(Duration::from_secs(2)),
    )
}

fn known_items() -> Vec<ContentItem> {
    StaticLibrary::sample().items().to_vec()
}

struct BrokenLibrary;

#[async_trait]
impl ContentLibrary for BrokenLibrary {
    async fn random_item(&self) -> Result<ContentItem> {
        anyhow::bail!("storage offline")
    }

    async fn item_at(&self, _path: &str) -> Result<Option<ContentItem>> {
        anyhow::bail!("storage offline")
    }
}

#[tokio::test]
async fn test_shake_summons_a_known_item() {
    let dispatcher = Dispatcher::with_default_handlers();
    let mut ctx = context();

    let response = dispatcher
        .dispatch(&Command::Shake { intensity: 1.2 }, &mut ctx)
        .await;
    let Some(Response::Writing { item }) = response else {
        panic!("expected state:writing, got {:?}", response);
    };
    assert!(known_items().contains(&item));
    assert_eq!(ctx.presence.current_item.as_deref(), Some(item.path.as_str()));
    assert_eq!(ctx.presence.progress_percent, 0.0);
    assert!(ctx.feedback.current().unwrap().contains(&item.title));
}

#[tokio::test]
async fn test_summon_variants_all_write() {
    let dispatcher = Dispatcher::with_default_handlers();
    let mut ctx = context();
    let commands = [
        Command::NavigateRandom,
        Command::Swipe {
            direction: SwipeDirection::Right,
            distance: 100.0,
            duration: 100,
        },
        Command::Draw {
            shape: Shape::Circle,
        },
    ];
    for command in commands {
        let response = dispatcher.dispatch(&command, &mut ctx).await;
        assert!(matches!(response, Some(Response::Writing { .. })), "{:?}", command);
    }
}

#[tokio::test]
async fn test_reading_progress_is_clamped() {
    let dispatcher = Dispatcher::with_default_handlers();
    let mut ctx = context();

    let response = dispatcher.dispatch(&Command::Scroll { delta: 30.0 }, &mut ctx).await;
    assert_eq!(response, Some(Response::Reading { progress: 30.0 }));

    let response = dispatcher.dispatch(&Command::Scroll { delta: 500.0 }, &mut ctx).await;
    assert_eq!(response, Some(Response::Reading { progress: 100.0 }));

    let swipe_down = Command::Swipe {
        direction: SwipeDirection::Down,
        distance: 2000.0,
        duration: 200,
    };
    let response = dispatcher.dispatch(&swipe_down, &mut ctx).await;
    assert_eq!(response, Some(Response::Reading { progress: 0.0 }));
}

#[tokio::test]
async fn test_single_tap_only_shows_feedback() {
    let dispatcher = Dispatcher::with_default_handlers();
    let mut ctx = context();
    assert_eq!(dispatcher.dispatch(&Command::Tap { count: 1 }, &mut ctx).await, None);
    assert!(ctx.feedback.current().is_some());
    assert!(!ctx.presence.is_paused);

    let response = dispatcher.dispatch(&Command::Tap { count: 2 }, &mut ctx).await;
    assert!(matches!(response, Some(Response::Reading { .. })));
    assert!(ctx.presence.is_paused);

    dispatcher.dispatch(&Command::Pause, &mut ctx).await;
    assert!(!ctx.presence.is_paused);
}

#[tokio::test]
async fn test_oracle_commands() {
    let dispatcher = Dispatcher::with_default_handlers();
    let mut ctx = context();

    for command in [
        Command::Hold,
        Command::Draw {
            shape: Shape::Triangle,
        },
        Command::Divine {
            location: Some("Porto".to_string()),
        },
    ] {
        let response = dispatcher.dispatch(&command, &mut ctx).await;
        assert!(matches!(response, Some(Response::OracleResult { .. })), "{:?}", command);
    }

    let response = dispatcher
        .dispatch(
            &Command::Whisper {
                message: "are you there".to_string(),
            },
            &mut ctx,
        )
        .await;
    let Some(Response::OracleResponse { message, .. }) = response else {
        panic!("expected oracle:response, got {:?}", response);
    };
    assert!(message.contains("are you there"));
}

#[tokio::test]
async fn test_dimming_answers_with_vibration() {
    let dispatcher = Dispatcher::with_default_handlers();
    let mut ctx = context();

    let response = dispatcher.dispatch(&Command::Dim, &mut ctx).await;
    assert_eq!(
        response,
        Some(Response::Vibrate {
            pattern: VibrationPattern::Soft
        })
    );
    assert!(ctx.presence.is_dimmed);

    // Infinity toggles
    let infinity = Command::Draw {
        shape: Shape::Infinity,
    };
    dispatcher.dispatch(&infinity, &mut ctx).await;
    assert!(!ctx.presence.is_dimmed);
    dispatcher.dispatch(&infinity, &mut ctx).await;
    assert!(ctx.presence.is_dimmed);

    let response = dispatcher.dispatch(&Command::Brighten, &mut ctx).await;
    assert_eq!(
        response,
        Some(Response::Vibrate {
            pattern: VibrationPattern::Pulse
        })
    );
    assert!(!ctx.presence.is_dimmed);
}

#[tokio::test]
async fn test_silent_commands_update_presence() {
    let dispatcher = Dispatcher::with_default_handlers();
    let mut ctx = context();

    assert_eq!(dispatcher.dispatch(&Command::Sound { level: 3.0 }, &mut ctx).await, None);
    assert_eq!(ctx.presence.sound_level, 1.0);

    assert_eq!(dispatcher.dispatch(&Command::Tilt { x: 0.5, y: -0.25 }, &mut ctx).await, None);
    assert_eq!(ctx.presence.parallax, (0.5, -0.25));

    let navigate = Command::NavigatePath {
        path: "/writing/orchard".to_string(),
    };
    ctx.presence.scroll(40.0);
    assert_eq!(dispatcher.dispatch(&navigate, &mut ctx).await, None);
    assert_eq!(ctx.presence.current_item.as_deref(), Some("/writing/orchard"));
    assert_eq!(ctx.presence.progress_percent, 0.0);
    assert_eq!(ctx.feedback.current(), Some("Winter Orchard"));

    let back = Command::Swipe {
        direction: SwipeDirection::Left,
        distance: 120.0,
        duration: 150,
    };
    assert_eq!(dispatcher.dispatch(&back, &mut ctx).await, None);
}

#[tokio::test]
async fn test_voice_commands_resolve_to_intents() {
    let dispatcher = Dispatcher::with_default_handlers();
    let mut ctx = context();

    let voice = |text: &str| Command::Voice {
        text: text.to_string(),
    };
    dispatcher.dispatch(&voice("please DIM the lights"), &mut ctx).await;
    assert!(ctx.presence.is_dimmed);

    let response = dispatcher.dispatch(&voice("show me something random"), &mut ctx).await;
    assert!(matches!(response, Some(Response::Writing { .. })));

    let response = dispatcher.dispatch(&voice("what does the oracle see"), &mut ctx).await;
    assert!(matches!(response, Some(Response::OracleResult { .. })));

    let response = dispatcher.dispatch(&voice("hello altar"), &mut ctx).await;
    assert!(matches!(response, Some(Response::OracleResponse { .. })));
}

#[test]
fn test_voice_interpretation() {
    assert_eq!(voice::interpret("Next one"), Command::NavigateRandom);
    assert_eq!(voice::interpret("brighter please"), Command::Brighten);
    assert_eq!(voice::interpret("resume"), Command::Pause);
    // Whole words only
    assert_eq!(
        voice::interpret("  dimension  "),
        Command::Whisper {
            message: "dimension".to_string()
        }
    );
}

#[tokio::test]
async fn test_unknown_tag_produces_no_response() {
    let dispatcher = Dispatcher::with_default_handlers();
    let mut ctx = context();
    let before = ctx.presence.clone();

    assert_eq!(
        dispatcher
            .dispatch_text(r#"{"type":"gesture:wiggle","amount":3}"#, &mut ctx)
            .await,
        None
    );
    assert_eq!(dispatcher.dispatch_text("{not json", &mut ctx).await, None);
    assert_eq!(ctx.presence, before);
}

#[tokio::test]
async fn test_unregistered_and_handshake_commands_are_ignored() {
    let dispatcher = Dispatcher::new();
    let mut ctx = context();
    assert!(!dispatcher.handles(CommandTag::Shake));
    assert_eq!(dispatcher.dispatch(&Command::Shake { intensity: 2.0 }, &mut ctx).await, None);

    let dispatcher = Dispatcher::with_default_handlers();
    let handshake = Command::Handshake {
        device_info: crate::protocol::DeviceInfo::phone(),
    };
    assert_eq!(dispatcher.dispatch(&handshake, &mut ctx).await, None);
}

#[tokio::test]
async fn test_collaborator_failure_yields_no_response() {
    let dispatcher = Dispatcher::with_default_handlers();
    let mut ctx = context();
    ctx.collaborators.library = Arc::new(BrokenLibrary);

    assert_eq!(dispatcher.dispatch(&Command::Shake { intensity: 2.0 }, &mut ctx).await, None);
    assert_eq!(ctx.presence.current_item, None);
}

#[tokio::test]
async fn test_register_replaces_handler() {
    struct Fixed;

    #[async_trait]
    impl CommandHandler for Fixed {
        async fn handle(&self, _: &Command, _: &mut HostContext) -> Result<Option<Response>> {
            Ok(Some(Response::Reading { progress: 42.0 }))
        }
    }

    let mut dispatcher = Dispatcher::with_default_handlers();
    assert!(dispatcher.register(CommandTag::Shake, Arc::new(Fixed)).is_some());
    let mut ctx = context();
    assert_eq!(
        dispatcher.dispatch(&Command::Shake { intensity: 1.0 }, &mut ctx).await,
        Some(Response::Reading { progress: 42.0 })
    );
}
