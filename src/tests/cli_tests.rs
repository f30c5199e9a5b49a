use super::*;

#[test]
fn test_gesture_words_map_to_gesture_commands() {
    assert_eq!(
        parse_gesture_line("shake").unwrap(),
        Some(Command::Shake { intensity: 1.0 })
    );
    assert_eq!(
        parse_gesture_line("  swipe left 320 ").unwrap(),
        Some(Command::Swipe {
            direction: SwipeDirection::Left,
            distance: 320.0,
            duration: 200
        })
    );
    assert_eq!(
        parse_gesture_line("draw infinity").unwrap(),
        Some(Command::Draw {
            shape: Shape::Infinity
        })
    );
    assert_eq!(
        parse_gesture_line("tap 2").unwrap(),
        Some(Command::Tap { count: 2 })
    );
    assert_eq!(
        parse_gesture_line("tilt 3 -0.5").unwrap(),
        Some(Command::Tilt { x: 1.0, y: -0.5 })
    );
}

#[test]
fn test_say_keeps_the_whole_utterance() {
    assert_eq!(
        parse_gesture_line("say dim the lights").unwrap(),
        Some(Command::Voice {
            text: "dim the lights".to_string()
        })
    );
    assert_eq!(
        parse_gesture_line("divine").unwrap(),
        Some(Command::Divine { location: None })
    );
    assert_eq!(
        parse_gesture_line("open /writing/lantern").unwrap(),
        Some(Command::NavigatePath {
            path: "/writing/lantern".to_string()
        })
    );
}

#[test]
fn test_blank_and_bad_lines() {
    assert_eq!(parse_gesture_line("   ").unwrap(), None);
    assert!(parse_gesture_line("wiggle").is_err());
    assert!(parse_gesture_line("swipe sideways").is_err());
    assert!(parse_gesture_line("draw square").is_err());
    assert!(parse_gesture_line("say").is_err());
    assert!(parse_gesture_line("shake hard").is_err());
}

#[test]
fn test_room_argument_accepts_code_or_url() {
    assert_eq!(parse_room_arg("abc123").unwrap().as_str(), "ABC123");
    assert_eq!(
        parse_room_arg("http://localhost:8080/conduit?room=XYZ789")
            .unwrap()
            .as_str(),
        "XYZ789"
    );
    assert!(parse_room_arg("http://localhost:8080/conduit?page=2").is_err());
}

#[test]
fn test_scripted_gestures_cover_each_detector() {
    let gestures = scripted_gestures(&ConduitConfig::default(), &DeviceInfo::phone());
    assert!(matches!(gestures[0], Gesture::Shake { .. }));
    assert!(matches!(
        gestures[1],
        Gesture::Swipe {
            direction: SwipeDirection::Right,
            ..
        }
    ));
    assert_eq!(gestures[2], Gesture::Tap { count: 1 });
    assert_eq!(gestures[3], Gesture::Tap { count: 2 });
    assert_eq!(gestures[4], Gesture::Draw(Shape::Circle));
    assert_eq!(gestures.len(), 5);
}

#[test]
fn test_scripted_gestures_skip_missing_sensors() {
    let gestures = scripted_gestures(&ConduitConfig::default(), &DeviceInfo::desktop());
    assert!(!gestures
        .iter()
        .any(|g| matches!(g, Gesture::Shake { .. })));
    assert_eq!(gestures.len(), 4);
}

#[tokio::test]
async fn test_demo_round_trip() {
    let responses = run_demo(&ConduitConfig::default()).await.unwrap();

    let tags: Vec<&str> = responses.iter().map(|r| r.tag()).collect();
    assert_eq!(
        tags,
        vec![
            "connected",
            "state:writing",
            "state:writing",
            "state:reading",
            "state:writing",
            "feedback:vibrate"
        ]
    );
    assert_eq!(
        responses.last(),
        Some(&Response::Vibrate {
            pattern: conduit::feedback::VibrationPattern::Soft
        })
    );
}
