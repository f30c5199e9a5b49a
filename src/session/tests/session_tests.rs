use super::*;

#[test]
fn test_new_session_is_waiting() {
    let session = Session::new(RoomCode::parse("ROOM42").unwrap(), Role::Controller);
    assert_eq!(session.status, SessionStatus::Waiting);
    assert_eq!(session.role, Role::Controller);
}

#[test]
fn test_only_the_cycle_transitions_are_valid() {
    use SessionStatus::*;
    let all = [Waiting, Connected, Disconnected];
    for from in all {
        for to in all {
            let expected = matches!(
                (from, to),
                (Waiting, Connected) | (Connected, Disconnected) | (Disconnected, Waiting)
            );
            assert_eq!(from.can_transition_to(to), expected, "{:?} -> {:?}", from, to);
        }
    }
}

#[test]
fn test_transition_rejects_skips() {
    let mut session = Session::new(RoomCode::parse("ROOM42").unwrap(), Role::Host);
    let err = session.transition(SessionStatus::Disconnected).unwrap_err();
    assert!(err.to_string().contains("Invalid session transition"));
    assert_eq!(session.status, SessionStatus::Waiting);

    session.transition(SessionStatus::Connected).unwrap();
    session.transition(SessionStatus::Disconnected).unwrap();
    session.transition(SessionStatus::Waiting).unwrap();
}

#[tokio::test]
async fn test_optional_sources_stay_pending() {
    let mut link: Option<Box<dyn PeerLink>> = None;
    let mut endpoint: Option<Box<dyn PeerEndpoint>> = None;
    let timeout = std::time::Duration::from_millis(20);

    assert!(tokio::time::timeout(timeout, next_link_event(&mut link)).await.is_err());
    assert!(tokio::time::timeout(timeout, next_endpoint_event(&mut endpoint)).await.is_err());
    assert!(tokio::time::timeout(timeout, sleep_until_opt(None)).await.is_err());
    assert!(tokio::time::timeout(timeout, sleep_until_opt(Some(Instant::now())))
        .await
        .is_ok());
}
