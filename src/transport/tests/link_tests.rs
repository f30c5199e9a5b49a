use super::*;

#[tokio::test]
async fn test_pair_starts_with_open_and_carries_data_in_order() {
    let (mut a, mut b) = ChannelLink::pair("wand-a", "host-ROOM");

    assert_eq!(a.remote_id(), "host-ROOM");
    assert_eq!(b.remote_id(), "wand-a");
    assert_eq!(a.receive().await, Some(LinkEvent::Open));
    assert_eq!(b.receive().await, Some(LinkEvent::Open));

    a.send("first").await.unwrap();
    a.send("second").await.unwrap();
    assert_eq!(b.receive().await, Some(LinkEvent::Data("first".to_string())));
    assert_eq!(b.receive().await, Some(LinkEvent::Data("second".to_string())));
}

#[tokio::test]
async fn test_close_is_observed_by_remote_and_blocks_local_use() {
    let (mut a, mut b) = ChannelLink::pair("wand-a", "host-ROOM");
    let _ = b.receive().await; // Open

    a.close().await;

    assert_eq!(b.receive().await, Some(LinkEvent::Close));
    assert_eq!(a.receive().await, None);
    let err = a.send("late").await.unwrap_err();
    assert_eq!(err.kind, TransportErrorKind::Closed);
}

#[tokio::test]
async fn test_dropped_peer_reads_as_close() {
    let (a, mut b) = ChannelLink::pair("wand-a", "host-ROOM");
    let _ = b.receive().await; // Open

    drop(a);

    assert_eq!(b.receive().await, Some(LinkEvent::Close));
    assert_eq!(b.receive().await, None);
}

#[test]
fn test_error_kind_retry_classification() {
    assert!(TransportErrorKind::Network.is_retryable());
    assert!(TransportErrorKind::Server.is_retryable());
    assert!(TransportErrorKind::Socket.is_retryable());
    assert!(TransportErrorKind::PeerUnavailable.is_retryable());
    assert!(!TransportErrorKind::UnavailableId.is_retryable());
    assert!(!TransportErrorKind::Closed.is_retryable());
}

#[test]
fn test_io_errors_map_to_kinds() {
    use std::io::{Error, ErrorKind};

    let taken = TransportError::from(Error::new(ErrorKind::AddrInUse, "in use"));
    assert_eq!(taken.kind, TransportErrorKind::UnavailableId);

    let refused = TransportError::from(Error::new(ErrorKind::ConnectionRefused, "refused"));
    assert_eq!(refused.kind, TransportErrorKind::Network);
    assert!(refused.is_retryable());

    let pipe = TransportError::from(Error::new(ErrorKind::BrokenPipe, "pipe"));
    assert_eq!(pipe.kind, TransportErrorKind::Socket);
}
