use sync_engine::{ChannelEvent, ConnectAction, ConnectionFsm, ConnectionState};

#[test]
fn connect_without_credentials_stays_idle() {
    let mut fsm = ConnectionFsm::new();
    assert_eq!(fsm.request_connect(false), ConnectAction::Skip);
    assert_eq!(fsm.state(), ConnectionState::Idle);
}

#[test]
fn full_lifecycle() {
    let mut fsm = ConnectionFsm::new();
    assert_eq!(fsm.request_connect(true), ConnectAction::Open);
    assert_eq!(fsm.state(), ConnectionState::Connecting);

    fsm.observe(&ChannelEvent::Connected);
    assert_eq!(fsm.state(), ConnectionState::Connected);
    assert_eq!(fsm.request_connect(true), ConnectAction::Skip);

    fsm.observe(&ChannelEvent::Disconnected {
        reason: "eof".to_string(),
    });
    assert_eq!(fsm.state(), ConnectionState::Reconnecting);

    fsm.observe(&ChannelEvent::ConnectionError {
        message: "refused".to_string(),
        attempt: 3,
    });
    assert_eq!(fsm.retries(), 3);
    assert_eq!(fsm.request_connect(true), ConnectAction::Skip);

    fsm.observe(&ChannelEvent::Connected);
    assert_eq!(fsm.state(), ConnectionState::Connected);
    assert_eq!(fsm.retries(), 0);

    assert!(fsm.request_disconnect());
    assert_eq!(fsm.state(), ConnectionState::Closed);
    assert!(!fsm.request_disconnect());
}

#[test]
fn exhausted_retries_stay_reconnecting_until_rearmed() {
    let mut fsm = ConnectionFsm::new();
    fsm.request_connect(true);
    fsm.observe(&ChannelEvent::ReconnectFailed { attempts: 5 });

    assert_eq!(fsm.state(), ConnectionState::Reconnecting);
    assert!(fsm.is_exhausted());
    assert_eq!(fsm.request_connect(true), ConnectAction::Rearm);
    assert!(!fsm.is_exhausted());
    assert_eq!(fsm.state(), ConnectionState::Reconnecting);
}

#[test]
fn signals_after_close_are_ignored() {
    let mut fsm = ConnectionFsm::new();
    fsm.request_connect(true);
    fsm.request_disconnect();
    fsm.observe(&ChannelEvent::Connected);

    assert_eq!(fsm.state(), ConnectionState::Closed);
    assert_eq!(fsm.request_connect(true), ConnectAction::Open);
}
