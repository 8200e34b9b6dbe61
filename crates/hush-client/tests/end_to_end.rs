//! Three clients on one relay: a direct message from B reaches only A.

use std::time::Duration;

use hush_client::{ClientConfig, ClientSession, SessionEvent};
use hush_crypto::IvMode;
use hush_relay::{RelayConfig, RelayServer};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn start_relay() -> String {
    let config = RelayConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    };
    let server = RelayServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    format!("ws://{}/ws", addr)
}

async fn connect(url: &str, iv_mode: IvMode) -> ClientSession {
    let config = ClientConfig {
        relay_url: url.to_string(),
        iv_mode,
        ..Default::default()
    };
    ClientSession::connect(&config).await.unwrap()
}

/// Read events until one matches, failing after `WAIT`
async fn wait_for<F>(session: &mut ClientSession, mut pred: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    timeout(WAIT, async {
        loop {
            match session.next_event().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("session ended"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn wait_identified(session: &mut ClientSession) -> String {
    match wait_for(session, |e| matches!(e, SessionEvent::Identified(_))).await {
        SessionEvent::Identified(id) => id,
        _ => unreachable!(),
    }
}

async fn wait_keyed(session: &mut ClientSession, peer: &str) {
    let peer = peer.to_string();
    wait_for(session, |e| {
        matches!(e, SessionEvent::PeerKeyed { peer: p, .. } if *p == peer)
    })
    .await;
}

async fn scenario(iv_mode: IvMode) {
    let url = start_relay().await;

    let mut a = connect(&url, iv_mode).await;
    let a_id = wait_identified(&mut a).await;

    let mut b = connect(&url, iv_mode).await;
    let b_id = wait_identified(&mut b).await;
    wait_keyed(&mut a, &b_id).await;
    wait_keyed(&mut b, &a_id).await;

    let mut c = connect(&url, iv_mode).await;
    let c_id = wait_identified(&mut c).await;
    wait_keyed(&mut c, &a_id).await;
    wait_keyed(&mut c, &b_id).await;
    assert_ne!(a_id, c_id);

    b.send_direct(&a_id, "hello").await.unwrap();

    let event = wait_for(&mut a, |e| matches!(e, SessionEvent::Message { .. })).await;
    assert_eq!(
        event,
        SessionEvent::Message {
            from: b_id.clone(),
            text: "hello".to_string()
        }
    );

    // C must not see the message addressed to A
    let leaked = timeout(Duration::from_millis(300), async {
        loop {
            match c.next_event().await {
                Some(SessionEvent::Message { .. }) | Some(SessionEvent::Rejected { .. }) => return true,
                Some(_) => continue,
                None => return false,
            }
        }
    })
    .await
    .unwrap_or(false);
    assert!(!leaked);

    a.close().await;
    b.close().await;
    c.close().await;
}

#[tokio::test]
async fn test_direct_message_reaches_only_target() {
    scenario(IvMode::Fixed).await;
}

#[tokio::test]
async fn test_direct_message_with_random_iv() {
    scenario(IvMode::Random).await;
}

#[tokio::test]
async fn test_send_before_peer_keyed_fails() {
    let url = start_relay().await;
    let mut a = connect(&url, IvMode::Fixed).await;
    wait_identified(&mut a).await;

    assert!(a.send_direct("nobody", "hi").await.is_err());
    a.close().await;
}
