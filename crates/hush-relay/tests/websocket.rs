//! Relay behaviour over real WebSocket connections.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use hush_proto::{split_frames, Envelope, EnvelopeKind};
use hush_relay::{RelayConfig, RelayServer};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start(config: RelayConfig) -> (String, RelayServer) {
    let server = RelayServer::bind(config).await.unwrap();
    let url = format!("ws://{}/ws", server.local_addr().unwrap());
    (url, server)
}

fn local() -> RelayConfig {
    RelayConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    }
}

/// A raw client that remembers frames it has not consumed yet
struct Client {
    socket: Socket,
    pending: Vec<String>,
}

impl Client {
    async fn connect(url: &str) -> Self {
        let (socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        Self {
            socket,
            pending: Vec::new(),
        }
    }

    async fn next_frame(&mut self) -> Option<String> {
        loop {
            if !self.pending.is_empty() {
                return Some(self.pending.remove(0));
            }
            match timeout(WAIT, self.socket.next()).await.ok()?? {
                Ok(Message::Text(text)) => {
                    self.pending.extend(split_frames(&text).map(str::to_string))
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    async fn next_envelope(&mut self) -> Envelope {
        let frame = self.next_frame().await.expect("no frame");
        Envelope::decode(&frame).unwrap()
    }

    /// Wait for the marker Discovery and return our identity
    async fn identity(&mut self) -> String {
        let env = self.next_envelope().await;
        assert!(env.is_self_identification(), "unexpected {:?}", env);
        env.sender
    }

    async fn send(&mut self, text: String) {
        self.socket.send(Message::Text(text)).await.unwrap();
    }
}

#[tokio::test]
async fn test_newcomer_learns_identity_and_is_announced() {
    let (url, server) = start(local()).await;
    let hub = server.hub();
    tokio::spawn(server.run());

    let mut a = Client::connect(&url).await;
    let a_id = a.identity().await;

    let mut b = Client::connect(&url).await;
    let b_id = b.identity().await;
    assert_ne!(a_id, b_id);

    let announce = a.next_envelope().await;
    assert_eq!(announce.kind, EnvelopeKind::Discovery);
    assert_eq!(announce.sender, b_id);
    assert_eq!(announce.body, b_id);
    assert_eq!(announce.target, a_id);

    let live: Vec<String> = hub
        .live_ids()
        .await
        .unwrap()
        .into_iter()
        .map(|id| id.to_string())
        .collect();
    assert_eq!(live.len(), 2);
}

#[tokio::test]
async fn test_direct_is_routed_to_target_only() {
    let (url, server) = start(local()).await;
    tokio::spawn(server.run());

    let mut a = Client::connect(&url).await;
    let a_id = a.identity().await;
    let mut b = Client::connect(&url).await;
    let b_id = b.identity().await;
    a.next_envelope().await; // discovery of b

    let direct = Envelope::direct(&a_id, &b_id, "c2VjcmV0".into());
    a.send(direct.encode().unwrap()).await;
    assert_eq!(b.next_envelope().await, direct);

    // A broadcast reaches both, including the sender
    let shout = Envelope::direct(&b_id, "", "aGk=".into());
    b.send(shout.encode().unwrap()).await;
    assert_eq!(a.next_envelope().await, shout);
    assert_eq!(b.next_envelope().await, shout);
}

#[tokio::test]
async fn test_batched_ingress_and_undecodable_fanout() {
    let (url, server) = start(local()).await;
    tokio::spawn(server.run());

    let mut a = Client::connect(&url).await;
    let a_id = a.identity().await;

    let kex = Envelope::key_exchange(&a_id, &[9u8; 32]).encode().unwrap();
    a.send(format!("not json\n{kex}\n")).await;

    assert_eq!(a.next_frame().await.unwrap(), "not json");
    assert_eq!(a.next_frame().await.unwrap(), kex);
}

#[tokio::test]
async fn test_admin_endpoints() {
    let config = RelayConfig {
        admin_addr: Some("127.0.0.1:0".parse().unwrap()),
        ..local()
    };
    let (_, server) = start(config).await;
    let admin = server.admin_addr().unwrap();
    tokio::spawn(server.run());

    for path in ["/health", "/ready", "/metrics"] {
        let mut stream = TcpStream::connect(admin).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        tokio::io::AsyncWriteExt::write_all(&mut stream, request.as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut stream, &mut response)
            .await
            .unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "{path}: {response}");
        if path == "/metrics" {
            assert!(response.contains("hush_relay_live_connections"));
        }
    }
}
