//! Relay connection runtime.
//!
//! [`ClientSession::connect`] dials the relay and spawns two tasks: an
//! inbound task that feeds frames through the [`KeyExchangeMachine`] and a
//! writer task that owns the socket's sending half. Everything the operator
//! should see is surfaced as a [`SessionEvent`].

use std::sync::Arc;

use futures_util::{SinkExt, Stream, StreamExt};
use hush_crypto::CipherCodec;
use hush_proto::{split_frames, Envelope, EnvelopeError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, MalformedFramePolicy};
use crate::kex::{KexError, KeyExchangeMachine, Outcome};
use crate::peers::PeerKeyStore;

/// Envelopes waiting for the writer
const OUTBOUND_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to relay: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("malformed frame from relay: {0}")]
    Malformed(#[from] EnvelopeError),
    #[error(transparent)]
    Kex(#[from] KexError),
    #[error("session closed")]
    Closed,
}

/// Something the operator should know about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Identified(String),
    PeerJoined(String),
    PeerKeyed { peer: String, rekeyed: bool },
    Message { from: String, text: String },
    /// An inbound envelope was dropped
    Rejected { reason: String },
    /// The inbound loop ended; `error` is set unless the relay closed cleanly
    Closed { error: Option<String> },
}

/// One connection to the relay
pub struct ClientSession {
    machine: Arc<KeyExchangeMachine>,
    outbound: mpsc::Sender<Envelope>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    inbound_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl ClientSession {
    /// Dial the relay and start the session tasks.
    pub async fn connect(config: &ClientConfig) -> Result<Self, SessionError> {
        info!("Connecting to {}", config.relay_url);
        let (socket, _) = tokio_tungstenite::connect_async(config.relay_url.as_str())
            .await
            .map_err(SessionError::Connect)?;
        let (mut sink, stream) = socket.split();

        let machine = Arc::new(KeyExchangeMachine::new(CipherCodec::new(config.iv_mode)));
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Envelope>(OUTBOUND_QUEUE_DEPTH);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let writer_task = tokio::spawn(async move {
            while let Some(envelope) = outbound_rx.recv().await {
                let text = match envelope.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode envelope: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!("Write failed: {}", e);
                    return;
                }
            }
            let _ = sink.close().await;
        });

        let inbound_task = tokio::spawn({
            let machine = machine.clone();
            let outbound = outbound_tx.clone();
            let policy = config.malformed_frames;
            async move {
                let result =
                    run_inbound(stream, &machine, policy, &outbound, &events_tx).await;
                let error = match result {
                    Ok(()) => None,
                    Err(e) => {
                        warn!("Session ended: {}", e);
                        Some(e.to_string())
                    }
                };
                let _ = events_tx.send(SessionEvent::Closed { error });
            }
        });

        Ok(Self {
            machine,
            outbound: outbound_tx,
            events: events_rx,
            inbound_task,
            writer_task,
        })
    }

    pub fn machine(&self) -> Arc<KeyExchangeMachine> {
        self.machine.clone()
    }

    pub fn identity(&self) -> Option<String> {
        self.machine.identity()
    }

    pub fn peers(&self) -> Arc<PeerKeyStore> {
        self.machine.peers()
    }

    /// Encrypt `text` for `peer` and queue it for the relay.
    pub async fn send_direct(&self, peer: &str, text: &str) -> Result<(), SessionError> {
        let envelope = self.machine.seal_direct(peer, text)?;
        self.outbound
            .send(envelope)
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Next event, or `None` once the session is over and drained
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Stop reading and close the socket.
    pub async fn close(self) {
        self.inbound_task.abort();
        let _ = self.inbound_task.await;
        drop(self.outbound);
        let _ = self.writer_task.await;
    }
}

/// Inbound loop: split, decode, advance the machine, forward replies.
async fn run_inbound<S>(
    mut stream: S,
    machine: &KeyExchangeMachine,
    policy: MalformedFramePolicy,
    outbound: &mpsc::Sender<Envelope>,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> Result<(), SessionError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(message) = stream.next().await {
        let text = match message? {
            Message::Text(text) => text,
            Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Message::Close(_) => break,
            _ => continue,
        };

        for frame in split_frames(&text) {
            let envelope = match Envelope::decode(frame) {
                Ok(envelope) => envelope,
                Err(e) => match policy {
                    MalformedFramePolicy::Skip => {
                        warn!("Skipping malformed frame: {}", e);
                        continue;
                    }
                    MalformedFramePolicy::Fatal => return Err(e.into()),
                },
            };
            debug!(sender = %envelope.sender, target = %envelope.target, kind = ?envelope.kind, "Frame received");

            let event = match machine.handle(&envelope) {
                Ok(Outcome::Ignored) => None,
                Ok(Outcome::Identified { identity, reply }) => {
                    send_reply(outbound, reply).await?;
                    Some(SessionEvent::Identified(identity))
                }
                Ok(Outcome::PeerAnnounced { peer, reply }) => {
                    if let Some(reply) = reply {
                        send_reply(outbound, reply).await?;
                    }
                    Some(SessionEvent::PeerJoined(peer))
                }
                Ok(Outcome::PeerKeyed { peer, rekeyed }) => {
                    Some(SessionEvent::PeerKeyed { peer, rekeyed })
                }
                Ok(Outcome::Message { from, plaintext }) => Some(SessionEvent::Message {
                    from,
                    text: plaintext,
                }),
                Err(e) => {
                    warn!("Dropping envelope from {}: {}", envelope.sender, e);
                    Some(SessionEvent::Rejected {
                        reason: e.to_string(),
                    })
                }
            };

            if let Some(event) = event {
                let _ = events.send(event);
            }
        }
    }
    Ok(())
}

async fn send_reply(outbound: &mpsc::Sender<Envelope>, reply: Envelope) -> Result<(), SessionError> {
    outbound.send(reply).await.map_err(|_| SessionError::Closed)
}
