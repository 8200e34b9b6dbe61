//! Per-client outbound mailbox and writer task.
//!
//! The hub holds the [`Mailbox`] side and never blocks on it: a full queue is
//! reported back so the hub can evict the client. The connection owns the
//! [`MailboxReceiver`] and drains it into the transport through
//! [`run_writer`]. Dropping the [`Mailbox`] is what stops the writer.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

use hush_proto::join_frames;

/// Frames a client may have queued before it counts as unresponsive.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("transport write failed: {0}")]
    Transport(String),
}

/// Outcome of a non-blocking delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue at capacity
    Full,
    /// Writer has gone away
    Closed,
}

/// Create a mailbox holding at most `capacity` frames.
pub fn mailbox(capacity: usize) -> (Mailbox, MailboxReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (Mailbox { tx }, MailboxReceiver { rx, capacity })
}

/// Hub-side handle of a client's outbound queue
#[derive(Debug)]
pub struct Mailbox {
    tx: mpsc::Sender<String>,
}

impl Mailbox {
    /// Enqueue a frame without waiting.
    pub fn deliver(&self, frame: String) -> Delivery {
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// Connection-side end of a mailbox
#[derive(Debug)]
pub struct MailboxReceiver {
    rx: mpsc::Receiver<String>,
    capacity: usize,
}

impl MailboxReceiver {
    /// Wait for one frame, then take whatever else is already queued.
    ///
    /// Returns `None` once the mailbox is closed and empty.
    pub async fn next_batch(&mut self) -> Option<Vec<String>> {
        let first = self.rx.recv().await?;
        let mut batch = vec![first];
        while batch.len() < self.capacity {
            match self.rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }
        Some(batch)
    }
}

/// Transport a writer drains into
#[async_trait]
pub trait FrameSink: Send {
    /// Write one text message
    async fn send_text(&mut self, text: String) -> Result<(), WriterError>;
    /// Close the transport
    async fn close(&mut self) -> Result<(), WriterError>;
}

/// Drain `receiver` into `sink` until the mailbox is closed.
///
/// Frames queued while a write is in flight go out together in the next
/// write, newline separated. Order within one mailbox is preserved.
pub async fn run_writer<S: FrameSink>(
    mut receiver: MailboxReceiver,
    mut sink: S,
) -> Result<(), WriterError> {
    while let Some(batch) = receiver.next_batch().await {
        sink.send_text(join_frames(&batch)).await?;
    }
    sink.close().await
}
