//! hush-relay: WebSocket relay for hush
//!
//! The relay assigns every connection an opaque identity, announces
//! newcomers to all known identities and routes envelopes by their
//! `target` and `kind`. It never looks inside the encrypted body.

pub mod config;
pub mod hub;
pub mod mailbox;
pub mod metrics;
pub mod router;
pub mod server;

#[cfg(test)]
mod proptests;

pub use config::{ConfigError, RelayArgs, RelayConfig};
pub use hub::{ClientId, Hub, HubError, HubHandle};
pub use mailbox::{mailbox, Delivery, FrameSink, Mailbox, MailboxReceiver, WriterError};
pub use metrics::RelayMetrics;
pub use router::Route;
pub use server::RelayServer;
