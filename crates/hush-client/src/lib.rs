//! hush-client: terminal client for a hush relay
//!
//! Learns its identity from the relay, exchanges X25519 keys with every
//! other client and encrypts message bodies per peer.

pub mod cli;
pub mod config;
pub mod console;
pub mod kex;
pub mod peers;
pub mod session;

#[cfg(test)]
mod proptests;

pub use cli::Cli;
pub use config::{ClientConfig, ConfigError, MalformedFramePolicy};
pub use console::{Console, ConsoleExit};
pub use kex::{KexError, KeyExchangeMachine, Outcome};
pub use peers::PeerKeyStore;
pub use session::{ClientSession, SessionError, SessionEvent};

/// Process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operator quit (exit code 0)
    Success = 0,
    /// Configuration or other error (exit code 1)
    GeneralError = 1,
    /// Relay unreachable or connection lost (exit code 4)
    ConnectionFailed = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
