//! Command line arguments

use std::path::PathBuf;

use clap::Parser;
use hush_crypto::IvMode;

use crate::config::{CliOverrides, MalformedFramePolicy};

/// hush client - end-to-end encrypted chat over a hush relay
#[derive(Parser, Debug, Default)]
#[command(name = "hush-client")]
#[command(version, about = "hush client - end-to-end encrypted chat over a hush relay")]
pub struct Cli {
    /// Relay WebSocket URL
    #[arg(long, env = "HUSH_RELAY_URL")]
    pub relay_url: Option<String>,

    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// IV mode for message bodies: fixed or random
    #[arg(long)]
    pub iv_mode: Option<IvMode>,

    /// What to do with frames that are not valid envelopes: skip or fatal
    #[arg(long)]
    pub malformed_frames: Option<MalformedFramePolicy>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Debug mode (per-frame tracing)
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            relay_url: self.relay_url.clone(),
            iv_mode: self.iv_mode,
            malformed_frames: self.malformed_frames,
            verbose: self.verbose.then_some(true),
            debug: self.debug.then_some(true),
        }
    }
}
