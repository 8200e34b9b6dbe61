//! hush-client entry point

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hush_client::{console, Cli, ClientConfig, ClientSession, ConsoleExit, ExitCode};

#[tokio::main]
async fn main() {
    let code = match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::GeneralError
        }
    };
    // A pending stdin read would otherwise hold the runtime open
    std::process::exit(i32::from(code));
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = ClientConfig::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(&cli.overrides());
    config.validate().context("Invalid configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut session = match ClientSession::connect(&config).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(ExitCode::ConnectionFailed);
        }
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    let code = tokio::select! {
        result = console::run(&mut session, stdin, stdout) => match result {
            Ok(ConsoleExit::Quit) | Ok(ConsoleExit::Disconnected(None)) => ExitCode::Success,
            Ok(ConsoleExit::Disconnected(Some(_))) => ExitCode::ConnectionFailed,
            Err(e) => return Err(e).context("Console I/O failed"),
        },
        _ = tokio::signal::ctrl_c() => ExitCode::Success,
    };

    session.close().await;
    Ok(code)
}
