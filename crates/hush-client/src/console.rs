//! Operator console.
//!
//! The operator picks a keyed peer by index, then types one line of
//! message text. `-1` or an empty line re-lists peers, `/quit` leaves.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::session::{ClientSession, SessionEvent};

/// Line that ends the console
pub const QUIT_COMMAND: &str = "/quit";

/// Why the console loop returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleExit {
    /// Operator quit or input ended
    Quit,
    /// The relay connection ended
    Disconnected(Option<String>),
}

/// What the session should do after a line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    None,
    Send { peer: String, text: String },
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// Waiting for a peer index; holds the list as last shown
    Choosing(Vec<String>),
    /// Waiting for message text for this peer
    Composing(String),
}

/// Input state of the console, independent of any I/O
#[derive(Debug)]
pub struct Console {
    state: State,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self {
            state: State::Choosing(Vec::new()),
        }
    }

    /// Show `peers` as the selectable list.
    pub fn menu(&mut self, peers: Vec<String>, out: &mut String) {
        if peers.is_empty() {
            out.push_str("No peers with keys yet. Press enter to refresh.\n");
        } else {
            out.push_str("Choose a peer to send a message to, or -1 to refresh:\n");
            for (i, peer) in peers.iter().enumerate() {
                out.push_str(&format!("{i}: {peer}\n"));
            }
        }
        self.state = State::Choosing(peers);
    }

    /// Handle one line of operator input.
    ///
    /// `identified` says whether the relay has told us our identity and
    /// `peers` is the current keyed peer list, used when re-listing.
    pub fn input(
        &mut self,
        line: &str,
        identified: bool,
        peers: Vec<String>,
        out: &mut String,
    ) -> Command {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim() == QUIT_COMMAND {
            out.push_str("Good bye!\n");
            return Command::Quit;
        }

        match std::mem::replace(&mut self.state, State::Choosing(Vec::new())) {
            State::Composing(peer) => {
                let command = Command::Send {
                    peer,
                    text: line.to_string(),
                };
                self.menu(peers, out);
                command
            }
            State::Choosing(listed) => {
                let choice = line.trim();
                if choice.is_empty() {
                    self.menu(peers, out);
                    return Command::None;
                }

                let index: i64 = match choice.parse() {
                    Ok(index) => index,
                    Err(_) => {
                        out.push_str(&format!("Not a peer index: {choice}\n"));
                        self.state = State::Choosing(listed);
                        return Command::None;
                    }
                };

                if index < 0 {
                    self.menu(peers, out);
                    return Command::None;
                }

                if !identified {
                    out.push_str("Your id is not published yet. Refreshing peers.\n");
                    self.menu(peers, out);
                    return Command::None;
                }

                match usize::try_from(index).ok().and_then(|i| listed.get(i)) {
                    Some(peer) => {
                        out.push_str(&format!("Message for {peer}: "));
                        self.state = State::Composing(peer.clone());
                    }
                    None => {
                        out.push_str(&format!("No peer with index {index}\n"));
                        self.state = State::Choosing(listed);
                    }
                }
                Command::None
            }
        }
    }

    /// Text to show for a session event, if any
    pub fn render_event(&self, event: &SessionEvent) -> Option<String> {
        match event {
            SessionEvent::Identified(id) => Some(format!("Connected as {id}\n")),
            SessionEvent::PeerKeyed {
                peer,
                rekeyed: false,
            } => Some(format!("Peer {peer} is ready (-1 to refresh)\n")),
            SessionEvent::Message { from, text } => Some(format!("From: {from} -> {text}\n")),
            SessionEvent::Rejected { reason } => Some(format!("Dropped incoming envelope: {reason}\n")),
            SessionEvent::Closed { error: Some(e) } => Some(format!("Disconnected: {e}\n")),
            _ => None,
        }
    }
}

/// Run the console until the operator quits or the session ends.
pub async fn run<R, W>(
    session: &mut ClientSession,
    input: R,
    mut output: W,
) -> io::Result<ConsoleExit>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut console = Console::new();
    let mut lines = input.lines();

    let mut out = String::new();
    console.menu(session.peers().peers(), &mut out);
    output.write_all(out.as_bytes()).await?;
    output.flush().await?;

    loop {
        let mut out = String::new();
        let exit = tokio::select! {
            line = lines.next_line() => {
                match line? {
                    None => Some(ConsoleExit::Quit),
                    Some(line) => {
                        let identified = session.identity().is_some();
                        let peers = session.peers().peers();
                        match console.input(&line, identified, peers, &mut out) {
                            Command::None => None,
                            Command::Quit => Some(ConsoleExit::Quit),
                            Command::Send { peer, text } => {
                                if let Err(e) = session.send_direct(&peer, &text).await {
                                    out.push_str(&format!("Could not send to {peer}: {e}\n"));
                                }
                                None
                            }
                        }
                    }
                }
            }
            event = session.next_event() => {
                match event {
                    None => Some(ConsoleExit::Disconnected(None)),
                    Some(event) => {
                        if let Some(text) = console.render_event(&event) {
                            out.push_str(&text);
                        }
                        match event {
                            SessionEvent::Closed { error } => Some(ConsoleExit::Disconnected(error)),
                            _ => None,
                        }
                    }
                }
            }
        };

        output.write_all(out.as_bytes()).await?;
        output.flush().await?;
        if let Some(exit) = exit {
            return Ok(exit);
        }
    }
}
