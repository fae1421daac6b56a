//! Console front end: reads user input and renders session status.

use std::io::BufRead;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::session::{SessionState, StatusMessage};

pub const HELP: &str = "\
Commands:
  /toggle          turn the microphone on or off (alias /mic)
  /goto <url>      navigate the tab
  /hash <fragment> change the fragment of the current location
  /back            go back one history entry
  /status          show the current status
  /help            show this help
  /quit            exit
Any other line is spoken to the microphone, e.g. \"open youtube\".";

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// Text heard by the microphone
    Speech(String),
    Toggle,
    Goto(String),
    Fragment(String),
    Back,
    Status,
    Help,
    Quit,
    /// A `/command` that does not exist
    Unknown(String),
    /// Console input closed
    EndOfInput,
}

impl ConsoleInput {
    /// Parse a console line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let Some(command) = line.strip_prefix('/') else {
            return Some(ConsoleInput::Speech(line.to_string()));
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        let input = match (name.to_lowercase().as_str(), arg) {
            ("toggle" | "mic", _) => ConsoleInput::Toggle,
            ("goto" | "go", url) if !url.is_empty() => ConsoleInput::Goto(url.to_string()),
            ("hash", fragment) => ConsoleInput::Fragment(fragment.to_string()),
            ("back", _) => ConsoleInput::Back,
            ("status", _) => ConsoleInput::Status,
            ("help" | "?", _) => ConsoleInput::Help,
            ("quit" | "exit", _) => ConsoleInput::Quit,
            _ => ConsoleInput::Unknown(line.to_string()),
        };
        Some(input)
    }
}

/// Read console lines on a dedicated thread.
///
/// A blocking thread keeps a pending read from holding up runtime shutdown.
pub fn spawn_input_thread(tx: mpsc::Sender<ConsoleInput>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if let Some(input) = ConsoleInput::parse(&line)
                        && tx.blocking_send(input).is_err()
                    {
                        debug!("Input channel closed");
                        return;
                    }
                }
                Err(e) => {
                    warn!("Failed to read console input: {}", e);
                    break;
                }
            }
        }
        let _ = tx.blocking_send(ConsoleInput::EndOfInput);
    })
}

/// Render one status update.
pub fn format_status(status: &StatusMessage, json: bool) -> String {
    if json {
        return serde_json::to_string(status).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e));
    }

    let marker = match status.state {
        SessionState::Listening => "[mic on] ",
        SessionState::Idle => "[mic off]",
        SessionState::Erroring => "[error]  ",
    };
    let mut out = format!("{} {}", marker, status.headline());
    if let Some(transcript) = &status.transcript {
        out.push_str(&format!("\n   Last command: {}", transcript));
    }
    out
}

/// Print every status change until the controller goes away.
pub fn spawn_status_task(mut status_rx: watch::Receiver<StatusMessage>, json: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        println!("{}", format_status(&status_rx.borrow_and_update(), json));

        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            println!("{}", format_status(&status, json));
        }
        debug!("Status channel closed");
    })
}
