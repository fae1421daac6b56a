//! Turns parsed commands into navigation side effects.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command as Process;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

use super::parser::Command;

/// Why an open request did not happen.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("'{0}' is not a valid address")]
    InvalidAddress(String),
    #[error("host refused to open a new browsing context: {0}")]
    Refused(String),
}

/// Host capability for opening an address in a new isolated browsing context.
///
/// The new context must not get a handle back to its opener and must not be
/// sent a referrer.
pub trait Opener: Send {
    fn open_isolated(&self, address: &str) -> Result<(), DispatchError>;
}

/// A handler exit that failed after the open request was handed off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFailure {
    pub address: String,
    pub detail: String,
}

/// A handler failing later than this after launch is only logged.
const REPORT_WINDOW: Duration = Duration::from_secs(5);

/// Opens addresses with the platform URL handler.
///
/// The browser is reached through a fresh process, so the new context has no
/// opener and no referrer. The handler is awaited in the background; a
/// non-zero exit is sent to `failures`.
pub struct SystemOpener {
    program: String,
    args: Vec<String>,
    failures: mpsc::UnboundedSender<OpenFailure>,
}

impl SystemOpener {
    pub fn new(failures: mpsc::UnboundedSender<OpenFailure>) -> Self {
        #[cfg(target_os = "macos")]
        let (program, args): (&str, &[&str]) = ("open", &[]);

        #[cfg(target_os = "windows")]
        let (program, args): (&str, &[&str]) = ("cmd", &["/C", "start", ""]);

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let (program, args): (&str, &[&str]) = ("xdg-open", &[]);

        Self::with_handler(program, args, failures)
    }

    /// Run `program args... <address>` for every open request.
    pub fn with_handler(program: &str, args: &[&str], failures: mpsc::UnboundedSender<OpenFailure>) -> Self {
        Self { program: program.to_string(), args: args.iter().map(|a| a.to_string()).collect(), failures }
    }
}

impl Opener for SystemOpener {
    /// Must be called from within a tokio runtime.
    fn open_isolated(&self, address: &str) -> Result<(), DispatchError> {
        let mut child = Process::new(&self.program)
            .args(&self.args)
            .arg(address)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DispatchError::Refused(format!("{}: {}", self.program, e)))?;

        let address = address.to_string();
        let failures = self.failures.clone();
        let launched = Instant::now();

        // Awaiting the child also reaps it
        tokio::spawn(async move {
            let detail = match child.wait().await {
                Ok(status) if status.success() => {
                    debug!("URL handler for {} finished", address);
                    return;
                }
                Ok(status) => format!("URL handler {}", status),
                Err(e) => format!("URL handler lost: {}", e),
            };

            if launched.elapsed() > REPORT_WINDOW {
                debug!("Late URL handler failure for {}: {}", address, detail);
                return;
            }

            debug!("URL handler failed for {}: {}", address, detail);
            let _ = failures.send(OpenFailure { address, detail });
        });

        Ok(())
    }
}

/// Logs open requests instead of performing them (`--dry-run`).
pub struct LogOpener;

impl Opener for LogOpener {
    fn open_isolated(&self, address: &str) -> Result<(), DispatchError> {
        info!("🌐 (dry run) would open {}", address);
        Ok(())
    }
}

/// What a dispatch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// A new browsing context was requested for this address.
    Opened(String),
    /// The command had no effect.
    Ignored,
}

/// Executes commands against the host's open capability.
pub struct CommandDispatcher {
    opener: Box<dyn Opener>,
    tld: String,
}

impl CommandDispatcher {
    pub fn new(opener: Box<dyn Opener>, tld: &str) -> Self {
        Self { opener, tld: tld.to_string() }
    }

    /// Address for a domain token, e.g. `youtube` -> `https://youtube.com`.
    pub fn address_for(&self, target: &str) -> String {
        format!("https://{}.{}", target, self.tld)
    }

    /// Perform the side effect of `command`.
    ///
    /// # Errors
    /// Returns a [`DispatchError`] when the address is malformed or the host
    /// refuses to open it. Neither is fatal to the session.
    pub fn dispatch(&self, command: &Command) -> Result<Dispatched, DispatchError> {
        let Command::Open { target, .. } = command else {
            debug!("Nothing to dispatch for unrecognized command");
            return Ok(Dispatched::Ignored);
        };

        let address = self.address_for(target);
        if !is_bare_origin(&address) {
            return Err(DispatchError::InvalidAddress(address));
        }

        self.opener.open_isolated(&address)?;
        info!("🌐 Opening {}", address);
        Ok(Dispatched::Opened(address))
    }
}

/// True when `address` parses to a host with nothing after it.
fn is_bare_origin(address: &str) -> bool {
    Url::parse(address).is_ok_and(|url| {
        url.host_str().is_some() && url.path() == "/" && url.query().is_none() && url.fragment().is_none() && url.username().is_empty() && url.port().is_none()
    })
}
