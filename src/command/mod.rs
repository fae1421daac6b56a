//! Voice command grammar and dispatch.
//!
//! Parses normalized utterances into commands and turns commands into
//! navigation requests against the host.

mod dispatcher;
mod parser;

pub use dispatcher::{CommandDispatcher, DispatchError, Dispatched, LogOpener, OpenFailure, Opener, SystemOpener};
pub use parser::{Command, normalize, parse};

#[cfg(test)]
pub(crate) use dispatcher::tests::RecordingOpener;
