//! Session state and the status exposed to the presentation layer.

use std::fmt;

use serde::Serialize;

pub const INITIAL_FEEDBACK: &str = "Click the microphone to start";
pub const LISTENING_HINT: &str = "Listening... Try saying \"Open YouTube\"";
pub const STARTED_FEEDBACK: &str = "Listening... Try saying \"Open YouTube\" or \"Open website example.com\"";
pub const STOPPED_FEEDBACK: &str = "Microphone turned off";
pub const NOT_RECOGNIZED_FEEDBACK: &str = "Command not recognized. Try saying \"Open YouTube\" or \"Open website example.com\"";
pub const NOT_AVAILABLE_ERROR: &str = "Speech recognition is not available.";

/// Lifecycle of the recognition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Listening,
    Erroring,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Listening => write!(f, "listening"),
            SessionState::Erroring => write!(f, "erroring"),
        }
    }
}

/// User-facing feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub state: SessionState,
    pub feedback: String,
    pub error: Option<String>,
    pub transcript: Option<String>,
}

impl Default for StatusMessage {
    fn default() -> Self {
        Self { state: SessionState::Idle, feedback: INITIAL_FEEDBACK.to_string(), error: None, transcript: None }
    }
}

impl StatusMessage {
    /// The line a presentation layer shows: the error when present, otherwise the feedback.
    pub fn headline(&self) -> &str {
        self.error.as_deref().unwrap_or(&self.feedback)
    }
}
