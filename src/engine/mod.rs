//! Speech recognition engine boundary.
//!
//! The controller only ever sees an engine through [`RecognitionEngine`] and the
//! [`RecognitionEvent`] values it emits on the event channel.

mod console;

pub use console::{ConsoleEngine, Microphone};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{AppConfig, EngineKind};

/// Events produced by a recognition engine, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// The engine began capturing.
    Started,
    /// The engine stopped, either on request or on its own (silence timeout).
    Ended,
    /// A finalized utterance.
    Result(String),
    /// A runtime failure reported by the engine. Always followed by `Ended`.
    Failure(String),
}

/// Sending half of the engine event channel.
pub type EventSink = mpsc::UnboundedSender<RecognitionEvent>;

/// Errors raised by engine construction or its start primitive.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("speech recognition is not supported by this engine")]
    Unavailable,
    #[error("failed to initialize speech recognition: {0}")]
    InitFailure(String),
    #[error("engine refused to start: {0}")]
    StartRejected(String),
}

/// Start/stop primitives of a recognition engine.
///
/// Both calls return immediately; the outcome arrives later as events.
pub trait RecognitionEngine: Send {
    fn start(&mut self) -> Result<(), EngineError>;
    fn stop(&mut self);
}

/// Create the engine selected by the configuration.
///
/// The returned [`Microphone`] is the input side of the console engine.
///
/// # Errors
/// Returns [`EngineError::Unavailable`] when recognition is disabled and
/// [`EngineError::InitFailure`] when the engine cannot be constructed.
pub fn create(config: &AppConfig, events: EventSink) -> Result<(ConsoleEngine, Microphone), EngineError> {
    match config.engine {
        EngineKind::Disabled => Err(EngineError::Unavailable),
        EngineKind::Console => ConsoleEngine::new(config.silence_timeout(), events),
    }
}
