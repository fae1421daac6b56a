//! Console-backed recognition engine.
//!
//! Each line typed on the console while the engine is started counts as one
//! finalized utterance. Like a browser recognizer in continuous mode, the session
//! ends by itself after a stretch of silence and has to be started again.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{EngineError, EventSink, RecognitionEngine, RecognitionEvent};

/// Reason reported when the console input goes away mid-session.
const INPUT_LOST_REASON: &str = "audio-capture";

/// State shared between the engine handle, its session task and the microphone.
struct Shared {
    running: bool,                     // A session task is alive
    cancel: Option<CancellationToken>, // Cancels the live session task
    activity: Arc<Notify>,             // Resets the silence timer
}

/// Engine handle owned by the session controller.
pub struct ConsoleEngine {
    shared: Arc<Mutex<Shared>>,
    events: EventSink,
    silence_timeout: Duration,
}

/// Input side of the console engine: feeds heard lines into the live session.
#[derive(Clone)]
pub struct Microphone {
    shared: Arc<Mutex<Shared>>,
    events: EventSink,
}

impl ConsoleEngine {
    /// Create a console engine and its microphone.
    ///
    /// # Errors
    /// Returns [`EngineError::InitFailure`] if the silence timeout is zero.
    pub fn new(silence_timeout: Duration, events: EventSink) -> Result<(Self, Microphone), EngineError> {
        if silence_timeout.is_zero() {
            return Err(EngineError::InitFailure("silence timeout must be positive".to_string()));
        }

        let shared = Arc::new(Mutex::new(Shared { running: false, cancel: None, activity: Arc::new(Notify::new()) }));
        let microphone = Microphone { shared: shared.clone(), events: events.clone() };

        info!("Console recognition engine ready ({}ms silence timeout)", silence_timeout.as_millis());
        Ok((Self { shared, events, silence_timeout }, microphone))
    }
}

impl RecognitionEngine for ConsoleEngine {
    fn start(&mut self) -> Result<(), EngineError> {
        let mut shared = self.shared.lock();
        if shared.running {
            return Err(EngineError::StartRejected("recognition has already started".to_string()));
        }

        let token = CancellationToken::new();
        shared.running = true;
        shared.cancel = Some(token.clone());
        let activity = shared.activity.clone();
        drop(shared);

        let _ = self.events.send(RecognitionEvent::Started);
        tokio::spawn(run_session(self.shared.clone(), self.events.clone(), activity, token, self.silence_timeout));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(token) = self.shared.lock().cancel.as_ref() {
            token.cancel();
        }
    }
}

impl Drop for ConsoleEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Keep a session alive until it is cancelled or stays silent for `silence_timeout`.
async fn run_session(shared: Arc<Mutex<Shared>>, events: EventSink, activity: Arc<Notify>, token: CancellationToken, silence_timeout: Duration) {
    debug!("Recognition session started");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Recognition session stopped on request");
                break;
            }
            _ = activity.notified() => continue,
            _ = tokio::time::sleep(silence_timeout) => {
                debug!("Recognition session ended after {}ms of silence", silence_timeout.as_millis());
                break;
            }
        }
    }

    {
        let mut shared = shared.lock();
        shared.running = false;
        shared.cancel = None;
    }
    let _ = events.send(RecognitionEvent::Ended);
}

impl Microphone {
    /// Deliver a heard line to the live session.
    ///
    /// Returns `false` when no session is running and the line was dropped.
    pub fn hear(&self, text: &str) -> bool {
        let shared = self.shared.lock();
        if !shared.running {
            debug!("Microphone is off, dropping \"{}\"", text);
            return false;
        }

        shared.activity.notify_one();
        let _ = self.events.send(RecognitionEvent::Result(text.to_string()));
        true
    }

    /// Report that the console input is gone. A running session fails and ends.
    pub fn disconnect(&self) {
        let shared = self.shared.lock();
        if let Some(token) = shared.cancel.as_ref() {
            let _ = self.events.send(RecognitionEvent::Failure(INPUT_LOST_REASON.to_string()));
            token.cancel();
        }
    }
}
