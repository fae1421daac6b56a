//! Recognition session controller.
//!
//! The only place that decides whether the recognition engine runs. User toggles,
//! engine events and navigation snapshots all pass through here, one at a time,
//! and every change is published as a [`StatusMessage`].
//!
//! Continuous listening relies on the engine ending by itself after silence: an
//! `Ended` while the session should still be listening starts the engine again
//! right away. This keeps the session available at the cost of a restart per
//! silence window.

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::state::{
    LISTENING_HINT, NOT_AVAILABLE_ERROR, NOT_RECOGNIZED_FEEDBACK, STARTED_FEEDBACK, STOPPED_FEEDBACK, SessionState, StatusMessage,
};
use crate::command::{self, Command, CommandDispatcher, DispatchError, Dispatched, OpenFailure};
use crate::engine::{EngineError, RecognitionEngine, RecognitionEvent};
use crate::navigation::NavigationSnapshot;

/// Failures absorbed by the controller. Each one has already been written to
/// the status when it is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("speech recognition is not available")]
    EngineUnavailable,
    #[error("speech recognition failed to initialize: {0}")]
    EngineInitFailure(String),
    #[error("recognition failed: {0}")]
    RecognitionFailure(String),
    #[error("dispatch failed: {0}")]
    DispatchFailure(#[from] DispatchError),
}

/// What the engine itself is doing, as far as the controller has been told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnginePhase {
    Stopped,
    Starting,
    Running,
    Stopping,
}

enum EngineSlot {
    Ready(Box<dyn RecognitionEngine>),
    Missing(SessionError),
}

/// Owner of the recognition session lifecycle.
pub struct SessionController {
    engine: EngineSlot,
    dispatcher: CommandDispatcher,
    state: SessionState,
    phase: EnginePhase,
    /// Cleared by an explicit user stop or a failure; forced pauses leave it alone.
    resume_allowed: bool,
    shut_down: bool,
    status: watch::Sender<StatusMessage>,
}

impl SessionController {
    /// Create a controller around the result of engine construction.
    ///
    /// A missing or broken engine is permanent: it is reported in the status once
    /// and every later start attempt fails with the same error.
    pub fn new(engine: Result<Box<dyn RecognitionEngine>, EngineError>, dispatcher: CommandDispatcher) -> Self {
        let (status, _) = watch::channel(StatusMessage::default());

        let engine = match engine {
            Ok(engine) => EngineSlot::Ready(engine),
            Err(EngineError::Unavailable) => {
                status.send_modify(|s| s.error = Some("Speech recognition is not supported by this engine.".to_string()));
                EngineSlot::Missing(SessionError::EngineUnavailable)
            }
            Err(EngineError::InitFailure(detail) | EngineError::StartRejected(detail)) => {
                status.send_modify(|s| s.error = Some(format!("Failed to initialize speech recognition: {}", detail)));
                EngineSlot::Missing(SessionError::EngineInitFailure(detail))
            }
        };

        Self { engine, dispatcher, state: SessionState::Idle, phase: EnginePhase::Stopped, resume_allowed: true, shut_down: false, status }
    }

    /// Subscribe to status updates.
    pub fn subscribe(&self) -> watch::Receiver<StatusMessage> {
        self.status.subscribe()
    }

    pub fn status(&self) -> StatusMessage {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Begin listening. No-op while already listening.
    ///
    /// # Errors
    /// Fails when the engine is missing or refuses to start; the session is then
    /// `Erroring` (refusal) or unchanged (missing engine).
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Listening {
            debug!("Already listening");
            return Ok(());
        }

        if let EngineSlot::Missing(err) = &self.engine {
            let err = err.clone();
            self.update(|s| s.error = Some(NOT_AVAILABLE_ERROR.to_string()));
            return Err(err);
        }

        self.state = SessionState::Listening;
        self.update(|s| {
            s.error = None;
            s.feedback = LISTENING_HINT.to_string();
        });
        info!("🎤 Listening");

        self.request_engine_start()
    }

    /// Stop listening. No-op while idle.
    pub fn stop(&mut self) {
        if self.state == SessionState::Idle {
            debug!("Already idle");
            return;
        }

        self.state = SessionState::Idle;
        self.request_engine_stop();
        self.update(|s| s.feedback = STOPPED_FEEDBACK.to_string());
        info!("🔇 Microphone turned off");
    }

    /// Flip between listening and not listening on behalf of the user.
    ///
    /// # Errors
    /// Returns [`SessionError::EngineUnavailable`] or [`SessionError::EngineInitFailure`]
    /// without an engine, or the start failure.
    pub fn toggle(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Listening => {
                self.resume_allowed = false;
                self.stop();
                Ok(())
            }
            SessionState::Idle | SessionState::Erroring => {
                self.start()?;
                self.resume_allowed = true;
                Ok(())
            }
        }
    }

    /// Apply one engine event.
    ///
    /// # Errors
    /// Returns the failure the event carried, a refused restart, or a refused dispatch.
    pub fn on_engine_event(&mut self, event: RecognitionEvent) -> Result<(), SessionError> {
        if self.shut_down {
            debug!("Ignoring {:?} after shutdown", event);
            return Ok(());
        }

        match event {
            RecognitionEvent::Started => {
                self.on_started();
                Ok(())
            }
            RecognitionEvent::Ended => self.on_ended(),
            RecognitionEvent::Result(text) => self.on_transcript(&text),
            RecognitionEvent::Failure(reason) => {
                warn!("❌ Recognition error: {}", reason);
                self.enter_error(format!("Error: {}. Please try again.", reason));
                Err(SessionError::RecognitionFailure(reason))
            }
        }
    }

    /// Pause on restricted pages, resume elsewhere unless the user stopped the session.
    ///
    /// # Errors
    /// Returns the start failure when resuming fails.
    pub fn on_navigation_change(&mut self, snapshot: NavigationSnapshot) -> Result<(), SessionError> {
        if snapshot.is_restricted_page {
            if self.state != SessionState::Idle {
                info!("⏸️  Restricted page, pausing recognition");
                self.stop();
            }
            return Ok(());
        }

        if self.state == SessionState::Idle && self.resume_allowed && matches!(self.engine, EngineSlot::Ready(_)) {
            info!("▶️  Unrestricted page, resuming recognition");
            return self.start();
        }

        Ok(())
    }

    /// Report an open request whose URL handler failed after dispatch.
    ///
    /// # Errors
    /// Always returns the refusal as [`SessionError::DispatchFailure`].
    pub fn on_open_failure(&mut self, failure: OpenFailure) -> Result<(), SessionError> {
        Err(self.dispatch_failed(&failure.address, DispatchError::Refused(failure.detail)))
    }

    /// Stop for good. Navigation will not resume the session and engine events
    /// still in flight are ignored.
    pub fn shutdown(&mut self) {
        self.resume_allowed = false;
        self.stop();
        self.shut_down = true;
    }

    fn on_started(&mut self) {
        if self.phase == EnginePhase::Starting {
            self.phase = EnginePhase::Running;
        }

        if self.state != SessionState::Listening {
            debug!("Ignoring stale start while {}", self.state);
            return;
        }

        self.update(|s| {
            s.error = None;
            s.feedback = STARTED_FEEDBACK.to_string();
        });
    }

    fn on_ended(&mut self) -> Result<(), SessionError> {
        self.phase = EnginePhase::Stopped;

        if self.state != SessionState::Listening {
            debug!("Recognition ended while {}", self.state);
            return Ok(());
        }

        info!("🔁 Recognition ended on its own, restarting");
        self.request_engine_start()
    }

    fn on_transcript(&mut self, text: &str) -> Result<(), SessionError> {
        if self.state != SessionState::Listening {
            debug!("Dropping transcript received while {}: \"{}\"", self.state, text);
            return Ok(());
        }

        let transcript = command::normalize(text);
        if transcript.is_empty() {
            debug!("Empty transcript");
            return Ok(());
        }

        info!("🗣️  Heard: {}", transcript);
        self.update(|s| {
            s.transcript = Some(transcript.clone());
            s.error = None;
            s.feedback = format!("Command received: {}", transcript);
        });

        let command = command::parse(&transcript);
        let feedback = match (&command, self.dispatcher.dispatch(&command)) {
            (Command::Open { spoken, .. }, Ok(Dispatched::Opened(address))) => {
                debug!("Requested a new browsing context for {}", address);
                format!("Opening {}...", spoken)
            }
            (_, Ok(_)) => {
                info!("❓ Command not recognized: {}", transcript);
                NOT_RECOGNIZED_FEEDBACK.to_string()
            }
            (_, Err(e)) => {
                let address = match &command {
                    Command::Open { target, .. } => self.dispatcher.address_for(target),
                    Command::Unrecognized => transcript,
                };
                return Err(self.dispatch_failed(&address, e));
            }
        };

        self.update(|s| s.feedback = feedback);
        Ok(())
    }

    /// Show a failed open. The session keeps listening.
    fn dispatch_failed(&self, address: &str, e: DispatchError) -> SessionError {
        warn!("❌ Dispatch failed: {}", e);
        let message = format!("Could not open {}: {}", address, e);
        self.update(|s| s.error = Some(message));
        e.into()
    }

    fn request_engine_start(&mut self) -> Result<(), SessionError> {
        let EngineSlot::Ready(engine) = &mut self.engine else {
            return Err(SessionError::EngineUnavailable);
        };

        match self.phase {
            EnginePhase::Starting | EnginePhase::Running => {
                debug!("Engine already running");
                Ok(())
            }
            EnginePhase::Stopping => {
                debug!("Engine still stopping, it restarts once it has ended");
                Ok(())
            }
            EnginePhase::Stopped => match engine.start() {
                Ok(()) => {
                    self.phase = EnginePhase::Starting;
                    Ok(())
                }
                Err(e) => {
                    warn!("❌ Engine refused to start: {}", e);
                    let detail = e.to_string();
                    self.enter_error(format!("Failed to toggle microphone: {}", detail));
                    Err(SessionError::RecognitionFailure(detail))
                }
            },
        }
    }

    fn request_engine_stop(&mut self) {
        if !matches!(self.phase, EnginePhase::Starting | EnginePhase::Running) {
            return;
        }

        if let EngineSlot::Ready(engine) = &mut self.engine {
            engine.stop();
        }
        self.phase = EnginePhase::Stopping;
    }

    /// Enter `Erroring`. The engine is expected to end by itself afterwards.
    fn enter_error(&mut self, message: String) {
        self.state = SessionState::Erroring;
        self.resume_allowed = false;
        if matches!(self.phase, EnginePhase::Starting | EnginePhase::Running) {
            self.phase = EnginePhase::Stopping;
        }
        self.update(|s| s.error = Some(message));
    }

    fn update(&self, f: impl FnOnce(&mut StatusMessage)) {
        let state = self.state;
        self.status.send_modify(|status| {
            status.state = state;
            f(status);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::command::RecordingOpener;
    use crate::session::state::INITIAL_FEEDBACK;

    #[derive(Default)]
    struct EngineCalls {
        starts: usize,
        stops: usize,
        reject: bool,
    }

    /// Engine that records start/stop requests and never emits events itself.
    #[derive(Clone, Default)]
    struct FakeEngine {
        calls: Arc<Mutex<EngineCalls>>,
    }

    impl FakeEngine {
        fn starts(&self) -> usize {
            self.calls.lock().starts
        }

        fn stops(&self) -> usize {
            self.calls.lock().stops
        }
    }

    impl RecognitionEngine for FakeEngine {
        fn start(&mut self) -> Result<(), EngineError> {
            let mut calls = self.calls.lock();
            if calls.reject {
                return Err(EngineError::StartRejected("recognition has already started".to_string()));
            }
            calls.starts += 1;
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.lock().stops += 1;
        }
    }

    struct Fixture {
        controller: SessionController,
        engine: FakeEngine,
        opener: RecordingOpener,
    }

    fn fixture_with(opener: RecordingOpener) -> Fixture {
        let engine = FakeEngine::default();
        let dispatcher = CommandDispatcher::new(Box::new(opener.clone()), "com");
        let controller = SessionController::new(Ok(Box::new(engine.clone())), dispatcher);
        Fixture { controller, engine, opener }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingOpener::default())
    }

    /// A session that is listening with the engine confirmed running.
    fn listening() -> Fixture {
        let mut f = fixture();
        f.controller.start().unwrap();
        f.controller.on_engine_event(RecognitionEvent::Started).unwrap();
        f
    }

    fn restricted(is_restricted_page: bool) -> NavigationSnapshot {
        NavigationSnapshot { is_restricted_page }
    }

    fn unavailable(engine: EngineError) -> SessionController {
        let dispatcher = CommandDispatcher::new(Box::new(RecordingOpener::default()), "com");
        SessionController::new(Err(engine), dispatcher)
    }

    #[test]
    fn test_initial_state() {
        let f = fixture();
        let status = f.controller.status();
        assert_eq!(f.controller.state(), SessionState::Idle);
        assert_eq!(status.feedback, INITIAL_FEEDBACK);
        assert_eq!(status.error, None);
        assert_eq!(f.engine.starts(), 0);
    }

    #[test]
    fn test_start_twice_issues_one_engine_start() {
        let mut f = fixture();
        f.controller.start().unwrap();
        f.controller.start().unwrap();

        assert_eq!(f.controller.state(), SessionState::Listening);
        assert_eq!(f.engine.starts(), 1);
        assert_eq!(f.controller.status().feedback, LISTENING_HINT);
    }

    #[test]
    fn test_started_confirms_listening() {
        let f = listening();
        let status = f.controller.status();
        assert_eq!(status.state, SessionState::Listening);
        assert_eq!(status.feedback, STARTED_FEEDBACK);
    }

    #[test]
    fn test_stop_is_noop_when_idle() {
        let mut f = fixture();
        f.controller.stop();
        assert_eq!(f.engine.stops(), 0);
        assert_eq!(f.controller.status().feedback, INITIAL_FEEDBACK);
    }

    #[test]
    fn test_stop_from_listening() {
        let mut f = listening();
        f.controller.stop();

        assert_eq!(f.controller.state(), SessionState::Idle);
        assert_eq!(f.engine.stops(), 1);
        assert_eq!(f.controller.status().feedback, STOPPED_FEEDBACK);
    }

    #[test]
    fn test_ended_while_listening_restarts_once() {
        let mut f = listening();
        f.controller.on_engine_event(RecognitionEvent::Ended).unwrap();

        assert_eq!(f.controller.state(), SessionState::Listening);
        assert_eq!(f.engine.starts(), 2);
    }

    #[test]
    fn test_ended_after_explicit_stop_does_not_restart() {
        let mut f = listening();
        f.controller.stop();
        f.controller.on_engine_event(RecognitionEvent::Ended).unwrap();

        assert_eq!(f.controller.state(), SessionState::Idle);
        assert_eq!(f.engine.starts(), 1);
    }

    #[test]
    fn test_late_started_after_stop_is_stale() {
        let mut f = fixture();
        f.controller.start().unwrap();
        f.controller.stop();
        f.controller.on_engine_event(RecognitionEvent::Started).unwrap();

        let status = f.controller.status();
        assert_eq!(status.state, SessionState::Idle);
        assert_eq!(status.feedback, STOPPED_FEEDBACK);
    }

    #[test]
    fn test_start_while_engine_stopping_waits_for_end() {
        let mut f = listening();
        f.controller.stop();
        f.controller.start().unwrap();

        // Previous session has not ended yet
        assert_eq!(f.engine.starts(), 1);
        assert_eq!(f.controller.state(), SessionState::Listening);

        f.controller.on_engine_event(RecognitionEvent::Ended).unwrap();
        assert_eq!(f.engine.starts(), 2);
        assert_eq!(f.controller.state(), SessionState::Listening);
    }

    #[test]
    fn test_open_command_dispatches() {
        let mut f = listening();
        f.controller.on_engine_event(RecognitionEvent::Result("  Open YouTube ".to_string())).unwrap();

        let status = f.controller.status();
        assert_eq!(*f.opener.opened.lock(), vec!["https://youtube.com".to_string()]);
        assert_eq!(status.transcript.as_deref(), Some("open youtube"));
        assert_eq!(status.feedback, "Opening youtube...");
        assert_eq!(status.error, None);
    }

    #[test]
    fn test_multi_word_target_is_collapsed() {
        let mut f = listening();
        f.controller.on_engine_event(RecognitionEvent::Result("open stack overflow".to_string())).unwrap();
        assert_eq!(*f.opener.opened.lock(), vec!["https://stackoverflow.com".to_string()]);
        assert_eq!(f.controller.status().feedback, "Opening stack overflow...");
    }

    #[test]
    fn test_unrecognized_command_reports_status() {
        let mut f = listening();
        f.controller.on_engine_event(RecognitionEvent::Result("play music".to_string())).unwrap();

        let status = f.controller.status();
        assert!(f.opener.opened.lock().is_empty());
        assert_eq!(status.feedback, NOT_RECOGNIZED_FEEDBACK);
        assert_eq!(status.transcript.as_deref(), Some("play music"));
        assert_eq!(f.controller.state(), SessionState::Listening);
    }

    #[test]
    fn test_transcript_while_idle_is_dropped() {
        let mut f = listening();
        f.controller.stop();
        f.controller.on_engine_event(RecognitionEvent::Result("open youtube".to_string())).unwrap();

        assert!(f.opener.opened.lock().is_empty());
        assert_eq!(f.controller.status().transcript, None);
    }

    #[test]
    fn test_refused_dispatch_keeps_listening() {
        let mut f = fixture_with(RecordingOpener { refuse: true, ..Default::default() });
        f.controller.start().unwrap();

        let result = f.controller.on_engine_event(RecognitionEvent::Result("open youtube".to_string()));

        assert!(matches!(result, Err(SessionError::DispatchFailure(DispatchError::Refused(_)))));
        assert_eq!(f.controller.state(), SessionState::Listening);
        let error = f.controller.status().error.unwrap();
        assert_eq!(error, "Could not open https://youtube.com: host refused to open a new browsing context: popup blocked");
    }

    #[test]
    fn test_handler_failure_after_open_is_reported() {
        let mut f = listening();
        f.controller.on_engine_event(RecognitionEvent::Result("open youtube".to_string())).unwrap();

        let failure = OpenFailure { address: "https://youtube.com".to_string(), detail: "URL handler exit status: 3".to_string() };
        let result = f.controller.on_open_failure(failure);

        assert!(matches!(result, Err(SessionError::DispatchFailure(DispatchError::Refused(_)))));
        assert_eq!(f.controller.state(), SessionState::Listening);
        let status = f.controller.status();
        assert_eq!(status.headline(), "Could not open https://youtube.com: host refused to open a new browsing context: URL handler exit status: 3");
    }

    #[test]
    fn test_failure_enters_erroring_without_restart() {
        let mut f = listening();
        let result = f.controller.on_engine_event(RecognitionEvent::Failure("no-speech".to_string()));

        assert_eq!(result, Err(SessionError::RecognitionFailure("no-speech".to_string())));
        assert_eq!(f.controller.state(), SessionState::Erroring);
        assert_eq!(f.controller.status().error.as_deref(), Some("Error: no-speech. Please try again."));

        f.controller.on_engine_event(RecognitionEvent::Ended).unwrap();
        assert_eq!(f.engine.starts(), 1);
        assert_eq!(f.controller.state(), SessionState::Erroring);

        f.controller.toggle().unwrap();
        assert_eq!(f.controller.state(), SessionState::Listening);
        assert_eq!(f.engine.starts(), 2);
        assert_eq!(f.controller.status().error, None);
    }

    #[test]
    fn test_toggle_after_failure_before_end_waits_for_end() {
        let mut f = listening();
        let _ = f.controller.on_engine_event(RecognitionEvent::Failure("network".to_string()));

        f.controller.toggle().unwrap();
        assert_eq!(f.controller.state(), SessionState::Listening);
        assert_eq!(f.engine.starts(), 1);

        f.controller.on_engine_event(RecognitionEvent::Ended).unwrap();
        assert_eq!(f.engine.starts(), 2);
    }

    #[test]
    fn test_toggle_flips_state() {
        let mut f = fixture();
        f.controller.toggle().unwrap();
        assert_eq!(f.controller.state(), SessionState::Listening);

        f.controller.toggle().unwrap();
        assert_eq!(f.controller.state(), SessionState::Idle);
        assert_eq!(f.engine.stops(), 1);
    }

    #[test]
    fn test_restricted_page_always_idles() {
        let mut idle = fixture();
        idle.controller.on_navigation_change(restricted(true)).unwrap();
        assert_eq!(idle.controller.state(), SessionState::Idle);
        assert_eq!(idle.engine.stops(), 0);

        let mut active = listening();
        active.controller.on_navigation_change(restricted(true)).unwrap();
        assert_eq!(active.controller.state(), SessionState::Idle);
        assert_eq!(active.engine.stops(), 1);

        let mut failed = listening();
        let _ = failed.controller.on_engine_event(RecognitionEvent::Failure("no-speech".to_string()));
        failed.controller.on_navigation_change(restricted(true)).unwrap();
        assert_eq!(failed.controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_restricted_page_then_ended_does_not_restart() {
        let mut f = listening();
        f.controller.on_navigation_change(restricted(true)).unwrap();
        f.controller.on_engine_event(RecognitionEvent::Ended).unwrap();

        assert_eq!(f.controller.state(), SessionState::Idle);
        assert_eq!(f.engine.starts(), 1);
    }

    #[test]
    fn test_first_unrestricted_snapshot_starts_session() {
        let mut f = fixture();
        f.controller.on_navigation_change(restricted(false)).unwrap();
        assert_eq!(f.controller.state(), SessionState::Listening);
        assert_eq!(f.engine.starts(), 1);
    }

    #[test]
    fn test_first_restricted_snapshot_never_starts() {
        let mut f = fixture();
        f.controller.on_navigation_change(restricted(true)).unwrap();
        f.controller.on_navigation_change(restricted(true)).unwrap();
        assert_eq!(f.engine.starts(), 0);
    }

    #[test]
    fn test_resume_after_forced_pause() {
        let mut f = fixture();
        f.controller.on_navigation_change(restricted(false)).unwrap();
        f.controller.on_engine_event(RecognitionEvent::Started).unwrap();

        f.controller.on_navigation_change(restricted(true)).unwrap();
        f.controller.on_engine_event(RecognitionEvent::Ended).unwrap();
        assert_eq!(f.controller.state(), SessionState::Idle);

        f.controller.on_navigation_change(restricted(false)).unwrap();
        assert_eq!(f.controller.state(), SessionState::Listening);
        assert_eq!(f.engine.starts(), 2);
    }

    #[test]
    fn test_explicit_stop_is_respected_by_navigation() {
        let mut f = fixture();
        f.controller.toggle().unwrap();
        f.controller.on_engine_event(RecognitionEvent::Started).unwrap();
        f.controller.toggle().unwrap();
        f.controller.on_engine_event(RecognitionEvent::Ended).unwrap();

        f.controller.on_navigation_change(restricted(false)).unwrap();
        assert_eq!(f.controller.state(), SessionState::Idle);
        assert_eq!(f.engine.starts(), 1);

        // User turning the microphone back on re-enables resuming
        f.controller.toggle().unwrap();
        f.controller.on_navigation_change(restricted(true)).unwrap();
        f.controller.on_engine_event(RecognitionEvent::Ended).unwrap();
        f.controller.on_navigation_change(restricted(false)).unwrap();
        assert_eq!(f.controller.state(), SessionState::Listening);
    }

    #[test]
    fn test_failure_is_not_resumed_by_navigation() {
        let mut f = listening();
        let _ = f.controller.on_engine_event(RecognitionEvent::Failure("no-speech".to_string()));
        f.controller.on_engine_event(RecognitionEvent::Ended).unwrap();

        f.controller.on_navigation_change(restricted(true)).unwrap();
        f.controller.on_navigation_change(restricted(false)).unwrap();
        assert_eq!(f.controller.state(), SessionState::Idle);
        assert_eq!(f.engine.starts(), 1);
    }

    #[test]
    fn test_repeated_snapshots_are_idempotent() {
        let mut f = fixture();
        for _ in 0..3 {
            f.controller.on_navigation_change(restricted(false)).unwrap();
        }
        assert_eq!(f.engine.starts(), 1);

        for _ in 0..3 {
            f.controller.on_navigation_change(restricted(true)).unwrap();
        }
        assert_eq!(f.engine.stops(), 1);
        assert_eq!(f.controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_engine_refusing_start_enters_erroring() {
        let mut f = fixture();
        f.engine.calls.lock().reject = true;

        let result = f.controller.start();

        assert!(matches!(result, Err(SessionError::RecognitionFailure(_))));
        assert_eq!(f.controller.state(), SessionState::Erroring);
        let error = f.controller.status().error.unwrap();
        assert!(error.starts_with("Failed to toggle microphone"), "{error}");
    }

    #[test]
    fn test_unavailable_engine() {
        let mut controller = unavailable(EngineError::Unavailable);
        assert_eq!(controller.status().error.as_deref(), Some("Speech recognition is not supported by this engine."));

        // Navigation does not touch the reported condition
        controller.on_navigation_change(restricted(false)).unwrap();
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.status().error.as_deref(), Some("Speech recognition is not supported by this engine."));

        assert_eq!(controller.toggle(), Err(SessionError::EngineUnavailable));
        assert_eq!(controller.state(), SessionState::Idle);
        assert_eq!(controller.status().error.as_deref(), Some(NOT_AVAILABLE_ERROR));
    }

    #[test]
    fn test_engine_init_failure() {
        let mut controller = unavailable(EngineError::InitFailure("no input".to_string()));
        assert_eq!(controller.status().error.as_deref(), Some("Failed to initialize speech recognition: no input"));
        assert_eq!(controller.toggle(), Err(SessionError::EngineInitFailure("no input".to_string())));
    }

    #[test]
    fn test_subscribers_see_updates() {
        let mut f = fixture();
        let rx = f.controller.subscribe();

        f.controller.start().unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow().state, SessionState::Listening);
    }

    #[test]
    fn test_shutdown_blocks_resume() {
        let mut f = listening();
        f.controller.shutdown();
        f.controller.on_engine_event(RecognitionEvent::Ended).unwrap();
        f.controller.on_navigation_change(restricted(false)).unwrap();

        assert_eq!(f.controller.state(), SessionState::Idle);
        assert_eq!(f.engine.starts(), 1);
    }

    #[test]
    fn test_failure_after_shutdown_is_ignored() {
        let mut f = listening();
        f.controller.shutdown();

        let result = f.controller.on_engine_event(RecognitionEvent::Failure("audio-capture".to_string()));

        assert_eq!(result, Ok(()));
        assert_eq!(f.controller.state(), SessionState::Idle);
        let status = f.controller.status();
        assert_eq!(status.state, SessionState::Idle);
        assert_eq!(status.error, None);
        assert_eq!(status.feedback, STOPPED_FEEDBACK);
    }
}
