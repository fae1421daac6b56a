//! Smart Navigator - voice-driven web navigation.
//!
//! Keeps a speech recognition session alive, pauses it on restricted pages
//! and turns utterances like "open youtube" into new browser tabs.

mod command;
mod config;
mod console;
mod engine;
mod navigation;
mod session;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use command::{CommandDispatcher, LogOpener, OpenFailure, Opener, SystemOpener};
use config::AppConfig;
use console::ConsoleInput;
use engine::{Microphone, RecognitionEngine, RecognitionEvent};
use navigation::{BrowserTab, NavigationSnapshot, NavigationWatcher, RestrictionPolicy};
use session::{SessionController, SessionError};

/// Log an error the controller has already turned into status.
fn report(result: Result<(), SessionError>) {
    if let Err(e) = result {
        warn!("⚠️  {}", e);
    }
}

/// Apply one line of console input.
///
/// Returns `false` when the application should exit.
fn handle_input(input: ConsoleInput, controller: &mut SessionController, microphone: Option<&Microphone>, tab: &BrowserTab, json: bool) -> bool {
    match input {
        ConsoleInput::Speech(text) => match microphone {
            Some(microphone) => {
                if !microphone.hear(&text) {
                    info!("🔇 Microphone is off, use /toggle to turn it on");
                }
            }
            None => warn!("No microphone available"),
        },
        ConsoleInput::Toggle => report(controller.toggle()),
        ConsoleInput::Goto(href) => {
            if let Err(e) = tab.navigate(&href) {
                warn!("Cannot navigate to '{}': {}", href, e);
            }
        }
        ConsoleInput::Fragment(fragment) => {
            if !tab.set_fragment(&fragment) {
                debug!("Fragment unchanged");
            }
        }
        ConsoleInput::Back => {
            if !tab.back() {
                info!("No previous page");
            }
        }
        ConsoleInput::Status => {
            println!("{}", console::format_status(&controller.status(), json));
            println!("   Location: {}", tab.href());
        }
        ConsoleInput::Help => println!("{}", console::HELP),
        ConsoleInput::Unknown(line) => warn!("Unknown command '{}', try /help", line),
        ConsoleInput::Quit => return false,
        ConsoleInput::EndOfInput => {
            info!("Console input closed");
            if let Some(microphone) = microphone {
                microphone.disconnect();
            }
            return false;
        }
    }
    true
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("🛑 Received SIGTERM, shutting down...");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config = AppConfig::from_args();

    // Respect RUST_LOG env var, fallback to verbose flag, default to info.
    // Logs go to stderr, stdout carries status lines.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if config.verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    info!("🧭 Smart Navigator v{}", env!("CARGO_PKG_VERSION"));

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }
    config.log_config();

    // Engine events, handler failures, navigation snapshots and console input all land in the main loop
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RecognitionEvent>();
    let (open_failure_tx, mut open_failure_rx) = mpsc::unbounded_channel::<OpenFailure>();
    let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel::<NavigationSnapshot>();
    let (input_tx, mut input_rx) = mpsc::channel::<ConsoleInput>(16);

    let (engine, microphone) = match engine::create(&config, event_tx) {
        Ok((engine, microphone)) => (Ok(Box::new(engine) as Box<dyn RecognitionEngine>), Some(microphone)),
        Err(e) => {
            error!("❌ {}", e);
            (Err(e), None)
        }
    };

    let opener: Box<dyn Opener> = if config.dry_run { Box::new(LogOpener) } else { Box::new(SystemOpener::new(open_failure_tx)) };
    let dispatcher = CommandDispatcher::new(opener, &config.tld);
    let mut controller = SessionController::new(engine, dispatcher);

    let status_handle = console::spawn_status_task(controller.subscribe(), config.json);

    let tab = Arc::new(BrowserTab::new(&config.start_url).context("Invalid start URL")?);
    let policy = RestrictionPolicy::new(&config.restricted_sites);
    let watcher = NavigationWatcher::observe(tab.clone(), policy, move |snapshot| {
        let _ = snapshot_tx.send(snapshot);
    });

    // Input thread is never joined: a pending stdin read must not block exit
    let _input_thread = console::spawn_input_thread(input_tx);
    info!("Type /help for commands");

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    // Single consumer: everything reaches the controller in arrival order
    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                debug!("Engine event: {:?}", event);
                report(controller.on_engine_event(event));
            }
            Some(failure) = open_failure_rx.recv() => {
                report(controller.on_open_failure(failure));
            }
            Some(snapshot) = snapshot_rx.recv() => {
                report(controller.on_navigation_change(snapshot));
            }
            input = input_rx.recv() => {
                let input = input.unwrap_or(ConsoleInput::EndOfInput);
                if !handle_input(input, &mut controller, microphone.as_ref(), &tab, config.json) {
                    break;
                }
            }
            _ = &mut shutdown => break,
        }
    }

    // Stop watching before the session goes down so nothing resumes it
    watcher.unobserve().await;

    // Engine events still queued are ignored from here on
    controller.shutdown();
    debug!("Session ended {}", controller.state());

    // Closing the status channel ends the render task
    drop(controller);
    let graceful_timeout = tokio::time::Duration::from_millis(500);

    tokio::select! {
        _ = status_handle => {
            debug!("Status task finished gracefully");
        }
        _ = tokio::time::sleep(graceful_timeout) => {
            debug!("Status task didn't finish in time");
        }
    }

    info!("✅ Smart Navigator stopped");
    Ok(())
}
