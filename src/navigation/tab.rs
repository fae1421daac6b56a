//! The host's current location.
//!
//! Mirrors the two browser notifications the watcher cares about: fragment
//! changes (`hashchange`) and history navigation (`popstate`).

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use url::{ParseError, Url};

/// Capacity of each notification channel. Lagging listeners just re-read the location.
const SIGNAL_CAPACITY: usize = 16;

/// Kind of location notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSignal {
    /// Same-document fragment change.
    Fragment,
    /// Navigation to another entry or page.
    Navigation,
}

struct TabState {
    current: Url,
    history: Vec<Url>,
}

/// A browsing context whose location can be read and subscribed to.
pub struct BrowserTab {
    state: Mutex<TabState>,
    fragment_tx: broadcast::Sender<()>,
    navigation_tx: broadcast::Sender<()>,
}

impl BrowserTab {
    /// Create a tab showing `start_url`.
    ///
    /// # Errors
    /// Returns an error if `start_url` is not an absolute URL.
    pub fn new(start_url: &str) -> Result<Self, ParseError> {
        let current = Url::parse(start_url)?;
        let (fragment_tx, _) = broadcast::channel(SIGNAL_CAPACITY);
        let (navigation_tx, _) = broadcast::channel(SIGNAL_CAPACITY);

        Ok(Self { state: Mutex::new(TabState { current, history: Vec::new() }), fragment_tx, navigation_tx })
    }

    /// Current location.
    pub fn href(&self) -> String {
        self.state.lock().current.to_string()
    }

    /// Navigate to `href`, pushing the current location onto the history.
    ///
    /// # Errors
    /// Returns an error if `href` is not an absolute URL; the location is left unchanged.
    pub fn navigate(&self, href: &str) -> Result<(), ParseError> {
        let next = Url::parse(href)?;
        {
            let mut state = self.state.lock();
            let previous = std::mem::replace(&mut state.current, next);
            state.history.push(previous);
        }

        debug!("Navigated to {}", href);
        self.notify(LocationSignal::Navigation);
        Ok(())
    }

    /// Go back one history entry. Returns `false` when there is nothing to go back to.
    pub fn back(&self) -> bool {
        {
            let mut state = self.state.lock();
            let Some(previous) = state.history.pop() else {
                return false;
            };
            state.current = previous;
        }

        self.notify(LocationSignal::Navigation);
        true
    }

    /// Replace the fragment of the current location.
    ///
    /// Returns `false` (and notifies nobody) when the fragment is unchanged.
    pub fn set_fragment(&self, fragment: &str) -> bool {
        let fragment = fragment.trim_start_matches('#');
        let fragment = if fragment.is_empty() { None } else { Some(fragment) };
        {
            let mut state = self.state.lock();
            let mut next = state.current.clone();
            next.set_fragment(fragment);
            if next == state.current {
                return false;
            }
            state.current = next;
        }

        self.notify(LocationSignal::Fragment);
        true
    }

    /// Register for one kind of notification. Dropping the receiver deregisters.
    pub fn subscribe(&self, signal: LocationSignal) -> broadcast::Receiver<()> {
        self.sender(signal).subscribe()
    }

    /// Number of live registrations for `signal`.
    #[cfg(test)]
    pub fn listener_count(&self, signal: LocationSignal) -> usize {
        self.sender(signal).receiver_count()
    }

    fn sender(&self, signal: LocationSignal) -> &broadcast::Sender<()> {
        match signal {
            LocationSignal::Fragment => &self.fragment_tx,
            LocationSignal::Navigation => &self.navigation_tx,
        }
    }

    fn notify(&self, signal: LocationSignal) {
        // No listeners is fine
        let _ = self.sender(signal).send(());
    }
}
