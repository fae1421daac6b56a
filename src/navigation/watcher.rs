//! Location watcher that classifies every location as restricted or not.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::tab::{BrowserTab, LocationSignal};

/// Classification of the location at the time of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationSnapshot {
    pub is_restricted_page: bool,
}

/// Sites on which listening must be suppressed.
///
/// A location is restricted when its host is one of the sites or a subdomain of
/// one. Locations without a host are matched by substring.
#[derive(Debug, Clone)]
pub struct RestrictionPolicy {
    sites: Vec<String>,
}

impl RestrictionPolicy {
    pub fn new<I, S>(sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sites = sites.into_iter().map(|s| s.as_ref().trim().trim_start_matches('.').to_lowercase()).filter(|s| !s.is_empty()).collect();
        Self { sites }
    }

    pub fn is_restricted(&self, href: &str) -> bool {
        let host = Url::parse(href).ok().and_then(|url| url.host_str().map(str::to_lowercase));

        match host {
            Some(host) => self.sites.iter().any(|site| host == *site || host.strip_suffix(site.as_str()).is_some_and(|rest| rest.ends_with('.'))),
            None => {
                let href = href.to_lowercase();
                self.sites.iter().any(|site| href.contains(site.as_str()))
            }
        }
    }

    pub fn snapshot(&self, href: &str) -> NavigationSnapshot {
        NavigationSnapshot { is_restricted_page: self.is_restricted(href) }
    }
}

/// Registration on a tab's fragment and navigation notifications.
///
/// Dropping the watcher (or calling [`NavigationWatcher::unobserve`]) removes
/// both registrations.
pub struct NavigationWatcher {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl NavigationWatcher {
    /// Start watching `tab`.
    ///
    /// `callback` runs once immediately for the current location, then once per
    /// fragment change or navigation.
    pub fn observe<F>(tab: Arc<BrowserTab>, policy: RestrictionPolicy, mut callback: F) -> Self
    where
        F: FnMut(NavigationSnapshot) + Send + 'static,
    {
        // Subscribe before the first check so no change slips in between
        let mut fragment_rx = tab.subscribe(LocationSignal::Fragment);
        let mut navigation_rx = tab.subscribe(LocationSignal::Navigation);

        let href = tab.href();
        let snapshot = policy.snapshot(&href);
        debug!("Initial location {} (restricted: {})", href, snapshot.is_restricted_page);
        callback(snapshot);

        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                let (result, signal) = tokio::select! {
                    _ = token.cancelled() => break,
                    result = fragment_rx.recv() => (result, LocationSignal::Fragment),
                    result = navigation_rx.recv() => (result, LocationSignal::Navigation),
                };

                match result {
                    Ok(()) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} {:?} notification(s), re-checking location", skipped, signal);
                    }
                    Err(RecvError::Closed) => {
                        debug!("Location notifications closed");
                        break;
                    }
                }

                let href = tab.href();
                let snapshot = policy.snapshot(&href);
                debug!("{:?} signal: {} (restricted: {})", signal, href, snapshot.is_restricted_page);
                callback(snapshot);
            }
        });

        Self { cancel, task: Some(task) }
    }

    /// Remove both registrations and wait until no callback can run anymore.
    pub async fn unobserve(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!("Navigation watcher task failed: {}", e);
        }
    }
}

impl Drop for NavigationWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
