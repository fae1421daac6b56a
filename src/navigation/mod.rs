//! Host location and the watcher that reports restricted pages.

mod tab;
mod watcher;

pub use tab::BrowserTab;
pub use watcher::{NavigationSnapshot, NavigationWatcher, RestrictionPolicy};
