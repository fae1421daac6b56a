//! Recognition session lifecycle.
//!
//! Provides the session controller and the status it publishes.

mod controller;
mod state;

pub use controller::{SessionController, SessionError};
pub use state::{SessionState, StatusMessage};
