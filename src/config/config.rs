//! Application configuration and CLI argument parsing.

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

/// Recognition engine backing the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Lines typed on the console are the recognized utterances
    #[default]
    Console,
    /// No recognition capability (the session reports it as unavailable)
    Disabled,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Console => write!(f, "console"),
            EngineKind::Disabled => write!(f, "disabled"),
        }
    }
}

/// Smart navigator configuration.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "smart-navigator")]
#[command(author, version, about = "Voice-driven web navigation", long_about = None)]
pub struct AppConfig {
    /// Recognition engine
    #[arg(long, value_enum, env = "NAVIGATOR_ENGINE", default_value = "console")]
    pub engine: EngineKind,

    /// Silence after which the engine ends its session on its own (ms)
    #[arg(long, env = "NAVIGATOR_SILENCE_TIMEOUT_MS", default_value = "8000")]
    pub silence_timeout_ms: u64,

    /// Sites on which listening is paused (host or parent domain, repeatable)
    #[arg(long = "restricted-site", env = "NAVIGATOR_RESTRICTED_SITES", value_delimiter = ',', default_value = "youtube.com")]
    pub restricted_sites: Vec<String>,

    /// Top-level domain appended to spoken site names
    #[arg(long, env = "NAVIGATOR_TLD", default_value = "com")]
    pub tld: String,

    /// Location the tab shows at start-up
    #[arg(long, env = "NAVIGATOR_START_URL", default_value = "about:blank")]
    pub start_url: String,

    /// Log open requests instead of launching the browser
    #[arg(long)]
    pub dry_run: bool,

    /// Print status updates as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl AppConfig {
    /// Parse configuration from command line arguments.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Silence timeout as a duration.
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.silence_timeout_ms == 0 {
            anyhow::bail!("Silence timeout must be positive");
        }

        if self.tld.is_empty() || !self.tld.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!("Top-level domain must be letters, digits or '-', got '{}'", self.tld);
        }

        if self.restricted_sites.iter().any(|site| site.trim().is_empty()) {
            anyhow::bail!("Restricted sites must not be blank");
        }

        if let Err(e) = Url::parse(&self.start_url) {
            anyhow::bail!("Start URL '{}' is invalid: {}", self.start_url, e);
        }

        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        info!("  Engine: {}", self.engine);
        info!("  Silence timeout: {}ms", self.silence_timeout_ms);
        info!("  Restricted sites: {}", self.restricted_sites.join(", "));
        info!("  Top-level domain: .{}", self.tld);
        info!("  Start URL: {}", self.start_url);
        if self.dry_run {
            info!("  Dry run: browser will not be launched");
        }
    }
}
