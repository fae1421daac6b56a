//! Utterance grammar: `open <site>`.

use std::sync::LazyLock;

use regex::Regex;

/// Verb prefix recognized by the grammar.
const OPEN_PREFIX: &str = "open ";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// A parsed utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a site. `target` is a bare domain token without the top-level domain,
    /// `spoken` is the site as it was said.
    Open { target: String, spoken: String },
    /// Nothing in the grammar matched.
    Unrecognized,
}

/// Parse a normalized (lowercase, trimmed) transcript.
pub fn parse(transcript: &str) -> Command {
    let Some(rest) = transcript.strip_prefix(OPEN_PREFIX) else {
        return Command::Unrecognized;
    };

    let spoken = rest.trim();
    if spoken.is_empty() {
        return Command::Unrecognized;
    }

    let target = WHITESPACE.replace_all(spoken, "").into_owned();
    Command::Open { target, spoken: spoken.to_string() }
}

/// Lowercase and trim a raw transcript.
pub fn normalize(transcript: &str) -> String {
    transcript.trim().to_lowercase()
}
