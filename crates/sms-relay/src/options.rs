//! Option codes: the fixed set of reply choices and their display text.

use serde::{Deserialize, Serialize};

/// Shown when the store has no matching statement yet.
pub const NO_RESPONSE: &str = "No response yet";
/// Shown when the stored code is not in the option table.
pub const UNKNOWN_RESPONSE: &str = "Unknown response";

/// One selectable reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyOption {
    pub code: String,
    pub label: String,
}

impl ReplyOption {
    pub fn new(code: &str, label: &str) -> Self {
        Self {
            code: code.to_string(),
            label: label.to_string(),
        }
    }
}

/// Immutable lookup table from option code to display text.
///
/// Codes are stored in their normalized form (trimmed, uppercase) so lookups
/// line up with [`normalize_reply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionTable {
    entries: Vec<ReplyOption>,
}

/// Result of decoding a stored code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded<'a> {
    Known(&'a str),
    Unknown,
}

impl<'a> Decoded<'a> {
    pub fn display(self) -> &'a str {
        match self {
            Decoded::Known(label) => label,
            Decoded::Unknown => UNKNOWN_RESPONSE,
        }
    }
}

impl OptionTable {
    /// Build a table; later duplicates of a code are ignored.
    pub fn new(options: impl IntoIterator<Item = ReplyOption>) -> Self {
        let mut entries: Vec<ReplyOption> = Vec::new();
        for option in options {
            let code = normalize_reply(&option.code);
            if code.is_empty() || entries.iter().any(|e| e.code == code) {
                continue;
            }
            entries.push(ReplyOption {
                code,
                label: option.label,
            });
        }
        Self { entries }
    }

    pub fn decode(&self, code: &str) -> Decoded<'_> {
        self.entries
            .iter()
            .find(|e| e.code == code)
            .map_or(Decoded::Unknown, |e| Decoded::Known(&e.label))
    }

    /// Prompt text: the intro line followed by one `CODE) label` line per option.
    pub fn prompt(&self, intro: &str) -> String {
        let mut text = intro.trim_end().to_string();
        for option in &self.entries {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&option.code);
            text.push_str(") ");
            text.push_str(&option.label);
        }
        text
    }
}

impl Default for OptionTable {
    fn default() -> Self {
        Self::new(default_options())
    }
}

pub fn default_options() -> Vec<ReplyOption> {
    vec![
        ReplyOption::new("A", "Great job, keep going!"),
        ReplyOption::new("B", "I'm proud of you"),
        ReplyOption::new("C", "Call me when you're done"),
        ReplyOption::new("D", "Let's talk about it tonight"),
    ]
}

/// Canonical option code for a reply body: the first whitespace-separated
/// token, uppercased. `" c thanks "` becomes `C`.
///
/// No validation happens here; an unrecognized token is kept as-is.
pub fn normalize_reply(body: &str) -> String {
    body.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase()
}
