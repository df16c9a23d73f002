use crate::error::DebateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shortest accepted topic, in characters, after trimming.
pub const MIN_TOPIC_CHARS: usize = 10;
/// Longest accepted topic, in characters, after trimming.
pub const MAX_TOPIC_CHARS: usize = 500;

/// A validated debate topic.
///
/// The only way to obtain a `Topic` is through [`Topic::validate`], which also
/// runs when a transcript is deserialized, so a `Topic` always satisfies the
/// length bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Trims surrounding whitespace and checks the length bounds.
    ///
    /// Length is measured in characters rather than bytes. No other
    /// normalization is applied.
    pub fn validate(raw: &str) -> Result<Self, DebateError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DebateError::invalid_topic("topic cannot be empty"));
        }

        let chars = trimmed.chars().count();
        if chars < MIN_TOPIC_CHARS {
            return Err(DebateError::invalid_topic(format!(
                "topic too short ({chars} characters, minimum {MIN_TOPIC_CHARS})"
            )));
        }
        if chars > MAX_TOPIC_CHARS {
            return Err(DebateError::invalid_topic(format!(
                "topic too long ({chars} characters, maximum {MAX_TOPIC_CHARS})"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased whitespace-separated words, used for overlap heuristics.
    pub fn words(&self) -> impl Iterator<Item = String> + '_ {
        self.0.split_whitespace().map(str::to_lowercase)
    }
}

impl TryFrom<String> for Topic {
    type Error = DebateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::validate(&value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strips control characters and collapses runs of whitespace.
///
/// This is an opt-in cleanup for interactive input. [`Topic::validate`] never
/// calls it.
pub fn sanitize_topic(raw: &str) -> String {
    let without_controls: String = raw
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();
    without_controls
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
