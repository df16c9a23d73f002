//! Structural review of each argument as it is recorded.
//!
//! Findings are advisory: they are logged and kept in the transcript but never
//! change the course of the debate.

use crate::session::{Role, Turn};
use crate::topic::Topic;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

const MIN_ARGUMENT_CHARS: usize = 20;
const MAX_ARGUMENT_CHARS: usize = 1000;

const AFFIRMATIVE: &[&str] = &["should", "must", "essential", "necessary", "important"];
const NEGATIVE: &[&str] = &[
    "should not",
    "must not",
    "shouldn't",
    "mustn't",
    "unnecessary",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum CoherenceIssue {
    TooShort { chars: usize },
    TooLong { chars: usize },
    /// The argument shares no word with the topic.
    OffTopic,
    /// The speaker argued for something earlier and now argues against.
    PossibleContradiction,
}

impl fmt::Display for CoherenceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { chars } => {
                write!(f, "argument too short ({chars} < {MIN_ARGUMENT_CHARS} characters)")
            }
            Self::TooLong { chars } => {
                write!(f, "argument too long ({chars} > {MAX_ARGUMENT_CHARS} characters)")
            }
            Self::OffTopic => write!(f, "argument does not reference the debate topic"),
            Self::PossibleContradiction => write!(f, "possible contradiction with an earlier argument"),
        }
    }
}

/// A recorded finding about one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoherenceNote {
    pub round: u32,
    pub role: Role,
    #[serde(flatten)]
    pub issue: CoherenceIssue,
}

/// Reviews `turn` against the topic and everything said before it.
///
/// Returns the first issue found; length problems take precedence over topic
/// relevance, which takes precedence over contradiction.
pub fn review_turn(topic: &Topic, turn: &Turn, earlier: &[Turn]) -> Option<CoherenceIssue> {
    let chars = turn.text.chars().count();
    if chars < MIN_ARGUMENT_CHARS {
        return Some(CoherenceIssue::TooShort { chars });
    }
    if chars > MAX_ARGUMENT_CHARS {
        return Some(CoherenceIssue::TooLong { chars });
    }

    let text = turn.text.to_lowercase();
    let topic_words: HashSet<String> = topic.words().collect();
    if !text.split_whitespace().any(|w| topic_words.contains(w)) {
        return Some(CoherenceIssue::OffTopic);
    }

    let said_before = earlier
        .iter()
        .filter(|t| t.role == turn.role)
        .map(|t| t.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    let affirmed = AFFIRMATIVE.iter().any(|w| said_before.contains(w));
    let negated = NEGATIVE.iter().any(|w| text.contains(w));
    if affirmed && negated {
        return Some(CoherenceIssue::PossibleContradiction);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic() -> Topic {
        Topic::validate("Should AI be regulated like medicine?").unwrap()
    }

    #[test]
    fn test_length_bounds() {
        let short = Turn::new(1, Role::A, "Scientist", "AI is risky.");
        assert_eq!(
            review_turn(&topic(), &short, &[]),
            Some(CoherenceIssue::TooShort { chars: 12 })
        );

        let long = Turn::new(1, Role::A, "Scientist", "ai ".repeat(400));
        assert_eq!(
            review_turn(&topic(), &long, &[]),
            Some(CoherenceIssue::TooLong { chars: 1200 })
        );
    }

    #[test]
    fn test_off_topic() {
        let turn = Turn::new(1, Role::A, "Scientist", "Bananas grow best in tropical climates.");
        assert_eq!(review_turn(&topic(), &turn, &[]), Some(CoherenceIssue::OffTopic));
    }

    #[test]
    fn test_on_topic_passes() {
        let turn = Turn::new(1, Role::A, "Scientist", "AI systems affect health the way medicine does.");
        assert_eq!(review_turn(&topic(), &turn, &[]), None);
    }

    #[test]
    fn test_contradiction_only_counts_own_turns() {
        let earlier = vec![
            Turn::new(1, Role::A, "Scientist", "Oversight of ai is essential for safety."),
            Turn::new(1, Role::B, "Philosopher", "Oversight of ai must respect autonomy."),
        ];
        let flip = Turn::new(2, Role::A, "Scientist", "On reflection ai oversight is unnecessary here.");
        assert_eq!(
            review_turn(&topic(), &flip, &earlier),
            Some(CoherenceIssue::PossibleContradiction)
        );

        let b_turn = Turn::new(2, Role::B, "Philosopher", "Licensing ai is unnecessary bureaucracy.");
        assert_eq!(review_turn(&topic(), &b_turn, &earlier[..1]), None);
    }

    #[test]
    fn test_note_serializes_flat() {
        let note = CoherenceNote {
            round: 4,
            role: Role::B,
            issue: CoherenceIssue::OffTopic,
        };
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["issue"], "off_topic");
        assert_eq!(json["round"], 4);
    }
}
