//! Game data model: messages, trajectory lines and numbered commentary.

use crate::display::{format_line, Segment};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single line of trajectory notation, stored as opaque display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryLine {
    pub text: String,
}

impl TrajectoryLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Numbered footnotes explaining the concepts of a trajectory.
///
/// Keys are positive integers. Iteration and serialization are in ascending
/// numeric order, so `"10"` follows `"9"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commentary(BTreeMap<u32, String>);

impl Commentary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry; returns `false` (and stores nothing) for key 0.
    pub fn insert(&mut self, number: u32, text: impl Into<String>) -> bool {
        if number == 0 {
            return false;
        }
        self.0.insert(number, text.into());
        true
    }

    pub fn get(&self, number: u32) -> Option<&str> {
        self.0.get(&number).map(String::as_str)
    }

    pub fn contains(&self, number: u32) -> bool {
        self.0.contains_key(&number)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in ascending numeric order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// `<n>. <text>` lines in numeric order.
    pub fn to_text(&self) -> String {
        self.iter()
            .map(|(n, text)| format!("{n}. {text}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<S: Into<String>> FromIterator<(u32, S)> for Commentary {
    fn from_iter<I: IntoIterator<Item = (u32, S)>>(iter: I) -> Self {
        let mut commentary = Commentary::new();
        for (n, text) in iter {
            commentary.insert(n, text);
        }
        commentary
    }
}

impl Serialize for Commentary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (n, text) in &self.0 {
            map.serialize_entry(&n.to_string(), text)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Commentary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CommentaryVisitor;

        impl<'de> Visitor<'de> for CommentaryVisitor {
            type Value = Commentary;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from positive integer keys to commentary text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Commentary, A::Error> {
                let mut commentary = Commentary::new();
                while let Some((key, text)) = access.next_entry::<String, String>()? {
                    let number = parse_reference_number(&key).ok_or_else(|| {
                        de::Error::custom(format!(
                            "commentary key {key:?} is not a positive integer"
                        ))
                    })?;
                    commentary.0.insert(number, text);
                }
                Ok(commentary)
            }
        }

        deserializer.deserialize_map(CommentaryVisitor)
    }
}

/// Parse a commentary key. Surrounding whitespace is tolerated; zero,
/// signs and non-digits are not.
pub fn parse_reference_number(key: &str) -> Option<u32> {
    let key = key.trim();
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u32>().ok().filter(|n| *n > 0)
}

/// The authoritative "game so far": trajectory lines plus commentary.
///
/// Each AI turn replaces this wholesale; nothing diffs or merges it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryState {
    pub trajectory: Vec<TrajectoryLine>,
    pub commentary: Commentary,
}

impl TrajectoryState {
    pub fn new(trajectory: Vec<TrajectoryLine>, commentary: Commentary) -> Self {
        Self {
            trajectory,
            commentary,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trajectory.is_empty() && self.commentary.is_empty()
    }

    /// Reference numbers attached to concepts in the trajectory text.
    pub fn reference_numbers(&self) -> BTreeSet<u32> {
        self.trajectory
            .iter()
            .flat_map(|line| format_line(&line.text))
            .filter_map(|segment| match segment {
                Segment::Concept {
                    number: Some(n), ..
                } => parse_reference_number(&n),
                _ => None,
            })
            .collect()
    }

    /// Referenced numbers that have no commentary entry.
    ///
    /// The model is asked to keep these in sync but nothing enforces it.
    pub fn missing_commentary(&self) -> Vec<u32> {
        self.reference_numbers()
            .into_iter()
            .filter(|n| !self.commentary.contains(*n))
            .collect()
    }

    /// Trajectory lines joined with newlines.
    pub fn trajectory_text(&self) -> String {
        self.trajectory
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Commentary as `<n>. <text>` lines in numeric order.
    pub fn commentary_text(&self) -> String {
        self.commentary.to_text()
    }

    /// Trajectory, a blank line, then commentary.
    pub fn export_text(&self) -> String {
        format!("{}\n\n{}", self.trajectory_text(), self.commentary_text())
    }
}

/// A fully interpreted AI turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiResponse {
    pub conversational_response: String,
    pub trajectory_state: TrajectoryState,
}
