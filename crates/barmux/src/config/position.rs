use std::str::FromStr;

use serde::Deserialize;

/// Where a probe's segments are placed relative to the upstream status line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawPosition")]
pub enum Position {
    /// Fixed index in the emitted frame, 0 being the leftmost segment.
    Index(usize),
    /// Directly before the first segment with this name.
    Before(String),
    /// Directly after the last segment with this name.
    After(String),
    #[default]
    End,
}

impl Position {
    pub fn is_anchored(&self) -> bool {
        matches!(self, Position::Before(_) | Position::After(_))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Index(index) => write!(f, "{}", index),
            Position::Before(name) => write!(f, "before:{}", name),
            Position::After(name) => write!(f, "after:{}", name),
            Position::End => write!(f, "end"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid position `{0}`, expected an index, `end`, `before:<name>` or `after:<name>`")]
pub struct PositionParseError(String);

impl FromStr for Position {
    type Err = PositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(index) = s.parse::<usize>() {
            return Ok(Position::Index(index));
        }
        match s.split_once(':') {
            Some(("before", name)) if !name.is_empty() => Ok(Position::Before(name.to_string())),
            Some(("after", name)) if !name.is_empty() => Ok(Position::After(name.to_string())),
            None if s == "end" => Ok(Position::End),
            _ => Err(PositionParseError(s.to_string())),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPosition {
    Index(usize),
    Text(String),
}

impl TryFrom<RawPosition> for Position {
    type Error = PositionParseError;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        match raw {
            RawPosition::Index(index) => Ok(Position::Index(index)),
            RawPosition::Text(text) => text.parse(),
        }
    }
}
