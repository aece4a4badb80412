use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of one game.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a submitting device / replica. Authorities are identified the same way.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type AuthorityId = ClientId;

/// Piece identifier within a piece set, e.g. `mono-1` or `pentomino-x5`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PieceId(pub String);

impl PieceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PieceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Players are identified by their piece colour (max 4 players).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlayerId {
    Blue,
    Yellow,
    Red,
    Green,
}

impl PlayerId {
    pub const ALL: [PlayerId; 4] = [
        PlayerId::Blue,
        PlayerId::Yellow,
        PlayerId::Red,
        PlayerId::Green,
    ];

    /// Stable one-byte code used in canonical encodings.
    pub const fn code(self) -> u8 {
        match self {
            PlayerId::Blue => 1,
            PlayerId::Yellow => 2,
            PlayerId::Red => 3,
            PlayerId::Green => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlayerId::Blue => "Blue",
            PlayerId::Yellow => "Yellow",
            PlayerId::Red => "Red",
            PlayerId::Green => "Green",
        }
    }

    pub fn parse(s: &str) -> Option<PlayerId> {
        PlayerId::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Board coordinate; `x` is the column, `y` the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_codes_are_unique_and_nonzero() {
        let mut codes: Vec<u8> = PlayerId::ALL.iter().map(|p| p.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 4);
        assert!(!codes.contains(&0));
    }

    #[test]
    fn player_parse_is_case_insensitive() {
        assert_eq!(PlayerId::parse("yellow"), Some(PlayerId::Yellow));
        assert_eq!(PlayerId::parse("GREEN"), Some(PlayerId::Green));
        assert_eq!(PlayerId::parse("purple"), None);
    }
}
