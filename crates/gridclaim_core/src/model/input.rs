//! Validated identities and the synchronous input-rejection taxonomy.
//!
//! # Invariants
//! - Identity values are trimmed and non-empty.
//! - Rejection happens before any state is touched.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ACTOR_ID_MAX_CHARS: usize = 256;
const GROUP_ID_MAX_CHARS: usize = 64;

/// Reasons a request is rejected before it reaches the arbiter.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidInput {
    /// Coordinate is NaN, infinite, or outside the addressable grid.
    Coordinate { x: f64, y: f64 },
    /// Footprint side length is zero or above the configured maximum.
    FootprintSize { side: u8, max: u8 },
    /// Color is not a `#rrggbb` hex string.
    Color(String),
    /// Palette strategy was given no colors.
    EmptyPalette,
    /// Actor id is empty or too long.
    ActorId(String),
    /// Group id is empty, too long, or contains control characters.
    GroupId(String),
    /// Timestamp cannot be mapped to a calendar period.
    Timestamp(i64),
}

impl Display for InvalidInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coordinate { x, y } => write!(f, "invalid coordinate ({x}, {y})"),
            Self::FootprintSize { side, max } => {
                write!(f, "footprint size {side} out of range 1..={max}")
            }
            Self::Color(value) => write!(f, "invalid color `{value}`; expected #rrggbb"),
            Self::EmptyPalette => write!(f, "palette must contain at least one color"),
            Self::ActorId(value) => write!(f, "invalid actor id `{value}`"),
            Self::GroupId(value) => write!(f, "invalid group id `{value}`"),
            Self::Timestamp(value) => write!(f, "timestamp {value} is out of range"),
        }
    }
}

impl Error for InvalidInput {}

/// Opaque actor identity. Derived outside the core from session data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActorId(String);

impl ActorId {
    pub fn parse(value: &str) -> Result<Self, InvalidInput> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().count() > ACTOR_ID_MAX_CHARS {
            return Err(InvalidInput::ActorId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Group credited with a placement (a country or team code).
///
/// Group codes are case-insensitive and stored uppercase, so `jp` and `JP`
/// share one score bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId(String);

impl GroupId {
    pub fn parse(value: &str) -> Result<Self, InvalidInput> {
        let trimmed = value.trim();
        if trimmed.is_empty()
            || trimmed.chars().count() > GROUP_ID_MAX_CHARS
            || trimmed.chars().any(char::is_control)
        {
            return Err(InvalidInput::GroupId(value.to_string()));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! string_conversions {
    ($name:ident) => {
        impl TryFrom<String> for $name {
            type Error = InvalidInput;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

string_conversions!(ActorId);
string_conversions!(GroupId);

#[cfg(test)]
mod tests {
    use super::{ActorId, GroupId, InvalidInput};

    #[test]
    fn actor_id_is_trimmed_and_rejects_blank() {
        assert_eq!(ActorId::parse("  10.0.0.1|curl ").unwrap().as_str(), "10.0.0.1|curl");
        assert_eq!(
            ActorId::parse("   ").unwrap_err(),
            InvalidInput::ActorId("   ".to_string())
        );
    }

    #[test]
    fn group_id_is_case_insensitive() {
        assert_eq!(GroupId::parse("jp").unwrap(), GroupId::parse(" JP").unwrap());
        assert!(GroupId::parse("a\tb").is_err());
        assert!(GroupId::parse(&"x".repeat(65)).is_err());
    }
}
