//! Cell colors and per-request color selection strategies.
//!
//! # Invariants
//! - `Color` is always a lowercase `#rrggbb` string.
//! - A strategy resolves to exactly one color per placement; every cell in
//!   the footprint receives that color.

use crate::grid::Coordinate;
use crate::model::input::{GroupId, InvalidInput};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid hex color regex"));

/// Validated `#rrggbb` color.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    pub fn parse(value: &str) -> Result<Self, InvalidInput> {
        let trimmed = value.trim();
        if !HEX_COLOR_RE.is_match(trimmed) {
            return Err(InvalidInput::Color(value.to_string()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Converts HSL (hue in degrees, saturation/lightness in `0..=1`).
    pub fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
        let hue = hue.rem_euclid(360.0);
        let saturation = saturation.clamp(0.0, 1.0);
        let lightness = lightness.clamp(0.0, 1.0);

        let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let sector = hue / 60.0;
        let x = chroma * (1.0 - (sector.rem_euclid(2.0) - 1.0).abs());
        let (r, g, b) = match sector as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let m = lightness - chroma / 2.0;
        let channel = |value: f64| ((value + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self(format!(
            "#{:02x}{:02x}{:02x}",
            channel(r),
            channel(g),
            channel(b)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Color {
    type Error = InvalidInput;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.0
    }
}

/// How the color of one placement is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ColorStrategy {
    /// One fixed color.
    Solid { color: String },
    /// Rotating palette; the client advances `cursor` between placements.
    Palette { colors: Vec<String>, cursor: u32 },
    /// Hue derived from the anchor position.
    PositionHue,
    /// Stable hue derived from the group code.
    GroupDefault,
}

impl ColorStrategy {
    pub fn solid(color: impl Into<String>) -> Self {
        Self::Solid {
            color: color.into(),
        }
    }

    /// Resolves the strategy once for a placement at `anchor` by `group`.
    pub fn resolve(&self, anchor: Coordinate, group: &GroupId) -> Result<Color, InvalidInput> {
        match self {
            Self::Solid { color } => Color::parse(color),
            Self::Palette { colors, cursor } => {
                if colors.is_empty() {
                    return Err(InvalidInput::EmptyPalette);
                }
                let index = *cursor as usize % colors.len();
                Color::parse(&colors[index])
            }
            Self::PositionHue => {
                let hue = anchor.y * 137.5 + anchor.x * 97.3;
                Ok(Color::from_hsl(hue, 0.80, 0.55))
            }
            Self::GroupDefault => {
                let code_sum: u32 = group.as_str().chars().map(u32::from).sum();
                Ok(Color::from_hsl(f64::from(code_sum) * 137.5, 0.70, 0.55))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Color, ColorStrategy};
    use crate::grid::Coordinate;
    use crate::model::input::{GroupId, InvalidInput};

    #[test]
    fn parse_accepts_hex_and_lowercases() {
        assert_eq!(Color::parse("#FF4B4B").unwrap().as_str(), "#ff4b4b");
        assert!(Color::parse("ff4b4b").is_err());
        assert!(Color::parse("#ff4b4").is_err());
        assert!(Color::parse("red").is_err());
    }

    #[test]
    fn from_hsl_matches_reference_points() {
        assert_eq!(Color::from_hsl(0.0, 1.0, 0.5).as_str(), "#ff0000");
        assert_eq!(Color::from_hsl(120.0, 1.0, 0.5).as_str(), "#00ff00");
        assert_eq!(Color::from_hsl(240.0, 1.0, 0.5).as_str(), "#0000ff");
        assert_eq!(Color::from_hsl(-120.0, 1.0, 0.5).as_str(), "#0000ff");
        assert_eq!(Color::from_hsl(42.0, 0.0, 1.0).as_str(), "#ffffff");
    }

    #[test]
    fn palette_wraps_cursor_and_rejects_empty() {
        let group = GroupId::parse("JP").unwrap();
        let anchor = Coordinate::new(0.0, 0.0);
        let palette = ColorStrategy::Palette {
            colors: vec!["#ff4b4b".into(), "#ffd166".into()],
            cursor: 3,
        };
        assert_eq!(palette.resolve(anchor, &group).unwrap().as_str(), "#ffd166");

        let empty = ColorStrategy::Palette {
            colors: Vec::new(),
            cursor: 0,
        };
        assert_eq!(
            empty.resolve(anchor, &group).unwrap_err(),
            InvalidInput::EmptyPalette
        );
    }

    #[test]
    fn derived_strategies_are_deterministic() {
        let group = GroupId::parse("JP").unwrap();
        let anchor = Coordinate::new(139.65, 35.67);
        let first = ColorStrategy::PositionHue.resolve(anchor, &group).unwrap();
        let second = ColorStrategy::PositionHue.resolve(anchor, &group).unwrap();
        assert_eq!(first, second);

        let by_group = ColorStrategy::GroupDefault.resolve(anchor, &group).unwrap();
        let lower = GroupId::parse("jp").unwrap();
        assert_eq!(
            by_group,
            ColorStrategy::GroupDefault.resolve(anchor, &lower).unwrap()
        );
    }

    #[test]
    fn strategy_deserializes_from_tagged_json() {
        let parsed: ColorStrategy =
            serde_json::from_str(r##"{"mode":"solid","color":"#06d6a0"}"##).unwrap();
        assert_eq!(parsed, ColorStrategy::solid("#06d6a0"));
        let parsed: ColorStrategy = serde_json::from_str(r#"{"mode":"position_hue"}"#).unwrap();
        assert_eq!(parsed, ColorStrategy::PositionHue);
    }
}
