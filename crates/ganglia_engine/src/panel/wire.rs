use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of one wire color, an index into the console's [`WireCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireColor(pub u8);

impl WireColor {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for WireColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wire{}", self.0)
    }
}

/// Colors of the built-in six-wire console, in identifier order.
pub mod colors {
    use super::WireColor;

    pub const RED: WireColor = WireColor(0);
    pub const ORANGE: WireColor = WireColor(1);
    pub const YELLOW: WireColor = WireColor(2);
    pub const GREEN: WireColor = WireColor(3);
    pub const BLUE: WireColor = WireColor(4);
    pub const PURPLE: WireColor = WireColor(5);
}

pub const STANDARD_WIRE_NAMES: [&str; 6] = ["red", "orange", "yellow", "green", "blue", "purple"];

const MAX_WIRE_COLORS: usize = u8::MAX as usize + 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireCatalogError {
    #[error("wire catalog must define at least one color")]
    Empty,
    #[error("wire catalog defines {count} colors (at most {MAX_WIRE_COLORS} are supported)")]
    TooMany { count: usize },
    #[error("wire color {index} has an empty name")]
    EmptyName { index: usize },
    #[error("duplicate wire color name: {name}")]
    DuplicateName { name: String },
}

/// The fixed set of wire colors available to a console. Color `i` is
/// `WireColor(i)`; names are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireCatalog {
    names: Vec<String>,
}

impl WireCatalog {
    pub fn new<I, S>(names: I) -> Result<Self, WireCatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names
            .into_iter()
            .map(|name| name.into().trim().to_string())
            .collect::<Vec<_>>();
        if names.is_empty() {
            return Err(WireCatalogError::Empty);
        }
        if names.len() > MAX_WIRE_COLORS {
            return Err(WireCatalogError::TooMany { count: names.len() });
        }

        let mut seen = HashSet::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(WireCatalogError::EmptyName { index });
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(WireCatalogError::DuplicateName { name: name.clone() });
            }
        }

        Ok(Self { names })
    }

    pub fn standard() -> Self {
        Self {
            names: STANDARD_WIRE_NAMES.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, color: WireColor) -> bool {
        color.index() < self.names.len()
    }

    pub fn name(&self, color: WireColor) -> Option<&str> {
        self.names.get(color.index()).map(String::as_str)
    }

    pub fn color_by_name(&self, name: &str) -> Option<WireColor> {
        let name = name.trim();
        self.names
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(name))
            .map(|index| WireColor(index as u8))
    }

    pub fn colors(&self) -> impl Iterator<Item = WireColor> + '_ {
        (0..self.names.len()).map(|index| WireColor(index as u8))
    }

    /// Color a port takes when the player cycles it: an empty port gets the
    /// first color, the last color cycles back to empty (`None`).
    pub fn next_after(&self, current: Option<WireColor>) -> Option<WireColor> {
        match current {
            None => self.colors().next(),
            Some(color) if color.index() + 1 < self.names.len() => Some(WireColor(color.0 + 1)),
            Some(_) => None,
        }
    }

    /// Display label for a color, falling back to the raw identifier for
    /// colors outside this catalog.
    pub fn label(&self, color: WireColor) -> String {
        self.name(color)
            .map(ToString::to_string)
            .unwrap_or_else(|| color.to_string())
    }
}

impl Default for WireCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
