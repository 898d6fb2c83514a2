//! Configuration management for the menu
//!
//! The core only ever sees a resolved [`MenuConfig`]. Values come from the
//! built-in defaults, optionally overlaid by a TOML file, and finally by the
//! command-line flags handled in the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(test)]
mod tests;

/// Default location of the optional configuration file
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/ring/config.toml";

/// A color in `0xRRGGBBAA` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub u32);

impl Color {
    pub const fn rgba(self) -> (u8, u8, u8, u8) {
        (
            (self.0 >> 24) as u8,
            (self.0 >> 16) as u8,
            (self.0 >> 8) as u8,
            self.0 as u8,
        )
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08x}", self.0)
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        parse_color(&value).ok_or_else(|| format!("invalid color: {value}"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Parse `RRGGBB` or `RRGGBBAA`, with an optional leading `#`.
///
/// The six digit form is fully opaque.
pub fn parse_color(input: &str) -> Option<Color> {
    let digits = input.strip_prefix('#').unwrap_or(input);
    if !matches!(digits.len(), 6 | 8) || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let parsed = u32::from_str_radix(digits, 16).ok()?;
    Some(Color(if digits.len() == 6 {
        (parsed << 8) | 0xff
    } else {
        parsed
    }))
}

/// The four colors used by the painter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorScheme {
    pub normal_bg: Color,
    pub normal_fg: Color,
    pub select_bg: Color,
    pub select_fg: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            normal_bg: Color(0x000000ff),
            normal_fg: Color(0xffffffff),
            select_bg: Color(0x7f7f7fff),
            select_fg: Color(0xffffffff),
        }
    }
}

/// Which color a command-line override targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRole {
    NormalBackground,
    NormalForeground,
    SelectBackground,
    SelectForeground,
}

impl fmt::Display for ColorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColorRole::NormalBackground => "normal background",
            ColorRole::NormalForeground => "normal foreground",
            ColorRole::SelectBackground => "select background",
            ColorRole::SelectForeground => "select foreground",
        })
    }
}

impl ColorScheme {
    fn slot_mut(&mut self, role: ColorRole) -> &mut Color {
        match role {
            ColorRole::NormalBackground => &mut self.normal_bg,
            ColorRole::NormalForeground => &mut self.normal_fg,
            ColorRole::SelectBackground => &mut self.select_bg,
            ColorRole::SelectForeground => &mut self.select_fg,
        }
    }

    /// Replace one color from user input, keeping the old value when the
    /// input does not parse. Returns whether the value was applied.
    pub fn apply_override(&mut self, role: ColorRole, input: &str) -> bool {
        match parse_color(input) {
            Some(color) => {
                *self.slot_mut(role) = color;
                true
            }
            None => false,
        }
    }
}

/// Screen edge the overlay is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnchorEdge {
    Top,
    Bottom,
    Left,
    Right,
}

/// Resolved menu configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    /// Font descriptor, e.g. "monospace 10"
    pub font: String,

    /// Edges to anchor to; empty means centered by the compositor
    pub anchor: Vec<AnchorEdge>,

    /// -1 asks the compositor not to move the overlay for other exclusive zones
    pub exclusive_zone: i32,

    /// Layer-shell namespace reported to the compositor
    pub namespace: String,

    pub colors: ColorScheme,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            font: "monospace 10".to_string(),
            anchor: Vec::new(),
            exclusive_zone: -1,
            namespace: "ring".to_string(),
            colors: ColorScheme::default(),
        }
    }
}

impl MenuConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = expand_home(path.as_ref())?;

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: MenuConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load the file at the default location if one exists
    pub fn load_default() -> Result<Option<Self>> {
        let path = expand_home(Path::new(DEFAULT_CONFIG_PATH))?;
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            anyhow::bail!("Invalid namespace: must not be empty");
        }

        let has = |edge| self.anchor.contains(&edge);
        if has(AnchorEdge::Top) && has(AnchorEdge::Bottom) {
            anyhow::bail!("Invalid anchor: top and bottom would stretch the menu vertically");
        }
        if has(AnchorEdge::Left) && has(AnchorEdge::Right) {
            anyhow::bail!("Invalid anchor: left and right would stretch the menu horizontally");
        }

        Ok(())
    }
}

fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            Ok(Path::new(&home).join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}
