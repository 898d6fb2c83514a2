//! Unit tests for configuration module
//!
//! Color parsing, file loading, validation and command-line overrides.

use super::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_configuration_is_valid() {
    let config = MenuConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.font, "monospace 10");
    assert_eq!(config.exclusive_zone, -1);
    assert!(config.anchor.is_empty());
    assert_eq!(config.colors.normal_bg, Color(0x000000ff));
    assert_eq!(config.colors.select_bg, Color(0x7f7f7fff));
}

#[test]
fn test_parse_six_digit_color_is_opaque() {
    assert_eq!(parse_color("#ff0000"), Some(Color(0xff0000ff)));
    assert_eq!(parse_color("ff0000"), Some(Color(0xff0000ff)));
}

#[test]
fn test_parse_eight_digit_color_keeps_alpha() {
    assert_eq!(parse_color("00ff00ff"), Some(Color(0x00ff00ff)));
    assert_eq!(parse_color("#12345678"), Some(Color(0x12345678)));
}

#[test]
fn test_parse_rejects_malformed_colors() {
    for input in ["zzz", "", "#", "#fff", "fffffff", "+fffff", "0xffffff", "ff ff ff", "ggggggff"] {
        assert_eq!(parse_color(input), None, "{input:?} should be rejected");
    }
}

#[test]
fn test_invalid_override_keeps_previous_value() {
    let mut colors = ColorScheme::default();
    let before = colors.normal_bg;

    assert!(!colors.apply_override(ColorRole::NormalBackground, "zzz"));
    assert_eq!(colors.normal_bg, before);

    assert!(colors.apply_override(ColorRole::NormalBackground, "#102030"));
    assert_eq!(colors.normal_bg, Color(0x102030ff));
    assert_eq!(colors.normal_fg, ColorScheme::default().normal_fg);
}

#[test]
fn test_color_display_round_trips_through_parser() {
    let color = Color(0xdeadbeef);
    assert_eq!(color.to_string(), "#deadbeef");
    assert_eq!(parse_color(&color.to_string()), Some(color));
}

#[test]
fn test_configuration_from_file() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("config.toml");

    fs::write(
        &file_path,
        r##"
font = "Iosevka 14"
anchor = ["top", "left"]
exclusive_zone = 0

[colors]
normal_bg = "#222222"
select_fg = "ff00ff80"
"##,
    )?;

    let config = MenuConfig::load(&file_path)?;
    assert_eq!(config.font, "Iosevka 14");
    assert_eq!(config.anchor, vec![AnchorEdge::Top, AnchorEdge::Left]);
    assert_eq!(config.exclusive_zone, 0);
    assert_eq!(config.colors.normal_bg, Color(0x222222ff));
    assert_eq!(config.colors.select_fg, Color(0xff00ff80));
    // Unset values fall back to defaults
    assert_eq!(config.colors.normal_fg, ColorScheme::default().normal_fg);
    assert_eq!(config.namespace, "ring");

    Ok(())
}

#[test]
fn test_configuration_with_bad_color_fails_to_load() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("config.toml");
    fs::write(&file_path, "[colors]\nnormal_bg = \"zzz\"\n")?;

    assert!(MenuConfig::load(&file_path).is_err());
    Ok(())
}

#[test]
fn test_opposite_anchors_are_rejected() {
    let config = MenuConfig {
        anchor: vec![AnchorEdge::Top, AnchorEdge::Bottom],
        ..MenuConfig::default()
    };
    assert!(config.validate().is_err());

    let config = MenuConfig {
        anchor: vec![AnchorEdge::Left, AnchorEdge::Right],
        ..MenuConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_empty_namespace_is_rejected() {
    let config = MenuConfig {
        namespace: "  ".to_string(),
        ..MenuConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(MenuConfig::load("/nonexistent/ring/config.toml").is_err());
}

#[test]
fn test_configuration_serialization_roundtrip() -> Result<()> {
    let original = MenuConfig {
        anchor: vec![AnchorEdge::Bottom],
        ..MenuConfig::default()
    };

    let toml_string = toml::to_string(&original)?;
    let deserialized: MenuConfig = toml::from_str(&toml_string)?;

    assert_eq!(original, deserialized);
    Ok(())
}
