//! Integration test: XrgsConfig
//!
//! Verifies defaults, partial TOML parsing and validation.

use xrgs_core::config::{FormatOrder, XrgsConfig};
use xrgs_protocol::xr::{EnvironmentBlendMode, ReferenceSpaceType, ViewConfigurationType};

#[test]
fn test_defaults() {
    let config = XrgsConfig::default();

    assert_eq!(
        config.xr.view_configurations,
        vec![ViewConfigurationType::PrimaryStereo, ViewConfigurationType::PrimaryMono]
    );
    assert_eq!(
        config.xr.blend_modes,
        vec![EnvironmentBlendMode::Opaque, EnvironmentBlendMode::Additive]
    );
    assert_eq!(config.xr.reference_spaces, vec![ReferenceSpaceType::Local]);
    assert_eq!(config.xr.format_order, FormatOrder::Allowlist);
    assert!((config.render.near_z - 0.09).abs() < f32::EPSILON);
    assert!((config.render.far_z - 2000.0).abs() < f32::EPSILON);
    assert!(config.validate().is_ok());

    let pose = config.xr.origin_pose();
    assert_eq!(pose.orientation.x, 1.0);
    assert_eq!(pose.orientation.w, 0.0);
    assert_eq!(pose.position.z, -2.0);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let text = r#"
        [xr]
        blend_modes = ["additive"]
        format_order = "runtime"

        [render]
        far_z = 500.0
        max_frames = 10
    "#;
    let config: XrgsConfig = toml::from_str(text).expect("parse");

    assert_eq!(config.xr.blend_modes, vec![EnvironmentBlendMode::Additive]);
    assert_eq!(config.xr.format_order, FormatOrder::Runtime);
    assert_eq!(config.xr.reference_spaces, vec![ReferenceSpaceType::Local]);
    assert_eq!(config.render.far_z, 500.0);
    assert_eq!(config.render.max_frames, Some(10));
    assert_eq!(config.render.frames_in_flight, 2);
    assert_eq!(config.app.name, "xrgs");
}

#[test]
fn test_validate_rejects_bad_clip_planes() {
    let mut config = XrgsConfig::default();
    config.render.far_z = 0.01;
    assert!(config.validate().is_err());

    let mut config = XrgsConfig::default();
    config.render.near_z = 0.0;
    assert!(config.validate().is_err());

    let mut config = XrgsConfig::default();
    config.render.frames_in_flight = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_serialized_config_parses_back() {
    let config = XrgsConfig::default();
    let text = config.to_toml_string().expect("serialize");
    let parsed: XrgsConfig = toml::from_str(&text).expect("parse");
    assert_eq!(parsed.xr.view_configurations, config.xr.view_configurations);
    assert_eq!(parsed.render.idle_poll_ms, config.render.idle_poll_ms);
}

#[test]
fn test_load_or_default_missing_file() {
    let config = XrgsConfig::load_or_default("/nonexistent/xrgs.toml");
    assert_eq!(config.app.name, "xrgs");
}
