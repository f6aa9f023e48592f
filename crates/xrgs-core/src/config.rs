use serde::{Deserialize, Serialize};

use xrgs_protocol::xr::{
    EnvironmentBlendMode, Posef, Quatf, ReferenceSpaceType, Vec3f, ViewConfigurationType,
};

use crate::error::CoreError;

/// Top-level configuration, loaded from xrgs.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XrgsConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub xr: XrConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name reported to the graphics and XR runtimes
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_app_version")]
    pub version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Requested Vulkan API version; raised to the XR runtime's minimum when lower
    #[serde(default = "default_api_major")]
    pub api_major: u32,
    #[serde(default = "default_api_minor")]
    pub api_minor: u32,
    /// Enable mesh shading when the device exposes it
    #[serde(default = "default_true")]
    pub mesh_shader: bool,
    /// Enable fragment shader barycentrics when the device exposes it
    #[serde(default = "default_true")]
    pub fragment_shader_barycentric: bool,
    /// Request the debug utils instance extension
    #[serde(default)]
    pub validation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XrConfig {
    /// View configurations in order of preference
    #[serde(default = "default_view_configurations")]
    pub view_configurations: Vec<ViewConfigurationType>,
    /// Environment blend modes in order of preference
    #[serde(default = "default_blend_modes")]
    pub blend_modes: Vec<EnvironmentBlendMode>,
    /// Reference spaces in order of preference
    #[serde(default = "default_reference_spaces")]
    pub reference_spaces: Vec<ReferenceSpaceType>,
    /// Reference space origin orientation as (x, y, z, w)
    #[serde(default = "default_origin_orientation")]
    pub origin_orientation: [f32; 4],
    /// Reference space origin position in meters
    #[serde(default = "default_origin_position")]
    pub origin_position: [f32; 3],
    /// Which list drives swapchain format negotiation
    #[serde(default)]
    pub format_order: FormatOrder,
}

/// Iteration order used when matching runtime swapchain formats against the
/// renderer's allowlist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatOrder {
    /// Walk the allowlist, pick the first entry the runtime offers
    #[default]
    #[serde(rename = "allowlist")]
    Allowlist,
    /// Walk the runtime's list, pick the first entry on the allowlist
    #[serde(rename = "runtime")]
    Runtime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_near_z")]
    pub near_z: f32,
    #[serde(default = "default_far_z")]
    pub far_z: f32,
    /// Number of per-view camera constant slots kept alive at once
    #[serde(default = "default_frames_in_flight")]
    pub frames_in_flight: usize,
    /// Sleep between event polls while the session is not running
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
    /// Request a session exit after this many attempted frames, failed ones
    /// included (None = until the runtime exits)
    pub max_frames: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            api_major: default_api_major(),
            api_minor: default_api_minor(),
            mesh_shader: true,
            fragment_shader_barycentric: true,
            validation: false,
        }
    }
}

impl Default for XrConfig {
    fn default() -> Self {
        Self {
            view_configurations: default_view_configurations(),
            blend_modes: default_blend_modes(),
            reference_spaces: default_reference_spaces(),
            origin_orientation: default_origin_orientation(),
            origin_position: default_origin_position(),
            format_order: FormatOrder::default(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            near_z: default_near_z(),
            far_z: default_far_z(),
            frames_in_flight: default_frames_in_flight(),
            idle_poll_ms: default_idle_poll_ms(),
            max_frames: None,
        }
    }
}

impl XrConfig {
    /// Origin of the reference space the application renders in.
    pub fn origin_pose(&self) -> Posef {
        let [x, y, z, w] = self.origin_orientation;
        let [px, py, pz] = self.origin_position;
        Posef {
            orientation: Quatf { x, y, z, w },
            position: Vec3f { x: px, y: py, z: pz },
        }
    }
}

impl XrgsConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        let config: XrgsConfig =
            toml::from_str(&content).map_err(|e| CoreError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file if it exists, otherwise return defaults.
    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(CoreError::Io(_)) => Self::default(),
            Err(e) => {
                tracing::warn!("ignoring config {}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Reject values the frame loop cannot work with.
    pub fn validate(&self) -> Result<(), CoreError> {
        let render = &self.render;
        if !(render.near_z > 0.0) {
            return Err(CoreError::ConfigError(format!(
                "render.near_z must be positive, got {}",
                render.near_z
            )));
        }
        if !(render.far_z > render.near_z) {
            return Err(CoreError::ConfigError(format!(
                "render.far_z ({}) must exceed render.near_z ({})",
                render.far_z, render.near_z
            )));
        }
        if render.frames_in_flight == 0 {
            return Err(CoreError::ConfigError(
                "render.frames_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, CoreError> {
        toml::to_string_pretty(self).map_err(|e| CoreError::ConfigError(e.to_string()))
    }
}

/// Returns the default config file path based on platform conventions.
/// Search order:
/// 1. System-wide config: `%PROGRAMDATA%\XRGS\xrgs.toml` (Windows) or `/etc/xrgs/xrgs.toml` (Linux/macOS)
/// 2. Local fallback: `./xrgs.toml`
pub fn default_config_path() -> String {
    #[cfg(windows)]
    {
        let programdata = std::env::var("PROGRAMDATA")
            .unwrap_or_else(|_| r"C:\ProgramData".to_string());
        let system_path = format!(r"{}\XRGS\xrgs.toml", programdata);
        if std::path::Path::new(&system_path).exists() {
            return system_path;
        }
    }
    #[cfg(not(windows))]
    {
        let system_path = "/etc/xrgs/xrgs.toml";
        if std::path::Path::new(system_path).exists() {
            return system_path.to_string();
        }
    }
    "xrgs.toml".to_string()
}

fn default_app_name() -> String {
    "xrgs".to_string()
}

fn default_app_version() -> u32 {
    1
}

fn default_api_major() -> u32 {
    1
}

fn default_api_minor() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_view_configurations() -> Vec<ViewConfigurationType> {
    vec![
        ViewConfigurationType::PrimaryStereo,
        ViewConfigurationType::PrimaryMono,
    ]
}

fn default_blend_modes() -> Vec<EnvironmentBlendMode> {
    vec![EnvironmentBlendMode::Opaque, EnvironmentBlendMode::Additive]
}

fn default_reference_spaces() -> Vec<ReferenceSpaceType> {
    vec![ReferenceSpaceType::Local]
}

// Scenes are authored upside down relative to the runtime's local space.
fn default_origin_orientation() -> [f32; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

fn default_origin_position() -> [f32; 3] {
    [0.0, 0.0, -2.0]
}

fn default_near_z() -> f32 {
    0.09
}

fn default_far_z() -> f32 {
    2000.0
}

fn default_frames_in_flight() -> usize {
    2
}

fn default_idle_poll_ms() -> u64 {
    5
}
