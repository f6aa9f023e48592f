use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an XR session, as reported by the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Unknown,
    Idle,
    Ready,
    Synchronized,
    Visible,
    Focused,
    Stopping,
    LossPending,
    Exiting,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Unknown => "unknown",
            SessionState::Idle => "idle",
            SessionState::Ready => "ready",
            SessionState::Synchronized => "synchronized",
            SessionState::Visible => "visible",
            SessionState::Focused => "focused",
            SessionState::Stopping => "stopping",
            SessionState::LossPending => "loss_pending",
            SessionState::Exiting => "exiting",
        }
    }

    /// States in which the compositor accepts rendered frames.
    pub fn is_render_capable(&self) -> bool {
        matches!(
            self,
            SessionState::Synchronized | SessionState::Visible | SessionState::Focused
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewConfigurationType {
    PrimaryMono,
    PrimaryStereo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentBlendMode {
    Opaque,
    Additive,
    AlphaBlend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSpaceType {
    View,
    Local,
    Stage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quatf {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quatf {
    pub const IDENTITY: Quatf = Quatf { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3f {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posef {
    pub orientation: Quatf,
    pub position: Vec3f,
}

impl Posef {
    pub const IDENTITY: Posef = Posef {
        orientation: Quatf::IDENTITY,
        position: Vec3f { x: 0.0, y: 0.0, z: 0.0 },
    };
}

impl Default for Posef {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Field of view as four half-angles in radians. Left and down are negative
/// for a typical forward-facing view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fovf {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

/// One located view: where the eye is and what it sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub pose: Posef,
    pub fov: Fovf,
}

/// Per-view recommendations for a view configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfigurationView {
    pub recommended_image_rect_width: u32,
    pub max_image_rect_width: u32,
    pub recommended_image_rect_height: u32,
    pub max_image_rect_height: u32,
    pub recommended_swapchain_sample_count: u32,
    pub max_swapchain_sample_count: u32,
}

/// Runtime time value in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time(pub i64);

impl Time {
    pub fn as_nanos(&self) -> i64 {
        self.0
    }
}

/// Result of waiting for the next frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameState {
    pub predicted_display_time: Time,
    pub predicted_display_period_ns: i64,
    pub should_render: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwapchainId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceId(pub u64);

/// Timeout value meaning "wait as long as it takes".
pub const INFINITE_DURATION: i64 = i64::MAX;

/// Events the runtime delivers through its event queue.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    SessionStateChanged {
        session: SessionId,
        state: SessionState,
        time: Time,
    },
    InstanceLossPending {
        loss_time: Time,
    },
    EventsLost {
        count: u32,
    },
    ReferenceSpaceChangePending {
        session: SessionId,
        space_type: ReferenceSpaceType,
    },
    InteractionProfileChanged {
        session: SessionId,
    },
}

bitflags! {
    /// Usage of images created by a runtime swapchain.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SwapchainUsageFlags: u64 {
        const COLOR_ATTACHMENT = 0x0000_0001;
        const DEPTH_STENCIL_ATTACHMENT = 0x0000_0002;
        const UNORDERED_ACCESS = 0x0000_0004;
        const TRANSFER_SRC = 0x0000_0008;
        const TRANSFER_DST = 0x0000_0010;
        const SAMPLED = 0x0000_0020;
        const MUTABLE_FORMAT = 0x0000_0040;
    }
}

/// Parameters for a runtime swapchain. `format` is the graphics API's raw
/// format value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainCreateInfo {
    pub usage: SwapchainUsageFlags,
    pub format: i64,
    pub sample_count: u32,
    pub width: u32,
    pub height: u32,
    pub face_count: u32,
    pub array_size: u32,
    pub mip_count: u32,
}
