use bitflags::bitflags;

use crate::xr::{EnvironmentBlendMode, Fovf, Posef, SpaceId, SwapchainId, Time};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CompositionLayerFlags: u64 {
        const CORRECT_CHROMATIC_ABERRATION = 0x0000_0001;
        const BLEND_TEXTURE_SOURCE_ALPHA = 0x0000_0002;
        const UNPREMULTIPLIED_ALPHA = 0x0000_0004;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect2Di {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One eye's contribution to a projection layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionView {
    pub pose: Posef,
    pub fov: Fovf,
    pub swapchain: SwapchainId,
    pub image_rect: Rect2Di,
    pub image_array_index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionLayer {
    pub space: SpaceId,
    pub flags: CompositionLayerFlags,
    pub views: Vec<ProjectionView>,
}

/// Everything handed to the compositor when a frame ends.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEndInfo {
    pub display_time: Time,
    pub blend_mode: EnvironmentBlendMode,
    pub layers: Vec<ProjectionLayer>,
}
