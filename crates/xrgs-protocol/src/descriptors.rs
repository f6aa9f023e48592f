use ash::vk;

use crate::handle::ResourceHandle;

/// Describes an image the registry creates and backs with device memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    /// 1, 2 or 3; maps to the image type `dimension - 1`
    pub dimension: u32,
    pub cubemap: bool,
    pub format: vk::Format,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub sample_count: u32,
    pub color_attachment: bool,
    pub depth_attachment: bool,
}

impl ImageDesc {
    /// A plain 2D color target with one mip and one layer.
    pub fn color_2d(format: vk::Format, width: u32, height: u32) -> Self {
        Self {
            dimension: 2,
            cubemap: false,
            format,
            width,
            height,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            sample_count: 1,
            color_attachment: true,
            depth_attachment: false,
        }
    }

    /// A 2D depth target with one mip and one layer.
    pub fn depth_2d(format: vk::Format, width: u32, height: u32) -> Self {
        Self {
            color_attachment: false,
            depth_attachment: true,
            ..Self::color_2d(format, width, height)
        }
    }
}

/// Describes a view of an image the registry already tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageViewDesc {
    pub image: ResourceHandle,
    pub view_type: vk::ImageViewType,
    pub format: vk::Format,
    pub aspect: vk::ImageAspectFlags,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

impl ImageViewDesc {
    /// A single-mip, single-layer 2D color view.
    pub fn color_2d(image: ResourceHandle, format: vk::Format) -> Self {
        Self {
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            aspect: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub mag_filter: vk::Filter,
    pub min_filter: vk::Filter,
    pub mipmap_mode: vk::SamplerMipmapMode,
    pub address_mode_s: vk::SamplerAddressMode,
    pub address_mode_t: vk::SamplerAddressMode,
    pub address_mode_r: vk::SamplerAddressMode,
    pub mip_lod_bias: f32,
    pub compare_enable: bool,
    pub compare_op: vk::CompareOp,
    pub min_lod: f32,
    pub max_lod: f32,
    /// Requested RGBA border color; approximated to the nearest fixed Vulkan border color
    pub border_color: [f32; 4],
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            address_mode_s: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_t: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_r: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            mip_lod_bias: 0.0,
            compare_enable: false,
            compare_op: vk::CompareOp::NEVER,
            min_lod: 0.0,
            max_lod: 1.0,
            border_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Nearest fixed border color for an RGBA request. Only opaque white, opaque
/// black and transparent black are expressible.
pub fn approximate_border_color(rgba: [f32; 4]) -> vk::BorderColor {
    let opaque = rgba[3] == 1.0;
    let white = opaque && rgba[0] == 1.0 && rgba[1] == 1.0 && rgba[2] == 1.0;
    if white {
        vk::BorderColor::FLOAT_OPAQUE_WHITE
    } else if opaque {
        vk::BorderColor::FLOAT_OPAQUE_BLACK
    } else {
        vk::BorderColor::FLOAT_TRANSPARENT_BLACK
    }
}
