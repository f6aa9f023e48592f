use ash::vk;

/// Color formats the renderer can target, most preferred first.
pub const COLOR_FORMAT_ALLOWLIST: [vk::Format; 4] = [
    vk::Format::B8G8R8A8_SRGB,
    vk::Format::R8G8B8A8_SRGB,
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::R8G8B8A8_UNORM,
];

/// Depth formats the renderer can target, most preferred first.
pub const DEPTH_FORMAT_ALLOWLIST: [vk::Format; 2] = [vk::Format::D32_SFLOAT, vk::Format::D16_UNORM];

/// Runtime formats are 64-bit; Vulkan ones fit in the low 32 bits.
pub fn format_from_raw(raw: i64) -> vk::Format {
    vk::Format::from_raw(raw as i32)
}

pub fn format_to_raw(format: vk::Format) -> i64 {
    format.as_raw() as i64
}

pub fn is_unorm(format: vk::Format) -> bool {
    matches!(format, vk::Format::B8G8R8A8_UNORM | vk::Format::R8G8B8A8_UNORM)
}
