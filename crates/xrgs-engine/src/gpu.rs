use ash::prelude::VkResult;
use ash::vk;

/// Memory types of the selected physical device.
#[derive(Debug, Clone, Default)]
pub struct MemoryProperties {
    pub memory_types: Vec<vk::MemoryType>,
}

impl MemoryProperties {
    pub fn from_vk(props: &vk::PhysicalDeviceMemoryProperties) -> Self {
        let count = (props.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);
        Self {
            memory_types: props.memory_types[..count].to_vec(),
        }
    }

    /// First memory type allowed by `type_bits` whose flags contain `required`.
    pub fn find_memory_type(&self, type_bits: u32, required: vk::MemoryPropertyFlags) -> Option<u32> {
        self.memory_types
            .iter()
            .enumerate()
            .take(32)
            .find(|(i, ty)| type_bits & (1 << i) != 0 && ty.property_flags.contains(required))
            .map(|(i, _)| i as u32)
    }
}

/// The slice of the Vulkan device API the resource registry drives.
///
/// Implemented by [`crate::device::VulkanDevice`] over ash; tests substitute a
/// recording fake. Callers are responsible for destroying objects only after
/// the GPU has stopped using them.
pub trait GpuApi {
    fn memory_properties(&self) -> &MemoryProperties;

    fn wait_idle(&self) -> VkResult<()>;

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image>;

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory>;

    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()>;

    fn free_memory(&self, memory: vk::DeviceMemory);

    fn destroy_image(&self, image: vk::Image);

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView>;

    fn destroy_image_view(&self, view: vk::ImageView);

    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> VkResult<vk::Sampler>;

    fn destroy_sampler(&self, sampler: vk::Sampler);
}
