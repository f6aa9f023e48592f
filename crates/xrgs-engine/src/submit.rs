use ash::prelude::VkResult;
use ash::vk;
use tracing::{debug, trace};

use crate::device::VulkanDevice;
use crate::error::DeviceError;

const DROP_FENCE_TIMEOUT_NS: u64 = 1_000_000_000;

/// Records and submits the frame's command buffer.
///
/// `submit` must have queued the work before it returns: the frame driver
/// releases swapchain images right after, and the compositor may reuse them
/// immediately. A failed `begin` or `submit` only drops that frame; the next
/// `begin` must still succeed.
pub trait CommandSubmitter {
    fn begin(&mut self) -> VkResult<vk::CommandBuffer>;

    fn submit(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()>;
}

/// One primary command buffer reused every frame, fenced so recording never
/// overlaps the previous submission.
pub struct FrameCommands {
    device: ash::Device,
    queue: vk::Queue,
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
    fence: vk::Fence,
    /// A submission will signal `fence`
    in_flight: bool,
}

impl FrameCommands {
    pub fn new(ctx: &VulkanDevice) -> Result<Self, DeviceError> {
        let device = ctx.device().clone();

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(ctx.queue_family_index())
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { device.create_command_pool(&pool_info, None) }
            .map_err(|result| DeviceError::Vulkan { call: "vkCreateCommandPool", result })?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffer = match unsafe { device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) if !buffers.is_empty() => buffers[0],
            Ok(_) => {
                unsafe { device.destroy_command_pool(pool, None) };
                return Err(DeviceError::Vulkan {
                    call: "vkAllocateCommandBuffers",
                    result: vk::Result::ERROR_UNKNOWN,
                });
            }
            Err(result) => {
                unsafe { device.destroy_command_pool(pool, None) };
                return Err(DeviceError::Vulkan { call: "vkAllocateCommandBuffers", result });
            }
        };

        let fence_info = vk::FenceCreateInfo::default();
        let fence = match unsafe { device.create_fence(&fence_info, None) } {
            Ok(fence) => fence,
            Err(result) => {
                unsafe { device.destroy_command_pool(pool, None) };
                return Err(DeviceError::Vulkan { call: "vkCreateFence", result });
            }
        };

        debug!("frame command pool ready on queue family {}", ctx.queue_family_index());
        Ok(Self {
            device,
            queue: ctx.queue(),
            pool,
            buffer,
            fence,
            in_flight: false,
        })
    }
}

impl CommandSubmitter for FrameCommands {
    fn begin(&mut self) -> VkResult<vk::CommandBuffer> {
        unsafe {
            if self.in_flight {
                self.device.wait_for_fences(&[self.fence], true, u64::MAX)?;
                self.in_flight = false;
            }
            self.device
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())?;
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device.begin_command_buffer(self.buffer, &begin_info)?;
        }
        trace!("command buffer recording");
        Ok(self.buffer)
    }

    fn submit(&mut self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe {
            self.device.end_command_buffer(command_buffer)?;
            let buffers = [command_buffer];
            let submit = vk::SubmitInfo::default().command_buffers(&buffers);
            // Reset only right before the submit that signals it; a failed
            // frame must not leave begin() waiting on a fence forever.
            self.device.reset_fences(&[self.fence])?;
            self.device.queue_submit(self.queue, &[submit], self.fence)?;
        }
        self.in_flight = true;
        trace!("command buffer submitted");
        Ok(())
    }
}

impl Drop for FrameCommands {
    fn drop(&mut self) {
        unsafe {
            if self.in_flight {
                let _ = self.device.wait_for_fences(&[self.fence], true, DROP_FENCE_TIMEOUT_NS);
            }
            self.device.destroy_fence(self.fence, None);
            // Frees the command buffer with it
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
