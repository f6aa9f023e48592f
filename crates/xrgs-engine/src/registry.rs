use std::collections::HashMap;

use ash::vk;
use tracing::{debug, error, info, warn};

use xrgs_core::Arena;
use xrgs_protocol::descriptors::{approximate_border_color, ImageDesc, ImageViewDesc, SamplerDesc};
use xrgs_protocol::handle::{ResourceHandle, ResourceType};

use crate::error::RegistryError;
use crate::gpu::GpuApi;

/// Who owns an image's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    /// Created by the registry. `memory` is `None` only for a partial record
    /// left by a failed allocation or bind.
    Owned {
        memory: Option<vk::DeviceMemory>,
        desc: ImageDesc,
    },
    /// Allocated by the XR runtime; tracked for views and layout tags only.
    External {
        format: vk::Format,
        width: u32,
        height: u32,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct ImageRecord {
    pub image: vk::Image,
    pub origin: ImageOrigin,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageViewRecord {
    pub view: vk::ImageView,
    pub desc: ImageViewDesc,
}

#[derive(Debug, Clone, Copy)]
pub struct SamplerRecord {
    pub sampler: vk::Sampler,
    pub desc: SamplerDesc,
}

/// Owns every image, image view and sampler created on the device, plus a
/// last-known layout tag per image.
///
/// Handles are generation-checked: a handle to a destroyed resource never
/// resolves again. Layout tags are advisory; they record what a consumer
/// declared, not what the GPU has executed.
pub struct ResourceRegistry<G: GpuApi> {
    gpu: G,
    images: Arena<ImageRecord>,
    views: Arena<ImageViewRecord>,
    samplers: Arena<SamplerRecord>,
    layouts: HashMap<vk::Image, vk::ImageLayout>,
}

impl<G: GpuApi> ResourceRegistry<G> {
    pub fn new(gpu: G) -> Self {
        Self {
            gpu,
            images: Arena::new(ResourceType::Image),
            views: Arena::new(ResourceType::ImageView),
            samplers: Arena::new(ResourceType::Sampler),
            layouts: HashMap::new(),
        }
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    /// Block until the device is idle. Failure is logged; destruction that
    /// follows proceeds regardless.
    pub fn wait_idle(&self) {
        if let Err(e) = self.gpu.wait_idle() {
            warn!("device wait idle failed: {:?}", e);
        }
    }

    /// First memory type allowed by `type_bits` that is device local.
    pub fn find_memory_type(&self, type_bits: u32) -> Option<u32> {
        self.gpu
            .memory_properties()
            .find_memory_type(type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)
    }

    // ── Images ──────────────────────────────────────────────

    /// Create an image, back it with device-local memory and bind it.
    ///
    /// If allocation or binding fails the image stays tracked as a partial
    /// record and its handle is returned inside the error.
    pub fn create_image(&mut self, desc: &ImageDesc) -> Result<ResourceHandle, RegistryError> {
        let info = image_create_info(desc)?;
        let image = self.gpu.create_image(&info).map_err(|result| {
            error!("vkCreateImage failed: {:?}", result);
            RegistryError::Vulkan {
                call: "vkCreateImage",
                result,
                partial: None,
            }
        })?;

        let requirements = self.gpu.image_memory_requirements(image);
        let handle = self.images.insert(ImageRecord {
            image,
            origin: ImageOrigin::Owned {
                memory: None,
                desc: *desc,
            },
        });
        self.layouts.insert(image, info.initial_layout);

        let type_bits = requirements.memory_type_bits;
        let Some(memory_type_index) = self.find_memory_type(type_bits) else {
            error!("no device-local memory type for image {} (type bits {:#x})", handle, type_bits);
            return Err(RegistryError::NoCompatibleMemoryType {
                type_bits,
                partial: handle,
            });
        };

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = self.gpu.allocate_memory(&alloc_info).map_err(|result| {
            error!("vkAllocateMemory failed for image {}: {:?}", handle, result);
            RegistryError::Vulkan {
                call: "vkAllocateMemory",
                result,
                partial: Some(handle),
            }
        })?;
        if let Some(record) = self.images.get_mut(handle) {
            record.origin = ImageOrigin::Owned {
                memory: Some(memory),
                desc: *desc,
            };
        }

        self.gpu.bind_image_memory(image, memory, 0).map_err(|result| {
            error!("vkBindImageMemory failed for image {}: {:?}", handle, result);
            RegistryError::Vulkan {
                call: "vkBindImageMemory",
                result,
                partial: Some(handle),
            }
        })?;

        debug!(
            "created image {} ({:?} {}x{}x{}, {} bytes, memory type {})",
            handle, desc.format, desc.width, desc.height, desc.depth, requirements.size, memory_type_index
        );
        Ok(handle)
    }

    /// Free the image's memory, then destroy the image and forget it.
    pub fn destroy_image(&mut self, handle: ResourceHandle) -> Result<(), RegistryError> {
        match self.images.get(handle) {
            None => return Err(RegistryError::StaleHandle(handle)),
            Some(record) if matches!(record.origin, ImageOrigin::External { .. }) => {
                return Err(RegistryError::NotOwned(handle));
            }
            Some(_) => {}
        }
        self.wait_idle();
        self.release_image(handle);
        Ok(())
    }

    fn release_image(&mut self, handle: ResourceHandle) {
        let Some(record) = self.images.remove(handle) else {
            return;
        };
        if let ImageOrigin::Owned { memory, .. } = record.origin {
            if let Some(memory) = memory {
                self.gpu.free_memory(memory);
            }
            self.gpu.destroy_image(record.image);
        }
        self.layouts.remove(&record.image);
        debug!("destroyed image {}", handle);
    }

    /// Track a runtime-owned image so views can be created against it.
    pub fn register_external_image(
        &mut self,
        image: vk::Image,
        format: vk::Format,
        width: u32,
        height: u32,
    ) -> ResourceHandle {
        let handle = self.images.insert(ImageRecord {
            image,
            origin: ImageOrigin::External {
                format,
                width,
                height,
            },
        });
        self.layouts.insert(image, vk::ImageLayout::UNDEFINED);
        handle
    }

    /// Stop tracking a runtime-owned image. No device call is made.
    pub fn release_external_image(&mut self, handle: ResourceHandle) -> Result<vk::Image, RegistryError> {
        match self.images.get(handle) {
            None => Err(RegistryError::StaleHandle(handle)),
            Some(record) if matches!(record.origin, ImageOrigin::Owned { .. }) => {
                Err(RegistryError::InvalidDescriptor(format!("{} is not a runtime image", handle)))
            }
            Some(record) => {
                let image = record.image;
                self.images.remove(handle);
                self.layouts.remove(&image);
                Ok(image)
            }
        }
    }

    pub fn image(&self, handle: ResourceHandle) -> Option<vk::Image> {
        self.images.get(handle).map(|record| record.image)
    }

    pub fn image_record(&self, handle: ResourceHandle) -> Option<&ImageRecord> {
        self.images.get(handle)
    }

    // ── Layout tags ─────────────────────────────────────────

    pub fn layout(&self, image: vk::Image) -> Option<vk::ImageLayout> {
        self.layouts.get(&image).copied()
    }

    /// Record the layout a consumer declared for a tracked image. Untracked
    /// images are ignored.
    pub fn set_layout(&mut self, image: vk::Image, layout: vk::ImageLayout) {
        if let Some(tag) = self.layouts.get_mut(&image) {
            *tag = layout;
        }
    }

    // ── Image views ─────────────────────────────────────────

    /// Create a view with identity swizzle over a tracked image. The image's
    /// current layout is not checked.
    pub fn create_image_view(&mut self, desc: &ImageViewDesc) -> Result<ResourceHandle, RegistryError> {
        let image = self
            .image(desc.image)
            .ok_or(RegistryError::StaleHandle(desc.image))?;

        let info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(desc.view_type)
            .format(desc.format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::R,
                g: vk::ComponentSwizzle::G,
                b: vk::ComponentSwizzle::B,
                a: vk::ComponentSwizzle::A,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: desc.aspect,
                base_mip_level: desc.base_mip_level,
                level_count: desc.level_count,
                base_array_layer: desc.base_array_layer,
                layer_count: desc.layer_count,
            });

        let view = self.gpu.create_image_view(&info).map_err(|result| {
            error!("vkCreateImageView failed: {:?}", result);
            RegistryError::Vulkan {
                call: "vkCreateImageView",
                result,
                partial: None,
            }
        })?;
        let handle = self.views.insert(ImageViewRecord { view, desc: *desc });
        debug!("created image view {} of {}", handle, desc.image);
        Ok(handle)
    }

    pub fn destroy_image_view(&mut self, handle: ResourceHandle) -> Result<(), RegistryError> {
        if !self.views.contains(handle) {
            return Err(RegistryError::StaleHandle(handle));
        }
        self.wait_idle();
        self.release_image_view(handle);
        Ok(())
    }

    /// Destroy a view without waiting; the caller has already idled the device.
    pub(crate) fn release_image_view(&mut self, handle: ResourceHandle) {
        if let Some(record) = self.views.remove(handle) {
            self.gpu.destroy_image_view(record.view);
            debug!("destroyed image view {}", handle);
        }
    }

    pub fn image_view(&self, handle: ResourceHandle) -> Option<vk::ImageView> {
        self.views.get(handle).map(|record| record.view)
    }

    pub fn image_view_record(&self, handle: ResourceHandle) -> Option<&ImageViewRecord> {
        self.views.get(handle)
    }

    // ── Samplers ────────────────────────────────────────────

    /// Create a sampler. Anisotropy is always off and coordinates are
    /// normalized; the border color is snapped to the nearest fixed color.
    pub fn create_sampler(&mut self, desc: &SamplerDesc) -> Result<ResourceHandle, RegistryError> {
        let info = vk::SamplerCreateInfo::default()
            .mag_filter(desc.mag_filter)
            .min_filter(desc.min_filter)
            .mipmap_mode(desc.mipmap_mode)
            .address_mode_u(desc.address_mode_s)
            .address_mode_v(desc.address_mode_t)
            .address_mode_w(desc.address_mode_r)
            .mip_lod_bias(desc.mip_lod_bias)
            .anisotropy_enable(false)
            .max_anisotropy(0.0)
            .compare_enable(desc.compare_enable)
            .compare_op(desc.compare_op)
            .min_lod(desc.min_lod)
            .max_lod(desc.max_lod)
            .border_color(approximate_border_color(desc.border_color))
            .unnormalized_coordinates(false);

        let sampler = self.gpu.create_sampler(&info).map_err(|result| {
            error!("vkCreateSampler failed: {:?}", result);
            RegistryError::Vulkan {
                call: "vkCreateSampler",
                result,
                partial: None,
            }
        })?;
        let handle = self.samplers.insert(SamplerRecord { sampler, desc: *desc });
        debug!("created sampler {}", handle);
        Ok(handle)
    }

    pub fn destroy_sampler(&mut self, handle: ResourceHandle) -> Result<(), RegistryError> {
        if !self.samplers.contains(handle) {
            return Err(RegistryError::StaleHandle(handle));
        }
        self.wait_idle();
        if let Some(record) = self.samplers.remove(handle) {
            self.gpu.destroy_sampler(record.sampler);
            debug!("destroyed sampler {}", handle);
        }
        Ok(())
    }

    pub fn sampler(&self, handle: ResourceHandle) -> Option<vk::Sampler> {
        self.samplers.get(handle).map(|record| record.sampler)
    }

    // ── Bookkeeping ─────────────────────────────────────────

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn image_view_count(&self) -> usize {
        self.views.len()
    }

    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    /// Number of live tracked resources of every kind.
    pub fn live_count(&self) -> usize {
        self.images.len() + self.views.len() + self.samplers.len()
    }

    /// Destroy everything still tracked, dependents first: views, samplers,
    /// then images. Runtime-owned images are only forgotten.
    pub fn destroy_all(&mut self) {
        if self.live_count() == 0 {
            return;
        }
        self.wait_idle();

        let mut cleaned = 0u32;

        // Pass 1: ImageViews
        for handle in self.views.handles() {
            self.release_image_view(handle);
            cleaned += 1;
        }

        // Pass 2: Samplers
        for handle in self.samplers.handles() {
            if let Some(record) = self.samplers.remove(handle) {
                self.gpu.destroy_sampler(record.sampler);
                cleaned += 1;
            }
        }

        // Pass 3: Images (memory freed before each image)
        for handle in self.images.handles() {
            self.release_image(handle);
            cleaned += 1;
        }

        self.layouts.clear();
        info!("registry teardown released {} resources", cleaned);
    }
}

fn image_create_info(desc: &ImageDesc) -> Result<vk::ImageCreateInfo<'static>, RegistryError> {
    if !(1..=3).contains(&desc.dimension) {
        return Err(RegistryError::InvalidDescriptor(format!(
            "image dimension must be 1, 2 or 3, got {}",
            desc.dimension
        )));
    }

    let mut flags = vk::ImageCreateFlags::empty();
    if desc.cubemap {
        flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
    }
    if desc.dimension == 3 {
        flags |= vk::ImageCreateFlags::TYPE_2D_ARRAY_COMPATIBLE;
    }

    let mut usage = vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST;
    if desc.color_attachment {
        usage |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if desc.depth_attachment {
        usage |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }

    Ok(vk::ImageCreateInfo::default()
        .flags(flags)
        .image_type(vk::ImageType::from_raw(desc.dimension as i32 - 1))
        .format(desc.format)
        .extent(vk::Extent3D {
            width: desc.width,
            height: desc.height,
            depth: desc.depth,
        })
        .mip_levels(desc.mip_levels)
        .array_layers(desc.array_layers)
        .samples(vk::SampleCountFlags::from_raw(desc.sample_count))
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED))
}
