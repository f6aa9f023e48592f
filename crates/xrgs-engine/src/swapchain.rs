use ash::vk;
use tracing::{debug, error, info};

use xrgs_core::config::FormatOrder;
use xrgs_protocol::descriptors::ImageViewDesc;
use xrgs_protocol::formats::{
    format_from_raw, format_to_raw, is_unorm, COLOR_FORMAT_ALLOWLIST, DEPTH_FORMAT_ALLOWLIST,
};
use xrgs_protocol::handle::ResourceHandle;
use xrgs_protocol::xr::{SwapchainCreateInfo, SwapchainId, SwapchainUsageFlags, ViewConfigurationView};

use crate::error::{RegistryError, SwapchainError};
use crate::gpu::GpuApi;
use crate::registry::ResourceRegistry;
use crate::runtime::XrRuntime;
use crate::warning::{Fallback, FallbackWarning};

// ── Format negotiation ──────────────────────────────────────

/// Match the runtime's offered formats against an allowlist.
///
/// With [`FormatOrder::Allowlist`] the allowlist is walked in its own order
/// and the first entry the runtime offers wins; with [`FormatOrder::Runtime`]
/// the runtime's preference order decides. When nothing matches, the
/// runtime's first format is used and a warning is attached.
pub fn negotiate_format(
    offered: &[i64],
    allowlist: &[vk::Format],
    order: FormatOrder,
) -> Result<Fallback<vk::Format>, SwapchainError> {
    let Some(&first) = offered.first() else {
        return Err(SwapchainError::NoFormats);
    };

    let found = match order {
        FormatOrder::Allowlist => allowlist
            .iter()
            .copied()
            .find(|format| offered.contains(&format_to_raw(*format))),
        FormatOrder::Runtime => offered
            .iter()
            .map(|raw| format_from_raw(*raw))
            .find(|format| allowlist.contains(format)),
    };

    Ok(match found {
        Some(format) => Fallback::exact(format),
        None => {
            let used = format_from_raw(first);
            Fallback::fallback(
                used,
                FallbackWarning::SwapchainFormatUnsupported {
                    offered: offered.to_vec(),
                    used,
                },
            )
        }
    })
}

pub fn negotiate_color_format(
    offered: &[i64],
    order: FormatOrder,
) -> Result<Fallback<vk::Format>, SwapchainError> {
    negotiate_format(offered, &COLOR_FORMAT_ALLOWLIST, order)
}

pub fn negotiate_depth_format(
    offered: &[i64],
    order: FormatOrder,
) -> Result<Fallback<vk::Format>, SwapchainError> {
    negotiate_format(offered, &DEPTH_FORMAT_ALLOWLIST, order)
}

// ── Swapchain entries ───────────────────────────────────────

/// One runtime image and the render-target view created over it.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainImage {
    pub image_handle: ResourceHandle,
    pub image: vk::Image,
    pub view_handle: ResourceHandle,
    pub view: vk::ImageView,
}

/// The swapchain backing one logical view.
#[derive(Debug)]
pub struct SwapchainEntry {
    pub swapchain: SwapchainId,
    pub format: vk::Format,
    pub width: u32,
    pub height: u32,
    pub images: Vec<SwapchainImage>,
    /// Index handed out by the last acquire, cleared on release
    pub acquired: Option<u32>,
    image_data: bool,
}

impl SwapchainEntry {
    fn new(swapchain: SwapchainId, format: vk::Format, width: u32, height: u32) -> Self {
        Self {
            swapchain,
            format,
            width,
            height,
            images: Vec::new(),
            acquired: None,
            image_data: false,
        }
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

/// Creates and tears down one swapchain per logical view.
///
/// Runtime images are tracked in the resource registry as external images so
/// their views go through the same bookkeeping as owned ones.
#[derive(Debug, Default)]
pub struct SwapchainManager {
    entries: Vec<SwapchainEntry>,
    color_format: Option<vk::Format>,
}

impl SwapchainManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Negotiate a color format and create one swapchain per view.
    ///
    /// Each entry is recorded as soon as its swapchain exists, so a failure
    /// midway leaves everything created so far reachable by [`Self::destroy`].
    pub fn create<R: XrRuntime, G: GpuApi>(
        &mut self,
        runtime: &mut R,
        registry: &mut ResourceRegistry<G>,
        views: &[ViewConfigurationView],
        order: FormatOrder,
    ) -> Result<Fallback<vk::Format>, SwapchainError> {
        if views.is_empty() {
            return Err(SwapchainError::NoViews);
        }

        let offered = runtime.enumerate_swapchain_formats()?;
        debug!("runtime swapchain formats: {:?}", offered);
        let negotiated = negotiate_color_format(&offered, order)?;
        let format = negotiated.value;
        self.color_format = Some(format);
        info!("swapchain color format: {:?}", format);

        for (view_index, view) in views.iter().enumerate() {
            if view.recommended_swapchain_sample_count > 1 {
                info!(
                    "view {} recommends {}x multisampling, creating single-sampled swapchain",
                    view_index, view.recommended_swapchain_sample_count
                );
            }

            let info = SwapchainCreateInfo {
                usage: SwapchainUsageFlags::TRANSFER_SRC | SwapchainUsageFlags::COLOR_ATTACHMENT,
                format: format_to_raw(format),
                sample_count: 1,
                width: view.recommended_image_rect_width,
                height: view.recommended_image_rect_height,
                face_count: 1,
                array_size: 1,
                mip_count: 1,
            };
            let swapchain = runtime.create_swapchain(&info)?;
            self.entries
                .push(SwapchainEntry::new(swapchain, format, info.width, info.height));
            let entry_index = self.entries.len() - 1;

            let images = runtime.enumerate_swapchain_images(swapchain)?;
            self.entries[entry_index].image_data = true;

            for image in images {
                let image_handle =
                    registry.register_external_image(image, format, info.width, info.height);
                let view_handle = match registry
                    .create_image_view(&ImageViewDesc::color_2d(image_handle, format))
                {
                    Ok(handle) => handle,
                    Err(e) => {
                        let _ = registry.release_external_image(image_handle);
                        return Err(e.into());
                    }
                };
                let view = registry
                    .image_view(view_handle)
                    .ok_or(RegistryError::StaleHandle(view_handle))?;

                self.entries[entry_index].images.push(SwapchainImage {
                    image_handle,
                    image,
                    view_handle,
                    view,
                });
            }

            debug!(
                "view {}: swapchain {:?} {}x{} with {} images",
                view_index,
                swapchain,
                info.width,
                info.height,
                self.entries[entry_index].image_count()
            );
        }

        Ok(negotiated)
    }

    /// Destroy every swapchain. Per entry the order is fixed: image views,
    /// then the runtime's image data, then the swapchain handle.
    pub fn destroy<R: XrRuntime, G: GpuApi>(
        &mut self,
        runtime: &mut R,
        registry: &mut ResourceRegistry<G>,
    ) {
        if self.entries.is_empty() {
            return;
        }
        registry.wait_idle();

        for entry in self.entries.drain(..) {
            for image in &entry.images {
                registry.release_image_view(image.view_handle);
            }
            for image in &entry.images {
                let _ = registry.release_external_image(image.image_handle);
            }
            if entry.image_data {
                runtime.free_swapchain_image_data(entry.swapchain);
            }
            if let Err(e) = runtime.destroy_swapchain(entry.swapchain) {
                error!("destroy swapchain {:?} failed: {}", entry.swapchain, e);
            }
            debug!("destroyed swapchain {:?}", entry.swapchain);
        }
        self.color_format = None;
    }

    // ── Lookups ─────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SwapchainEntry] {
        &self.entries
    }

    pub fn entry(&self, view: usize) -> Option<&SwapchainEntry> {
        self.entries.get(view)
    }

    pub fn swapchain(&self, view: usize) -> Option<SwapchainId> {
        self.entries.get(view).map(|entry| entry.swapchain)
    }

    pub fn color_format(&self) -> Option<vk::Format> {
        self.color_format
    }

    /// True when the negotiated color format is UNORM, in which case the
    /// renderer has to encode sRGB itself.
    pub fn supports_unorm(&self) -> bool {
        self.color_format.is_some_and(is_unorm)
    }

    pub fn image(&self, view: usize, index: u32) -> Option<vk::Image> {
        self.entries
            .get(view)
            .and_then(|entry| entry.images.get(index as usize))
            .map(|image| image.image)
    }

    pub fn image_view(&self, view: usize, index: u32) -> Option<vk::ImageView> {
        self.entries
            .get(view)
            .and_then(|entry| entry.images.get(index as usize))
            .map(|image| image.view)
    }

    /// View over the image most recently acquired for `view`.
    pub fn current_image_view(&self, view: usize) -> Option<vk::ImageView> {
        let entry = self.entries.get(view)?;
        entry.acquired.and_then(|index| self.image_view(view, index))
    }

    pub(crate) fn set_acquired(&mut self, view: usize, index: Option<u32>) {
        if let Some(entry) = self.entries.get_mut(view) {
            entry.acquired = index;
        }
    }
}
