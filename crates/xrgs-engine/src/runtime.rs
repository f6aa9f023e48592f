use ash::vk;
use tracing::error;

use xrgs_protocol::layer::{FrameEndInfo, ProjectionLayer};
use xrgs_protocol::xr::{
    EnvironmentBlendMode, FrameState, Posef, ReferenceSpaceType, RuntimeEvent, SessionId, SpaceId,
    SwapchainCreateInfo, SwapchainId, Time, View, ViewConfigurationType, ViewConfigurationView,
};
use xrgs_protocol::{RuntimeError, RuntimeResult};

/// The XR compositor as seen by the session and frame logic.
///
/// Every method maps onto one runtime call. Implementations must not
/// reorder or batch calls; the frame driver relies on each call reaching
/// the compositor in the order it is made.
pub trait XrRuntime {
    /// Handle of the session this runtime object drives.
    fn session(&self) -> SessionId;

    /// Next queued event, or `None` when the queue is empty.
    fn poll_event(&mut self) -> RuntimeResult<Option<RuntimeEvent>>;

    fn begin_session(&mut self, view_configuration: ViewConfigurationType) -> RuntimeResult<()>;

    fn end_session(&mut self) -> RuntimeResult<()>;

    fn request_exit_session(&mut self) -> RuntimeResult<()>;

    // ── Startup queries ─────────────────────────────────────

    fn enumerate_view_configurations(&self) -> RuntimeResult<Vec<ViewConfigurationType>>;

    fn view_configuration_views(
        &self,
        view_configuration: ViewConfigurationType,
    ) -> RuntimeResult<Vec<ViewConfigurationView>>;

    fn enumerate_blend_modes(
        &self,
        view_configuration: ViewConfigurationType,
    ) -> RuntimeResult<Vec<EnvironmentBlendMode>>;

    fn enumerate_reference_spaces(&self) -> RuntimeResult<Vec<ReferenceSpaceType>>;

    fn create_reference_space(
        &mut self,
        space_type: ReferenceSpaceType,
        pose: Posef,
    ) -> RuntimeResult<SpaceId>;

    fn destroy_space(&mut self, space: SpaceId) -> RuntimeResult<()>;

    // ── Swapchains ──────────────────────────────────────────

    /// Formats the runtime can allocate, in its preference order.
    fn enumerate_swapchain_formats(&self) -> RuntimeResult<Vec<i64>>;

    fn create_swapchain(&mut self, info: &SwapchainCreateInfo) -> RuntimeResult<SwapchainId>;

    /// Allocate the per-swapchain image table and return its images.
    fn enumerate_swapchain_images(&mut self, swapchain: SwapchainId) -> RuntimeResult<Vec<vk::Image>>;

    /// Drop the image table allocated by `enumerate_swapchain_images`.
    fn free_swapchain_image_data(&mut self, swapchain: SwapchainId);

    fn destroy_swapchain(&mut self, swapchain: SwapchainId) -> RuntimeResult<()>;

    fn acquire_swapchain_image(&mut self, swapchain: SwapchainId) -> RuntimeResult<u32>;

    fn wait_swapchain_image(&mut self, swapchain: SwapchainId, timeout_ns: i64) -> RuntimeResult<()>;

    fn release_swapchain_image(&mut self, swapchain: SwapchainId) -> RuntimeResult<()>;

    // ── Frame loop ──────────────────────────────────────────

    fn wait_frame(&mut self) -> RuntimeResult<FrameState>;

    fn begin_frame(&mut self) -> RuntimeResult<()>;

    /// Locate at most `capacity` views; the returned length is the count the
    /// runtime actually filled.
    fn locate_views(
        &mut self,
        view_configuration: ViewConfigurationType,
        display_time: Time,
        space: SpaceId,
        capacity: usize,
    ) -> RuntimeResult<Vec<View>>;

    /// End the frame begun by `begin_frame`. The frame is ended even when a
    /// layer cannot be submitted; that layer is dropped and the error still
    /// reported.
    fn end_frame(&mut self, info: &FrameEndInfo) -> RuntimeResult<()>;
}

/// What an XR runtime dictates about the Vulkan objects it will composite from.
pub trait RuntimeGraphicsBinding {
    /// Lowest Vulkan API version the runtime accepts, packed with `vk::make_api_version`.
    fn min_vulkan_version(&self) -> RuntimeResult<u32>;

    /// Space-separated instance extension names the runtime needs.
    fn vulkan_instance_extensions(&self) -> RuntimeResult<String>;

    /// Space-separated device extension names the runtime needs.
    fn vulkan_device_extensions(&self) -> RuntimeResult<String>;

    /// Physical device the runtime's display is attached to.
    fn vulkan_physical_device(&self, instance: vk::Instance) -> RuntimeResult<vk::PhysicalDevice>;
}

/// A projection layer whose space and swapchains all exist in the backend.
pub struct ResolvedLayer<'a, S, C> {
    pub layer: &'a ProjectionLayer,
    pub space: &'a S,
    /// One per layer view, in view order
    pub swapchains: Vec<&'a C>,
}

/// Look up the backend objects behind each layer. A layer naming an unknown
/// space or swapchain is dropped whole; the first such failure is returned
/// next to the layers that did resolve, so the frame can still be ended.
pub fn resolve_layers<'a, S, C>(
    layers: &'a [ProjectionLayer],
    space: impl Fn(SpaceId) -> Option<&'a S>,
    swapchain: impl Fn(SwapchainId) -> Option<&'a C>,
) -> (Vec<ResolvedLayer<'a, S, C>>, Option<RuntimeError>) {
    let mut resolved = Vec::with_capacity(layers.len());
    let mut failure = None;

    for layer in layers {
        let lookup = space(layer.space)
            .ok_or(RuntimeError::UnknownSpace(layer.space))
            .and_then(|space| {
                let swapchains = layer
                    .views
                    .iter()
                    .map(|view| {
                        swapchain(view.swapchain).ok_or(RuntimeError::UnknownSwapchain(view.swapchain))
                    })
                    .collect::<RuntimeResult<Vec<_>>>()?;
                Ok(ResolvedLayer {
                    layer,
                    space,
                    swapchains,
                })
            });
        match lookup {
            Ok(layer) => resolved.push(layer),
            Err(e) => {
                error!("dropping projection layer: {}", e);
                failure.get_or_insert(e);
            }
        }
    }

    (resolved, failure)
}
