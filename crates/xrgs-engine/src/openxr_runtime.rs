use std::collections::HashMap;

use ash::vk::{self, Handle};
use openxr as xr;
use tracing::{debug, info};

use xrgs_core::XrgsConfig;
use xrgs_protocol::layer::FrameEndInfo;
use xrgs_protocol::xr::{
    EnvironmentBlendMode, Fovf, FrameState, Posef, Quatf, ReferenceSpaceType, RuntimeEvent,
    SessionId, SessionState, SpaceId, SwapchainCreateInfo, SwapchainId, Time, Vec3f, View,
    ViewConfigurationType, ViewConfigurationView, INFINITE_DURATION,
};
use xrgs_protocol::{RuntimeError, RuntimeResult};

use crate::device::VulkanDevice;
use crate::runtime::{resolve_layers, RuntimeGraphicsBinding, XrRuntime};

fn xr_err(call: &'static str) -> impl Fn(xr::sys::Result) -> RuntimeError {
    move |result| RuntimeError::call(call, result.into_raw())
}

// ── Type conversions ────────────────────────────────────────

fn view_configuration_to_xr(ty: ViewConfigurationType) -> xr::ViewConfigurationType {
    match ty {
        ViewConfigurationType::PrimaryMono => xr::ViewConfigurationType::PRIMARY_MONO,
        ViewConfigurationType::PrimaryStereo => xr::ViewConfigurationType::PRIMARY_STEREO,
    }
}

fn view_configuration_from_xr(ty: xr::ViewConfigurationType) -> Option<ViewConfigurationType> {
    match ty {
        xr::ViewConfigurationType::PRIMARY_MONO => Some(ViewConfigurationType::PrimaryMono),
        xr::ViewConfigurationType::PRIMARY_STEREO => Some(ViewConfigurationType::PrimaryStereo),
        _ => None,
    }
}

fn blend_mode_to_xr(mode: EnvironmentBlendMode) -> xr::EnvironmentBlendMode {
    match mode {
        EnvironmentBlendMode::Opaque => xr::EnvironmentBlendMode::OPAQUE,
        EnvironmentBlendMode::Additive => xr::EnvironmentBlendMode::ADDITIVE,
        EnvironmentBlendMode::AlphaBlend => xr::EnvironmentBlendMode::ALPHA_BLEND,
    }
}

fn blend_mode_from_xr(mode: xr::EnvironmentBlendMode) -> Option<EnvironmentBlendMode> {
    match mode {
        xr::EnvironmentBlendMode::OPAQUE => Some(EnvironmentBlendMode::Opaque),
        xr::EnvironmentBlendMode::ADDITIVE => Some(EnvironmentBlendMode::Additive),
        xr::EnvironmentBlendMode::ALPHA_BLEND => Some(EnvironmentBlendMode::AlphaBlend),
        _ => None,
    }
}

fn space_type_to_xr(ty: ReferenceSpaceType) -> xr::ReferenceSpaceType {
    match ty {
        ReferenceSpaceType::View => xr::ReferenceSpaceType::VIEW,
        ReferenceSpaceType::Local => xr::ReferenceSpaceType::LOCAL,
        ReferenceSpaceType::Stage => xr::ReferenceSpaceType::STAGE,
    }
}

fn space_type_from_xr(ty: xr::ReferenceSpaceType) -> Option<ReferenceSpaceType> {
    match ty {
        xr::ReferenceSpaceType::VIEW => Some(ReferenceSpaceType::View),
        xr::ReferenceSpaceType::LOCAL => Some(ReferenceSpaceType::Local),
        xr::ReferenceSpaceType::STAGE => Some(ReferenceSpaceType::Stage),
        _ => None,
    }
}

fn session_state_from_xr(state: xr::SessionState) -> SessionState {
    match state {
        xr::SessionState::IDLE => SessionState::Idle,
        xr::SessionState::READY => SessionState::Ready,
        xr::SessionState::SYNCHRONIZED => SessionState::Synchronized,
        xr::SessionState::VISIBLE => SessionState::Visible,
        xr::SessionState::FOCUSED => SessionState::Focused,
        xr::SessionState::STOPPING => SessionState::Stopping,
        xr::SessionState::LOSS_PENDING => SessionState::LossPending,
        xr::SessionState::EXITING => SessionState::Exiting,
        _ => SessionState::Unknown,
    }
}

fn pose_to_xr(pose: Posef) -> xr::Posef {
    let o = pose.orientation;
    let p = pose.position;
    xr::Posef {
        orientation: xr::Quaternionf { x: o.x, y: o.y, z: o.z, w: o.w },
        position: xr::Vector3f { x: p.x, y: p.y, z: p.z },
    }
}

fn pose_from_xr(pose: xr::Posef) -> Posef {
    let o = pose.orientation;
    let p = pose.position;
    Posef {
        orientation: Quatf { x: o.x, y: o.y, z: o.z, w: o.w },
        position: Vec3f { x: p.x, y: p.y, z: p.z },
    }
}

fn fov_to_xr(fov: Fovf) -> xr::Fovf {
    xr::Fovf {
        angle_left: fov.angle_left,
        angle_right: fov.angle_right,
        angle_up: fov.angle_up,
        angle_down: fov.angle_down,
    }
}

fn fov_from_xr(fov: xr::Fovf) -> Fovf {
    Fovf {
        angle_left: fov.angle_left,
        angle_right: fov.angle_right,
        angle_up: fov.angle_up,
        angle_down: fov.angle_down,
    }
}

// ── Instance ────────────────────────────────────────────────

/// OpenXR instance and the head-mounted system it drives. Exists before the
/// Vulkan device so the device can be created the way the runtime wants.
pub struct OpenXrInstance {
    // Keeps the loader library alive
    _entry: xr::Entry,
    instance: xr::Instance,
    system: xr::SystemId,
}

impl OpenXrInstance {
    pub fn new(config: &XrgsConfig) -> RuntimeResult<Self> {
        let entry = unsafe { xr::Entry::load() }
            .map_err(|e| RuntimeError::Unavailable(format!("OpenXR loader: {}", e)))?;
        let available = entry
            .enumerate_extensions()
            .map_err(xr_err("xrEnumerateInstanceExtensionProperties"))?;
        if !available.khr_vulkan_enable {
            return Err(RuntimeError::Unavailable(
                "runtime does not support XR_KHR_vulkan_enable".to_string(),
            ));
        }

        let mut extensions = xr::ExtensionSet::default();
        extensions.khr_vulkan_enable = true;

        let app_info = xr::ApplicationInfo {
            application_name: &config.app.name,
            application_version: config.app.version,
            engine_name: "xrgs",
            engine_version: 1,
            api_version: xr::Version::new(1, 0, 0),
        };
        let instance = entry
            .create_instance(&app_info, &extensions, &[])
            .map_err(xr_err("xrCreateInstance"))?;
        if let Ok(props) = instance.properties() {
            let v = props.runtime_version;
            info!(
                "OpenXR runtime: {} {}.{}.{}",
                props.runtime_name,
                v.major(),
                v.minor(),
                v.patch()
            );
        }

        let system = instance
            .system(xr::FormFactor::HEAD_MOUNTED_DISPLAY)
            .map_err(xr_err("xrGetSystem"))?;

        Ok(Self {
            _entry: entry,
            instance,
            system,
        })
    }
}

impl RuntimeGraphicsBinding for OpenXrInstance {
    fn min_vulkan_version(&self) -> RuntimeResult<u32> {
        let reqs = self
            .instance
            .graphics_requirements::<xr::Vulkan>(self.system)
            .map_err(xr_err("xrGetVulkanGraphicsRequirementsKHR"))?;
        let min = reqs.min_api_version_supported;
        Ok(vk::make_api_version(
            0,
            min.major() as u32,
            min.minor() as u32,
            min.patch(),
        ))
    }

    fn vulkan_instance_extensions(&self) -> RuntimeResult<String> {
        self.instance
            .vulkan_legacy_instance_extensions(self.system)
            .map_err(xr_err("xrGetVulkanInstanceExtensionsKHR"))
    }

    fn vulkan_device_extensions(&self) -> RuntimeResult<String> {
        self.instance
            .vulkan_legacy_device_extensions(self.system)
            .map_err(xr_err("xrGetVulkanDeviceExtensionsKHR"))
    }

    fn vulkan_physical_device(&self, instance: vk::Instance) -> RuntimeResult<vk::PhysicalDevice> {
        let raw = unsafe {
            self.instance
                .vulkan_graphics_device(self.system, instance.as_raw() as *const _)
        }
        .map_err(xr_err("xrGetVulkanGraphicsDeviceKHR"))?;
        Ok(vk::PhysicalDevice::from_raw(raw as u64))
    }
}

// ── Session ─────────────────────────────────────────────────

struct SwapchainSlot {
    handle: xr::Swapchain<xr::Vulkan>,
    /// Image table from the last enumerate, dropped by free_swapchain_image_data
    images: Option<Vec<u64>>,
}

/// [`XrRuntime`] over a live OpenXR session.
///
/// Swapchains and spaces are owned here and addressed by id; dropping this
/// destroys whatever is left, swapchains first and the instance last.
pub struct OpenXrRuntime {
    swapchains: HashMap<u64, SwapchainSlot>,
    spaces: HashMap<u64, xr::Space>,
    frame_stream: xr::FrameStream<xr::Vulkan>,
    frame_waiter: xr::FrameWaiter,
    session: xr::Session<xr::Vulkan>,
    event_buffer: xr::EventDataBuffer,
    instance: OpenXrInstance,
    session_id: SessionId,
    next_id: u64,
}

impl OpenXrRuntime {
    /// Create the session on `device`, which must have been bootstrapped
    /// with `instance` as its graphics binding.
    pub fn create_session(instance: OpenXrInstance, device: &VulkanDevice) -> RuntimeResult<Self> {
        let info = xr::vulkan::SessionCreateInfo {
            instance: device.instance().handle().as_raw() as *const _,
            physical_device: device.physical_device().as_raw() as *const _,
            device: device.device().handle().as_raw() as *const _,
            queue_family_index: device.queue_family_index(),
            queue_index: device.queue_index(),
        };
        let (session, frame_waiter, frame_stream) = unsafe {
            instance
                .instance
                .create_session::<xr::Vulkan>(instance.system, &info)
        }
        .map_err(xr_err("xrCreateSession"))?;

        let session_id = SessionId(session.as_raw().into_raw());
        info!("OpenXR session created ({:?})", session_id);

        Ok(Self {
            swapchains: HashMap::new(),
            spaces: HashMap::new(),
            frame_stream,
            frame_waiter,
            session,
            event_buffer: xr::EventDataBuffer::new(),
            instance,
            session_id,
            next_id: 1,
        })
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn slot_mut(&mut self, swapchain: SwapchainId) -> RuntimeResult<&mut SwapchainSlot> {
        self.swapchains
            .get_mut(&swapchain.0)
            .ok_or(RuntimeError::UnknownSwapchain(swapchain))
    }

    fn space(&self, space: SpaceId) -> RuntimeResult<&xr::Space> {
        self.spaces.get(&space.0).ok_or(RuntimeError::UnknownSpace(space))
    }
}

impl XrRuntime for OpenXrRuntime {
    fn session(&self) -> SessionId {
        self.session_id
    }

    fn poll_event(&mut self) -> RuntimeResult<Option<RuntimeEvent>> {
        loop {
            let Some(event) = self
                .instance
                .instance
                .poll_event(&mut self.event_buffer)
                .map_err(xr_err("xrPollEvent"))?
            else {
                return Ok(None);
            };

            let converted = match event {
                xr::Event::SessionStateChanged(e) => Some(RuntimeEvent::SessionStateChanged {
                    session: SessionId(e.session().into_raw()),
                    state: session_state_from_xr(e.state()),
                    time: Time(e.time().as_nanos()),
                }),
                xr::Event::InstanceLossPending(e) => Some(RuntimeEvent::InstanceLossPending {
                    loss_time: Time(e.loss_time().as_nanos()),
                }),
                xr::Event::EventsLost(e) => Some(RuntimeEvent::EventsLost {
                    count: e.lost_event_count(),
                }),
                xr::Event::ReferenceSpaceChangePending(e) => {
                    space_type_from_xr(e.reference_space_type()).map(|space_type| {
                        RuntimeEvent::ReferenceSpaceChangePending {
                            session: SessionId(e.session().into_raw()),
                            space_type,
                        }
                    })
                }
                xr::Event::InteractionProfileChanged(e) => {
                    Some(RuntimeEvent::InteractionProfileChanged {
                        session: SessionId(e.session().into_raw()),
                    })
                }
                _ => None,
            };

            match converted {
                Some(event) => return Ok(Some(event)),
                None => debug!("skipping unhandled OpenXR event"),
            }
        }
    }

    fn begin_session(&mut self, view_configuration: ViewConfigurationType) -> RuntimeResult<()> {
        self.session
            .begin(view_configuration_to_xr(view_configuration))
            .map(|_| ())
            .map_err(xr_err("xrBeginSession"))
    }

    fn end_session(&mut self) -> RuntimeResult<()> {
        self.session.end().map(|_| ()).map_err(xr_err("xrEndSession"))
    }

    fn request_exit_session(&mut self) -> RuntimeResult<()> {
        self.session
            .request_exit()
            .map(|_| ())
            .map_err(xr_err("xrRequestExitSession"))
    }

    fn enumerate_view_configurations(&self) -> RuntimeResult<Vec<ViewConfigurationType>> {
        let types = self
            .instance
            .instance
            .enumerate_view_configurations(self.instance.system)
            .map_err(xr_err("xrEnumerateViewConfigurations"))?;
        Ok(types.into_iter().filter_map(view_configuration_from_xr).collect())
    }

    fn view_configuration_views(
        &self,
        view_configuration: ViewConfigurationType,
    ) -> RuntimeResult<Vec<ViewConfigurationView>> {
        let views = self
            .instance
            .instance
            .enumerate_view_configuration_views(
                self.instance.system,
                view_configuration_to_xr(view_configuration),
            )
            .map_err(xr_err("xrEnumerateViewConfigurationViews"))?;
        Ok(views
            .into_iter()
            .map(|v| ViewConfigurationView {
                recommended_image_rect_width: v.recommended_image_rect_width,
                max_image_rect_width: v.max_image_rect_width,
                recommended_image_rect_height: v.recommended_image_rect_height,
                max_image_rect_height: v.max_image_rect_height,
                recommended_swapchain_sample_count: v.recommended_swapchain_sample_count,
                max_swapchain_sample_count: v.max_swapchain_sample_count,
            })
            .collect())
    }

    fn enumerate_blend_modes(
        &self,
        view_configuration: ViewConfigurationType,
    ) -> RuntimeResult<Vec<EnvironmentBlendMode>> {
        let modes = self
            .instance
            .instance
            .enumerate_environment_blend_modes(
                self.instance.system,
                view_configuration_to_xr(view_configuration),
            )
            .map_err(xr_err("xrEnumerateEnvironmentBlendModes"))?;
        Ok(modes.into_iter().filter_map(blend_mode_from_xr).collect())
    }

    fn enumerate_reference_spaces(&self) -> RuntimeResult<Vec<ReferenceSpaceType>> {
        let types = self
            .session
            .enumerate_reference_spaces()
            .map_err(xr_err("xrEnumerateReferenceSpaces"))?;
        Ok(types.into_iter().filter_map(space_type_from_xr).collect())
    }

    fn create_reference_space(
        &mut self,
        space_type: ReferenceSpaceType,
        pose: Posef,
    ) -> RuntimeResult<SpaceId> {
        let space = self
            .session
            .create_reference_space(space_type_to_xr(space_type), pose_to_xr(pose))
            .map_err(xr_err("xrCreateReferenceSpace"))?;
        let id = self.next_id();
        self.spaces.insert(id, space);
        Ok(SpaceId(id))
    }

    fn destroy_space(&mut self, space: SpaceId) -> RuntimeResult<()> {
        self.spaces
            .remove(&space.0)
            .map(drop)
            .ok_or(RuntimeError::UnknownSpace(space))
    }

    fn enumerate_swapchain_formats(&self) -> RuntimeResult<Vec<i64>> {
        let formats = self
            .session
            .enumerate_swapchain_formats()
            .map_err(xr_err("xrEnumerateSwapchainFormats"))?;
        Ok(formats.into_iter().map(i64::from).collect())
    }

    fn create_swapchain(&mut self, info: &SwapchainCreateInfo) -> RuntimeResult<SwapchainId> {
        let create_info = xr::SwapchainCreateInfo::<xr::Vulkan> {
            create_flags: xr::SwapchainCreateFlags::EMPTY,
            usage_flags: xr::SwapchainUsageFlags::from_raw(info.usage.bits()),
            format: info.format as u32,
            sample_count: info.sample_count,
            width: info.width,
            height: info.height,
            face_count: info.face_count,
            array_size: info.array_size,
            mip_count: info.mip_count,
        };
        let handle = self
            .session
            .create_swapchain(&create_info)
            .map_err(xr_err("xrCreateSwapchain"))?;
        let id = self.next_id();
        self.swapchains.insert(id, SwapchainSlot { handle, images: None });
        Ok(SwapchainId(id))
    }

    fn enumerate_swapchain_images(&mut self, swapchain: SwapchainId) -> RuntimeResult<Vec<vk::Image>> {
        let slot = self.slot_mut(swapchain)?;
        let images = slot
            .handle
            .enumerate_images()
            .map_err(xr_err("xrEnumerateSwapchainImages"))?;
        let vk_images = images.iter().map(|raw| vk::Image::from_raw(*raw)).collect();
        slot.images = Some(images);
        Ok(vk_images)
    }

    fn free_swapchain_image_data(&mut self, swapchain: SwapchainId) {
        if let Some(slot) = self.swapchains.get_mut(&swapchain.0) {
            slot.images = None;
        }
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainId) -> RuntimeResult<()> {
        self.swapchains
            .remove(&swapchain.0)
            .map(drop)
            .ok_or(RuntimeError::UnknownSwapchain(swapchain))
    }

    fn acquire_swapchain_image(&mut self, swapchain: SwapchainId) -> RuntimeResult<u32> {
        self.slot_mut(swapchain)?
            .handle
            .acquire_image()
            .map_err(xr_err("xrAcquireSwapchainImage"))
    }

    fn wait_swapchain_image(&mut self, swapchain: SwapchainId, timeout_ns: i64) -> RuntimeResult<()> {
        let timeout = if timeout_ns == INFINITE_DURATION {
            xr::Duration::INFINITE
        } else {
            xr::Duration::from_nanos(timeout_ns)
        };
        self.slot_mut(swapchain)?
            .handle
            .wait_image(timeout)
            .map_err(xr_err("xrWaitSwapchainImage"))
    }

    fn release_swapchain_image(&mut self, swapchain: SwapchainId) -> RuntimeResult<()> {
        self.slot_mut(swapchain)?
            .handle
            .release_image()
            .map_err(xr_err("xrReleaseSwapchainImage"))
    }

    fn wait_frame(&mut self) -> RuntimeResult<FrameState> {
        let state = self.frame_waiter.wait().map_err(xr_err("xrWaitFrame"))?;
        Ok(FrameState {
            predicted_display_time: Time(state.predicted_display_time.as_nanos()),
            predicted_display_period_ns: state.predicted_display_period.as_nanos(),
            should_render: state.should_render,
        })
    }

    fn begin_frame(&mut self) -> RuntimeResult<()> {
        self.frame_stream.begin().map(|_| ()).map_err(xr_err("xrBeginFrame"))
    }

    fn locate_views(
        &mut self,
        view_configuration: ViewConfigurationType,
        display_time: Time,
        space: SpaceId,
        capacity: usize,
    ) -> RuntimeResult<Vec<View>> {
        let space = self.space(space)?;
        let (_flags, views) = self
            .session
            .locate_views(
                view_configuration_to_xr(view_configuration),
                xr::Time::from_nanos(display_time.as_nanos()),
                space,
            )
            .map_err(xr_err("xrLocateViews"))?;
        Ok(views
            .into_iter()
            .take(capacity)
            .map(|v| View {
                pose: pose_from_xr(v.pose),
                fov: fov_from_xr(v.fov),
            })
            .collect())
    }

    fn end_frame(&mut self, info: &FrameEndInfo) -> RuntimeResult<()> {
        let display_time = xr::Time::from_nanos(info.display_time.as_nanos());
        let blend_mode = blend_mode_to_xr(info.blend_mode);

        // Unknown ids drop their layer; the frame still has to be ended.
        let spaces = &self.spaces;
        let swapchains = &self.swapchains;
        let (resolved, failure) = resolve_layers(
            &info.layers,
            |id| spaces.get(&id.0),
            |id| swapchains.get(&id.0),
        );

        // Layer structs borrow the views and spaces, so build each level first.
        let view_sets: Vec<Vec<xr::CompositionLayerProjectionView<'_, xr::Vulkan>>> = resolved
            .iter()
            .map(|resolved| {
                resolved
                    .layer
                    .views
                    .iter()
                    .zip(&resolved.swapchains)
                    .map(|(view, slot)| {
                        let sub_image = unsafe {
                            xr::SwapchainSubImage::from_raw(xr::sys::SwapchainSubImage {
                                swapchain: slot.handle.as_raw(),
                                image_rect: xr::Rect2Di {
                                    offset: xr::Offset2Di {
                                        x: view.image_rect.x,
                                        y: view.image_rect.y,
                                    },
                                    extent: xr::Extent2Di {
                                        width: view.image_rect.width,
                                        height: view.image_rect.height,
                                    },
                                },
                                image_array_index: view.image_array_index,
                            })
                        };
                        xr::CompositionLayerProjectionView::new()
                            .pose(pose_to_xr(view.pose))
                            .fov(fov_to_xr(view.fov))
                            .sub_image(sub_image)
                    })
                    .collect()
            })
            .collect();

        let projections: Vec<xr::CompositionLayerProjection<'_, xr::Vulkan>> = resolved
            .iter()
            .zip(&view_sets)
            .map(|(resolved, views)| {
                xr::CompositionLayerProjection::new()
                    .space(resolved.space)
                    .layer_flags(xr::CompositionLayerFlags::from_raw(resolved.layer.flags.bits()))
                    .views(views)
            })
            .collect();

        let layers: Vec<&xr::CompositionLayerBase<xr::Vulkan>> =
            projections.iter().map(|p| &**p).collect();

        self.frame_stream
            .end(display_time, blend_mode, &layers)
            .map_err(xr_err("xrEndFrame"))?;
        failure.map_or(Ok(()), Err)
    }
}
