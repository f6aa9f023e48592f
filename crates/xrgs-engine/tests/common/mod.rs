//! Shared fakes for engine integration tests: a recording GPU, a scripted
//! XR runtime and a command submitter. All three can write into one call
//! log so tests can assert on cross-component ordering.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};

use xrgs_core::XrgsConfig;
use xrgs_engine::gpu::{GpuApi, MemoryProperties};
use xrgs_engine::runtime::XrRuntime;
use xrgs_engine::submit::CommandSubmitter;
use xrgs_protocol::layer::FrameEndInfo;
use xrgs_protocol::xr::{
    EnvironmentBlendMode, Fovf, FrameState, Posef, Quatf, ReferenceSpaceType, RuntimeEvent,
    SessionId, SessionState, SpaceId, SwapchainCreateInfo, SwapchainId, Time, Vec3f, View,
    ViewConfigurationType, ViewConfigurationView,
};
use xrgs_protocol::{RuntimeError, RuntimeResult};

pub type CallLog = Rc<RefCell<Vec<String>>>;

pub fn new_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Entries of `log` starting with any of `prefixes`, in order.
pub fn filtered(log: &CallLog, prefixes: &[&str]) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|call| prefixes.iter().any(|p| call.starts_with(p)))
        .cloned()
        .collect()
}

pub fn count(log: &CallLog, call: &str) -> usize {
    log.borrow().iter().filter(|c| c.as_str() == call).count()
}

pub fn position(log: &CallLog, call: &str) -> Option<usize> {
    log.borrow().iter().position(|c| c == call)
}

// ── GPU ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct GpuState {
    pub next_handle: Cell<u64>,
    pub memory_type_bits: Cell<u32>,
    pub fail_create_image: Cell<bool>,
    pub fail_allocate: Cell<bool>,
    pub fail_bind: Cell<bool>,
    pub live_images: RefCell<HashSet<u64>>,
    pub live_memory: RefCell<HashSet<u64>>,
    pub live_views: RefCell<HashSet<u64>>,
    pub live_samplers: RefCell<HashSet<u64>>,
    pub last_image_info: Cell<Option<(vk::ImageCreateFlags, vk::ImageType, vk::ImageUsageFlags, vk::ImageLayout)>>,
    pub last_memory_type: Cell<Option<u32>>,
    pub last_border_color: Cell<Option<vk::BorderColor>>,
    pub last_anisotropy: Cell<Option<bool>>,
    pub last_view_swizzle: Cell<Option<vk::ComponentMapping>>,
}

/// Records every device call. Clones share state.
#[derive(Clone)]
pub struct MockGpu {
    pub log: CallLog,
    pub state: Rc<GpuState>,
    props: MemoryProperties,
}

impl MockGpu {
    pub fn new(log: CallLog) -> Self {
        let state = GpuState::default();
        state.next_handle.set(0x1000);
        // Types 1 and 2 are device local; type 0 is host only
        state.memory_type_bits.set(0b111);
        Self {
            log,
            state: Rc::new(state),
            props: MemoryProperties {
                memory_types: vec![
                    vk::MemoryType {
                        property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
                            | vk::MemoryPropertyFlags::HOST_COHERENT,
                        heap_index: 1,
                    },
                    vk::MemoryType {
                        property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
                        heap_index: 0,
                    },
                    vk::MemoryType {
                        property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL
                            | vk::MemoryPropertyFlags::HOST_VISIBLE,
                        heap_index: 0,
                    },
                ],
            },
        }
    }

    fn record(&self, call: &str) {
        self.log.borrow_mut().push(call.to_string());
    }

    fn next(&self) -> u64 {
        let h = self.state.next_handle.get();
        self.state.next_handle.set(h + 1);
        h
    }

    /// Device objects created and not yet destroyed.
    pub fn live_objects(&self) -> usize {
        self.state.live_images.borrow().len()
            + self.state.live_memory.borrow().len()
            + self.state.live_views.borrow().len()
            + self.state.live_samplers.borrow().len()
    }
}

impl GpuApi for MockGpu {
    fn memory_properties(&self) -> &MemoryProperties {
        &self.props
    }

    fn wait_idle(&self) -> VkResult<()> {
        self.record("wait_idle");
        Ok(())
    }

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image> {
        self.record("create_image");
        if self.state.fail_create_image.get() {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        self.state.last_image_info.set(Some((
            info.flags,
            info.image_type,
            info.usage,
            info.initial_layout,
        )));
        let raw = self.next();
        self.state.live_images.borrow_mut().insert(raw);
        Ok(vk::Image::from_raw(raw))
    }

    fn image_memory_requirements(&self, _image: vk::Image) -> vk::MemoryRequirements {
        vk::MemoryRequirements {
            size: 4096,
            alignment: 256,
            memory_type_bits: self.state.memory_type_bits.get(),
        }
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory> {
        self.record("allocate_memory");
        if self.state.fail_allocate.get() {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        self.state.last_memory_type.set(Some(info.memory_type_index));
        let raw = self.next();
        self.state.live_memory.borrow_mut().insert(raw);
        Ok(vk::DeviceMemory::from_raw(raw))
    }

    fn bind_image_memory(
        &self,
        _image: vk::Image,
        _memory: vk::DeviceMemory,
        _offset: vk::DeviceSize,
    ) -> VkResult<()> {
        self.record("bind_image_memory");
        if self.state.fail_bind.get() {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        Ok(())
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        self.record("free_memory");
        let removed = self.state.live_memory.borrow_mut().remove(&memory.as_raw());
        assert!(removed, "double free of memory {:?}", memory);
    }

    fn destroy_image(&self, image: vk::Image) {
        self.record("destroy_image");
        let removed = self.state.live_images.borrow_mut().remove(&image.as_raw());
        assert!(removed, "destroy of unknown image {:?}", image);
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        self.record("create_image_view");
        self.state.last_view_swizzle.set(Some(info.components));
        let raw = self.next();
        self.state.live_views.borrow_mut().insert(raw);
        Ok(vk::ImageView::from_raw(raw))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.record("destroy_image_view");
        let removed = self.state.live_views.borrow_mut().remove(&view.as_raw());
        assert!(removed, "destroy of unknown image view {:?}", view);
    }

    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> VkResult<vk::Sampler> {
        self.record("create_sampler");
        self.state.last_border_color.set(Some(info.border_color));
        self.state.last_anisotropy.set(Some(info.anisotropy_enable == vk::TRUE));
        let raw = self.next();
        self.state.live_samplers.borrow_mut().insert(raw);
        Ok(vk::Sampler::from_raw(raw))
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.record("destroy_sampler");
        let removed = self.state.live_samplers.borrow_mut().remove(&sampler.as_raw());
        assert!(removed, "destroy of unknown sampler {:?}", sampler);
    }
}

// ── Runtime ─────────────────────────────────────────────────

pub const SESSION: SessionId = SessionId(7);

#[derive(Default)]
pub struct MockRuntimeConfig {
    pub view_configurations: Vec<ViewConfigurationType>,
    pub blend_modes: Vec<EnvironmentBlendMode>,
    pub reference_spaces: Vec<ReferenceSpaceType>,
    pub formats: Vec<i64>,
    pub views: Vec<ViewConfigurationView>,
    pub images_per_swapchain: usize,
}

/// Scripted compositor. Records calls, enforces the begin/end pairing and
/// hands out swapchain image indices round-robin.
pub struct MockRuntime {
    pub log: CallLog,
    pub config: MockRuntimeConfig,
    pub events: VecDeque<RuntimeEvent>,
    pub located: Vec<View>,
    pub should_render: bool,
    pub fail_locate: bool,
    pub fail_begin_session: bool,
    pub fail_wait_frame: bool,
    pub fail_end_frame: bool,
    /// Swapchain whose image waits fail
    pub fail_wait_image: Option<u64>,
    /// Events queued once `end_frames` reaches the given length
    pub events_after_frame: Vec<(usize, RuntimeEvent)>,
    pub end_frames: Vec<FrameEndInfo>,
    pub swapchain_infos: Vec<SwapchainCreateInfo>,
    pub live_swapchains: HashSet<u64>,
    pub image_data: HashSet<u64>,
    pub live_spaces: HashSet<u64>,
    pub space_poses: Vec<(ReferenceSpaceType, Posef)>,
    pub acquired: HashMap<u64, u32>,
    /// Acquired, not yet waited
    pub unwaited: HashMap<u64, u32>,
    /// Waited, not yet released
    pub outstanding: HashMap<u64, u32>,
    pub violations: Vec<String>,
    in_frame: bool,
    next_id: u64,
    time: i64,
}

impl MockRuntime {
    pub fn new(log: CallLog) -> Self {
        Self::with_config(
            log,
            MockRuntimeConfig {
                view_configurations: vec![
                    ViewConfigurationType::PrimaryStereo,
                    ViewConfigurationType::PrimaryMono,
                ],
                blend_modes: vec![EnvironmentBlendMode::Opaque],
                reference_spaces: vec![ReferenceSpaceType::View, ReferenceSpaceType::Local],
                formats: vec![
                    vk::Format::R8G8B8A8_SRGB.as_raw() as i64,
                    vk::Format::B8G8R8A8_SRGB.as_raw() as i64,
                ],
                views: stereo_views(),
                images_per_swapchain: 3,
            },
        )
    }

    pub fn with_config(log: CallLog, config: MockRuntimeConfig) -> Self {
        Self {
            log,
            config,
            events: VecDeque::new(),
            located: vec![located_view(-0.03), located_view(0.03)],
            should_render: true,
            fail_locate: false,
            fail_begin_session: false,
            fail_wait_frame: false,
            fail_end_frame: false,
            fail_wait_image: None,
            events_after_frame: Vec::new(),
            end_frames: Vec::new(),
            swapchain_infos: Vec::new(),
            live_swapchains: HashSet::new(),
            image_data: HashSet::new(),
            live_spaces: HashSet::new(),
            space_poses: Vec::new(),
            acquired: HashMap::new(),
            unwaited: HashMap::new(),
            outstanding: HashMap::new(),
            violations: Vec::new(),
            in_frame: false,
            next_id: 1,
            time: 1_000_000,
        }
    }

    pub fn push_state(&mut self, state: SessionState) {
        self.events.push_back(state_event(SESSION, state));
    }

    fn record(&self, call: impl Into<String>) {
        self.log.borrow_mut().push(call.into());
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl XrRuntime for MockRuntime {
    fn session(&self) -> SessionId {
        SESSION
    }

    fn poll_event(&mut self) -> RuntimeResult<Option<RuntimeEvent>> {
        Ok(self.events.pop_front())
    }

    fn begin_session(&mut self, _view_configuration: ViewConfigurationType) -> RuntimeResult<()> {
        self.record("begin_session");
        if self.fail_begin_session {
            return Err(RuntimeError::call("xrBeginSession", -1));
        }
        Ok(())
    }

    fn end_session(&mut self) -> RuntimeResult<()> {
        self.record("end_session");
        Ok(())
    }

    fn request_exit_session(&mut self) -> RuntimeResult<()> {
        self.record("request_exit_session");
        self.push_state(SessionState::Stopping);
        self.push_state(SessionState::Idle);
        self.push_state(SessionState::Exiting);
        Ok(())
    }

    fn enumerate_view_configurations(&self) -> RuntimeResult<Vec<ViewConfigurationType>> {
        Ok(self.config.view_configurations.clone())
    }

    fn view_configuration_views(
        &self,
        _view_configuration: ViewConfigurationType,
    ) -> RuntimeResult<Vec<ViewConfigurationView>> {
        Ok(self.config.views.clone())
    }

    fn enumerate_blend_modes(
        &self,
        _view_configuration: ViewConfigurationType,
    ) -> RuntimeResult<Vec<EnvironmentBlendMode>> {
        Ok(self.config.blend_modes.clone())
    }

    fn enumerate_reference_spaces(&self) -> RuntimeResult<Vec<ReferenceSpaceType>> {
        Ok(self.config.reference_spaces.clone())
    }

    fn create_reference_space(
        &mut self,
        space_type: ReferenceSpaceType,
        pose: Posef,
    ) -> RuntimeResult<SpaceId> {
        self.record("create_reference_space");
        let id = self.next_id();
        self.live_spaces.insert(id);
        self.space_poses.push((space_type, pose));
        Ok(SpaceId(id))
    }

    fn destroy_space(&mut self, space: SpaceId) -> RuntimeResult<()> {
        self.record("destroy_space");
        if self.live_spaces.remove(&space.0) {
            Ok(())
        } else {
            Err(RuntimeError::UnknownSpace(space))
        }
    }

    fn enumerate_swapchain_formats(&self) -> RuntimeResult<Vec<i64>> {
        Ok(self.config.formats.clone())
    }

    fn create_swapchain(&mut self, info: &SwapchainCreateInfo) -> RuntimeResult<SwapchainId> {
        let id = self.next_id();
        self.record(format!("create_swapchain:{}", id));
        self.swapchain_infos.push(*info);
        self.live_swapchains.insert(id);
        Ok(SwapchainId(id))
    }

    fn enumerate_swapchain_images(&mut self, swapchain: SwapchainId) -> RuntimeResult<Vec<vk::Image>> {
        self.record(format!("enumerate_swapchain_images:{}", swapchain.0));
        if !self.live_swapchains.contains(&swapchain.0) {
            return Err(RuntimeError::UnknownSwapchain(swapchain));
        }
        self.image_data.insert(swapchain.0);
        Ok((0..self.config.images_per_swapchain as u64)
            .map(|i| vk::Image::from_raw(0x9000 + swapchain.0 * 0x100 + i))
            .collect())
    }

    fn free_swapchain_image_data(&mut self, swapchain: SwapchainId) {
        self.record(format!("free_swapchain_image_data:{}", swapchain.0));
        if !self.image_data.remove(&swapchain.0) {
            self.violations.push(format!("image data for {} freed twice", swapchain.0));
        }
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainId) -> RuntimeResult<()> {
        self.record(format!("destroy_swapchain:{}", swapchain.0));
        if self.image_data.contains(&swapchain.0) {
            self.violations.push(format!("swapchain {} destroyed before its image data", swapchain.0));
        }
        if self.live_swapchains.remove(&swapchain.0) {
            Ok(())
        } else {
            Err(RuntimeError::UnknownSwapchain(swapchain))
        }
    }

    fn acquire_swapchain_image(&mut self, swapchain: SwapchainId) -> RuntimeResult<u32> {
        self.record(format!("acquire:{}", swapchain.0));
        let images = self.config.images_per_swapchain.max(1) as u32;
        let counter = self.acquired.entry(swapchain.0).or_insert(0);
        // Start at the last image so indices are visibly runtime-chosen
        let index = (images - 1 + *counter) % images;
        *counter += 1;
        *self.unwaited.entry(swapchain.0).or_insert(0) += 1;
        Ok(index)
    }

    fn wait_swapchain_image(&mut self, swapchain: SwapchainId, _timeout_ns: i64) -> RuntimeResult<()> {
        self.record(format!("wait_image:{}", swapchain.0));
        if self.fail_wait_image == Some(swapchain.0) {
            return Err(RuntimeError::call("xrWaitSwapchainImage", -5));
        }
        let unwaited = self.unwaited.entry(swapchain.0).or_insert(0);
        if *unwaited == 0 {
            self.violations.push(format!("wait without acquire on {}", swapchain.0));
        } else {
            *unwaited -= 1;
            *self.outstanding.entry(swapchain.0).or_insert(0) += 1;
        }
        Ok(())
    }

    fn release_swapchain_image(&mut self, swapchain: SwapchainId) -> RuntimeResult<()> {
        self.record(format!("release:{}", swapchain.0));
        let outstanding = self.outstanding.entry(swapchain.0).or_insert(0);
        if *outstanding > 0 {
            *outstanding -= 1;
        } else if self.unwaited.get(&swapchain.0).is_some_and(|n| *n > 0) {
            self.violations.push(format!("release of unwaited image on {}", swapchain.0));
        } else {
            self.violations.push(format!("release without acquire on {}", swapchain.0));
        }
        Ok(())
    }

    fn wait_frame(&mut self) -> RuntimeResult<FrameState> {
        self.record("wait_frame");
        if self.fail_wait_frame {
            return Err(RuntimeError::call("xrWaitFrame", -2));
        }
        self.time += 11_111_111;
        Ok(FrameState {
            predicted_display_time: Time(self.time),
            predicted_display_period_ns: 11_111_111,
            should_render: self.should_render,
        })
    }

    fn begin_frame(&mut self) -> RuntimeResult<()> {
        self.record("begin_frame");
        if self.in_frame {
            self.violations.push("begin_frame twice without end_frame".to_string());
        }
        self.in_frame = true;
        Ok(())
    }

    fn locate_views(
        &mut self,
        _view_configuration: ViewConfigurationType,
        _display_time: Time,
        space: SpaceId,
        capacity: usize,
    ) -> RuntimeResult<Vec<View>> {
        self.record("locate_views");
        if self.fail_locate {
            return Err(RuntimeError::call("xrLocateViews", -3));
        }
        if !self.live_spaces.contains(&space.0) {
            return Err(RuntimeError::UnknownSpace(space));
        }
        Ok(self.located.iter().copied().take(capacity).collect())
    }

    fn end_frame(&mut self, info: &FrameEndInfo) -> RuntimeResult<()> {
        self.record("end_frame");
        if !self.in_frame {
            self.violations.push("end_frame without begin_frame".to_string());
        }
        self.in_frame = false;
        if self.outstanding.values().any(|n| *n > 0) {
            self.violations.push("end_frame with images still acquired".to_string());
        }
        self.end_frames.push(info.clone());
        let ended = self.end_frames.len();
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.events_after_frame)
            .into_iter()
            .partition(|(after, _)| *after <= ended);
        self.events_after_frame = later;
        self.events.extend(due.into_iter().map(|(_, event)| event));
        if self.fail_end_frame {
            return Err(RuntimeError::call("xrEndFrame", -4));
        }
        Ok(())
    }
}

// ── Submitter ───────────────────────────────────────────────

pub struct MockSubmitter {
    pub log: CallLog,
    pub fail_begin: bool,
    /// Number of upcoming submits that fail
    pub failing_submits: u32,
}

impl MockSubmitter {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail_begin: false,
            failing_submits: 0,
        }
    }
}

pub const COMMAND_BUFFER: u64 = 0xc0ffee;

impl CommandSubmitter for MockSubmitter {
    fn begin(&mut self) -> VkResult<vk::CommandBuffer> {
        self.log.borrow_mut().push("cmd_begin".to_string());
        if self.fail_begin {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        Ok(vk::CommandBuffer::from_raw(COMMAND_BUFFER))
    }

    fn submit(&mut self, _command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.log.borrow_mut().push("cmd_submit".to_string());
        if self.failing_submits > 0 {
            self.failing_submits -= 1;
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────

pub fn stereo_views() -> Vec<ViewConfigurationView> {
    vec![
        ViewConfigurationView {
            recommended_image_rect_width: 1440,
            max_image_rect_width: 2880,
            recommended_image_rect_height: 1600,
            max_image_rect_height: 3200,
            recommended_swapchain_sample_count: 4,
            max_swapchain_sample_count: 4,
        };
        2
    ]
}

pub fn located_view(x: f32) -> View {
    View {
        pose: Posef {
            orientation: Quatf::IDENTITY,
            position: Vec3f { x, y: 1.6, z: 0.0 },
        },
        fov: Fovf {
            angle_left: -0.8,
            angle_right: 0.7,
            angle_up: 0.75,
            angle_down: -0.85,
        },
    }
}

pub fn state_event(session: SessionId, state: SessionState) -> RuntimeEvent {
    RuntimeEvent::SessionStateChanged {
        session,
        state,
        time: Time(0),
    }
}

pub fn test_config() -> XrgsConfig {
    let mut config = XrgsConfig::default();
    config.render.idle_poll_ms = 0;
    config
}
