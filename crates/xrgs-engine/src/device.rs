use std::ffi::{c_char, CStr, CString};

use ash::prelude::VkResult;
use ash::vk;
use tracing::{debug, info, warn};

use xrgs_core::XrgsConfig;

use crate::error::DeviceError;
use crate::gpu::{GpuApi, MemoryProperties};
use crate::runtime::RuntimeGraphicsBinding;
use crate::warning::{Fallback, FallbackWarning};

/// Device features gated behind an optional extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFeature {
    MeshShader,
    FragmentShaderBarycentric,
}

/// An extension enabled only when the device exposes it, optionally turning
/// on the feature it guards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalExtension {
    pub name: String,
    pub feature: Option<DeviceFeature>,
}

impl OptionalExtension {
    pub fn new(name: &CStr) -> Self {
        Self {
            name: name.to_string_lossy().into_owned(),
            feature: None,
        }
    }

    pub fn with_feature(name: &CStr, feature: DeviceFeature) -> Self {
        Self {
            name: name.to_string_lossy().into_owned(),
            feature: Some(feature),
        }
    }
}

/// Everything the bootstrap needs besides what an XR runtime dictates.
#[derive(Debug, Clone)]
pub struct DeviceRequest {
    pub app_name: String,
    pub app_version: u32,
    pub api_version: u32,
    pub instance_extensions: Vec<String>,
    pub optional_instance_extensions: Vec<String>,
    pub device_extensions: Vec<String>,
    pub optional_device_extensions: Vec<OptionalExtension>,
}

impl DeviceRequest {
    pub fn from_config(config: &XrgsConfig) -> Self {
        let mut optional_instance_extensions = Vec::new();
        if config.device.validation {
            optional_instance_extensions.push(ash::ext::debug_utils::NAME.to_string_lossy().into_owned());
        }

        let mut optional_device_extensions = Vec::new();
        if config.device.mesh_shader {
            optional_device_extensions.push(OptionalExtension::with_feature(
                ash::ext::mesh_shader::NAME,
                DeviceFeature::MeshShader,
            ));
        }
        if config.device.fragment_shader_barycentric {
            optional_device_extensions.push(OptionalExtension::with_feature(
                ash::khr::fragment_shader_barycentric::NAME,
                DeviceFeature::FragmentShaderBarycentric,
            ));
        }

        Self {
            app_name: config.app.name.clone(),
            app_version: config.app.version,
            api_version: vk::make_api_version(0, config.device.api_major, config.device.api_minor, 0),
            instance_extensions: Vec::new(),
            optional_instance_extensions,
            device_extensions: Vec::new(),
            optional_device_extensions,
        }
    }
}

/// Split a runtime-provided, space-separated extension list.
pub fn parse_extension_list(list: &str) -> Vec<String> {
    list.split_whitespace().map(str::to_string).collect()
}

/// Intersect requested extensions with what is available. Every missing
/// required name is reported at once; missing optional names are skipped.
pub fn resolve_extensions(
    available: &[String],
    required: &[String],
    optional: &[String],
) -> Result<Vec<String>, DeviceError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !available.contains(name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(DeviceError::MissingExtensions(missing));
    }

    let mut enabled: Vec<String> = Vec::new();
    for name in required {
        if !enabled.contains(name) {
            enabled.push(name.clone());
        }
    }
    for name in optional {
        if !available.contains(name) {
            info!("optional extension {} not available, skipping", name);
            continue;
        }
        if !enabled.contains(name) {
            enabled.push(name.clone());
        }
    }
    Ok(enabled)
}

/// Pick the runtime-designated device when it is enumerated, otherwise the
/// first enumerated device with a warning.
pub fn select_physical_device(
    enumerated: &[vk::PhysicalDevice],
    designated: Option<vk::PhysicalDevice>,
) -> Result<Fallback<vk::PhysicalDevice>, DeviceError> {
    let first = *enumerated.first().ok_or(DeviceError::NoPhysicalDevice)?;
    match designated {
        None => Ok(Fallback::exact(first)),
        Some(designated) if enumerated.contains(&designated) => Ok(Fallback::exact(designated)),
        Some(designated) => Ok(Fallback::fallback(
            first,
            FallbackWarning::PhysicalDeviceNotDesignated {
                designated,
                used: first,
            },
        )),
    }
}

/// Index of the first queue family that supports graphics.
pub fn select_graphics_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
}

fn extension_names(props: &[vk::ExtensionProperties]) -> Vec<String> {
    props
        .iter()
        .map(|p| unsafe { CStr::from_ptr(p.extension_name.as_ptr()) }.to_string_lossy().into_owned())
        .collect()
}

fn to_cstrings(names: &[String]) -> Vec<CString> {
    names.iter().filter_map(|name| CString::new(name.as_str()).ok()).collect()
}

fn vk_err(call: &'static str) -> impl Fn(vk::Result) -> DeviceError {
    move |result| DeviceError::Vulkan { call, result }
}

/// Vulkan instance, device and queue, created together and destroyed
/// together: device first, then instance.
pub struct VulkanDevice {
    entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queue: vk::Queue,
    queue_family_index: u32,
    memory_properties: MemoryProperties,
    device_name: String,
    api_version: u32,
    enabled_instance_extensions: Vec<String>,
    enabled_device_extensions: Vec<String>,
    enabled_features: Vec<DeviceFeature>,
}

impl VulkanDevice {
    /// Bootstrap the device. With a runtime binding, the runtime's API
    /// version floor, extension lists and designated physical device apply;
    /// its extensions are treated as required.
    pub fn create(
        request: &DeviceRequest,
        binding: Option<&dyn RuntimeGraphicsBinding>,
    ) -> Result<Fallback<Self>, DeviceError> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| DeviceError::Loader(e.to_string()))?;
        info!("Vulkan entry loaded successfully");

        let mut api_version = request.api_version;
        let mut required_instance = request.instance_extensions.clone();
        let mut required_device = request.device_extensions.clone();
        if let Some(binding) = binding {
            api_version = api_version.max(binding.min_vulkan_version()?);
            required_instance.extend(parse_extension_list(&binding.vulkan_instance_extensions()?));
            required_device.extend(parse_extension_list(&binding.vulkan_device_extensions()?));
        }

        // ── Instance ────────────────────────────────────────
        let available = unsafe { entry.enumerate_instance_extension_properties(None) }
            .map_err(vk_err("vkEnumerateInstanceExtensionProperties"))?;
        let enabled_instance_extensions = resolve_extensions(
            &extension_names(&available),
            &required_instance,
            &request.optional_instance_extensions,
        )?;
        let instance_ext_names = to_cstrings(&enabled_instance_extensions);
        let instance_ext_ptrs: Vec<*const c_char> = instance_ext_names.iter().map(|s| s.as_ptr()).collect();

        let app_name = CString::new(request.app_name.as_str()).unwrap_or_else(|_| CString::from(c"xrgs"));
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(request.app_version)
            .engine_name(c"xrgs")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(api_version);
        let instance_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&instance_ext_ptrs);

        let instance = unsafe { entry.create_instance(&instance_info, None) }
            .map_err(vk_err("vkCreateInstance"))?;
        info!(
            "created Vulkan instance (API {}.{}, {} extensions)",
            vk::api_version_major(api_version),
            vk::api_version_minor(api_version),
            enabled_instance_extensions.len()
        );

        match Self::create_device(&instance, request, binding, required_device) {
            Ok(parts) => {
                let DeviceParts {
                    physical_device,
                    device,
                    queue,
                    queue_family_index,
                    memory_properties,
                    device_name,
                    enabled_device_extensions,
                    enabled_features,
                    warning,
                } = parts;
                let ctx = Self {
                    entry,
                    instance,
                    physical_device,
                    device,
                    queue,
                    queue_family_index,
                    memory_properties,
                    device_name,
                    api_version,
                    enabled_instance_extensions,
                    enabled_device_extensions,
                    enabled_features,
                };
                Ok(Fallback {
                    value: ctx,
                    warning,
                })
            }
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                Err(e)
            }
        }
    }

    fn create_device(
        instance: &ash::Instance,
        request: &DeviceRequest,
        binding: Option<&dyn RuntimeGraphicsBinding>,
        required_device: Vec<String>,
    ) -> Result<DeviceParts, DeviceError> {
        // ── Physical device ─────────────────────────────────
        let enumerated = unsafe { instance.enumerate_physical_devices() }
            .map_err(vk_err("vkEnumeratePhysicalDevices"))?;
        let designated = match binding {
            Some(binding) => Some(binding.vulkan_physical_device(instance.handle())?),
            None => None,
        };
        let selection = select_physical_device(&enumerated, designated)?;
        let physical_device = selection.value;

        let props = unsafe { instance.get_physical_device_properties(physical_device) };
        let device_name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        info!("using physical device: {}", device_name);

        let families = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let queue_family_index =
            select_graphics_queue_family(&families).ok_or(DeviceError::NoGraphicsQueue)?;
        debug!("graphics queue family: {}", queue_family_index);

        // ── Extensions and features ─────────────────────────
        let available = unsafe { instance.enumerate_device_extension_properties(physical_device) }
            .map_err(vk_err("vkEnumerateDeviceExtensionProperties"))?;
        let optional_names: Vec<String> = request
            .optional_device_extensions
            .iter()
            .map(|ext| ext.name.clone())
            .collect();
        let enabled_device_extensions =
            resolve_extensions(&extension_names(&available), &required_device, &optional_names)?;
        let enabled_features: Vec<DeviceFeature> = request
            .optional_device_extensions
            .iter()
            .filter(|ext| enabled_device_extensions.contains(&ext.name))
            .filter_map(|ext| ext.feature)
            .collect();

        let device_ext_names = to_cstrings(&enabled_device_extensions);
        let device_ext_ptrs: Vec<*const c_char> = device_ext_names.iter().map(|s| s.as_ptr()).collect();

        let mut mesh_shader = vk::PhysicalDeviceMeshShaderFeaturesEXT::default().mesh_shader(true);
        let mut barycentric =
            vk::PhysicalDeviceFragmentShaderBarycentricFeaturesKHR::default().fragment_shader_barycentric(true);

        let priorities = [1.0f32];
        let queue_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&priorities);
        let mut device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_info))
            .enabled_extension_names(&device_ext_ptrs);
        if enabled_features.contains(&DeviceFeature::MeshShader) {
            device_info = device_info.push_next(&mut mesh_shader);
        }
        if enabled_features.contains(&DeviceFeature::FragmentShaderBarycentric) {
            device_info = device_info.push_next(&mut barycentric);
        }

        let device = unsafe { instance.create_device(physical_device, &device_info, None) }
            .map_err(vk_err("vkCreateDevice"))?;
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };
        let memory_properties = MemoryProperties::from_vk(&unsafe {
            instance.get_physical_device_memory_properties(physical_device)
        });

        info!(
            "created Vulkan device ({} extensions, features {:?})",
            enabled_device_extensions.len(),
            enabled_features
        );

        Ok(DeviceParts {
            physical_device,
            device,
            queue,
            queue_family_index,
            memory_properties,
            device_name,
            enabled_device_extensions,
            enabled_features,
            warning: selection.warning,
        })
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Queue index within the family; only one queue is ever created.
    pub fn queue_index(&self) -> u32 {
        0
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn enabled_instance_extensions(&self) -> &[String] {
        &self.enabled_instance_extensions
    }

    pub fn enabled_device_extensions(&self) -> &[String] {
        &self.enabled_device_extensions
    }

    pub fn enabled_features(&self) -> &[DeviceFeature] {
        &self.enabled_features
    }
}

struct DeviceParts {
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queue: vk::Queue,
    queue_family_index: u32,
    memory_properties: MemoryProperties,
    device_name: String,
    enabled_device_extensions: Vec<String>,
    enabled_features: Vec<DeviceFeature>,
    warning: Option<FallbackWarning>,
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                warn!("device wait idle before destroy failed: {:?}", e);
            }
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        info!("Vulkan device and instance destroyed");
    }
}

impl GpuApi for VulkanDevice {
    fn memory_properties(&self) -> &MemoryProperties {
        &self.memory_properties
    }

    fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image> {
        unsafe { self.device.create_image(info, None) }
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.device.get_image_memory_requirements(image) }
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory> {
        unsafe { self.device.allocate_memory(info, None) }
    }

    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        unsafe { self.device.bind_image_memory(image, memory, offset) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) }
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        unsafe { self.device.create_image_view(info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> VkResult<vk::Sampler> {
        unsafe { self.device.create_sampler(info, None) }
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { self.device.destroy_sampler(sampler, None) }
    }
}
