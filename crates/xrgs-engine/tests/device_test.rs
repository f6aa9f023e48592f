//! Integration test: device bootstrap helpers and startup selections
//!
//! Everything here runs without a Vulkan driver: extension resolution,
//! physical device and queue family choice, memory type lookup, and the
//! view configuration / blend mode / reference space fallbacks.

use ash::vk::{self, Handle};

use xrgs_core::XrgsConfig;
use xrgs_engine::device::{
    parse_extension_list, resolve_extensions, select_graphics_queue_family,
    select_physical_device, DeviceFeature, DeviceRequest,
};
use xrgs_engine::error::DeviceError;
use xrgs_engine::gpu::MemoryProperties;
use xrgs_engine::selection::{
    select_blend_mode, select_reference_space, select_view_configuration, DEFAULT_BLEND_MODE,
    DEFAULT_REFERENCE_SPACE, DEFAULT_VIEW_CONFIGURATION,
};
use xrgs_engine::warning::FallbackWarning;
use xrgs_protocol::xr::{EnvironmentBlendMode, ReferenceSpaceType, ViewConfigurationType};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_parse_runtime_extension_list() {
    let parsed = parse_extension_list("VK_KHR_external_memory  VK_KHR_dedicated_allocation\tVK_KHR_timeline_semaphore ");
    assert_eq!(
        parsed,
        names(&[
            "VK_KHR_external_memory",
            "VK_KHR_dedicated_allocation",
            "VK_KHR_timeline_semaphore"
        ])
    );
    assert!(parse_extension_list("").is_empty());
}

#[test]
fn test_missing_required_extensions_all_reported() {
    let available = names(&["VK_KHR_swapchain"]);
    let required = names(&["VK_KHR_swapchain", "VK_KHR_a", "VK_KHR_b"]);

    match resolve_extensions(&available, &required, &[]) {
        Err(DeviceError::MissingExtensions(missing)) => {
            assert_eq!(missing, names(&["VK_KHR_a", "VK_KHR_b"]));
        }
        other => panic!("expected MissingExtensions, got {:?}", other),
    }
}

#[test]
fn test_optional_extensions_skipped_when_absent() {
    let available = names(&["VK_KHR_swapchain", "VK_EXT_mesh_shader"]);
    let required = names(&["VK_KHR_swapchain", "VK_KHR_swapchain"]);
    let optional = names(&["VK_EXT_mesh_shader", "VK_KHR_fragment_shader_barycentric", "VK_KHR_swapchain"]);

    let enabled = resolve_extensions(&available, &required, &optional).unwrap();
    // Duplicates collapse, required names come first
    assert_eq!(enabled, names(&["VK_KHR_swapchain", "VK_EXT_mesh_shader"]));
}

#[test]
fn test_designated_physical_device_used_when_enumerated() {
    let devices = [vk::PhysicalDevice::from_raw(1), vk::PhysicalDevice::from_raw(2)];

    let chosen = select_physical_device(&devices, Some(devices[1])).unwrap();
    assert_eq!(chosen.value, devices[1]);
    assert!(!chosen.is_fallback());

    let chosen = select_physical_device(&devices, None).unwrap();
    assert_eq!(chosen.value, devices[0]);
    assert!(!chosen.is_fallback());
}

#[test]
fn test_undesignated_physical_device_falls_back_to_first() {
    let devices = [vk::PhysicalDevice::from_raw(1), vk::PhysicalDevice::from_raw(2)];
    let designated = vk::PhysicalDevice::from_raw(9);

    let chosen = select_physical_device(&devices, Some(designated)).unwrap();
    assert_eq!(chosen.value, devices[0]);
    match chosen.warning {
        Some(FallbackWarning::PhysicalDeviceNotDesignated { designated: d, used }) => {
            assert_eq!(d, designated);
            assert_eq!(used, devices[0]);
        }
        other => panic!("expected PhysicalDeviceNotDesignated, got {:?}", other),
    }

    match select_physical_device(&[], Some(designated)) {
        Err(DeviceError::NoPhysicalDevice) => {}
        other => panic!("expected NoPhysicalDevice, got {:?}", other),
    }
}

#[test]
fn test_first_graphics_queue_family() {
    let family = |flags| vk::QueueFamilyProperties {
        queue_flags: flags,
        queue_count: 1,
        ..Default::default()
    };
    let families = [
        family(vk::QueueFlags::TRANSFER),
        family(vk::QueueFlags::COMPUTE),
        family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        family(vk::QueueFlags::GRAPHICS),
    ];
    assert_eq!(select_graphics_queue_family(&families), Some(2));
    assert_eq!(select_graphics_queue_family(&families[..2]), None);
}

#[test]
fn test_memory_type_lookup() {
    let props = MemoryProperties {
        memory_types: vec![
            vk::MemoryType {
                property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE,
                heap_index: 1,
            },
            vk::MemoryType {
                property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
                heap_index: 0,
            },
        ],
    };
    let local = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    assert_eq!(props.find_memory_type(0b11, local), Some(1));
    // Allowed bits exclude the only device-local type
    assert_eq!(props.find_memory_type(0b01, local), None);
    assert_eq!(props.find_memory_type(0b11, vk::MemoryPropertyFlags::empty()), Some(0));
}

#[test]
fn test_device_request_from_config() {
    let mut config = XrgsConfig::default();
    config.device.validation = true;
    config.device.fragment_shader_barycentric = false;
    let request = DeviceRequest::from_config(&config);

    assert_eq!(request.optional_instance_extensions, names(&["VK_EXT_debug_utils"]));
    assert_eq!(request.optional_device_extensions.len(), 1);
    assert_eq!(request.optional_device_extensions[0].name, "VK_EXT_mesh_shader");
    assert_eq!(request.optional_device_extensions[0].feature, Some(DeviceFeature::MeshShader));
    assert!(request.instance_extensions.is_empty());
    assert_eq!(vk::api_version_major(request.api_version), config.device.api_major);
    assert_eq!(vk::api_version_minor(request.api_version), config.device.api_minor);
}

#[test]
fn test_view_configuration_selection() {
    let supported = [ViewConfigurationType::PrimaryMono, ViewConfigurationType::PrimaryStereo];

    let chosen = select_view_configuration(&[ViewConfigurationType::PrimaryStereo], &supported);
    assert_eq!(chosen.value, ViewConfigurationType::PrimaryStereo);
    assert!(!chosen.is_fallback());

    let chosen = select_view_configuration(&[ViewConfigurationType::PrimaryStereo], &supported[..1]);
    assert_eq!(chosen.value, DEFAULT_VIEW_CONFIGURATION);
    assert!(chosen.is_fallback());
}

#[test]
fn test_blend_mode_preference_order() {
    let preferred = [EnvironmentBlendMode::AlphaBlend, EnvironmentBlendMode::Additive];
    let supported = [EnvironmentBlendMode::Opaque, EnvironmentBlendMode::Additive];

    let chosen = select_blend_mode(&preferred, &supported);
    assert_eq!(chosen.value, EnvironmentBlendMode::Additive);
    assert!(!chosen.is_fallback());

    let chosen = select_blend_mode(&[EnvironmentBlendMode::AlphaBlend], &supported);
    assert_eq!(chosen.value, DEFAULT_BLEND_MODE);
    match chosen.warning {
        Some(FallbackWarning::BlendModeUnsupported { requested, used }) => {
            assert_eq!(requested, vec![EnvironmentBlendMode::AlphaBlend]);
            assert_eq!(used, EnvironmentBlendMode::Opaque);
        }
        other => panic!("expected BlendModeUnsupported, got {:?}", other),
    }
}

#[test]
fn test_reference_space_fallback_collects_warning() {
    let mut warnings = Vec::new();
    let space = select_reference_space(&[ReferenceSpaceType::Stage], &[ReferenceSpaceType::View])
        .collect_into(&mut warnings);

    assert_eq!(space, DEFAULT_REFERENCE_SPACE);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].to_string().contains("Stage"));

    let space = select_reference_space(&[ReferenceSpaceType::View], &[ReferenceSpaceType::View])
        .collect_into(&mut warnings);
    assert_eq!(space, ReferenceSpaceType::View);
    assert_eq!(warnings.len(), 1);
}
