use std::ffi::CStr;

use ash::vk;
use serde::Serialize;

use xrgs_common::platform::{
    openxr_loader_name, platform_name, vulkan_loader_name, xr_runtime_override, XR_RUNTIME_ENV,
};
use xrgs_core::config::XrgsConfig;
use xrgs_engine::device::{DeviceRequest, VulkanDevice};
use xrgs_engine::error::DeviceError;
use xrgs_engine::GpuApi;

// ── Check result types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.to_string(),
            details: Vec::new(),
        }
    }

    fn pass(name: &str, message: &str) -> Self {
        Self::new(name, CheckStatus::Pass, message)
    }

    fn fail(name: &str, message: &str) -> Self {
        Self::new(name, CheckStatus::Fail, message)
    }

    fn warn(name: &str, message: &str) -> Self {
        Self::new(name, CheckStatus::Warn, message)
    }

    fn skip(name: &str, message: &str) -> Self {
        Self::new(name, CheckStatus::Skip, message)
    }

    fn detail(mut self, detail: &str) -> Self {
        self.details.push(detail.to_string());
        self
    }
}

// ── Main entry point ────────────────────────────────────────────────────────

pub fn run_probe(config_path: &str, json: bool) -> anyhow::Result<()> {
    let mut results: Vec<CheckResult> = Vec::new();

    let config = check_config(config_path, &mut results);
    let request = DeviceRequest::from_config(&config);

    match check_device(&request, &mut results) {
        Some(device) => {
            check_physical_devices(&device, &mut results);
            check_optional_extensions(&device, &request, &mut results);
            check_memory_types(&device, &mut results);
        }
        None => {
            for name in ["Physical devices", "Optional extensions", "Memory types"] {
                results.push(CheckResult::skip(name, "No device, nothing to inspect"));
            }
        }
    }

    check_xr_runtime(&config, &mut results);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results_pretty(&results);
    }

    if results.iter().any(|r| matches!(r.status, CheckStatus::Fail)) {
        std::process::exit(1);
    }

    Ok(())
}

// ── Configuration ───────────────────────────────────────────────────────────

fn check_config(config_path: &str, results: &mut Vec<CheckResult>) -> XrgsConfig {
    if !std::path::Path::new(config_path).exists() {
        results.push(
            CheckResult::warn("Configuration", &format!("Config file not found: {}", config_path))
                .detail("Using default configuration"),
        );
        return XrgsConfig::default();
    }

    match XrgsConfig::load(config_path) {
        Ok(config) => {
            results.push(
                CheckResult::pass("Configuration", &format!("Loaded {}", config_path))
                    .detail(&format!("View configurations: {:?}", config.xr.view_configurations))
                    .detail(&format!("Blend modes: {:?}", config.xr.blend_modes))
                    .detail(&format!("Format order: {:?}", config.xr.format_order)),
            );
            config
        }
        Err(e) => {
            results.push(
                CheckResult::fail("Configuration", &format!("Cannot load {}", config_path))
                    .detail(&e.to_string()),
            );
            XrgsConfig::default()
        }
    }
}

// ── Vulkan device ───────────────────────────────────────────────────────────

fn check_device(request: &DeviceRequest, results: &mut Vec<CheckResult>) -> Option<VulkanDevice> {
    match VulkanDevice::create(request, None) {
        Ok(created) => {
            let device = created.value;
            let api = device.api_version();
            let mut result = CheckResult::pass(
                "Vulkan device",
                &format!("Created device on {}", device.device_name()),
            )
            .detail(&format!(
                "API version: {}.{}",
                vk::api_version_major(api),
                vk::api_version_minor(api)
            ))
            .detail(&format!("Graphics queue family: {}", device.queue_family_index()))
            .detail(&format!(
                "Instance extensions: {}",
                list_or_none(device.enabled_instance_extensions())
            ))
            .detail(&format!(
                "Device extensions: {}",
                list_or_none(device.enabled_device_extensions())
            ));
            if let Some(warning) = created.warning {
                result.status = CheckStatus::Warn;
                result = result.detail(&warning.to_string());
            }
            results.push(result);
            Some(device)
        }
        Err(DeviceError::Loader(e)) => {
            results.push(
                CheckResult::fail("Vulkan device", "Vulkan loader not found")
                    .detail(&e)
                    .detail(&format!(
                        "Expected {} on {}",
                        vulkan_loader_name(),
                        platform_name()
                    )),
            );
            None
        }
        Err(DeviceError::MissingExtensions(missing)) => {
            let mut result = CheckResult::fail("Vulkan device", "Required extensions missing");
            for name in &missing {
                result = result.detail(name);
            }
            results.push(result);
            None
        }
        Err(e) => {
            results.push(CheckResult::fail("Vulkan device", &e.to_string()));
            None
        }
    }
}

fn check_physical_devices(device: &VulkanDevice, results: &mut Vec<CheckResult>) {
    let instance = device.instance();
    let enumerated = match unsafe { instance.enumerate_physical_devices() } {
        Ok(list) => list,
        Err(e) => {
            results.push(CheckResult::fail(
                "Physical devices",
                &format!("vkEnumeratePhysicalDevices failed: {:?}", e),
            ));
            return;
        }
    };

    let mut result = CheckResult::pass(
        "Physical devices",
        &format!("{} device(s) enumerated", enumerated.len()),
    );
    for (i, pd) in enumerated.iter().enumerate() {
        let props = unsafe { instance.get_physical_device_properties(*pd) };
        let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }.to_string_lossy();
        let marker = if *pd == device.physical_device() { " (selected)" } else { "" };
        result = result.detail(&format!(
            "GPU {}: {} [{:?}]{}",
            i, name, props.device_type, marker
        ));
    }
    results.push(result);
}

fn check_optional_extensions(
    device: &VulkanDevice,
    request: &DeviceRequest,
    results: &mut Vec<CheckResult>,
) {
    if request.optional_device_extensions.is_empty() {
        results.push(CheckResult::skip(
            "Optional extensions",
            "No optional device features requested",
        ));
        return;
    }

    let enabled = device.enabled_device_extensions();
    let missing: Vec<&str> = request
        .optional_device_extensions
        .iter()
        .filter(|ext| !enabled.contains(&ext.name))
        .map(|ext| ext.name.as_str())
        .collect();

    if missing.is_empty() {
        results.push(
            CheckResult::pass("Optional extensions", "All optional device features enabled")
                .detail(&format!("Features: {:?}", device.enabled_features())),
        );
    } else {
        let mut result = CheckResult::warn(
            "Optional extensions",
            &format!("{} optional extension(s) unavailable", missing.len()),
        );
        for name in missing {
            result = result.detail(&format!("Skipped: {}", name));
        }
        results.push(result);
    }
}

fn check_memory_types(device: &VulkanDevice, results: &mut Vec<CheckResult>) {
    let props = device.memory_properties();
    if props
        .find_memory_type(u32::MAX, vk::MemoryPropertyFlags::DEVICE_LOCAL)
        .is_none()
    {
        results.push(CheckResult::fail(
            "Memory types",
            "No device-local memory type; images cannot be allocated",
        ));
        return;
    }

    let mut result = CheckResult::pass(
        "Memory types",
        &format!("{} memory types", props.memory_types.len()),
    );
    for (i, ty) in props.memory_types.iter().enumerate() {
        result = result.detail(&format!("Type {}: heap {}, {:?}", i, ty.heap_index, ty.property_flags));
    }
    results.push(result);
}

// ── OpenXR runtime ──────────────────────────────────────────────────────────

#[cfg(feature = "xr")]
fn check_xr_runtime(config: &XrgsConfig, results: &mut Vec<CheckResult>) {
    use xrgs_engine::openxr_runtime::OpenXrInstance;

    let manifest = match xr_runtime_override() {
        Some(path) => format!("{} = {}", XR_RUNTIME_ENV, path),
        None => format!("{} not set, using the active runtime", XR_RUNTIME_ENV),
    };

    match OpenXrInstance::new(config) {
        Ok(_) => results.push(
            CheckResult::pass("OpenXR runtime", "Instance created and head-mounted system found")
                .detail(&manifest),
        ),
        Err(e) => results.push(
            CheckResult::warn("OpenXR runtime", &e.to_string())
                .detail(&manifest)
                .detail(&format!("Loader: {}", openxr_loader_name()))
                .detail("Start the runtime and connect a headset before `xrgs run`"),
        ),
    }
}

#[cfg(not(feature = "xr"))]
fn check_xr_runtime(_config: &XrgsConfig, results: &mut Vec<CheckResult>) {
    let mut result = CheckResult::skip("OpenXR runtime", "Built without the `xr` feature")
        .detail(&format!("Loader: {}", openxr_loader_name()));
    if let Some(path) = xr_runtime_override() {
        result = result.detail(&format!("{} = {}", XR_RUNTIME_ENV, path));
    }
    results.push(result);
}

// ── Output ──────────────────────────────────────────────────────────────────

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

fn print_results_pretty(results: &[CheckResult]) {
    println!();
    println!("XRGS Probe");
    println!("==========");
    println!();

    let mut pass_count = 0u32;
    let mut fail_count = 0u32;
    let mut warn_count = 0u32;

    for result in results {
        let (icon, color_start, color_end) = match result.status {
            CheckStatus::Pass => {
                pass_count += 1;
                ("[PASS]", "\x1b[32m", "\x1b[0m")
            }
            CheckStatus::Fail => {
                fail_count += 1;
                ("[FAIL]", "\x1b[31m", "\x1b[0m")
            }
            CheckStatus::Warn => {
                warn_count += 1;
                ("[WARN]", "\x1b[33m", "\x1b[0m")
            }
            CheckStatus::Skip => ("[SKIP]", "\x1b[90m", "\x1b[0m"),
        };

        println!(
            "  {}{}{} {} - {}",
            color_start, icon, color_end, result.name, result.message
        );
        for detail in &result.details {
            println!("         {}", detail);
        }
        println!();
    }

    println!("----------");
    println!(
        "  {} passed, {} failed, {} warnings",
        pass_count, fail_count, warn_count
    );
    println!();
}
