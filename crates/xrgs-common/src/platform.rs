/// Environment variable the OpenXR loader reads to pick an active runtime manifest.
pub const XR_RUNTIME_ENV: &str = "XR_RUNTIME_JSON";

/// Returns the platform name string.
pub fn platform_name() -> &'static str {
    #[cfg(target_os = "windows")]
    { "windows" }
    #[cfg(target_os = "linux")]
    { "linux" }
    #[cfg(target_os = "macos")]
    { "macos" }
    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    { "unknown" }
}

/// Returns the Vulkan loader library name the platform resolves at runtime.
pub fn vulkan_loader_name() -> &'static str {
    #[cfg(windows)]
    { "vulkan-1.dll" }
    #[cfg(target_os = "macos")]
    { "libvulkan.1.dylib" }
    #[cfg(not(any(windows, target_os = "macos")))]
    { "libvulkan.so.1" }
}

/// Returns the OpenXR loader library name the platform resolves at runtime.
pub fn openxr_loader_name() -> &'static str {
    #[cfg(windows)]
    { "openxr_loader.dll" }
    #[cfg(target_os = "macos")]
    { "libopenxr_loader.dylib" }
    #[cfg(not(any(windows, target_os = "macos")))]
    { "libopenxr_loader.so.1" }
}

/// Returns the runtime manifest override, if one is set in the environment.
pub fn xr_runtime_override() -> Option<String> {
    std::env::var(XR_RUNTIME_ENV).ok().filter(|s| !s.is_empty())
}
