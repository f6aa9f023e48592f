use ash::vk;

use xrgs_core::CoreError;
use xrgs_protocol::{ResourceHandle, RuntimeError};

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("failed to load Vulkan: {0}")]
    Loader(String),

    #[error("missing required extensions: {}", .0.join(", "))]
    MissingExtensions(Vec<String>),

    #[error("no physical devices available")]
    NoPhysicalDevice,

    #[error("no graphics queue family on the selected device")]
    NoGraphicsQueue,

    #[error("{call} failed: {result:?}")]
    Vulkan { call: &'static str, result: vk::Result },

    #[error("runtime graphics binding failed: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Registry failures. Where an image was already created before the failing
/// step, `partial` carries its handle; the record stays tracked so it can be
/// destroyed like any other.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("no device-local memory type matches type bits {type_bits:#x}")]
    NoCompatibleMemoryType {
        type_bits: u32,
        partial: ResourceHandle,
    },

    #[error("{call} failed: {result:?}")]
    Vulkan {
        call: &'static str,
        result: vk::Result,
        partial: Option<ResourceHandle>,
    },

    #[error("stale or unknown handle: {0}")]
    StaleHandle(ResourceHandle),

    #[error("image is owned by the runtime: {0}")]
    NotOwned(ResourceHandle),
}

impl RegistryError {
    /// Handle of the half-built resource left behind by a failed create.
    pub fn partial(&self) -> Option<ResourceHandle> {
        match self {
            RegistryError::NoCompatibleMemoryType { partial, .. } => Some(*partial),
            RegistryError::Vulkan { partial, .. } => *partial,
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SwapchainError {
    #[error("runtime offered no swapchain formats")]
    NoFormats,

    #[error("runtime reported no views for the view configuration")]
    NoViews,

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session begin failed: {0}")]
    BeginFailed(RuntimeError),

    #[error("event poll failed: {0}")]
    Poll(RuntimeError),
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame wait failed: {0}")]
    Wait(RuntimeError),

    #[error("frame begin failed: {0}")]
    Begin(RuntimeError),

    #[error("frame end failed: {0}")]
    End(RuntimeError),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Swapchain(#[from] SwapchainError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Config(#[from] CoreError),
}

impl EngineError {
    /// Fatal errors end the run; everything else is absorbed by the caller
    /// after logging.
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::Device(_)
            | EngineError::Swapchain(_)
            | EngineError::Config(_)
            | EngineError::Runtime(_) => true,
            EngineError::Session(e) => matches!(e, SessionError::BeginFailed(_)),
            EngineError::Registry(_) | EngineError::Frame(_) => false,
        }
    }
}
