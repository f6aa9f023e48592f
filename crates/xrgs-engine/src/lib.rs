pub mod error;
pub mod warning;
pub mod gpu;
pub mod runtime;
pub mod device;
pub mod registry;
pub mod swapchain;
pub mod selection;
pub mod session;
pub mod camera;
pub mod render;
pub mod submit;
pub mod frame;
pub mod app;
#[cfg(feature = "openxr")]
pub mod openxr_runtime;

pub use app::XrApp;
pub use error::EngineError;
pub use gpu::GpuApi;
pub use registry::ResourceRegistry;
pub use runtime::XrRuntime;
pub use warning::{Fallback, FallbackWarning};
