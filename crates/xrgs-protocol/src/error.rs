use crate::xr::{SpaceId, SwapchainId};

/// A failed call into the XR runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("{call} failed: code={code}")]
    CallFailed { call: &'static str, code: i32 },

    #[error("unknown swapchain: {0:?}")]
    UnknownSwapchain(SwapchainId),

    #[error("unknown space: {0:?}")]
    UnknownSpace(SpaceId),

    #[error("runtime unavailable: {0}")]
    Unavailable(String),
}

impl RuntimeError {
    pub fn call(call: &'static str, code: i32) -> Self {
        Self::CallFailed { call, code }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
