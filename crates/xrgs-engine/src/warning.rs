use ash::vk;

use xrgs_protocol::xr::{EnvironmentBlendMode, ReferenceSpaceType, ViewConfigurationType};

/// A startup choice that had to fall back to something other than what was
/// asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackWarning {
    PhysicalDeviceNotDesignated {
        designated: vk::PhysicalDevice,
        used: vk::PhysicalDevice,
    },
    ViewConfigurationUnsupported {
        requested: Vec<ViewConfigurationType>,
        used: ViewConfigurationType,
    },
    BlendModeUnsupported {
        requested: Vec<EnvironmentBlendMode>,
        used: EnvironmentBlendMode,
    },
    ReferenceSpaceUnsupported {
        requested: Vec<ReferenceSpaceType>,
        used: ReferenceSpaceType,
    },
    SwapchainFormatUnsupported {
        offered: Vec<i64>,
        used: vk::Format,
    },
}

impl std::fmt::Display for FallbackWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackWarning::PhysicalDeviceNotDesignated { designated, used } => write!(
                f,
                "runtime-designated physical device {:?} not enumerated, using {:?}",
                designated, used
            ),
            FallbackWarning::ViewConfigurationUnsupported { requested, used } => write!(
                f,
                "none of the view configurations {:?} supported, defaulting to {:?}",
                requested, used
            ),
            FallbackWarning::BlendModeUnsupported { requested, used } => write!(
                f,
                "none of the blend modes {:?} supported, defaulting to {:?}",
                requested, used
            ),
            FallbackWarning::ReferenceSpaceUnsupported { requested, used } => write!(
                f,
                "none of the reference spaces {:?} supported, defaulting to {:?}",
                requested, used
            ),
            FallbackWarning::SwapchainFormatUnsupported { offered, used } => write!(
                f,
                "no allowlisted swapchain format among {:?}, using {:?}",
                offered, used
            ),
        }
    }
}

/// A selected value plus the warning raised if it is not what was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct Fallback<T> {
    pub value: T,
    pub warning: Option<FallbackWarning>,
}

impl<T> Fallback<T> {
    pub fn exact(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn fallback(value: T, warning: FallbackWarning) -> Self {
        tracing::warn!("{}", warning);
        Self {
            value,
            warning: Some(warning),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.warning.is_some()
    }

    /// Split off the warning into `sink` and keep the value.
    pub fn collect_into(self, sink: &mut Vec<FallbackWarning>) -> T {
        if let Some(warning) = self.warning {
            sink.push(warning);
        }
        self.value
    }
}
