use tracing::info;

use xrgs_protocol::xr::{EnvironmentBlendMode, ReferenceSpaceType, ViewConfigurationType};

use crate::warning::{Fallback, FallbackWarning};

pub const DEFAULT_VIEW_CONFIGURATION: ViewConfigurationType = ViewConfigurationType::PrimaryStereo;
pub const DEFAULT_BLEND_MODE: EnvironmentBlendMode = EnvironmentBlendMode::Opaque;
pub const DEFAULT_REFERENCE_SPACE: ReferenceSpaceType = ReferenceSpaceType::Local;

/// First preferred value present in `supported`.
fn first_supported<T: Copy + PartialEq>(preferred: &[T], supported: &[T]) -> Option<T> {
    preferred.iter().copied().find(|value| supported.contains(value))
}

pub fn select_view_configuration(
    preferred: &[ViewConfigurationType],
    supported: &[ViewConfigurationType],
) -> Fallback<ViewConfigurationType> {
    match first_supported(preferred, supported) {
        Some(value) => {
            info!("view configuration: {:?}", value);
            Fallback::exact(value)
        }
        None => Fallback::fallback(
            DEFAULT_VIEW_CONFIGURATION,
            FallbackWarning::ViewConfigurationUnsupported {
                requested: preferred.to_vec(),
                used: DEFAULT_VIEW_CONFIGURATION,
            },
        ),
    }
}

pub fn select_blend_mode(
    preferred: &[EnvironmentBlendMode],
    supported: &[EnvironmentBlendMode],
) -> Fallback<EnvironmentBlendMode> {
    match first_supported(preferred, supported) {
        Some(value) => {
            info!("environment blend mode: {:?}", value);
            Fallback::exact(value)
        }
        None => Fallback::fallback(
            DEFAULT_BLEND_MODE,
            FallbackWarning::BlendModeUnsupported {
                requested: preferred.to_vec(),
                used: DEFAULT_BLEND_MODE,
            },
        ),
    }
}

pub fn select_reference_space(
    preferred: &[ReferenceSpaceType],
    supported: &[ReferenceSpaceType],
) -> Fallback<ReferenceSpaceType> {
    match first_supported(preferred, supported) {
        Some(value) => {
            info!("reference space: {:?}", value);
            Fallback::exact(value)
        }
        None => Fallback::fallback(
            DEFAULT_REFERENCE_SPACE,
            FallbackWarning::ReferenceSpaceUnsupported {
                requested: preferred.to_vec(),
                used: DEFAULT_REFERENCE_SPACE,
            },
        ),
    }
}
