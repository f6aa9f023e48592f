use serde::{Deserialize, Serialize};

/// A generation-checked handle to a resource tracked by the registry.
/// A handle whose generation no longer matches its slot is stale and never
/// resolves, even after the slot has been reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// Slot index inside the owning arena
    pub index: u32,
    /// Generation of the slot when the handle was issued
    pub generation: u32,
    /// Type tag for debugging and validation
    pub resource_type: ResourceType,
}

impl ResourceHandle {
    /// Create a null/invalid handle.
    pub fn null() -> Self {
        Self {
            index: u32::MAX,
            generation: 0,
            resource_type: ResourceType::None,
        }
    }
}

impl std::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}#{}v{}", self.resource_type, self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    None,
    Image,
    ImageView,
    Sampler,
}
