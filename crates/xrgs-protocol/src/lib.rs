pub mod handle;
pub mod xr;
pub mod layer;
pub mod descriptors;
pub mod formats;
pub mod error;

pub use handle::{ResourceHandle, ResourceType};
pub use error::{RuntimeError, RuntimeResult};
