pub mod arena;
pub mod config;
pub mod error;

pub use arena::Arena;
pub use config::XrgsConfig;
pub use error::CoreError;
