// Utility modules

pub mod cancel;
pub mod clean;
pub mod config;
pub mod markdown;

pub use cancel::CancelOnDrop;
pub use config::{load_config, AppConfig, ConfigError, ConfigResult};
