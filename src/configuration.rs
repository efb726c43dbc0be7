pub mod cli;
pub mod config;
pub mod types;

pub use cli::CliArgs;
pub use config::{Config, ConfigOverrides};
pub use types::{CaptureSettings, ViewportConfig};
