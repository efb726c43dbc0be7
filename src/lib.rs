pub mod browser;
pub mod capture;
pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod storage;
pub mod web_interface;

pub use capture::{CaptureOrchestrator, CaptureRequest, CaptureResult, OverallStatus};
pub use configuration::Config;
pub use controller::Controller;
