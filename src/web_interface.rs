// Web Interface module root
pub mod routes;
pub mod types;
pub mod web_server;

// Re-export commonly used items
pub use routes::CaptureEndpoint;
pub use types::{CaptureBody, CaptureResponse, ImageUrls};
pub use web_server::WebServer;
