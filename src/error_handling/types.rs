use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failure to bring up the browser process behind a capture session.
///
/// This is the only error that escapes the orchestrator: without a running
/// browser no view can be captured at all.
#[derive(Debug)]
pub enum LaunchError {
    ExecutableNotFound(String),
    SpawnFailed(std::io::Error),
    DevToolsEndpointMissing,
    Timeout,
    ConnectionFailed(String),
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchError::ExecutableNotFound(e) => write!(f, "Browser executable not found: {}", e),
            LaunchError::SpawnFailed(e) => write!(f, "Browser process spawn failed: {}", e),
            LaunchError::DevToolsEndpointMissing => {
                write!(f, "Browser exited before announcing a DevTools endpoint")
            }
            LaunchError::Timeout => write!(f, "Browser launch timed out"),
            LaunchError::ConnectionFailed(e) => write!(f, "DevTools connection failed: {}", e),
        }
    }
}

impl std::error::Error for LaunchError {}

#[derive(Debug)]
pub enum BrowserError {
    Protocol(String),
    ConnectionClosed,
    Navigation(String),
    Evaluation(String),
    ContextClosed,
    Io(std::io::Error),
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::Protocol(e) => write!(f, "DevTools protocol error: {}", e),
            BrowserError::ConnectionClosed => write!(f, "DevTools connection closed"),
            BrowserError::Navigation(e) => write!(f, "Navigation failed: {}", e),
            BrowserError::Evaluation(e) => write!(f, "Page evaluation failed: {}", e),
            BrowserError::ContextClosed => write!(f, "Capture session already closed"),
            BrowserError::Io(e) => write!(f, "Browser IO error: {}", e),
        }
    }
}

impl std::error::Error for BrowserError {}

impl From<std::io::Error> for BrowserError {
    fn from(err: std::io::Error) -> Self {
        BrowserError::Io(err)
    }
}

#[derive(Debug)]
pub enum OrchestratorError {
    Launch(LaunchError),
    Internal(String),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::Launch(e) => write!(f, "Launch error: {}", e),
            OrchestratorError::Internal(e) => write!(f, "Internal capture error: {}", e),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<LaunchError> for OrchestratorError {
    fn from(err: LaunchError) -> Self {
        OrchestratorError::Launch(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    MissingCustomizationId,
    InvalidCustomizationId(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::MissingCustomizationId => write!(f, "customizationId is required"),
            RequestError::InvalidCustomizationId(id) => {
                write!(f, "customizationId '{}' is not a valid identifier", id)
            }
        }
    }
}

impl std::error::Error for RequestError {}

#[derive(Debug)]
pub enum StorageError {
    InvalidKey(String),
    WriteFailed,
    ReadFailed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::InvalidKey(k) => write!(f, "Invalid artifact key: {}", k),
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    StorageError(StorageError),
    WebError(WebError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}
