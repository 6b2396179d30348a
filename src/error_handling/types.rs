use std::fmt;

use crate::backend::types::ControlAction;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadUrl(String),
    BadPattern(String),
    BadIPFormatting(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadUrl(e) => write!(f, "Backend URL error: {}", e),
            ConfigError::BadPattern(e) => write!(f, "Pattern error: {}", e),
            ConfigError::BadIPFormatting(e) => write!(f, "IP formatting error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::TomlError(err.to_string())
    }
}

/// Failures talking to the capture backend.
#[derive(Debug)]
pub enum TransportError {
    Request(reqwest::Error),
    Status { status: u16, message: String },
    Decode(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Request(e) => write!(f, "Request failed: {}", e),
            TransportError::Status { status, message } => {
                write!(f, "Backend answered {}: {}", status, message)
            }
            TransportError::Decode(e) => write!(f, "Response decoding failed: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(err)
    }
}

#[derive(Debug)]
pub enum ControlError {
    Rejected {
        action: ControlAction,
        status: u16,
        message: String,
    },
    Transport(TransportError),
    ReconcilerUnavailable,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Rejected {
                action,
                status,
                message,
            } => write!(f, "Backend refused {} ({}): {}", action, status, message),
            ControlError::Transport(e) => write!(f, "Control request failed: {}", e),
            ControlError::ReconcilerUnavailable => write!(f, "Reconciler is not running"),
        }
    }
}

impl std::error::Error for ControlError {}

impl From<TransportError> for ControlError {
    fn from(err: TransportError) -> Self {
        ControlError::Transport(err)
    }
}

#[derive(Debug)]
pub enum WebError {
    BadAddress(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BadAddress(e) => write!(f, "Invalid bind address: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum MonitorError {
    ConfigurationError(ConfigError),
    WebError(WebError),
    InitializationFailed(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            MonitorError::WebError(e) => write!(f, "Web interface error: {}", e),
            MonitorError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for MonitorError {}

impl From<ConfigError> for MonitorError {
    fn from(err: ConfigError) -> Self {
        MonitorError::ConfigurationError(err)
    }
}

impl From<WebError> for MonitorError {
    fn from(err: WebError) -> Self {
        MonitorError::WebError(err)
    }
}
