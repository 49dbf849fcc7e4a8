use thiserror::Error;

/// Errors raised while setting up performance monitoring.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Invalid monitor configuration: {0}")]
    Configuration(String),
}
