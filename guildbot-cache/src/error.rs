use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid cache configuration: {0}")]
    Configuration(String),

    #[error("Invalid key pattern: {0}")]
    Pattern(#[from] regex::Error),
}
