//! Error types shared by the nextgup binaries

use thiserror::Error;

/// Errors raised while loading or validating node configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration is syntactically valid but semantically wrong.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File or socket I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
