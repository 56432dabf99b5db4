//! Error types for keel-core

use thiserror::Error;

/// Result type alias using keel-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Keel
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// Descriptor file missing from a bundle or artifact directory
    #[error("Descriptor not found: {path}")]
    DescriptorNotFound { path: String },

    /// Descriptor present but not usable
    #[error("Invalid descriptor {path}: {message}")]
    InvalidDescriptor { path: String, message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a descriptor not found error
    pub fn descriptor_not_found(path: impl Into<String>) -> Self {
        Self::DescriptorNotFound { path: path.into() }
    }

    /// Create an invalid descriptor error
    pub fn invalid_descriptor(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_descriptor_message() {
        let err = Error::invalid_descriptor("svc-a/artifact.yaml", "missing name");
        assert_eq!(
            err.to_string(),
            "Invalid descriptor svc-a/artifact.yaml: missing name"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
