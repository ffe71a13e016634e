//! Error types for the virt-who-tui-core crate

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// User input rejected by a validation rule. Always recoverable.
    #[error("{0}")]
    InvalidOption(String),

    #[error("Unable to write encryption key file {}: {reason}", path.display())]
    UnwritableKeyFile { path: PathBuf, reason: String },

    #[error("Invalid encryption key file {}: {reason}", path.display())]
    InvalidKeyFile { path: PathBuf, reason: String },

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command execution failed: {cmd} - {message}")]
    Command { cmd: String, message: String },

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to {action} service: {detail}")]
    Service { action: String, detail: String },

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    /// Anything the wizard does not know how to recover from.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidOption(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        Error::Unexpected(msg.into())
    }

    /// True for errors raised by the secret store.
    pub fn is_key_file(&self) -> bool {
        matches!(
            self,
            Error::UnwritableKeyFile { .. } | Error::InvalidKeyFile { .. } | Error::Encryption(_)
        )
    }
}
