//! Error handling

use std::path::PathBuf;

/// Failures of the variation workflow that reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum VariationError {
    /// The request or a local file was unusable; raised before the remote call
    /// when the cause is the input.
    #[error("{0}")]
    Input(String),

    /// The variation call itself failed: auth, validation, server or network.
    #[error("{message}")]
    RemoteService {
        /// HTTP status, when the service answered at all.
        status: Option<u16>,
        /// Message from the service, or the transport error text.
        message: String,
    },
}

impl VariationError {
    /// Builds an input error from anything displayable.
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    /// Builds a remote service error for a failure that never got a status code.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::RemoteService {
            status: None,
            message: err.to_string(),
        }
    }

    /// True when the request was rejected locally and nothing was sent.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }

    /// HTTP status returned by the service, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteService { status, .. } => *status,
            Self::Input(_) => None,
        }
    }
}

/// Failures reading or writing the settings file. Callers normally recover
/// from these by falling back to defaults.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but couldn't be read, or couldn't be written.
    #[error("config file {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file isn't a JSON object of the expected shape.
    #[error("config file {} is not valid: {source}", path.display())]
    Malformed {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}
