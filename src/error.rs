//! Crate-wide error type.

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised by the engine's collaborators.
///
/// None of these are fatal to the tick loop: probe errors degrade to absent
/// signals and persistence errors are logged and retried on the next write.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The external command could not be started.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external command outlived its time budget and was killed.
    #[error("`{program}` timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// The command ran but reported failure.
    #[error("`{program}` exited with status {code:?}")]
    CommandFailed { program: String, code: Option<i32> },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// The config parsed but holds a value that cannot be used.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to encode config: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("could not determine the user config directory")]
    NoConfigDir,

    #[error("unknown VPN client: {0}")]
    UnknownClient(String),

    /// The requested capability is not configured for this client.
    #[error("{0}")]
    Unsupported(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
