use thiserror::Error;

use super::worker::LifecycleState;

/// Failures of the bucket store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid cache name: {0}")]
    InvalidName(String),

    #[error("Cache bucket not found: {0}")]
    MissingBucket(String),

    #[error("Cache I/O error for {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt cache file {name}: {source}")]
    Corrupt {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(name: &str, source: std::io::Error) -> Self {
        StoreError::Io {
            name: name.to_string(),
            source,
        }
    }
}

/// Failures of a generation's install/activate lifecycle.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Install failed fetching {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("Cannot {event} a worker that is {state}")]
    InvalidTransition {
        state: LifecycleState,
        event: &'static str,
    },

    #[error("Invalid cache version '{version}': {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("Invalid app origin '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
