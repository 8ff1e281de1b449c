use std::sync::Arc;

/// Represents a result type for operations in the Mixpanel tracker.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type returned by [`Delegate`](crate::Delegate) implementations.
pub type DelegateError = Box<dyn std::error::Error + Send + Sync>;

/// Enum representing possible errors that can occur while tracking events.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Event name or properties could not be serialized to JSON.
    #[error("failed to encode event data")]
    Encoding(#[source] Arc<serde_json::Error>),

    /// Event properties passed to `track_event` did not serialize to a JSON object.
    #[error("event properties must serialize to a JSON object")]
    InvalidProperties,

    /// Invalid base URL configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// Network error on the synchronous delivery path.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),

    /// The worker subprocess could not be started.
    #[error("failed to start mixpanel worker")]
    WorkerSpawn(#[source] Arc<std::io::Error>),

    /// Error raised by a custom delivery delegate.
    #[error("delivery delegate failed")]
    Delegate(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// An I/O error.
    #[error(transparent)]
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Encoding(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

impl From<DelegateError> for Error {
    fn from(value: DelegateError) -> Self {
        Error::Delegate(Arc::from(value))
    }
}
