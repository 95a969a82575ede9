//! Errors raised while constructing a push exporter.

use thiserror::Error;

/// Failure building a [`crate::DogStatsDPushBuilder`].
#[derive(Debug, Error)]
pub enum BuildError {
    /// The default UDP backend could not bind or connect its socket.
    #[error("failed to set up the default UDP backend: {0}")]
    Backend(#[from] std::io::Error),
}
