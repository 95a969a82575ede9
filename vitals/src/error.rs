//! Error types for registration-time failures.
//!
//! Per the crate's fail-loud-at-configuration, fail-quiet-on-the-hot-path
//! split: everything in this module is raised to the caller. Hot-path
//! mistakes (bad label access, negative counter increments) are logged and
//! swallowed instead, in [`crate::cell`] and [`crate::metric`].

use thiserror::Error;

/// Errors that can occur when registering a metric or its labels.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RegistrationError {
    /// The metric name failed validation (see [`crate::validate::validate_name`]).
    #[error("invalid metric name {name:?}: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// One of the metric's declared label names failed validation.
    #[error("invalid label name {label:?} on metric {name:?}: {reason}")]
    InvalidLabelName {
        /// The metric being registered.
        name: String,
        /// The offending label name.
        label: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A metric with this name is already registered and `overwrite` was not requested.
    #[error("a metric named {name:?} is already registered")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },

    /// The metric object already carries a different name from a prior registration.
    #[error("metric was previously registered as {existing:?}, cannot register as {requested:?}")]
    NameConflict {
        /// The name the metric already carries.
        existing: String,
        /// The name registration was attempted under.
        requested: String,
    },

    /// `unregister` was called for a name that is not present in the registry.
    #[error("no metric named {name:?} is registered")]
    NotRegistered {
        /// The missing name.
        name: String,
    },
}
