//! Error types for the collaborators around the verification core.
//!
//! Protocol outcomes (duplicate, rejected, not ready) are not errors; they are
//! returned as [`crate::verifier::Outcome`]. The types here cover the seed
//! source, the audit log and process startup.

use std::io;

use thiserror::Error;

/// Failure to obtain a fresh secret from a seed source.
///
/// The rotator never surfaces this to submitters; it substitutes a local
/// fallback secret and logs the error.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The source is not reachable or not configured.
    #[error("seed source unavailable: {reason}")]
    Unavailable {
        /// Description of the failure.
        reason: String,
    },

    /// The source answered with something that cannot be used as a secret.
    #[error("seed source returned an unusable secret: {reason}")]
    Unusable {
        /// Description of the failure.
        reason: String,
    },
}

/// Failure to durably append a submission record.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Underlying I/O failure.
    #[error("audit log I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record could not be encoded.
    #[error("audit record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Log is closed or otherwise refusing writes.
    #[error("audit log rejected record: {reason}")]
    Rejected {
        /// Description of the failure.
        reason: String,
    },
}

/// Startup and configuration failures of the attendance service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Configuration file is not a valid JSON service config.
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        /// Path that was parsed.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A service thread (rotator or HTTP accept loop) could not be started.
    #[error("failed to start {thread} thread: {source}")]
    ThreadSpawn {
        /// Name of the thread.
        thread: &'static str,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The HTTP listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Audit log could not be opened.
    #[error(transparent)]
    Audit(#[from] AuditError),
}
