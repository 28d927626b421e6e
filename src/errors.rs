//! Error types for the focusdesk application.
//!
//! This module defines the error type shared by the store adapters,
//! repositories, media capture and the command-line host.

use std::io;

use thiserror::Error;

/// The main error type for the focusdesk application.
#[derive(Error, Debug)]
pub enum DeskError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persistence call failed for a collection.
    #[error("Store failure in {collection}: {message}")]
    Store { collection: String, message: String },

    /// Record was not found when performing an operation.
    #[error("{collection} record not found: {id}")]
    NotFound { collection: String, id: String },

    /// Record with the same ID already exists.
    #[error("{collection} record already exists: {id}")]
    AlreadyExists { collection: String, id: String },

    /// A device capability (microphone, camera, file picker) was refused or is unsupported.
    #[error("{capability} unavailable: {message}")]
    CapabilityDenied { capability: String, message: String },

    /// A "HH:MM" clock string could not be parsed.
    #[error("Invalid time of day: {value:?}")]
    InvalidTime { value: String },

    /// A calendar date string could not be parsed.
    #[error("Invalid date: {value:?}")]
    InvalidDate { value: String },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },
}

impl DeskError {
    /// Wraps a failure of the underlying store for `collection`.
    pub fn store(collection: &str, err: impl std::fmt::Display) -> Self {
        DeskError::Store {
            collection: collection.to_string(),
            message: err.to_string(),
        }
    }

    pub fn not_found(collection: &str, id: &str) -> Self {
        DeskError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Whether the error came from the persistence layer.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            DeskError::Store { .. } | DeskError::NotFound { .. } | DeskError::AlreadyExists { .. }
        )
    }
}
