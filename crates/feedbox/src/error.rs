//! Error types for feedbox.
//!
//! This module defines the crate-wide error type. Remote failures are kept
//! apart by the operation that produced them so callers can tell a rejected
//! write from a failed read or delete.

use std::path::PathBuf;
use thiserror::Error;

use crate::remote::RemoteError;
use crate::validation::FieldError;

/// The main error type for feedbox operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Remote Errors ===
    /// The remote store failed to create a record.
    #[error("failed to create feedback: {source}")]
    RemoteWrite {
        /// The underlying remote failure.
        #[source]
        source: Box<RemoteError>,
    },

    /// The remote store failed to list records.
    #[error("failed to fetch feedback: {source}")]
    RemoteRead {
        /// The underlying remote failure.
        #[source]
        source: Box<RemoteError>,
    },

    /// The remote store failed to delete a record.
    #[error("failed to delete feedback {id}: {source}")]
    RemoteDelete {
        /// Identifier of the record that could not be deleted.
        id: String,
        /// The underlying remote failure.
        #[source]
        source: Box<RemoteError>,
    },

    // === Storage Errors ===
    /// The pending queue could not be read from or written to durable storage.
    #[error("pending queue storage failed: {message}")]
    Storage {
        /// Description of what went wrong.
        message: String,
    },

    /// Failed to open or create the queue database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Validation Errors ===
    /// Submitted values did not pass field validation.
    #[error("invalid feedback: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for feedbox operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Wrap a remote failure from a create call.
    #[must_use]
    pub fn remote_write(source: RemoteError) -> Self {
        Self::RemoteWrite {
            source: Box::new(source),
        }
    }

    /// Wrap a remote failure from a list call.
    #[must_use]
    pub fn remote_read(source: RemoteError) -> Self {
        Self::RemoteRead {
            source: Box::new(source),
        }
    }

    /// Wrap a remote failure from a delete call.
    #[must_use]
    pub fn remote_delete(id: impl Into<String>, source: RemoteError) -> Self {
        Self::RemoteDelete {
            id: id.into(),
            source: Box::new(source),
        }
    }

    /// Create a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error came from the remote store.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::RemoteWrite { .. } | Self::RemoteRead { .. } | Self::RemoteDelete { .. }
        )
    }

    /// Check if this error came from durable local storage.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. }
                | Self::DatabaseOpen { .. }
                | Self::DatabaseQuery(_)
                | Self::DatabaseMigration { .. }
        )
    }

    /// Check if this error is a field validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
