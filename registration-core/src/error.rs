//! Error types for the registration component.
//!
//! A single error enum is shared by the adapters, the registrar and the
//! registration service. Storage-technology errors are carried unchanged as
//! the `source` of [`RegistrationError::Storage`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::FieldErrors;

/// Result type alias using `RegistrationError`.
pub type Result<T> = std::result::Result<T, RegistrationError>;

/// Boxed storage error kept as the source of [`RegistrationError::Storage`].
pub type StorageSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Field covered by a uniqueness invariant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniqueField {
    /// The user name.
    UserName,
    /// The email address.
    EmailAddress,
}

impl UniqueField {
    /// Column / document field name of this field.
    pub fn as_str(&self) -> &'static str {
        match self {
            UniqueField::UserName => "user_name",
            UniqueField::EmailAddress => "email_address",
        }
    }

    /// Resolves a column / document field name.
    pub fn from_column(column: &str) -> Option<Self> {
        match column {
            "user_name" => Some(UniqueField::UserName),
            "email_address" => Some(UniqueField::EmailAddress),
            _ => None,
        }
    }
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for all registration operations.
#[derive(Debug, Error)]
pub enum RegistrationError {
    // ═══════════════════════════════════════════════════════════════════════════
    // STARTUP ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Invalid plugin or host configuration. Fatal to application startup.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // REGISTRATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// A create would break the user name or email uniqueness invariant.
    #[error("{field} already registered: {value}")]
    UniquenessViolation {
        /// Offending field.
        field: UniqueField,
        /// Value that is already taken.
        value: String,
    },

    /// A form submission failed validation.
    #[error("Invalid registration form: {0}")]
    InvalidForm(FieldErrors),

    /// A registration record failed validation.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// An identifier could not be parsed.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Storage-technology error, not translated.
    #[error("{backend} storage error: {source}")]
    Storage {
        /// Storage technology that raised the error.
        backend: &'static str,
        /// The untouched underlying error.
        #[source]
        source: StorageSource,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // COLLABORATOR ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The mailer failed to deliver a message.
    #[error("Mailer error: {0}")]
    MailerError(String),
}

impl RegistrationError {
    /// Wraps a storage-technology error without translating it.
    pub fn storage(
        backend: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RegistrationError::Storage {
            backend,
            source: Box::new(source),
        }
    }

    /// Returns true if the caller should report this to the end user and carry on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RegistrationError::UniquenessViolation { .. }
                | RegistrationError::InvalidForm(_)
                | RegistrationError::ValidationError(_)
                | RegistrationError::InvalidIdentifier(_)
                | RegistrationError::MailerError(_)
        )
    }

    /// Returns true if this is a validation error.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            RegistrationError::UniquenessViolation { .. }
                | RegistrationError::InvalidForm(_)
                | RegistrationError::ValidationError(_)
        )
    }

    /// Returns true if this error must abort application startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RegistrationError::ConfigurationError(_))
    }
}
