//! Error types for the Sparteo adapter.
//!
//! All fallible operations return `error_stack::Report<AdapterError>`; the
//! variant names the failure class the host uses to bucket adapter errors.

use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum AdapterError {
    /// Settings could not be loaded or failed validation.
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// Endpoint template could not be parsed or rendered.
    #[display("Template error: {message}")]
    Template { message: String },

    /// The incoming request (or a part of it) is not usable.
    #[display("{message}")]
    BadInput { message: String },

    /// The exchange answered with something we cannot use.
    #[display("{message}")]
    BadServerResponse { message: String },

    /// The outbound request could not be serialized.
    #[display("Serialization error: {message}")]
    Serialization { message: String },
}

/// Coarse classification of an [`AdapterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Template,
    BadInput,
    BadServerResponse,
    Serialization,
}

impl AdapterError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Template { .. } => ErrorKind::Template,
            Self::BadInput { .. } => ErrorKind::BadInput,
            Self::BadServerResponse { .. } => ErrorKind::BadServerResponse,
            Self::Serialization { .. } => ErrorKind::Serialization,
        }
    }

    /// Returns the message carried by the variant.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration { message }
            | Self::Template { message }
            | Self::BadInput { message }
            | Self::BadServerResponse { message }
            | Self::Serialization { message } => message,
        }
    }
}
