use thiserror::Error;

use crate::registry::ProviderId;

/// Errors raised by a capability registry implementation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Capability name must not be empty")]
    EmptyCapability,

    #[error("Registry lock poisoned while accessing {what}")]
    Poisoned { what: &'static str },

    #[error("No registration with id {id}")]
    UnknownRegistration { id: ProviderId },
}

/// Errors raised while parsing a filter expression
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Unexpected end of filter expression at position {position}")]
    UnexpectedEnd { position: usize },

    #[error("Unexpected character '{found}' at position {position}")]
    UnexpectedChar { found: char, position: usize },

    #[error("Missing attribute name at position {position}")]
    MissingAttribute { position: usize },

    #[error("Composite filter at position {position} has no operands")]
    EmptyComposite { position: usize },

    #[error("Invalid version requirement '{requirement}': {message}")]
    InvalidVersionRequirement { requirement: String, message: String },

    #[error("Trailing input after filter at position {position}")]
    TrailingInput { position: usize },
}
