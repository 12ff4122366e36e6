use thiserror::Error;

use crate::registry::error::FilterError;

/// Protocol violations detected by a dependency tracker
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DependencyError {
    #[error("{role} point '{name}' is already tracked")]
    DuplicatePoint { role: &'static str, name: String },

    #[error("{role} point '{name}' is already complete and cannot be tracked")]
    AlreadyComplete { role: &'static str, name: String },

    #[error("Unknown {role} point '{name}'")]
    UnknownPoint { role: &'static str, name: String },
}

/// Declaration or specification problems, always detected before an instance
/// starts running
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Point '{point}' is declared more than once")]
    DuplicatePoint { point: String },

    #[error("Point '{point}' has an invalid cardinality: {reason}")]
    InvalidCardinality { point: String, reason: String },

    #[error("Exposure point '{point}' requires unknown injection point '{prerequisite}'")]
    UnknownPrerequisite { point: String, prerequisite: String },

    #[error("Invalid filter on point '{point}': {source}")]
    InvalidFilter {
        point: String,
        #[source]
        source: FilterError,
    },

    #[error("Filter override targets unknown injection point '{point}'")]
    UnknownFilterTarget { point: String },

    #[error("Required exposure point '{point}' resolved nothing to publish")]
    NothingToExpose { point: String },

    #[error("Required exposure point '{point}' resolved an empty list")]
    EmptyExposure { point: String },

    #[error("Exposure point '{point}' resolved {count} values but is not declared multiple")]
    NotMultiple { point: String, count: usize },

    #[error("Invalid component specification: {reason}")]
    InvalidSpecification { reason: String },
}
