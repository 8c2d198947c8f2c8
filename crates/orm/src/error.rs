//! Error types for the relations engine
//!
//! Provides error handling for database operations, query building,
//! and relation misuse.

use std::fmt;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Error types for model and query operations
#[derive(Debug, Clone)]
pub enum ModelError {
    /// Database connection or query error
    Database(String),
    /// Record not found in database
    NotFound(String),
    /// Primary key is missing or invalid
    MissingPrimaryKey,
    /// Serialization/deserialization error
    Serialization(String),
    /// Query building error
    Query(String),
    /// Configuration error
    Configuration(String),
    /// Relation misuse (typed, see [`RelationError`])
    Relation(RelationError),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Database(msg) => write!(f, "Database error: {}", msg),
            ModelError::NotFound(table) => write!(f, "Record not found in table '{}'", table),
            ModelError::MissingPrimaryKey => write!(f, "Primary key is missing or invalid"),
            ModelError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ModelError::Query(msg) => write!(f, "Query error: {}", msg),
            ModelError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ModelError::Relation(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ModelError {}

// Convert from sqlx errors
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::Database(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

/// Error types for polymorphic relation misuse
///
/// Every variant carries the relation (or registry) context plus the
/// offending method or value, so callers can surface an actionable
/// message without inspecting internals.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationError {
    /// Wrong target type passed to `save`/`associate`
    Mismatch { relation: String, expected: String },
    /// Operation requires a persisted model instance
    UnsavedModel { relation: String, operation: String },
    /// Method not meaningful for this relation variant
    UnsupportedMethod { relation: String, method: String },
    /// Discriminator value present but not registered
    UnknownMorphType { column: String, token: String },
    /// Ill-formed argument to a bulk operation
    InvalidArgument { method: String, reason: String },
    /// Bad morph map registration
    InvalidMapping(String),
    /// Relation name not declared on the entity definition
    Undefined { entity: String, relation: String },
}

impl RelationError {
    /// Shorthand for the unsupported-method variant
    pub fn unsupported(relation: &str, method: &str) -> Self {
        RelationError::UnsupportedMethod {
            relation: relation.to_string(),
            method: method.to_string(),
        }
    }
}

impl fmt::Display for RelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationError::Mismatch { relation, expected } => {
                write!(f, "Relation mismatch on {}: expected an instance of {}", relation, expected)
            }
            RelationError::UnsavedModel { relation, operation } => {
                write!(f, "Cannot {} through '{}': model instance is not persisted", operation, relation)
            }
            RelationError::UnsupportedMethod { relation, method } => {
                write!(f, "{} is not supported by {}", method, relation)
            }
            RelationError::UnknownMorphType { column, token } => {
                write!(f, "No target registered for morph type '{}' read from column '{}'", token, column)
            }
            RelationError::InvalidArgument { method, reason } => {
                write!(f, "Invalid argument to {}: {}", method, reason)
            }
            RelationError::InvalidMapping(msg) => {
                write!(f, "Invalid morph map entry: {}", msg)
            }
            RelationError::Undefined { entity, relation } => {
                write!(f, "'{}' is not defined as a relation on {}", relation, entity)
            }
        }
    }
}

impl std::error::Error for RelationError {}

impl From<RelationError> for ModelError {
    fn from(err: RelationError) -> Self {
        ModelError::Relation(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_errors_name_the_offender() {
        let err = RelationError::unsupported("MorphOne(location)", "create_many");
        assert_eq!(
            err.to_string(),
            "create_many is not supported by MorphOne(location)"
        );

        let err = RelationError::UnknownMorphType {
            column: "commentable_type".to_string(),
            token: "gifs".to_string(),
        };
        assert!(err.to_string().contains("gifs"));
        assert!(err.to_string().contains("commentable_type"));
    }

    #[test]
    fn relation_errors_fold_into_model_errors() {
        let err: ModelError = RelationError::UnsavedModel {
            relation: "MorphTo(commentable)".to_string(),
            operation: "dissociate".to_string(),
        }
        .into();
        match err {
            ModelError::Relation(RelationError::UnsavedModel { operation, .. }) => {
                assert_eq!(operation, "dissociate");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
