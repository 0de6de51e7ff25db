//! Authorization Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthzError {
    /// Comparison between objects without a shared ranking semantics
    #[error("Type conflict: cannot compare {left} with {right}")]
    TypeConflict { left: String, right: String },

    /// Strict comparison across categories with no ancestor relation
    #[error("Unrelated categories: {left} and {right} are not in an ancestor relation")]
    UnrelatedCategories { left: String, right: String },

    #[error("Ambiguous role name '{name}': {count} roles match")]
    AmbiguousName { name: String, count: usize },

    #[error("Precondition failed: {message}")]
    Precondition { message: String },

    #[error("Entity not found: {entity_type} {key}")]
    NotFound { entity_type: String, key: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Unique (weight, category) constraint violated, typically by a concurrent insert
    #[error("Duplicate weight {weight} in category {category_id}")]
    DuplicateWeight { weight: f64, category_id: i64 },

    #[error("Duplicate entity: {entity_type} with {field}={value}")]
    Duplicate { entity_type: String, field: String, value: String },

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthzError {
    pub fn type_conflict(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::TypeConflict {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn unrelated(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::UnrelatedCategories {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn ambiguous(name: impl Into<String>, count: usize) -> Self {
        Self::AmbiguousName {
            name: name.into(),
            count,
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition { message: message.into() }
    }

    pub fn not_found(entity_type: impl Into<String>, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            key: key.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn duplicate(
        entity_type: impl Into<String>,
        field: impl Into<String>,
        value: impl std::fmt::Display,
    ) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Whether an interpolating insert may recompute and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DuplicateWeight { .. })
    }
}

pub type Result<T> = std::result::Result<T, AuthzError>;
