//! Shared primitives for all Rust crates in ParishDesk.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;
mod ids;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::{ActorIdentity, SystemFlags};
pub use ids::{PermissionId, RoleId, TenantId, UserId};

/// Result type used across ParishDesk crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string. Surrounding whitespace is trimmed.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// No identity accompanies the request.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated identity has neither a tenant nor a system role.
    #[error("tenant required: {0}")]
    TenantRequired(String),

    /// Actor has standing but lacks authority for this action or target.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Requested resource does not exist or lies outside the actor's scope.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input, name collision, or unknown referenced identifier.
    #[error("validation error: {0}")]
    Validation(String),

    /// Write attempted against a system-managed resource.
    #[error("immutable: {0}")]
    Immutable(String),

    /// Deletion blocked by rows that still depend on the target.
    #[error("has dependents: {0}")]
    HasDependents(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns a stable machine-readable code for this error category.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::TenantRequired(_) => "tenant_required",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Immutable(_) => "immutable",
            Self::HasDependents(_) => "has_dependents",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Returns true for unexpected failures that are not domain decisions.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// Strips internal detail so it never reaches a caller.
    #[must_use]
    pub fn redacted(self) -> Self {
        match self {
            Self::Internal(_) => Self::Internal("an unexpected error occurred".to_owned()),
            other => other,
        }
    }
}
