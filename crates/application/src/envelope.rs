//! Serializable response envelopes for transport adapters.

use parishdesk_core::{AppError, AppResult};
use parishdesk_domain::{Page, PageMeta};
use serde::Serialize;

/// Error body carried by failed envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable error code.
    pub code: &'static str,
    /// Human-readable message; internal details are redacted.
    pub message: String,
}

impl From<AppError> for ErrorBody {
    fn from(error: AppError) -> Self {
        let error = error.redacted();
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Envelope around a single result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error body on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> Envelope<T> {
    /// Wraps a successful payload.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Wraps a failure.
    #[must_use]
    pub fn failed(error: AppError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl<T> From<AppResult<T>> for Envelope<T> {
    fn from(result: AppResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::failed(error),
        }
    }
}

/// Envelope around one page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEnvelope<T> {
    /// Whether the listing succeeded.
    pub success: bool,
    /// Returned rows.
    pub data: Vec<T>,
    /// Pagination metadata, flattened into the envelope.
    #[serde(flatten)]
    pub meta: Option<PageMeta>,
    /// Error body on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> From<AppResult<Page<T>>> for ListEnvelope<T> {
    fn from(result: AppResult<Page<T>>) -> Self {
        match result {
            Ok(page) => Self {
                success: true,
                data: page.items,
                meta: Some(page.meta),
                error: None,
            },
            Err(error) => Self {
                success: false,
                data: Vec::new(),
                meta: None,
                error: Some(error.into()),
            },
        }
    }
}
