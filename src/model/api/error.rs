use rocket::http::Status;
use serde::{Deserialize, Serialize};

/// Broad classes of failure a caller can act upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    InvalidInput,
    Unauthorized,
    Internal,
}

impl ErrorCategory {
    /// Classify a bare HTTP status.
    pub fn of(status: Status) -> Self {
        match status.code {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            409 => Self::Conflict,
            400..=499 => Self::InvalidInput,
            _ => Self::Internal,
        }
    }
}

/// A business failure with a stable classification and a short title.
/// The detail shown to users is the error's `Display` output.
pub trait Problem: std::error::Error {
    fn category(&self) -> ErrorCategory;

    /// Short, stable title shown to users.
    fn title(&self) -> &'static str;
}

/// The JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub title: String,
    pub status: u16,
    pub category: ErrorCategory,
    pub detail: String,
    /// Path of the request that failed.
    pub instance: String,
}

impl ErrorResponse {
    pub fn new(
        title: impl Into<String>,
        status: Status,
        category: ErrorCategory,
        detail: impl Into<String>,
        instance: String,
    ) -> Self {
        Self {
            title: title.into(),
            status: status.code,
            category,
            detail: detail.into(),
            instance,
        }
    }

    /// A response describing a business failure.
    pub fn from_problem(problem: &dyn Problem, instance: String) -> Self {
        let category = problem.category();
        Self::new(
            problem.title(),
            category.status(),
            category,
            problem.to_string(),
            instance,
        )
    }

    /// A response titled after the status' reason phrase.
    pub fn from_status(status: Status, detail: impl Into<String>, instance: String) -> Self {
        Self::new(
            status.reason().unwrap_or("Error"),
            status,
            ErrorCategory::of(status),
            detail,
            instance,
        )
    }

    /// The generic response for failures outside the business taxonomy.
    pub fn internal(instance: String) -> Self {
        Self::from_status(
            Status::InternalServerError,
            "An unexpected error occurred.",
            instance,
        )
    }
}
