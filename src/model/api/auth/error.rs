use thiserror::Error;

use crate::model::api::error::{ErrorCategory, Problem};

use super::request::{MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH, MIN_USERNAME_LENGTH};

/// Reasons a signup or login is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UserError {
    #[error(
        "Username must be between {} and {} characters.",
        MIN_USERNAME_LENGTH,
        MAX_USERNAME_LENGTH
    )]
    InvalidUsername,
    #[error("Password must be at least {} characters.", MIN_PASSWORD_LENGTH)]
    InvalidPassword,
    #[error("The username is already taken.")]
    DuplicateUsername,
    /// Deliberately the same for an unknown user and a wrong password.
    #[error("Username or password is incorrect.")]
    InvalidCredentials,
}

impl Problem for UserError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidUsername | Self::InvalidPassword => ErrorCategory::InvalidInput,
            Self::DuplicateUsername => ErrorCategory::Conflict,
            Self::InvalidCredentials => ErrorCategory::Unauthorized,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::InvalidUsername => "Invalid Username",
            Self::InvalidPassword => "Invalid Password",
            Self::DuplicateUsername => "Duplicate Username",
            Self::InvalidCredentials => "Invalid Credentials",
        }
    }
}
