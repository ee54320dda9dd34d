use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use thiserror::Error;

use crate::logging::RequestId;
use crate::model::{
    api::{
        auth::UserError,
        comment::CommentError,
        error::{ErrorCategory, ErrorResponse, Problem},
        poll::PollError,
    },
    mongodb::Abort,
};
use crate::voting::VoteError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error(transparent)]
    Comment(#[from] CommentError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Shorthand for a 404 naming the missing thing.
    pub fn not_found(what: String) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    /// The business failure behind this error, if it is one.
    pub fn problem(&self) -> Option<&dyn Problem> {
        match self {
            Self::Vote(err) => Some(err),
            Self::User(err) => Some(err),
            Self::Poll(err) => Some(err),
            Self::Comment(err) => Some(err),
            _ => None,
        }
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        if let Some(problem) = self.problem() {
            return problem.category().status();
        }
        match self {
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature
                | JwtErrorKind::ImmatureSignature
                | JwtErrorKind::InvalidSignature
                | JwtErrorKind::InvalidToken => Status::Unauthorized,
                _ => Status::InternalServerError,
            },
            Self::Status(status, _) => *status,
            _ => Status::InternalServerError,
        }
    }

    /// Build the user-visible body. Infrastructure failures never leak their
    /// internals.
    pub fn to_response(&self, instance: String) -> ErrorResponse {
        if let Some(problem) = self.problem() {
            return ErrorResponse::from_problem(problem, instance);
        }
        let status = self.status();
        match self {
            Self::Status(_, detail) => ErrorResponse::from_status(status, detail.clone(), instance),
            _ if status.class() == StatusClass::ServerError => {
                ErrorResponse::internal(instance)
            }
            _ => ErrorResponse::from_status(status, self.to_string(), instance),
        }
    }
}

impl<E> From<Abort<E>> for Error
where
    E: Into<Error>,
{
    fn from(abort: Abort<E>) -> Self {
        match abort {
            Abort::Db(e) => Self::Db(e),
            Abort::Rejected(e) => e.into(),
        }
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let id = RequestId::of(req);
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            error!("{id} failed with infrastructure error: {self:?}");
        } else {
            warn!("{id} rejected: {self}");
        }
        let body = self.to_response(req.uri().path().to_string());
        (status, Json(body)).respond_to(req)
    }
}

impl ErrorCategory {
    /// The HTTP status for errors of this category.
    pub fn status(self) -> Status {
        match self {
            Self::NotFound => Status::NotFound,
            Self::Conflict => Status::Conflict,
            Self::InvalidInput => Status::BadRequest,
            Self::Unauthorized => Status::Unauthorized,
            Self::Internal => Status::InternalServerError,
        }
    }
}
