mod error;
mod request;
mod token;

pub use error::UserError;
pub use request::{Credentials, LoginResponse, SignupResponse, ValidateResponse};
pub use token::{AuthToken, BEARER_PREFIX};
