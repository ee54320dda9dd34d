use argon2::Config;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{common::UserId, db::user::UserCore};

use super::UserError;

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 100;
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Raw credentials, received from a user for signup or login. These are never
/// stored directly, since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Check the credentials are acceptable for a new account.
    pub fn validate(&self) -> std::result::Result<(), UserError> {
        let username_length = self.username.trim().chars().count();
        if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&username_length) {
            return Err(UserError::InvalidUsername);
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(UserError::InvalidPassword);
        }
        Ok(())
    }
}

impl TryFrom<Credentials> for UserCore {
    type Error = Error;

    /// Convert [`Credentials`] to a new user by hashing the password.
    fn try_from(cred: Credentials) -> Result<Self> {
        cred.validate()?;

        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(cred.password.as_bytes(), &salt, &Config::default())?;
        Ok(Self {
            username: cred.username.trim().to_string(),
            password_hash,
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub is_valid: bool,
    pub user_id: Option<UserId>,
}
