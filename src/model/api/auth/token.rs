use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{
    errors::Error as JwtError, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use mongodb::Database;
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{common::UserId, db::user::User, mongodb::Coll};

pub const BEARER_PREFIX: &str = "Bearer ";

/// An authentication token representing a specific user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthToken {
    pub user_id: UserId,
}

impl AuthToken {
    /// Create a new [`AuthToken`] for the given user.
    pub fn new(user: &User) -> Self {
        Self { user_id: user.id }
    }

    /// Sign this token into a JWT that expires after the configured TTL.
    pub fn encode(self, config: &Config) -> Result<String, JwtError> {
        let claims = Claims {
            user_id: self.user_id,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
    }

    /// Verify and decode a JWT.
    pub fn decode(token: &str, config: &Config) -> Result<Self, JwtError> {
        jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|data: TokenData<Claims>| Self {
            user_id: data.claims.user_id,
        })
    }

    /// Read a token from an `Authorization` header value.
    pub fn from_header(header: &str, config: &Config) -> Result<Self, Error> {
        let token = header.strip_prefix(BEARER_PREFIX).ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "Expected a bearer token.".to_string(),
            )
        })?;
        Ok(Self::decode(token.trim(), config)?)
    }
}

/// JWT claims: the user as subject plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "sub")]
    user_id: UserId,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the `Authorization` header and check the user
    /// it names still exists.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let Some(header) = req.headers().get_one("Authorization") else {
            let err = Error::Status(Status::Unauthorized, "Authentication required.".to_string());
            return Outcome::Failure((Status::Unauthorized, err));
        };
        let token = match Self::from_header(header, config) {
            Ok(token) => token,
            Err(e) => return Outcome::Failure((Status::Unauthorized, e)),
        };

        // Check the user actually exists.
        let db = req.guard::<&State<Database>>().await.unwrap();
        match User::exists(&Coll::from_db(db), token.user_id).await {
            Ok(true) => Outcome::Success(token),
            Ok(false) => {
                let err = Error::Status(Status::Unauthorized, "Unknown user.".to_string());
                Outcome::Failure((Status::Unauthorized, err))
            }
            Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}
