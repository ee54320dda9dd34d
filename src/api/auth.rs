use mongodb::bson::doc;
use rocket::{serde::json::Json, Route, State};

use crate::{
    error::Result,
    model::{
        api::auth::{
            AuthToken, Credentials, LoginResponse, SignupResponse, UserError, ValidateResponse,
        },
        db::user::{User, UserCore},
        mongodb::{is_duplicate_key_error, Coll, Counter, USER_ID_COUNTER},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![signup, login, validate]
}

#[post("/auth/signup", data = "<credentials>", format = "json")]
async fn signup(
    credentials: Json<Credentials>,
    users: Coll<User>,
    counters: Coll<Counter>,
) -> Result<Json<SignupResponse>> {
    let user = UserCore::try_from(credentials.into_inner())?;
    let id = Counter::next(&counters, USER_ID_COUNTER).await?;
    let user = User { id, user };

    // The unique username index settles races between identical signups.
    match users.insert_one(&user, None).await {
        Ok(_) => {}
        Err(e) if is_duplicate_key_error(&e) => return Err(UserError::DuplicateUsername.into()),
        Err(e) => return Err(e.into()),
    }
    info!("Registered user {id} ({})", user.username);

    Ok(Json(SignupResponse { user_id: id }))
}

#[post("/auth/login", data = "<credentials>", format = "json")]
async fn login(
    credentials: Json<Credentials>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<LoginResponse>> {
    let with_username = doc! {
        "username": credentials.username.trim(),
    };

    let user = users
        .find_one(with_username, None)
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or(UserError::InvalidCredentials)?;

    let token = AuthToken::new(&user).encode(config)?;
    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
    }))
}

#[get("/auth/validate")]
fn validate(token: Option<AuthToken>) -> Json<ValidateResponse> {
    Json(ValidateResponse {
        is_valid: token.is_some(),
        user_id: token.map(|t| t.user_id),
    })
}
