use rocket::{http::Status, serde::json::Json, Catcher, Request, Route};

use crate::model::api::error::ErrorResponse;

mod auth;
mod comments;
mod polls;
mod votes;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(comments::routes());
    routes.extend(polls::routes());
    routes.extend(votes::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Render any error that did not come from a handler, such as a failed
/// request guard or an unknown route, in the same JSON shape as handler errors.
#[catch(default)]
fn default_catcher(status: Status, req: &Request<'_>) -> Json<ErrorResponse> {
    let detail = match status.code {
        401 => "Authentication required.",
        404 => "The requested resource does not exist.",
        422 | 400 => "The request could not be understood.",
        _ if status.code >= 500 => "An unexpected error occurred.",
        _ => "The request could not be processed.",
    };
    Json(ErrorResponse::from_status(
        status,
        detail,
        req.uri().path().to_string(),
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use rocket::{
        http::{ContentType, Header},
        local::asynchronous::Client,
    };

    use super::*;
    use crate::model::{api::auth::AuthToken, api::error::ErrorCategory};
    use crate::Config;

    /// An `Authorization` header for the given user.
    pub fn bearer(client: &Client, user_id: u32) -> Header<'static> {
        let config = client.rocket().state::<Config>().unwrap();
        let jwt = AuthToken { user_id }.encode(config).unwrap();
        Header::new("Authorization", format!("Bearer {jwt}"))
    }

    #[backend_test]
    async fn unknown_route_is_json(client: Client) {
        let response = client.get("/no/such/thing").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        assert_eq!(response.content_type(), Some(ContentType::JSON));

        let body: ErrorResponse = response.into_json().await.unwrap();
        assert_eq!(body.status, 404);
        assert_eq!(body.category, ErrorCategory::NotFound);
        assert_eq!(body.instance, "/no/such/thing");
    }
}
