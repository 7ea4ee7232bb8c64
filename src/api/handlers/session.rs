use crate::api::error::AppError;
use crate::api::middleware::session::SESSION_COOKIE;
use crate::models::Identity;
use axum::{
    Extension, Json,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Serialize, ToSchema)]
pub struct WhoAmIResponse {
    pub username: Option<String>,
}

fn is_cookie_safe(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= 64
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
}

/// Development sign-in: sets an unsigned `username` cookie.
#[utoipa::path(
    put,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session cookie set"),
        (status = 400, description = "Username not usable as a cookie value")
    ),
    tag = "session"
)]
pub async fn login(Json(payload): Json<LoginRequest>) -> Result<impl IntoResponse, AppError> {
    if !is_cookie_safe(&payload.username) {
        return Err(AppError::BadRequest("Invalid username".to_string()));
    }

    let cookie = format!("{}={}; Path=/; SameSite=Lax", SESSION_COOKIE, payload.username);
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

#[utoipa::path(
    get,
    path = "/whoami",
    responses(
        (status = 200, description = "Current session identity", body = WhoAmIResponse)
    ),
    tag = "session"
)]
pub async fn whoami(identity: Option<Extension<Identity>>) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        username: identity.map(|Extension(Identity(username))| username),
    })
}
