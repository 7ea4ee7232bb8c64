use crate::models::Identity;
use axum::{
    extract::Request,
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

pub const SESSION_COOKIE: &str = "username";

/// Reads the `username` cookie. The cookie is unsigned, so this is a
/// convenience lookup, not authentication.
pub fn username_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Attaches an [`Identity`] extension when a session cookie is present.
/// Handlers decide whether an identity is required.
pub async fn session_middleware(mut req: Request, next: Next) -> Response {
    if let Some(username) = username_from_cookies(req.headers()) {
        req.extensions_mut().insert(Identity(username));
    }
    next.run(req).await
}
