use crate::AppState;
use crate::api::error::AppError;
use crate::models::Identity;
use crate::services::avatar_service::CommitReceipt;
use crate::services::error::AvatarError;
use crate::services::grant::UploadGrant;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitAvatarRequest {
    /// Object key from the upload grant
    pub key: String,
    /// Token from the same grant
    pub upload_token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/get_upload_url",
    responses(
        (status = 200, description = "Signed upload grant", body = UploadGrant),
        (status = 401, description = "No session")
    ),
    tag = "avatar"
)]
pub async fn get_upload_url(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
) -> Result<Json<UploadGrant>, AppError> {
    let identity = identity.map(|Extension(identity)| identity);
    let grant = state.grants.issue(identity.as_ref()).await?;
    Ok(Json(grant))
}

#[utoipa::path(
    post,
    path = "/update_avatar",
    request_body = CommitAvatarRequest,
    responses(
        (status = 200, description = "Avatar committed", body = CommitReceipt),
        (status = 400, description = "Staged object missing, not owned, or token mismatch"),
        (status = 401, description = "No session"),
        (status = 404, description = "User record not found"),
        (status = 409, description = "Lost a concurrent commit; request a new grant")
    ),
    tag = "avatar"
)]
pub async fn update_avatar(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    Json(payload): Json<CommitAvatarRequest>,
) -> Result<Json<CommitReceipt>, AppError> {
    let Some(Extension(identity)) = identity else {
        return Err(AvatarError::IdentityMissing.into());
    };

    let receipt = state
        .avatars
        .commit_avatar(&identity, &payload.key, payload.upload_token.as_deref())
        .await?;

    Ok(Json(receipt))
}

#[utoipa::path(
    get,
    path = "/user/{username}/avatar",
    params(
        ("username" = String, Path, description = "User whose avatar to resolve")
    ),
    responses(
        (status = 303, description = "Redirect to a signed, time-limited read URL"),
        (status = 404, description = "User or avatar not found")
    ),
    tag = "avatar"
)]
pub async fn get_user_avatar(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let location = state.avatars.resolve_avatar(&username).await?;

    tracing::debug!("📎 Avatar redirect for user={} key={}", username, location.key);

    Ok(Redirect::to(&location.url))
}
