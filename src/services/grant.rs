use crate::config::AppConfig;
use crate::models::Identity;
use crate::services::error::AvatarError;
use crate::services::staging::{PENDING_TAGGING, UPLOAD_TOKEN_METADATA, USERNAME_METADATA};
use crate::services::storage::{BlobStore, UploadPolicy};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

/// Everything a client needs for one direct upload to the blob store.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadGrant {
    pub url: String,
    pub fields: BTreeMap<String, String>,
    pub key: String,
    pub upload_token: String,
}

/// 128 bits from the OS RNG, hex encoded.
pub fn random_hex_token() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub struct GrantIssuer {
    blobs: Arc<dyn BlobStore>,
    config: AppConfig,
}

impl GrantIssuer {
    pub fn new(blobs: Arc<dyn BlobStore>, config: AppConfig) -> Self {
        Self { blobs, config }
    }

    pub fn policy_for(&self, username: &str, upload_token: &str) -> UploadPolicy {
        let mut required_fields = BTreeMap::new();
        required_fields.insert(
            format!("x-amz-meta-{}", USERNAME_METADATA),
            username.to_string(),
        );
        required_fields.insert(
            format!("x-amz-meta-{}", UPLOAD_TOKEN_METADATA),
            upload_token.to_string(),
        );
        required_fields.insert("tagging".to_string(), PENDING_TAGGING.to_string());

        UploadPolicy {
            max_size: self.config.max_upload_size,
            content_type_prefix: self.config.content_type_prefix.clone(),
            required_fields,
            expires_in: Duration::from_secs(self.config.grant_expiry_secs),
        }
    }

    /// Issues a fresh grant. Nothing is persisted; the signed policy is the
    /// only artifact.
    pub async fn issue(&self, identity: Option<&Identity>) -> Result<UploadGrant, AvatarError> {
        let identity = identity
            .filter(|id| !id.as_str().is_empty())
            .ok_or(AvatarError::IdentityMissing)?;

        let key = random_hex_token();
        let upload_token = random_hex_token();
        let policy = self.policy_for(identity.as_str(), &upload_token);

        let post = self
            .blobs
            .create_upload_grant(&key, &policy)
            .await
            .map_err(AvatarError::UpstreamUnavailable)?;

        tracing::info!("🎫 Upload grant issued: user={} key={}", identity.as_str(), key);

        Ok(UploadGrant {
            url: post.url,
            fields: post.fields,
            key,
            upload_token,
        })
    }
}
