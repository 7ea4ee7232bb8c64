//! Tag-based staging: an uploaded object is staged while it carries
//! `Status=Pending`. Promotion strips that tag and keeps the key.

use crate::config::AppConfig;
use crate::services::storage::{BlobStore, ObjectHead};
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use thiserror::Error;

pub const STATUS_TAG: &str = "Status";
pub const PENDING_STATUS: &str = "Pending";
/// Stamped at promotion. The store's last-modified time stays at the
/// upload time because retagging does not rewrite the object.
pub const PROMOTED_AT_TAG: &str = "Promoted-At";
pub const USERNAME_METADATA: &str = "username";
pub const UPLOAD_TOKEN_METADATA: &str = "upload-token";

/// Tagging document a grant forces the upload to carry.
pub const PENDING_TAGGING: &str =
    "<Tagging><TagSet><Tag><Key>Status</Key><Value>Pending</Value></Tag></TagSet></Tagging>";

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("malformed object key")]
    MalformedKey,

    #[error("object {0} is not staged")]
    NotStaged(String),

    #[error("staged object is bound to a different identity")]
    IdentityMismatch,

    #[error("upload token does not match")]
    TokenMismatch,

    #[error("staged object violates upload policy: {0}")]
    PolicyViolation(String),

    #[error("blob store error: {0}")]
    Upstream(#[source] anyhow::Error),
}

/// An uploaded object that has not been promoted yet.
#[derive(Debug, Clone)]
pub struct StagedObject {
    pub key: String,
    pub username: Option<String>,
    pub upload_token: Option<String>,
    pub head: ObjectHead,
}

pub fn is_pending(head: &ObjectHead) -> bool {
    head.tags
        .get(STATUS_TAG)
        .is_some_and(|status| status == PENDING_STATUS)
}

pub fn promoted_at(head: &ObjectHead) -> Option<DateTime<Utc>> {
    head.tags
        .get(PROMOTED_AT_TAG)
        .and_then(|stamp| DateTime::parse_from_rfc3339(stamp).ok())
        .map(|stamp| stamp.with_timezone(&Utc))
}

/// Server-issued keys are never empty and never contain path separators.
fn is_acceptable_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= 256 && !key.contains('/') && !key.contains("..")
}

pub struct StagingTracker {
    blobs: Arc<dyn BlobStore>,
    max_upload_size: u64,
    content_type_prefix: String,
}

impl StagingTracker {
    pub fn new(blobs: Arc<dyn BlobStore>, config: &AppConfig) -> Self {
        Self {
            blobs,
            max_upload_size: config.max_upload_size,
            content_type_prefix: config.content_type_prefix.clone(),
        }
    }

    pub async fn is_staged(&self, key: &str) -> Result<bool, StagingError> {
        match self.inspect(key).await {
            Ok(_) => Ok(true),
            Err(StagingError::NotStaged(_)) | Err(StagingError::MalformedKey) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Loads a staged object. Absent or already-promoted objects are `NotStaged`.
    pub async fn inspect(&self, key: &str) -> Result<StagedObject, StagingError> {
        if !is_acceptable_key(key) {
            return Err(StagingError::MalformedKey);
        }

        let head = self
            .blobs
            .head_object(key)
            .await
            .map_err(StagingError::Upstream)?
            .filter(is_pending)
            .ok_or_else(|| StagingError::NotStaged(key.to_string()))?;

        Ok(StagedObject {
            key: key.to_string(),
            username: head.metadata.get(USERNAME_METADATA).cloned(),
            upload_token: head.metadata.get(UPLOAD_TOKEN_METADATA).cloned(),
            head,
        })
    }

    /// Checks that the staged object belongs to `username` and was uploaded
    /// with the grant whose token is `upload_token`.
    pub async fn verify(
        &self,
        key: &str,
        username: &str,
        upload_token: Option<&str>,
    ) -> Result<StagedObject, StagingError> {
        let staged = self.inspect(key).await?;

        if staged.username.as_deref() != Some(username) {
            return Err(StagingError::IdentityMismatch);
        }

        match (staged.upload_token.as_deref(), upload_token) {
            (Some(expected), Some(supplied)) if expected == supplied => {}
            _ => return Err(StagingError::TokenMismatch),
        }

        let content_type = staged.head.content_type.as_deref().unwrap_or_default();
        if !content_type.starts_with(&self.content_type_prefix) {
            return Err(StagingError::PolicyViolation(format!(
                "content type '{}' is not allowed",
                content_type
            )));
        }
        if staged.head.size < 0 || staged.head.size as u64 > self.max_upload_size {
            return Err(StagingError::PolicyViolation(format!(
                "size {} exceeds {} bytes",
                staged.head.size, self.max_upload_size
            )));
        }

        Ok(staged)
    }

    /// Replaces the pending marker with a promotion stamp and returns the
    /// committed key, which is the staged key itself. Unrelated tags
    /// survive promotion.
    pub async fn promote(&self, staged: &StagedObject) -> Result<String, StagingError> {
        let mut tags = staged.head.tags.clone();
        tags.remove(STATUS_TAG);
        tags.insert(
            PROMOTED_AT_TAG.to_string(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        );

        self.blobs
            .set_tags(&staged.key, &tags)
            .await
            .map_err(StagingError::Upstream)?;

        tracing::debug!("Promoted staged object {}", staged.key);
        Ok(staged.key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn head_with_tags(tags: &[(&str, &str)]) -> ObjectHead {
        ObjectHead {
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            ..ObjectHead::default()
        }
    }

    #[test]
    fn test_pending_marker_detection() {
        assert!(is_pending(&head_with_tags(&[("Status", "Pending")])));
        assert!(!is_pending(&head_with_tags(&[("Status", "Done")])));
        assert!(!is_pending(&head_with_tags(&[])));
    }

    #[test]
    fn test_promotion_stamp_parsing() {
        let stamped = head_with_tags(&[("Promoted-At", "2026-03-01T08:15:00Z")]);
        assert_eq!(
            promoted_at(&stamped).map(|t| t.to_rfc3339()),
            Some("2026-03-01T08:15:00+00:00".to_string())
        );
        assert!(promoted_at(&head_with_tags(&[("Promoted-At", "yesterday")])).is_none());
        assert!(promoted_at(&head_with_tags(&[])).is_none());
    }

    #[test]
    fn test_key_acceptance() {
        assert!(is_acceptable_key("0f1e2d3c4b5a69788796a5b4c3d2e1f0"));
        assert!(!is_acceptable_key(""));
        assert!(!is_acceptable_key("pending/abc"));
        assert!(!is_acceptable_key("..abc"));
    }
}
