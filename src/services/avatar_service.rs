use crate::config::AppConfig;
use crate::models::{Identity, UpdateOutcome};
use crate::services::error::AvatarError;
use crate::services::records::RecordStore;
use crate::services::staging::StagingTracker;
use crate::services::storage::BlobStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

/// Acknowledgement of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CommitReceipt {
    pub username: String,
    pub avatar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<String>,
}

/// Signed, time-limited location of a user's committed avatar.
#[derive(Debug, Clone)]
pub struct AvatarLocation {
    pub key: String,
    pub url: String,
}

/// A blob that exists but that no user record references.
///
/// Nothing reconciles these automatically; they are logged so that an
/// out-of-band collector (or the orphan sweeper) can pick them up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedBlob {
    pub key: String,
    pub username: String,
    pub reason: &'static str,
}

impl OrphanedBlob {
    fn report(&self) {
        tracing::warn!(
            orphan_key = %self.key,
            username = %self.username,
            reason = self.reason,
            "🧟 Orphaned blob left in store"
        );
    }
}

/// Commits staged uploads as avatars.
///
/// Read of the current record and the final write are not transactional:
/// the conditional update is the only guard, and losing it fails the commit.
pub struct AvatarService {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    staging: StagingTracker,
    read_url_expiry: Duration,
}

impl AvatarService {
    pub fn new(blobs: Arc<dyn BlobStore>, records: Arc<dyn RecordStore>, config: &AppConfig) -> Self {
        Self {
            staging: StagingTracker::new(blobs.clone(), config),
            blobs,
            records,
            read_url_expiry: Duration::from_secs(config.read_url_expiry_secs),
        }
    }

    pub fn staging(&self) -> &StagingTracker {
        &self.staging
    }

    pub async fn commit_avatar(
        &self,
        identity: &Identity,
        key: &str,
        upload_token: Option<&str>,
    ) -> Result<CommitReceipt, AvatarError> {
        let username = identity.as_str();

        // 1. The staged object must be ours, pending, and within policy.
        let staged = self.staging.verify(key, username, upload_token).await?;

        // 2. Snapshot the current pointer for the conditional write.
        let record = self
            .records
            .get(username)
            .await
            .map_err(AvatarError::UpstreamUnavailable)?
            .ok_or_else(|| AvatarError::UserNotFound(username.to_string()))?;
        let old_avatar = record.avatar;

        // 3. Promotion is not undone if the write below fails.
        let new_avatar = self.staging.promote(&staged).await?;

        // 4. Swap the pointer only if nobody else did since step 2.
        let outcome = self
            .records
            .conditional_update_avatar(username, old_avatar.as_deref(), &new_avatar)
            .await;

        match outcome {
            Ok(UpdateOutcome::Applied) => {}
            Ok(UpdateOutcome::ConditionFailed) => {
                tracing::info!("⚔️  Concurrent avatar commit for user={} rejected", username);

                // A concurrent commit of the same staged key leaves it referenced.
                let current = self
                    .records
                    .get(username)
                    .await
                    .ok()
                    .flatten()
                    .and_then(|record| record.avatar);
                if current.as_deref() == Some(new_avatar.as_str()) {
                    return Err(AvatarError::ConcurrentModification { orphaned: None });
                }

                OrphanedBlob {
                    key: new_avatar.clone(),
                    username: username.to_string(),
                    reason: "lost conditional update",
                }
                .report();
                return Err(AvatarError::ConcurrentModification {
                    orphaned: Some(new_avatar),
                });
            }
            Err(e) => {
                OrphanedBlob {
                    key: new_avatar,
                    username: username.to_string(),
                    reason: "record store failed after promotion",
                }
                .report();
                return Err(AvatarError::UpstreamUnavailable(e));
            }
        }

        // 5. The superseded blob is no longer referenced; reclaim it.
        if let Some(old) = old_avatar.as_deref().filter(|old| *old != new_avatar)
            && let Err(e) = self.blobs.delete_object(old).await
        {
            tracing::error!("Failed to delete superseded avatar {}: {}", old, e);
            OrphanedBlob {
                key: old.to_string(),
                username: username.to_string(),
                reason: "superseded avatar delete failed",
            }
            .report();
        }

        tracing::info!(
            "🖼️  Avatar committed: user={} avatar={} replaced={:?}",
            username,
            new_avatar,
            old_avatar
        );

        Ok(CommitReceipt {
            username: username.to_string(),
            avatar: new_avatar,
            replaced: old_avatar,
        })
    }

    /// Resolves a user's committed avatar to a fresh signed read URL.
    pub async fn resolve_avatar(&self, username: &str) -> Result<AvatarLocation, AvatarError> {
        let record = self
            .records
            .get(username)
            .await
            .map_err(AvatarError::UpstreamUnavailable)?
            .ok_or_else(|| AvatarError::UserNotFound(username.to_string()))?;

        let key = record
            .avatar
            .ok_or_else(|| AvatarError::AvatarMissing(username.to_string()))?;

        let url = self
            .blobs
            .presigned_get_url(&key, self.read_url_expiry)
            .await
            .map_err(AvatarError::UpstreamUnavailable)?;

        Ok(AvatarLocation { key, url })
    }
}
