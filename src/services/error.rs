use crate::services::staging::StagingError;
use thiserror::Error;

/// Failures of the grant and commit protocol.
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("no identity associated with the request")]
    IdentityMissing,

    #[error("invalid upload: {0}")]
    InvalidUpload(StagingError),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("user {0} has no avatar")]
    AvatarMissing(String),

    /// `orphaned` is the promoted key the losing commit left unreferenced.
    #[error("avatar was modified by a concurrent commit")]
    ConcurrentModification { orphaned: Option<String> },

    #[error("upstream store unavailable: {0}")]
    UpstreamUnavailable(#[source] anyhow::Error),
}

impl From<StagingError> for AvatarError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::Upstream(e) => AvatarError::UpstreamUnavailable(e),
            other => AvatarError::InvalidUpload(other),
        }
    }
}
