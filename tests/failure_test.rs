mod common;

use async_trait::async_trait;
use avatar_backend::api::error::AppError;
use avatar_backend::config::AppConfig;
use avatar_backend::models::{Identity, UpdateOutcome, UserRecord};
use avatar_backend::services::avatar_service::AvatarService;
use avatar_backend::services::error::AvatarError;
use avatar_backend::services::grant::{GrantIssuer, UploadGrant};
use avatar_backend::services::records::RecordStore;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::{FaultyBlobStore, MockBlobStore, setup_records};
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// Reads succeed; every conditional write fails as if the table were unreachable.
struct UnwritableRecords {
    inner: Arc<dyn RecordStore>,
}

#[async_trait]
impl RecordStore for UnwritableRecords {
    async fn get(&self, username: &str) -> anyhow::Result<Option<UserRecord>> {
        self.inner.get(username).await
    }

    async fn conditional_update_avatar(
        &self,
        _username: &str,
        _expected: Option<&str>,
        _new_avatar: &str,
    ) -> anyhow::Result<UpdateOutcome> {
        Err(anyhow::anyhow!("record store timed out"))
    }

    async fn scan(&self) -> anyhow::Result<Vec<UserRecord>> {
        self.inner.scan().await
    }
}

struct Fixture {
    blobs: Arc<MockBlobStore>,
    faulty: Arc<FaultyBlobStore>,
    records: Arc<dyn RecordStore>,
    grant: UploadGrant,
    bob: Identity,
}

/// Bob already has `base` as avatar and has staged a new upload.
async fn fixture() -> Fixture {
    let blobs = Arc::new(MockBlobStore::new());
    blobs.put_object("base", "image/png", &[], &[], b"base");
    let faulty = Arc::new(FaultyBlobStore::new(blobs.clone()));
    let records: Arc<dyn RecordStore> = Arc::new(setup_records(&[("bob", Some("base"))]).await);

    let bob = Identity("bob".to_string());
    let issuer = GrantIssuer::new(faulty.clone(), AppConfig::default());
    let grant = issuer.issue(Some(&bob)).await.unwrap();
    blobs.upload_with_grant(&grant, "image/png", b"new");

    Fixture {
        blobs,
        faulty,
        records,
        grant,
        bob,
    }
}

async fn current_avatar(records: &Arc<dyn RecordStore>) -> Option<String> {
    records.get("bob").await.unwrap().unwrap().avatar
}

#[tokio::test]
async fn test_promotion_failure_aborts_commit_before_any_change() {
    let f = fixture().await;
    f.faulty.fail_tagging.store(true, Ordering::SeqCst);
    let service = AvatarService::new(f.faulty.clone(), f.records.clone(), &AppConfig::default());

    let err = service
        .commit_avatar(&f.bob, &f.grant.key, Some(&f.grant.upload_token))
        .await
        .unwrap_err();

    assert!(matches!(err, AvatarError::UpstreamUnavailable(_)));
    assert_eq!(
        AppError::from(err).into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(current_avatar(&f.records).await.as_deref(), Some("base"));
    assert!(f.blobs.exists("base"));
    assert_eq!(
        f.blobs.tags_of(&f.grant.key).get("Status").map(String::as_str),
        Some("Pending")
    );
}

#[tokio::test]
async fn test_record_failure_after_promotion_leaves_unreferenced_blob() {
    let f = fixture().await;
    let unwritable: Arc<dyn RecordStore> = Arc::new(UnwritableRecords {
        inner: f.records.clone(),
    });
    let service = AvatarService::new(f.faulty.clone(), unwritable, &AppConfig::default());

    let err = service
        .commit_avatar(&f.bob, &f.grant.key, Some(&f.grant.upload_token))
        .await
        .unwrap_err();

    assert!(matches!(err, AvatarError::UpstreamUnavailable(_)));
    assert_eq!(
        AppError::from(err).into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(current_avatar(&f.records).await.as_deref(), Some("base"));
    assert!(f.blobs.exists("base"));

    // Promoted, so no longer committable, and referenced by nobody.
    assert!(f.blobs.exists(&f.grant.key));
    let tags = f.blobs.tags_of(&f.grant.key);
    assert!(!tags.contains_key("Status"));
    assert!(tags.contains_key("Promoted-At"));
    let referenced: Vec<_> = f
        .records
        .scan()
        .await
        .unwrap()
        .into_iter()
        .filter_map(|r| r.avatar)
        .collect();
    assert!(!referenced.contains(&f.grant.key));
}

#[tokio::test]
async fn test_failed_cleanup_of_old_avatar_still_commits() {
    let f = fixture().await;
    f.faulty.fail_delete.store(true, Ordering::SeqCst);
    let service = AvatarService::new(f.faulty.clone(), f.records.clone(), &AppConfig::default());

    let receipt = service
        .commit_avatar(&f.bob, &f.grant.key, Some(&f.grant.upload_token))
        .await
        .unwrap();

    assert_eq!(receipt.avatar, f.grant.key);
    assert_eq!(receipt.replaced.as_deref(), Some("base"));
    assert_eq!(
        current_avatar(&f.records).await.as_deref(),
        Some(f.grant.key.as_str())
    );
    // The superseded blob could not be reclaimed and is left behind.
    assert!(f.blobs.exists("base"));
}
