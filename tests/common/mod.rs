#![allow(dead_code)]

use async_trait::async_trait;
use avatar_backend::entities::users;
use avatar_backend::infrastructure::database;
use avatar_backend::services::grant::UploadGrant;
use avatar_backend::services::records::SqlRecordStore;
use avatar_backend::services::staging::PENDING_TAGGING;
use avatar_backend::services::storage::{BlobStore, ObjectHead, PresignedPost, UploadPolicy};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, Database, Set};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MOCK_BUCKET_URL: &str = "http://mock-blob.local/avatars";

#[derive(Clone)]
struct MockObject {
    data: Vec<u8>,
    content_type: Option<String>,
    metadata: HashMap<String, String>,
    tags: HashMap<String, String>,
    last_modified: DateTime<Utc>,
}

pub struct MockBlobStore {
    objects: Mutex<HashMap<String, MockObject>>,
    signatures: AtomicU64,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            signatures: AtomicU64::new(0),
        }
    }

    /// Stores an object the way the real store would after a POST that
    /// satisfied `grant`.
    pub fn upload_with_grant(&self, grant: &UploadGrant, content_type: &str, data: &[u8]) {
        let metadata = grant
            .fields
            .iter()
            .filter_map(|(k, v)| k.strip_prefix("x-amz-meta-").map(|m| (m.to_string(), v.clone())))
            .collect();
        let mut tags = HashMap::new();
        if grant.fields.get("tagging").map(String::as_str) == Some(PENDING_TAGGING) {
            tags.insert("Status".to_string(), "Pending".to_string());
        }

        self.objects.lock().unwrap().insert(
            grant.key.clone(),
            MockObject {
                data: data.to_vec(),
                content_type: Some(content_type.to_string()),
                metadata,
                tags,
                last_modified: Utc::now(),
            },
        );
    }

    pub fn put_object(
        &self,
        key: &str,
        content_type: &str,
        metadata: &[(&str, &str)],
        tags: &[(&str, &str)],
        data: &[u8],
    ) {
        let to_map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>()
        };
        self.objects.lock().unwrap().insert(
            key.to_string(),
            MockObject {
                data: data.to_vec(),
                content_type: Some(content_type.to_string()),
                metadata: to_map(metadata),
                tags: to_map(tags),
                last_modified: Utc::now(),
            },
        );
    }

    pub fn exists(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn tags_of(&self, key: &str) -> HashMap<String, String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.tags.clone())
            .unwrap_or_default()
    }

    pub fn backdate(&self, key: &str, age: Duration) {
        if let Some(object) = self.objects.lock().unwrap().get_mut(key) {
            object.last_modified = Utc::now() - chrono::Duration::from_std(age).unwrap();
        }
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn create_upload_grant(&self, key: &str, policy: &UploadPolicy) -> anyhow::Result<PresignedPost> {
        let mut fields = policy.required_fields.clone();
        fields.insert("key".to_string(), key.to_string());
        Ok(PresignedPost {
            url: MOCK_BUCKET_URL.to_string(),
            fields,
        })
    }

    async fn head_object(&self, key: &str) -> anyhow::Result<Option<ObjectHead>> {
        Ok(self.objects.lock().unwrap().get(key).map(|o| ObjectHead {
            size: o.data.len() as i64,
            content_type: o.content_type.clone(),
            metadata: o.metadata.clone(),
            tags: o.tags.clone(),
            last_modified: Some(o.last_modified),
        }))
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn set_tags(&self, key: &str, tags: &HashMap<String, String>) -> anyhow::Result<()> {
        let mut objects = self.objects.lock().unwrap();
        let object = objects
            .get_mut(key)
            .ok_or_else(|| anyhow::anyhow!("Key not found"))?;
        object.tags = tags.clone();
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> anyhow::Result<String> {
        if !self.exists(key) {
            return Err(anyhow::anyhow!("Key not found"));
        }
        let signature = self.signatures.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "{}/{}?X-Amz-Expires={}&X-Amz-Signature={:064x}",
            MOCK_BUCKET_URL,
            key,
            expires_in.as_secs(),
            signature
        ))
    }
}

/// Delegates to a `MockBlobStore`, failing whichever operations are switched on.
pub struct FaultyBlobStore {
    pub inner: Arc<MockBlobStore>,
    pub fail_head: AtomicBool,
    pub fail_tagging: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FaultyBlobStore {
    pub fn new(inner: Arc<MockBlobStore>) -> Self {
        Self {
            inner,
            fail_head: AtomicBool::new(false),
            fail_tagging: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    fn check(flag: &AtomicBool, operation: &str) -> anyhow::Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("blob store unavailable during {}", operation));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    async fn create_upload_grant(&self, key: &str, policy: &UploadPolicy) -> anyhow::Result<PresignedPost> {
        self.inner.create_upload_grant(key, policy).await
    }

    async fn head_object(&self, key: &str) -> anyhow::Result<Option<ObjectHead>> {
        Self::check(&self.fail_head, "head")?;
        self.inner.head_object(key).await
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete_object(key).await
    }

    async fn set_tags(&self, key: &str, tags: &HashMap<String, String>) -> anyhow::Result<()> {
        Self::check(&self.fail_tagging, "tagging")?;
        self.inner.set_tags(key, tags).await
    }

    async fn list_objects(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        self.inner.list_objects(prefix).await
    }

    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> anyhow::Result<String> {
        self.inner.presigned_get_url(key, expires_in).await
    }
}

/// SQLite in-memory record store seeded with `(username, avatar)` rows.
pub async fn setup_records(seeds: &[(&str, Option<&str>)]) -> SqlRecordStore {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();

    for (username, avatar) in seeds {
        users::ActiveModel {
            username: Set(username.to_string()),
            name: Set(username.to_uppercase()),
            avatar: Set(avatar.map(str::to_string)),
        }
        .insert(&db)
        .await
        .unwrap();
    }

    SqlRecordStore::new(db)
}
