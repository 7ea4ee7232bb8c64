use crate::services::post_policy::{SigningCredentials, build_post_fields};
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{Tag, Tagging};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use utoipa::ToSchema;

/// Constraints attached to a direct-to-store upload.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_size: u64,
    pub content_type_prefix: String,
    /// Form fields the upload must carry with exactly these values.
    pub required_fields: BTreeMap<String, String>,
    pub expires_in: Duration,
}

/// A signed form the client posts its file to.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PresignedPost {
    pub url: String,
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectHead {
    pub size: i64,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
    pub tags: HashMap<String, String>,
    pub last_modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn create_upload_grant(&self, key: &str, policy: &UploadPolicy) -> Result<PresignedPost>;
    /// Returns `None` when the object does not exist.
    async fn head_object(&self, key: &str) -> Result<Option<ObjectHead>>;
    async fn delete_object(&self, key: &str) -> Result<()>;
    /// Replaces the whole tag set of `key`.
    async fn set_tags(&self, key: &str, tags: &HashMap<String, String>) -> Result<()>;
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;
    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> Result<String>;
}

pub struct S3BlobStore {
    client: Client,
    bucket: String,
    endpoint_url: String,
    signing: SigningCredentials,
}

impl S3BlobStore {
    pub fn new(
        client: Client,
        bucket: String,
        endpoint_url: String,
        signing: SigningCredentials,
    ) -> Self {
        Self {
            client,
            bucket,
            endpoint_url,
            signing,
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn create_upload_grant(&self, key: &str, policy: &UploadPolicy) -> Result<PresignedPost> {
        let fields = build_post_fields(&self.bucket, key, policy, &self.signing, Utc::now())?;

        Ok(PresignedPost {
            url: format!("{}/{}", self.endpoint_url.trim_end_matches('/'), self.bucket),
            fields,
        })
    }

    async fn head_object(&self, key: &str) -> Result<Option<ObjectHead>> {
        let head = self.client.head_object().bucket(&self.bucket).key(key).send();
        let tagging = self
            .client
            .get_object_tagging()
            .bucket(&self.bucket)
            .key(key)
            .send();

        let (head, tagging) = tokio::join!(head, tagging);

        let head = match head {
            Ok(head) => head,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    return Ok(None);
                }
                return Err(anyhow::anyhow!(service_error));
            }
        };
        let tagging = tagging.map_err(|e| anyhow::anyhow!(e.into_service_error()))?;

        let last_modified = head.last_modified().map(|d| {
            DateTime::from_timestamp(d.secs(), d.subsec_nanos()).unwrap_or_default()
        });
        let tags = tagging
            .tag_set()
            .iter()
            .map(|tag| (tag.key().to_string(), tag.value().to_string()))
            .collect();

        Ok(Some(ObjectHead {
            size: head.content_length().unwrap_or(0),
            content_type: head.content_type().map(str::to_string),
            metadata: head.metadata().cloned().unwrap_or_default(),
            tags,
            last_modified,
        }))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    async fn set_tags(&self, key: &str, tags: &HashMap<String, String>) -> Result<()> {
        let tag_set = tags
            .iter()
            .map(|(k, v)| Tag::builder().key(k).value(v).build())
            .collect::<Result<Vec<_>, _>>()?;
        let tagging = Tagging::builder().set_tag_set(Some(tag_set)).build()?;

        self.client
            .put_object_tagging()
            .bucket(&self.bucket)
            .key(key)
            .tagging(tagging)
            .send()
            .await?;
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let res = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token)
                .send()
                .await?;

            if let Some(contents) = res.contents {
                for object in contents {
                    if let Some(key) = object.key {
                        objects.push(key);
                    }
                }
            }

            if res.is_truncated.unwrap_or(false) {
                continuation_token = res.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(objects)
    }

    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(PresigningConfig::expires_in(expires_in)?)
            .await?;

        Ok(presigned.uri().to_string())
    }
}
