use crate::services::post_policy::SigningCredentials;
use crate::services::storage::S3BlobStore;
use aws_sdk_s3::config::Region;
use std::env;
use std::sync::Arc;
use tracing::info;

fn required_env(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{} must be set", name))
}

pub async fn setup_storage() -> anyhow::Result<Arc<S3BlobStore>> {
    let endpoint_url = required_env("MINIO_ENDPOINT")?;
    let access_key = required_env("MINIO_ACCESS_KEY")?;
    let secret_key = required_env("MINIO_SECRET_KEY")?;
    let bucket = required_env("MINIO_BUCKET")?;
    let region = env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string());

    info!("☁️  S3 Storage: {} (Bucket: {})", endpoint_url, bucket);

    let aws_config = aws_config::from_env()
        .endpoint_url(&endpoint_url)
        .region(Region::new(region.clone()))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    // Ensure bucket exists
    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
        Err(_) => {
            info!("🪣 Bucket '{}' not found, creating...", bucket);
            if let Err(e) = s3_client.create_bucket().bucket(&bucket).send().await {
                tracing::error!("❌ Failed to create bucket '{}': {}", bucket, e);
            } else {
                info!("✅ Bucket '{}' created successfully", bucket);
            }
        }
    }

    let signing = SigningCredentials {
        access_key_id: access_key,
        secret_access_key: secret_key,
        session_token: None,
        region,
    };

    Ok(Arc::new(S3BlobStore::new(
        s3_client,
        bucket,
        endpoint_url,
        signing,
    )))
}
