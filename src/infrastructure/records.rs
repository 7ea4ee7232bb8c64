use crate::config::{AppConfig, RecordBackend};
use crate::infrastructure::{database, seed};
use crate::services::records::{DynamoRecordStore, RecordStore, SqlRecordStore};
use std::env;
use std::sync::Arc;
use tracing::info;

pub async fn setup_records(config: &AppConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    match config.record_backend {
        RecordBackend::Sql => {
            let db = database::setup_database().await?;
            seed::seed_users(&db, &config.seed_users).await?;
            Ok(Arc::new(SqlRecordStore::new(db)))
        }
        RecordBackend::DynamoDb => {
            info!("🗄️  DynamoDB record store (Table: {})", config.dynamodb_table);

            let mut loader = aws_config::from_env();
            if let Ok(endpoint) = env::var("DYNAMODB_ENDPOINT") {
                loader = loader.endpoint_url(endpoint);
            }
            let aws_config = loader.load().await;
            let client = aws_sdk_dynamodb::Client::new(&aws_config);

            if !config.seed_users.is_empty() {
                tracing::warn!("SEED_USERS is ignored for the dynamodb record store");
            }

            Ok(Arc::new(DynamoRecordStore::new(
                client,
                config.dynamodb_table.clone(),
            )))
        }
    }
}
