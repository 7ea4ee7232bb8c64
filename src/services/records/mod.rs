mod dynamodb;
mod sql;

pub use dynamodb::DynamoRecordStore;
pub use sql::SqlRecordStore;

use crate::models::{UpdateOutcome, UserRecord};
use anyhow::Result;
use async_trait::async_trait;

/// Key-value table of user records with single-key conditional writes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Sets `avatar` to `new_avatar` only if it currently equals `expected`
    /// (`None` meaning the user has no avatar yet). A missing user never
    /// satisfies the condition.
    async fn conditional_update_avatar(
        &self,
        username: &str,
        expected: Option<&str>,
        new_avatar: &str,
    ) -> Result<UpdateOutcome>;

    async fn scan(&self) -> Result<Vec<UserRecord>>;
}
