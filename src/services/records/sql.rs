use super::RecordStore;
use crate::entities::{prelude::*, users};
use crate::models::{UpdateOutcome, UserRecord};
use anyhow::Result;
use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

impl From<users::Model> for UserRecord {
    fn from(model: users::Model) -> Self {
        Self {
            username: model.username,
            name: model.name,
            avatar: model.avatar,
        }
    }
}

/// Record store over any sea-orm connection (SQLite, Postgres).
pub struct SqlRecordStore {
    db: DatabaseConnection,
}

impl SqlRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SqlRecordStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>> {
        let user = Users::find_by_id(username.to_string()).one(&self.db).await?;
        Ok(user.map(UserRecord::from))
    }

    async fn conditional_update_avatar(
        &self,
        username: &str,
        expected: Option<&str>,
        new_avatar: &str,
    ) -> Result<UpdateOutcome> {
        let update = Users::update_many()
            .col_expr(users::Column::Avatar, Expr::value(new_avatar))
            .filter(users::Column::Username.eq(username));

        // Single statement: the comparison and the write are atomic.
        let update = match expected {
            Some(old) => update.filter(users::Column::Avatar.eq(old)),
            None => update.filter(users::Column::Avatar.is_null()),
        };

        let res = update.exec(&self.db).await?;

        if res.rows_affected == 1 {
            Ok(UpdateOutcome::Applied)
        } else {
            Ok(UpdateOutcome::ConditionFailed)
        }
    }

    async fn scan(&self) -> Result<Vec<UserRecord>> {
        let users = Users::find().all(&self.db).await?;
        Ok(users.into_iter().map(UserRecord::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::run_migrations;
    use sea_orm::{ActiveModelTrait, Database, Set};

    async fn store_with(username: &str, avatar: Option<&str>) -> SqlRecordStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        run_migrations(&db).await.unwrap();
        users::ActiveModel {
            username: Set(username.to_string()),
            name: Set(username.to_uppercase()),
            avatar: Set(avatar.map(str::to_string)),
        }
        .insert(&db)
        .await
        .unwrap();
        SqlRecordStore::new(db)
    }

    #[tokio::test]
    async fn test_conditional_update_applies_on_match() {
        let store = store_with("alice", Some("old123")).await;

        let outcome = store
            .conditional_update_avatar("alice", Some("old123"), "newkey1")
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::Applied);
        let record = store.get("alice").await.unwrap().unwrap();
        assert_eq!(record.avatar.as_deref(), Some("newkey1"));
    }

    #[tokio::test]
    async fn test_conditional_update_rejects_stale_expectation() {
        let store = store_with("bob", Some("base")).await;

        let first = store
            .conditional_update_avatar("bob", Some("base"), "k1")
            .await
            .unwrap();
        let second = store
            .conditional_update_avatar("bob", Some("base"), "k2")
            .await
            .unwrap();

        assert_eq!(first, UpdateOutcome::Applied);
        assert_eq!(second, UpdateOutcome::ConditionFailed);
        let record = store.get("bob").await.unwrap().unwrap();
        assert_eq!(record.avatar.as_deref(), Some("k1"));
    }

    #[tokio::test]
    async fn test_first_avatar_expects_none() {
        let store = store_with("carol", None).await;

        let wrong = store
            .conditional_update_avatar("carol", Some("anything"), "k1")
            .await
            .unwrap();
        let right = store
            .conditional_update_avatar("carol", None, "k1")
            .await
            .unwrap();

        assert_eq!(wrong, UpdateOutcome::ConditionFailed);
        assert_eq!(right, UpdateOutcome::Applied);
    }

    #[tokio::test]
    async fn test_missing_user_never_matches() {
        let store = store_with("alice", None).await;

        let outcome = store
            .conditional_update_avatar("mallory", None, "k1")
            .await
            .unwrap();

        assert_eq!(outcome, UpdateOutcome::ConditionFailed);
        assert!(store.get("mallory").await.unwrap().is_none());
        assert_eq!(store.scan().await.unwrap().len(), 1);
    }
}
