use crate::entities::{prelude::*, users};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use tracing::info;

/// Inserts missing users without an avatar. Existing rows are left alone.
pub async fn seed_users(db: &DatabaseConnection, seeds: &[(String, String)]) -> anyhow::Result<()> {
    if seeds.is_empty() {
        return Ok(());
    }

    info!("🌱 Seeding {} user record(s)...", seeds.len());

    for (username, name) in seeds {
        let exists = Users::find_by_id(username.clone()).one(db).await?;

        if exists.is_none() {
            users::ActiveModel {
                username: Set(username.clone()),
                name: Set(name.clone()),
                avatar: Set(None),
            }
            .insert(db)
            .await?;
            info!("   - Seeded user '{}'", username);
        }
    }

    Ok(())
}
