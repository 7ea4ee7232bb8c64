use super::RecordStore;
use crate::models::{UpdateOutcome, UserRecord};
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;

/// DynamoDB-backed implementation of [`RecordStore`].
///
/// One item per user keyed by the string attribute `Username`, with `Name`
/// and an optional `Avatar`. Conditional writes use a `ConditionExpression`
/// on `Avatar`, so read-then-write races surface as
/// [`UpdateOutcome::ConditionFailed`] instead of lost updates.
pub struct DynamoRecordStore {
    client: Client,
    table_name: String,
}

impl DynamoRecordStore {
    pub fn new(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

fn string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).cloned()
}

/// Items without a `Username` string are skipped.
fn record_from_item(item: &HashMap<String, AttributeValue>) -> Option<UserRecord> {
    Some(UserRecord {
        username: string_attr(item, "Username")?,
        name: string_attr(item, "Name").unwrap_or_default(),
        avatar: string_attr(item, "Avatar"),
    })
}

#[async_trait]
impl RecordStore for DynamoRecordStore {
    async fn get(&self, username: &str) -> Result<Option<UserRecord>> {
        let res = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("Username", AttributeValue::S(username.to_owned()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(e.into_service_error()))?;

        Ok(res.item().and_then(record_from_item))
    }

    async fn conditional_update_avatar(
        &self,
        username: &str,
        expected: Option<&str>,
        new_avatar: &str,
    ) -> Result<UpdateOutcome> {
        let update = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("Username", AttributeValue::S(username.to_owned()))
            .update_expression("SET Avatar = :newAvatar")
            .expression_attribute_values(":newAvatar", AttributeValue::S(new_avatar.to_owned()));

        // Without attribute_exists(Username) an UpdateItem would create the user.
        let update = match expected {
            Some(old) => update
                .condition_expression("Avatar = :oldAvatar")
                .expression_attribute_values(":oldAvatar", AttributeValue::S(old.to_owned())),
            None => update.condition_expression(
                "attribute_exists(Username) AND attribute_not_exists(Avatar)",
            ),
        };

        match update.send().await {
            Ok(_) => Ok(UpdateOutcome::Applied),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_conditional_check_failed_exception() {
                    Ok(UpdateOutcome::ConditionFailed)
                } else {
                    Err(anyhow::anyhow!(service_err))
                }
            }
        }
    }

    async fn scan(&self) -> Result<Vec<UserRecord>> {
        let mut records = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let res = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(exclusive_start_key)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!(e.into_service_error()))?;

            if let Some(items) = res.items {
                records.extend(items.iter().filter_map(record_from_item));
            }

            match res.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => break,
            }
        }

        Ok(records)
    }
}
