use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Authoritative per-user record. `avatar` only ever names a committed blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct UserRecord {
    pub username: String,
    pub name: String,
    pub avatar: Option<String>,
}

/// Result of a conditional write against the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    ConditionFailed,
}

/// Authenticated principal handed to the core by the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
