use std::env;

/// Which record store backs the per-user avatar pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordBackend {
    /// sea-orm over `DATABASE_URL` (SQLite or Postgres)
    Sql,
    /// DynamoDB table named by `TABLE`
    DynamoDb,
}

impl RecordBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "sql" | "sqlite" | "postgres" => Some(Self::Sql),
            "dynamodb" | "dynamo" => Some(Self::DynamoDb),
            _ => None,
        }
    }
}

/// Configuration for the avatar upload and commit flow
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum avatar size in bytes (default: 1,000,000)
    pub max_upload_size: u64,

    /// Required content type prefix for uploads (default: "image/")
    pub content_type_prefix: String,

    /// Lifetime of an upload grant in seconds (default: 3600)
    pub grant_expiry_secs: u64,

    /// Lifetime of a signed avatar read URL in seconds (default: 900)
    pub read_url_expiry_secs: u64,

    /// Record store backend: "sql" or "dynamodb" (default: "sql")
    pub record_backend: RecordBackend,

    /// DynamoDB table holding user records (default: "users")
    pub dynamodb_table: String,

    /// Run the orphan sweeper in the background worker (default: false)
    pub enable_orphan_sweep: bool,

    /// Interval between orphan sweeps in seconds (default: 3600)
    pub orphan_sweep_interval_secs: u64,

    /// Minimum age before an unreferenced blob may be swept (default: 24h)
    pub orphan_grace_secs: u64,

    /// Users inserted at startup when missing, as (username, name)
    pub seed_users: Vec<(String, String)>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 1_000_000,
            content_type_prefix: "image/".to_string(),
            grant_expiry_secs: 3600,
            read_url_expiry_secs: 900,
            record_backend: RecordBackend::Sql,
            dynamodb_table: "users".to_string(),
            enable_orphan_sweep: false,
            orphan_sweep_interval_secs: 3600,
            orphan_grace_secs: 24 * 3600,
            seed_users: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            content_type_prefix: env::var("CONTENT_TYPE_PREFIX")
                .unwrap_or(default.content_type_prefix),

            grant_expiry_secs: env::var("GRANT_EXPIRY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.grant_expiry_secs),

            read_url_expiry_secs: env::var("READ_URL_EXPIRY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.read_url_expiry_secs),

            record_backend: env::var("RECORD_STORE")
                .ok()
                .and_then(|v| RecordBackend::parse(&v))
                .unwrap_or(default.record_backend),

            dynamodb_table: env::var("TABLE").unwrap_or(default.dynamodb_table),

            enable_orphan_sweep: env::var("ENABLE_ORPHAN_SWEEP")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.enable_orphan_sweep),

            orphan_sweep_interval_secs: env::var("ORPHAN_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.orphan_sweep_interval_secs),

            orphan_grace_secs: env::var("ORPHAN_GRACE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.orphan_grace_secs),

            seed_users: env::var("SEED_USERS")
                .map(|v| parse_seed_users(&v))
                .unwrap_or(default.seed_users),
        }
    }

    /// Create config for development (seeded demo users, short-lived grants)
    pub fn development() -> Self {
        Self {
            grant_expiry_secs: 600,
            seed_users: vec![
                ("alice".to_string(), "Alice".to_string()),
                ("bob".to_string(), "Bob".to_string()),
            ],
            ..Self::default()
        }
    }
}

/// Parses `alice:Alice,bob:Bob`. A bare username doubles as the display name.
fn parse_seed_users(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((username, name)) => (username.trim().to_string(), name.trim().to_string()),
            None => (entry.to_string(), entry.to_string()),
        })
        .filter(|(username, _)| !username.is_empty())
        .collect()
}
