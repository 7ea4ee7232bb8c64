//! SigV4 signing of browser-based POST upload policies.
//!
//! The S3 SDK presigns single requests but not HTML form uploads, so the
//! policy document and its signature are built here.

use crate::services::storage::UploadPolicy;
use anyhow::Result;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::{Map, Value, json};
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

#[derive(Debug, Clone)]
pub struct SigningCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("invalid HMAC key: {e}"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn eq_condition(name: &str, value: &str) -> Value {
    let mut condition = Map::new();
    condition.insert(name.to_string(), Value::String(value.to_string()));
    Value::Object(condition)
}

/// Builds the form fields a client must submit alongside the file.
///
/// Every entry of `policy.required_fields` is both pinned in the signed
/// policy and returned as a field, so the upload is rejected by the store
/// unless it echoes them verbatim.
pub fn build_post_fields(
    bucket: &str,
    key: &str,
    policy: &UploadPolicy,
    credentials: &SigningCredentials,
    now: DateTime<Utc>,
) -> Result<BTreeMap<String, String>> {
    let date = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let credential = format!(
        "{}/{}/{}/s3/aws4_request",
        credentials.access_key_id, date, credentials.region
    );
    let expiration = now + chrono::Duration::from_std(policy.expires_in)?;

    let mut conditions = vec![
        eq_condition("bucket", bucket),
        eq_condition("key", key),
        json!(["content-length-range", 0, policy.max_size]),
        json!(["starts-with", "$Content-Type", policy.content_type_prefix]),
    ];
    for (name, value) in &policy.required_fields {
        conditions.push(eq_condition(name, value));
    }
    conditions.push(eq_condition("x-amz-algorithm", ALGORITHM));
    conditions.push(eq_condition("x-amz-credential", &credential));
    conditions.push(eq_condition("x-amz-date", &amz_date));
    if let Some(token) = &credentials.session_token {
        conditions.push(eq_condition("x-amz-security-token", token));
    }

    let document = json!({
        "expiration": expiration.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "conditions": conditions,
    });
    let encoded_policy = STANDARD.encode(serde_json::to_vec(&document)?);

    let signing_key = derive_signing_key(
        &credentials.secret_access_key,
        &date,
        &credentials.region,
        "s3",
    )?;
    let signature = hex::encode(hmac_sha256(&signing_key, encoded_policy.as_bytes())?);

    let mut fields = BTreeMap::new();
    fields.insert("key".to_string(), key.to_string());
    for (name, value) in &policy.required_fields {
        fields.insert(name.clone(), value.clone());
    }
    fields.insert("Policy".to_string(), encoded_policy);
    fields.insert("X-Amz-Algorithm".to_string(), ALGORITHM.to_string());
    fields.insert("X-Amz-Credential".to_string(), credential);
    fields.insert("X-Amz-Date".to_string(), amz_date);
    fields.insert("X-Amz-Signature".to_string(), signature);
    if let Some(token) = &credentials.session_token {
        fields.insert("X-Amz-Security-Token".to_string(), token.clone());
    }

    Ok(fields)
}
