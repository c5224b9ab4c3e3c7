//! Data models for the QR generation service
//!
//! This module defines the persisted record structures and the wire-level
//! request models. Response bodies are assembled ad hoc from `json!` in the
//! handlers since their shapes are dictated by the API envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::params::{CanonicalParams, RawVisualParams};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Inactive,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeyTier {
    Free,
    Premium,
}

/// An API key principal with its quota state
///
/// Stored keyed by the opaque token. The daily/monthly counters are reset
/// (not incremented) whenever the request date crosses a day/month boundary
/// relative to `last_used_at`; `usage_count` only ever grows.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiKeyRecord {
    /// Short identifier used to partition the artifact filesystem
    pub id: String,

    /// The opaque API key token presented in the X-API-Key header
    pub key: String,

    pub name: String,

    pub status: KeyStatus,

    pub tier: KeyTier,

    /// Lifetime generation count, monotonically non-decreasing
    #[serde(default)]
    pub usage_count: u64,

    #[serde(default)]
    pub daily_usage_count: u64,

    #[serde(default)]
    pub monthly_usage_count: u64,

    pub last_used_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub expires_at: Option<DateTime<Utc>>,

    /// Declared rate limit; carried on the record, not enforced here
    pub rate_limit: Option<u32>,

    /// e.g. "minute", "hour", "day"
    pub rate_limit_interval: Option<String>,
}

/// A dynamic QR code bridging a short identifier to a mutable target URL
///
/// The rendered artifact always encodes `original_data_encoded`
/// (`{base}/r/{short_id}`) and is never regenerated; updates only repoint
/// the stored redirect target.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DynamicCodeRecord {
    /// Unique URL-safe identifier, 10 alphanumeric chars
    pub short_id: String,

    /// Owning principal (`ApiKeyRecord::id`)
    pub api_key_id: String,

    pub target_url: String,

    /// The URL baked into the QR image, immutable after creation
    pub original_data_encoded: String,

    /// Visual parameter snapshot from creation time
    pub params: CanonicalParams,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// One redirect traversal of a dynamic code, appended best-effort
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanEventRecord {
    pub short_id: String,

    pub scanned_at: DateTime<Utc>,

    pub ip_address: Option<String>,

    pub user_agent: Option<String>,
}

/// Request payload for static generation
///
/// # Example
/// ```json
/// {
///   "data": "hello world",
///   "size": 512,
///   "format": "png",
///   "foregroundColor": "#1A2B3C"
/// }
/// ```
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticGenerateRequest {
    pub data: Option<String>,

    #[serde(flatten)]
    pub params: RawVisualParams,
}

/// Request payload for creating a dynamic code
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicCreateRequest {
    pub target_url: Option<String>,

    #[serde(flatten)]
    pub params: RawVisualParams,
}

/// Request payload for repointing a dynamic code
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicUpdateRequest {
    pub new_target_url: Option<String>,
}

/// One unit of work inside a bulk request; malformed jobs are skipped
/// without aborting their siblings
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJob {
    pub data: Option<String>,

    #[serde(flatten)]
    pub params: RawVisualParams,
}

/// Request payload for bulk generation
#[derive(Deserialize)]
pub struct BulkGenerateRequest {
    pub jobs: Vec<BulkJob>,
}
