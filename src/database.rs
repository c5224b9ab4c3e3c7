//! Database initialization, table definitions and record access
//!
//! This module handles the setup of the embedded redb database, defines the
//! three tables and wraps the record-level reads and writes the handlers
//! need. All values are JSON-serialized records stored as strings.

use chrono::{DateTime, Utc};
use rand::{distr::Alphanumeric, Rng};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::model::{ApiKeyRecord, DynamicCodeRecord, KeyStatus, KeyTier, ScanEventRecord};
use crate::storage::ArtifactStore;

/// API key principals
///
/// Key: the opaque token presented in the X-API-Key header
/// Value: JSON-serialized ApiKeyRecord
pub const TABLE_API_KEYS: TableDefinition<&str, &str> = TableDefinition::new("api_keys_v1");

/// Dynamic QR codes
///
/// Key: short identifier (10 alphanumeric chars)
/// Value: JSON-serialized DynamicCodeRecord
pub const TABLE_DYNAMIC_CODES: TableDefinition<&str, &str> =
    TableDefinition::new("dynamic_codes_v1");

/// Scan events, time-ordered per code
///
/// Key: composite "{short_id}:{timestamp_micros}:{4-char random}"
/// Value: JSON-serialized ScanEventRecord
///
/// Short ids have a fixed length, so the range "{short_id}:".."{short_id}:{"
/// scans exactly one code's events in chronological order. The random
/// suffix keeps two scans inside the same microsecond from colliding.
pub const TABLE_SCAN_EVENTS: TableDefinition<&str, &str> =
    TableDefinition::new("scan_events_v1");

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe reference to the embedded database
    pub db: Arc<Database>,

    pub config: Arc<AppConfig>,

    /// Artifact filesystem rooted at DATA_DIR
    pub store: ArtifactStore,

    /// Client used for logo fetches; carries the fetch timeout
    pub http: reqwest::Client,
}

/// Creates or opens the database file and ensures all tables exist
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_API_KEYS)?;
        write_txn.open_table(TABLE_DYNAMIC_CODES)?;
        write_txn.open_table(TABLE_SCAN_EVENTS)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Provisions a new active free-tier API key
///
/// Key issuance has no HTTP surface; this is the seam the provisioning
/// flow (and the test suite) goes through.
pub fn insert_api_key(db: &Database, name: &str) -> Result<ApiKeyRecord, ApiError> {
    let record = ApiKeyRecord {
        id: random_token(8),
        key: random_token(32),
        name: name.to_string(),
        status: KeyStatus::Active,
        tier: KeyTier::Free,
        usage_count: 0,
        daily_usage_count: 0,
        monthly_usage_count: 0,
        last_used_at: None,
        created_at: Utc::now(),
        expires_at: None,
        rate_limit: None,
        rate_limit_interval: None,
    };
    let record_json = serde_json::to_string(&record)?;

    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(TABLE_API_KEYS)?;
        table.insert(record.key.as_str(), record_json.as_str())?;
    }
    write_txn.commit()?;

    Ok(record)
}

/// Writes back a mutated API key record (used by tests to shape fixtures)
pub fn put_api_key(db: &Database, record: &ApiKeyRecord) -> Result<(), ApiError> {
    let record_json = serde_json::to_string(record)?;
    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(TABLE_API_KEYS)?;
        table.insert(record.key.as_str(), record_json.as_str())?;
    }
    write_txn.commit()?;
    Ok(())
}

pub fn find_api_key(db: &Database, token: &str) -> Result<Option<ApiKeyRecord>, ApiError> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_API_KEYS)?;
    match table.get(token)? {
        Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
        None => Ok(None),
    }
}

/// Inserts a dynamic code, returning false if the short id is taken
///
/// The existence check and the insert share one write transaction, so a
/// concurrent request cannot slip the same id in between them. The caller
/// regenerates and retries on a collision.
pub fn insert_dynamic_code(db: &Database, record: &DynamicCodeRecord) -> Result<bool, ApiError> {
    let record_json = serde_json::to_string(record)?;

    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(TABLE_DYNAMIC_CODES)?;
        let taken = table.get(record.short_id.as_str())?.is_some();
        if taken {
            return Ok(false);
        }
        table.insert(record.short_id.as_str(), record_json.as_str())?;
    }
    write_txn.commit()?;

    Ok(true)
}

/// Unscoped lookup, used by the public redirect
pub fn find_dynamic_code(
    db: &Database,
    short_id: &str,
) -> Result<Option<DynamicCodeRecord>, ApiError> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_DYNAMIC_CODES)?;
    match table.get(short_id)? {
        Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
        None => Ok(None),
    }
}

/// Owner-scoped lookup
///
/// A code owned by a different principal is reported exactly like a
/// missing one, so callers cannot probe for foreign short ids.
pub fn find_dynamic_code_scoped(
    db: &Database,
    short_id: &str,
    api_key_id: &str,
) -> Result<Option<DynamicCodeRecord>, ApiError> {
    Ok(find_dynamic_code(db, short_id)?.filter(|record| record.api_key_id == api_key_id))
}

/// Repoints an owned dynamic code at a new target URL
///
/// Only `target_url` and `updated_at` change; the encoded data and the
/// rendered artifact are left untouched. Returns None when the code does
/// not exist or belongs to another principal.
pub fn update_dynamic_target(
    db: &Database,
    short_id: &str,
    api_key_id: &str,
    new_target_url: &str,
    now: DateTime<Utc>,
) -> Result<Option<DynamicCodeRecord>, ApiError> {
    let write_txn = db.begin_write()?;
    let updated = {
        let mut table = write_txn.open_table(TABLE_DYNAMIC_CODES)?;

        let mut record: DynamicCodeRecord = {
            let guard = table.get(short_id)?;
            match guard {
                Some(value) => serde_json::from_str(value.value())?,
                None => return Ok(None),
            }
        };

        if record.api_key_id != api_key_id {
            return Ok(None);
        }

        record.target_url = new_target_url.to_string();
        record.updated_at = now;

        let record_json = serde_json::to_string(&record)?;
        table.insert(short_id, record_json.as_str())?;
        record
    };
    write_txn.commit()?;

    Ok(Some(updated))
}

/// Appends a scan event; the caller treats failures as non-fatal
pub fn record_scan_event(
    db: &Database,
    short_id: &str,
    ip_address: Option<String>,
    user_agent: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    let event = ScanEventRecord {
        short_id: short_id.to_string(),
        scanned_at: now,
        ip_address,
        user_agent,
    };
    let event_json = serde_json::to_string(&event)?;
    let event_key = format!("{}:{}:{}", short_id, now.timestamp_micros(), random_token(4));

    let write_txn = db.begin_write()?;
    {
        let mut table = write_txn.open_table(TABLE_SCAN_EVENTS)?;
        table.insert(event_key.as_str(), event_json.as_str())?;
    }
    write_txn.commit()?;

    Ok(())
}

/// Counts a code's scan events and reports the most recent one
pub fn scan_stats(
    db: &Database,
    short_id: &str,
) -> Result<(u64, Option<DateTime<Utc>>), ApiError> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(TABLE_SCAN_EVENTS)?;

    // The '{' upper bound sits just past ':' plus any alphanumeric suffix
    let start_key = format!("{}:", short_id);
    let end_key = format!("{}:{{", short_id);

    let mut total = 0u64;
    let mut last_value: Option<String> = None;
    for entry in table.range(start_key.as_str()..end_key.as_str())? {
        let (_, value) = entry?;
        total += 1;
        last_value = Some(value.value().to_string());
    }

    let last_scanned = match last_value {
        Some(json) => {
            let event: ScanEventRecord = serde_json::from_str(&json)?;
            Some(event.scanned_at)
        }
        None => None,
    };

    Ok((total, last_scanned))
}

pub fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
