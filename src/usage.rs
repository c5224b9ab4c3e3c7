//! Usage accounting for API key principals
//!
//! Decides when daily/monthly counters roll over and applies increments.
//! The read-modify-write runs inside a single redb write transaction;
//! redb serializes writers, so concurrent requests against the same key
//! cannot lose increments.

use chrono::{DateTime, Datelike, Utc};
use redb::{Database, ReadableTable};

use crate::database::TABLE_API_KEYS;
use crate::error::ApiError;
use crate::model::ApiKeyRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rollover {
    pub daily_reset: bool,
    pub monthly_reset: bool,
}

/// Computes which counters roll over between two uses
///
/// Any calendar-date change counts as a day change, including month and
/// year boundaries; a month or year change also rolls the monthly counter.
/// A key that has never been used rolls both.
pub fn reckon(last_used_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Rollover {
    match last_used_at {
        None => Rollover {
            daily_reset: true,
            monthly_reset: true,
        },
        Some(last) => {
            let monthly_reset = now.year() != last.year() || now.month() != last.month();
            let daily_reset = monthly_reset || now.day() != last.day();
            Rollover {
                daily_reset,
                monthly_reset,
            }
        }
    }
}

/// Applies one generation's worth of usage to a principal
///
/// `increment` is 1 for single generations and the job count for bulk.
/// Returns the updated record.
pub fn record_usage(
    db: &Database,
    token: &str,
    increment: u64,
    now: DateTime<Utc>,
) -> Result<ApiKeyRecord, ApiError> {
    let write_txn = db.begin_write()?;
    let updated = {
        let mut table = write_txn.open_table(TABLE_API_KEYS)?;

        let mut record: ApiKeyRecord = {
            let guard = table.get(token)?;
            match guard {
                Some(value) => serde_json::from_str(value.value())?,
                None => return Err(ApiError::Auth("API key not found".to_string())),
            }
        };

        let rollover = reckon(record.last_used_at, now);
        record.usage_count += increment;
        record.daily_usage_count = if rollover.daily_reset {
            increment
        } else {
            record.daily_usage_count + increment
        };
        record.monthly_usage_count = if rollover.monthly_reset {
            increment
        } else {
            record.monthly_usage_count + increment
        };
        record.last_used_at = Some(now);

        let record_json = serde_json::to_string(&record)?;
        table.insert(token, record_json.as_str())?;
        record
    };
    write_txn.commit()?;

    Ok(updated)
}
