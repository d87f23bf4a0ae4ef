//! Fact loading
//!
//! Transforms a window's source records into fact rows by resolving the
//! four dimension surrogate keys, then inserts them keyed by the source's
//! immutable `log_id`. Duplicates are silently skipped, so re-running a
//! window reports zero new rows.

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::EtlResult;
use crate::source::{self, SourceRecord};
use crate::warehouse::dimensions::{
    DimensionCandidates, DimensionKeys, DimensionRepository, LocationKey, ServiceKey, TimeKey,
    UserKey,
};
use crate::window::ProcessingWindow;

/// Outcome of one fact-load pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FactLoadOutcome {
    /// Source rows found inside the window.
    pub source_rows: u64,
    /// Fact rows newly inserted this run.
    pub inserted: u64,
    /// Rows whose `log_id` already existed in the fact table.
    pub duplicates: u64,
    /// Rows whose dimension lookup failed. Possible only if the warehouse
    /// was mutated between dimension and fact loading.
    pub unresolved: u64,
}

/// Repository for the fact table.
#[derive(Clone)]
pub struct FactRepository {
    pool: PgPool,
}

impl FactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the window's facts. Re-reads the source (it does not share the
    /// dimension resolver's rows), resolves foreign keys via the freshly
    /// loaded dimensions, and inserts everything in one transaction with
    /// `ON CONFLICT (log_id) DO NOTHING`.
    pub async fn load(
        &self,
        dimensions: &DimensionRepository,
        window: &ProcessingWindow,
    ) -> EtlResult<FactLoadOutcome> {
        let records = source::fetch_window(&self.pool, window).await?;
        let candidates = DimensionCandidates::derive(&records);
        let keys = dimensions.lookup_keys(window, &candidates).await?;

        let mut outcome = FactLoadOutcome {
            source_rows: records.len() as u64,
            ..Default::default()
        };

        let mut tx = self.pool.begin().await?;

        for record in &records {
            let Some(fk) = resolve_foreign_keys(record, &keys) else {
                warn!(log_id = record.log_id, "Dimension lookup failed, skipping record");
                outcome.unresolved += 1;
                continue;
            };

            let result = sqlx::query(
                r#"
                INSERT INTO olap.fact_log_transactions (
                    log_id, time_id, location_id, user_id, service_id,
                    request_method, request_url, request_headers, request_body,
                    response_status_code, response_body, execution_time_ms,
                    error_message
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                ON CONFLICT (log_id) DO NOTHING
                "#,
            )
            .bind(record.log_id)
            .bind(fk.time_id)
            .bind(fk.location_id)
            .bind(fk.user_id)
            .bind(fk.service_id)
            .bind(&record.request_method)
            .bind(&record.request_url)
            .bind(&record.request_headers)
            .bind(&record.request_body)
            .bind(record.response_status_code)
            .bind(&record.response_body)
            .bind(record.execution_time_ms)
            .bind(&record.error_message)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                outcome.inserted += 1;
            } else {
                outcome.duplicates += 1;
            }
        }

        tx.commit().await?;

        info!(
            source_rows = outcome.source_rows,
            inserted = outcome.inserted,
            duplicates = outcome.duplicates,
            unresolved = outcome.unresolved,
            "Fact load complete"
        );

        Ok(outcome)
    }
}

struct ForeignKeys {
    time_id: i32,
    location_id: i32,
    user_id: i32,
    service_id: i32,
}

/// Resolve a record's four surrogate keys using the same natural-key
/// expressions the dimension resolver inserted with. `None` means some
/// dimension row is missing, which the loader treats as a skip, not an
/// error.
fn resolve_foreign_keys(record: &SourceRecord, keys: &DimensionKeys) -> Option<ForeignKeys> {
    let time_key = TimeKey::from_timestamp(record.created_at);
    let time_id = *keys.time.get(&time_key.timestamp)?;
    let location_id = *keys.location.get(&LocationKey::from_record(record))?;
    let user_id = *keys.user.get(&UserKey::from_record(record))?;
    let service_id = *keys.service.get(&ServiceKey::from_record(record))?;
    Some(ForeignKeys {
        time_id,
        location_id,
        user_id,
        service_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record() -> SourceRecord {
        SourceRecord {
            log_id: 1,
            created_at: NaiveDate::from_ymd_opt(2024, 3, 5)
                .unwrap()
                .and_hms_micro_opt(10, 15, 30, 250_000)
                .unwrap(),
            country: "Philippines".into(),
            region: "NCR".into(),
            city: "Manila".into(),
            zip_code: "1000".into(),
            latitude: 14.5995,
            longitude: 120.9842,
            role: "Student".into(),
            origin: "campus".into(),
            destination: "Teleo".into(),
            api_version: "v1".into(),
            request_method: None,
            request_url: None,
            request_headers: None,
            request_body: None,
            response_status_code: None,
            response_body: None,
            execution_time_ms: None,
            error_message: None,
        }
    }

    fn keys_for(record: &SourceRecord) -> DimensionKeys {
        let mut keys = DimensionKeys::default();
        let time_key = TimeKey::from_timestamp(record.created_at);
        keys.time.insert(time_key.timestamp, 11);
        keys.location.insert(LocationKey::from_record(record), 22);
        keys.user.insert(UserKey::from_record(record), 33);
        keys.service.insert(ServiceKey::from_record(record), 44);
        keys
    }

    #[test]
    fn test_resolve_foreign_keys_uses_truncated_timestamp() {
        let record = record();
        // The lookup map holds the truncated timestamp, yet a sub-second
        // source value still resolves.
        let fk = resolve_foreign_keys(&record, &keys_for(&record)).unwrap();
        assert_eq!(
            (fk.time_id, fk.location_id, fk.user_id, fk.service_id),
            (11, 22, 33, 44)
        );
    }

    #[test]
    fn test_resolve_foreign_keys_missing_dimension() {
        let record = record();
        let mut keys = keys_for(&record);
        keys.user.clear();
        assert!(resolve_foreign_keys(&record, &keys).is_none());
    }
}
