//! OLTP source access
//!
//! Read-only view of the gateway's API transaction log. One row per
//! proxied API call, identified by the immutable `log_id`.

use chrono::NaiveDateTime;
use sqlx::PgPool;
use tracing::debug;

use crate::error::EtlResult;
use crate::window::ProcessingWindow;

/// One raw API transaction as logged by the gateway.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRecord {
    pub log_id: i64,
    pub created_at: NaiveDateTime,
    pub country: String,
    pub region: String,
    pub city: String,
    pub zip_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub role: String,
    pub origin: String,
    pub destination: String,
    pub api_version: String,
    pub request_method: Option<String>,
    pub request_url: Option<String>,
    pub request_headers: Option<String>,
    pub request_body: Option<String>,
    pub response_status_code: Option<i32>,
    pub response_body: Option<String>,
    pub execution_time_ms: Option<i32>,
    pub error_message: Option<String>,
}

/// Fetch every source record inside the half-open window, ordered by
/// `log_id` for stable downstream processing.
pub async fn fetch_window(
    pool: &PgPool,
    window: &ProcessingWindow,
) -> EtlResult<Vec<SourceRecord>> {
    let records = sqlx::query_as::<_, SourceRecord>(
        r#"
        SELECT
            log_id, created_at,
            country, region, city, zip_code, latitude, longitude,
            role, origin, destination, api_version,
            request_method, request_url, request_headers, request_body,
            response_status_code, response_body, execution_time_ms,
            error_message
        FROM oltp.api_transactions
        WHERE created_at >= $1 AND created_at < $2
        ORDER BY log_id
        "#,
    )
    .bind(window.start())
    .bind(window.end())
    .fetch_all(pool)
    .await?;

    debug!(
        count = records.len(),
        window = %window,
        "Fetched source records"
    );

    Ok(records)
}
