//! Per-tenant mart rebuilds
//!
//! Each tenant's mart is a flat join of fact and all four dimensions,
//! replaced wholesale per (tenant, window) partition: the window's rows
//! are deleted and re-inserted in one transaction, so running a window
//! twice yields the same mart, and other windows' rows are untouched.

use std::collections::BTreeMap;

use sqlx::PgPool;
use tracing::info;

use crate::error::EtlResult;
use crate::schema::mart_table;
use crate::tenant::Tenant;
use crate::window::ProcessingWindow;

/// Builds the four tenant marts for a window.
#[derive(Clone)]
pub struct MartBuilder {
    pool: PgPool,
}

impl MartBuilder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Rebuild every tenant's mart for the window. A tenant's rows are
    /// those where it is caller (user origin) or callee (service
    /// destination). Returns inserted row counts keyed by tenant slug.
    pub async fn rebuild(
        &self,
        window: &ProcessingWindow,
    ) -> EtlResult<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        for tenant in Tenant::ALL {
            let inserted = self.rebuild_tenant(tenant, window).await?;
            counts.insert(tenant.slug().to_string(), inserted);
        }
        Ok(counts)
    }

    async fn rebuild_tenant(
        &self,
        tenant: Tenant,
        window: &ProcessingWindow,
    ) -> EtlResult<u64> {
        let table = mart_table(tenant);
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM {table} WHERE occurred_at >= $1 AND occurred_at < $2"
        ))
        .bind(window.start())
        .bind(window.end())
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {table} (
                log_id, occurred_at, hour, day, month, year,
                country, region, city, zip_code, latitude, longitude,
                role, origin, destination, api_version, service_type,
                request_method, request_url, request_headers, request_body,
                response_status_code, response_body, execution_time_ms,
                error_message
            )
            SELECT
                f.log_id, dt.timestamp, dt.hour, dt.day, dt.month, dt.year,
                dl.country, dl.region, dl.city, dl.zip_code,
                dl.latitude, dl.longitude,
                du.role, du.origin,
                ds.destination, ds.api_version, ds.service_type,
                f.request_method, f.request_url, f.request_headers,
                f.request_body, f.response_status_code, f.response_body,
                f.execution_time_ms, f.error_message
            FROM olap.fact_log_transactions f
            JOIN olap.dim_time dt ON dt.time_id = f.time_id
            JOIN olap.dim_location dl ON dl.location_id = f.location_id
            JOIN olap.dim_user du ON du.user_id = f.user_id
            JOIN olap.dim_service ds ON ds.service_id = f.service_id
            WHERE dt.timestamp >= $1 AND dt.timestamp < $2
              AND (du.origin = $3 OR ds.destination = $3)
            "#
        ))
        .bind(window.start())
        .bind(window.end())
        .bind(tenant.canonical_name())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let inserted = result.rows_affected();
        info!(
            tenant = tenant.slug(),
            rows = inserted,
            window = %window,
            "Mart rebuilt"
        );
        Ok(inserted)
    }
}
