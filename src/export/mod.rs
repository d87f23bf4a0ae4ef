//! Export stage
//!
//! Stages each dataset once as a CSV file in the scratch directory, then
//! fans the bytes out to every tenant's delivery bucket. Staging errors
//! are fatal; delivery errors are isolated per file and reported in the
//! [`ExportReport`] without aborting other tenants.

pub mod csv;
pub mod sink;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::EtlResult;
use crate::export::csv::Extract;
use crate::export::sink::DeliverySink;
use crate::tenant::Tenant;
use crate::window::ProcessingWindow;

pub use sink::{LocalDirSink, MemorySink};

/// One failed delivery.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryFailure {
    pub bucket: String,
    pub file: String,
    pub message: String,
}

/// What the export stage staged and delivered.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    /// File names written to the scratch directory.
    pub staged: Vec<String>,
    /// `<bucket>/<file>` paths delivered successfully.
    pub delivered: Vec<String>,
    /// Deliveries that failed; never empty without a matching warn log.
    pub failures: Vec<DeliveryFailure>,
}

/// Runs the export stage for one window.
pub struct Exporter {
    pool: PgPool,
    sink: Arc<dyn DeliverySink>,
    scratch_dir: PathBuf,
}

impl Exporter {
    pub fn new(pool: PgPool, sink: Arc<dyn DeliverySink>, scratch_dir: PathBuf) -> Self {
        Self {
            pool,
            sink,
            scratch_dir,
        }
    }

    /// Stage the shared extracts and each tenant's mart extract, then
    /// deliver the shared set plus the tenant's own mart to every tenant
    /// bucket. Returns the report; only staging errors propagate.
    pub async fn run(&self, window: &ProcessingWindow) -> EtlResult<ExportReport> {
        let mut report = ExportReport::default();

        let shared = vec![
            csv::fact_extract(&self.pool, window).await?,
            csv::time_dim_extract(&self.pool, window).await?,
            csv::location_dim_extract(&self.pool, window).await?,
            csv::user_dim_extract(&self.pool, window).await?,
            csv::service_dim_extract(&self.pool, window).await?,
        ];
        for extract in &shared {
            self.stage(extract, &mut report).await?;
        }

        for tenant in Tenant::ALL {
            let mart = csv::mart_extract(&self.pool, tenant, window).await?;
            self.stage(&mart, &mut report).await?;

            let bucket = tenant.delivery_bucket();
            for extract in shared.iter().chain(std::iter::once(&mart)) {
                self.deliver(&bucket, extract, &mut report).await;
            }
        }

        info!(
            staged = report.staged.len(),
            delivered = report.delivered.len(),
            failed = report.failures.len(),
            "Export complete"
        );

        Ok(report)
    }

    async fn stage(&self, extract: &Extract, report: &mut ExportReport) -> EtlResult<()> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        tokio::fs::write(self.scratch_dir.join(&extract.file_name), &extract.data).await?;
        report.staged.push(extract.file_name.clone());
        Ok(())
    }

    async fn deliver(&self, bucket: &str, extract: &Extract, report: &mut ExportReport) {
        match self
            .sink
            .put(bucket, &extract.file_name, extract.data.clone())
            .await
        {
            Ok(()) => report
                .delivered
                .push(format!("{bucket}/{}", extract.file_name)),
            Err(e) => {
                warn!(
                    bucket,
                    file = extract.file_name,
                    error = %e,
                    "Delivery failed"
                );
                report.failures.push(DeliveryFailure {
                    bucket: bucket.to_string(),
                    file: extract.file_name.clone(),
                    message: e.to_string(),
                });
            }
        }
    }
}
