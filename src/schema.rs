//! Schema registry
//!
//! Single source of truth for every table and constraint name the engine
//! touches, plus idempotent provisioning of the warehouse objects. The
//! OLTP source table is declared here (its row shape lives in
//! [`crate::source`]) but is never created or written by this engine.

use sqlx::PgPool;
use tracing::info;

use crate::error::EtlResult;
use crate::tenant::Tenant;

/// OLTP source table, owned by the API gateway. Read-only for us.
pub const SOURCE_TABLE: &str = "oltp.api_transactions";

pub const DIM_TIME: &str = "olap.dim_time";
pub const DIM_LOCATION: &str = "olap.dim_location";
pub const DIM_USER: &str = "olap.dim_user";
pub const DIM_SERVICE: &str = "olap.dim_service";
pub const FACT_TABLE: &str = "olap.fact_log_transactions";

/// Named unique constraints the conflict-free inserts target.
pub const UQ_DIM_TIME: &str = "uq_dim_time";
pub const UQ_DIM_LOCATION: &str = "uq_dim_location";
pub const UQ_DIM_USER: &str = "uq_dim_user";
pub const UQ_DIM_SERVICE: &str = "uq_dim_service";

/// Flat mart table for a tenant.
pub fn mart_table(tenant: Tenant) -> String {
    format!("olap.mart_{}", tenant.slug())
}

const WAREHOUSE_DDL: &str = r#"
CREATE SCHEMA IF NOT EXISTS olap;

CREATE TABLE IF NOT EXISTS olap.dim_time (
    time_id   INT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    timestamp TIMESTAMP NOT NULL,
    hour      INT NOT NULL,
    day       INT NOT NULL,
    month     INT NOT NULL,
    year      INT NOT NULL,
    CONSTRAINT uq_dim_time UNIQUE (timestamp, hour, day, month, year)
);

CREATE TABLE IF NOT EXISTS olap.dim_location (
    location_id INT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    country     VARCHAR(100) NOT NULL,
    region      VARCHAR(100) NOT NULL,
    city        VARCHAR(100) NOT NULL,
    zip_code    VARCHAR(20) NOT NULL,
    latitude    DOUBLE PRECISION NOT NULL,
    longitude   DOUBLE PRECISION NOT NULL,
    CONSTRAINT uq_dim_location
        UNIQUE (country, region, city, zip_code, latitude, longitude)
);

CREATE TABLE IF NOT EXISTS olap.dim_user (
    user_id INT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    role    VARCHAR(100) NOT NULL,
    origin  VARCHAR(100) NOT NULL,
    CONSTRAINT uq_dim_user UNIQUE (role, origin)
);

CREATE TABLE IF NOT EXISTS olap.dim_service (
    service_id   INT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    destination  VARCHAR(100) NOT NULL,
    api_version  VARCHAR(50) NOT NULL,
    service_type VARCHAR(50) NOT NULL,
    CONSTRAINT uq_dim_service UNIQUE (destination, api_version, service_type)
);

CREATE TABLE IF NOT EXISTS olap.fact_log_transactions (
    log_id               BIGINT PRIMARY KEY,
    time_id              INT NOT NULL REFERENCES olap.dim_time (time_id),
    location_id          INT NOT NULL REFERENCES olap.dim_location (location_id),
    user_id              INT NOT NULL REFERENCES olap.dim_user (user_id),
    service_id           INT NOT NULL REFERENCES olap.dim_service (service_id),
    request_method       VARCHAR(20),
    request_url          TEXT,
    request_headers      TEXT,
    request_body         TEXT,
    response_status_code INT,
    response_body        TEXT,
    execution_time_ms    INT,
    error_message        TEXT
);
"#;

/// DDL for one tenant's mart. `occurred_at` is the time dimension's
/// truncated timestamp and carries the window partition.
fn mart_ddl(tenant: Tenant) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    log_id               BIGINT PRIMARY KEY,
    occurred_at          TIMESTAMP NOT NULL,
    hour                 INT NOT NULL,
    day                  INT NOT NULL,
    month                INT NOT NULL,
    year                 INT NOT NULL,
    country              VARCHAR(100) NOT NULL,
    region               VARCHAR(100) NOT NULL,
    city                 VARCHAR(100) NOT NULL,
    zip_code             VARCHAR(20) NOT NULL,
    latitude             DOUBLE PRECISION NOT NULL,
    longitude            DOUBLE PRECISION NOT NULL,
    role                 VARCHAR(100) NOT NULL,
    origin               VARCHAR(100) NOT NULL,
    destination          VARCHAR(100) NOT NULL,
    api_version          VARCHAR(50) NOT NULL,
    service_type         VARCHAR(50) NOT NULL,
    request_method       VARCHAR(20),
    request_url          TEXT,
    request_headers      TEXT,
    request_body         TEXT,
    response_status_code INT,
    response_body        TEXT,
    execution_time_ms    INT,
    error_message        TEXT
);
"#,
        table = mart_table(tenant)
    )
}

/// Create the OLAP schema, the star-schema tables, and the per-tenant mart
/// tables if they don't already exist. Never drops or alters anything, so
/// running this on every invocation is safe.
pub async fn provision(pool: &PgPool) -> EtlResult<()> {
    sqlx::raw_sql(WAREHOUSE_DDL).execute(pool).await?;

    for tenant in Tenant::ALL {
        sqlx::raw_sql(&mart_ddl(tenant)).execute(pool).await?;
    }

    info!("Warehouse schema provisioned (create-if-absent)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mart_table_names() {
        assert_eq!(mart_table(Tenant::Teleo), "olap.mart_teleo");
        assert_eq!(mart_table(Tenant::Evntgarde), "olap.mart_evntgarde");
    }

    #[test]
    fn test_ddl_is_create_if_absent_only() {
        let mut ddl = WAREHOUSE_DDL.to_string();
        for tenant in Tenant::ALL {
            ddl.push_str(&mart_ddl(tenant));
        }
        let upper = ddl.to_uppercase();
        assert!(!upper.contains("DROP "));
        assert!(!upper.contains("ALTER "));
        assert_eq!(
            upper.matches("CREATE TABLE IF NOT EXISTS").count(),
            // five warehouse tables + four marts
            9
        );
    }

    #[test]
    fn test_ddl_declares_named_constraints() {
        for constraint in [UQ_DIM_TIME, UQ_DIM_LOCATION, UQ_DIM_USER, UQ_DIM_SERVICE] {
            assert!(
                WAREHOUSE_DDL.contains(&format!("CONSTRAINT {constraint}")),
                "missing constraint {constraint}"
            );
        }
    }
}
