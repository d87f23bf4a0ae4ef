//! Dimension resolution
//!
//! Derives the distinct natural-key candidates for the four dimensions
//! from a window's source records and inserts them conflict-free, so
//! concurrent or repeated runs of the same window never duplicate a row.
//! The same key types double as the fact loader's lookup keys.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;

use crate::error::EtlResult;
use crate::rules::{classify_service, normalize_role};
use crate::source::SourceRecord;
use crate::window::{truncate_to_second, ProcessingWindow};

/// Normalize a coordinate for use as a map key. Postgres compares doubles
/// by value, and `to_bits` agrees with that for every value the pipeline
/// round-trips once negative zero is folded into zero.
fn coord_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

/// Natural key of `dim_time`: the second-truncated timestamp plus its
/// broken-out calendar parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeKey {
    pub timestamp: NaiveDateTime,
    pub hour: i32,
    pub day: i32,
    pub month: i32,
    pub year: i32,
}

impl TimeKey {
    pub fn from_timestamp(ts: NaiveDateTime) -> Self {
        let truncated = truncate_to_second(ts);
        Self {
            timestamp: truncated,
            hour: truncated.hour() as i32,
            day: truncated.day() as i32,
            month: truncated.month() as i32,
            year: truncated.year(),
        }
    }
}

/// Natural key of `dim_location`. Coordinates are stored bitwise so the
/// key is `Eq`/`Ord`/`Hash` while matching Postgres value equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey {
    pub country: String,
    pub region: String,
    pub city: String,
    pub zip_code: String,
    lat_bits: u64,
    lon_bits: u64,
}

impl LocationKey {
    pub fn new(
        country: impl Into<String>,
        region: impl Into<String>,
        city: impl Into<String>,
        zip_code: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            country: country.into(),
            region: region.into(),
            city: city.into(),
            zip_code: zip_code.into(),
            lat_bits: coord_bits(latitude),
            lon_bits: coord_bits(longitude),
        }
    }

    pub fn from_record(record: &SourceRecord) -> Self {
        Self::new(
            record.country.clone(),
            record.region.clone(),
            record.city.clone(),
            record.zip_code.clone(),
            record.latitude,
            record.longitude,
        )
    }

    pub fn latitude(&self) -> f64 {
        f64::from_bits(self.lat_bits)
    }

    pub fn longitude(&self) -> f64 {
        f64::from_bits(self.lon_bits)
    }
}

/// Natural key of `dim_user`: the normalized (role, origin) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserKey {
    pub role: String,
    pub origin: String,
}

impl UserKey {
    pub fn from_record(record: &SourceRecord) -> Self {
        let (role, origin) = normalize_role(&record.role, &record.origin);
        Self { role, origin }
    }
}

/// Natural key of `dim_service`: destination, version, and derived class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey {
    pub destination: String,
    pub api_version: String,
    pub service_type: String,
}

impl ServiceKey {
    pub fn from_record(record: &SourceRecord) -> Self {
        Self {
            destination: record.destination.clone(),
            api_version: record.api_version.clone(),
            service_type: classify_service(&record.destination).as_str().to_string(),
        }
    }
}

/// Distinct natural-key candidates for one window, deduplicated in memory
/// before insertion. `BTreeSet` keeps insert order deterministic.
#[derive(Debug, Default)]
pub struct DimensionCandidates {
    pub time: BTreeSet<TimeKey>,
    pub location: BTreeSet<LocationKey>,
    pub user: BTreeSet<UserKey>,
    pub service: BTreeSet<ServiceKey>,
}

impl DimensionCandidates {
    pub fn derive(records: &[SourceRecord]) -> Self {
        let mut candidates = Self::default();
        for record in records {
            candidates.time.insert(TimeKey::from_timestamp(record.created_at));
            candidates.location.insert(LocationKey::from_record(record));
            candidates.user.insert(UserKey::from_record(record));
            candidates.service.insert(ServiceKey::from_record(record));
        }
        candidates
    }
}

/// Candidate vs. newly inserted counts for one dimension.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DimensionCount {
    pub candidates: u64,
    pub inserted: u64,
}

/// Per-dimension load counts for one run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DimensionCounts {
    pub time: DimensionCount,
    pub location: DimensionCount,
    pub user: DimensionCount,
    pub service: DimensionCount,
}

/// Surrogate-id lookup maps used by the fact loader to resolve foreign
/// keys after the dimensions are loaded.
#[derive(Debug, Default)]
pub struct DimensionKeys {
    pub time: HashMap<NaiveDateTime, i32>,
    pub location: HashMap<LocationKey, i32>,
    pub user: HashMap<UserKey, i32>,
    pub service: HashMap<ServiceKey, i32>,
}

#[derive(sqlx::FromRow)]
struct TimeRow {
    time_id: i32,
    timestamp: NaiveDateTime,
}

#[derive(sqlx::FromRow)]
struct LocationRow {
    location_id: i32,
    country: String,
    region: String,
    city: String,
    zip_code: String,
    latitude: f64,
    longitude: f64,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: i32,
    role: String,
    origin: String,
}

#[derive(sqlx::FromRow)]
struct ServiceRow {
    service_id: i32,
    destination: String,
    api_version: String,
    service_type: String,
}

/// Repository for the four dimension tables.
#[derive(Clone)]
pub struct DimensionRepository {
    pool: PgPool,
}

impl DimensionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Derive candidates from the window's records and insert them inside
    /// one transaction. Rows whose natural key already exists are silently
    /// skipped via `ON CONFLICT ... DO NOTHING`, so re-running a window
    /// inserts nothing new.
    pub async fn load(&self, records: &[SourceRecord]) -> EtlResult<DimensionCounts> {
        let candidates = DimensionCandidates::derive(records);
        let mut counts = DimensionCounts::default();

        let mut tx = self.pool.begin().await?;

        counts.time.candidates = candidates.time.len() as u64;
        for key in &candidates.time {
            let result = sqlx::query(
                r#"
                INSERT INTO olap.dim_time (timestamp, hour, day, month, year)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT ON CONSTRAINT uq_dim_time DO NOTHING
                "#,
            )
            .bind(key.timestamp)
            .bind(key.hour)
            .bind(key.day)
            .bind(key.month)
            .bind(key.year)
            .execute(&mut *tx)
            .await?;
            counts.time.inserted += result.rows_affected();
        }

        counts.location.candidates = candidates.location.len() as u64;
        for key in &candidates.location {
            let result = sqlx::query(
                r#"
                INSERT INTO olap.dim_location
                    (country, region, city, zip_code, latitude, longitude)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT ON CONSTRAINT uq_dim_location DO NOTHING
                "#,
            )
            .bind(&key.country)
            .bind(&key.region)
            .bind(&key.city)
            .bind(&key.zip_code)
            .bind(key.latitude())
            .bind(key.longitude())
            .execute(&mut *tx)
            .await?;
            counts.location.inserted += result.rows_affected();
        }

        counts.user.candidates = candidates.user.len() as u64;
        for key in &candidates.user {
            let result = sqlx::query(
                r#"
                INSERT INTO olap.dim_user (role, origin)
                VALUES ($1, $2)
                ON CONFLICT ON CONSTRAINT uq_dim_user DO NOTHING
                "#,
            )
            .bind(&key.role)
            .bind(&key.origin)
            .execute(&mut *tx)
            .await?;
            counts.user.inserted += result.rows_affected();
        }

        counts.service.candidates = candidates.service.len() as u64;
        for key in &candidates.service {
            let result = sqlx::query(
                r#"
                INSERT INTO olap.dim_service (destination, api_version, service_type)
                VALUES ($1, $2, $3)
                ON CONFLICT ON CONSTRAINT uq_dim_service DO NOTHING
                "#,
            )
            .bind(&key.destination)
            .bind(&key.api_version)
            .bind(&key.service_type)
            .execute(&mut *tx)
            .await?;
            counts.service.inserted += result.rows_affected();
        }

        tx.commit().await?;

        info!(
            time_inserted = counts.time.inserted,
            location_inserted = counts.location.inserted,
            user_inserted = counts.user.inserted,
            service_inserted = counts.service.inserted,
            "Dimension load complete"
        );

        Ok(counts)
    }

    /// Build natural-key to surrogate-id maps covering the given
    /// candidates. Time rows are read by window range; the other three
    /// dimensions by batched `= ANY` queries over their leading key
    /// column, with exact tuple matching done in memory.
    pub async fn lookup_keys(
        &self,
        window: &ProcessingWindow,
        candidates: &DimensionCandidates,
    ) -> EtlResult<DimensionKeys> {
        let mut keys = DimensionKeys::default();

        let time_rows = sqlx::query_as::<_, TimeRow>(
            r#"
            SELECT time_id, timestamp
            FROM olap.dim_time
            WHERE timestamp >= $1 AND timestamp < $2
            "#,
        )
        .bind(window.start())
        .bind(window.end())
        .fetch_all(&self.pool)
        .await?;
        for row in time_rows {
            keys.time.insert(row.timestamp, row.time_id);
        }

        let countries: Vec<String> = candidates
            .location
            .iter()
            .map(|k| k.country.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !countries.is_empty() {
            let rows = sqlx::query_as::<_, LocationRow>(
                r#"
                SELECT location_id, country, region, city, zip_code,
                       latitude, longitude
                FROM olap.dim_location
                WHERE country = ANY($1)
                "#,
            )
            .bind(&countries)
            .fetch_all(&self.pool)
            .await?;
            for row in rows {
                let key = LocationKey::new(
                    row.country,
                    row.region,
                    row.city,
                    row.zip_code,
                    row.latitude,
                    row.longitude,
                );
                keys.location.insert(key, row.location_id);
            }
        }

        let origins: Vec<String> = candidates
            .user
            .iter()
            .map(|k| k.origin.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !origins.is_empty() {
            let rows = sqlx::query_as::<_, UserRow>(
                r#"
                SELECT user_id, role, origin
                FROM olap.dim_user
                WHERE origin = ANY($1)
                "#,
            )
            .bind(&origins)
            .fetch_all(&self.pool)
            .await?;
            for row in rows {
                keys.user.insert(
                    UserKey {
                        role: row.role,
                        origin: row.origin,
                    },
                    row.user_id,
                );
            }
        }

        let destinations: Vec<String> = candidates
            .service
            .iter()
            .map(|k| k.destination.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !destinations.is_empty() {
            let rows = sqlx::query_as::<_, ServiceRow>(
                r#"
                SELECT service_id, destination, api_version, service_type
                FROM olap.dim_service
                WHERE destination = ANY($1)
                "#,
            )
            .bind(&destinations)
            .fetch_all(&self.pool)
            .await?;
            for row in rows {
                keys.service.insert(
                    ServiceKey {
                        destination: row.destination,
                        api_version: row.api_version,
                        service_type: row.service_type,
                    },
                    row.service_id,
                );
            }
        }

        Ok(keys)
    }
}
